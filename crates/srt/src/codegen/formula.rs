//! Single-input `f32` expression trees handed to a codegen backend.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Neg,
    Abs,
    Exp,
    Log,
    Tanh,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFn {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl UnaryFn {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            UnaryFn::Neg => -x,
            UnaryFn::Abs => x.abs(),
            UnaryFn::Exp => x.exp(),
            UnaryFn::Log => x.ln(),
            UnaryFn::Tanh => x.tanh(),
            UnaryFn::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

impl BinaryFn {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryFn::Add => a + b,
            BinaryFn::Sub => a - b,
            BinaryFn::Mul => a * b,
            BinaryFn::Div => a / b,
            BinaryFn::Min => a.min(b),
            BinaryFn::Max => a.max(b),
        }
    }
}

impl CmpOp {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Eq => a == b,
        }
    }
}

/// Expression over the single input element `x`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Input,
    Const(f32),
    Unary(UnaryFn, Box<Expr>),
    Binary(BinaryFn, Box<Expr>, Box<Expr>),
    /// `if lhs <op> rhs { then } else { otherwise }`
    Select {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn input() -> Self {
        Expr::Input
    }

    pub fn constant(v: f32) -> Self {
        Expr::Const(v)
    }

    pub fn unary(f: UnaryFn, x: Expr) -> Self {
        Expr::Unary(f, Box::new(x))
    }

    pub fn binary(f: BinaryFn, a: Expr, b: Expr) -> Self {
        Expr::Binary(f, Box::new(a), Box::new(b))
    }

    pub fn select(op: CmpOp, lhs: Expr, rhs: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Select {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Scalar reference evaluation.
    pub fn eval(&self, x: f32) -> f32 {
        match self {
            Expr::Input => x,
            Expr::Const(c) => *c,
            Expr::Unary(f, a) => f.apply(a.eval(x)),
            Expr::Binary(f, a, b) => f.apply(a.eval(x), b.eval(x)),
            Expr::Select {
                op,
                lhs,
                rhs,
                then,
                otherwise,
            } => {
                if op.apply(lhs.eval(x), rhs.eval(x)) {
                    then.eval(x)
                } else {
                    otherwise.eval(x)
                }
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Expr::Input | Expr::Const(_) => 1,
            Expr::Unary(_, a) => 1 + a.size(),
            Expr::Binary(_, a, b) => 1 + a.size() + b.size(),
            Expr::Select {
                lhs,
                rhs,
                then,
                otherwise,
                ..
            } => 1 + lhs.size() + rhs.size() + then.size() + otherwise.size(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Input => f.write_str("x"),
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Unary(op, a) => write!(f, "{op:?}({a})"),
            Expr::Binary(op, a, b) => write!(f, "{op:?}({a}, {b})"),
            Expr::Select {
                op,
                lhs,
                rhs,
                then,
                otherwise,
            } => write!(f, "select({lhs} {op:?} {rhs}, {then}, {otherwise})"),
        }
    }
}

/// A named elementwise formula `out[i] = body(in[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub name: &'static str,
    pub body: Expr,
}

/// `x < 0 ? 0 : x`, propagating NaN.
pub fn relu() -> Formula {
    let x = Expr::input;
    Formula {
        name: "relu",
        body: Expr::select(CmpOp::Lt, x(), Expr::constant(0.0), Expr::constant(0.0), x()),
    }
}

pub fn tanh() -> Formula {
    Formula {
        name: "tanh",
        body: Expr::unary(UnaryFn::Tanh, Expr::input()),
    }
}

/// `1 / (1 + exp(-x))`
pub fn sigmoid() -> Formula {
    let denom = Expr::binary(
        BinaryFn::Add,
        Expr::constant(1.0),
        Expr::unary(UnaryFn::Exp, Expr::unary(UnaryFn::Neg, Expr::input())),
    );
    Formula {
        name: "sigmoid",
        body: Expr::binary(BinaryFn::Div, Expr::constant(1.0), denom),
    }
}

/// `log(z / (1 - z))` where `z` is `x` clamped to `[eps, 1 - eps]` when `eps` is set.
pub fn logit(eps: Option<f32>) -> Formula {
    let z = match eps {
        Some(eps) => {
            let hi = 1.0 - eps;
            Expr::select(
                CmpOp::Lt,
                Expr::input(),
                Expr::constant(eps),
                Expr::constant(eps),
                Expr::select(
                    CmpOp::Gt,
                    Expr::input(),
                    Expr::constant(hi),
                    Expr::constant(hi),
                    Expr::input(),
                ),
            )
        }
        None => Expr::input(),
    };
    let ratio = Expr::binary(
        BinaryFn::Div,
        z.clone(),
        Expr::binary(BinaryFn::Sub, Expr::constant(1.0), z),
    );
    Formula {
        name: "logit",
        body: Expr::unary(UnaryFn::Log, ratio),
    }
}
