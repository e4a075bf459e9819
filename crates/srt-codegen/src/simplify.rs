//! Constant folding and exact algebraic identities over formula trees.
//!
//! Rewrites never change a result bit: folding evaluates with the same `f32`
//! operations the generated loop would use, and only identities that hold for
//! every IEEE input (signed zeros and NaN included) are applied.

use srt::codegen::{BinaryFn, Expr, UnaryFn};

pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Input | Expr::Const(_) => expr.clone(),
        Expr::Unary(f, a) => simplify_unary(*f, simplify(a)),
        Expr::Binary(f, a, b) => simplify_binary(*f, simplify(a), simplify(b)),
        Expr::Select {
            op,
            lhs,
            rhs,
            then,
            otherwise,
        } => {
            let (lhs, rhs) = (simplify(lhs), simplify(rhs));
            let (then, otherwise) = (simplify(then), simplify(otherwise));
            if let (Expr::Const(l), Expr::Const(r)) = (&lhs, &rhs) {
                return if op.apply(*l, *r) { then } else { otherwise };
            }
            if then == otherwise {
                return then;
            }
            Expr::select(*op, lhs, rhs, then, otherwise)
        }
    }
}

fn simplify_unary(f: UnaryFn, a: Expr) -> Expr {
    match (f, a) {
        (_, Expr::Const(c)) => Expr::Const(f.apply(c)),
        (UnaryFn::Neg, Expr::Unary(UnaryFn::Neg, inner)) => *inner,
        (UnaryFn::Abs, Expr::Unary(UnaryFn::Abs, inner)) => Expr::unary(UnaryFn::Abs, *inner),
        (f, a) => Expr::unary(f, a),
    }
}

fn is_const(e: &Expr, value: f32) -> bool {
    matches!(e, Expr::Const(c) if c.to_bits() == value.to_bits())
}

fn simplify_binary(f: BinaryFn, a: Expr, b: Expr) -> Expr {
    if let (Expr::Const(x), Expr::Const(y)) = (&a, &b) {
        return Expr::Const(f.apply(*x, *y));
    }
    match f {
        BinaryFn::Mul if is_const(&b, 1.0) => a,
        BinaryFn::Mul if is_const(&a, 1.0) => b,
        BinaryFn::Div if is_const(&b, 1.0) => a,
        BinaryFn::Sub if is_const(&b, 0.0) => a,
        BinaryFn::Add if is_const(&b, -0.0) => a,
        BinaryFn::Add if is_const(&a, -0.0) => b,
        _ => Expr::binary(f, a, b),
    }
}
