//! Lowering of formula trees into a straight-line register program.

use std::collections::HashMap;
use std::fmt;

use srt::codegen::{BinaryFn, CmpOp, Expr, UnaryFn};

/// Virtual register; registers are assigned in definition order.
pub type Reg = u16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instr {
    Load { dst: Reg },
    Const { dst: Reg, value: f32 },
    Unary { dst: Reg, f: UnaryFn, a: Reg },
    Binary { dst: Reg, f: BinaryFn, a: Reg, b: Reg },
    Select { dst: Reg, op: CmpOp, lhs: Reg, rhs: Reg, then: Reg, otherwise: Reg },
}

impl Instr {
    pub fn dst(&self) -> Reg {
        match *self {
            Instr::Load { dst }
            | Instr::Const { dst, .. }
            | Instr::Unary { dst, .. }
            | Instr::Binary { dst, .. }
            | Instr::Select { dst, .. } => dst,
        }
    }
}

/// SSA program: every instruction writes a fresh register that is greater than
/// all of its operands. The last instruction produces the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instrs: Vec<Instr>,
}

impl Program {
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn registers(&self) -> usize {
        self.instrs.len()
    }

    pub fn result(&self) -> Reg {
        self.instrs.last().map_or(0, Instr::dst)
    }

    /// Scalar interpretation, used as the single-lane reference.
    pub fn eval(&self, x: f32) -> f32 {
        let mut regs = vec![0.0f32; self.registers()];
        for instr in &self.instrs {
            let v = match *instr {
                Instr::Load { .. } => x,
                Instr::Const { value, .. } => value,
                Instr::Unary { f, a, .. } => f.apply(regs[a as usize]),
                Instr::Binary { f, a, b, .. } => f.apply(regs[a as usize], regs[b as usize]),
                Instr::Select {
                    op,
                    lhs,
                    rhs,
                    then,
                    otherwise,
                    ..
                } => {
                    if op.apply(regs[lhs as usize], regs[rhs as usize]) {
                        regs[then as usize]
                    } else {
                        regs[otherwise as usize]
                    }
                }
            };
            regs[instr.dst() as usize] = v;
        }
        regs.get(self.result() as usize).copied().unwrap_or(x)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instrs {
            match instr {
                Instr::Load { dst } => writeln!(f, "  r{dst} = load x")?,
                Instr::Const { dst, value } => writeln!(f, "  r{dst} = const {value}")?,
                Instr::Unary { dst, f: op, a } => writeln!(f, "  r{dst} = {op:?} r{a}")?,
                Instr::Binary { dst, f: op, a, b } => {
                    writeln!(f, "  r{dst} = {op:?} r{a}, r{b}")?
                }
                Instr::Select {
                    dst,
                    op,
                    lhs,
                    rhs,
                    then,
                    otherwise,
                } => writeln!(
                    f,
                    "  r{dst} = select r{lhs} {op:?} r{rhs} ? r{then} : r{otherwise}"
                )?,
            }
        }
        write!(f, "  ret r{}", self.result())
    }
}

/// Structural key for common-subexpression reuse; constants compare by bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Load,
    Const(u32),
    Unary(UnaryFn, Reg),
    Binary(BinaryFn, Reg, Reg),
    Select(CmpOp, Reg, Reg, Reg, Reg),
}

#[derive(Default)]
struct Lowering {
    instrs: Vec<Instr>,
    seen: HashMap<Key, Reg>,
}

impl Lowering {
    fn emit(&mut self, key: Key, make: impl FnOnce(Reg) -> Instr) -> Reg {
        if let Some(&reg) = self.seen.get(&key) {
            return reg;
        }
        let dst = self.instrs.len() as Reg;
        self.instrs.push(make(dst));
        self.seen.insert(key, dst);
        dst
    }

    fn lower(&mut self, expr: &Expr) -> Reg {
        match expr {
            Expr::Input => self.emit(Key::Load, |dst| Instr::Load { dst }),
            Expr::Const(value) => {
                let value = *value;
                self.emit(Key::Const(value.to_bits()), |dst| Instr::Const { dst, value })
            }
            Expr::Unary(f, a) => {
                let (f, a) = (*f, self.lower(a));
                self.emit(Key::Unary(f, a), |dst| Instr::Unary { dst, f, a })
            }
            Expr::Binary(f, a, b) => {
                let f = *f;
                let a = self.lower(a);
                let b = self.lower(b);
                self.emit(Key::Binary(f, a, b), |dst| Instr::Binary { dst, f, a, b })
            }
            Expr::Select {
                op,
                lhs,
                rhs,
                then,
                otherwise,
            } => {
                let op = *op;
                let lhs = self.lower(lhs);
                let rhs = self.lower(rhs);
                let then = self.lower(then);
                let otherwise = self.lower(otherwise);
                self.emit(Key::Select(op, lhs, rhs, then, otherwise), |dst| {
                    Instr::Select {
                        dst,
                        op,
                        lhs,
                        rhs,
                        then,
                        otherwise,
                    }
                })
            }
        }
    }
}

/// Lowers `expr`, sharing identical subtrees. The returned program ends with the
/// instruction producing the value of `expr`.
pub fn lower(expr: &Expr) -> Program {
    let mut lowering = Lowering::default();
    // a tree never contains itself, so the root is always the last emission
    let result = lowering.lower(expr);
    debug_assert_eq!(lowering.instrs.last().map(Instr::dst), Some(result));
    Program {
        instrs: lowering.instrs,
    }
}
