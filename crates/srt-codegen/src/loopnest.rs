//! Blocked interpreter for lowered programs.
//!
//! Every instruction runs over a block of `width` lanes before the next one
//! starts, so each register is a contiguous run of lanes the optimizer can
//! vectorize. The tail shorter than `width` runs through the same code with
//! fewer lanes.

use std::cell::RefCell;

use crate::lower::{Instr, Program};

thread_local! {
    static SCRATCH: RefCell<Vec<f32>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone)]
pub struct LoopNest {
    program: Program,
    width: usize,
}

impl LoopNest {
    pub fn new(program: Program, width: usize) -> Self {
        Self {
            program,
            width: width.max(1),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `out[i] = program(input[i])`. Slices must have equal length.
    pub fn run(&self, out: &mut [f32], input: &[f32]) {
        let len = out.len().min(input.len());
        let (out, input) = (&mut out[..len], &input[..len]);
        let width = self.width;
        SCRATCH.with(|scratch| {
            let mut scratch = scratch.borrow_mut();
            let needed = self.program.registers() * width;
            if scratch.len() < needed {
                scratch.resize(needed, 0.0);
            }
            let regs = &mut scratch[..needed];

            let mut dst_blocks = out.chunks_exact_mut(width);
            let mut src_blocks = input.chunks_exact(width);
            for (dst, src) in (&mut dst_blocks).zip(&mut src_blocks) {
                self.block(regs, width, dst, src);
            }
            let (dst, src) = (dst_blocks.into_remainder(), src_blocks.remainder());
            if !src.is_empty() {
                self.block(regs, width, dst, src);
            }
        });
    }

    /// Evaluates one block of `src.len() <= stride` lanes.
    fn block(&self, regs: &mut [f32], stride: usize, dst: &mut [f32], src: &[f32]) {
        let lanes = src.len();
        for instr in self.program.instrs() {
            let at = instr.dst() as usize * stride;
            let (done, rest) = regs.split_at_mut(at);
            let (done, out) = (&*done, &mut rest[..lanes]);
            let reg = move |r: u16| &done[r as usize * stride..r as usize * stride + lanes];
            match *instr {
                Instr::Load { .. } => out.copy_from_slice(src),
                Instr::Const { value, .. } => out.fill(value),
                Instr::Unary { f, a, .. } => {
                    for (o, &x) in out.iter_mut().zip(reg(a)) {
                        *o = f.apply(x);
                    }
                }
                Instr::Binary { f, a, b, .. } => {
                    for ((o, &x), &y) in out.iter_mut().zip(reg(a)).zip(reg(b)) {
                        *o = f.apply(x, y);
                    }
                }
                Instr::Select {
                    op,
                    lhs,
                    rhs,
                    then,
                    otherwise,
                    ..
                } => {
                    let (l, r, t, e) = (reg(lhs), reg(rhs), reg(then), reg(otherwise));
                    for (i, o) in out.iter_mut().enumerate() {
                        *o = if op.apply(l[i], r[i]) { t[i] } else { e[i] };
                    }
                }
            }
        }
        let result = self.program.result() as usize * stride;
        dst.copy_from_slice(&regs[result..result + lanes]);
    }
}
