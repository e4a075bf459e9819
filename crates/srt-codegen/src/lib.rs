//! Reference code generator for srt's vectorized elementwise kernels.
//!
//! Formulas are simplified, lowered to a register program and executed by a
//! blocked loop nest whose block size is the requested vector width.

mod error;
mod loopnest;
mod lower;
mod simplify;

use srt::codegen::{CodegenBackend, CompiledRoutine, Formula};
use tracing::debug;

pub use error::CodegenError;
pub use loopnest::LoopNest;
pub use lower::{lower, Instr, Program, Reg};
pub use simplify::simplify;

/// Widest block a routine may use.
pub const MAX_VECTOR_WIDTH: usize = 64;

/// Longest lowered program accepted.
pub const MAX_PROGRAM_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopNestBackend;

impl LoopNestBackend {
    pub fn new() -> Self {
        Self
    }

    /// Builds the loop nest for `formula` without wrapping it in a routine.
    pub fn build(&self, formula: &Formula, width: usize) -> Result<LoopNest, CodegenError> {
        if width == 0 || width > MAX_VECTOR_WIDTH {
            return Err(CodegenError::InvalidWidth {
                width,
                max: MAX_VECTOR_WIDTH,
            });
        }
        let body = simplify(&formula.body);
        // bounds the register count before lowering assigns `Reg` indices
        let len = body.size();
        let program = (len <= Reg::MAX as usize).then(|| lower(&body));
        match program {
            Some(program) if program.len() <= MAX_PROGRAM_LEN => {
                debug!(
                    formula = formula.name,
                    width,
                    instrs = program.len(),
                    "lowered formula"
                );
                Ok(LoopNest::new(program, width))
            }
            other => Err(CodegenError::ProgramTooLarge {
                formula: formula.name.to_string(),
                len: other.map_or(len, |p| p.len()),
                max: MAX_PROGRAM_LEN,
            }),
        }
    }
}

impl CodegenBackend for LoopNestBackend {
    fn name(&self) -> &str {
        "loopnest"
    }

    fn compile(&self, formula: &Formula, vector_width: usize) -> srt::Result<CompiledRoutine> {
        let nest = self.build(formula, vector_width)?;
        Ok(CompiledRoutine::new(formula.name, vector_width, move |out, input| {
            nest.run(out, input)
        }))
    }
}
