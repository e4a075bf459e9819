use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("vector width {width} is outside 1..={max}")]
    InvalidWidth { width: usize, max: usize },

    #[error("formula `{formula}` lowers to {len} instructions, limit is {max}")]
    ProgramTooLarge {
        formula: String,
        len: usize,
        max: usize,
    },
}

impl From<CodegenError> for srt::Error {
    fn from(err: CodegenError) -> Self {
        srt::Error::codegen(err.to_string())
    }
}
