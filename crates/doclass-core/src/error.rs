use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("duplicate label in mapping: {0}")]
    DuplicateLabel(String),

    #[error("embedding for {path} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },
}
