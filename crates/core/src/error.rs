use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("{category} expects {expected} values, got {found}")]
    Arity {
        category: &'static str,
        expected: usize,
        found: usize,
    },
}
