use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid date")]
    InvalidDate,
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type FormatResult<T> = Result<T, FormatError>;
