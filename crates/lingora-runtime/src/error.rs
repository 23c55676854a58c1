use thiserror::Error;

use lingora_core::FormatError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no languages registered")]
    NoLanguages,
    #[error(transparent)]
    Format(#[from] FormatError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
