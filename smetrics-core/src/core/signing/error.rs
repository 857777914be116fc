use thiserror::Error;

/// The result type for signing actions.
pub type Result<T> = std::result::Result<T, SigningError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SigningError {
    /// The signature of the given input couldn't be generated.
    #[error("failed to generate signature, {0}")]
    GenerateFailed(String),
}
