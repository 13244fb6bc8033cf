use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures surfaced by the prediction, explanation and drift paths.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Model not loaded.")]
    ModelUnavailable,

    #[error("Explainer not loaded.")]
    ExplainerUnavailable,

    #[error("baseline statistics unavailable: {0}")]
    BaselineUnavailable(String),

    #[error("malformed baseline statistics: {0}")]
    MalformedBaseline(String),

    #[error("no delivery durations supplied")]
    EmptyBatch,

    #[error("incompatible model artifact: {0}")]
    IncompatibleArtifact(String),

    #[error("non-finite input: {0}")]
    NonFiniteInput(String),
}
