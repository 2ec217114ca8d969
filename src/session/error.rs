use crate::llm::chat::BackendError;
use crate::llm::UnavailableReason;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Model unavailable: {0}")]
    Unavailable(UnavailableReason),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(reason) => ChatError::Unavailable(reason),
            other => ChatError::GenerationFailed(other.to_string()),
        }
    }
}

/// What a send did, for every path that is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// A request was already running and this send stopped it.
    Stopped,
    /// The turn ran to the end. Holds the final assistant text.
    Completed(String),
    /// The turn was stopped or reset before it finished.
    Cancelled,
}
