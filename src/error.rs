use thiserror::Error;

/// Failures talking to one of the remote services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with {status}")]
    Status { status: reqwest::StatusCode },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Everything the deposit workflow can surface to the user.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Please select an image of the item.")]
    NoImageSelected,

    #[error("A deposit is already being processed.")]
    CycleInProgress,

    #[error("identity missing")]
    IdentityMissing,

    #[error(transparent)]
    Transport(#[from] ServiceError),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
