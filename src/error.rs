use thiserror::Error;

#[derive(Error, Debug)]
pub enum PfError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid PDF Parameters: {0}")]
    InvalidParameters(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Evolution engine used before initialization")]
    NotInitialized,

    #[error("Evolution engine is already initialized")]
    AlreadyInitialized,

    #[error("Stale evolution handle {handle} (current generation {current})")]
    StaleHandle { handle: u64, current: u64 },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Numerical Error: {0}")]
    Computation(String),
}

impl PfError {
    /// Errors after which the shared numerical state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PfError::Config(_)
                | PfError::NotInitialized
                | PfError::AlreadyInitialized
                | PfError::StaleHandle { .. }
                | PfError::LockPoisoned(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for PfError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PfError::LockPoisoned(e.to_string())
    }
}

pub type PfResult<T> = Result<T, PfError>;
