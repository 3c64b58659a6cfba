use thiserror::Error;

/// Metabolic probe error types
#[derive(Error, Debug)]
pub enum MetabolicsError {
    /// Invalid or missing property value, raised at load or bind time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configured muscle has no counterpart in the live model.
    #[error("Binding error: {0}")]
    Binding(String),

    /// Non-finite or otherwise impossible value during evaluation.
    #[error("Computation error: {0}")]
    Computation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetabolicsError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        MetabolicsError::Configuration(msg.into())
    }

    pub fn binding(msg: impl Into<String>) -> Self {
        MetabolicsError::Binding(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        MetabolicsError::Computation(msg.into())
    }
}

/// Result type for probe operations
pub type MetabolicsResult<T> = Result<T, MetabolicsError>;
