//! Error types for the Kabinet control plane

use thiserror::Error;

/// Why a single flavour cannot run on a backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("image {0} not found on this backend")]
    ImageNotFound(String),

    #[error("required {kind} selector not satisfied: {reason}")]
    UnmetSelector { kind: String, reason: String },
}

/// A flavour that was excluded during selection, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub flavour_id: String,
    pub flavour_name: String,
    pub error: RateError,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.flavour_name, self.flavour_id, self.error)
    }
}

/// Joins rejection reasons into one operator-facing message
pub fn describe_rejections(rejections: &[Rejection]) -> String {
    if rejections.is_empty() {
        return "release has no flavours".to_string();
    }
    rejections
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum KabinetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Rate error: {0}")]
    RateError(#[from] RateError),

    #[error("No flavour available for release {release_id}: {}", describe_rejections(.rejections))]
    NoFlavourAvailable {
        release_id: String,
        rejections: Vec<Rejection>,
    },

    #[error("Not implemented by {backend} backend: {operation}")]
    NotImplementedByBackend { backend: String, operation: String },

    #[error("Dispatch lookup error: backend worker has no function {0}")]
    DispatchLookupError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container runtime error: {0}")]
    RuntimeError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Orchestration error: {0}")]
    OrchestrationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KabinetError {
    pub fn not_implemented(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        KabinetError::NotImplementedByBackend {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KabinetError::NotFound(_))
    }
}

impl From<anyhow::Error> for KabinetError {
    fn from(err: anyhow::Error) -> Self {
        KabinetError::Internal(err.to_string())
    }
}
