use serde::{Serialize, Serializer};
use thiserror::Error;

/// Why a single address could not be fetched. `Display` renders the status
/// text that ends up in reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("Timeout")]
    Timeout,
    #[error("Connection Error")]
    ConnectionError,
    #[error("HTTP Error: {0}")]
    HttpError(u16),
    #[error("Error: {0}")]
    OtherError(String),
}

/// Produced exactly once per dispatched address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { body: String, final_url: String },
    Failure { kind: ErrorKind, message: String },
}

impl FetchOutcome {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionStatus {
    Success,
    Failed(ErrorKind),
    /// The batch was cancelled before this address completed.
    NotProcessed,
}

impl DetectionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed(kind) => write!(f, "{kind}"),
            Self::NotProcessed => f.write_str("Not Processed"),
        }
    }
}

impl Serialize for DetectionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EspMatch {
    pub esp: String,
    pub count: usize,
}

impl EspMatch {
    pub fn new(esp: impl Into<String>, count: usize) -> Self {
        Self {
            esp: esp.into(),
            count,
        }
    }
}
