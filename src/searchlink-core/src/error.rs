use thiserror::Error;

/// A value that has no representation in the requested wire format.
///
/// Raised synchronously while a request is being prepared, so a request that
/// fails to encode never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cannot represent {kind} in a query string")]
    QueryString { kind: &'static str },

    #[error("cannot represent {kind} in JSON: {reason}")]
    Json { kind: &'static str, reason: String },
}

impl EncodeError {
    /// Name of the value kind that failed to encode
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::QueryString { kind } | EncodeError::Json { kind, .. } => kind,
        }
    }
}
