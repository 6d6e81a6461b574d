//! searchlink Client Library
//!
//! HTTP client for a multi-node document-search service, with endpoint
//! failover, bounded retries and typed errors.

mod client;
mod dispatcher;
pub mod request;
pub mod transport;

pub use client::{Client, Query};
pub use dispatcher::Dispatcher;
pub use request::{concat, Body, QueryParams, Request, Segment};
pub use reqwest::Method;
pub use searchlink_core::{
    bulk_body, bulk_chunks, BulkAction, BulkOp, ChunkLimits, ClientConfig, EncodeError, Endpoint,
    EndpointPool, PoolSnapshot, Value,
};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError, TransportErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid JSON returned from the service (status {status}): {}", preview(.raw))]
    MalformedResponse { status: u16, raw: Vec<u8> },

    #[error("not found: {error}")]
    NotFound { error: serde_json::Value },

    #[error("already exists ({status}): {error}")]
    AlreadyExists {
        status: u16,
        error: serde_json::Value,
    },

    #[error("non-OK response returned ({status}): {error}")]
    Http {
        status: u16,
        error: serde_json::Value,
    },

    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("response did not have the expected shape: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status for errors that came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound { .. } => Some(404),
            ClientError::AlreadyExists { status, .. }
            | ClientError::Http { status, .. }
            | ClientError::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClientError::AlreadyExists { .. })
    }
}

pub(crate) fn preview(raw: &[u8]) -> String {
    const LIMIT: usize = 200;
    let text = String::from_utf8_lossy(raw);
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
