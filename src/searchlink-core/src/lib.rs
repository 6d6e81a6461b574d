//! searchlink Core Library
//!
//! The I/O-free building blocks of the searchlink client:
//! - Value codec for JSON bodies and query strings
//! - Endpoint pool with live/dead tracking
//! - Bulk action records and chunking
//! - Client configuration

pub mod bulk;
pub mod codec;
pub mod config;
pub mod error;
pub mod pool;

// Re-export commonly used types
pub use bulk::{bulk_body, bulk_chunks, BulkAction, BulkChunks, BulkOp, ChunkLimits};
pub use codec::Value;
pub use config::ClientConfig;
pub use error::EncodeError;
pub use pool::{Endpoint, EndpointPool, Pick, PoolSnapshot, MAX_REVIVAL_DELAY};
