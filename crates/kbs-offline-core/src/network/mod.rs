//! Network capability used by the agent to reach the origin.
//!
//! The agent never talks to the network directly; it goes through the
//! `Network` trait so hosts and tests can inject their own transport.
//! `HttpNetwork` is the reqwest-backed implementation.

pub mod error;
pub mod http;

use async_trait::async_trait;

use crate::models::{Request, ResponseSnapshot};

pub use error::NetworkError;
pub use http::HttpNetwork;

#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Any HTTP status is a successful fetch;
    /// only transport-level failures are errors.
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError>;
}
