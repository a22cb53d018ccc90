//! Data models for the offline agent.
//!
//! This module contains the values that flow between the host runtime
//! and the agent:
//!
//! - `Request`, `Destination`: intercepted requests and their class
//! - `ResponseSnapshot`: an immutable stored or fetched response
//! - `ControlMessage`, `ControlReply`: out-of-band instructions
//! - `LifecycleState`: where an agent instance is in its lifecycle

pub mod lifecycle;
pub mod message;
pub mod request;
pub mod response;

pub use lifecycle::LifecycleState;
pub use message::{ControlMessage, ControlReply};
pub use request::{Destination, Request};
pub use response::ResponseSnapshot;
