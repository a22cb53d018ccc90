//! Offline caching agent for the KBS rental calculator.
//!
//! The agent sits between the app and the network. It keeps versioned
//! cache partitions, answers intercepted requests from cache or network
//! depending on what is being loaded, and tells the UI how ready the app
//! is to work offline.
//!
//! - `Registration` drives install -> activate and routes requests to the
//!   version in control
//! - `OfflineAgent` is one cache version reacting to host events
//! - `strategy` picks and runs cache-first / network-first per request
//! - `CacheManager` enforces what may be stored, over a `CacheStorage`
//! - `control` carries out-of-band messages such as skip-waiting
//! - `ReadinessReporter` answers the UI's status queries
//!
//! Hosts supply the network, storage and runtime through `Capabilities`.

pub mod agent;
pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod host;
pub mod models;
pub mod network;
pub mod readiness;
pub mod registration;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Capabilities, OfflineAgent};
pub use cache::{CacheManager, CacheStorage, DiskStorage, MemoryStorage};
pub use config::{AgentConfig, DocumentStrategy};
pub use control::{ControlListener, ControlSender};
pub use error::{AgentError, Result};
pub use events::{AgentEvent, EventSink, RecordingSink, TracingSink};
pub use host::{HeadlessHost, Host, HostEnvironment};
pub use models::{ControlMessage, ControlReply, Destination, LifecycleState, Request, ResponseSnapshot};
pub use network::{HttpNetwork, Network, NetworkError};
pub use readiness::{CacheInfo, PwaStatus, ReadinessReporter};
pub use registration::Registration;
pub use strategy::{FetchOutcome, Intercept, Strategy};
