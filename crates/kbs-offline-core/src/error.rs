use thiserror::Error;

use crate::models::LifecycleState;
use crate::network::NetworkError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to cache critical asset {path}: {reason}")]
    InstallAssetFailure { path: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Cache storage is unavailable on this host")]
    StorageUnavailable,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No active instance controls this scope")]
    NoActiveInstance,

    #[error("Cache version {0} has not been installed")]
    NotInstalled(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Control channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, AgentError>;
