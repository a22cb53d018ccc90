//! Host runtime capability.
//!
//! Whatever runs the agent (a browser shell, a desktop webview, the CLI)
//! implements `Host` to let the agent take control of open pages, ask for
//! an update check, and describe the environment it is running in.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Referrer marker set when the app is launched from an Android home screen
pub const ANDROID_APP_REFERRER: &str = "android-app://";

/// Environment flags the host reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostEnvironment {
    /// The app window is in standalone display mode
    pub display_mode_standalone: bool,
    /// iOS-style `navigator.standalone`
    pub navigator_standalone: bool,
    pub referrer: String,
    /// The host can run a background caching agent at all
    pub supports_agent: bool,
    /// The host can show an install prompt
    pub supports_install_prompt: bool,
    pub online: bool,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            display_mode_standalone: false,
            navigator_standalone: false,
            referrer: String::new(),
            supports_agent: true,
            supports_install_prompt: false,
            online: true,
        }
    }
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Take control of every open client page. Returns how many were claimed.
    async fn claim_clients(&self) -> usize;

    /// Ask the runtime to check the origin for a newer agent version.
    async fn request_update(&self);

    fn environment(&self) -> HostEnvironment;
}

/// Host with no pages to control, used when the agent runs standalone.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    environment: HostEnvironment,
    update_requests: AtomicUsize,
}

impl HeadlessHost {
    pub fn new(environment: HostEnvironment) -> Self {
        Self {
            environment,
            update_requests: AtomicUsize::new(0),
        }
    }

    pub fn update_requests(&self) -> usize {
        self.update_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Host for HeadlessHost {
    async fn claim_clients(&self) -> usize {
        0
    }

    async fn request_update(&self) {
        self.update_requests.fetch_add(1, Ordering::SeqCst);
        info!("Update check requested");
    }

    fn environment(&self) -> HostEnvironment {
        self.environment.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headless_host_counts_updates() {
        let host = HeadlessHost::default();
        assert_eq!(host.claim_clients().await, 0);
        host.request_update().await;
        host.request_update().await;
        assert_eq!(host.update_requests(), 2);
    }

    #[test]
    fn test_environment_defaults_from_partial_json() {
        let env: HostEnvironment = serde_json::from_str(r#"{"displayModeStandalone": true}"#)
            .expect("Failed to parse environment JSON");
        assert!(env.display_mode_standalone);
        assert!(env.supports_agent);
        assert!(env.online);
    }
}
