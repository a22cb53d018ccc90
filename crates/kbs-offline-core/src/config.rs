//! Agent configuration.
//!
//! An `AgentConfig` is an immutable description of one cache version: the
//! application name and version number that tag its partitions, the
//! critical assets fetched at install, the essential files used to report
//! readiness, the strategy used for document requests, and the origin
//! whose absolute URLs share cache entries with plain paths.
//!
//! Defaults are compiled in. A JSON override can be stored at
//! `~/.config/kbs-offline/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for partition names and config/cache directories
pub const APP_NAME: &str = "kbs-calculator";

/// Current cache version. Bumping it invalidates every older partition.
pub const CACHE_VERSION: u32 = 3;

/// Directory name under the user's config/cache directories
pub const DIR_NAME: &str = "kbs-offline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Assets fetched and stored unconditionally at install.
pub const CRITICAL_ASSETS: [&str; 8] = [
    "/",
    "/index.html",
    "/offline.html",
    "/manifest.json",
    "/icon-192x192.png",
    "/icon-512x512.png",
    "/apple-touch-icon.png",
    "/calculator-icon.png",
];

/// Files whose presence in the static partition defines readiness.
pub const ESSENTIAL_FILES: [&str; 3] = ["/", "/index.html", "/manifest.json"];

/// Page served when a document cannot be loaded from cache or network
pub const OFFLINE_PAGE: &str = "/offline.html";

/// How document (page navigation) requests are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStrategy {
    /// Cached page first, network on miss, offline page on failure.
    #[default]
    CacheFirst,
    /// Network first; on failure the offline page for the app shell,
    /// otherwise whatever is cached for the request.
    NetworkFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    app_name: String,
    version: u32,
    critical_assets: Vec<String>,
    essential_files: Vec<String>,
    offline_page: String,
    document_strategy: DocumentStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<Url>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(APP_NAME, CACHE_VERSION)
    }
}

impl AgentConfig {
    pub fn new(app_name: impl Into<String>, version: u32) -> Self {
        Self {
            app_name: app_name.into(),
            version,
            critical_assets: CRITICAL_ASSETS.iter().map(|s| s.to_string()).collect(),
            essential_files: ESSENTIAL_FILES.iter().map(|s| s.to_string()).collect(),
            offline_page: OFFLINE_PAGE.to_string(),
            document_strategy: DocumentStrategy::default(),
            origin: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_critical_assets<S: Into<String>>(mut self, assets: impl IntoIterator<Item = S>) -> Self {
        self.critical_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_essential_files<S: Into<String>>(mut self, files: impl IntoIterator<Item = S>) -> Self {
        self.essential_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_document_strategy(mut self, strategy: DocumentStrategy) -> Self {
        self.document_strategy = strategy;
        self
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn critical_assets(&self) -> &[String] {
        &self.critical_assets
    }

    pub fn essential_files(&self) -> &[String] {
        &self.essential_files
    }

    pub fn offline_page(&self) -> &str {
        &self.offline_page
    }

    pub fn document_strategy(&self) -> DocumentStrategy {
        self.document_strategy
    }

    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// `{app}-static-v{N}`
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-v{}", self.app_name, self.version)
    }

    /// `{app}-dynamic-v{N}`
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-v{}", self.app_name, self.version)
    }

    /// Both partition names owned by this version, static first.
    pub fn cache_names(&self) -> Vec<String> {
        vec![self.static_cache_name(), self.dynamic_cache_name()]
    }

    /// Whether a partition belongs to this version.
    pub fn owns_partition(&self, name: &str) -> bool {
        name == self.static_cache_name() || name == self.dynamic_cache_name()
    }

    /// Load from the default config path, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(DIR_NAME).join(CONFIG_FILE))
    }

    /// Default location of the on-disk cache store.
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(DIR_NAME))
    }
}
