/// Board configuration.
/// Read from a JSON file supplied by the host application; every field has a default.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    /// Page sizes the user may pick from.
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Upper bound on store requests in flight across all stages.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Per-request timeout; `None` waits indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Capacity of the board event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_page_size_options() -> Vec<usize> {
    vec![10, 25, 50, 100]
}

fn default_page_size() -> usize {
    25
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_event_buffer() -> usize {
    256
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            page_size_options: default_page_size_options(),
            default_page_size: default_page_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_ms: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl BoardConfig {
    pub fn allows_page_size(&self, page_size: usize) -> bool {
        self.page_size_options.contains(&page_size)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size_options.is_empty() {
            return Err(ConfigError::NoPageSizes);
        }
        if self.page_size_options.contains(&0) {
            return Err(ConfigError::ZeroPageSize);
        }
        if !self.allows_page_size(self.default_page_size) {
            return Err(ConfigError::DefaultPageSizeNotAllowed(self.default_page_size));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::ZeroEventBuffer);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("pageSizeOptions must not be empty")]
    NoPageSizes,

    #[error("pageSizeOptions must not contain 0")]
    ZeroPageSize,

    #[error("defaultPageSize {0} is not one of pageSizeOptions")]
    DefaultPageSizeNotAllowed(usize),

    #[error("maxConcurrentRequests must be at least 1")]
    ZeroConcurrency,

    #[error("eventBuffer must be at least 1")]
    ZeroEventBuffer,
}

/// Load config from path. Returns defaults if the file is missing, unparsable or invalid.
pub fn load_config(path: &Path) -> BoardConfig {
    let config = match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<BoardConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(target: "crewboard.config", "Failed to parse config {}: {}", path.display(), e);
                return BoardConfig::default();
            }
        },
        Err(_) => {
            log::info!(target: "crewboard.config", "No config at {}, using defaults", path.display());
            return BoardConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::warn!(target: "crewboard.config", "Invalid config {}: {}", path.display(), e);
            BoardConfig::default()
        }
    }
}
