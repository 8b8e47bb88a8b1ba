/// Configuration management for the flowsync editor core
///
/// Handles the workflow service location, autosave timing, and layout constants.

use crate::layout::Direction;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote workflow service configuration
    pub api: ApiConfig,
    /// Synchronization (autosave) configuration
    pub sync: SyncConfig,
    /// Automatic layout configuration
    pub layout: LayoutConfig,
}

/// Workflow service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the workflow service (e.g., "http://localhost:8081")
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Autosave and synchronization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period after the last local change before a batch save fires
    pub save_interval_ms: u64,
    /// Flow direction used when a freshly loaded workflow is auto-laid-out
    pub default_direction: Direction,
}

/// Layered layout constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Minimum gap between consecutive ranks
    pub rank_sep: f64,
    /// Minimum gap between neighbours within a rank
    pub node_sep: f64,
    /// Nominal rendered node width
    pub node_width: f64,
    /// Nominal rendered node height
    pub node_height: f64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SyncConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            sync: SyncConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("FLOWSYNC_API_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            request_timeout_ms: std::env::var("FLOWSYNC_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .unwrap_or(10_000),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            save_interval_ms: std::env::var("FLOWSYNC_SAVE_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            default_direction: std::env::var("FLOWSYNC_LAYOUT_DIRECTION")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(Direction::TopBottom),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rank_sep: 80.0,
            node_sep: 50.0,
            node_width: 224.0,
            node_height: 80.0,
        }
    }
}
