// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SizefitError};
use crate::types::{CompressionProfile, OversizePolicy, SizeBudget};

/// Persistent application settings, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Profile used when the caller does not override DPI or quality.
    pub profile: CompressionProfile,
    /// Behaviour for a single page that exceeds the budget on its own.
    pub oversize_policy: OversizePolicy,
    /// Which compression backend to use.
    pub backend: BackendSettings,
    /// Named destinations and their per-file size limits.
    pub destinations: Vec<Destination>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: CompressionProfile::default(),
            oversize_policy: OversizePolicy::Emit,
            backend: BackendSettings::Local,
            destinations: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        if let BackendSettings::Remote(remote) = &self.backend {
            remote.validate()?;
        }
        for (index, destination) in self.destinations.iter().enumerate() {
            if self.destinations[..index]
                .iter()
                .any(|d| d.name.eq_ignore_ascii_case(&destination.name))
            {
                return Err(SizefitError::Configuration(format!(
                    "destination '{}' is listed twice",
                    destination.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a destination's size limit by name (case-insensitive).
    pub fn budget_for(&self, destination: &str) -> Result<SizeBudget> {
        self.destinations
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(destination))
            .map(|d| d.limit)
            .ok_or_else(|| {
                SizefitError::Configuration(format!("unknown destination '{destination}'"))
            })
    }
}

/// A filing destination that imposes a per-file size ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub limit: SizeBudget,
}

/// Compression backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSettings {
    /// Raster recompression and serialization on this machine.
    Local,
    /// Delegate to a remote compression service.
    Remote(RemoteSettings),
}

/// Connection settings for the remote compression service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the authentication and task-start endpoints.
    pub base_url: String,
    /// Credential exchanged for a bearer token.
    pub credential: String,
    /// Timeout for authentication and task creation, in seconds.
    #[serde(default = "default_short_timeout")]
    pub short_timeout_secs: u64,
    /// Timeout for upload, processing and download, in seconds.
    #[serde(default = "default_long_timeout")]
    pub long_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_short_timeout() -> u64 {
    30
}

fn default_long_timeout() -> u64 {
    120
}

impl RemoteSettings {
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: credential.into(),
            short_timeout_secs: default_short_timeout(),
            long_timeout_secs: default_long_timeout(),
            retry: RetrySettings::default(),
        }
    }

    pub fn short_timeout(&self) -> Duration {
        Duration::from_secs(self.short_timeout_secs)
    }

    pub fn long_timeout(&self) -> Duration {
        Duration::from_secs(self.long_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SizefitError::Configuration(
                "remote backend needs a base URL".into(),
            ));
        }
        if self.credential.trim().is_empty() {
            return Err(SizefitError::Configuration(
                "remote backend needs a credential".into(),
            ));
        }
        if self.short_timeout_secs == 0 || self.long_timeout_secs == 0 {
            return Err(SizefitError::Configuration(
                "remote timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Retry settings for idempotent remote phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Extra attempts after the first failure; 0 disables retrying.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}
