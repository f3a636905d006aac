// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};

/// What `send` does with a command issued before the runtime is `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreReadyPolicy {
    /// Log a warning and reject the command with `BridgeError::NotReady`.
    #[default]
    Drop,
    /// Buffer the command and deliver it once the runtime becomes ready.
    Queue,
}

/// Settings shared by every bridge instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where the host page loads the tokenization SDK from.
    pub sdk_url: String,
    /// Name of the global factory function the SDK installs on `window`.
    pub sdk_global: String,
    /// Handling of commands sent while the runtime is still initializing.
    pub pre_ready_policy: PreReadyPolicy,
    /// Upper bound on buffered commands under `PreReadyPolicy::Queue`.
    pub max_queued: usize,
    /// How long `call` waits for a response; `None` waits forever.
    pub call_timeout_ms: Option<u64>,
    /// Capacity of the broadcast channel feeding event subscribers.
    pub event_buffer: usize,
    /// Render the host page with a visible log panel.
    pub debug_page: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sdk_url: "https://js.dlocal.com/direct".into(),
            sdk_global: "dlocal".into(),
            pre_ready_policy: PreReadyPolicy::Drop,
            max_queued: 32,
            call_timeout_ms: Some(30_000),
            event_buffer: 64,
            debug_page: false,
        }
    }
}

impl BridgeConfig {
    /// Load a config from a JSON file and validate it.
    ///
    /// Fields missing from the file take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), "bridge config loaded");
        Ok(config)
    }

    /// Persist the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "bridge config saved");
        Ok(())
    }

    /// Reject settings the bridge cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.sdk_url.trim().is_empty() {
            return Err(BridgeError::Config("sdk_url must not be empty".into()));
        }
        if self.sdk_global.trim().is_empty() {
            return Err(BridgeError::Config("sdk_global must not be empty".into()));
        }
        if self.max_queued == 0 {
            return Err(BridgeError::Config("max_queued must be at least 1".into()));
        }
        if self.event_buffer == 0 {
            return Err(BridgeError::Config("event_buffer must be at least 1".into()));
        }
        Ok(())
    }

    /// `call_timeout_ms` as a `Duration`.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pre_ready_policy, PreReadyPolicy::Drop);
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn empty_sdk_url_is_rejected() {
        let config = BridgeConfig {
            sdk_url: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn zero_queue_is_rejected() {
        let config = BridgeConfig {
            max_queued: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{ "pre_ready_policy": "queue", "max_queued": 4 }"#).unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.pre_ready_policy, PreReadyPolicy::Queue);
        assert_eq!(config.max_queued, 4);
        assert_eq!(config.sdk_global, "dlocal");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        let config = BridgeConfig {
            call_timeout_ms: None,
            debug_page: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{ "sdk_global": "" }"#).unwrap();
        assert!(matches!(BridgeConfig::load(&path), Err(BridgeError::Config(_))));
    }
}
