#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration for the pkgdeck core
//!
//! TOML-backed configuration with serde defaults. Every tunable the core
//! consults lives here, including the updater's refresh retry interval,
//! which is a policy knob rather than a constant.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pkgdeck_errors::{ConfigError, Error};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Updater coordination tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// How long to wait before re-trying an upgradeable-set refresh while
    /// a batch is still progressing.
    #[serde(default = "default_refresh_retry_ms")]
    pub refresh_retry_ms: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            refresh_retry_ms: 1000,
        }
    }
}

impl UpdaterConfig {
    #[must_use]
    pub fn refresh_retry_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_retry_ms)
    }
}

/// Search fan-out tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Streams still unfinished after this long get a diagnostic event.
    #[serde(default = "default_slow_stream_secs")]
    pub slow_stream_secs: u64,
    /// Backend whose copy wins when several backends report the same
    /// appstream id. Unset means first-seen wins.
    #[serde(default)]
    pub preferred_backend: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            slow_stream_secs: 5,
            preferred_backend: None,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn slow_stream_threshold(&self) -> Duration {
        Duration::from_secs(self.slow_stream_secs)
    }
}

fn default_refresh_retry_ms() -> u64 {
    1000
}

fn default_slow_stream_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::ReadFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error only when an existing file fails to parse.
    pub async fn load_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(
            config.updater.refresh_retry_interval(),
            Duration::from_secs(1)
        );
        assert_eq!(config.search.slow_stream_threshold(), Duration::from_secs(5));
        assert!(config.search.preferred_backend.is_none());
    }

    #[tokio::test]
    async fn load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[updater]\nrefresh_retry_ms = 250\n\n[search]\npreferred_backend = \"packagekit\"\n"
        )
        .expect("write");

        let config = Config::load(file.path()).await.expect("load");
        assert_eq!(config.updater.refresh_retry_ms, 250);
        assert_eq!(config.search.slow_stream_secs, 5);
        assert_eq!(config.search.preferred_backend.as_deref(), Some("packagekit"));
    }

    #[tokio::test]
    async fn missing_file_is_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/pkgdeck.toml"))
            .await
            .expect("defaults");
        assert_eq!(config.updater.refresh_retry_ms, 1000);
    }
}
