//! Flat, environment-driven configuration for the pipeline engine process.
//!
//! Every field here is documented to operators as a `clap` `env`-backed
//! argument (§10.3: "no file, no CLI flags beyond what `clap`'s `env`
//! derive attribute already exposes as documentation"). There is no
//! layering, no keyring, no XDG discovery — the flat set of fields named
//! in §6 is the whole of it.

use std::time::Duration;

use clap::Parser;

use crate::error::{ConfigError, Result};

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "weft", author, version, about = "Pipeline execution engine")]
pub struct EngineConfig {
    /// `Host` header applied to every request sent to the content-management
    /// host's API.
    #[arg(long, env = "WEFT_API_HOST_HEADER")]
    pub api_host_header: String,

    /// Base URL of the content-management host's API (scheduled-pipeline
    /// listing, pipeline fetch, execution-result callback).
    #[arg(long, env = "WEFT_API_BASE_URL")]
    pub api_base_url: String,

    /// Seconds between scheduler discovery-loop ticks.
    #[arg(long, env = "WEFT_POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// URL the cron-trigger loop issues its independent GET against.
    #[arg(long, env = "WEFT_CRON_URL")]
    pub cron_url: String,

    /// Seconds between cron-trigger loop ticks.
    #[arg(long, env = "WEFT_CRON_INTERVAL_SECS", default_value_t = 60)]
    pub cron_interval_secs: u64,

    /// Port the HTTP surface listens on.
    #[arg(long, env = "WEFT_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Deployment environment name. `"production"` switches the listener
    /// to auto-TLS; any other value uses plain HTTP (§6, §10.3). This
    /// crate only documents and wires that switch — certificate
    /// provisioning is the excluded "TLS termination" concern (§1).
    #[arg(long, env = "WEFT_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Directory the rotating JSON log file is written under.
    #[arg(long, env = "WEFT_LOG_DIR", default_value = "logs")]
    pub log_dir: String,

    /// Raise the console log filter to `debug` for this crate's own
    /// modules.
    #[arg(short, long, env = "WEFT_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    /// Seconds an execution record survives in the store past its
    /// `completed_at` before the eviction sweep removes it.
    #[arg(long, env = "WEFT_RETENTION_SECS", default_value_t = 3600)]
    pub retention_secs: u64,

    /// Seconds between execution-store eviction sweeps.
    #[arg(long, env = "WEFT_CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    pub cleanup_interval_secs: u64,
}

impl EngineConfig {
    /// Parse configuration from the process environment, failing fast
    /// with a `ConfigError` rather than `clap`'s default process-exit
    /// behavior.
    pub fn load() -> Result<Self> {
        Self::try_parse().map_err(ConfigError::Parse)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cron_interval(&self) -> Duration {
        Duration::from_secs(self.cron_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// The execution-store retention window, as the `chrono::Duration`
    /// `ExecutionStore::new` expects.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    /// `production` is the single switch named in §6/§10.3.
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<EngineConfig> {
        EngineConfig::try_parse_from(args).map_err(ConfigError::Parse)
    }

    #[test]
    fn required_fields_must_be_present() {
        let err = parse(&["weft"]);
        assert!(err.is_err());
    }

    #[test]
    fn minimal_valid_config_parses_with_defaults() {
        let config = parse(&[
            "weft",
            "--api-host-header",
            "content-host.internal",
            "--api-base-url",
            "https://content-host.internal/api",
            "--cron-url",
            "https://content-host.internal/cron",
        ])
        .unwrap();

        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
    }

    #[test]
    fn production_environment_is_detected() {
        let config = parse(&[
            "weft",
            "--api-host-header",
            "h",
            "--api-base-url",
            "https://h/api",
            "--cron-url",
            "https://h/cron",
            "--environment",
            "production",
        ])
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn durations_convert_from_seconds() {
        let config = parse(&[
            "weft",
            "--api-host-header",
            "h",
            "--api-base-url",
            "https://h/api",
            "--cron-url",
            "https://h/cron",
            "--poll-interval-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }
}
