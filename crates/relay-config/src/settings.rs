/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Relay Config Module
//!
//! `Settings` is the validated, deserialized shape of the
//! configuration file described in the External Interfaces component.
//! Loading order (later wins): the embedded `default.json`, an
//! optional file path, then a fixed list of environment variables
//! applied field-by-field — unlike most of this codebase's ambient
//! config, these env vars do not follow a generic `SECTION__FIELD`
//! convention, so each is applied by name rather than through the
//! `config` crate's generic `Environment` source.

use config::{Config, ConfigError, File, FileFormat};
use relay_types::Subscription;
use serde::{Deserialize, Serialize};

const DEFAULT_SETTINGS: &str = include_str!("../default.json");

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug"];

/// The fully validated configuration for one relay process.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub network: NetworkConfig,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub monitoring: MonitoringConfig,
    pub options: OptionsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    pub chain_id: u64,
    pub confirmations: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
    pub ttl: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
    pub health_check_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptionsConfig {
    pub max_concurrent_webhooks: u32,
    pub default_retry_attempts: u32,
    pub default_retry_delay: u64,
    pub webhook_timeout: u64,
    pub queue_processing_interval: u64,
}

/// Not part of the webhook configuration contract; carried so the
/// ambient tracing stack has somewhere to read its OTLP settings
/// from, resolved the same way the rest of `monitoring` is.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_sampling_rate() -> f64 {
    0.1
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            sampling_rate: default_sampling_rate(),
        }
    }
}

/// One detected difference between a previous and a reloaded
/// configuration, surfaced to the admin reload endpoint and the log.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigChange {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
}

impl Settings {
    /// Loads settings from the embedded defaults, an optional file,
    /// then environment variable overrides, and validates the result.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Json));

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path));
        }

        let builder = apply_env_overrides(builder)?;
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }

    /// Validation rules enumerated in the Config Store component.
    pub fn validate(&self) -> Result<(), String> {
        validate_rpc_url(&self.network.rpc_url)?;
        if let Some(ws) = &self.network.ws_url {
            match url::Url::parse(ws) {
                Ok(u) if u.scheme() == "ws" || u.scheme() == "wss" => {}
                _ => return Err(format!("network.wsUrl is not a valid ws/wss URL: {ws}")),
            }
        }
        if self.network.chain_id == 0 {
            return Err("network.chainId must be positive".to_string());
        }
        // confirmations is u64, always >= 0.

        if !self.database.url.starts_with("postgres://") && !self.database.url.starts_with("postgresql://") {
            return Err(format!(
                "database.url does not look like a Postgres connection string: {}",
                self.database.url
            ));
        }
        if self.database.pool_size == 0 {
            return Err("database.poolSize must be positive".to_string());
        }
        if self.database.connection_timeout == 0 {
            return Err("database.connectionTimeout must be positive".to_string());
        }

        if let Some(redis) = &self.redis {
            if redis.ttl == 0 {
                return Err("redis.ttl must be positive".to_string());
            }
        }

        for sub in &self.subscriptions {
            sub.validate()?;
        }

        if !VALID_LOG_LEVELS.contains(&self.monitoring.log_level.as_str()) {
            return Err(format!(
                "monitoring.logLevel must be one of {VALID_LOG_LEVELS:?}, got {}",
                self.monitoring.log_level
            ));
        }
        if self.monitoring.health_check_port == 0 {
            return Err("monitoring.healthCheckPort must be in 1..=65535".to_string());
        }

        if self.options.max_concurrent_webhooks == 0 {
            return Err("options.maxConcurrentWebhooks must be positive".to_string());
        }
        // defaultRetryAttempts is the one tuning knob allowed to be 0.
        if self.options.default_retry_delay == 0 {
            return Err("options.defaultRetryDelay must be positive".to_string());
        }
        if self.options.webhook_timeout == 0 {
            return Err("options.webhookTimeout must be positive".to_string());
        }
        if self.options.queue_processing_interval == 0 {
            return Err("options.queueProcessingInterval must be positive".to_string());
        }

        Ok(())
    }

    /// Computes the field-by-field diff between two configurations,
    /// restricted to the top-level scalar fields an operator cares
    /// about when confirming a reload took effect.
    pub fn diff(&self, other: &Settings) -> Vec<ConfigChange> {
        let mut changes = Vec::new();
        macro_rules! check {
            ($key:expr, $old:expr, $new:expr) => {
                if $old != $new {
                    changes.push(ConfigChange {
                        key: $key.to_string(),
                        old_value: format!("{:?}", $old),
                        new_value: format!("{:?}", $new),
                    });
                }
            };
        }
        check!("network.rpcUrl", self.network.rpc_url, other.network.rpc_url);
        check!("network.wsUrl", self.network.ws_url, other.network.ws_url);
        check!("network.chainId", self.network.chain_id, other.network.chain_id);
        check!(
            "network.confirmations",
            self.network.confirmations,
            other.network.confirmations
        );
        check!(
            "subscriptions",
            self.subscriptions.len(),
            other.subscriptions.len()
        );
        check!("database.url", self.database.url, other.database.url);
        check!(
            "monitoring.logLevel",
            self.monitoring.log_level,
            other.monitoring.log_level
        );
        check!(
            "monitoring.metricsEnabled",
            self.monitoring.metrics_enabled,
            other.monitoring.metrics_enabled
        );
        check!(
            "options.maxConcurrentWebhooks",
            self.options.max_concurrent_webhooks,
            other.options.max_concurrent_webhooks
        );
        changes
    }
}

fn validate_rpc_url(raw: &str) -> Result<(), String> {
    match url::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https" | "ws" | "wss") => Ok(()),
        _ => Err(format!("network.rpcUrl is not a valid http/https/ws/wss URL: {raw}")),
    }
}

/// Applies the fixed set of environment variable overrides named in
/// the External Interfaces component. Each is independent: unset
/// vars never erase a value already present from defaults or file.
fn apply_env_overrides(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    macro_rules! set_str {
        ($env:literal, $key:literal) => {
            if let Ok(v) = std::env::var($env) {
                builder = builder.set_override($key, v)?;
            }
        };
    }
    macro_rules! set_parsed {
        ($env:literal, $key:literal, $ty:ty) => {
            if let Ok(v) = std::env::var($env) {
                match v.parse::<$ty>() {
                    Ok(parsed) => {
                        builder = builder.set_override($key, parsed as i64)?;
                    }
                    Err(_) => return Err(ConfigError::Message(format!("{} is not a valid number: {v}", $env))),
                }
            }
        };
    }
    macro_rules! set_bool {
        ($env:literal, $key:literal) => {
            if let Ok(v) = std::env::var($env) {
                match v.to_lowercase().as_str() {
                    "true" | "1" => builder = builder.set_override($key, true)?,
                    "false" | "0" => builder = builder.set_override($key, false)?,
                    _ => return Err(ConfigError::Message(format!("{} is not a valid bool: {v}", $env))),
                }
            }
        };
    }

    set_str!("RPC_URL", "network.rpc_url");
    set_str!("WS_URL", "network.ws_url");
    set_parsed!("CHAIN_ID", "network.chain_id", u64);
    set_parsed!("CONFIRMATIONS", "network.confirmations", u64);
    set_str!("DATABASE_URL", "database.url");
    set_parsed!("DATABASE_POOL_SIZE", "database.pool_size", u32);
    set_parsed!("DATABASE_CONNECTION_TIMEOUT", "database.connection_timeout", u64);
    set_str!("REDIS_URL", "redis.url");
    set_str!("REDIS_KEY_PREFIX", "redis.key_prefix");
    set_parsed!("REDIS_TTL", "redis.ttl", u64);
    set_str!("LOG_LEVEL", "monitoring.log_level");
    set_bool!("METRICS_ENABLED", "monitoring.metrics_enabled");
    set_parsed!("HEALTH_CHECK_PORT", "monitoring.health_check_port", u16);
    set_parsed!("MAX_CONCURRENT_WEBHOOKS", "options.max_concurrent_webhooks", u32);
    set_parsed!("DEFAULT_RETRY_ATTEMPTS", "options.default_retry_attempts", u32);
    set_parsed!("DEFAULT_RETRY_DELAY", "options.default_retry_delay", u64);
    set_parsed!("WEBHOOK_TIMEOUT", "options.webhook_timeout", u64);
    set_parsed!("QUEUE_PROCESSING_INTERVAL", "options.queue_processing_interval", u64);

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "RPC_URL", "WS_URL", "CHAIN_ID", "CONFIRMATIONS", "DATABASE_URL",
            "DATABASE_POOL_SIZE", "DATABASE_CONNECTION_TIMEOUT", "REDIS_URL",
            "REDIS_KEY_PREFIX", "REDIS_TTL", "LOG_LEVEL", "METRICS_ENABLED",
            "HEALTH_CHECK_PORT", "MAX_CONCURRENT_WEBHOOKS", "DEFAULT_RETRY_ATTEMPTS",
            "DEFAULT_RETRY_DELAY", "WEBHOOK_TIMEOUT", "QUEUE_PROCESSING_INTERVAL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_load_and_validate() {
        clear_env();
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.network.chain_id, 1);
        assert_eq!(settings.options.max_concurrent_webhooks, 10);
        assert!(settings.subscriptions.is_empty());
    }

    #[test]
    #[serial]
    fn env_override_wins_over_default() {
        clear_env();
        std::env::set_var("CHAIN_ID", "42");
        std::env::set_var("MAX_CONCURRENT_WEBHOOKS", "25");
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.network.chain_id, 42);
        assert_eq!(settings.options.max_concurrent_webhooks, 25);
        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_log_level_fails_validation() {
        clear_env();
        std::env::set_var("LOG_LEVEL", "verbose");
        let result = Settings::load(None);
        assert!(result.is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn unset_env_never_erases_default() {
        clear_env();
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.database.pool_size, 10);
    }

    #[test]
    fn diff_detects_changed_chain_id() {
        clear_env();
        let a = Settings::load(None).unwrap();
        let mut b = a.clone();
        b.network.chain_id = 99;
        let changes = a.diff(&b);
        assert!(changes.iter().any(|c| c.key == "network.chainId"));
    }
}
