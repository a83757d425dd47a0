/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Relay Config
//!
//! The Config Store: loads and validates `Settings` from the
//! embedded defaults, an optional file, and environment overrides;
//! hot-reloads on file change via [`watcher`]; and exposes the live
//! snapshot through [`ReloadableConfig`]. Also carries the ambient
//! logging/tracing initialization every other crate relies on.

pub mod reload;
pub mod settings;
pub mod telemetry;
pub mod watcher;

pub use reload::ReloadableConfig;
pub use settings::{
    ConfigChange, DatabaseConfig, MonitoringConfig, NetworkConfig, OptionsConfig, RedisConfig,
    Settings, TelemetryConfig,
};
pub use watcher::{start_config_watcher, ConfigWatcherConfig};
