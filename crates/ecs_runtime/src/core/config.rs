//! # Runtime Configuration
//!
//! Tunables for the event bus, the fixed-timestep loop and logging. Every
//! section carries `#[serde(default)]` so partial TOML/RON files load.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// # Event Bus Configuration
///
/// Bounds that keep event cascades and deferred-event feedback loops finite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Maximum nesting of `emit` calls before the innermost one is dropped
    pub max_emit_depth: usize,
    /// Maximum number of queued events processed by a single `flush`
    pub max_flush_events: usize,
    /// Whether emitted events are recorded in the diagnostic history
    pub history_enabled: bool,
    /// History size that triggers compaction down to half
    pub max_history_size: usize,
}

impl EventBusConfig {
    /// Create the default event bus configuration
    pub const fn new() -> Self {
        Self {
            max_emit_depth: 10,
            max_flush_events: 10_000,
            history_enabled: false,
            max_history_size: 1000,
        }
    }

    /// Set maximum emit nesting depth
    pub const fn with_max_emit_depth(mut self, depth: usize) -> Self {
        self.max_emit_depth = depth;
        self
    }

    /// Set the per-flush processing cap
    pub const fn with_max_flush_events(mut self, max: usize) -> Self {
        self.max_flush_events = max;
        self
    }

    /// Enable the history ring with the given capacity
    pub const fn with_history(mut self, max_size: usize) -> Self {
        self.history_enabled = true;
        self.max_history_size = max_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_emit_depth == 0 {
            return Err("Max emit depth must be at least 1".to_string());
        }
        if self.max_flush_events == 0 {
            return Err("Max flush events must be at least 1".to_string());
        }
        if self.max_history_size < 2 {
            return Err("History size must be at least 2".to_string());
        }
        Ok(())
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Loop Configuration
///
/// Fixed-timestep settings for [`crate::game_loop::GameLoop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Simulation rate in fixed updates per second
    pub target_fps: u32,
    /// Upper bound on catch-up updates in a single frame
    pub max_updates_per_frame: u32,
}

impl LoopConfig {
    /// Create the default loop configuration
    pub const fn new() -> Self {
        Self {
            target_fps: 60,
            max_updates_per_frame: 3,
        }
    }

    /// Set target FPS
    pub const fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Set the catch-up bound
    pub const fn with_max_updates_per_frame(mut self, max: u32) -> Self {
        self.max_updates_per_frame = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target_fps == 0 || self.target_fps > 1000 {
            return Err(format!("Target FPS must be within 1..=1000, got {}", self.target_fps));
        }
        if self.max_updates_per_frame == 0 {
            return Err("Max updates per frame must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Runtime Configuration
///
/// Top-level configuration consumed by [`crate::ecs::World::with_config`] and
/// the game loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Default log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Event bus limits
    pub events: EventBusConfig,
    /// Fixed-timestep loop settings
    pub game_loop: LoopConfig,
}

impl RuntimeConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            events: EventBusConfig::default(),
            game_loop: LoopConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the event bus section
    pub fn with_events(mut self, events: EventBusConfig) -> Self {
        self.events = events;
        self
    }

    /// Replace the loop section
    pub fn with_game_loop(mut self, game_loop: LoopConfig) -> Self {
        self.game_loop = game_loop;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("Log level cannot be empty".to_string()));
        }
        self.events.validate().map_err(ConfigError::Invalid)?;
        self.game_loop.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RuntimeConfig {
    fn check(&self) -> Result<(), ConfigError> {
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runtime_limits() {
        let config = RuntimeConfig::default();
        assert_eq!(config.events.max_emit_depth, 10);
        assert_eq!(config.events.max_flush_events, 10_000);
        assert_eq!(config.events.max_history_size, 1000);
        assert!(!config.events.history_enabled);
        assert_eq!(config.game_loop.target_fps, 60);
        assert_eq!(config.game_loop.max_updates_per_frame, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            log_level = "debug"

            [events]
            max_emit_depth = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.events.max_emit_depth, 4);
        assert_eq!(config.events.max_flush_events, 10_000);
        assert_eq!(config.game_loop, LoopConfig::default());
    }

    #[test]
    fn test_ron_section() {
        let config: RuntimeConfig =
            ron::from_str("(game_loop: (target_fps: 30), events: (history_enabled: true))").unwrap();
        assert_eq!(config.game_loop.target_fps, 30);
        assert_eq!(config.game_loop.max_updates_per_frame, 3);
        assert!(config.events.history_enabled);
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let config = RuntimeConfig::new().with_events(EventBusConfig::new().with_max_emit_depth(0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RuntimeConfig::new().with_game_loop(LoopConfig::new().with_target_fps(0));
        assert!(config.validate().is_err());

        let config = RuntimeConfig::new().with_log_level(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_files_with_invalid_limits_are_rejected() {
        let dir = std::env::temp_dir().join(format!("ecs_runtime_invalid_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("runtime.toml");
        std::fs::write(&path, "[game_loop]\ntarget_fps = 0\n").unwrap();
        assert!(matches!(
            RuntimeConfig::load_from_file(&path),
            Err(ConfigError::Invalid(_))
        ));

        let broken = RuntimeConfig::new().with_events(EventBusConfig::new().with_max_flush_events(0));
        let ron_path = dir.join("runtime.ron");
        assert!(matches!(broken.save_to_file(&ron_path), Err(ConfigError::Invalid(_))));
        assert!(!ron_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_round_trip_and_unsupported_extension() {
        let dir = std::env::temp_dir().join(format!("ecs_runtime_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = RuntimeConfig::new()
            .with_log_level("warn")
            .with_game_loop(LoopConfig::new().with_target_fps(120));

        let toml_path = dir.join("runtime.toml");
        config.save_to_file(&toml_path).unwrap();
        assert_eq!(RuntimeConfig::load_from_file(&toml_path).unwrap(), config);

        let ron_path = dir.join("runtime.ron");
        config.save_to_file(&ron_path).unwrap();
        assert_eq!(RuntimeConfig::load_from_file(&ron_path).unwrap(), config);

        let json_path = dir.join("runtime.json");
        assert!(matches!(
            config.save_to_file(&json_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            RuntimeConfig::load_from_file(dir.join("missing.toml")),
            Err(ConfigError::Io(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
