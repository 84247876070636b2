use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine-tunable knobs, loadable from a YAML file the way the teacher's
/// input-mapping config was, but with fields that actually matter to a
/// debugger engine instead of a keymap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default timeout passed to `wait_event` by the CLI driver, in milliseconds.
    pub default_wait_timeout_ms: u32,
    /// Number of consecutive idle samples (see `engine::sampler`) required
    /// before `on_process_idle` fires.
    pub idle_sample_count: u32,
    /// Minimum kernel+user time delta (in 100ns ticks, matching `FILETIME`)
    /// below which a sample counts as idle.
    pub idle_threshold_ticks: u64,
    /// Use friendly register aliases (`eax`, `cr0`, ...) when printing
    /// instructions instead of raw `$N` placeholders.
    pub use_register_aliases: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_wait_timeout_ms: 1000,
            idle_sample_count: 5,
            idle_threshold_ticks: 10_000, // 1ms of combined kernel+user time
            use_register_aliases: true,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_yaml::from_str(&text).map_err(ConfigError::Parse)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
