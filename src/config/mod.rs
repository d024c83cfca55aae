//! Configuration merge system
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or ~/.config/omws/client.toml when present)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{BuiltinDefaults, PresencePoint, DEFAULT_LAYERS, DEFAULT_REQUIRED_ALGORITHM};
pub use effective::{
    default_config_path, CheckSettings, ClientConfig, ConfigError, ConfigOrigin, ConfigSource,
    EffectiveConfig, HttpSettings,
};
pub use merge::{deep_merge, merge_layers};
