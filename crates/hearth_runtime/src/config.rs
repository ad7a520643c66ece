//! Runtime configuration
//!
//! ```toml
//! # hearth.toml
//! max_render_passes = 500
//! trace_renders = true
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Default cap on re-renders of one component within a flush
pub const DEFAULT_MAX_RENDER_PASSES: usize = 1000;

/// Tunables of a [`Runtime`](crate::Runtime)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Re-renders one component may take within a flush before giving up with
    /// [`RuntimeError::UpdateDepthExceeded`](crate::RuntimeError::UpdateDepthExceeded)
    pub max_render_passes: usize,
    /// Emit a `trace!` event for every component render
    pub trace_renders: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_render_passes: DEFAULT_MAX_RENDER_PASSES,
            trace_renders: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_render_passes == 0 {
            return Err(ConfigError::Invalid(
                "max_render_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("runtime config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid runtime config: {0}")]
    Invalid(String),
}
