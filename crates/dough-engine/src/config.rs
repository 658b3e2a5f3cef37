//! Engine configuration.
//!
//! Everything the host audio runtime would otherwise fix (sample rate, block
//! size, output width) plus the engine's own policies. Loaded from TOML or
//! built in code; missing fields take their defaults.
//!
//! ```rust
//! use dough_engine::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str("max_polyphony = 16\npooling = false").unwrap();
//! assert_eq!(config.max_polyphony, 16);
//! assert!(!config.pooling);
//! assert_eq!(config.sample_rate, 48000);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per rendered block.
    pub block_size: usize,
    /// Hardware output channels.
    pub output_channels: usize,
    /// Concurrent voice ceiling.
    pub max_polyphony: usize,
    /// Route orbits to their own channel pairs instead of all to 1/2.
    pub multi_channel_routing: bool,
    /// Recycle released nodes instead of destroying them.
    pub pooling: bool,
    /// Seconds a worklet-backed node lives past its declared end.
    pub worklet_grace: f64,
    /// Seconds an evicted voice takes to fade out.
    pub eviction_fade: f64,
    /// Extra seconds before a finished voice is reclaimed.
    pub release_tail: f64,
    /// FFT size of analyser taps.
    pub analyser_fft_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: dough_core::DEFAULT_BLOCK_SIZE,
            output_channels: 2,
            max_polyphony: 128,
            multi_channel_routing: false,
            pooling: true,
            worklet_grace: 0.5,
            eviction_fade: 0.25,
            release_tail: 0.05,
            analyser_fft_size: 2048,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8000..=384_000).contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "sample_rate",
                format!("{} Hz is outside 8000..=384000", self.sample_rate),
            ));
        }
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(ConfigError::invalid(
                "block_size",
                format!("{} frames is outside 1..=8192", self.block_size),
            ));
        }
        if self.output_channels == 0 {
            return Err(ConfigError::invalid("output_channels", "need at least one channel"));
        }
        if self.max_polyphony == 0 {
            return Err(ConfigError::invalid("max_polyphony", "need at least one voice"));
        }
        for (field, value) in [
            ("worklet_grace", self.worklet_grace),
            ("eviction_fade", self.eviction_fade),
            ("release_tail", self.release_tail),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, format!("{value} is not a non-negative time")));
            }
        }
        if !self.analyser_fft_size.is_power_of_two() || self.analyser_fft_size < 32 {
            return Err(ConfigError::invalid(
                "analyser_fft_size",
                format!("{} is not a power of two >= 32", self.analyser_fft_size),
            ));
        }
        Ok(())
    }

    /// Sample rate as used by the DSP code.
    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_polyphony, 128);
        assert_eq!(config.eviction_fade, 0.25);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig {
            max_polyphony: 4,
            multi_channel_routing: true,
            output_channels: 8,
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = EngineConfig::from_toml_str("block_size = 0").unwrap_err();
        assert!(err.to_string().contains("block_size"));
        assert!(EngineConfig::from_toml_str("analyser_fft_size = 1000").is_err());
        assert!(EngineConfig::from_toml_str("eviction_fade = -1.0").is_err());
        assert!(matches!(
            EngineConfig::from_toml_str("max_polyphony = \"many\""),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
