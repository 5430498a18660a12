//! Engine configuration
//!
//! All knobs the steps and supervisor consume are injected through
//! [`EngineConfig`] at construction time; nothing reads ambient globals. The
//! config loads from an optional `cartful.toml` and every field has a default,
//! so a zero-config run works.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration injected into the engine, supervisor, and steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on one full step execution
    #[serde(default = "default_step_timeout", with = "humantime_serde")]
    pub step_timeout: Duration,

    /// Upper bound on a single catalog/collaborator call inside a step
    #[serde(default = "default_lookup_timeout", with = "humantime_serde")]
    pub lookup_timeout: Duration,

    /// Serving count assumed when the request does not specify one
    #[serde(default = "default_people")]
    pub default_people: u32,

    /// Flat per-item price estimate used when a catalog lookup fails
    #[serde(default = "default_fallback_unit_price")]
    pub fallback_unit_price: f64,

    /// Quantity floor the optimizer reduces toward before dropping an item
    #[serde(default = "default_min_quantity")]
    pub min_quantity: u32,
}

fn default_step_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_lookup_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_people() -> u32 {
    4
}

fn default_fallback_unit_price() -> f64 {
    3.49
}

fn default_min_quantity() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: default_step_timeout(),
            lookup_timeout: default_lookup_timeout(),
            default_people: default_people(),
            fallback_unit_price: default_fallback_unit_price(),
            min_quantity: default_min_quantity(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, falling back to defaults when `path` is `None`
    /// or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    fn validate(&self) -> Result<()> {
        if !self.fallback_unit_price.is_finite() || self.fallback_unit_price < 0.0 {
            return Err(Error::config(
                "fallback_unit_price must be a non-negative number",
            ));
        }
        if self.default_people == 0 {
            return Err(Error::config("default_people must be at least 1"));
        }
        if self.min_quantity == 0 {
            return Err(Error::config("min_quantity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file_given() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.default_people, 4);
        assert_eq!(config.step_timeout, Duration::from_secs(30));
        assert_eq!(config.min_quantity, 1);
    }

    #[test]
    fn loads_partial_toml_with_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "step_timeout = \"10s\"\nfallback_unit_price = 2.99").unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert!((config.fallback_unit_price - 2.99).abs() < 1e-9);
        assert_eq!(config.default_people, 4);
    }

    #[test]
    fn rejects_negative_fallback_price() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fallback_unit_price = -1.0").unwrap();
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("fallback_unit_price"));
    }

    #[test]
    fn rejects_zero_min_quantity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_quantity = 0").unwrap();
        let err = EngineConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load(Some(Path::new("/nonexistent/cartful.toml"))).unwrap();
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
    }
}
