//! Tessellation configuration, loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_nurbs::SamplingOptions;

use crate::Result;

/// Limits and switches for rebuilding surfaces.
///
/// ```toml
/// max_samples = 256
/// adaptive_fallback = 33
/// cache = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TessellationConfig {
    /// Upper bound on samples per direction.
    pub max_samples: usize,
    /// Sample count substituted for negative (adaptive) tessellation hints.
    /// Unset means `2 * dimension + 1`.
    pub adaptive_fallback: Option<usize>,
    /// Route basis evaluation through the basis cache.
    pub cache: bool,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        let sampling = SamplingOptions::default();
        Self {
            max_samples: sampling.max_samples,
            adaptive_fallback: sampling.adaptive_fallback,
            cache: true,
        }
    }
}

impl TessellationConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The sampler options this configuration implies.
    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            max_samples: self.max_samples,
            adaptive_fallback: self.adaptive_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_defaults() {
        let cfg = TessellationConfig::default();
        assert_eq!(cfg.max_samples, 1024);
        assert_eq!(cfg.adaptive_fallback, None);
        assert!(cfg.cache);
        assert_eq!(TessellationConfig::from_toml_str("").unwrap(), cfg);
    }

    #[test]
    fn test_partial_toml() {
        let cfg = TessellationConfig::from_toml_str("adaptive_fallback = 17\ncache = false\n").unwrap();
        assert_eq!(cfg.max_samples, 1024);
        assert_eq!(cfg.adaptive_fallback, Some(17));
        assert!(!cfg.cache);
        assert_eq!(cfg.sampling_options().adaptive_fallback, Some(17));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = TessellationConfig::from_toml_str("max_sample = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TessellationConfig::load("/nonexistent/tessera.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
