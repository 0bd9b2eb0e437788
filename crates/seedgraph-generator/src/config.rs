//! Synthesizer configuration.

use seedgraph_core::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of a [`crate::GraphSynthesizer`].
///
/// ```yaml
/// seed: 42
/// recursion_limit: 32
/// object_limit: 10000
/// default_lookback: 1
/// root_include_count: 3
/// leaf_include_count: 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// RNG seed; `None` seeds from the operating system
    pub seed: Option<u64>,

    /// Maximum number of objects on one path from the root, the root
    /// included. Creating an object fails once the ancestry chain already
    /// holds this many ancestors.
    pub recursion_limit: usize,

    /// Maximum number of objects constructed by one `create`
    pub object_limit: usize,

    /// How many ancestors are searched for a reusable match
    pub default_lookback: usize,

    /// Elements created for each collection of the synthesis root
    pub root_include_count: usize,

    /// Elements created for each collection of non-root objects
    pub leaf_include_count: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            recursion_limit: 32,
            object_limit: 10_000,
            default_lookback: 1,
            root_include_count: 3,
            leaf_include_count: 0,
        }
    }
}

impl SynthesizerConfig {
    /// Default configuration with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SynthesizerConfig::default();
        assert_eq!(config.seed, None);
        assert_eq!(config.recursion_limit, 32);
        assert_eq!(config.object_limit, 10_000);
        assert_eq!(config.default_lookback, 1);
        assert_eq!(config.root_include_count, 3);
        assert_eq!(config.leaf_include_count, 0);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SynthesizerConfig::from_yaml("seed: 7\nobject_limit: 10\n").unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.object_limit, 10);
        assert_eq!(config.recursion_limit, 32);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(SynthesizerConfig::from_yaml("recursion_limit: lots").is_err());
    }
}
