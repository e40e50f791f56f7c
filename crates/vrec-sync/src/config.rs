use std::path::PathBuf;

use vrec_adapters::address::{DEFAULT_CANONICAL_THRESHOLD, DEFAULT_MATCH_THRESHOLD};
use vrec_adapters::ParseOptions;

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.75;
pub const DEFAULT_NAME_WEIGHT: f64 = 0.72;
pub const DEFAULT_ADDRESS_WEIGHT: f64 = 0.28;
pub const DEFAULT_TARGET_CONVERSION: f64 = 0.5;

/// Tunables of one reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pairs scoring below this are dropped after assignment.
    pub acceptance_threshold: f64,
    pub name_weight: f64,
    pub address_weight: f64,
    /// Units sold per visitor that counts as 100% efficiency.
    pub target_conversion: f64,
    pub canonical_threshold: f64,
    pub address_match_threshold: f64,
    pub parse: ParseOptions,
    pub workspace_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            name_weight: DEFAULT_NAME_WEIGHT,
            address_weight: DEFAULT_ADDRESS_WEIGHT,
            target_conversion: DEFAULT_TARGET_CONVERSION,
            canonical_threshold: DEFAULT_CANONICAL_THRESHOLD,
            address_match_threshold: DEFAULT_MATCH_THRESHOLD,
            parse: ParseOptions::default(),
            workspace_root: PathBuf::from("."),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but reading variables through `lookup`.
    /// Values that fail to parse keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let float = |key: &str, default: f64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };
        Self {
            acceptance_threshold: float("VREC_ACCEPTANCE_THRESHOLD", DEFAULT_ACCEPTANCE_THRESHOLD),
            name_weight: float("VREC_NAME_WEIGHT", DEFAULT_NAME_WEIGHT),
            address_weight: float("VREC_ADDRESS_WEIGHT", DEFAULT_ADDRESS_WEIGHT),
            target_conversion: float("VREC_TARGET_CONVERSION", DEFAULT_TARGET_CONVERSION),
            canonical_threshold: float("VREC_CANONICAL_THRESHOLD", DEFAULT_CANONICAL_THRESHOLD),
            address_match_threshold: float(
                "VREC_ADDRESS_MATCH_THRESHOLD",
                DEFAULT_MATCH_THRESHOLD,
            ),
            parse: ParseOptions::default(),
            workspace_root: lookup("VREC_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_environment_gives_defaults() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config.acceptance_threshold, 0.75);
        assert_eq!(config.name_weight, 0.72);
        assert_eq!(config.address_weight, 0.28);
        assert_eq!(config.target_conversion, 0.5);
        assert_eq!(config.canonical_threshold, 0.80);
        assert_eq!(config.address_match_threshold, 0.85);
        assert_eq!(config.workspace_root, PathBuf::from("."));
    }

    #[test]
    fn overrides_apply_and_garbage_is_ignored() {
        let env: HashMap<&str, &str> = [
            ("VREC_ACCEPTANCE_THRESHOLD", "0.6"),
            ("VREC_TARGET_CONVERSION", "not-a-number"),
            ("VREC_NAME_WEIGHT", "inf"),
            ("VREC_WORKSPACE_ROOT", "/srv/vrec"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.acceptance_threshold, 0.6);
        assert_eq!(config.target_conversion, 0.5);
        assert_eq!(config.name_weight, 0.72);
        assert_eq!(config.workspace_root, PathBuf::from("/srv/vrec"));
    }
}
