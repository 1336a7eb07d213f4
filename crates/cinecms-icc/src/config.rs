//! Colour-management settings.
//!
//! Loaded from YAML, with `CINECMS_*` environment variables taking
//! precedence:
//!
//! | variable | field |
//! |---|---|
//! | `CINECMS_UNUSED_TRANSFORMS` | `unused_capacity` |
//! | `CINECMS_MAX_TRANSFORMS` | `max_transform_entries` |
//! | `CINECMS_TEMP_DIR` | `temp_dir` |
//! | `CINECMS_DISPLAY_PROFILE` | `display_profile` |
//! | `CINECMS_PROFILE_PATH` | `profile_dirs` (`:`-separated) |

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::transform_store::StoreLimits;
use crate::{IccError, IccResult, Intent, TransformFlags};

/// Settings of a [`CmsContext`](crate::CmsContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Unused transforms kept in memory before eviction.
    pub unused_capacity: usize,
    /// Transform table size before unreferenced entries are dropped.
    pub max_transform_entries: usize,
    /// Directory for device link files; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// File name prefix of device link files.
    pub temp_prefix: String,
    /// Display profile file.
    pub display_profile: Option<PathBuf>,
    /// Default profile of untagged images.
    pub image_profile: Option<PathBuf>,
    /// Working space profile.
    pub workspace_profile: Option<PathBuf>,
    /// Default proofing profile.
    pub proof_profile: Option<PathBuf>,
    /// Directories searched for profiles.
    pub profile_dirs: Vec<PathBuf>,
    /// Delete stale device link files at start-up.
    pub sweep_on_init: bool,
    /// Default rendering intent.
    pub intent: Intent,
    /// Default proofing intent.
    pub proof_intent: Intent,
    /// Default transform flags.
    pub flags: TransformFlags,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            unused_capacity: 1,
            max_transform_entries: 64,
            temp_dir: None,
            temp_prefix: "cinecms".into(),
            display_profile: None,
            image_profile: None,
            workspace_profile: None,
            proof_profile: None,
            profile_dirs: Vec::new(),
            sweep_on_init: true,
            intent: Intent::Perceptual,
            proof_intent: Intent::AbsoluteColorimetric,
            flags: TransformFlags::empty(),
        }
    }
}

impl CmsConfig {
    /// Loads settings from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> IccResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| IccError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parses YAML settings; missing fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> IccResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| IccError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> IccResult<String> {
        serde_yaml::to_string(self).map_err(|e| IccError::Config(e.to_string()))
    }

    /// Applies `CINECMS_*` environment overrides.
    pub fn with_env(self) -> IccResult<Self> {
        self.with_env_from(|name| env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> IccResult<Self> {
        let parse = |name: &str, value: String| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| IccError::Config(format!("{name}={value} is not a number")))
        };
        if let Some(v) = lookup("CINECMS_UNUSED_TRANSFORMS") {
            self.unused_capacity = parse("CINECMS_UNUSED_TRANSFORMS", v)?;
        }
        if let Some(v) = lookup("CINECMS_MAX_TRANSFORMS") {
            self.max_transform_entries = parse("CINECMS_MAX_TRANSFORMS", v)?;
        }
        if let Some(v) = lookup("CINECMS_TEMP_DIR").filter(|v| !v.is_empty()) {
            self.temp_dir = Some(v.into());
        }
        if let Some(v) = lookup("CINECMS_DISPLAY_PROFILE").filter(|v| !v.is_empty()) {
            self.display_profile = Some(v.into());
        }
        if let Some(v) = lookup("CINECMS_PROFILE_PATH") {
            self.profile_dirs = v.split(':').filter(|p| !p.is_empty()).map(PathBuf::from).collect();
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> IccResult<()> {
        if self.max_transform_entries == 0 {
            return Err(IccError::Config("max_transform_entries must be at least 1".into()));
        }
        if self.temp_prefix.is_empty() || self.temp_prefix.contains(['/', '\\']) {
            return Err(IccError::Config(format!("invalid temp_prefix '{}'", self.temp_prefix)));
        }
        Ok(())
    }

    /// Directory for device link files.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }

    pub(crate) fn limits(&self) -> StoreLimits {
        StoreLimits {
            unused_capacity: self.unused_capacity,
            max_entries: self.max_transform_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CmsConfig::default();
        assert_eq!(config.unused_capacity, 1);
        assert_eq!(config.max_transform_entries, 64);
        assert_eq!(config.temp_prefix, "cinecms");
        assert!(config.sweep_on_init);
    }

    #[test]
    fn test_partial_yaml() {
        let config = CmsConfig::from_yaml_str("unused_capacity: 4\nintent: saturation\n").unwrap();
        assert_eq!(config.unused_capacity, 4);
        assert_eq!(config.intent, Intent::Saturation);
        assert_eq!(config.max_transform_entries, 64);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CmsConfig {
            display_profile: Some("/icc/monitor.icc".into()),
            flags: TransformFlags::BLACK_POINT_COMPENSATION,
            ..CmsConfig::default()
        };
        let back = CmsConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CINECMS_UNUSED_TRANSFORMS", "3"),
            ("CINECMS_PROFILE_PATH", "/a:/b::/c"),
            ("CINECMS_TEMP_DIR", "/scratch"),
        ]
        .into_iter()
        .collect();
        let config = CmsConfig::default()
            .with_env_from(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.unused_capacity, 3);
        assert_eq!(config.profile_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]);
        assert_eq!(config.temp_dir(), PathBuf::from("/scratch"));
    }

    #[test]
    fn test_bad_values() {
        let err = CmsConfig::default()
            .with_env_from(|name| (name == "CINECMS_MAX_TRANSFORMS").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, IccError::Config(_)));
        assert!(CmsConfig::from_yaml_str("max_transform_entries: 0").is_err());
        assert!(CmsConfig::from_yaml_str("temp_prefix: a/b").is_err());
    }
}
