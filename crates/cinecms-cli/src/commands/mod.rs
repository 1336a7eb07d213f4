//! CLI command implementations

pub mod apply;
pub mod info;
pub mod link;
pub mod list;
pub mod sweep;

use anyhow::{Context, Result, bail};
use cinecms_icc::{BuiltinProfile, CmsConfig, CmsContext, Profile};
use std::path::Path;

/// Loads settings from `path` (or defaults), then applies the environment.
pub fn load_config(path: Option<&Path>) -> Result<CmsConfig> {
    let config = match path {
        Some(path) => CmsConfig::from_file(path).with_context(|| format!("Failed to load: {}", path.display()))?,
        None => CmsConfig::default(),
    };
    Ok(config.with_env()?)
}

/// Context for a one-shot command.
///
/// Device links of running sessions share the temp dir, so only the
/// `sweep` command deletes files there.
pub fn init_context(mut config: CmsConfig) -> Result<CmsContext> {
    config.sweep_on_init = false;
    CmsContext::init(config).context("Failed to initialize colour management")
}

/// Built-in profile for a command-line name.
pub fn builtin(name: &str) -> Option<BuiltinProfile> {
    let kind = match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "srgb" => BuiltinProfile::Srgb,
        "linear-srgb" | "srgb-linear" => BuiltinProfile::LinearSrgb,
        "adobe-rgb" | "adobergb" => BuiltinProfile::AdobeRgb,
        "display-p3" | "p3" => BuiltinProfile::DisplayP3,
        "rec2020" | "bt2020" => BuiltinProfile::Rec2020,
        "xyz" => BuiltinProfile::Xyz,
        "lab" => BuiltinProfile::lab_d50(),
        "gray" | "grey" => BuiltinProfile::Gray { gamma: 2.2 },
        _ => return None,
    };
    Some(kind)
}

/// Opens a built-in or file profile into the context's store.
pub fn open_profile(cms: &mut CmsContext, name: &str) -> Result<Profile> {
    if let Some(kind) = builtin(name) {
        return Ok(cms.builtin_profile(kind)?);
    }
    match cms.open_profile(name) {
        Some(profile) => Ok(profile),
        None => bail!("Cannot open profile: {}", name),
    }
}

/// Opens every profile of a chain.
pub fn open_chain(cms: &mut CmsContext, names: &[String]) -> Result<Vec<Profile>> {
    names.iter().map(|n| open_profile(cms, n)).collect()
}

/// Parses an optional intent argument.
pub fn parse_intent(arg: Option<&str>, default: cinecms_icc::Intent) -> Result<cinecms_icc::Intent> {
    match arg {
        Some(s) => Ok(s.parse()?),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert_eq!(builtin("sRGB"), Some(BuiltinProfile::Srgb));
        assert_eq!(builtin("display_p3"), Some(BuiltinProfile::DisplayP3));
        assert!(builtin("monitor.icc").is_none());
    }

    #[test]
    fn test_open_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut cms = CmsContext::init(CmsConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..CmsConfig::default()
        })
        .unwrap();
        let chain = open_chain(&mut cms, &["srgb".into(), "lab".into()]).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(open_chain(&mut cms, &["srgb".into(), "/nonexistent.icc".into()]).is_err());
    }

    #[test]
    fn test_one_shot_context_keeps_foreign_links() {
        let dir = tempfile::tempdir().unwrap();
        let foreign = dir.path().join("cinecms_temp.042.icc");
        std::fs::write(&foreign, b"link").unwrap();
        let cms = init_context(CmsConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..CmsConfig::default()
        })
        .unwrap();
        assert!(foreign.exists());
        cms.shutdown();
    }
}
