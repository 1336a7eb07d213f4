//! Listing profiles on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::engine::{ColorSpace, DeviceClass};
use crate::profile::{read_description, IccHeader};
use crate::IccResult;

/// A valid profile file found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileListing {
    /// File path.
    pub path: PathBuf,
    /// Profile description.
    pub description: String,
    /// Data colour space.
    pub color_space: ColorSpace,
    /// Device class, if known.
    pub device_class: Option<DeviceClass>,
}

/// System directories searched when no profile path is configured.
pub fn default_profile_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".local/share/color/icc"));
        dirs.push(home.join(".color/icc"));
    }
    dirs.push(PathBuf::from("/usr/local/share/color/icc"));
    dirs.push(PathBuf::from("/usr/share/color/icc"));
    dirs
}

fn inspect_file(path: &Path) -> Option<ProfileListing> {
    let data = fs::read(path).ok()?;
    let header = IccHeader::parse(&data).ok()?;
    Some(ProfileListing {
        path: path.to_path_buf(),
        description: read_description(&data),
        color_space: header.color_space,
        device_class: header.device_class,
    })
}

/// Valid profiles directly inside `dir`, optionally of one device class.
///
/// Not recursive. Files that are not ICC profiles are skipped silently.
/// The result is sorted by path.
pub fn read_profile_dir(dir: impl AsRef<Path>, class: Option<DeviceClass>) -> IccResult<Vec<ProfileListing>> {
    let dir = dir.as_ref();
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        match inspect_file(&path) {
            Some(listing) if class.is_none() || listing.device_class == class => found.push(listing),
            Some(_) => {}
            None => trace!(path = %path.display(), "not a profile"),
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(dir = %dir.display(), count = found.len(), "profile directory read");
    Ok(found)
}

/// Profiles of every directory in `dirs` that exists.
pub fn read_standard_profile_dirs(dirs: &[PathBuf], class: Option<DeviceClass>) -> Vec<ProfileListing> {
    dirs.iter()
        .filter(|d| d.is_dir())
        .filter_map(|d| read_profile_dir(d, class).ok())
        .flatten()
        .collect()
}

/// Resolves a bare profile file name against `dirs`.
///
/// Names containing a path separator, and names that exist as given, are
/// returned unchanged.
pub fn resolve_profile_path(name: &Path, dirs: &[PathBuf]) -> PathBuf {
    if name.exists() || name.components().count() > 1 {
        return name.to_path_buf();
    }
    dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_file())
        .unwrap_or_else(|| name.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinProfile;

    #[test]
    fn test_scan_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("srgb.icc"), BuiltinProfile::Srgb.to_icc().unwrap()).unwrap();
        fs::write(dir.path().join("lab.icc"), BuiltinProfile::lab_d50().to_icc().unwrap()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a profile").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/xyz.icc"), BuiltinProfile::Xyz.to_icc().unwrap()).unwrap();

        let all = read_profile_dir(dir.path(), None).unwrap();
        assert_eq!(all.len(), 2);

        let displays = read_profile_dir(dir.path(), Some(DeviceClass::Display)).unwrap();
        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].color_space, ColorSpace::Rgb);
    }

    #[test]
    fn test_missing_dirs_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("srgb.icc"), BuiltinProfile::Srgb.to_icc().unwrap()).unwrap();
        let dirs = [PathBuf::from("/nonexistent/icc"), dir.path().to_path_buf()];
        assert_eq!(read_standard_profile_dirs(&dirs, None).len(), 1);
    }

    #[test]
    fn test_resolve_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mine.icc"), b"x").unwrap();
        let dirs = [dir.path().to_path_buf()];
        assert_eq!(resolve_profile_path(Path::new("mine.icc"), &dirs), dir.path().join("mine.icc"));
        assert_eq!(resolve_profile_path(Path::new("other.icc"), &dirs), PathBuf::from("other.icc"));
    }
}
