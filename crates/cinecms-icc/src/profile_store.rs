//! Reference-counted profile cache.
//!
//! Every distinct profile (by identity key) lives here exactly once. Opening
//! the same profile again bumps its reference count; returning it the same
//! number of times removes the entry and closes the engine handle at once.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::ProfileHandle;
use crate::profile::{identity_key, read_description, IccHeader, ProfileEntry};
use crate::{BuiltinProfile, IccError, IccResult, Profile, ProfileInfo};

/// Path value that means "no profile".
pub const NO_PROFILE: &str = "[none]";

#[derive(Debug)]
struct Slot {
    entry: Rc<ProfileEntry>,
    ref_count: u32,
}

/// Table of open profiles keyed by identity.
#[derive(Debug, Default)]
pub struct ProfileStore {
    slots: HashMap<Rc<str>, Slot>,
}

impl ProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a profile file.
    ///
    /// Returns `None` (with a warning) when the file cannot be read or
    /// parsed. An empty path or [`NO_PROFILE`] returns `None` silently.
    /// Files with the same identity resolve to one entity whose reference
    /// count goes up on each call.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cinecms_icc::{BuiltinProfile, ProfileStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let path = dir.path().join("sRGB.icc");
    /// std::fs::write(&path, BuiltinProfile::Srgb.to_icc().unwrap()).unwrap();
    ///
    /// let mut store = ProfileStore::new();
    /// let a = store.get_profile_from_file(&path).unwrap();
    /// let b = store.get_profile_from_file(&path).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(store.ref_count(&a), Some(2));
    ///
    /// store.return_profile(&a);
    /// store.return_profile(&b);
    /// assert!(store.is_empty());
    /// ```
    pub fn get_profile_from_file(&mut self, path: impl AsRef<Path>) -> Option<Profile> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || path.as_os_str() == NO_PROFILE {
            return None;
        }
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("cannot read profile {}: {}", path.display(), e);
                return None;
            }
        };
        match self.register_parsed(data) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("cannot open profile {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Opens a profile from ICC bytes.
    ///
    /// The store takes the buffer. On a cache hit the buffer is dropped and
    /// the existing entity is returned.
    pub fn get_profile_from_memory(&mut self, data: Vec<u8>) -> Option<Profile> {
        match self.register_parsed(data) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("cannot open profile from memory: {}", e);
                None
            }
        }
    }

    /// Returns a synthesized profile, creating it on first use.
    pub fn get_builtin_profile(&mut self, kind: BuiltinProfile) -> IccResult<Profile> {
        let key = kind.cache_key();
        if let Some(profile) = self.hit(&key) {
            return Ok(profile);
        }
        let data = kind.to_icc()?;
        let header = IccHeader::parse(&data)?;
        let handle = ProfileHandle::open(&data)?;
        Ok(self.insert(key.into(), handle, data, header, kind.description()))
    }

    fn register_parsed(&mut self, data: Vec<u8>) -> IccResult<Profile> {
        let handle = ProfileHandle::open(&data)?;
        let header = IccHeader::parse(&data)?;
        let description = read_description(&data);
        let key = identity_key(&description, &header);
        if let Some(profile) = self.hit(&key) {
            // the freshly parsed handle and buffer are duplicates
            drop(handle);
            return Ok(profile);
        }
        Ok(self.insert(key.into(), handle, data, header, description))
    }

    fn hit(&mut self, key: &str) -> Option<Profile> {
        let slot = self.slots.get_mut(key)?;
        slot.ref_count += 1;
        debug!(key, ref_count = slot.ref_count, "profile cache hit");
        Some(Profile::new(&slot.entry))
    }

    fn insert(
        &mut self,
        key: Rc<str>,
        handle: ProfileHandle,
        data: Vec<u8>,
        header: IccHeader,
        description: String,
    ) -> Profile {
        debug!(key = &*key, space = %header.color_space, "profile opened");
        let entry = Rc::new(ProfileEntry {
            key: key.clone(),
            handle,
            data,
            header,
            description,
        });
        let profile = Profile::new(&entry);
        self.slots.insert(key, Slot { entry, ref_count: 1 });
        profile
    }

    fn slot(&self, profile: &Profile) -> Option<&Slot> {
        let slot = self.slots.get(profile.key())?;
        let live = profile.upgrade()?;
        Rc::ptr_eq(&slot.entry, &live).then_some(slot)
    }

    /// Whether `profile` refers to the entity currently stored under its key.
    pub fn is_registered(&self, profile: &Profile) -> bool {
        self.slot(profile).is_some()
    }

    /// Adds a reference to a registered profile.
    pub fn duplicate(&mut self, profile: &Profile) -> Option<Profile> {
        if !self.is_registered(profile) {
            warn!("duplicate: profile '{}' is not registered", profile.key());
            return None;
        }
        self.hit(profile.key())
    }

    /// Drops a reference; the last one removes the entry.
    ///
    /// Returns `false` for profiles the store does not hold.
    pub fn return_profile(&mut self, profile: &Profile) -> bool {
        if !self.is_registered(profile) {
            warn!("return_profile: profile '{}' not found", profile.key());
            return false;
        }
        let Some(slot) = self.slots.get_mut(profile.key()) else {
            return false;
        };
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count == 0 {
            self.slots.remove(profile.key());
            debug!(key = profile.key(), "profile released");
        }
        true
    }

    /// Current reference count.
    pub fn ref_count(&self, profile: &Profile) -> Option<u32> {
        self.slot(profile).map(|s| s.ref_count)
    }

    /// Copy of the raw ICC bytes, for embedding into files.
    pub fn profile_data(&self, profile: &Profile) -> Option<Vec<u8>> {
        self.slot(profile).map(|s| s.entry.data.clone())
    }

    /// Descriptive strings of a registered profile.
    pub fn profile_info(&self, profile: &Profile) -> Option<ProfileInfo> {
        self.slot(profile).map(|s| ProfileInfo::from_entry(&s.entry))
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolves a chain of profiles to their stored entries.
    pub(crate) fn resolve(&self, profiles: &[Profile]) -> IccResult<Vec<Rc<ProfileEntry>>> {
        profiles
            .iter()
            .map(|p| {
                self.slot(p)
                    .map(|s| s.entry.clone())
                    .ok_or_else(|| IccError::ProfileNotRegistered(p.key().to_string()))
            })
            .collect()
    }

    /// Drops every entry, whatever its count.
    pub fn clear(&mut self) {
        let live: u32 = self.slots.values().map(|s| s.ref_count).sum();
        if live > 0 {
            debug!(profiles = self.slots.len(), references = live, "closing profiles still in use");
        }
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_twice_is_one_entity() {
        let data = BuiltinProfile::AdobeRgb.to_icc().unwrap();
        let mut store = ProfileStore::new();
        let a = store.get_profile_from_memory(data.clone()).unwrap();
        let b = store.get_profile_from_memory(data).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(&a), Some(2));
        assert!(store.return_profile(&a));
        assert!(store.return_profile(&b));
        assert!(store.is_empty());
        assert!(!store.return_profile(&a));
    }

    #[test]
    fn test_builtin_cached() {
        let mut store = ProfileStore::new();
        let a = store.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        let b = store.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        let lab = store.get_builtin_profile(BuiltinProfile::lab_d50()).unwrap();
        assert!(a.same_entity(&b));
        assert!(!a.same_entity(&lab));
        assert_eq!(a.key(), "###SRGB###");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_stale_reference() {
        let mut store = ProfileStore::new();
        let a = store.get_builtin_profile(BuiltinProfile::Xyz).unwrap();
        assert!(store.return_profile(&a));
        assert!(store.duplicate(&a).is_none());
        // a new entity under the same key does not revive the old reference
        let b = store.get_builtin_profile(BuiltinProfile::Xyz).unwrap();
        assert!(!store.is_registered(&a));
        assert!(store.is_registered(&b));
    }

    #[test]
    fn test_duplicate_counts() {
        let mut store = ProfileStore::new();
        let a = store.get_builtin_profile(BuiltinProfile::Gray { gamma: 2.2 }).unwrap();
        let b = store.duplicate(&a).unwrap();
        assert_eq!(store.ref_count(&b), Some(2));
    }

    #[test]
    fn test_bad_input() {
        let mut store = ProfileStore::new();
        assert!(store.get_profile_from_memory(vec![1, 2, 3]).is_none());
        assert!(store.get_profile_from_file("").is_none());
        assert!(store.get_profile_from_file(NO_PROFILE).is_none());
        assert!(store.get_profile_from_file("/nonexistent/x.icc").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_info_and_data() {
        let mut store = ProfileStore::new();
        let p = store.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        let info = store.profile_info(&p).unwrap();
        assert_eq!(info.color_space, "RGB");
        assert_eq!(info.channel_names, ["Red", "Green", "Blue", "Alpha"]);
        assert_eq!(info.device_class, "display");
        assert!(store.profile_data(&p).unwrap().len() > 128);
    }
}
