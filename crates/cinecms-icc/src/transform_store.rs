//! Transform cache with disk-backed eviction.
//!
//! A transform entity is created on the first request for its key and kept
//! in the table. When its reference count drops to zero it joins a short
//! FIFO of unused transforms that stay in memory; pushing past the FIFO's
//! capacity evicts the oldest one: its engine handle is dropped and only the
//! device link file written at creation remains, from which the handle is
//! rebuilt on the next request.
//!
//! Soft-proofing chains longer than three profiles are collapsed through a
//! device link and kept in a separate single slot instead of the table.
//!
//! The table itself is bounded: once it exceeds its entry limit, the least
//! recently requested unreferenced entries are dropped together with their
//! device link files.

use std::collections::{HashMap, VecDeque};
use std::fs;

use cinecms_core::Tag;
use tracing::{debug, warn};

use crate::builder::{self, BuiltTransform};
use crate::devicelink::{self, DeviceLinkDir};
use crate::engine::{EngineFormat, ProfileHandle, TransformFlags, TransformHandle};
use crate::transform::{Residency, TransformKey};
use crate::{IccError, IccResult, Intent, Profile, ProfileStore, Transform};

/// Parameters of a transform request.
#[derive(Debug, Clone)]
pub struct TransformRequest<'a> {
    /// Profile chain, input first.
    pub profiles: &'a [Profile],
    /// Engine input format.
    pub input: EngineFormat,
    /// Engine output format.
    pub output: EngineFormat,
    /// Rendering intent.
    pub intent: Intent,
    /// Creation flags.
    pub flags: TransformFlags,
    /// Intent towards the proofing profile.
    pub proof_intent: Intent,
    /// Tag of source buffers.
    pub src_tag: Tag,
    /// Tag of destination buffers.
    pub dest_tag: Tag,
}

impl<'a> TransformRequest<'a> {
    /// Request with perceptual intents and no flags.
    pub fn new(profiles: &'a [Profile], input: EngineFormat, output: EngineFormat, src_tag: Tag, dest_tag: Tag) -> Self {
        Self {
            profiles,
            input,
            output,
            intent: Intent::Perceptual,
            flags: TransformFlags::empty(),
            proof_intent: Intent::Perceptual,
            src_tag,
            dest_tag,
        }
    }

    /// Sets the rendering intent.
    pub fn intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Sets the creation flags.
    pub fn flags(mut self, flags: TransformFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the proofing intent.
    pub fn proof_intent(mut self, intent: Intent) -> Self {
        self.proof_intent = intent;
        self
    }

    fn key(&self) -> TransformKey {
        TransformKey {
            profiles: self.profiles.iter().map(|p| p.key().into()).collect(),
            input: self.input,
            output: self.output,
            intent: self.intent,
            flags: self.flags,
            proof_intent: self.proof_intent,
            src_tag: self.src_tag,
            dest_tag: self.dest_tag,
        }
    }

    fn soft_proofing(&self) -> bool {
        self.flags.contains(TransformFlags::SOFT_PROOFING)
    }
}

/// Capacity settings of a [`TransformStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Unused transforms kept in memory.
    pub unused_capacity: usize,
    /// Table entries before unreferenced ones are dropped.
    pub max_entries: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            unused_capacity: 1,
            max_entries: 64,
        }
    }
}

#[derive(Debug)]
struct Slot {
    transform: Transform,
    ref_count: i32,
    last_used: u64,
}

/// Table of transforms keyed by request.
#[derive(Debug)]
pub struct TransformStore {
    table: HashMap<TransformKey, Slot>,
    unused: VecDeque<TransformKey>,
    expensive: Option<Transform>,
    limits: StoreLimits,
    links: DeviceLinkDir,
    clock: u64,
}

impl TransformStore {
    /// Creates an empty store writing device links through `links`.
    pub fn new(links: DeviceLinkDir, limits: StoreLimits) -> Self {
        Self {
            table: HashMap::new(),
            unused: VecDeque::new(),
            expensive: None,
            limits,
            links,
            clock: 0,
        }
    }

    /// Device link directory.
    pub fn links(&self) -> &DeviceLinkDir {
        &self.links
    }

    /// Returns the transform for `request`, building it on a miss.
    ///
    /// Every profile must be registered in `profiles`. Each call counts one
    /// reference; hand it back with [`return_transform`](Self::return_transform).
    /// An evicted transform is rebuilt from its device link, or from the
    /// profiles when the link cannot be read.
    ///
    /// # Arguments
    ///
    /// * `profiles` - Store holding the chain's profiles
    /// * `request` - Chain, engine formats, intents, flags and buffer tags
    ///
    /// # Example
    ///
    /// ```rust
    /// use cinecms_core::Tag;
    /// use cinecms_icc::{
    ///     native_format, BuiltinProfile, DeviceLinkDir, ProfileStore, StoreLimits, TransformRequest, TransformStore,
    /// };
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let mut profiles = ProfileStore::new();
    /// let mut transforms = TransformStore::new(DeviceLinkDir::new(dir.path(), "doc"), StoreLimits::default());
    ///
    /// let chain = [
    ///     profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap(),
    ///     profiles.get_builtin_profile(BuiltinProfile::DisplayP3).unwrap(),
    /// ];
    /// let format = native_format(Tag::RGB_U8, &chain[0]).unwrap();
    /// let request = TransformRequest::new(&chain, format, format, Tag::RGB_U8, Tag::RGB_U8);
    ///
    /// let t = transforms.get_transform(&profiles, &request).unwrap();
    /// assert_eq!(transforms.get_transform(&profiles, &request).unwrap(), t);
    /// assert_eq!(transforms.ref_count(&t), Some(2));
    /// ```
    pub fn get_transform(&mut self, profiles: &ProfileStore, request: &TransformRequest<'_>) -> IccResult<Transform> {
        if request.profiles.is_empty() {
            warn!("get_transform: profile chain is empty");
            return Err(IccError::EmptyChain);
        }
        let entries = profiles.resolve(request.profiles).inspect_err(|e| {
            warn!("get_transform: {}; open profiles before building transforms from them", e);
        })?;
        let key = request.key();
        self.clock += 1;

        if let Some(expensive) = &self.expensive {
            if *expensive.key() == key {
                debug!("expensive transform slot hit");
                return Ok(expensive.clone());
            }
        }

        if !request.soft_proofing() {
            if let Some(transform) = self.revive(&key) {
                return Ok(transform);
            }
        }

        let handles: Vec<&ProfileHandle> = entries.iter().map(|e| &e.handle).collect();
        let BuiltTransform { handle, expensive } = builder::build(
            &handles,
            request.input,
            request.output,
            request.intent,
            request.flags,
            request.proof_intent,
        )
        .inspect_err(|e| warn!("get_transform: {}", e))?;
        let input_space = entries[0].header.color_space;

        if expensive {
            debug!(key = %key, "transform cached in the expensive slot");
            let transform = Transform::new(key, input_space, Residency::Resident { handle, link: None });
            self.expensive = Some(transform.clone());
            return Ok(transform);
        }

        let residency = self.persist(handle, request);
        if let Some(slot) = self.table.get_mut(&key) {
            // proofing requests and unreadable device links rebuild in place
            slot.ref_count += 1;
            slot.last_used = self.clock;
            let old = slot.transform.set_residency(residency);
            let fresh_link = slot.transform.device_link();
            if let Some(old_link) = old.link() {
                if fresh_link.as_deref() != Some(old_link) {
                    let _ = fs::remove_file(old_link);
                }
            }
            let transform = slot.transform.clone();
            self.unused.retain(|k| *k != key);
            return Ok(transform);
        }

        debug!(key = %key, "transform built");
        let transform = Transform::new(key.clone(), input_space, residency);
        self.table.insert(
            key.clone(),
            Slot {
                transform: transform.clone(),
                ref_count: 1,
                last_used: self.clock,
            },
        );
        self.enforce_bound(&key);
        Ok(transform)
    }

    /// Table hit: reload an evicted handle, then count the reference.
    ///
    /// `None` when the key is missing or its device link cannot be read
    /// back; the caller then rebuilds the entry in place.
    fn revive(&mut self, key: &TransformKey) -> Option<Transform> {
        let slot = self.table.get_mut(key)?;
        let transform = slot.transform.clone();

        let evicted = match &*transform.0.residency.borrow() {
            Residency::Evicted(path) => Some(path.clone()),
            Residency::Resident { .. } => None,
        };
        if let Some(path) = evicted {
            match reload(&path, key) {
                Ok(handle) => {
                    transform.set_residency(Residency::Resident { handle, link: Some(path) });
                    debug!(key = %key, "transform reloaded from device link");
                }
                Err(e) => {
                    warn!("cannot rebuild transform from device link, building it again: {}", e);
                    return None;
                }
            }
        }

        slot.ref_count += 1;
        slot.last_used = self.clock;
        let ref_count = slot.ref_count;
        if ref_count == 1 {
            self.unused.retain(|k| k != key);
        }
        debug!(key = %key, ref_count, "transform cache hit");
        Some(transform)
    }

    /// Exports the built handle and re-imports the live one from the file.
    ///
    /// On any failure the built handle stays resident without a link.
    fn persist(&mut self, handle: TransformHandle, request: &TransformRequest<'_>) -> Residency {
        let path = match self.links.export(&handle) {
            Ok(path) => path,
            Err(e) => {
                warn!("transform stays in memory: {}", e);
                return Residency::Resident { handle, link: None };
            }
        };
        let key = request.key();
        match reload(&path, &key) {
            Ok(reloaded) => Residency::Resident {
                handle: reloaded,
                link: Some(path),
            },
            Err(e) => {
                warn!("transform stays in memory: {}", e);
                let _ = fs::remove_file(&path);
                Residency::Resident { handle, link: None }
            }
        }
    }

    /// Drops a reference; unreferenced transforms join the unused list.
    ///
    /// Returns `false` for transforms the table does not hold.
    pub fn return_transform(&mut self, transform: &Transform) -> bool {
        let Some(slot) = self.table.get_mut(transform.key()) else {
            warn!("return_transform: transform not in cache");
            return false;
        };
        if !slot.transform.same_entity(transform) {
            warn!("return_transform: stale transform reference");
            return false;
        }
        slot.ref_count -= 1;
        if slot.ref_count <= 0 && !self.unused.contains(transform.key()) {
            self.unused.push_back(transform.key().clone());
            while self.unused.len() > self.limits.unused_capacity {
                if let Some(oldest) = self.unused.pop_front() {
                    self.evict(&oldest);
                }
            }
        }
        true
    }

    fn evict(&mut self, key: &TransformKey) {
        let Some(slot) = self.table.get(key) else {
            return;
        };
        let transform = &slot.transform;
        let Some(link) = transform.device_link() else {
            debug!(key = %key, "transform has no device link, kept in memory");
            return;
        };
        transform.set_residency(Residency::Evicted(link));
        debug!(key = %key, "transform evicted");
    }

    /// Drops least recently used unreferenced entries above the table limit.
    fn enforce_bound(&mut self, keep: &TransformKey) {
        while self.table.len() > self.limits.max_entries {
            let victim = self
                .table
                .iter()
                .filter(|(k, s)| s.ref_count <= 0 && *k != keep)
                .min_by_key(|(_, s)| s.last_used)
                .map(|(k, _)| k.clone());
            let Some(victim) = victim else {
                break;
            };
            self.unused.retain(|k| *k != victim);
            if let Some(slot) = self.table.remove(&victim) {
                if let Some(link) = slot.transform.device_link() {
                    let _ = fs::remove_file(link);
                }
                debug!(key = %victim, "transform dropped from table");
            }
        }
    }

    /// Transform for a canvas: formats come from the first and last profile.
    ///
    /// # Arguments
    ///
    /// * `chain` - Profile chain, input first
    /// * `src_tag` - Layout of the source buffers
    /// * `dest_tag` - Layout of the destination buffers
    /// * `intent`, `flags`, `proof_intent` - As in [`TransformRequest`]
    pub fn get_canvas_transform(
        &mut self,
        profiles: &ProfileStore,
        chain: &[Profile],
        src_tag: Tag,
        dest_tag: Tag,
        intent: Intent,
        flags: TransformFlags,
        proof_intent: Intent,
    ) -> IccResult<Transform> {
        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            warn!("get_canvas_transform: profile chain is empty");
            return Err(IccError::EmptyChain);
        };
        let input = builder::native_format(src_tag, first).inspect_err(|e| warn!("get_canvas_transform: {}", e))?;
        let output = builder::native_format(dest_tag, last).inspect_err(|e| warn!("get_canvas_transform: {}", e))?;
        let request = TransformRequest::new(chain, input, output, src_tag, dest_tag)
            .intent(intent)
            .flags(flags)
            .proof_intent(proof_intent);
        self.get_transform(profiles, &request)
    }

    /// Number of table entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Reference count of a table entry.
    pub fn ref_count(&self, transform: &Transform) -> Option<i32> {
        self.table
            .get(transform.key())
            .filter(|s| s.transform.same_entity(transform))
            .map(|s| s.ref_count)
    }

    /// Length of the unused list.
    pub fn unused_len(&self) -> usize {
        self.unused.len()
    }

    /// Whether `transform` sits in the unused list.
    pub fn is_unused(&self, transform: &Transform) -> bool {
        self.unused.contains(transform.key())
    }

    /// Transform in the expensive slot.
    pub fn expensive(&self) -> Option<&Transform> {
        self.expensive.as_ref()
    }

    /// Empties the expensive slot.
    pub fn clear_expensive(&mut self) {
        self.expensive = None;
    }

    /// Drops every entry. Device link files stay for the next sweep.
    pub fn clear(&mut self) {
        debug!(entries = self.table.len(), "transform cache cleared");
        self.unused.clear();
        self.table.clear();
        self.expensive = None;
    }
}

/// Rebuilds an engine transform from its device link file.
fn reload(path: &std::path::Path, key: &TransformKey) -> IccResult<TransformHandle> {
    let link = devicelink::import(path)?;
    TransformHandle::from_device_link(&link, key.input, key.output, key.intent, key.flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuiltinProfile;

    fn setup(limits: StoreLimits) -> (tempfile::TempDir, ProfileStore, TransformStore) {
        let dir = tempfile::tempdir().unwrap();
        let links = DeviceLinkDir::new(dir.path(), "test");
        (dir, ProfileStore::new(), TransformStore::new(links, limits))
    }

    fn rgb8() -> EngineFormat {
        builder::format_for(Tag::RGB_U8, crate::engine::ColorSpace::Rgb).unwrap()
    }

    #[test]
    fn test_hit_counts() {
        let (_dir, mut profiles, mut store) = setup(StoreLimits::default());
        let srgb = profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        let adobe = profiles.get_builtin_profile(BuiltinProfile::AdobeRgb).unwrap();
        let chain = [srgb, adobe];
        let req = TransformRequest::new(&chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8);
        let a = store.get_transform(&profiles, &req).unwrap();
        let b = store.get_transform(&profiles, &req).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(&a), Some(2));
        assert!(a.device_link().unwrap().exists());
    }

    #[test]
    fn test_unregistered_profile_rejected() {
        let (_dir, mut profiles, mut store) = setup(StoreLimits::default());
        let srgb = profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        assert!(profiles.return_profile(&srgb));
        let chain = [srgb];
        let req = TransformRequest::new(&chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8);
        let err = store.get_transform(&profiles, &req).unwrap_err();
        assert!(matches!(err, IccError::ProfileNotRegistered(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_return_unknown() {
        let (_dir, mut profiles, mut store) = setup(StoreLimits::default());
        let srgb = profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap();
        let chain = [srgb];
        let req = TransformRequest::new(&chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8);
        let t = store.get_transform(&profiles, &req).unwrap();
        store.clear();
        assert!(!store.return_transform(&t));
    }

    #[test]
    fn test_table_bound() {
        let limits = StoreLimits {
            unused_capacity: 0,
            max_entries: 2,
        };
        let (_dir, mut profiles, mut store) = setup(limits);
        let kinds = [BuiltinProfile::Srgb, BuiltinProfile::AdobeRgb, BuiltinProfile::DisplayP3];
        let chains: Vec<[Profile; 1]> = kinds
            .iter()
            .map(|k| [profiles.get_builtin_profile(*k).unwrap()])
            .collect();

        let mut links = Vec::new();
        for chain in &chains {
            let req = TransformRequest::new(chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8);
            let t = store.get_transform(&profiles, &req).unwrap();
            links.push(t.device_link().unwrap());
            assert!(store.return_transform(&t));
        }
        assert_eq!(store.len(), 2);
        // the first one was dropped along with its file
        assert!(!links[0].exists());
        assert!(links[2].exists());
    }

    #[test]
    fn test_referenced_entries_survive_bound() {
        let limits = StoreLimits {
            unused_capacity: 1,
            max_entries: 1,
        };
        let (_dir, mut profiles, mut store) = setup(limits);
        let a = [profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap()];
        let b = [profiles.get_builtin_profile(BuiltinProfile::Rec2020).unwrap()];
        let ta = store
            .get_transform(&profiles, &TransformRequest::new(&a, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8))
            .unwrap();
        let tb = store
            .get_transform(&profiles, &TransformRequest::new(&b, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8))
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.ref_count(&ta), Some(1));
        assert_eq!(store.ref_count(&tb), Some(1));
    }

    #[test]
    fn test_missing_link_rebuilds() {
        let limits = StoreLimits {
            unused_capacity: 0,
            max_entries: 8,
        };
        let (_dir, mut profiles, mut store) = setup(limits);
        let chain = [
            profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap(),
            profiles.get_builtin_profile(BuiltinProfile::DisplayP3).unwrap(),
        ];
        let req = TransformRequest::new(&chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8);
        let t = store.get_transform(&profiles, &req).unwrap();
        let link = t.device_link().unwrap();
        assert!(store.return_transform(&t));
        assert!(!t.is_resident());
        fs::remove_file(&link).unwrap();

        for n in 1..=3 {
            let again = store.get_transform(&profiles, &req).unwrap();
            assert_eq!(again, t);
            assert!(again.is_resident());
            assert_eq!(store.ref_count(&t), Some(n));
        }
        let fresh = t.device_link().unwrap();
        assert_ne!(fresh, link);
        assert!(fresh.exists());

        for _ in 0..3 {
            assert!(store.return_transform(&t));
        }
        assert_eq!(store.ref_count(&t), Some(0));
        assert!(!t.is_resident());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_proofing_rebuilds_in_place() {
        let (_dir, mut profiles, mut store) = setup(StoreLimits::default());
        let chain = [
            profiles.get_builtin_profile(BuiltinProfile::Srgb).unwrap(),
            profiles.get_builtin_profile(BuiltinProfile::AdobeRgb).unwrap(),
            profiles.get_builtin_profile(BuiltinProfile::DisplayP3).unwrap(),
        ];
        let req = TransformRequest::new(&chain, rgb8(), rgb8(), Tag::RGB_U8, Tag::RGB_U8)
            .flags(TransformFlags::SOFT_PROOFING)
            .proof_intent(Intent::RelativeColorimetric);

        let first = store.get_transform(&profiles, &req).unwrap();
        let old_link = first.device_link().unwrap();
        let second = store.get_transform(&profiles, &req).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ref_count(&first), Some(2));
        assert!(store.expensive().is_none());

        let new_link = second.device_link().unwrap();
        assert_ne!(new_link, old_link);
        assert!(!old_link.exists());
        assert!(new_link.exists());
    }
}
