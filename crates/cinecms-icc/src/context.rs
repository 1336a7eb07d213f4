//! The colour-management context: both caches, settings and the display profile.
//!
//! One context replaces process-wide state. Several contexts can coexist,
//! also on one device link directory: a context's start-up sweep only
//! touches files left by other processes.

use std::fs;
use std::path::Path;

use cinecms_core::Tag;
use tracing::{debug, info, warn};

use crate::devicelink::DeviceLinkDir;
use crate::scan::{self, ProfileListing};
use crate::transform_store::TransformRequest;
use crate::{
    BuiltinProfile, CmsConfig, DeviceClass, IccResult, Profile, ProfileStore, Transform, TransformStore,
};

/// Owned colour-management state.
#[derive(Debug)]
pub struct CmsContext {
    config: CmsConfig,
    profiles: ProfileStore,
    transforms: TransformStore,
    display: Option<Profile>,
}

impl CmsContext {
    /// Sets up the caches described by `config`.
    ///
    /// Stale device link files are swept when configured. Configured
    /// profiles that cannot be opened are warned about and cleared; a
    /// display profile that is not of the display class is rejected.
    pub fn init(mut config: CmsConfig) -> IccResult<Self> {
        let temp_dir = config.temp_dir();
        fs::create_dir_all(&temp_dir)?;
        let links = DeviceLinkDir::new(&temp_dir, config.temp_prefix.clone());
        if config.sweep_on_init {
            match links.sweep() {
                Ok(0) => {}
                Ok(n) => info!("removed {} stale device link files from {}", n, temp_dir.display()),
                Err(e) => warn!("cannot sweep {}: {}", temp_dir.display(), e),
            }
        }

        let mut ctx = Self {
            transforms: TransformStore::new(links, config.limits()),
            profiles: ProfileStore::new(),
            display: None,
            config: config.clone(),
        };

        for (label, slot) in [
            ("image", &mut config.image_profile),
            ("workspace", &mut config.workspace_profile),
            ("proof", &mut config.proof_profile),
        ] {
            let Some(path) = slot.clone() else { continue };
            match ctx.open_profile(&path) {
                Some(profile) => {
                    ctx.profiles.return_profile(&profile);
                }
                None => {
                    warn!("{} profile {} cannot be opened, setting cleared", label, path.display());
                    *slot = None;
                }
            }
        }

        if let Some(path) = config.display_profile.clone() {
            match ctx.open_profile(&path) {
                Some(profile) if profile.device_class() == Some(DeviceClass::Display) => {
                    ctx.display = Some(profile);
                }
                Some(profile) => {
                    warn!(
                        "display profile {} is a {} profile, not a display profile",
                        path.display(),
                        profile.device_class().map(|c| c.name()).unwrap_or("unknown")
                    );
                    ctx.profiles.return_profile(&profile);
                    config.display_profile = None;
                }
                None => {
                    warn!("display profile {} cannot be opened, setting cleared", path.display());
                    config.display_profile = None;
                }
            }
        }

        ctx.config = config;
        debug!(dir = %temp_dir.display(), "colour management initialized");
        Ok(ctx)
    }

    /// Releases every cached profile and transform.
    pub fn shutdown(mut self) {
        self.display = None;
        self.transforms.clear();
        self.profiles.clear();
        debug!("colour management shut down");
    }

    /// Active settings, with rejected profiles cleared.
    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    /// The profile store.
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// The profile store, mutably.
    pub fn profiles_mut(&mut self) -> &mut ProfileStore {
        &mut self.profiles
    }

    /// The transform store.
    pub fn transforms(&self) -> &TransformStore {
        &self.transforms
    }

    /// Opens a profile file; bare names are looked up in the profile dirs.
    pub fn open_profile(&mut self, path: impl AsRef<Path>) -> Option<Profile> {
        let path = scan::resolve_profile_path(path.as_ref(), &self.config.profile_dirs);
        self.profiles.get_profile_from_file(path)
    }

    /// Opens a synthesized profile.
    pub fn builtin_profile(&mut self, kind: BuiltinProfile) -> IccResult<Profile> {
        self.profiles.get_builtin_profile(kind)
    }

    /// Drops a profile reference.
    pub fn return_profile(&mut self, profile: &Profile) -> bool {
        self.profiles.return_profile(profile)
    }

    /// Returns the transform for `request`.
    pub fn get_transform(&mut self, request: &TransformRequest<'_>) -> IccResult<Transform> {
        self.transforms.get_transform(&self.profiles, request)
    }

    /// Transform for canvas buffers using the configured intents and flags.
    pub fn get_canvas_transform(&mut self, chain: &[Profile], src_tag: Tag, dest_tag: Tag) -> IccResult<Transform> {
        self.transforms.get_canvas_transform(
            &self.profiles,
            chain,
            src_tag,
            dest_tag,
            self.config.intent,
            self.config.flags,
            self.config.proof_intent,
        )
    }

    /// Drops a transform reference.
    pub fn return_transform(&mut self, transform: &Transform) -> bool {
        self.transforms.return_transform(transform)
    }

    /// The display profile, if set.
    pub fn display_profile(&self) -> Option<&Profile> {
        self.display.as_ref()
    }

    /// Makes a registered profile the display profile.
    ///
    /// The context holds its own reference to the display profile; the
    /// previous one is returned to the store.
    pub fn set_display_profile(&mut self, profile: &Profile) -> bool {
        let Some(own) = self.profiles.duplicate(profile) else {
            warn!("set_display_profile: profile is not registered");
            return false;
        };
        if let Some(old) = self.display.replace(own) {
            self.profiles.return_profile(&old);
        }
        true
    }

    /// Profiles found in the configured (or default) profile directories.
    pub fn list_profiles(&self, class: Option<DeviceClass>) -> Vec<ProfileListing> {
        if self.config.profile_dirs.is_empty() {
            scan::read_standard_profile_dirs(&scan::default_profile_dirs(), class)
        } else {
            scan::read_standard_profile_dirs(&self.config.profile_dirs, class)
        }
    }
}
