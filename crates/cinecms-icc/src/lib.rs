//! # cinecms-icc
//!
//! Caching colour management for an image editor, built on Little CMS 2.
//!
//! Profiles and transforms are expensive to create, and an editor asks for
//! the same ones over and over: each canvas redraw, each layer, each
//! thumbnail. This crate keeps them in two caches:
//!
//! - [`ProfileStore`] - reference-counted profiles, deduplicated by identity
//!   (description plus creation date plus profile ID), so opening the same
//!   file twice yields the same entity
//! - [`TransformStore`] - reference-counted transforms keyed by profile
//!   chain, pixel formats, intents and flags. Unused transforms linger in a
//!   short FIFO; past that they are evicted to a device link file on disk
//!   and rebuilt from it on demand
//!
//! Pixels are then pushed through a [`Transform`] with [`transform_buffer`]
//! or [`transform_area`], which convert between the buffer's precision and
//! the engine's native format and fill any destination channels the
//! transform does not produce.
//!
//! # Example
//!
//! ```rust,no_run
//! use cinecms_core::Tag;
//! use cinecms_icc::{BuiltinProfile, CmsConfig, CmsContext};
//!
//! let mut cms = CmsContext::init(CmsConfig::default()).unwrap();
//! let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
//! let p3 = cms.builtin_profile(BuiltinProfile::DisplayP3).unwrap();
//!
//! let chain = [srgb, p3];
//! let transform = cms.get_canvas_transform(&chain, Tag::RGBA_U8, Tag::RGBA_U8).unwrap();
//!
//! let src = vec![255u8; 4 * 16];
//! let mut dst = vec![0u8; 4 * 16];
//! cinecms_icc::transform_buffer(&transform, &src, &mut dst, 16, Tag::RGBA_U8.precision()).unwrap();
//!
//! cms.return_transform(&transform);
//! cms.shutdown();
//! ```
//!
//! # Threading
//!
//! The caches are single-threaded (`Rc` handles); each thread that needs
//! colour management owns its own [`CmsContext`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod builder;
mod builtin;
mod config;
mod context;
mod converter;
mod devicelink;
mod engine;
mod error;
mod profile;
mod profile_store;
mod scan;
mod transform;
mod transform_store;

use serde::{Deserialize, Serialize};

pub use builder::{build, native_format, BuiltTransform};
pub use builtin::BuiltinProfile;
pub use config::CmsConfig;
pub use context::CmsContext;
pub use converter::{transform_area, transform_buffer, transform_buffer_in_place, Sample};
pub use devicelink::{import as import_device_link, DeviceLinkDir};
pub use engine::{
    ColorSpace, DeviceClass, EngineFormat, ProfileHandle, TransformFlags, TransformHandle, DEVICE_LINK_VERSION,
};
pub use error::{IccError, IccResult};
pub use profile::{IccHeader, Profile, ProfileInfo};
pub use profile_store::{ProfileStore, NO_PROFILE};
pub use scan::{default_profile_dirs, read_profile_dir, read_standard_profile_dirs, resolve_profile_path, ProfileListing};
pub use transform::{Residency, Transform, TransformKey};
pub use transform_store::{StoreLimits, TransformRequest, TransformStore};

/// Rendering intent of a transform.
///
/// Determines how colours outside the destination gamut are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Compresses the whole source gamut into the destination.
    ///
    /// Best for photographic images.
    #[default]
    Perceptual,

    /// Maps in-gamut colours exactly, relative to the media white.
    ///
    /// Out-of-gamut colours are clipped.
    RelativeColorimetric,

    /// Keeps colours vivid at the expense of accuracy.
    Saturation,

    /// Maps in-gamut colours exactly without white point adaptation.
    ///
    /// Used for proofing and spot colours.
    AbsoluteColorimetric,
}

impl Intent {
    /// ICC intent number (0 to 3).
    pub fn code(self) -> u32 {
        match self {
            Intent::Perceptual => 0,
            Intent::RelativeColorimetric => 1,
            Intent::Saturation => 2,
            Intent::AbsoluteColorimetric => 3,
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = IccError;

    fn from_str(s: &str) -> IccResult<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "perceptual" | "0" => Ok(Intent::Perceptual),
            "relative_colorimetric" | "relative" | "1" => Ok(Intent::RelativeColorimetric),
            "saturation" | "2" => Ok(Intent::Saturation),
            "absolute_colorimetric" | "absolute" | "3" => Ok(Intent::AbsoluteColorimetric),
            _ => Err(IccError::Config(format!("unknown rendering intent '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_codes() {
        assert_eq!(Intent::default().code(), 0);
        assert_eq!(Intent::AbsoluteColorimetric.code(), 3);
        assert_eq!("relative-colorimetric".parse::<Intent>().unwrap(), Intent::RelativeColorimetric);
        assert_eq!("2".parse::<Intent>().unwrap(), Intent::Saturation);
        assert!("vivid".parse::<Intent>().is_err());
    }
}
