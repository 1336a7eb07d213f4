//! Transform entities handed out by the [`TransformStore`](crate::TransformStore).

use std::cell::{Ref, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cinecms_core::Tag;

use crate::engine::{ColorSpace, EngineFormat, TransformFlags, TransformHandle};
use crate::Intent;

/// Structural identity of a transform request.
///
/// Two requests with the same profile chain, formats, intents, flags and
/// tags always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformKey {
    /// Identity keys of the profiles, in chain order.
    pub profiles: Vec<Rc<str>>,
    /// Engine input format.
    pub input: EngineFormat,
    /// Engine output format.
    pub output: EngineFormat,
    /// Rendering intent.
    pub intent: Intent,
    /// Creation flags.
    pub flags: TransformFlags,
    /// Intent used towards the proofing profile.
    pub proof_intent: Intent,
    /// Tag of source buffers.
    pub src_tag: Tag,
    /// Tag of destination buffers.
    pub dest_tag: Tag,
}

impl fmt::Display for TransformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.profiles.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            f.write_str(key)?;
        }
        write!(
            f,
            " [{}:{}:{}:{:#x}:{}:{:#x}:{:#x}]",
            self.input,
            self.output,
            self.intent.code(),
            self.flags.bits(),
            self.proof_intent.code(),
            self.src_tag.code(),
            self.dest_tag.code()
        )
    }
}

/// Where a transform's engine handle currently lives.
#[derive(Debug)]
pub enum Residency {
    /// Handle in memory; `link` is the device link file it was exported
    /// to, if export succeeded.
    Resident {
        /// Live engine handle.
        handle: TransformHandle,
        /// Exported device link.
        link: Option<PathBuf>,
    },
    /// Handle dropped; rebuild it from the device link file.
    Evicted(PathBuf),
}

impl Residency {
    /// Device link file, if any.
    pub fn link(&self) -> Option<&Path> {
        match self {
            Self::Resident { link, .. } => link.as_deref(),
            Self::Evicted(path) => Some(path),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TransformEntry {
    pub(crate) key: TransformKey,
    pub(crate) input_space: ColorSpace,
    pub(crate) residency: RefCell<Residency>,
}

/// Shared reference to a cached transform.
#[derive(Clone)]
pub struct Transform(pub(crate) Rc<TransformEntry>);

impl Transform {
    pub(crate) fn new(key: TransformKey, input_space: ColorSpace, residency: Residency) -> Self {
        Self(Rc::new(TransformEntry {
            key,
            input_space,
            residency: RefCell::new(residency),
        }))
    }

    /// Identity key.
    pub fn key(&self) -> &TransformKey {
        &self.0.key
    }

    /// Tag of source buffers.
    pub fn src_tag(&self) -> Tag {
        self.0.key.src_tag
    }

    /// Tag of destination buffers.
    pub fn dest_tag(&self) -> Tag {
        self.0.key.dest_tag
    }

    /// Engine input format.
    pub fn input_format(&self) -> EngineFormat {
        self.0.key.input
    }

    /// Engine output format.
    pub fn output_format(&self) -> EngineFormat {
        self.0.key.output
    }

    /// Colour space of the first profile.
    pub fn input_space(&self) -> ColorSpace {
        self.0.input_space
    }

    /// Whether the engine handle is in memory.
    pub fn is_resident(&self) -> bool {
        matches!(*self.0.residency.borrow(), Residency::Resident { .. })
    }

    /// Device link file backing this transform.
    pub fn device_link(&self) -> Option<PathBuf> {
        self.0.residency.borrow().link().map(Path::to_path_buf)
    }

    /// Borrows the live engine handle.
    pub(crate) fn handle(&self) -> Option<Ref<'_, TransformHandle>> {
        Ref::filter_map(self.0.residency.borrow(), |r| match r {
            Residency::Resident { handle, .. } => Some(handle),
            Residency::Evicted(_) => None,
        })
        .ok()
    }

    pub(crate) fn set_residency(&self, residency: Residency) -> Residency {
        self.0.residency.replace(residency)
    }

    /// Whether both references point at the same entity.
    pub fn same_entity(&self, other: &Transform) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.same_entity(other)
    }
}

impl Eq for Transform {}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("key", &self.0.key.to_string())
            .field("resident", &self.is_resident())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinecms_core::Tag;

    fn key(intent: Intent) -> TransformKey {
        let rgb = EngineFormat::new(ColorSpace::Rgb, 3, 1, 1, false);
        TransformKey {
            profiles: vec!["a".into(), "b".into()],
            input: rgb,
            output: rgb,
            intent,
            flags: TransformFlags::empty(),
            proof_intent: Intent::Perceptual,
            src_tag: Tag::RGBA_U8,
            dest_tag: Tag::RGBA_U8,
        }
    }

    #[test]
    fn test_key_structural_equality() {
        assert_eq!(key(Intent::Perceptual), key(Intent::Perceptual));
        assert_ne!(key(Intent::Perceptual), key(Intent::Saturation));
        assert_eq!(key(Intent::Perceptual).to_string(), key(Intent::Perceptual).to_string());
    }

    #[test]
    fn test_key_does_not_match_prefix() {
        let mut longer = key(Intent::Perceptual);
        longer.profiles.push("c".into());
        assert_ne!(longer, key(Intent::Perceptual));
    }
}
