//! Transform construction from an ordered profile chain.
//!
//! Three shapes are built:
//!
//! - plain: one multiprofile transform over the whole chain;
//! - soft proof with three profiles: image, proof, display;
//! - soft proof with more: everything before the proof profile is collapsed
//!   into a device link first, then proofed against the last two. That
//!   result is costly to make and is marked `expensive`.

use cinecms_core::{Precision, Tag};
use tracing::debug;

use crate::engine::{ColorSpace, EngineFormat, ProfileHandle, TransformFlags, TransformHandle};
use crate::{IccError, IccResult, Intent, Profile};

/// Engine format for buffers of `tag` in the colour space of `profile`.
///
/// Channels of the tag beyond the profile's colour channels become extra
/// channels. Float precisions map to doubles; the converter unpacks them.
pub fn native_format(tag: Tag, profile: &Profile) -> IccResult<EngineFormat> {
    format_for(tag, profile.color_space())
}

pub(crate) fn format_for(tag: Tag, space: ColorSpace) -> IccResult<EngineFormat> {
    let needed = space.channels();
    let available = tag.num_channels();
    if needed > available {
        return Err(IccError::ChannelMismatch {
            color_space: space.name(),
            needed,
            available,
        });
    }
    let extra = available - needed;
    let format = match tag.precision() {
        Precision::U8 => EngineFormat::new(space, needed, extra, 1, false),
        Precision::U16 => EngineFormat::new(space, needed, extra, 2, false),
        Precision::F16 | Precision::F32 => EngineFormat::new(space, needed, extra, 0, true),
    };
    Ok(format)
}

/// A freshly built engine transform.
#[derive(Debug)]
pub struct BuiltTransform {
    /// The engine handle.
    pub handle: TransformHandle,
    /// Built through a device link collapse; cached in the single slot.
    pub expensive: bool,
}

/// Builds the engine transform for a chain.
pub fn build(
    profiles: &[&ProfileHandle],
    input: EngineFormat,
    output: EngineFormat,
    intent: Intent,
    flags: TransformFlags,
    proof_intent: Intent,
) -> IccResult<BuiltTransform> {
    let n = profiles.len();
    if n == 0 {
        return Err(IccError::EmptyChain);
    }

    if flags.contains(TransformFlags::SOFT_PROOFING) && n >= 3 {
        if n == 3 {
            let handle = TransformHandle::proofing(
                profiles[0],
                input,
                profiles[2],
                output,
                profiles[1],
                intent,
                proof_intent,
                flags,
            )?;
            return Ok(BuiltTransform {
                handle,
                expensive: false,
            });
        }

        debug!(profiles = n, "collapsing proof chain into a device link");
        let head = TransformHandle::multiprofile(
            &profiles[..n - 2],
            input,
            output.without_color_space_check(),
            intent,
            flags,
        )?;
        let link = head.to_device_link(TransformFlags::GUESS_DEVICE_CLASS)?;
        drop(head);
        let handle = TransformHandle::proofing(
            &link,
            input,
            profiles[n - 1],
            output,
            profiles[n - 2],
            intent,
            proof_intent,
            flags,
        )?;
        return Ok(BuiltTransform {
            handle,
            expensive: true,
        });
    }

    let handle = TransformHandle::multiprofile(profiles, input, output, intent, flags)?;
    Ok(BuiltTransform {
        handle,
        expensive: false,
    })
}
