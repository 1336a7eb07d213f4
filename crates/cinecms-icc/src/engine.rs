//! Thin layer over the Little CMS 2 C API.
//!
//! Pixel layouts in this crate are only known at runtime (a buffer tag
//! decides channel count and sample size), so transforms go through the raw
//! `lcms2-sys` functions with an explicit [`EngineFormat`] instead of the
//! typed `lcms2::Transform`. Every engine handle is owned by exactly one
//! wrapper whose `Drop` releases it.

use std::ffi::c_void;
use std::fmt;

use bitflags::bitflags;
use lcms2_sys as ffi;
use serde::{Deserialize, Serialize};

use crate::{IccError, IccResult, Intent};

/// Device link version written on export.
pub const DEVICE_LINK_VERSION: f64 = 4.3;

// Pixel-type codes of the engine's format word.
const PT_ANY: u32 = 0;
const PT_GRAY: u32 = 3;
const PT_RGB: u32 = 4;
const PT_CMY: u32 = 5;
const PT_CMYK: u32 = 6;
const PT_YCBCR: u32 = 7;
const PT_YUV: u32 = 8;
const PT_XYZ: u32 = 9;
const PT_LAB: u32 = 10;
const PT_HSV: u32 = 12;
const PT_HLS: u32 = 13;
const PT_YXY: u32 = 14;
const PT_MCH1: u32 = 15;

bitflags! {
    /// Transform creation flags, bit-compatible with the engine's `cmsFLAGS_*`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TransformFlags: u32 {
        /// Skip the 1-pixel cache.
        const NO_CACHE = 0x0040;
        /// Keep the full pipeline, do not optimize.
        const NO_OPTIMIZE = 0x0100;
        /// Copy input to output unchanged.
        const NULL_TRANSFORM = 0x0200;
        /// Mark out-of-gamut colours.
        const GAMUT_CHECK = 0x1000;
        /// Simulate the proofing device on the output device.
        const SOFT_PROOFING = 0x4000;
        /// Black point compensation.
        const BLACK_POINT_COMPENSATION = 0x2000;
        /// Larger precalculated tables.
        const HIGH_RES_PRECALC = 0x0400;
        /// Smaller precalculated tables.
        const LOW_RES_PRECALC = 0x0800;
        /// Let a device link guess its device class.
        const GUESS_DEVICE_CLASS = 0x0020;
    }
}

/// Colour space of a profile, decoded from its ICC header signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Single-channel gray.
    Gray,
    /// Red, green, blue.
    Rgb,
    /// Cyan, magenta, yellow.
    Cmy,
    /// Cyan, magenta, yellow, black.
    Cmyk,
    /// Luma plus two chroma channels.
    YCbCr,
    /// CIE Luv.
    Luv,
    /// CIE XYZ.
    Xyz,
    /// CIE L*a*b*.
    Lab,
    /// CIE Yxy.
    Yxy,
    /// Hue, saturation, value.
    Hsv,
    /// Hue, lightness, saturation.
    Hls,
    /// Generic n-colour space (2..=15 channels).
    MultiColor(u8),
    /// Anything else, kept as the raw signature.
    Other(u32),
}

impl ColorSpace {
    /// Decodes an ICC colour space signature.
    pub fn from_signature(sig: u32) -> Self {
        match &sig.to_be_bytes() {
            b"GRAY" => Self::Gray,
            b"RGB " => Self::Rgb,
            b"CMY " => Self::Cmy,
            b"CMYK" => Self::Cmyk,
            b"YCbr" => Self::YCbCr,
            b"Luv " => Self::Luv,
            b"XYZ " => Self::Xyz,
            b"Lab " => Self::Lab,
            b"Yxy " => Self::Yxy,
            b"HSV " => Self::Hsv,
            b"HLS " => Self::Hls,
            [n, b'C', b'L', b'R'] => match (*n as char).to_digit(16) {
                Some(count @ 2..=15) => Self::MultiColor(count as u8),
                _ => Self::Other(sig),
            },
            _ => Self::Other(sig),
        }
    }

    /// Number of colour channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Cmyk => 4,
            Self::MultiColor(n) => *n as usize,
            _ => 3,
        }
    }

    /// Engine pixel-type code.
    fn pixel_type(&self) -> u32 {
        match self {
            Self::Gray => PT_GRAY,
            Self::Rgb => PT_RGB,
            Self::Cmy => PT_CMY,
            Self::Cmyk => PT_CMYK,
            Self::YCbCr => PT_YCBCR,
            Self::Luv => PT_YUV,
            Self::Xyz => PT_XYZ,
            Self::Lab => PT_LAB,
            Self::Yxy => PT_YXY,
            Self::Hsv => PT_HSV,
            Self::Hls => PT_HLS,
            Self::MultiColor(n) => PT_MCH1 + *n as u32 - 1,
            Self::Other(_) => PT_ANY,
        }
    }

    /// Float samples of this space are percentages (0..100) in the engine.
    pub fn is_percent_scaled(&self) -> bool {
        matches!(self, Self::Cmyk | Self::Cmy)
    }

    /// Short name, e.g. `RGB`, `Lab`, `CMYK`.
    pub fn name(&self) -> String {
        match self {
            Self::Gray => "GRAY".into(),
            Self::Rgb => "RGB".into(),
            Self::Cmy => "CMY".into(),
            Self::Cmyk => "CMYK".into(),
            Self::YCbCr => "YCbCr".into(),
            Self::Luv => "Luv".into(),
            Self::Xyz => "XYZ".into(),
            Self::Lab => "Lab".into(),
            Self::Yxy => "Yxy".into(),
            Self::Hsv => "HSV".into(),
            Self::Hls => "HLS".into(),
            Self::MultiColor(n) => format!("{n}CLR"),
            Self::Other(sig) => String::from_utf8_lossy(&sig.to_be_bytes()).trim().to_string(),
        }
    }

    /// Per-channel names.
    pub fn channel_names(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::Gray => &["Gray"],
            Self::Rgb => &["Red", "Green", "Blue"],
            Self::Cmy => &["Cyan", "Magenta", "Yellow"],
            Self::Cmyk => &["Cyan", "Magenta", "Yellow", "Black"],
            Self::YCbCr => &["Y", "Cb", "Cr"],
            Self::Luv => &["L", "u", "v"],
            Self::Xyz => &["X", "Y", "Z"],
            Self::Lab => &["L", "a", "b"],
            Self::Yxy => &["Y", "x", "y"],
            Self::Hsv => &["Hue", "Saturation", "Value"],
            Self::Hls => &["Hue", "Lightness", "Saturation"],
            _ => &[],
        };
        if fixed.is_empty() {
            (1..=self.channels()).map(|i| format!("Channel {i}")).collect()
        } else {
            fixed.iter().map(|s| s.to_string()).collect()
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// ICC device class of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Scanners and cameras.
    Input,
    /// Monitors.
    Display,
    /// Printers.
    Output,
    /// Device link.
    Link,
    /// Abstract effect.
    Abstract,
    /// Colour space conversion.
    ColorSpace,
    /// Named colour list.
    NamedColor,
}

impl DeviceClass {
    /// Decodes an ICC device class signature.
    pub fn from_signature(sig: u32) -> Option<Self> {
        match &sig.to_be_bytes() {
            b"scnr" => Some(Self::Input),
            b"mntr" => Some(Self::Display),
            b"prtr" => Some(Self::Output),
            b"link" => Some(Self::Link),
            b"abst" => Some(Self::Abstract),
            b"spac" => Some(Self::ColorSpace),
            b"nmcl" => Some(Self::NamedColor),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Display => "display",
            Self::Output => "output",
            Self::Link => "link",
            Self::Abstract => "abstract",
            Self::ColorSpace => "colorspace",
            Self::NamedColor => "named color",
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = IccError;

    fn from_str(s: &str) -> IccResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "display" => Ok(Self::Display),
            "output" => Ok(Self::Output),
            "link" => Ok(Self::Link),
            "abstract" => Ok(Self::Abstract),
            "colorspace" => Ok(Self::ColorSpace),
            "namedcolor" | "named" => Ok(Self::NamedColor),
            other => Err(IccError::Config(format!("unknown device class '{other}'"))),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine pixel format word: colour space, channel counts and sample size.
///
/// Bit layout follows the engine: bytes in bits 0-2, channels in 3-6,
/// extra channels in 7-9, pixel type in 16-20, float flag in bit 22.
/// A float format with zero bytes means 64-bit doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineFormat(u32);

impl EngineFormat {
    /// Builds a format word.
    ///
    /// `bytes` is 1 or 2 for integer samples; `float` selects doubles.
    pub fn new(space: ColorSpace, channels: usize, extra: usize, bytes: usize, float: bool) -> Self {
        let mut bits = (space.pixel_type() << 16) | ((channels as u32 & 0xF) << 3) | ((extra as u32 & 0x7) << 7);
        if float {
            bits |= 1 << 22;
        } else {
            bits |= bytes as u32 & 0x7;
        }
        Self(bits)
    }

    /// Wraps a raw format word.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw format word.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Engine pixel-type code.
    #[inline]
    pub const fn pixel_type(&self) -> u32 {
        (self.0 >> 16) & 0x1F
    }

    /// Colour channels.
    #[inline]
    pub const fn channels(&self) -> usize {
        ((self.0 >> 3) & 0xF) as usize
    }

    /// Extra (non-colour) channels.
    #[inline]
    pub const fn extra(&self) -> usize {
        ((self.0 >> 7) & 0x7) as usize
    }

    /// Colour plus extra channels.
    #[inline]
    pub const fn total_channels(&self) -> usize {
        self.channels() + self.extra()
    }

    /// Whether samples are doubles.
    #[inline]
    pub const fn is_float(&self) -> bool {
        self.0 & (1 << 22) != 0
    }

    /// Bytes per sample.
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        match self.0 & 0x7 {
            0 => 8,
            n => n as usize,
        }
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.total_channels() * self.bytes_per_sample()
    }

    /// Whether float samples of this format are percentages.
    #[inline]
    pub const fn is_percent_scaled(&self) -> bool {
        matches!(self.pixel_type(), PT_CMY | PT_CMYK)
    }

    /// Same format with the colour space left open, so the engine does not
    /// check it against the last profile.
    #[inline]
    pub const fn without_color_space_check(self) -> Self {
        Self(self.0 & !(0x1F << 16))
    }

    fn to_ffi(self) -> ffi::PixelFormat {
        ffi::PixelFormat(self.0)
    }
}

impl fmt::Display for EngineFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<Intent> for ffi::Intent {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Perceptual => ffi::Intent::Perceptual,
            Intent::RelativeColorimetric => ffi::Intent::RelativeColorimetric,
            Intent::Saturation => ffi::Intent::Saturation,
            Intent::AbsoluteColorimetric => ffi::Intent::AbsoluteColorimetric,
        }
    }
}

/// Sizes and counts the engine takes as 32-bit values.
fn engine_count(n: usize) -> Option<u32> {
    u32::try_from(n).ok()
}

/// Owned engine profile handle.
#[derive(Debug)]
pub struct ProfileHandle(ffi::HPROFILE);

impl ProfileHandle {
    /// Parses ICC bytes.
    pub fn open(data: &[u8]) -> IccResult<Self> {
        if data.is_empty() {
            return Err(IccError::ProfileOpen("no data".into()));
        }
        let len = engine_count(data.len()).ok_or_else(|| {
            IccError::ProfileOpen(format!("{} bytes exceed the engine's size limit", data.len()))
        })?;
        // SAFETY: the engine copies what it needs out of `data` before returning.
        let handle = unsafe { ffi::cmsOpenProfileFromMem(data.as_ptr() as *const c_void, len) };
        if handle.is_null() {
            return Err(IccError::ProfileOpen(format!("{} bytes not accepted by the engine", data.len())));
        }
        Ok(Self(handle))
    }

    /// Serializes the profile to ICC bytes.
    pub fn save_to_vec(&self) -> Option<Vec<u8>> {
        let mut size: u32 = 0;
        // SAFETY: a null buffer asks the engine for the needed size only.
        let ok = unsafe { ffi::cmsSaveProfileToMem(self.0, std::ptr::null_mut(), &mut size) };
        if ok == 0 || size == 0 {
            return None;
        }
        let mut data = vec![0u8; size as usize];
        // SAFETY: `data` holds exactly `size` writable bytes.
        let ok = unsafe { ffi::cmsSaveProfileToMem(self.0, data.as_mut_ptr() as *mut c_void, &mut size) };
        if ok == 0 {
            return None;
        }
        data.truncate(size as usize);
        Some(data)
    }

    #[inline]
    fn raw(&self) -> ffi::HPROFILE {
        self.0
    }
}

impl Drop for ProfileHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is non-null and owned by this wrapper alone.
        unsafe {
            ffi::cmsCloseProfile(self.0);
        }
    }
}

/// Owned engine transform handle, with the formats it was built for.
#[derive(Debug)]
pub struct TransformHandle {
    raw: ffi::HTRANSFORM,
    input: EngineFormat,
    output: EngineFormat,
}

impl TransformHandle {
    fn wrap(raw: ffi::HTRANSFORM, input: EngineFormat, output: EngineFormat, what: &str) -> IccResult<Self> {
        if raw.is_null() {
            return Err(IccError::TransformBuild(format!(
                "engine rejected {what} transform ({input} -> {output})"
            )));
        }
        Ok(Self { raw, input, output })
    }

    /// Transform through an ordered profile chain.
    pub fn multiprofile(
        profiles: &[&ProfileHandle],
        input: EngineFormat,
        output: EngineFormat,
        intent: Intent,
        flags: TransformFlags,
    ) -> IccResult<Self> {
        if profiles.is_empty() {
            return Err(IccError::EmptyChain);
        }
        let mut raw_profiles: Vec<ffi::HPROFILE> = profiles.iter().map(|p| p.raw()).collect();
        let n = engine_count(raw_profiles.len())
            .ok_or_else(|| IccError::TransformBuild(format!("{} profiles in one chain", raw_profiles.len())))?;
        // SAFETY: every handle in the array stays alive for the call.
        let raw = unsafe {
            ffi::cmsCreateMultiprofileTransform(
                raw_profiles.as_mut_ptr(),
                n,
                input.to_ffi(),
                output.to_ffi(),
                intent.into(),
                flags.bits(),
            )
        };
        Self::wrap(raw, input, output, "multiprofile")
    }

    /// Transform from `source` to `display` simulating `proof`.
    #[allow(clippy::too_many_arguments)]
    pub fn proofing(
        source: &ProfileHandle,
        input: EngineFormat,
        display: &ProfileHandle,
        output: EngineFormat,
        proof: &ProfileHandle,
        intent: Intent,
        proof_intent: Intent,
        flags: TransformFlags,
    ) -> IccResult<Self> {
        // SAFETY: all three handles stay alive for the call.
        let raw = unsafe {
            ffi::cmsCreateProofingTransform(
                source.raw(),
                input.to_ffi(),
                display.raw(),
                output.to_ffi(),
                proof.raw(),
                intent.into(),
                proof_intent.into(),
                flags.bits(),
            )
        };
        Self::wrap(raw, input, output, "proofing")
    }

    /// Transform through a single device link profile.
    pub fn from_device_link(
        link: &ProfileHandle,
        input: EngineFormat,
        output: EngineFormat,
        intent: Intent,
        flags: TransformFlags,
    ) -> IccResult<Self> {
        let flags = flags - TransformFlags::SOFT_PROOFING - TransformFlags::GAMUT_CHECK;
        // SAFETY: a null output profile makes the engine use the link alone.
        let raw = unsafe {
            ffi::cmsCreateTransform(
                link.raw(),
                input.to_ffi(),
                std::ptr::null_mut(),
                output.to_ffi(),
                intent.into(),
                flags.bits(),
            )
        };
        Self::wrap(raw, input, output, "device link")
    }

    /// Collapses the transform into a device link profile.
    pub fn to_device_link(&self, flags: TransformFlags) -> IccResult<ProfileHandle> {
        // SAFETY: `self.raw` is a live transform.
        let raw = unsafe { ffi::cmsTransform2DeviceLink(self.raw, DEVICE_LINK_VERSION, flags.bits()) };
        if raw.is_null() {
            return Err(IccError::TransformBuild("device link conversion failed".into()));
        }
        Ok(ProfileHandle(raw))
    }

    /// Input format.
    #[inline]
    pub fn input_format(&self) -> EngineFormat {
        self.input
    }

    /// Output format.
    #[inline]
    pub fn output_format(&self) -> EngineFormat {
        self.output
    }

    /// Runs the engine over `pixels` pixels.
    pub fn apply(&self, src: &[u8], dst: &mut [u8], pixels: usize) -> IccResult<()> {
        let need_in = pixels * self.input.bytes_per_pixel();
        let need_out = pixels * self.output.bytes_per_pixel();
        if src.len() < need_in || dst.len() < need_out {
            return Err(IccError::InvalidBuffer(format!(
                "{pixels} pixels need {need_in}/{need_out} bytes, got {}/{}",
                src.len(),
                dst.len()
            )));
        }
        if pixels == 0 {
            return Ok(());
        }
        let count = engine_count(pixels)
            .ok_or_else(|| IccError::InvalidBuffer(format!("{pixels} pixels exceed one engine call")))?;
        // SAFETY: both buffers were checked to cover `pixels` pixels of their format.
        unsafe {
            ffi::cmsDoTransform(
                self.raw,
                src.as_ptr() as *const c_void,
                dst.as_mut_ptr() as *mut c_void,
                count,
            );
        }
        Ok(())
    }
}

impl Drop for TransformHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is non-null and owned by this wrapper alone.
        unsafe {
            ffi::cmsDeleteTransform(self.raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bits_match_engine() {
        let rgb8 = EngineFormat::new(ColorSpace::Rgb, 3, 0, 1, false);
        assert_eq!(rgb8.bits(), ffi::PixelFormat::RGB_8.0);
        let rgba16 = EngineFormat::new(ColorSpace::Rgb, 3, 1, 2, false);
        assert_eq!(rgba16.bits(), ffi::PixelFormat::RGBA_16.0);
        let cmyk_dbl = EngineFormat::new(ColorSpace::Cmyk, 4, 0, 0, true);
        assert_eq!(cmyk_dbl.bits(), ffi::PixelFormat::CMYK_DBL.0);
    }

    #[test]
    fn test_format_accessors() {
        let f = EngineFormat::new(ColorSpace::Rgb, 3, 1, 0, true);
        assert_eq!(f.channels(), 3);
        assert_eq!(f.extra(), 1);
        assert!(f.is_float());
        assert_eq!(f.bytes_per_pixel(), 32);
        assert_eq!(f.without_color_space_check().pixel_type(), PT_ANY);
        assert_eq!(f.without_color_space_check().channels(), 3);
    }

    #[test]
    fn test_color_space_signatures() {
        assert_eq!(ColorSpace::from_signature(u32::from_be_bytes(*b"RGB ")), ColorSpace::Rgb);
        assert_eq!(ColorSpace::from_signature(u32::from_be_bytes(*b"CMYK")).channels(), 4);
        assert_eq!(
            ColorSpace::from_signature(u32::from_be_bytes(*b"6CLR")),
            ColorSpace::MultiColor(6)
        );
        assert_eq!(ColorSpace::Lab.name(), "Lab");
        assert!(ColorSpace::Cmyk.is_percent_scaled());
    }

    #[test]
    fn test_device_class() {
        assert_eq!(
            DeviceClass::from_signature(u32::from_be_bytes(*b"mntr")),
            Some(DeviceClass::Display)
        );
        assert_eq!("Output".parse::<DeviceClass>().unwrap(), DeviceClass::Output);
        assert!("bogus".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn test_engine_count_limit() {
        assert_eq!(engine_count(0), Some(0));
        assert_eq!(engine_count(u32::MAX as usize), Some(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(engine_count(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_open_garbage_fails() {
        assert!(ProfileHandle::open(&[]).is_err());
        assert!(ProfileHandle::open(&[0u8; 64]).is_err());
    }
}
