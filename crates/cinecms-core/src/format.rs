//! Pixel precisions, colour formats and buffer tags.
//!
//! A [`Tag`] is the compact descriptor the host attaches to every pixel
//! buffer: sample [`Precision`], [`ColorFormat`] and whether a trailing
//! alpha channel is present. Colour management only needs the derived
//! channel count and sample size, plus a stable numeric code used in cache
//! keys.
//!
//! # Usage
//!
//! ```rust
//! use cinecms_core::{ColorFormat, Precision, Tag};
//!
//! let rgba8 = Tag::new(Precision::U8, ColorFormat::Rgb, true);
//! assert_eq!(rgba8.num_channels(), 4);
//! assert_eq!(rgba8.bytes_per_pixel(), 4);
//!
//! let grayf = Tag::new(Precision::F32, ColorFormat::Gray, false);
//! assert_eq!(grayf.bytes_per_pixel(), 4);
//! ```

use half::f16;

/// Sample precision of a pixel buffer.
///
/// - `U8` - 8-bit unsigned [0, 255]
/// - `U16` - 16-bit unsigned [0, 65535]
/// - `F16` - 16-bit half-precision IEEE 754, stored as raw bits
/// - `F32` - 32-bit single-precision IEEE 754
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    /// 8-bit unsigned integer.
    #[default]
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 16-bit half-precision float.
    F16,
    /// 32-bit single-precision float.
    F32,
}

impl Precision {
    /// Number of bytes per channel.
    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::F32 => 4,
        }
    }

    /// Whether this is a floating-point format.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F16 | Self::F32)
    }

    /// Whether this is an integer format.
    #[inline]
    pub const fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// Full-opacity value as a normalized float.
    #[inline]
    pub const fn opaque(&self) -> f64 {
        match self {
            Self::U8 => 255.0,
            Self::U16 => 65535.0,
            Self::F16 | Self::F32 => 1.0,
        }
    }

    /// Short name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::F16 => "f16",
            Self::F32 => "f32",
        }
    }

    const fn code(&self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F16 => 3,
            Self::F32 => 4,
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Colour layout of a pixel buffer, excluding alpha.
///
/// CMYK data travels in RGB-with-alpha buffers: the profile decides how
/// many of the buffer's channels carry colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorFormat {
    /// Three colour channels.
    #[default]
    Rgb,
    /// One luminance channel.
    Gray,
    /// One palette index channel.
    Indexed,
}

impl ColorFormat {
    /// Number of channels before alpha.
    #[inline]
    pub const fn channels(&self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Gray | Self::Indexed => 1,
        }
    }

    const fn code(&self) -> u32 {
        match self {
            Self::Rgb => 1,
            Self::Gray => 2,
            Self::Indexed => 3,
        }
    }
}

/// Descriptor of a pixel buffer's precision, colour format and alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag {
    precision: Precision,
    format: ColorFormat,
    alpha: bool,
}

impl Tag {
    /// Creates a tag.
    #[inline]
    pub const fn new(precision: Precision, format: ColorFormat, alpha: bool) -> Self {
        Self {
            precision,
            format,
            alpha,
        }
    }

    /// 8-bit RGB without alpha.
    pub const RGB_U8: Tag = Tag::new(Precision::U8, ColorFormat::Rgb, false);
    /// 8-bit RGB with alpha.
    pub const RGBA_U8: Tag = Tag::new(Precision::U8, ColorFormat::Rgb, true);
    /// 16-bit RGB with alpha.
    pub const RGBA_U16: Tag = Tag::new(Precision::U16, ColorFormat::Rgb, true);
    /// Half-float RGB with alpha.
    pub const RGBA_F16: Tag = Tag::new(Precision::F16, ColorFormat::Rgb, true);
    /// Float RGB with alpha.
    pub const RGBA_F32: Tag = Tag::new(Precision::F32, ColorFormat::Rgb, true);

    /// Sample precision.
    #[inline]
    pub const fn precision(&self) -> Precision {
        self.precision
    }

    /// Colour format.
    #[inline]
    pub const fn format(&self) -> ColorFormat {
        self.format
    }

    /// Whether the last channel is alpha.
    #[inline]
    pub const fn has_alpha(&self) -> bool {
        self.alpha
    }

    /// Total number of channels, alpha included.
    #[inline]
    pub const fn num_channels(&self) -> usize {
        self.format.channels() + if self.alpha { 1 } else { 0 }
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.num_channels() * self.precision.bytes_per_channel()
    }

    /// Same tag with a different precision.
    #[inline]
    pub const fn with_precision(self, precision: Precision) -> Self {
        Self { precision, ..self }
    }

    /// Stable numeric code used inside cache keys.
    #[inline]
    pub const fn code(&self) -> u32 {
        (self.precision.code() << 8) | (self.format.code() << 4) | self.alpha as u32
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = match self.format {
            ColorFormat::Rgb => "rgb",
            ColorFormat::Gray => "gray",
            ColorFormat::Indexed => "indexed",
        };
        let alpha = if self.alpha { "a" } else { "" };
        write!(f, "{}{}/{}", base, alpha, self.precision)
    }
}

/// Half-float one, the opaque alpha value of [`Precision::F16`] buffers.
pub const F16_ONE_BITS: u16 = f16::ONE.to_bits();
