//! Error types for cinecms-core operations.
//!
//! Covers the geometry and layout failures of tiled pixel buffers: areas
//! outside their buffer, mismatched area sizes and raw data of the wrong
//! length.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by pixel buffer and area operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Region of interest extends beyond buffer bounds.
    #[error("region {region} exceeds buffer bounds {width}x{height}")]
    InvalidRegion {
        /// Requested region
        region: crate::Rect,
        /// Buffer width
        width: u32,
        /// Buffer height
        height: u32,
    },

    /// Two areas that must be processed together differ in size.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First area width
        a_width: u32,
        /// First area height
        a_height: u32,
        /// Second area width
        b_width: u32,
        /// Second area height
        b_height: u32,
    },

    /// Invalid buffer or tile dimensions.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Raw data length does not match the buffer layout.
    #[error("data length {got} does not match expected {expected}")]
    DataLength {
        /// Expected number of bytes
        expected: usize,
        /// Provided number of bytes
        got: usize,
    },
}

impl Error {
    /// Creates an [`Error::InvalidRegion`] error.
    #[inline]
    pub fn invalid_region(region: crate::Rect, width: u32, height: u32) -> Self {
        Self::InvalidRegion {
            region,
            width,
            height,
        }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (u32, u32), b: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a bounds-related error.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::InvalidRegion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rect;

    #[test]
    fn test_invalid_region() {
        let err = Error::invalid_region(Rect::new(0, 0, 200, 10), 100, 100);
        assert!(err.to_string().contains("100x100"));
        assert!(err.is_bounds_error());
    }

    #[test]
    fn test_dimension_mismatch() {
        let msg = Error::dimension_mismatch((100, 100), (200, 200)).to_string();
        assert!(msg.contains("100x100"));
        assert!(msg.contains("200x200"));
    }
}
