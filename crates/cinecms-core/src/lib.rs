//! # cinecms-core
//!
//! Pixel-buffer primitives shared by the cinecms crates.
//!
//! - [`Tag`] - precision, colour format and alpha of a buffer
//! - [`Rect`] - regions in pixel space
//! - [`TiledBuffer`] - tile-backed image storage
//! - [`PixelArea`] / [`PixelAreaMut`] - rectangles inside a buffer
//! - [`AreaChunks`] - joint tile-aligned walk over two areas
//!
//! ```rust
//! use cinecms_core::prelude::*;
//!
//! let buffer = TiledBuffer::new(64, 64, Tag::RGBA_F32, 32, 32).unwrap();
//! assert_eq!(buffer.bounds(), Rect::from_size(64, 64));
//! ```

#![warn(missing_docs)]

mod area;
mod error;
mod format;
mod rect;

pub use area::{AreaChunks, PixelArea, PixelAreaMut, TileSpans, TiledBuffer};
pub use error::{Error, Result};
pub use format::{ColorFormat, F16_ONE_BITS, Precision, Tag};
pub use rect::Rect;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AreaChunks, ColorFormat, Error, PixelArea, PixelAreaMut, Precision, Rect, Result, Tag,
        TileSpans, TiledBuffer,
    };
}
