//! Tiled pixel buffers and the areas used to walk them.
//!
//! [`TiledBuffer`] stores an image as a grid of independently allocated
//! tiles, each tile row-major and tightly packed in the buffer's [`Tag`]
//! layout. A [`PixelArea`] (read-only) or [`PixelAreaMut`] is a rectangle
//! inside one buffer.
//!
//! Processing two areas together uses [`AreaChunks`]: it partitions the
//! shared area size into chunks that never cross a tile boundary of
//! *either* buffer, so every row of a chunk is one contiguous slice on both
//! sides. Each area keeps its own tile geometry; the buffers may use
//! different tile sizes and offsets.
//!
//! ```rust
//! use cinecms_core::{AreaChunks, Rect, Tag, TiledBuffer};
//!
//! let src = TiledBuffer::new(100, 60, Tag::RGBA_U8, 64, 64).unwrap();
//! let mut dst = TiledBuffer::new(100, 60, Tag::RGBA_U8, 32, 32).unwrap();
//! let src_area = src.area(Rect::from_size(100, 60)).unwrap();
//! let dst_area = dst.area_mut(Rect::from_size(100, 60)).unwrap();
//! let chunks = AreaChunks::new(&src_area, &dst_area).unwrap();
//! let covered: u64 = chunks.map(|c| c.area()).sum();
//! assert_eq!(covered, 6000);
//! ```

use crate::{Error, Rect, Result, Tag};

/// An image stored as a grid of tiles.
#[derive(Debug, Clone)]
pub struct TiledBuffer {
    tag: Tag,
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    tiles_x: u32,
    tiles: Vec<Vec<u8>>,
}

impl TiledBuffer {
    /// Creates a zero-filled buffer.
    pub fn new(width: u32, height: u32, tag: Tag, tile_width: u32, tile_height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_dimensions(width, height, "buffer is empty"));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(Error::invalid_dimensions(tile_width, tile_height, "tile is empty"));
        }
        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);
        let bpp = tag.bytes_per_pixel();
        let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let w = tile_width.min(width - tx * tile_width);
                let h = tile_height.min(height - ty * tile_height);
                tiles.push(vec![0u8; w as usize * h as usize * bpp]);
            }
        }
        Ok(Self {
            tag,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles,
        })
    }

    /// Creates a buffer from row-major, tightly packed pixel data.
    pub fn from_data(
        width: u32,
        height: u32,
        tag: Tag,
        tile_width: u32,
        tile_height: u32,
        data: &[u8],
    ) -> Result<Self> {
        let expected = width as usize * height as usize * tag.bytes_per_pixel();
        if data.len() != expected {
            return Err(Error::DataLength {
                expected,
                got: data.len(),
            });
        }
        let mut buffer = Self::new(width, height, tag, tile_width, tile_height)?;
        let row_bytes = width as usize * tag.bytes_per_pixel();
        for y in 0..height {
            let src = &data[y as usize * row_bytes..(y as usize + 1) * row_bytes];
            buffer.write_row(y, src);
        }
        Ok(buffer)
    }

    /// Copies the buffer out as row-major, tightly packed pixel data.
    pub fn to_data(&self) -> Vec<u8> {
        let bpp = self.tag.bytes_per_pixel();
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * bpp);
        for y in 0..self.height {
            let mut x = 0;
            while x < self.width {
                let span = self.cols_left_in_tile(x).min(self.width - x);
                out.extend_from_slice(self.row(x, y, span));
                x += span;
            }
        }
        out
    }

    fn write_row(&mut self, y: u32, src: &[u8]) {
        let bpp = self.tag.bytes_per_pixel();
        let mut x = 0;
        while x < self.width {
            let span = self.cols_left_in_tile(x).min(self.width - x);
            let start = x as usize * bpp;
            self.row_mut(x, y, span)
                .copy_from_slice(&src[start..start + span as usize * bpp]);
            x += span;
        }
    }

    /// Buffer tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full buffer bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Pixels from `x` to the right edge of its tile.
    #[inline]
    fn cols_left_in_tile(&self, x: u32) -> u32 {
        self.tile_width - x % self.tile_width
    }

    /// Rows from `y` to the bottom edge of its tile.
    #[inline]
    fn rows_left_in_tile(&self, y: u32) -> u32 {
        self.tile_height - y % self.tile_height
    }

    /// Tile index and byte offset of pixel (x, y).
    fn locate(&self, x: u32, y: u32) -> (usize, usize) {
        let tx = x / self.tile_width;
        let ty = y / self.tile_height;
        let tile_w = self.tile_width.min(self.width - tx * self.tile_width);
        let lx = x % self.tile_width;
        let ly = y % self.tile_height;
        let index = (ty * self.tiles_x + tx) as usize;
        let offset = (ly as usize * tile_w as usize + lx as usize) * self.tag.bytes_per_pixel();
        (index, offset)
    }

    /// Bytes of `len` pixels starting at (x, y); the span must stay in one tile.
    ///
    /// # Panics
    ///
    /// Panics if the span crosses a tile boundary or leaves the buffer.
    pub fn row(&self, x: u32, y: u32, len: u32) -> &[u8] {
        assert!(len <= self.cols_left_in_tile(x) && x + len <= self.width && y < self.height);
        let (index, offset) = self.locate(x, y);
        &self.tiles[index][offset..offset + len as usize * self.tag.bytes_per_pixel()]
    }

    /// Mutable bytes of `len` pixels starting at (x, y); the span must stay in one tile.
    ///
    /// # Panics
    ///
    /// Panics if the span crosses a tile boundary or leaves the buffer.
    pub fn row_mut(&mut self, x: u32, y: u32, len: u32) -> &mut [u8] {
        assert!(len <= self.cols_left_in_tile(x) && x + len <= self.width && y < self.height);
        let (index, offset) = self.locate(x, y);
        let bpp = self.tag.bytes_per_pixel();
        &mut self.tiles[index][offset..offset + len as usize * bpp]
    }

    /// Read-only area over `region`.
    pub fn area(&self, region: Rect) -> Result<PixelArea<'_>> {
        self.check_region(region)?;
        Ok(PixelArea {
            buffer: self,
            region,
        })
    }

    /// Mutable area over `region`.
    pub fn area_mut(&mut self, region: Rect) -> Result<PixelAreaMut<'_>> {
        self.check_region(region)?;
        Ok(PixelAreaMut {
            buffer: self,
            region,
        })
    }

    fn check_region(&self, region: Rect) -> Result<()> {
        if region.is_empty() || !self.bounds().contains_rect(&region) {
            return Err(Error::invalid_region(region, self.width, self.height));
        }
        Ok(())
    }
}

/// Tile geometry of an area, as seen by [`AreaChunks`].
pub trait TileSpans {
    /// Area region inside its buffer.
    fn region(&self) -> Rect;
    /// Pixels from area-relative column `x` to the end of its tile.
    fn cols_left(&self, x: u32) -> u32;
    /// Rows from area-relative row `y` to the end of its tile.
    fn rows_left(&self, y: u32) -> u32;
}

/// Read-only rectangle of a [`TiledBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct PixelArea<'a> {
    buffer: &'a TiledBuffer,
    region: Rect,
}

impl<'a> PixelArea<'a> {
    /// Tag of the underlying buffer.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.buffer.tag
    }

    /// Bytes of `len` pixels at area-relative (x, y).
    pub fn row(&self, x: u32, y: u32, len: u32) -> &'a [u8] {
        self.buffer.row(self.region.x + x, self.region.y + y, len)
    }
}

impl TileSpans for PixelArea<'_> {
    fn region(&self) -> Rect {
        self.region
    }

    fn cols_left(&self, x: u32) -> u32 {
        self.buffer.cols_left_in_tile(self.region.x + x)
    }

    fn rows_left(&self, y: u32) -> u32 {
        self.buffer.rows_left_in_tile(self.region.y + y)
    }
}

/// Mutable rectangle of a [`TiledBuffer`].
#[derive(Debug)]
pub struct PixelAreaMut<'a> {
    buffer: &'a mut TiledBuffer,
    region: Rect,
}

impl PixelAreaMut<'_> {
    /// Tag of the underlying buffer.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.buffer.tag
    }

    /// Mutable bytes of `len` pixels at area-relative (x, y).
    pub fn row_mut(&mut self, x: u32, y: u32, len: u32) -> &mut [u8] {
        self.buffer.row_mut(self.region.x + x, self.region.y + y, len)
    }
}

impl TileSpans for PixelAreaMut<'_> {
    fn region(&self) -> Rect {
        self.region
    }

    fn cols_left(&self, x: u32) -> u32 {
        self.buffer.cols_left_in_tile(self.region.x + x)
    }

    fn rows_left(&self, y: u32) -> u32 {
        self.buffer.rows_left_in_tile(self.region.y + y)
    }
}

/// Iterator over area-relative chunks that stay inside one tile of both areas.
///
/// Chunks are produced in horizontal bands, top to bottom. The band height
/// is limited by the tile rows left in either area, the chunk width by the
/// tile columns left in either area.
#[derive(Debug, Clone)]
pub struct AreaChunks {
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    band: u32,
    src_cols: Vec<u32>,
    dst_cols: Vec<u32>,
    src_rows: Vec<u32>,
    dst_rows: Vec<u32>,
}

impl AreaChunks {
    /// Registers two areas of equal size for joint processing.
    pub fn new(src: &impl TileSpans, dst: &impl TileSpans) -> Result<Self> {
        let (a, b) = (src.region(), dst.region());
        if a.width != b.width || a.height != b.height {
            return Err(Error::dimension_mismatch((a.width, a.height), (b.width, b.height)));
        }
        let mut chunks = Self {
            width: a.width,
            height: a.height,
            x: 0,
            y: 0,
            band: 0,
            src_cols: (0..a.width).map(|x| src.cols_left(x)).collect(),
            dst_cols: (0..a.width).map(|x| dst.cols_left(x)).collect(),
            src_rows: (0..a.height).map(|y| src.rows_left(y)).collect(),
            dst_rows: (0..a.height).map(|y| dst.rows_left(y)).collect(),
        };
        chunks.band = chunks.band_height(0);
        Ok(chunks)
    }

    fn band_height(&self, y: u32) -> u32 {
        if y >= self.height {
            return 0;
        }
        let i = y as usize;
        self.src_rows[i].min(self.dst_rows[i]).min(self.height - y)
    }
}

impl Iterator for AreaChunks {
    type Item = Rect;

    fn next(&mut self) -> Option<Rect> {
        if self.y >= self.height {
            return None;
        }
        let i = self.x as usize;
        let w = self.src_cols[i].min(self.dst_cols[i]).min(self.width - self.x);
        let chunk = Rect::new(self.x, self.y, w, self.band);
        self.x += w;
        if self.x >= self.width {
            self.x = 0;
            self.y += self.band;
            self.band = self.band_height(self.y);
        }
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorFormat, Precision};

    fn gradient(width: u32, height: u32, tag: Tag) -> Vec<u8> {
        let n = width as usize * height as usize * tag.bytes_per_pixel();
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_round_trip_data() {
        let tag = Tag::RGBA_U8;
        let data = gradient(37, 21, tag);
        let buffer = TiledBuffer::from_data(37, 21, tag, 8, 5, &data).unwrap();
        assert_eq!(buffer.to_data(), data);
    }

    #[test]
    fn test_wrong_length() {
        let err = TiledBuffer::from_data(4, 4, Tag::RGB_U8, 2, 2, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: 48, got: 10 }));
    }

    #[test]
    fn test_region_outside() {
        let buffer = TiledBuffer::new(10, 10, Tag::RGB_U8, 4, 4).unwrap();
        assert!(buffer.area(Rect::new(5, 5, 6, 1)).is_err());
        assert!(buffer.area(Rect::new(5, 5, 0, 1)).is_err());
        assert!(buffer.area(Rect::new(5, 5, 5, 5)).is_ok());
    }

    #[test]
    fn test_chunks_respect_both_grids() {
        let src = TiledBuffer::new(50, 40, Tag::RGBA_U8, 16, 16).unwrap();
        let mut dst = TiledBuffer::new(60, 50, Tag::RGBA_F32, 7, 9).unwrap();
        let sa = src.area(Rect::new(3, 2, 40, 30)).unwrap();
        let da = dst.area_mut(Rect::new(11, 5, 40, 30)).unwrap();
        let chunks: Vec<Rect> = AreaChunks::new(&sa, &da).unwrap().collect();

        let total: u64 = chunks.iter().map(|c| c.area()).sum();
        assert_eq!(total, 1200);
        for c in &chunks {
            // one tile on each side
            assert!(c.width <= sa.cols_left(c.x) && c.width <= da.cols_left(c.x));
            assert!(c.height <= sa.rows_left(c.y) && c.height <= da.rows_left(c.y));
        }
    }

    #[test]
    fn test_chunks_size_mismatch() {
        let src = TiledBuffer::new(10, 10, Tag::RGB_U8, 4, 4).unwrap();
        let mut dst = TiledBuffer::new(10, 10, Tag::RGB_U8, 4, 4).unwrap();
        let sa = src.area(Rect::from_size(10, 10)).unwrap();
        let da = dst.area_mut(Rect::from_size(9, 10)).unwrap();
        assert!(AreaChunks::new(&sa, &da).is_err());
    }

    #[test]
    fn test_row_access() {
        let tag = Tag::new(Precision::U8, ColorFormat::Gray, false);
        let data: Vec<u8> = (0..64).collect();
        let buffer = TiledBuffer::from_data(8, 8, tag, 4, 4, &data).unwrap();
        assert_eq!(buffer.row(4, 1, 4), &[12, 13, 14, 15]);
        let area = buffer.area(Rect::new(4, 4, 4, 4)).unwrap();
        assert_eq!(area.row(0, 0, 4), &[36, 37, 38, 39]);
    }
}
