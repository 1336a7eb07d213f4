//! Applies transforms to pixel buffers and tiled areas.
//!
//! Integer buffers go straight through the engine. Float buffers (half or
//! single) are unpacked to doubles first and packed back afterwards; colour
//! channels of CMYK-like spaces travel as percentages in the engine.
//!
//! Destination channels the engine does not write are filled by one rule
//! for every precision: a trailing alpha channel becomes opaque, any other
//! channel copies the channel before it.

use cinecms_core::{AreaChunks, PixelArea, PixelAreaMut, Precision, Tag, TileSpans};
use half::f16;
use tracing::{trace, warn};

use crate::engine::{EngineFormat, TransformHandle};
use crate::{IccError, IccResult, Transform};

/// One channel value in a pixel buffer.
pub trait Sample: Copy {
    /// Bytes per sample.
    const SIZE: usize;
    /// Full opacity.
    const OPAQUE: Self;

    /// Reads a sample from native-endian bytes.
    fn read(bytes: &[u8]) -> Self;
    /// Writes the sample as native-endian bytes.
    fn write(self, bytes: &mut [u8]);
    /// Value as a double.
    fn to_f64(self) -> f64;
    /// Value from a double.
    fn from_f64(v: f64) -> Self;
}

impl Sample for u8 {
    const SIZE: usize = 1;
    const OPAQUE: Self = u8::MAX;

    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }
    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v.round().clamp(0.0, 255.0) as u8
    }
}

impl Sample for u16 {
    const SIZE: usize = 2;
    const OPAQUE: Self = u16::MAX;

    fn read(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }
    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_ne_bytes());
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v.round().clamp(0.0, 65535.0) as u16
    }
}

impl Sample for f16 {
    const SIZE: usize = 2;
    const OPAQUE: Self = f16::ONE;

    fn read(bytes: &[u8]) -> Self {
        f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }
    fn write(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_bits().to_ne_bytes());
    }
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
}

impl Sample for f32 {
    const SIZE: usize = 4;
    const OPAQUE: Self = 1.0;

    fn read(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn write(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.to_ne_bytes());
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

/// How a destination channel beyond the engine output is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Opaque,
    CopyPrevious,
}

/// Fill actions for channels `written..tag.num_channels()`.
fn fill_rule(tag: Tag, written: usize) -> Vec<Fill> {
    let total = tag.num_channels();
    (written..total)
        .map(|j| {
            if tag.has_alpha() && j + 1 == total {
                Fill::Opaque
            } else {
                Fill::CopyPrevious
            }
        })
        .collect()
}

fn apply_fill<S: Sample>(dst: &mut [u8], tag: Tag, written: usize, pixels: usize) {
    let rule = fill_rule(tag, written);
    if rule.is_empty() {
        return;
    }
    let channels = tag.num_channels();
    for pixel in dst.chunks_exact_mut(channels * S::SIZE).take(pixels) {
        for (i, fill) in rule.iter().enumerate() {
            let j = written + i;
            let value = match fill {
                Fill::Opaque => S::OPAQUE,
                Fill::CopyPrevious if j > 0 => S::read(&pixel[(j - 1) * S::SIZE..]),
                Fill::CopyPrevious => continue,
            };
            value.write(&mut pixel[j * S::SIZE..]);
        }
    }
}

fn fill(dst: &mut [u8], tag: Tag, written: usize, pixels: usize) {
    match tag.precision() {
        Precision::U8 => apply_fill::<u8>(dst, tag, written, pixels),
        Precision::U16 => apply_fill::<u16>(dst, tag, written, pixels),
        Precision::F16 => apply_fill::<f16>(dst, tag, written, pixels),
        Precision::F32 => apply_fill::<f32>(dst, tag, written, pixels),
    }
}

/// Unpacks float samples to doubles; colour channels of percentage spaces are scaled by 100.
fn unpack<S: Sample>(src: &[u8], format: EngineFormat, channels: usize, pixels: usize) -> Vec<f64> {
    let scale = if format.is_percent_scaled() { 100.0 } else { 1.0 };
    let colour = format.channels();
    let mut out = Vec::with_capacity(pixels * channels);
    for pixel in src.chunks_exact(channels * S::SIZE).take(pixels) {
        for j in 0..channels {
            let v = S::read(&pixel[j * S::SIZE..]).to_f64();
            out.push(if j < colour { v * scale } else { v });
        }
    }
    out
}

fn pack<S: Sample>(doubles: &[f64], dst: &mut [u8], format: EngineFormat, channels: usize, pixels: usize) {
    let scale = if format.is_percent_scaled() { 100.0 } else { 1.0 };
    let colour = format.channels();
    for (pixel, values) in dst
        .chunks_exact_mut(channels * S::SIZE)
        .zip(doubles.chunks_exact(channels))
        .take(pixels)
    {
        for j in 0..colour {
            S::from_f64(values[j] / scale).write(&mut pixel[j * S::SIZE..]);
        }
    }
}

fn unpack_any(src: &[u8], tag: Tag, format: EngineFormat, pixels: usize) -> Vec<f64> {
    let channels = tag.num_channels();
    match tag.precision() {
        Precision::F16 => unpack::<f16>(src, format, channels, pixels),
        Precision::F32 => unpack::<f32>(src, format, channels, pixels),
        Precision::U8 => unpack::<u8>(src, format, channels, pixels),
        Precision::U16 => unpack::<u16>(src, format, channels, pixels),
    }
}

fn pack_any(doubles: &[f64], dst: &mut [u8], tag: Tag, format: EngineFormat, pixels: usize) {
    let channels = tag.num_channels();
    match tag.precision() {
        Precision::F16 => pack::<f16>(doubles, dst, format, channels, pixels),
        Precision::F32 => pack::<f32>(doubles, dst, format, channels, pixels),
        Precision::U8 => pack::<u8>(doubles, dst, format, channels, pixels),
        Precision::U16 => pack::<u16>(doubles, dst, format, channels, pixels),
    }
}

/// Runs the engine between two buffers laid out as `src_tag` and `dest_tag`.
fn run(
    handle: &TransformHandle,
    src_tag: Tag,
    dest_tag: Tag,
    src: &[u8],
    dst: &mut [u8],
    pixels: usize,
) -> IccResult<()> {
    let input = handle.input_format();
    let output = handle.output_format();

    let unpacked;
    let engine_src: &[u8] = if src_tag.precision().is_float() {
        unpacked = unpack_any(src, src_tag, input, pixels);
        bytemuck::cast_slice(&unpacked)
    } else {
        src
    };

    if dest_tag.precision().is_float() {
        let mut doubles = vec![0.0f64; pixels * dest_tag.num_channels()];
        handle.apply(engine_src, bytemuck::cast_slice_mut(&mut doubles), pixels)?;
        pack_any(&doubles, dst, dest_tag, output, pixels);
    } else {
        handle.apply(engine_src, dst, pixels)?;
    }
    fill(dst, dest_tag, output.channels(), pixels);
    Ok(())
}

fn checked<'a>(transform: &'a Transform, pixels: usize, precision: Precision) -> IccResult<std::cell::Ref<'a, TransformHandle>> {
    let expected = transform.src_tag().precision();
    if precision != expected {
        warn!("transform_buffer: buffer is {}, transform expects {}", precision, expected);
        return Err(IccError::PrecisionMismatch {
            expected,
            actual: precision,
        });
    }
    if pixels == 0 {
        warn!("transform_buffer: no pixels");
        return Err(IccError::InvalidBuffer("no pixels".into()));
    }
    transform.handle().ok_or_else(|| {
        warn!("transform_buffer: transform is not resident");
        IccError::NotResident(transform.key().to_string())
    })
}

fn check_len(what: &str, buf: &[u8], pixels: usize, tag: Tag) -> IccResult<usize> {
    let need = pixels * tag.bytes_per_pixel();
    if buf.len() < need {
        warn!("transform_buffer: {} buffer holds {} bytes, {} needed", what, buf.len(), need);
        return Err(IccError::InvalidBuffer(format!("{what} buffer too short: {} < {need}", buf.len())));
    }
    Ok(need)
}

/// Converts `pixels` pixels from `src` into `dst`.
///
/// `src` is laid out as the transform's source tag, `dst` as its
/// destination tag; `precision` must match the source tag. On error
/// nothing is written.
///
/// # Arguments
///
/// * `transform` - A resident transform
/// * `src` - Source pixels, native-endian samples
/// * `dst` - Destination pixels
/// * `pixels` - Number of pixels to convert
/// * `precision` - Sample precision of `src`
///
/// # Example
///
/// ```rust
/// use cinecms_core::{Precision, Tag};
/// use cinecms_icc::{transform_buffer, BuiltinProfile, CmsConfig, CmsContext};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut cms = CmsContext::init(CmsConfig {
///     temp_dir: Some(dir.path().to_path_buf()),
///     ..CmsConfig::default()
/// })
/// .unwrap();
/// let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
/// let chain = [srgb.clone(), srgb];
/// let t = cms.get_canvas_transform(&chain, Tag::RGB_U8, Tag::RGBA_U8).unwrap();
///
/// let src = [200u8, 100, 50];
/// let mut dst = [0u8; 4];
/// transform_buffer(&t, &src, &mut dst, 1, Precision::U8).unwrap();
/// // the alpha channel the engine does not produce is opaque
/// assert_eq!(dst[3], 255);
/// ```
pub fn transform_buffer(
    transform: &Transform,
    src: &[u8],
    dst: &mut [u8],
    pixels: usize,
    precision: Precision,
) -> IccResult<()> {
    let handle = checked(transform, pixels, precision)?;
    let n_src = check_len("source", src, pixels, transform.src_tag())?;
    let n_dst = check_len("destination", dst, pixels, transform.dest_tag())?;
    run(
        &handle,
        transform.src_tag(),
        transform.dest_tag(),
        &src[..n_src],
        &mut dst[..n_dst],
        pixels,
    )
}

/// Converts `pixels` pixels of `buf` onto itself.
///
/// Source and destination tags must have the same pixel size.
pub fn transform_buffer_in_place(
    transform: &Transform,
    buf: &mut [u8],
    pixels: usize,
    precision: Precision,
) -> IccResult<()> {
    let handle = checked(transform, pixels, precision)?;
    let (src_tag, dest_tag) = (transform.src_tag(), transform.dest_tag());
    if src_tag.bytes_per_pixel() != dest_tag.bytes_per_pixel() {
        warn!("transform_buffer_in_place: {} and {} differ in size", src_tag, dest_tag);
        return Err(IccError::InvalidBuffer(format!(
            "in-place conversion from {src_tag} to {dest_tag}"
        )));
    }
    let n = check_len("in-place", buf, pixels, src_tag)?;
    let src = buf[..n].to_vec();
    run(&handle, src_tag, dest_tag, &src, &mut buf[..n], pixels)
}

/// Converts every pixel of `src` into `dst`.
///
/// The areas must have equal size; each area's tag must match the
/// transform's tag on its side. Work is split into chunks inside one tile
/// of both areas and converted row by row.
pub fn transform_area(transform: &Transform, src: &PixelArea<'_>, dst: &mut PixelAreaMut<'_>) -> IccResult<()> {
    for (side, area_tag, tag) in [
        ("source", src.tag(), transform.src_tag()),
        ("destination", dst.tag(), transform.dest_tag()),
    ] {
        if area_tag != tag {
            warn!("transform_area: {} area is {}, transform expects {}", side, area_tag, tag);
            return Err(IccError::PrecisionMismatch {
                expected: tag.precision(),
                actual: area_tag.precision(),
            });
        }
    }
    let handle = transform.handle().ok_or_else(|| {
        warn!("transform_area: transform is not resident");
        IccError::NotResident(transform.key().to_string())
    })?;

    let chunks = AreaChunks::new(src, &*dst)?;
    let (src_tag, dest_tag) = (transform.src_tag(), transform.dest_tag());
    for chunk in chunks {
        trace!(chunk = %chunk, "converting chunk");
        for row in chunk.y..chunk.bottom() {
            let src_row = src.row(chunk.x, row, chunk.width);
            let dst_row = dst.row_mut(chunk.x, row, chunk.width);
            run(&handle, src_tag, dest_tag, src_row, dst_row, chunk.width as usize)?;
        }
    }
    trace!(region = %TileSpans::region(src), "area converted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rule_alpha_last() {
        assert_eq!(
            fill_rule(Tag::RGBA_U8, 3),
            vec![Fill::Opaque]
        );
        assert_eq!(
            fill_rule(Tag::RGBA_U8, 1),
            vec![Fill::CopyPrevious, Fill::CopyPrevious, Fill::Opaque]
        );
        assert!(fill_rule(Tag::RGB_U8, 3).is_empty());
    }

    #[test]
    fn test_fill_u8() {
        let mut px = [10u8, 20, 30, 0, 40, 50, 60, 7];
        apply_fill::<u8>(&mut px, Tag::RGBA_U8, 3, 2);
        assert_eq!(px, [10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_fill_replicates_gray() {
        let mut px = [0u8; 16];
        let v = 0.25f32.to_ne_bytes();
        px[..4].copy_from_slice(&v);
        apply_fill::<f32>(&mut px, Tag::RGBA_F32, 1, 1);
        assert_eq!(f32::read(&px[4..]), 0.25);
        assert_eq!(f32::read(&px[8..]), 0.25);
        assert_eq!(f32::read(&px[12..]), 1.0);
    }

    #[test]
    fn test_f16_sample_round_trip() {
        for bits in [0x0000u16, 0x3c00, 0x3555, 0x7bff, 0x0001, 0xbc00] {
            let v = f16::from_bits(bits);
            assert_eq!(<f16 as Sample>::from_f64(Sample::to_f64(v)).to_bits(), bits);
        }
    }

    #[test]
    fn test_cmyk_scaled_to_percent() {
        let cmyka = EngineFormat::new(crate::engine::ColorSpace::Cmyk, 4, 1, 0, true);
        let src: Vec<u8> = [0.1f32, 0.5, 1.0, 0.0, 0.5]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let doubles = unpack::<f32>(&src, cmyka, 5, 1);
        assert_eq!(doubles.len(), 5);
        for (got, want) in doubles.iter().zip([10.0, 50.0, 100.0, 0.0]) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
        // alpha is not a colour channel
        assert_eq!(doubles[4], 0.5);

        let mut dst = [0u8; 20];
        pack::<f32>(&[25.0, 75.0, 100.0, 5.0, 9.0], &mut dst, cmyka, 5, 1);
        let out: Vec<f32> = dst.chunks_exact(4).map(f32::read).collect();
        assert_eq!(&out[..4], &[0.25, 0.75, 1.0, 0.05]);
        // pack leaves extra channels to the fill rule
        assert_eq!(out[4], 0.0);

        let rgb = EngineFormat::new(crate::engine::ColorSpace::Rgb, 3, 0, 0, true);
        let src: Vec<u8> = [0.5f32, 0.5, 0.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(unpack::<f32>(&src, rgb, 3, 1), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_integer_clamp() {
        assert_eq!(<u8 as Sample>::from_f64(300.0), 255);
        assert_eq!(<u16 as Sample>::from_f64(-3.0), 0);
    }
}
