//! Pixel conversion through cached transforms.

use approx::assert_abs_diff_eq;
use cinecms_core::{ColorFormat, Precision, Rect, Tag, TiledBuffer};
use cinecms_icc::{
    transform_area, transform_buffer, transform_buffer_in_place, BuiltinProfile, CmsConfig, CmsContext, IccError,
    TransformFlags,
};
use half::f16;
use tempfile::tempdir;

fn context(dir: &std::path::Path) -> CmsContext {
    CmsContext::init(CmsConfig {
        temp_dir: Some(dir.to_path_buf()),
        ..CmsConfig::default()
    })
    .unwrap()
}

#[test]
fn test_alpha_filled_opaque() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGB_U8, Tag::RGBA_U8).unwrap();

    let src: Vec<u8> = vec![10, 20, 30, 200, 100, 50];
    let mut dst = vec![0u8; 8];
    transform_buffer(&t, &src, &mut dst, 2, Precision::U8).unwrap();
    assert_eq!(dst[3], 255);
    assert_eq!(dst[7], 255);
    for (i, j) in [(0, 0), (1, 1), (2, 2), (3, 4), (4, 5), (5, 6)] {
        assert!((src[i] as i32 - dst[j] as i32).abs() <= 1);
    }
}

#[test]
fn test_f16_identity() {
    let dir = tempdir().unwrap();
    let mut cms = CmsContext::init(CmsConfig {
        temp_dir: Some(dir.path().to_path_buf()),
        flags: TransformFlags::NULL_TRANSFORM,
        ..CmsConfig::default()
    })
    .unwrap();
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_F16, Tag::RGBA_F16).unwrap();

    let values = [0.0f32, 0.25, 0.5, 0.75, 1.0, 0.1, 0.9, 0.33, 0.0627, 0.5004, 0.999, 0.2];
    let src_bits: Vec<u16> = values.iter().map(|v| f16::from_f32(*v).to_bits()).collect();
    let src: Vec<u8> = src_bits.iter().flat_map(|b| b.to_ne_bytes()).collect();
    let mut dst = vec![0u8; src.len()];
    transform_buffer(&t, &src, &mut dst, 3, Precision::F16).unwrap();

    let out: Vec<u16> = dst.chunks_exact(2).map(|b| u16::from_ne_bytes([b[0], b[1]])).collect();
    for (i, (a, b)) in src_bits.iter().zip(&out).enumerate() {
        if i % 4 == 3 {
            assert_eq!(*b, f16::ONE.to_bits());
        } else {
            assert!(a.abs_diff(*b) <= 1, "channel {i}: {a:#06x} vs {b:#06x}");
        }
    }
}

#[test]
fn test_f32_in_place() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let linear = cms.builtin_profile(BuiltinProfile::LinearSrgb).unwrap();
    let chain = [srgb, linear];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_F32, Tag::RGBA_F32).unwrap();

    let mut buf: Vec<u8> = [0.5f32, 0.5, 0.5, 1.0]
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    transform_buffer_in_place(&t, &mut buf, 1, Precision::F32).unwrap();
    let r = f32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
    // sRGB 0.5 decodes to about 0.214
    assert_abs_diff_eq!(r, 0.214, epsilon = 1e-2);
}

#[test]
fn test_precision_checked() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_U8, Tag::RGBA_U8).unwrap();
    let src = vec![0u8; 8];
    let mut dst = vec![7u8; 8];
    let err = transform_buffer(&t, &src, &mut dst, 2, Precision::U16).unwrap_err();
    assert!(matches!(err, IccError::PrecisionMismatch { .. }));
    assert!(dst.iter().all(|v| *v == 7));
    assert!(transform_buffer(&t, &src, &mut dst, 4, Precision::U8).is_err());
}

#[test]
fn test_gray_to_rgb_channels() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let gray = cms.builtin_profile(BuiltinProfile::Gray { gamma: 2.2 }).unwrap();
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let gray_tag = Tag::new(Precision::U8, ColorFormat::Gray, false);

    let chain = [gray, srgb];
    let t = cms.get_canvas_transform(&chain, gray_tag, Tag::RGBA_U8).unwrap();
    let src = [0u8, 255];
    let mut dst = [1u8; 8];
    transform_buffer(&t, &src, &mut dst, 2, Precision::U8).unwrap();
    assert!(dst[0..3].iter().all(|v| *v <= 2));
    assert_eq!(dst[3], 255);
    assert!(dst[4..7].iter().all(|v| *v >= 250));
    assert_eq!(dst[7], 255);
}

#[test]
fn test_area_across_tiles() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_U8, Tag::RGBA_U8).unwrap();

    let (w, h) = (50u32, 30u32);
    let data: Vec<u8> = (0..w * h)
        .flat_map(|i| [(i % 251) as u8, (i % 97) as u8, (i % 13 * 19) as u8, 9])
        .collect();
    let src = TiledBuffer::from_data(w, h, Tag::RGBA_U8, 16, 16, &data).unwrap();
    let mut dst = TiledBuffer::new(w, h, Tag::RGBA_U8, 32, 8).unwrap();

    let region = Rect::new(3, 5, 40, 20);
    let src_area = src.area(region).unwrap();
    let mut dst_area = dst.area_mut(Rect::new(7, 2, 40, 20)).unwrap();
    transform_area(&t, &src_area, &mut dst_area).unwrap();

    let out = dst.to_data();
    for y in 0..region.height {
        for x in 0..region.width {
            let s = (((y + 5) * w + x + 3) * 4) as usize;
            let d = (((y + 2) * w + x + 7) * 4) as usize;
            for c in 0..3 {
                assert!((data[s + c] as i32 - out[d + c] as i32).abs() <= 1);
            }
            assert_eq!(out[d + 3], 255);
        }
    }
    // outside the destination region nothing was written
    assert_eq!(&out[0..4], &[0, 0, 0, 0]);
}

#[test]
fn test_area_size_mismatch() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_U8, Tag::RGBA_U8).unwrap();

    let src = TiledBuffer::new(16, 16, Tag::RGBA_U8, 8, 8).unwrap();
    let mut dst = TiledBuffer::new(16, 16, Tag::RGBA_U8, 8, 8).unwrap();
    let src_area = src.area(Rect::new(0, 0, 8, 8)).unwrap();
    let mut dst_area = dst.area_mut(Rect::new(0, 0, 4, 8)).unwrap();
    assert!(transform_area(&t, &src_area, &mut dst_area).is_err());
}

#[test]
fn test_area_float_to_u8() {
    let dir = tempdir().unwrap();
    let mut cms = context(dir.path());
    let srgb = cms.builtin_profile(BuiltinProfile::Srgb).unwrap();
    let chain = [srgb.clone(), srgb];
    let t = cms.get_canvas_transform(&chain, Tag::RGBA_F32, Tag::RGBA_U8).unwrap();

    let (w, h) = (20u32, 12u32);
    let levels = [0.0f32, 0.5, 1.0];
    let data: Vec<u8> = (0..w * h)
        .flat_map(|i| {
            let v = levels[(i % 3) as usize];
            [v, v, v, 0.25]
        })
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    let src = TiledBuffer::from_data(w, h, Tag::RGBA_F32, 8, 8, &data).unwrap();
    let mut dst = TiledBuffer::new(w, h, Tag::RGBA_U8, 16, 4).unwrap();

    let full = Rect::new(0, 0, w, h);
    let src_area = src.area(full).unwrap();
    let mut dst_area = dst.area_mut(full).unwrap();
    transform_area(&t, &src_area, &mut dst_area).unwrap();

    let out = dst.to_data();
    for (i, px) in out.chunks_exact(4).enumerate() {
        let expected = [0i32, 128, 255][i % 3];
        for c in 0..3 {
            assert!((px[c] as i32 - expected).abs() <= 1, "pixel {i}: {px:?}");
        }
        assert_eq!(px[3], 255);
    }
}
