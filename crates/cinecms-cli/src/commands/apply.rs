//! Colour value conversion command.

use crate::ApplyArgs;
use anyhow::{Result, bail};
use cinecms_core::{ColorFormat, Precision, Tag};
use cinecms_icc::{
    CmsConfig, Profile, TransformFlags, TransformRequest, native_format, transform_buffer,
};

/// Float tag holding the colour channels of `profile`.
fn tag_for(profile: &Profile) -> Result<Tag> {
    let tag = match profile.color_space().channels() {
        1 => Tag::new(Precision::F32, ColorFormat::Gray, false),
        3 => Tag::new(Precision::F32, ColorFormat::Rgb, false),
        4 => Tag::new(Precision::F32, ColorFormat::Rgb, true),
        n => bail!("{} channel profiles are not supported here", n),
    };
    Ok(tag)
}

/// Converts one colour through the chain and prints the result.
pub fn run(args: ApplyArgs, config: CmsConfig, verbose: bool) -> Result<()> {
    let intent = super::parse_intent(args.intent.as_deref(), config.intent)?;
    let proof_intent = config.proof_intent;
    let mut flags = config.flags;
    if args.bpc {
        flags |= TransformFlags::BLACK_POINT_COMPENSATION;
    }
    if args.proof {
        if args.profiles.len() < 3 {
            bail!("Proofing needs at least three profiles");
        }
        flags |= TransformFlags::SOFT_PROOFING;
    }

    let mut cms = super::init_context(config)?;
    let chain = super::open_chain(&mut cms, &args.profiles)?;
    let (first, last) = (&chain[0], &chain[chain.len() - 1]);
    let src_tag = tag_for(first)?;
    let dest_tag = tag_for(last)?;
    if args.color.len() != src_tag.num_channels() {
        bail!(
            "{} expects {} values, got {}",
            first.color_space(),
            src_tag.num_channels(),
            args.color.len()
        );
    }

    let request = TransformRequest::new(
        &chain,
        native_format(src_tag, first)?,
        native_format(dest_tag, last)?,
        src_tag,
        dest_tag,
    )
    .intent(intent)
    .flags(flags)
    .proof_intent(proof_intent);
    let transform = cms.get_transform(&request)?;
    if verbose {
        println!("Transform: {}", transform.key());
    }

    let src: Vec<u8> = args.color.iter().flat_map(|v| v.to_ne_bytes()).collect();
    let mut dst = vec![0u8; dest_tag.bytes_per_pixel()];
    transform_buffer(&transform, &src, &mut dst, 1, Precision::F32)?;

    let values: Vec<String> = dst
        .chunks_exact(4)
        .take(last.color_space().channels())
        .map(|b| format!("{:.6}", f32::from_ne_bytes([b[0], b[1], b[2], b[3]])))
        .collect();
    println!("{}", values.join(","));

    cms.return_transform(&transform);
    cms.shutdown();
    Ok(())
}
