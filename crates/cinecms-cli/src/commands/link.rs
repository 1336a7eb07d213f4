//! Device link export command.

use crate::LinkArgs;
use anyhow::{Context, Result};
use cinecms_core::Precision;
use cinecms_icc::{CmsConfig, EngineFormat, ProfileHandle, TransformFlags, build};
use std::fs;

/// Collapses the chain into one device link profile and writes it.
pub fn run(args: LinkArgs, config: CmsConfig, verbose: bool) -> Result<()> {
    let intent = super::parse_intent(args.intent.as_deref(), config.intent)?;
    let proof_intent = config.proof_intent;
    let mut flags = TransformFlags::empty();
    if args.bpc {
        flags |= TransformFlags::BLACK_POINT_COMPENSATION;
    }

    let mut cms = super::init_context(config)?;
    let chain = super::open_chain(&mut cms, &args.profiles)?;
    let mut handles = Vec::with_capacity(chain.len());
    for (name, profile) in args.profiles.iter().zip(&chain) {
        let data = cms
            .profiles()
            .profile_data(profile)
            .with_context(|| format!("No data for {}", name))?;
        handles.push(ProfileHandle::open(&data)?);
    }

    let bytes = Precision::U16.bytes_per_channel();
    let format = |space: cinecms_icc::ColorSpace| EngineFormat::new(space, space.channels(), 0, bytes, false);
    let input = format(chain[0].color_space());
    let output = format(chain[chain.len() - 1].color_space());
    let refs: Vec<&ProfileHandle> = handles.iter().collect();
    let built = build(&refs, input, output, intent, flags, proof_intent)?;
    tracing::debug!(profiles = refs.len(), expensive = built.expensive, "chain built");

    let link = built.handle.to_device_link(TransformFlags::GUESS_DEVICE_CLASS)?;
    let data = link.save_to_vec().context("Engine could not serialize the device link")?;
    fs::write(&args.output, &data).with_context(|| format!("Failed to save: {}", args.output.display()))?;

    if verbose {
        println!("{} -> {}", input, output);
    }
    println!("Wrote {} ({} bytes)", args.output.display(), data.len());
    cms.shutdown();
    Ok(())
}
