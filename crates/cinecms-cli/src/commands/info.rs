//! Profile info command.

use crate::InfoArgs;
use anyhow::{Context, Result};
use cinecms_icc::CmsConfig;

/// Prints the descriptive tags of each profile.
pub fn run(args: InfoArgs, config: CmsConfig, verbose: bool) -> Result<()> {
    let mut cms = super::init_context(config)?;
    for (i, name) in args.profiles.iter().enumerate() {
        let profile = super::open_profile(&mut cms, name)?;
        let info = cms
            .profiles()
            .profile_info(&profile)
            .context("profile vanished from the store")?;

        if i > 0 {
            println!();
        }
        println!("{}", name);
        println!("  Description:  {}", info.description);
        if !info.manufacturer.is_empty() {
            println!("  Manufacturer: {}", info.manufacturer);
        }
        if !info.model.is_empty() {
            println!("  Model:        {}", info.model);
        }
        if !info.copyright.is_empty() {
            println!("  Copyright:    {}", info.copyright);
        }
        println!("  Class:        {}", info.device_class);
        println!("  Color space:  {}", info.color_space);
        println!("  PCS:          {}", info.pcs);
        println!("  Channels:     {}", info.channel_names.join(", "));
        if args.key || verbose {
            println!("  Key:          {}", profile.key());
        }
        if verbose {
            let size = cms.profiles().profile_data(&profile).map(|d| d.len()).unwrap_or(0);
            println!("  Size:         {} bytes", size);
        }
    }
    cms.shutdown();
    Ok(())
}
