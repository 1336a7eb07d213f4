//! Profile listing command.

use crate::ListArgs;
use anyhow::Result;
use cinecms_icc::{CmsConfig, DeviceClass, read_standard_profile_dirs};

/// Lists valid profiles, optionally of one device class.
pub fn run(args: ListArgs, config: CmsConfig, verbose: bool) -> Result<()> {
    let class = args.class.as_deref().map(str::parse::<DeviceClass>).transpose()?;
    let cms = super::init_context(config)?;
    let listings = if args.dirs.is_empty() {
        cms.list_profiles(class)
    } else {
        read_standard_profile_dirs(&args.dirs, class)
    };

    for listing in &listings {
        if verbose {
            let class = listing.device_class.map(|c| c.name()).unwrap_or("unknown");
            println!(
                "{:<40} {:<8} {:<10} {}",
                listing.description,
                listing.color_space.to_string(),
                class,
                listing.path.display()
            );
        } else {
            println!("{}  {}", listing.description, listing.path.display());
        }
    }
    if verbose {
        println!("{} profiles", listings.len());
    }
    cms.shutdown();
    Ok(())
}
