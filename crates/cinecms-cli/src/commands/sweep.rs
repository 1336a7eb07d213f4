//! Device link cleanup command.

use crate::SweepArgs;
use anyhow::Result;
use cinecms_icc::{CmsConfig, DeviceLinkDir};

/// Removes device link files left behind by earlier sessions.
pub fn run(args: SweepArgs, config: CmsConfig, verbose: bool) -> Result<()> {
    let dir = config.temp_dir();
    let links = DeviceLinkDir::new(&dir, config.temp_prefix.clone());

    if args.dry_run {
        let files = links.stale_files()?;
        for path in &files {
            println!("{}", path.display());
        }
        if verbose {
            println!("{} files would be removed", files.len());
        }
        return Ok(());
    }

    let removed = links.sweep()?;
    println!("Removed {} device link files from {}", removed, dir.display());
    Ok(())
}
