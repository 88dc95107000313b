//! `hct sweep` handler.

use anyhow::{Context, Result};

use hct::cache::{EntryStore, EvictionSweeper};

use super::SweepArgs;

/// Run one eviction sweep over a cache directory.
pub(crate) fn cmd_sweep(args: SweepArgs) -> Result<()> {
    if !args.max_age_hours.is_finite() || args.max_age_hours < 0.0 {
        anyhow::bail!("--max-age-hours must be a non-negative number");
    }
    let store = EntryStore::open(&args.cache_dir)
        .with_context(|| format!("Failed to open cache {}", args.cache_dir.display()))?;
    let report = EvictionSweeper::new(store, args.max_age_hours).sweep();

    println!("Scanned: {}", report.scanned);
    println!("Removed: {}", report.removed.len());
    if report.temp_files_removed > 0 {
        println!("Temp files removed: {}", report.temp_files_removed);
    }
    if report.failed > 0 {
        println!("Failed to remove: {}", report.failed);
    }
    for path in &report.unknown {
        println!("Unknown file: {}", path.display());
    }
    Ok(())
}
