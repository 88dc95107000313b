//! `hct get` handler.

use anyhow::{Context, Result};

use hct::cache::{X_CACHED, X_CONTENT_UNCHANGED};
use hct::{CacheSettings, CachingTransport, HttpRequest, HttpTransport, ReqwestTransport};

use super::GetArgs;

/// Fetch one URL through the cache and print what happened.
pub(crate) async fn cmd_get(args: GetArgs, verbose: bool) -> Result<()> {
    let settings = settings_from_args(&args, verbose)?;
    let cache = CachingTransport::new(ReqwestTransport::default(), settings.into_config())
        .context("Failed to open cache")?;

    let mut request = HttpRequest::get(&args.url);
    if let Some(range) = &args.range {
        request = request.with_header("Range", range);
    }

    let result = cache.execute(request).await;
    let stats = cache.stats().snapshot();
    let report = cache.close();
    let response = result.with_context(|| format!("Failed to fetch {}", args.url))?;

    println!("{} {}", response.status, response.url);
    println!(
        "{}: {}",
        X_CACHED,
        response.header(X_CACHED).unwrap_or("0")
    );
    println!(
        "{}: {}",
        X_CONTENT_UNCHANGED,
        response.header(X_CONTENT_UNCHANGED).unwrap_or("0")
    );
    println!("Body: {} bytes", response.body.len());
    if verbose {
        println!(
            "Stored: {}  Store failures: {}  Evicted: {}",
            stats.stored,
            stats.store_failures,
            report.removed.len()
        );
    }
    Ok(())
}

/// Settings from `--config` (if any) with command-line flags layered on top.
fn settings_from_args(args: &GetArgs, verbose: bool) -> Result<CacheSettings> {
    let mut settings = match &args.config {
        Some(path) => CacheSettings::load_from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CacheSettings::default(),
    };

    if let Some(dir) = &args.cache_dir {
        settings.base_path = dir.clone();
    }
    if settings.base_path.as_os_str().is_empty() {
        anyhow::bail!("No cache directory: pass --cache-dir or set base_path in --config");
    }
    if let Some(secs) = args.no_update {
        settings.no_update_secs = secs;
    }
    if args.impatient {
        settings.no_update_impatient = true;
    }
    if let Some(fudge) = args.fudge {
        settings.no_update_impatient_fudge_secs = fudge;
    }
    if let Some(hours) = args.max_age_hours {
        settings.max_age_hours = hours;
    }
    settings.verbose |= verbose;
    Ok(settings)
}
