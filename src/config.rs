//! Cache configuration.
//!
//! [`CacheConfig`] is the immutable runtime configuration owned by one cache
//! engine. [`CacheSettings`] is its serializable subset, loadable from a
//! `.toml` or `.json` file; the content-approval predicate can only be set in
//! code.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HctError, Result};
use crate::http::HttpResponse;

/// Entries not requested within this many hours are evicted.
pub const DEFAULT_MAX_AGE_HOURS: f64 = 192.0;
/// Seconds added to the impatient freshness window.
pub const DEFAULT_IMPATIENT_FUDGE_SECS: u64 = 2;

/// Predicate deciding whether a freshly fetched response may replace a
/// cached one.
pub type ApproveContent = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

/// The default approval predicate: accept 2xx responses only.
pub fn approve_success() -> ApproveContent {
    Arc::new(|response: &HttpResponse| response.is_success())
}

/// Runtime configuration for a caching transport.
#[derive(Clone)]
pub struct CacheConfig {
    /// Directory holding one file per cache entry. Created if absent.
    pub base_path: PathBuf,
    /// Maximum time since last access before an entry is evicted.
    pub max_age_hours: f64,
    /// Serve straight from cache while the entry is younger than this.
    /// `0` disables the fast path.
    pub no_update_secs: u64,
    /// Measure the fast-path window from the origin's skew-corrected
    /// Last-Modified instead of from the last fetch.
    pub no_update_impatient: bool,
    /// Added to the window in impatient mode.
    pub no_update_impatient_fudge_secs: u64,
    /// `None` accepts every response.
    pub approve_content: Option<ApproveContent>,
    /// Log per-request cache decisions at info level.
    pub verbose: bool,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("base_path", &self.base_path)
            .field("max_age_hours", &self.max_age_hours)
            .field("no_update_secs", &self.no_update_secs)
            .field("no_update_impatient", &self.no_update_impatient)
            .field(
                "no_update_impatient_fudge_secs",
                &self.no_update_impatient_fudge_secs,
            )
            .field("approve_content", &self.approve_content.is_some())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl CacheConfig {
    /// Configuration with defaults for everything but the base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            no_update_secs: 0,
            no_update_impatient: false,
            no_update_impatient_fudge_secs: DEFAULT_IMPATIENT_FUDGE_SECS,
            approve_content: Some(approve_success()),
            verbose: false,
        }
    }

    pub fn with_max_age_hours(mut self, hours: f64) -> Self {
        self.max_age_hours = hours;
        self
    }

    pub fn with_no_update(mut self, secs: u64) -> Self {
        self.no_update_secs = secs;
        self
    }

    pub fn with_impatient(mut self, impatient: bool) -> Self {
        self.no_update_impatient = impatient;
        self
    }

    pub fn with_impatient_fudge(mut self, secs: u64) -> Self {
        self.no_update_impatient_fudge_secs = secs;
        self
    }

    /// Replace the approval predicate.
    pub fn with_approve_content<F>(mut self, approve: F) -> Self
    where
        F: Fn(&HttpResponse) -> bool + Send + Sync + 'static,
    {
        self.approve_content = Some(Arc::new(approve));
        self
    }

    /// Accept every fetched response, whatever its status.
    pub fn without_approval(mut self) -> Self {
        self.approve_content = None;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check invariants that do not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(HctError::Config("base_path must not be empty".into()));
        }
        if !self.max_age_hours.is_finite() || self.max_age_hours < 0.0 {
            return Err(HctError::Config(format!(
                "max_age_hours must be a non-negative number, got {}",
                self.max_age_hours
            )));
        }
        Ok(())
    }

    /// Whether the approval predicate (if any) accepts `response`.
    pub fn approves(&self, response: &HttpResponse) -> bool {
        self.approve_content
            .as_ref()
            .map_or(true, |approve| approve(response))
    }
}

/// File-loadable cache settings.
///
/// Missing fields fall back to the same defaults as [`CacheConfig::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub base_path: PathBuf,
    pub max_age_hours: f64,
    pub no_update_secs: u64,
    pub no_update_impatient: bool,
    pub no_update_impatient_fudge_secs: u64,
    /// `false` disables the default 2xx approval predicate.
    pub approve_success_only: bool,
    pub verbose: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            no_update_secs: 0,
            no_update_impatient: false,
            no_update_impatient_fudge_secs: DEFAULT_IMPATIENT_FUDGE_SECS,
            approve_success_only: true,
            verbose: false,
        }
    }
}

impl CacheSettings {
    /// Load settings from a `.toml` or `.json` file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HctError::Config(format!(
                "Failed to read cache settings {}: {}",
                path.display(),
                e
            ))
        })?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&raw)
        } else {
            Self::from_json_str(&raw)
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| HctError::Config(format!("Invalid cache settings TOML: {}", e)))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| HctError::Config(format!("Invalid cache settings JSON: {}", e)))
    }

    /// Build a runtime configuration from these settings.
    pub fn into_config(self) -> CacheConfig {
        let config = CacheConfig::new(self.base_path)
            .with_max_age_hours(self.max_age_hours)
            .with_no_update(self.no_update_secs)
            .with_impatient(self.no_update_impatient)
            .with_impatient_fudge(self.no_update_impatient_fudge_secs)
            .with_verbose(self.verbose);
        if self.approve_success_only {
            config
        } else {
            config.without_approval()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_config_defaults() {
        let cfg = CacheConfig::new("/tmp/hct");
        assert_eq!(cfg.max_age_hours, 192.0);
        assert_eq!(cfg.no_update_secs, 0);
        assert!(!cfg.no_update_impatient);
        assert_eq!(cfg.no_update_impatient_fudge_secs, 2);
        assert!(cfg.approve_content.is_some());
        assert!(!cfg.verbose);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_default_approval_accepts_success_only() {
        let cfg = CacheConfig::new("/tmp/hct");
        let ok = HttpResponse::new("https://example.com", StatusCode::OK);
        let partial = HttpResponse::new("https://example.com", StatusCode::PARTIAL_CONTENT);
        let err = HttpResponse::new("https://example.com", StatusCode::INTERNAL_SERVER_ERROR);
        assert!(cfg.approves(&ok));
        assert!(cfg.approves(&partial));
        assert!(!cfg.approves(&err));
    }

    #[test]
    fn test_without_approval_accepts_everything() {
        let cfg = CacheConfig::new("/tmp/hct").without_approval();
        let err = HttpResponse::new("https://example.com", StatusCode::BAD_GATEWAY);
        assert!(cfg.approves(&err));
    }

    #[test]
    fn test_custom_approval_predicate() {
        let cfg = CacheConfig::new("/tmp/hct")
            .with_approve_content(|resp: &HttpResponse| !resp.body.is_empty());
        let empty = HttpResponse::new("https://example.com", StatusCode::OK);
        let full = HttpResponse::new("https://example.com", StatusCode::OK)
            .with_body("x");
        assert!(!cfg.approves(&empty));
        assert!(cfg.approves(&full));
    }

    #[test]
    fn test_validate_rejects_empty_base_path() {
        let err = CacheConfig::new("").validate().unwrap_err();
        assert!(matches!(err, HctError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_negative_max_age() {
        let cfg = CacheConfig::new("/tmp/hct").with_max_age_hours(-1.0);
        assert!(cfg.validate().is_err());
        let cfg = CacheConfig::new("/tmp/hct").with_max_age_hours(f64::NAN);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_settings_from_toml_partial() {
        let settings = CacheSettings::from_toml_str(
            r#"
            base_path = "/var/cache/hct"
            no_update_secs = 900
            no_update_impatient = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.base_path, PathBuf::from("/var/cache/hct"));
        assert_eq!(settings.no_update_secs, 900);
        assert!(settings.no_update_impatient);
        assert_eq!(settings.max_age_hours, DEFAULT_MAX_AGE_HOURS);
        assert!(settings.approve_success_only);

        let cfg = settings.into_config();
        assert_eq!(cfg.no_update_secs, 900);
        assert!(cfg.no_update_impatient);
        assert!(cfg.approve_content.is_some());
    }

    #[test]
    fn test_settings_from_json_disables_approval() {
        let settings = CacheSettings::from_json_str(
            r#"{"base_path": "/tmp/c", "approve_success_only": false, "verbose": true}"#,
        )
        .unwrap();
        let cfg = settings.into_config();
        assert!(cfg.approve_content.is_none());
        assert!(cfg.verbose);
    }

    #[test]
    fn test_settings_invalid_json() {
        let err = CacheSettings::from_json_str("{not json").unwrap_err();
        assert!(err.to_string().contains("Invalid cache settings JSON"));
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        std::fs::write(&path, "base_path = \"/tmp/x\"\nmax_age_hours = 1.5\n").unwrap();
        let settings = CacheSettings::load_from_path(&path).unwrap();
        assert_eq!(settings.max_age_hours, 1.5);

        let missing = CacheSettings::load_from_path(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(HctError::Config(_))));
    }

    #[test]
    fn test_debug_hides_predicate() {
        let cfg = CacheConfig::new("/tmp/hct");
        let dbg = format!("{:?}", cfg);
        assert!(dbg.contains("approve_content: true"));
    }
}
