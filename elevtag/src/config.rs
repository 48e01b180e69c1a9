//! Session configuration.
//!
//! Core components never read the environment themselves; everything comes
//! in through a [`SessionConfig`], usually built by the CLI or by
//! [`SessionConfigBuilder::from_env`].

use std::path::{Path, PathBuf};

use crate::error::{ElevationError, Result};

/// Catalog filename looked up inside the data directory by default.
pub const DEFAULT_CATALOG_FILENAME: &str = "sources.json";

/// Settings for one tagging session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Root of the on-disk source cache.
    pub data_dir: PathBuf,
    /// Catalog file; `None` means `<data_dir>/sources.json` if it exists,
    /// and an empty catalog otherwise.
    pub catalog_path: Option<PathBuf>,
    /// Worker threads for batch tagging.
    pub concurrency: usize,
    /// Per-request download timeout.
    pub download_timeout_secs: u64,
    /// Extra attempts after a failed download.
    pub download_retries: u32,
    /// Overrides the SRTM fallback tile URL template.
    pub srtm_url_template: Option<String>,
}

impl SessionConfig {
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> SessionConfigBuilder {
        SessionConfigBuilder::new(data_dir)
    }

    /// The catalog path to load, if any.
    pub fn resolved_catalog_path(&self) -> Option<PathBuf> {
        match &self.catalog_path {
            Some(path) => Some(path.clone()),
            None => {
                let default = self.data_dir.join(DEFAULT_CATALOG_FILENAME);
                default.exists().then_some(default)
            }
        }
    }
}

/// Number of logical CPUs, or 1 when unknown.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builder for [`SessionConfig`].
///
/// # Example
///
/// ```
/// use elevtag::config::SessionConfig;
///
/// let config = SessionConfig::builder("/data/elevation")
///     .concurrency(4)
///     .download_retries(1)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    data_dir: PathBuf,
    catalog_path: Option<PathBuf>,
    concurrency: usize,
    download_timeout_secs: u64,
    download_retries: u32,
    srtm_url_template: Option<String>,
}

impl SessionConfigBuilder {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            catalog_path: None,
            concurrency: default_concurrency(),
            download_timeout_secs: 300,
            download_retries: 3,
            srtm_url_template: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ELEVTAG_DATA_DIR` | Source cache directory | Required |
    /// | `ELEVTAG_CATALOG` | Source catalog file | `<data dir>/sources.json` |
    /// | `ELEVTAG_CONCURRENCY` | Worker threads | logical CPUs |
    /// | `ELEVTAG_SRTM_URL` | SRTM tile URL template | ArduPilot SRTM1 |
    ///
    /// # Errors
    ///
    /// Returns an error if `ELEVTAG_DATA_DIR` is not set or
    /// `ELEVTAG_CONCURRENCY` is not a positive integer.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("ELEVTAG_DATA_DIR").map_err(|_| {
            ElevationError::InvalidConfig("ELEVTAG_DATA_DIR environment variable not set".to_string())
        })?;
        let mut builder = Self::new(data_dir);

        if let Ok(catalog) = std::env::var("ELEVTAG_CATALOG") {
            builder = builder.catalog_path(catalog);
        }
        if let Ok(value) = std::env::var("ELEVTAG_CONCURRENCY") {
            let n = value.trim().parse::<usize>().map_err(|_| {
                ElevationError::InvalidConfig(format!("ELEVTAG_CONCURRENCY is not a number: {}", value))
            })?;
            builder = builder.concurrency(n);
        }
        if let Ok(template) = std::env::var("ELEVTAG_SRTM_URL") {
            builder = builder.srtm_url_template(template);
        }
        Ok(builder)
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn catalog_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.catalog_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn download_retries(mut self, retries: u32) -> Self {
        self.download_retries = retries;
        self
    }

    pub fn srtm_url_template(mut self, template: impl Into<String>) -> Self {
        self.srtm_url_template = Some(template.into());
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero concurrency or an empty data directory.
    pub fn build(self) -> Result<SessionConfig> {
        if self.concurrency == 0 {
            return Err(ElevationError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ElevationError::InvalidConfig(
                "data directory must not be empty".to_string(),
            ));
        }
        Ok(SessionConfig {
            data_dir: self.data_dir,
            catalog_path: self.catalog_path,
            concurrency: self.concurrency,
            download_timeout_secs: self.download_timeout_secs,
            download_retries: self.download_retries,
            srtm_url_template: self.srtm_url_template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_defaults() {
        let config = SessionConfig::builder("data").build().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.concurrency >= 1);
        assert_eq!(config.download_timeout_secs, 300);
        assert_eq!(config.download_retries, 3);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(SessionConfig::builder("data").concurrency(0).build().is_err());
        assert!(SessionConfig::builder("").build().is_err());
    }

    #[test]
    fn test_default_catalog_location() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::builder(dir.path()).build().unwrap();
        assert_eq!(config.resolved_catalog_path(), None);

        std::fs::write(dir.path().join("sources.json"), r#"{"sources": []}"#).unwrap();
        assert_eq!(
            config.resolved_catalog_path(),
            Some(dir.path().join("sources.json"))
        );

        let explicit = SessionConfig::builder(dir.path())
            .catalog_path("/etc/elevtag/catalog.json")
            .build()
            .unwrap();
        assert_eq!(
            explicit.resolved_catalog_path(),
            Some(PathBuf::from("/etc/elevtag/catalog.json"))
        );
    }
}
