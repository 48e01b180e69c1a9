//! A tagging session: catalog, cache and the temp files of one run.
//!
//! ```no_run
//! use elevtag::{Line, MultiLine, Session, SessionConfig};
//!
//! let config = SessionConfig::builder("/data/elevation").concurrency(4).build()?;
//! let mut session = Session::open(config)?;
//!
//! let lines: MultiLine = vec![Line::from_xy(&[(2.35, 48.85), (2.29, 48.86)])?]
//!     .into_iter()
//!     .collect();
//! for stats in session.tag(&lines)? {
//!     println!("{:?}", stats.to_record());
//! }
//! // Cropped rasters are removed when the session is dropped
//! # Ok::<(), elevtag::ElevationError>(())
//! ```

use std::path::Path;

use crate::batch::BatchTagger;
use crate::cache::{ResolvedSource, SourceCache, TempArtifacts};
use crate::catalog::SourceCatalog;
use crate::config::SessionConfig;
use crate::error::{ElevationError, Result};
use crate::geometry::{BoundingBox, MultiLine};
use crate::profile::{ElevationStats, IndexSpec};

#[cfg(feature = "download")]
use crate::download::DownloadConfig;

/// Owns everything one run needs.
///
/// Temp files created while resolving sources belong to the session and
/// are deleted when it is dropped, whether the run succeeded or not.
pub struct Session {
    config: SessionConfig,
    catalog: SourceCatalog,
    cache: SourceCache,
    artifacts: TempArtifacts,
}

impl Session {
    /// Load the catalog named by `config` and prepare the cache.
    ///
    /// # Errors
    ///
    /// Fails if the catalog exists but cannot be parsed, or the data
    /// directory cannot be created.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let catalog = match config.resolved_catalog_path() {
            Some(path) => SourceCatalog::from_file(path)?,
            None => {
                tracing::info!("No source catalog, every query uses SRTM");
                SourceCatalog::empty()
            }
        };
        Self::with_catalog(config, catalog)
    }

    /// Start a session with an already-loaded catalog.
    pub fn with_catalog(config: SessionConfig, catalog: SourceCatalog) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let catalog = match &config.srtm_url_template {
            Some(template) => catalog.with_fallback_template(template.clone()),
            None => catalog,
        };

        #[cfg(feature = "download")]
        let cache = SourceCache::with_download_config(
            &config.data_dir,
            DownloadConfig::default()
                .with_timeout(config.download_timeout_secs)
                .with_max_retries(config.download_retries),
        )?;
        #[cfg(not(feature = "download"))]
        let cache = SourceCache::new(&config.data_dir)?;

        Ok(Self {
            config,
            catalog,
            cache,
            artifacts: TempArtifacts::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn data_dir(&self) -> &Path {
        self.cache.data_dir()
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Temp files created so far.
    pub fn artifacts(&self) -> &TempArtifacts {
        &self.artifacts
    }

    /// Pick the source for `bbox` and make a ready-to-open local file for it.
    pub fn resolve(&mut self, bbox: &BoundingBox) -> Result<ResolvedSource> {
        if !bbox.is_valid() {
            return Err(ElevationError::InvalidGeometry(format!(
                "invalid query bounding box {}",
                bbox
            )));
        }
        let descriptor = self.catalog.select(bbox);
        self.cache.ensure(&descriptor, bbox, &mut self.artifacts)
    }

    /// Profile every line, in input order.
    pub fn tag(&mut self, lines: &MultiLine) -> Result<Vec<ElevationStats>> {
        self.tag_with(lines, None::<fn(usize)>)
    }

    /// Like [`Session::tag`], reporting the number of finished lines to `progress`.
    pub fn tag_with_progress<F>(&mut self, lines: &MultiLine, progress: F) -> Result<Vec<ElevationStats>>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.tag_with(lines, Some(progress))
    }

    fn tag_with<F>(&mut self, lines: &MultiLine, progress: Option<F>) -> Result<Vec<ElevationStats>>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = self.resolve(&lines.bbox())?;
        tracing::info!(
            source = %resolved.descriptor.name,
            path = %resolved.path.display(),
            "Source ready"
        );

        let mut tagger = BatchTagger::new(IndexSpec::from_resolved(&resolved), self.config.concurrency);
        if let Some(f) = progress {
            tagger = tagger.with_progress(f);
        }
        tagger.tag(lines)
    }

    /// End the session now, removing its temp files.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DownloadMethod, LookupField, LookupMethod, SourceDescriptor, Units};
    use crate::geometry::Line;
    use crate::grid::{GeoTransform, Raster};
    use tempfile::TempDir;

    fn local_dem_catalog(data_dir: &Path) -> SourceCatalog {
        let descriptor = SourceDescriptor {
            name: "Flat".to_string(),
            access_url: String::new(),
            coverage: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            local_filename: "flat.tif".to_string(),
            format: "GeoTIFF".to_string(),
            source_crs: "EPSG:4326".to_string(),
            download_method: DownloadMethod::Local,
            lookup_method: LookupMethod::Raster,
            lookup_field: LookupField::Band(1),
            source_units: Units::Meters,
            refresh_interval_days: 365,
        };
        let dir = data_dir.join(descriptor.dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        let t = GeoTransform {
            origin_x: 0.0,
            origin_y: 10.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        Raster::new(vec![7.0; 100], 10, 10, t, None)
            .unwrap()
            .write_geotiff(dir.join("flat.tif"))
            .unwrap();
        SourceCatalog::new(vec![descriptor])
    }

    #[test]
    fn test_temp_files_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::builder(dir.path()).concurrency(2).build().unwrap();
        let catalog = local_dem_catalog(dir.path());
        let mut session = Session::with_catalog(config, catalog).unwrap();

        let lines: MultiLine = vec![
            Line::from_xy(&[(1.5, 1.5), (2.5, 2.5)]).unwrap(),
            Line::from_xy(&[(3.5, 3.5)]).unwrap(),
        ]
        .into_iter()
        .collect();
        let results = session.tag(&lines).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].to_record(), Some([7.0, 7.0, 0.0, 0.0]));

        let temp = session.artifacts().paths().to_vec();
        assert_eq!(temp.len(), 1);
        assert!(temp[0].exists());
        drop(session);
        assert!(!temp[0].exists());
    }

    #[test]
    fn test_missing_local_file_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::builder(dir.path()).build().unwrap();
        let catalog = local_dem_catalog(dir.path());
        std::fs::remove_file(dir.path().join("flat").join("flat.tif")).unwrap();

        let mut session = Session::with_catalog(config, catalog).unwrap();
        let lines: MultiLine = vec![Line::from_xy(&[(1.5, 1.5)]).unwrap()].into_iter().collect();
        assert!(matches!(
            session.tag(&lines),
            Err(ElevationError::MissingLocalFile { .. })
        ));
    }

    #[test]
    fn test_invalid_bbox_rejected() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::builder(dir.path()).build().unwrap();
        let mut session = Session::with_catalog(config, SourceCatalog::empty()).unwrap();
        assert!(session.resolve(&BoundingBox::empty()).is_err());
        assert!(session.resolve(&BoundingBox::new(5.0, 0.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn test_broken_catalog_is_fatal() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("sources.json");
        std::fs::write(&catalog, "{ not json").unwrap();
        let config = SessionConfig::builder(dir.path()).build().unwrap();
        assert!(matches!(
            Session::open(config),
            Err(ElevationError::InvalidCatalog { .. })
        ));
    }

    #[test]
    fn test_empty_batch_needs_no_source() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::builder(dir.path()).build().unwrap();
        let mut session = Session::open(config).unwrap();
        assert!(session.tag(&MultiLine::default()).unwrap().is_empty());
    }
}
