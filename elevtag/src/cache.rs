//! Local, freshness-checked copies of elevation sources.
//!
//! [`SourceCache::ensure`] turns a [`SourceDescriptor`] plus a query box into
//! a file that an index can open:
//!
//! - `http` / `ftp`: the URL is fetched verbatim to `<data_dir>/<source>/<filename>`
//!   when the file is missing or older than the refresh interval.
//! - `local`: the file must already exist; there is no network fallback.
//! - `srtm-tiled`: every integer-degree tile under the box is fetched (same
//!   freshness rule), then merged.
//!
//! Raster sources always go through a merge/crop pass that writes a
//! time-stamped GeoTIFF cropped to the query box; that temporary file, not
//! the raw download, is what callers open. Temporary files are registered
//! with a [`TempArtifacts`] owned by the caller and deleted when it drops.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::archive::extract_zip_file;
use crate::catalog::{DownloadMethod, LookupMethod, SourceDescriptor};
use crate::crs::Reprojector;
use crate::error::{ElevationError, Result};
use crate::filename::tile_filename;
use crate::geometry::BoundingBox;
use crate::grid::Raster;

#[cfg(feature = "download")]
use crate::download::{DownloadConfig, Downloader};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Distinguishes temp files created within the same clock tick.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A descriptor paired with a ready-to-open local file.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub descriptor: SourceDescriptor,
    /// File to hand to the index.
    pub path: PathBuf,
    /// Query box the file was prepared for, in WGS84.
    pub bbox: BoundingBox,
}

/// Temporary files produced during a session, removed on drop.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every registered file now.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
            }
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// `true` if `path` must be (re)fetched under `method`'s freshness rule.
///
/// A missing file is always stale. An existing file is stale when the method
/// is not `local` and its modification time is more than `refresh_days` old.
pub fn is_stale(path: &Path, method: DownloadMethod, refresh_days: u64, now: SystemTime) -> bool {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return true,
    };
    if method == DownloadMethod::Local {
        return false;
    }
    let max_age = Duration::from_secs(refresh_days.saturating_mul(SECONDS_PER_DAY));
    match now.duration_since(modified) {
        Ok(age) => age > max_age,
        // Modified in the future (clock skew): treat as fresh
        Err(_) => false,
    }
}

/// Materializes descriptors as files under a data directory.
pub struct SourceCache {
    data_dir: PathBuf,
    #[cfg(feature = "download")]
    downloader: Downloader,
}

impl SourceCache {
    /// Create a cache rooted at `data_dir` with default download settings.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            #[cfg(feature = "download")]
            downloader: Downloader::new(DownloadConfig::default())?,
        })
    }

    /// Create a cache with explicit download settings.
    #[cfg(feature = "download")]
    pub fn with_download_config<P: AsRef<Path>>(data_dir: P, config: DownloadConfig) -> Result<Self> {
        Ok(Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            downloader: Downloader::new(config)?,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one source's files.
    pub fn source_dir(&self, descriptor: &SourceDescriptor) -> PathBuf {
        self.data_dir.join(descriptor.dir_name())
    }

    /// Make sure a fresh local file exists for `descriptor` and return the
    /// path callers should open.
    ///
    /// Temp files created on the way are registered in `artifacts`, including
    /// when this returns an error.
    pub fn ensure(
        &self,
        descriptor: &SourceDescriptor,
        bbox: &BoundingBox,
        artifacts: &mut TempArtifacts,
    ) -> Result<ResolvedSource> {
        let dir = self.source_dir(descriptor);
        fs::create_dir_all(&dir)?;
        let now = SystemTime::now();

        let path = match descriptor.download_method {
            DownloadMethod::SrtmTiled => {
                let tiles = self.ensure_tiles(descriptor, bbox, &dir, now)?;
                self.merge_crop(descriptor, &tiles, bbox, &dir, artifacts)?
            }
            DownloadMethod::Http | DownloadMethod::Ftp | DownloadMethod::Local => {
                let raw = self.ensure_file(descriptor, &dir, now)?;
                match descriptor.lookup_method {
                    LookupMethod::Raster => {
                        self.merge_crop(descriptor, &[raw], bbox, &dir, artifacts)?
                    }
                    LookupMethod::ContourLines => raw,
                }
            }
        };

        Ok(ResolvedSource {
            descriptor: descriptor.clone(),
            path,
            bbox: *bbox,
        })
    }

    /// Single-file sources: fetch when stale, fail when a local file is absent.
    fn ensure_file(&self, descriptor: &SourceDescriptor, dir: &Path, now: SystemTime) -> Result<PathBuf> {
        if descriptor.local_filename.is_empty() {
            return Err(ElevationError::InvalidConfig(format!(
                "source '{}' has no filename",
                descriptor.name
            )));
        }
        let path = dir.join(&descriptor.local_filename);

        if !is_stale(&path, descriptor.download_method, descriptor.refresh_interval_days, now) {
            tracing::debug!(path = %path.display(), "Cached source is fresh");
            return Ok(path);
        }

        match descriptor.download_method {
            DownloadMethod::Local => Err(ElevationError::MissingLocalFile { path }),
            _ => {
                tracing::info!(
                    source = %descriptor.name,
                    method = descriptor.download_method.as_str(),
                    "Fetching source"
                );
                self.fetch(&descriptor.access_url, &path)?;
                Ok(path)
            }
        }
    }

    /// Tiled sources: one file per integer-degree tile under `bbox`.
    fn ensure_tiles(
        &self,
        descriptor: &SourceDescriptor,
        bbox: &BoundingBox,
        dir: &Path,
        now: SystemTime,
    ) -> Result<Vec<PathBuf>> {
        let grid = bbox.tile_grid();
        if grid.is_empty() {
            return Err(ElevationError::InvalidGeometry(format!(
                "no tiles cover bounding box {}",
                bbox
            )));
        }

        let mut paths = Vec::with_capacity(grid.len());
        for tile in grid {
            let path = dir.join(tile_filename(tile));
            if is_stale(&path, descriptor.download_method, descriptor.refresh_interval_days, now) {
                // A user-supplied archive beats the network
                let archive = dir.join(format!("{}.zip", tile_filename(tile)));
                if archive.exists() && !path.exists() {
                    extract_zip_file(&archive, &path)?;
                } else {
                    self.fetch_tile(&descriptor.access_url, tile, dir)?;
                }
            }
            paths.push(path);
        }
        tracing::debug!(tiles = paths.len(), "Tiles ready");
        Ok(paths)
    }

    /// Merge `inputs` cropped to `bbox` into a new temp GeoTIFF.
    fn merge_crop(
        &self,
        descriptor: &SourceDescriptor,
        inputs: &[PathBuf],
        bbox: &BoundingBox,
        dir: &Path,
        artifacts: &mut TempArtifacts,
    ) -> Result<PathBuf> {
        let band = descriptor.lookup_field.band().ok_or_else(|| {
            ElevationError::InvalidConfig(format!(
                "raster source '{}' needs a numeric band, got {}",
                descriptor.name, descriptor.lookup_field
            ))
        })?;

        let rasters = inputs
            .iter()
            .map(|p| Raster::open(p, band))
            .collect::<Result<Vec<_>>>()?;

        let native_bbox = match Reprojector::from_wgs84(&descriptor.source_crs)? {
            Some(reprojector) => reprojector.project_bbox(bbox)?,
            None => *bbox,
        };
        // One cell of margin so vertices on the box edge keep their cell
        let native_bbox = match rasters.first() {
            Some(first) => {
                let t = first.transform();
                native_bbox.padded(t.pixel_width.abs(), t.pixel_height.abs())
            }
            None => native_bbox,
        };
        let merged = Raster::merge_crop(&rasters, &native_bbox)?;

        let out = dir.join(temp_name());
        artifacts.register(out.clone());
        merged.write_geotiff(&out)?;

        tracing::info!(
            out = %out.display(),
            inputs = inputs.len(),
            width = merged.width(),
            height = merged.height(),
            "Wrote cropped raster"
        );
        Ok(out)
    }

    #[cfg(feature = "download")]
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloader.fetch(url, dest)
    }

    #[cfg(not(feature = "download"))]
    fn fetch(&self, url: &str, _dest: &Path) -> Result<()> {
        Err(ElevationError::DownloadDisabled {
            url: url.to_string(),
        })
    }

    #[cfg(feature = "download")]
    fn fetch_tile(&self, template: &str, tile: (i32, i32), dir: &Path) -> Result<PathBuf> {
        self.downloader.fetch_tile(template, tile, dir)
    }

    #[cfg(not(feature = "download"))]
    fn fetch_tile(&self, template: &str, _tile: (i32, i32), _dir: &Path) -> Result<PathBuf> {
        Err(ElevationError::DownloadDisabled {
            url: template.to_string(),
        })
    }
}

/// `crop_<unix-millis>_<pid>_<n>.tif`
fn temp_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("crop_{}_{}_{}.tif", millis, std::process::id(), n)
}
