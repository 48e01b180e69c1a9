//! Error types for the elevtag library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving, loading or querying elevation sources.
///
/// Missing elevation at a single vertex is never an error: lookups report it
/// as `None` and the profiler skips the sample.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source catalog could not be parsed.
    #[error("Invalid source catalog {path}: {reason}")]
    InvalidCatalog { path: PathBuf, reason: String },

    /// A configuration value is not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source uses a format or lookup combination this crate cannot read.
    #[error("Unsupported source format '{format}' for {source_name}")]
    UnsupportedFormat { source_name: String, format: String },

    /// A `local` source has no file on disk.
    #[error("Required local file not found: {path}")]
    MissingLocalFile { path: PathBuf },

    /// A download did not produce a usable file.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The crate was built without the `download` feature.
    #[error("Download support is disabled; cannot fetch {url}")]
    DownloadDisabled { url: String },

    /// HTTP transport error.
    #[cfg(feature = "download")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The raster file is readable but not a usable elevation grid.
    #[error("Invalid raster {path}: {reason}")]
    InvalidRaster { path: PathBuf, reason: String },

    /// SRTM tile file size doesn't match SRTM1 or SRTM3.
    #[error("Invalid file size: {size} bytes (expected 25934402 for SRTM1 or 2884802 for SRTM3)")]
    InvalidFileSize { size: usize },

    /// GeoJSON parse error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Coordinate reference system is unknown or a transform failed.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Geometry violates a precondition (e.g. a line with no coordinates).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A batch worker stopped before delivering all of its results.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::InvalidFileSize { size: 1000 };
        assert!(err.to_string().contains("1000"));

        let err = ElevationError::MissingLocalFile {
            path: PathBuf::from("data/king_county/dem.tif"),
        };
        assert!(err.to_string().contains("dem.tif"));

        let err = ElevationError::UnsupportedFormat {
            source_name: "Seattle contours".to_string(),
            format: "shapefile".to_string(),
        };
        assert!(err.to_string().contains("shapefile"));
        assert!(err.to_string().contains("Seattle contours"));
    }
}
