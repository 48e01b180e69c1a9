//! Elevation source descriptors and the catalog that selects between them.
//!
//! The catalog is a JSON document with a `sources` array, read once per run:
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "name": "King County 2016 LIDAR",
//!       "url": "https://example.com/king_county_dem.tif",
//!       "bbox": { "W": -122.54, "S": 47.08, "E": -121.06, "N": 47.78 },
//!       "filename": "dem.tif",
//!       "format": "GeoTIFF",
//!       "crs": "EPSG:2285",
//!       "download_method": "http",
//!       "lookup_method": "raster",
//!       "lookup_field": 1,
//!       "units": "feet",
//!       "refresh_days": 365
//!     }
//!   ]
//! }
//! ```
//!
//! Order matters: the first source whose coverage fully contains the query
//! box wins. When nothing does, [`SourceDescriptor::srtm_fallback`] is used.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};
use crate::geometry::BoundingBox;

/// Default tile server for the SRTM fallback (ArduPilot, SRTM1, zipped).
pub const SRTM_URL_TEMPLATE: &str = "https://terrain.ardupilot.org/SRTM1/{filename}.hgt.zip";

/// Name of the synthesized fallback source.
pub const SRTM_SOURCE_NAME: &str = "SRTM 30m";

/// How a source's file gets onto local disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadMethod {
    Http,
    Ftp,
    /// Already on disk; never fetched.
    Local,
    /// One file per integer-degree tile, fetched from a URL template.
    SrtmTiled,
}

impl DownloadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMethod::Http => "http",
            DownloadMethod::Ftp => "ftp",
            DownloadMethod::Local => "local",
            DownloadMethod::SrtmTiled => "srtm-tiled",
        }
    }
}

/// How elevations are read out of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMethod {
    Raster,
    ContourLines,
}

/// Vertical units of a source's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Meters,
    Feet,
}

impl Units {
    /// Meters per foot.
    pub const FEET_TO_METERS: f64 = 0.3048;

    pub fn to_meters(&self, value: f64) -> f64 {
        match self {
            Units::Meters => value,
            Units::Feet => value * Self::FEET_TO_METERS,
        }
    }
}

/// Raster band (1-based) or vector attribute holding the elevation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupField {
    Band(u32),
    Attribute(String),
}

impl LookupField {
    /// Band index for raster lookups; numeric strings are accepted too.
    pub fn band(&self) -> Option<u32> {
        match self {
            LookupField::Band(b) => Some(*b),
            LookupField::Attribute(s) => s.trim().parse().ok(),
        }
    }

    /// Attribute name for contour lookups.
    pub fn attribute(&self) -> String {
        match self {
            LookupField::Band(b) => b.to_string(),
            LookupField::Attribute(s) => s.clone(),
        }
    }
}

impl Default for LookupField {
    fn default() -> Self {
        LookupField::Band(1)
    }
}

impl fmt::Display for LookupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupField::Band(b) => write!(f, "band {}", b),
            LookupField::Attribute(s) => write!(f, "'{}'", s),
        }
    }
}

fn default_crs() -> String {
    "EPSG:4326".to_string()
}

fn default_refresh_days() -> u64 {
    365
}

/// One elevation data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    /// Download URL; for tiled sources a template with `{filename}` etc.
    #[serde(rename = "url", default)]
    pub access_url: String,
    /// Area within which the source is authoritative.
    #[serde(rename = "bbox")]
    pub coverage: BoundingBox,
    /// Name of the file inside the source's data directory.
    #[serde(rename = "filename", default)]
    pub local_filename: String,
    /// File format, e.g. `GeoTIFF`, `HGT`, `GeoJSON`.
    pub format: String,
    #[serde(rename = "crs", default = "default_crs")]
    pub source_crs: String,
    pub download_method: DownloadMethod,
    pub lookup_method: LookupMethod,
    #[serde(default)]
    pub lookup_field: LookupField,
    #[serde(rename = "units", default)]
    pub source_units: Units,
    #[serde(rename = "refresh_days", default = "default_refresh_days")]
    pub refresh_interval_days: u64,
}

impl SourceDescriptor {
    /// The global tiled SRTM source used when no catalog entry covers a query.
    pub fn srtm_fallback() -> Self {
        Self {
            name: SRTM_SOURCE_NAME.to_string(),
            access_url: SRTM_URL_TEMPLATE.to_string(),
            coverage: BoundingBox::new(-180.0, -60.0, 180.0, 60.0),
            local_filename: String::new(),
            format: "HGT".to_string(),
            source_crs: default_crs(),
            download_method: DownloadMethod::SrtmTiled,
            lookup_method: LookupMethod::Raster,
            lookup_field: LookupField::Band(1),
            source_units: Units::Meters,
            refresh_interval_days: 100,
        }
    }

    /// Directory name for this source's files under the data directory.
    ///
    /// Lower-case name with every run of non-alphanumerics collapsed to `_`.
    pub fn dir_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.ends_with('_') {
                out.push('_');
            }
        }
        let trimmed = out.trim_matches('_');
        if trimmed.is_empty() {
            "source".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    sources: Vec<SourceDescriptor>,
}

/// The ordered list of configured sources.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<SourceDescriptor>,
    fallback: SourceDescriptor,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SourceCatalog {
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self {
            sources,
            fallback: SourceDescriptor::srtm_fallback(),
        }
    }

    /// Fetch fallback tiles from `template` instead of the default server.
    pub fn with_fallback_template(mut self, template: impl Into<String>) -> Self {
        self.fallback.access_url = template.into();
        self
    }

    /// The descriptor returned when nothing in the catalog covers a query.
    pub fn fallback(&self) -> &SourceDescriptor {
        &self.fallback
    }

    /// A catalog with no entries; every query falls back to SRTM.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Any read or parse failure is returned as [`ElevationError::InvalidCatalog`];
    /// a broken catalog is never partially used.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ElevationError::InvalidCatalog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let catalog = Self::from_json(&text).map_err(|e| match e {
            ElevationError::InvalidCatalog { reason, .. } => ElevationError::InvalidCatalog {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), sources = catalog.len(), "Loaded source catalog");
        Ok(catalog)
    }

    /// Parse catalog JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(text).map_err(|e| ElevationError::InvalidCatalog {
                path: Default::default(),
                reason: e.to_string(),
            })?;

        for source in &file.sources {
            if !source.coverage.is_valid() {
                return Err(ElevationError::InvalidCatalog {
                    path: Default::default(),
                    reason: format!("source '{}' has an invalid bbox", source.name),
                });
            }
        }
        Ok(Self::new(file.sources))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// First source, in catalog order, whose coverage fully contains `bbox`.
    pub fn find(&self, bbox: &BoundingBox) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.coverage.contains(bbox))
    }

    /// The source to use for `bbox`: the first full-containment match, or
    /// the SRTM fallback.
    pub fn select(&self, bbox: &BoundingBox) -> SourceDescriptor {
        match self.find(bbox) {
            Some(source) => {
                tracing::info!(source = %source.name, %bbox, "Selected elevation source");
                source.clone()
            }
            None => {
                tracing::info!(%bbox, "No catalog source covers the query, using SRTM");
                self.fallback.clone()
            }
        }
    }
}
