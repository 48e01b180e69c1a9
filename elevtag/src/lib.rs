//! # elevtag - elevation profiles for paths
//!
//! Computes, for every line in a batch, its start and end elevation and the
//! total climb and descent along it. Elevations come from a catalog of
//! sources (raster DEMs or contour layers), with global SRTM tiles as the
//! fallback when no catalog source covers the batch.
//!
//! ## Pipeline
//!
//! 1. [`SourceCatalog::select`] picks the first source whose coverage fully
//!    contains the batch's bounding box.
//! 2. [`SourceCache::ensure`] makes a fresh local copy: downloading over
//!    HTTP/FTP, checking a local file, or fetching SRTM tiles, then cropping
//!    rasters to the query box.
//! 3. A [`RasterIndex`] or [`ContourIndex`] is opened on that file.
//! 4. [`BatchTagger`] runs every line through [`profile`], in parallel when
//!    asked, and returns the results in input order.
//!
//! [`Session`] ties these together and cleans up temp files when dropped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use elevtag::{Line, MultiLine, Session, SessionConfig};
//!
//! let config = SessionConfig::builder("data").build()?;
//! let mut session = Session::open(config)?;
//!
//! let lines: MultiLine = vec![Line::from_xy(&[(0.0, 48.0), (0.1, 48.1)])?]
//!     .into_iter()
//!     .collect();
//! let stats = session.tag(&lines)?;
//! if let Some([start, end, climb, descent]) = stats[0].to_record() {
//!     println!("{start} -> {end} (+{climb} / -{descent})");
//! }
//! # Ok::<(), elevtag::ElevationError>(())
//! ```
//!
//! ## Missing data
//!
//! A vertex without an elevation is skipped, never an error. A line where no
//! vertex has one is *undetermined*: `start` and `end` are `None` and
//! [`ElevationStats::to_record`] returns `None`.

pub mod archive;
pub mod batch;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod contour;
pub mod crs;
#[cfg(feature = "download")]
pub mod download;
pub mod error;
pub mod filename;
pub mod geojson;
pub mod geometry;
pub mod grid;
pub mod profile;
pub mod raster;
pub mod session;
pub mod tile;

// Re-export main types at crate root for convenience
pub use batch::BatchTagger;
pub use cache::{ResolvedSource, SourceCache, TempArtifacts};
pub use catalog::{DownloadMethod, LookupField, LookupMethod, SourceCatalog, SourceDescriptor, Units};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use contour::ContourIndex;
pub use error::{ElevationError, Result};
pub use geometry::{BoundingBox, Line, MultiLine};
pub use profile::{profile, ElevationStats, IndexSpec, SpatialIndex, NULL_ELEVATION};
pub use raster::RasterIndex;
pub use session::Session;
pub use tile::{SrtmResolution, SrtmTile, VOID_VALUE};

#[cfg(feature = "download")]
pub use download::{DownloadConfig, Downloader};
