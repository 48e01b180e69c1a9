//! Point lookups against a single-band raster.

use std::path::{Path, PathBuf};

use geo::Coord;

use crate::crs::Reprojector;
use crate::error::Result;
use crate::grid::Raster;
use crate::profile::NULL_ELEVATION;

/// A decoded raster plus the transform from WGS84 into its native CRS.
///
/// Values are returned in the source's own units; converting to meters is
/// the caller's job.
#[derive(Debug)]
pub struct RasterIndex {
    raster: Raster,
    reprojector: Option<Reprojector>,
    path: PathBuf,
}

impl RasterIndex {
    /// Load band `band` (1-based) of `path`, whose coordinates are in `crs`.
    pub fn open<P: AsRef<Path>>(path: P, band: u32, crs: &str) -> Result<Self> {
        let path = path.as_ref();
        let raster = Raster::open(path, band)?;
        let reprojector = Reprojector::from_wgs84(crs)?;

        tracing::debug!(
            path = %path.display(),
            width = raster.width(),
            height = raster.height(),
            crs,
            "Opened raster index"
        );

        Ok(Self {
            raster,
            reprojector,
            path: path.to_path_buf(),
        })
    }

    /// Wrap an already-decoded raster in WGS84.
    pub fn from_raster(raster: Raster) -> Self {
        Self {
            raster,
            reprojector: None,
            path: PathBuf::new(),
        }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value of the cell containing the WGS84 coordinate `c`.
    ///
    /// `None` when the point is off the grid, on a nodata cell, at or below
    /// [`NULL_ELEVATION`], or cannot be projected.
    pub fn lookup(&self, c: Coord<f64>) -> Option<f64> {
        let native = match &self.reprojector {
            Some(reprojector) => match reprojector.project(c) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(x = c.x, y = c.y, error = %e, "Point not projectable");
                    return None;
                }
            },
            None => c,
        };

        let value = self.raster.sample(native)? as f64;
        if value <= NULL_ELEVATION {
            None
        } else {
            Some(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;
    use tempfile::TempDir;

    fn grid() -> Raster {
        let t = GeoTransform {
            origin_x: 0.0,
            origin_y: 2.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        Raster::new(vec![5.0, -40000.0, 7.0, 8.0], 2, 2, t, None).unwrap()
    }

    #[test]
    fn test_lookup_cells() {
        let index = RasterIndex::from_raster(grid());
        assert_eq!(index.lookup(Coord { x: 0.5, y: 1.5 }), Some(5.0));
        assert_eq!(index.lookup(Coord { x: 1.5, y: 0.5 }), Some(8.0));
        assert_eq!(index.lookup(Coord { x: 2.5, y: 0.5 }), None);
    }

    #[test]
    fn test_values_below_sentinel_are_nodata() {
        let index = RasterIndex::from_raster(grid());
        assert_eq!(index.lookup(Coord { x: 1.5, y: 1.5 }), None);
    }

    #[test]
    fn test_projected_raster() {
        // 10 km cells in UTM zone 31N around (500000, 0)
        let t = GeoTransform {
            origin_x: 490_000.0,
            origin_y: 10_000.0,
            pixel_width: 10_000.0,
            pixel_height: -10_000.0,
        };
        let raster = Raster::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, t, None).unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("utm.tif");
        raster.write_geotiff(&path).unwrap();

        let index = RasterIndex::open(&path, 1, "EPSG:32631").unwrap();
        // lon 3 is the zone's central meridian, x = 500000
        assert_eq!(index.lookup(Coord { x: 3.01, y: 0.01 }), Some(2.0));
        assert_eq!(index.lookup(Coord { x: 2.99, y: -0.01 }), Some(3.0));
    }

    #[test]
    fn test_unknown_crs_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.tif");
        grid().write_geotiff(&path).unwrap();
        assert!(RasterIndex::open(&path, 1, "EPSG:99999").is_err());
    }
}
