//! SRTM `.hgt` tile reading.
//!
//! SRTM files contain elevation data in a simple binary format:
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second (~30m) resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m) resolution
//!
//! Each sample is a 16-bit big-endian signed integer in meters, stored north
//! to south, west to east. Samples sit *on* the grid lines, so the outer rows
//! and columns duplicate the neighbouring tiles' edges. The value -32768
//! marks a void.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{ElevationError, Result};
use crate::filename::parse_tile_name;
use crate::grid::{GeoTransform, Raster};

/// File size for SRTM1 (1 arc-second, ~30m resolution): 3601 × 3601 × 2 bytes
const SRTM1_SIZE: usize = 3601 * 3601 * 2; // 25,934,402 bytes

/// File size for SRTM3 (3 arc-second, ~90m resolution): 1201 × 1201 × 2 bytes
const SRTM3_SIZE: usize = 1201 * 1201 * 2; // 2,884,802 bytes

const SRTM1_SAMPLES: usize = 3601;
const SRTM3_SAMPLES: usize = 1201;

/// Value indicating no data (void) in SRTM files
pub const VOID_VALUE: i16 = -32768;

/// Resolution type of an SRTM tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtmResolution {
    /// SRTM1: 1 arc-second (~30m) resolution
    Srtm1,
    /// SRTM3: 3 arc-second (~90m) resolution
    Srtm3,
}

impl SrtmResolution {
    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            SrtmResolution::Srtm1 => SRTM1_SAMPLES,
            SrtmResolution::Srtm3 => SRTM3_SAMPLES,
        }
    }
}

/// A memory-mapped SRTM tile.
pub struct SrtmTile {
    data: Mmap,
    samples: usize,
    resolution: SrtmResolution,
    /// South-west corner as `(lon, lat)`.
    origin: (i32, i32),
}

impl SrtmTile {
    /// Load a tile whose filename follows the `N48E002.hgt` convention.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_tile_name)
            .ok_or_else(|| ElevationError::InvalidRaster {
                path: path.to_path_buf(),
                reason: "SRTM filename does not encode a tile corner".to_string(),
            })?;
        Self::from_path_with_origin(path, origin)
    }

    /// Load a tile with an explicit `(lon, lat)` south-west corner.
    ///
    /// The resolution (SRTM1 vs SRTM3) is detected from the file size.
    pub fn from_path_with_origin<P: AsRef<Path>>(path: P, origin: (i32, i32)) -> Result<Self> {
        let file = File::open(&path)?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. Cached tiles are never rewritten once downloaded.
        let mmap = unsafe { Mmap::map(&file)? };

        let (samples, resolution) = match mmap.len() {
            SRTM1_SIZE => (SRTM1_SAMPLES, SrtmResolution::Srtm1),
            SRTM3_SIZE => (SRTM3_SAMPLES, SrtmResolution::Srtm3),
            size => return Err(ElevationError::InvalidFileSize { size }),
        };

        Ok(Self {
            data: mmap,
            samples,
            resolution,
            origin,
        })
    }

    /// Raw sample at `(row, col)`, row 0 being the north edge.
    pub fn sample_at(&self, row: usize, col: usize) -> Option<i16> {
        if row >= self.samples || col >= self.samples {
            return None;
        }
        let offset = (row * self.samples + col) * 2;
        Some(i16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    pub fn resolution(&self) -> SrtmResolution {
        self.resolution
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Geotransform treating each sample as the centre of a cell.
    pub fn geotransform(&self) -> GeoTransform {
        let step = 1.0 / (self.samples - 1) as f64;
        GeoTransform {
            origin_x: self.origin.0 as f64 - step / 2.0,
            origin_y: (self.origin.1 + 1) as f64 + step / 2.0,
            pixel_width: step,
            pixel_height: -step,
        }
    }

    /// Decode the whole tile into a [`Raster`], voids becoming nodata.
    pub fn to_raster(&self) -> Result<Raster> {
        let data = self
            .data
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]) as f32)
            .collect();
        Raster::new(
            data,
            self.samples,
            self.samples,
            self.geotransform(),
            Some(VOID_VALUE as f32),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::Coord;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write an SRTM3 tile where every sample is `fill`, except the centre
    /// sample which is `center`.
    pub(crate) fn write_srtm3_tile(dir: &Path, filename: &str, fill: i16, center: i16) {
        let mut data = Vec::with_capacity(SRTM3_SIZE);
        for _ in 0..SRTM3_SAMPLES * SRTM3_SAMPLES {
            data.extend_from_slice(&fill.to_be_bytes());
        }
        let offset = (600 * SRTM3_SAMPLES + 600) * 2;
        data[offset..offset + 2].copy_from_slice(&center.to_be_bytes());

        let mut file = File::create(dir.join(filename)).unwrap();
        file.write_all(&data).unwrap();
    }

    #[test]
    fn test_load_srtm3_file() {
        let dir = TempDir::new().unwrap();
        write_srtm3_tile(dir.path(), "N35E138.hgt", 0, 500);
        let tile = SrtmTile::from_path(dir.path().join("N35E138.hgt")).unwrap();

        assert_eq!(tile.resolution(), SrtmResolution::Srtm3);
        assert_eq!(tile.samples(), 1201);
        assert_eq!(tile.origin(), (138, 35));
        assert_eq!(tile.sample_at(600, 600), Some(500));
        assert_eq!(tile.sample_at(1201, 0), None);
    }

    #[test]
    fn test_invalid_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("N35E138.hgt");
        File::create(&path).unwrap().write_all(&[0u8; 1000]).unwrap();

        match SrtmTile::from_path(&path) {
            Err(ElevationError::InvalidFileSize { size }) => assert_eq!(size, 1000),
            other => panic!("Expected InvalidFileSize error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_unparseable_name() {
        let dir = TempDir::new().unwrap();
        write_srtm3_tile(dir.path(), "tile.hgt", 0, 0);
        assert!(SrtmTile::from_path(dir.path().join("tile.hgt")).is_err());
    }

    #[test]
    fn test_to_raster_georeferencing() {
        let dir = TempDir::new().unwrap();
        write_srtm3_tile(dir.path(), "N35E138.hgt", 7, 500);
        let raster = SrtmTile::from_path(dir.path().join("N35E138.hgt"))
            .unwrap()
            .to_raster()
            .unwrap();

        // Centre sample sits at (138.5, 35.5)
        assert_eq!(raster.sample(Coord { x: 138.5, y: 35.5 }), Some(500.0));
        assert_eq!(raster.sample(Coord { x: 138.1, y: 35.9 }), Some(7.0));
        // Corners belong to the tile
        assert_eq!(raster.sample(Coord { x: 138.0, y: 36.0 }), Some(7.0));
        assert_eq!(raster.sample(Coord { x: 139.0, y: 35.0 }), Some(7.0));
        assert_eq!(raster.sample(Coord { x: 139.01, y: 35.5 }), None);
    }

    #[test]
    fn test_void_becomes_nodata() {
        let dir = TempDir::new().unwrap();
        write_srtm3_tile(dir.path(), "N35E138.hgt", 0, VOID_VALUE);
        let raster = SrtmTile::from_path(dir.path().join("N35E138.hgt"))
            .unwrap()
            .to_raster()
            .unwrap();
        assert_eq!(raster.sample(Coord { x: 138.5, y: 35.5 }), None);
    }
}
