//! In-memory single-band elevation grids.
//!
//! A [`Raster`] is a row-major `f32` grid (row 0 = north edge) plus the
//! affine [`GeoTransform`] that places it in its native CRS. Rasters are read
//! from GeoTIFF (one band chosen by index) or SRTM `.hgt` tiles, and written
//! back as single-band `f32` GeoTIFFs by the merge/crop step of the cache.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;

use geo::Coord;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::error::{ElevationError, Result};
use crate::geometry::BoundingBox;
use crate::tile::SrtmTile;

/// Nodata value written into merged rasters.
pub const MERGED_NODATA: f32 = -32768.0;

/// Affine transform from (col, row) cell space to CRS coordinates.
///
/// Rotation terms are not supported; north-up grids only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X of the upper-left corner of the upper-left cell.
    pub origin_x: f64,
    /// Y of the upper-left corner of the upper-left cell.
    pub origin_y: f64,
    /// Cell width in CRS units.
    pub pixel_width: f64,
    /// Cell height in CRS units (negative for north-up grids).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// CRS coordinate of the centre of cell `(col, row)`.
    pub fn cell_center(&self, col: usize, row: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            y: self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        }
    }

    /// Fractional (col, row) of a CRS coordinate.
    pub fn to_cell(&self, c: Coord<f64>) -> (f64, f64) {
        (
            (c.x - self.origin_x) / self.pixel_width,
            (c.y - self.origin_y) / self.pixel_height,
        )
    }
}

/// A decoded single-band elevation grid.
#[derive(Debug, Clone)]
pub struct Raster {
    data: Vec<f32>,
    width: usize,
    height: usize,
    transform: GeoTransform,
    nodata: Option<f32>,
}

impl Raster {
    /// Build a raster from row-major cell values.
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f32>,
    ) -> Result<Self> {
        if data.len() != width * height {
            return Err(ElevationError::InvalidRaster {
                path: Default::default(),
                reason: format!(
                    "{} cells given for a {}x{} grid",
                    data.len(),
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    /// Open a raster file, choosing the reader from the extension.
    ///
    /// `.hgt` (and `.hgt.zip` already extracted by the cache) are read as SRTM
    /// tiles; everything else as GeoTIFF. `band` is 1-based and ignored for
    /// SRTM tiles, which have a single band.
    pub fn open<P: AsRef<Path>>(path: P, band: u32) -> Result<Self> {
        let path = path.as_ref();
        let is_hgt = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("hgt"))
            .unwrap_or(false);

        if is_hgt {
            SrtmTile::from_path(path)?.to_raster()
        } else {
            Self::read_geotiff(path, band)
        }
    }

    /// Read band `band` (1-based) of a GeoTIFF.
    pub fn read_geotiff<P: AsRef<Path>>(path: P, band: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        // Whole-area DEMs are large; lift the default decoding limits
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let transform = read_geotransform(&mut decoder, path)?;
        let nodata = read_nodata(&mut decoder);
        let samples = decode_samples(&mut decoder)?;

        let cells = width * height;
        if cells == 0 || samples.len() % cells != 0 {
            return Err(ElevationError::InvalidRaster {
                path: path.to_path_buf(),
                reason: format!("{} samples for a {}x{} grid", samples.len(), width, height),
            });
        }
        let bands = samples.len() / cells;
        if band == 0 || band as usize > bands {
            return Err(ElevationError::InvalidRaster {
                path: path.to_path_buf(),
                reason: format!("band {} requested, file has {}", band, bands),
            });
        }

        let data = if bands == 1 {
            samples
        } else {
            // Chunky layout: samples of one pixel are adjacent
            samples
                .into_iter()
                .skip(band as usize - 1)
                .step_by(bands)
                .collect()
        };

        tracing::debug!(path = %path.display(), width, height, bands, band, "Read GeoTIFF");

        Self::new(data, width, height, transform, nodata)
    }

    /// Write as a single-band `f32` GeoTIFF with georeferencing and nodata tags.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        let mut image =
            encoder.new_image::<colortype::Gray32Float>(self.width as u32, self.height as u32)?;

        let t = &self.transform;
        let scale = [t.pixel_width, -t.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
        // GDAL_NODATA is stored as an ASCII string
        if let Some(nodata) = self.nodata {
            let text = nodata.to_string();
            image
                .encoder()
                .write_tag(Tag::GdalNodata, text.as_str())?;
        }

        image.write_data(&self.data)?;
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Extent of the grid in its native CRS.
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        let x1 = t.origin_x + self.width as f64 * t.pixel_width;
        let y1 = t.origin_y + self.height as f64 * t.pixel_height;
        BoundingBox::new(
            t.origin_x.min(x1),
            t.origin_y.min(y1),
            t.origin_x.max(x1),
            t.origin_y.max(y1),
        )
    }

    /// Raw value of cell `(col, row)`, or `None` outside the grid.
    pub fn cell(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Value of the cell containing `c` (native CRS), or `None` outside the
    /// grid or on a nodata cell. No interpolation.
    pub fn sample(&self, c: Coord<f64>) -> Option<f32> {
        let (col, row) = self.transform.to_cell(c);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let value = self.cell(col.floor() as usize, row.floor() as usize)?;
        if value.is_nan() || Some(value) == self.nodata {
            None
        } else {
            Some(value)
        }
    }

    /// Mosaic `inputs` onto one grid covering `bbox` and return it.
    ///
    /// The output uses the cell size and grid alignment of the first input.
    /// Inputs are painted in order and a valid cell overwrites whatever an
    /// earlier input wrote (last writer wins); nodata cells never overwrite.
    /// `bbox` is in the inputs' CRS.
    pub fn merge_crop(inputs: &[Raster], bbox: &BoundingBox) -> Result<Raster> {
        let first = inputs.first().ok_or_else(|| ElevationError::InvalidRaster {
            path: Default::default(),
            reason: "nothing to merge".to_string(),
        })?;
        if !bbox.is_valid() {
            return Err(ElevationError::InvalidGeometry(format!(
                "cannot crop to bounding box {}",
                bbox
            )));
        }

        let base = first.transform;
        let pw = base.pixel_width;
        let ph = base.pixel_height.abs();

        // Snap the crop window outwards onto the first input's grid
        let col0 = ((bbox.west - base.origin_x) / pw).floor();
        let col1 = ((bbox.east - base.origin_x) / pw).floor();
        let row0 = ((base.origin_y - bbox.north) / ph).floor();
        let row1 = ((base.origin_y - bbox.south) / ph).floor();

        let width = (col1 - col0) as usize + 1;
        let height = (row1 - row0) as usize + 1;
        let transform = GeoTransform {
            origin_x: base.origin_x + col0 * pw,
            origin_y: base.origin_y - row0 * ph,
            pixel_width: pw,
            pixel_height: -ph,
        };

        let mut data = vec![MERGED_NODATA; width * height];
        for input in inputs {
            let extent = input.bounds();
            for row in 0..height {
                for col in 0..width {
                    let center = transform.cell_center(col, row);
                    if !extent.contains_coord(center) {
                        continue;
                    }
                    if let Some(v) = input.sample(center) {
                        data[row * width + col] = v;
                    }
                }
            }
        }

        Raster::new(data, width, height, transform, Some(MERGED_NODATA))
    }
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    match (tiepoint, scale) {
        (Ok(tie), Ok(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            // Tiepoint: [i, j, k, x, y, z] maps raster (i, j) to model (x, y)
            Ok(GeoTransform {
                origin_x: tie[3] - tie[0] * scale[0],
                origin_y: tie[4] + tie[1] * scale[1],
                pixel_width: scale[0],
                pixel_height: -scale[1],
            })
        }
        _ => Err(ElevationError::InvalidRaster {
            path: path.to_path_buf(),
            reason: "missing ModelTiepoint/ModelPixelScale tags".to_string(),
        }),
    }
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
}

fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let samples = match decoder.read_image()? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    };
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 4x2 grid over lon 0..4, lat 46..48 with one-degree cells.
    fn sample_raster() -> Raster {
        let transform = GeoTransform {
            origin_x: 0.0,
            origin_y: 48.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        let data = vec![
            10.0, 11.0, 12.0, -9999.0, //
            20.0, 21.0, 22.0, 23.0,
        ];
        Raster::new(data, 4, 2, transform, Some(-9999.0)).unwrap()
    }

    #[test]
    fn test_sample_picks_containing_cell() {
        let r = sample_raster();
        assert_eq!(r.sample(Coord { x: 0.5, y: 47.5 }), Some(10.0));
        assert_eq!(r.sample(Coord { x: 2.9, y: 46.1 }), Some(22.0));
        // Nodata cell
        assert_eq!(r.sample(Coord { x: 3.5, y: 47.5 }), None);
        // Outside the grid
        assert_eq!(r.sample(Coord { x: -0.1, y: 47.5 }), None);
        assert_eq!(r.sample(Coord { x: 4.5, y: 47.5 }), None);
        assert_eq!(r.sample(Coord { x: 0.5, y: 48.5 }), None);
    }

    #[test]
    fn test_new_rejects_wrong_cell_count() {
        let t = *sample_raster().transform();
        assert!(Raster::new(vec![0.0; 3], 2, 2, t, None).is_err());
    }

    #[test]
    fn test_geotiff_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.tif");
        let r = sample_raster();
        r.write_geotiff(&path).unwrap();

        let back = Raster::open(&path, 1).unwrap();
        assert_eq!(back.width(), 4);
        assert_eq!(back.height(), 2);
        assert_eq!(back.transform(), r.transform());
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.sample(Coord { x: 1.5, y: 46.5 }), Some(21.0));
        assert!(Raster::open(&path, 2).is_err());
    }

    #[test]
    fn test_reads_tags_written_by_number() {
        // GDAL and other writers emit the raw tag ids 33550, 33922, 42113
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("numbered.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(2, 1).unwrap();
            image
                .encoder()
                .write_tag(Tag::Unknown(33550), &[0.5f64, 0.25, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::Unknown(33922), &[0.0f64, 0.0, 0.0, 10.0, 20.0, 0.0][..])
                .unwrap();
            image.encoder().write_tag(Tag::Unknown(42113), "-1").unwrap();
            image.write_data(&[7.0f32, -1.0]).unwrap();
        }

        let r = Raster::open(&path, 1).unwrap();
        assert_eq!(r.transform().origin_x, 10.0);
        assert_eq!(r.transform().origin_y, 20.0);
        assert_eq!(r.transform().pixel_width, 0.5);
        assert_eq!(r.transform().pixel_height, -0.25);
        assert_eq!(r.nodata(), Some(-1.0));
        assert_eq!(r.sample(Coord { x: 10.2, y: 19.9 }), Some(7.0));
        assert_eq!(r.sample(Coord { x: 10.7, y: 19.9 }), None);
    }

    #[test]
    fn test_merge_crop_window() {
        let r = sample_raster();
        let merged = Raster::merge_crop(&[r], &BoundingBox::new(1.2, 46.2, 2.8, 46.8)).unwrap();
        assert_eq!(merged.width(), 2);
        assert_eq!(merged.height(), 1);
        assert_eq!(merged.sample(Coord { x: 1.5, y: 46.5 }), Some(21.0));
        assert_eq!(merged.sample(Coord { x: 2.5, y: 46.5 }), Some(22.0));
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let t = GeoTransform {
            origin_x: 0.0,
            origin_y: 1.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        let a = Raster::new(vec![1.0, 1.0], 2, 1, t, Some(-1.0)).unwrap();
        let b = Raster::new(vec![2.0, -1.0], 2, 1, t, Some(-1.0)).unwrap();

        let merged = Raster::merge_crop(&[a, b], &BoundingBox::new(0.1, 0.1, 1.9, 0.9)).unwrap();
        // Later input overwrites where valid
        assert_eq!(merged.sample(Coord { x: 0.5, y: 0.5 }), Some(2.0));
        // Nodata never overwrites
        assert_eq!(merged.sample(Coord { x: 1.5, y: 0.5 }), Some(1.0));
    }

    #[test]
    fn test_merge_uncovered_cells_are_nodata() {
        let r = sample_raster();
        let merged = Raster::merge_crop(&[r], &BoundingBox::new(3.2, 47.2, 5.5, 47.8)).unwrap();
        assert_eq!(merged.width(), 3);
        assert_eq!(merged.sample(Coord { x: 4.5, y: 47.5 }), None);
        assert_eq!(merged.cell(2, 0), Some(MERGED_NODATA));
    }
}
