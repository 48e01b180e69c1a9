//! Elevation profiles along lines.
//!
//! [`profile`] walks a line's vertices in order, looks each one up in a
//! [`SpatialIndex`] and turns the elevations into an [`ElevationStats`]:
//! start, end, and the climb and descent between consecutive valid samples.
//!
//! Raster lookups may come back empty (off the grid, nodata). Leading empty
//! samples are skipped until a start is found; interior empty samples are
//! skipped without resetting the previous elevation, so climb and descent
//! span the gap.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cache::ResolvedSource;
use crate::catalog::{LookupMethod, Units};
use crate::contour::ContourIndex;
use crate::error::Result;
use crate::geometry::{BoundingBox, Line};
use crate::raster::RasterIndex;

/// Raster values at or below this are treated as missing.
pub const NULL_ELEVATION: f64 = -32768.0;

/// The profile of one line.
///
/// `start` and `end` are `None` when no vertex had an elevation; such a
/// record is *undetermined* and is written as a blank row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationStats {
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// Total elevation gained, meters, never negative.
    pub climb: f64,
    /// Total elevation lost, meters, never negative.
    pub descent: f64,
    /// Position of the line in its batch.
    pub sequence_index: usize,
}

impl ElevationStats {
    pub fn undetermined(sequence_index: usize) -> Self {
        Self {
            start: None,
            end: None,
            climb: 0.0,
            descent: 0.0,
            sequence_index,
        }
    }

    /// A flat profile at one elevation.
    pub fn flat(elevation: f64, sequence_index: usize) -> Self {
        Self {
            start: Some(elevation),
            end: Some(elevation),
            climb: 0.0,
            descent: 0.0,
            sequence_index,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.start.is_none()
    }

    /// `[start, end, climb, descent]` rounded to millimetres, or `None` when
    /// undetermined.
    pub fn to_record(&self) -> Option<[f64; 4]> {
        let (start, end) = (self.start?, self.end?);
        Some([
            round_mm(start),
            round_mm(end),
            round_mm(self.climb),
            round_mm(self.descent),
        ])
    }
}

fn round_mm(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Accumulates climb and descent over a stream of optional samples.
#[derive(Debug, Default)]
struct Accumulator {
    start: Option<f64>,
    previous: Option<f64>,
    climb: f64,
    descent: f64,
}

impl Accumulator {
    fn push(&mut self, sample: Option<f64>) {
        let Some(elevation) = sample else {
            return;
        };
        match self.previous {
            None => self.start = Some(elevation),
            Some(prev) if elevation > prev => self.climb += elevation - prev,
            Some(prev) => self.descent += prev - elevation,
        }
        self.previous = Some(elevation);
    }

    fn finish(self, sequence_index: usize) -> ElevationStats {
        match self.start {
            None => ElevationStats::undetermined(sequence_index),
            Some(start) => ElevationStats {
                start: Some(start),
                end: self.previous,
                climb: self.climb,
                descent: self.descent,
                sequence_index,
            },
        }
    }
}

/// A loaded index of either kind.
#[derive(Debug)]
pub enum SpatialIndex {
    /// Raster values are in `units` and converted to meters on lookup.
    Raster { index: RasterIndex, units: Units },
    /// Contour elevations are already in meters.
    Contour(ContourIndex),
}

/// Profile `line` against `index`.
pub fn profile(line: &Line, index: &SpatialIndex, sequence_index: usize) -> ElevationStats {
    match index {
        SpatialIndex::Raster { index, units } => profile_raster(line, index, *units, sequence_index),
        SpatialIndex::Contour(index) => profile_contour(line, index, sequence_index),
    }
}

/// Raster profile: sample every vertex, skipping missing values.
pub fn profile_raster(
    line: &Line,
    index: &RasterIndex,
    units: Units,
    sequence_index: usize,
) -> ElevationStats {
    let mut acc = Accumulator::default();
    for c in line.coords() {
        acc.push(index.lookup(*c).map(|v| units.to_meters(v)));
    }
    acc.finish(sequence_index)
}

/// Contour profile: nearest-contour elevation of every vertex, restricted
/// to the line's candidate contours.
pub fn profile_contour(line: &Line, index: &ContourIndex, sequence_index: usize) -> ElevationStats {
    let candidates: BTreeSet<usize> = index.candidates_for_line(line);
    if candidates.is_empty() {
        return ElevationStats::undetermined(sequence_index);
    }

    // One contour, a single vertex or a closed loop: flat by definition
    let single = if candidates.len() == 1 {
        candidates.iter().next().and_then(|&id| index.elevation(id))
    } else if line.len() == 1 || line.first() == line.last() {
        index.nearest_among(line.first(), &candidates)
    } else {
        None
    };
    if let Some(elevation) = single {
        return ElevationStats::flat(elevation, sequence_index);
    }

    let mut acc = Accumulator::default();
    for c in line.coords() {
        acc.push(index.nearest_among(*c, &candidates));
    }
    acc.finish(sequence_index)
}

/// Everything needed to open an index, and nothing that cannot be sent to
/// another thread.
///
/// Opening depends on nothing but these fields, so every worker builds its
/// own index from the same file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub path: PathBuf,
    pub lookup_method: LookupMethod,
    /// Raster band, 1-based.
    pub band: u32,
    /// Contour elevation attribute.
    pub field: String,
    pub crs: String,
    pub units: Units,
    /// Query box used to crop contour layers.
    pub bbox: BoundingBox,
}

impl IndexSpec {
    /// Describe how to open a resolved source.
    ///
    /// Raster sources resolve to a cropped single-band GeoTIFF written by the
    /// cache, so the band is always 1 whatever the source file used.
    pub fn from_resolved(resolved: &ResolvedSource) -> Self {
        let d = &resolved.descriptor;
        Self {
            path: resolved.path.clone(),
            lookup_method: d.lookup_method,
            band: 1,
            field: d.lookup_field.attribute(),
            crs: d.source_crs.clone(),
            units: d.source_units,
            bbox: resolved.bbox,
        }
    }

    /// Open the index described by this spec.
    pub fn open(&self) -> Result<SpatialIndex> {
        match self.lookup_method {
            LookupMethod::Raster => Ok(SpatialIndex::Raster {
                index: RasterIndex::open(&self.path, self.band, &self.crs)?,
                units: self.units,
            }),
            LookupMethod::ContourLines => Ok(SpatialIndex::Contour(ContourIndex::open(
                &self.path,
                &self.crs,
                &self.field,
                self.units,
                &self.bbox,
            )?)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_raster(&self) -> bool {
        self.lookup_method == LookupMethod::Raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::ContourFeature;
    use crate::grid::{GeoTransform, Raster};
    use geo::LineString;

    /// One row of five one-degree cells along the equator.
    fn raster_index(values: [f32; 5]) -> RasterIndex {
        let t = GeoTransform {
            origin_x: 0.0,
            origin_y: 1.0,
            pixel_width: 1.0,
            pixel_height: -1.0,
        };
        RasterIndex::from_raster(Raster::new(values.to_vec(), 5, 1, t, Some(-9999.0)).unwrap())
    }

    fn across(n: usize) -> Line {
        let pts: Vec<(f64, f64)> = (0..n).map(|i| (i as f64 + 0.5, 0.5)).collect();
        Line::from_xy(&pts).unwrap()
    }

    #[test]
    fn test_climb_and_descent() {
        let index = raster_index([10.0, 30.0, 20.0, 25.0, 5.0]);
        let stats = profile_raster(&across(5), &index, Units::Meters, 7);
        assert_eq!(stats.start, Some(10.0));
        assert_eq!(stats.end, Some(5.0));
        assert_eq!(stats.climb, 25.0);
        assert_eq!(stats.descent, 30.0);
        assert_eq!(stats.sequence_index, 7);
    }

    #[test]
    fn test_leading_nodata_is_skipped() {
        let index = raster_index([-9999.0, -40000.0, 50.0, 60.0, 55.0]);
        let stats = profile_raster(&across(5), &index, Units::Meters, 0);
        assert_eq!(stats.start, Some(50.0));
        assert_eq!(stats.climb, 10.0);
        assert_eq!(stats.descent, 5.0);
    }

    #[test]
    fn test_interior_nodata_carries_previous() {
        let index = raster_index([10.0, -9999.0, 30.0, -9999.0, 20.0]);
        let stats = profile_raster(&across(5), &index, Units::Meters, 0);
        assert_eq!(stats.climb, 20.0);
        assert_eq!(stats.descent, 10.0);
        assert_eq!(stats.end, Some(20.0));
    }

    #[test]
    fn test_all_nodata_is_undetermined() {
        let index = raster_index([-9999.0; 5]);
        let stats = profile_raster(&across(5), &index, Units::Meters, 3);
        assert!(stats.is_undetermined());
        assert_eq!(stats.to_record(), None);
        assert_eq!(stats.sequence_index, 3);
    }

    #[test]
    fn test_feet_are_converted() {
        let index = raster_index([100.0, 200.0, 0.0, 0.0, 0.0]);
        let stats = profile_raster(&across(2), &index, Units::Feet, 0);
        assert_eq!(stats.to_record(), Some([30.48, 60.96, 30.48, 0.0]));
    }

    #[test]
    fn test_single_point_line() {
        let index = SpatialIndex::Raster {
            index: raster_index([42.0, 0.0, 0.0, 0.0, 0.0]),
            units: Units::Meters,
        };
        let stats = profile(&across(1), &index, 0);
        assert_eq!(stats.start, stats.end);
        assert_eq!((stats.climb, stats.descent), (0.0, 0.0));
    }

    fn contours() -> ContourIndex {
        let at = |y: f64, e: f64| {
            ContourFeature::new(vec![LineString::from(vec![(0.0, y), (10.0, y)])], e)
        };
        ContourIndex::from_features(vec![at(0.0, 100.0), at(1.0, 110.0), at(2.0, 120.0)])
    }

    #[test]
    fn test_contour_walk() {
        let index = contours();
        let line = Line::from_xy(&[(5.0, 0.0), (5.0, 1.0), (5.0, 2.0), (5.0, 1.05)]).unwrap();
        let stats = profile_contour(&line, &index, 0);
        assert_eq!(stats.start, Some(100.0));
        assert_eq!(stats.end, Some(110.0));
        assert_eq!(stats.climb, 20.0);
        assert_eq!(stats.descent, 10.0);
    }

    #[test]
    fn test_single_candidate_is_flat() {
        let index = contours();
        // Wiggles around y=1 without reaching the others
        let line = Line::from_xy(&[(4.0, 1.0), (5.0, 1.02), (6.0, 0.98), (7.0, 1.0)]).unwrap();
        let stats = profile_contour(&line, &index, 0);
        assert_eq!(stats.start, Some(110.0));
        assert_eq!(stats.end, Some(110.0));
        assert_eq!((stats.climb, stats.descent), (0.0, 0.0));
    }

    #[test]
    fn test_closed_loop_is_flat() {
        let index = contours();
        let line = Line::from_xy(&[(5.0, 0.0), (5.0, 2.0), (6.0, 2.0), (5.0, 0.0)]).unwrap();
        let stats = profile_contour(&line, &index, 0);
        assert_eq!(stats.start, Some(100.0));
        assert_eq!(stats.end, Some(100.0));
        assert_eq!((stats.climb, stats.descent), (0.0, 0.0));
    }

    #[test]
    fn test_empty_contour_index() {
        let index = ContourIndex::from_features(Vec::new());
        assert!(profile_contour(&across(3), &index, 0).is_undetermined());
    }

    #[test]
    fn test_record_rounding() {
        let stats = ElevationStats {
            start: Some(1.23456),
            end: Some(2.0004),
            climb: 0.7656,
            descent: 0.0,
            sequence_index: 0,
        };
        assert_eq!(stats.to_record(), Some([1.235, 2.0, 0.766, 0.0]));
    }
}
