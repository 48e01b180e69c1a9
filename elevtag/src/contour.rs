//! Nearest-contour elevation lookups.
//!
//! A [`ContourIndex`] holds contour features in WGS84, each with one
//! elevation in meters, and an R-tree over their envelopes. A point's
//! elevation is the elevation of the closest contour:
//!
//! 1. If the point lies on a contour, that contour answers.
//! 2. Otherwise a search circle starting at [`INITIAL_SEARCH_RADIUS`] grows
//!    by [`SEARCH_GROWTH`] until it reaches at least one contour; the closest
//!    of those wins, ties going to the earliest feature in the layer.
//!
//! Distances are planar, in degrees.

use std::collections::BTreeSet;
use std::path::Path;

use geo::{Coord, Distance, Euclidean, Intersects, LineString, Point};
use geojson::{Feature, GeoJson};
use rstar::{RTree, RTreeObject, AABB};

use crate::catalog::Units;
use crate::crs::Reprojector;
use crate::error::{ElevationError, Result};
use crate::geojson::linework;
use crate::geometry::{BoundingBox, Line};

/// First search radius, in degrees (about 11 m at the equator).
pub const INITIAL_SEARCH_RADIUS: f64 = 0.0001;

/// Factor applied to the search radius after each empty search.
pub const SEARCH_GROWTH: f64 = 2.0;

/// Radius beyond which a search gives up.
const MAX_SEARCH_RADIUS: f64 = 1.0e4;

/// One contour: its linework and elevation in meters.
#[derive(Debug, Clone)]
pub struct ContourFeature {
    pub parts: Vec<LineString<f64>>,
    pub elevation: f64,
}

impl ContourFeature {
    pub fn new(parts: Vec<LineString<f64>>, elevation: f64) -> Self {
        Self { parts, elevation }
    }

    fn envelope(&self) -> Option<BoundingBox> {
        let bbox = BoundingBox::from_coords(self.parts.iter().flat_map(|p| p.coords().copied()));
        (!bbox.is_empty()).then_some(bbox)
    }

    fn touches(&self, point: &Point<f64>) -> bool {
        self.parts.iter().any(|part| part.intersects(point))
    }

    fn crosses(&self, line: &LineString<f64>) -> bool {
        self.parts.iter().any(|part| part.intersects(line))
    }

    fn distance_to(&self, point: &Point<f64>) -> f64 {
        self.parts
            .iter()
            .map(|part| Euclidean.distance(point, part))
            .fold(f64::INFINITY, f64::min)
    }
}

/// R-tree entry: a feature id and its envelope.
struct Envelope {
    id: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for Envelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// Spatially indexed contour layer.
pub struct ContourIndex {
    features: Vec<ContourFeature>,
    tree: RTree<Envelope>,
}

impl std::fmt::Debug for ContourIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContourIndex")
            .field("features", &self.features.len())
            .finish()
    }
}

impl ContourIndex {
    /// Load a GeoJSON contour layer.
    ///
    /// Coordinates are reprojected from `crs` to WGS84, features whose
    /// envelope misses `bbox` are dropped, and the `elevation_field` property
    /// is converted from `units` to meters. Features without a numeric
    /// elevation are skipped.
    pub fn open<P: AsRef<Path>>(
        path: P,
        crs: &str,
        elevation_field: &str,
        units: Units,
        bbox: &BoundingBox,
    ) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let geojson: GeoJson = text.parse()?;
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(ElevationError::UnsupportedFormat {
                    source_name: path.display().to_string(),
                    format: "GeoJSON geometry without properties".to_string(),
                })
            }
        };

        let reprojector = Reprojector::to_wgs84(crs)?;
        let total = features.len();
        let mut kept = Vec::with_capacity(total);

        for feature in &features {
            let Some(value) = elevation_of(feature, elevation_field) else {
                tracing::debug!(field = elevation_field, "Skipping contour without elevation");
                continue;
            };
            let Some(geometry) = &feature.geometry else {
                continue;
            };

            let mut parts = Vec::new();
            for coords in linework(geometry)? {
                let coords = match &reprojector {
                    Some(r) => coords
                        .into_iter()
                        .map(|c| r.project(c))
                        .collect::<Result<Vec<_>>>()?,
                    None => coords,
                };
                if !coords.is_empty() {
                    parts.push(LineString::from(coords));
                }
            }

            let contour = ContourFeature::new(parts, units.to_meters(value));
            match contour.envelope() {
                Some(env) if env.intersects(bbox) => kept.push(contour),
                _ => {}
            }
        }

        tracing::debug!(
            path = %path.display(),
            total,
            kept = kept.len(),
            "Opened contour index"
        );
        Ok(Self::from_features(kept))
    }

    /// Index features that are already in WGS84 meters. Features without
    /// any linework are dropped, and ids follow the order of the rest.
    pub fn from_features(features: Vec<ContourFeature>) -> Self {
        let features: Vec<ContourFeature> = features
            .into_iter()
            .filter(|f| f.envelope().is_some())
            .collect();
        let entries = features
            .iter()
            .enumerate()
            .filter_map(|(id, f)| {
                f.envelope().map(|b| Envelope {
                    id,
                    env: AABB::from_corners([b.west, b.south], [b.east, b.north]),
                })
            })
            .collect();
        Self {
            features,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Elevation of feature `id`, in meters.
    pub fn elevation(&self, id: usize) -> Option<f64> {
        self.features.get(id).map(|f| f.elevation)
    }

    /// Elevation of the contour closest to `c`, or `None` for an empty index.
    pub fn nearest(&self, c: Coord<f64>) -> Option<f64> {
        let candidates = self.point_candidates(c);
        self.nearest_in(c, candidates.iter().copied())
    }

    /// Elevation of the contour closest to `c` among `candidates`.
    pub fn nearest_among(&self, c: Coord<f64>, candidates: &BTreeSet<usize>) -> Option<f64> {
        self.nearest_in(c, candidates.iter().copied())
    }

    /// Every contour relevant to `line`: those it crosses plus the
    /// candidates of its first and last vertices.
    pub fn candidates_for_line(&self, line: &Line) -> BTreeSet<usize> {
        let ls = line.as_line_string();
        let bbox = line.bbox();
        let query = AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north]);

        let mut set: BTreeSet<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter(|e| self.features[e.id].crosses(ls))
            .map(|e| e.id)
            .collect();
        set.extend(self.point_candidates(line.first()));
        set.extend(self.point_candidates(line.last()));
        set
    }

    /// Contours on `c`, or else those reached by the smallest search circle
    /// that reaches any. Sorted by feature id.
    fn point_candidates(&self, c: Coord<f64>) -> Vec<usize> {
        if self.is_empty() || !(c.x.is_finite() && c.y.is_finite()) {
            return Vec::new();
        }
        let point = Point::from(c);

        let mut touching: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([c.x, c.y]))
            .filter(|e| self.features[e.id].touches(&point))
            .map(|e| e.id)
            .collect();
        if !touching.is_empty() {
            touching.sort_unstable();
            return touching;
        }

        let mut radius = INITIAL_SEARCH_RADIUS;
        while radius <= MAX_SEARCH_RADIUS {
            let window = AABB::from_corners([c.x - radius, c.y - radius], [c.x + radius, c.y + radius]);
            let mut found: Vec<usize> = self
                .tree
                .locate_in_envelope_intersecting(&window)
                .filter(|e| self.features[e.id].distance_to(&point) <= radius)
                .map(|e| e.id)
                .collect();
            if !found.is_empty() {
                found.sort_unstable();
                return found;
            }
            radius *= SEARCH_GROWTH;
        }
        Vec::new()
    }

    fn nearest_in<I: Iterator<Item = usize>>(&self, c: Coord<f64>, ids: I) -> Option<f64> {
        let ids: Vec<usize> = ids.filter(|&id| id < self.features.len()).collect();
        match ids.as_slice() {
            [] => None,
            [only] => Some(self.features[*only].elevation),
            _ => {
                let point = Point::from(c);
                let mut best: Option<(f64, usize)> = None;
                for id in ids {
                    let d = self.features[id].distance_to(&point);
                    // Strict comparison keeps the first-seen on ties
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, id));
                    }
                }
                best.map(|(_, id)| self.features[id].elevation)
            }
        }
    }
}

/// Numeric value of `field`, accepting numbers and numeric strings.
fn elevation_of(feature: &Feature, field: &str) -> Option<f64> {
    let value = match feature.property(field)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
