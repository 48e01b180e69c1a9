//! Geometric value types: bounding boxes, lines and batches of lines.
//!
//! All coordinates are `(x, y)` = `(longitude, latitude)` in WGS84 degrees
//! unless a function says otherwise.

use std::fmt;

use geo::{Coord, LineString, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};

/// An axis-aligned rectangle given by its west, south, east and north edges.
///
/// The zero-argument default is the *empty* box, which contains nothing and
/// is contained by nothing. Non-empty boxes are expected to satisfy
/// `W <= E` and `S <= N`; [`BoundingBox::new`] does not enforce it, callers
/// that build boxes from untrusted input should check [`BoundingBox::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "W")]
    pub west: f64,
    #[serde(rename = "S")]
    pub south: f64,
    #[serde(rename = "E")]
    pub east: f64,
    #[serde(rename = "N")]
    pub north: f64,
    #[serde(skip)]
    empty: bool,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Create a bounding box from its W, S, E, N edges.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
            empty: false,
        }
    }

    /// The empty bounding box.
    pub fn empty() -> Self {
        Self {
            west: 0.0,
            south: 0.0,
            east: 0.0,
            north: 0.0,
            empty: true,
        }
    }

    /// Smallest box enclosing every coordinate, or the empty box for no coordinates.
    pub fn from_coords<I: IntoIterator<Item = Coord<f64>>>(coords: I) -> Self {
        coords.into_iter().fold(Self::empty(), |bbox, c| bbox.expand_to(c))
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// `true` if the box is non-empty and its edges are ordered.
    pub fn is_valid(&self) -> bool {
        !self.empty && self.west <= self.east && self.south <= self.north
    }

    /// Full containment: every point of `other` lies inside (or on the edge of) `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        if self.empty || other.empty {
            return false;
        }
        self.west <= other.west
            && self.south <= other.south
            && self.east >= other.east
            && self.north >= other.north
    }

    pub fn contains_coord(&self, c: Coord<f64>) -> bool {
        !self.empty && c.x >= self.west && c.x <= self.east && c.y >= self.south && c.y <= self.north
    }

    /// `true` if the two boxes share at least one point.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.empty || other.empty {
            return false;
        }
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// Grow the box to include `c`.
    pub fn expand_to(self, c: Coord<f64>) -> Self {
        if self.empty {
            return Self::new(c.x, c.y, c.x, c.y);
        }
        Self::new(
            self.west.min(c.x),
            self.south.min(c.y),
            self.east.max(c.x),
            self.north.max(c.y),
        )
    }

    /// The box grown by `dx` on its west and east edges and `dy` on its
    /// south and north edges.
    pub fn padded(&self, dx: f64, dy: f64) -> Self {
        if self.empty {
            return *self;
        }
        Self::new(self.west - dx, self.south - dy, self.east + dx, self.north + dy)
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> Self {
        match (self.empty, other.empty) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Self::new(
                self.west.min(other.west),
                self.south.min(other.south),
                self.east.max(other.east),
                self.north.max(other.north),
            ),
        }
    }

    /// The four corners, counter-clockwise from south-west.
    pub fn corners(&self) -> [Coord<f64>; 4] {
        [
            Coord { x: self.west, y: self.south },
            Coord { x: self.east, y: self.south },
            Coord { x: self.east, y: self.north },
            Coord { x: self.west, y: self.north },
        ]
    }

    /// Integer-degree tiles covering the box, as `(x, y)` south-west corners.
    ///
    /// Tiles span `floor(W)..ceil(E)` and `floor(S)..ceil(N)` (upper bound
    /// exclusive), with at least one tile per axis so a degenerate box on an
    /// integer meridian still maps to the tile east/north of it.
    pub fn tile_grid(&self) -> Vec<(i32, i32)> {
        if self.empty {
            return Vec::new();
        }
        let x0 = self.west.floor() as i32;
        let x1 = (self.east.ceil() as i32).max(x0 + 1);
        let y0 = self.south.floor() as i32;
        let y1 = (self.north.ceil() as i32).max(y0 + 1);

        let mut tiles = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for x in x0..x1 {
            for y in y0..y1 {
                tiles.push((x, y));
            }
        }
        tiles
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            write!(f, "[]")
        } else {
            write!(
                f,
                "W: {} S: {} E: {} N: {}",
                self.west, self.south, self.east, self.north
            )
        }
    }
}

/// An ordered, non-empty sequence of WGS84 coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Line(LineString<f64>);

impl Line {
    /// Build a line, rejecting an empty coordinate list.
    pub fn new(coords: Vec<Coord<f64>>) -> Result<Self> {
        if coords.is_empty() {
            return Err(ElevationError::InvalidGeometry(
                "a line needs at least one coordinate".to_string(),
            ));
        }
        Ok(Self(LineString::new(coords)))
    }

    /// Build a line from `(x, y)` pairs.
    pub fn from_xy(points: &[(f64, f64)]) -> Result<Self> {
        Self::new(points.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.0 .0
    }

    pub fn first(&self) -> Coord<f64> {
        self.0 .0[0]
    }

    pub fn last(&self) -> Coord<f64> {
        self.0 .0[self.0 .0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0 .0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_line_string(&self) -> &LineString<f64> {
        &self.0
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_coords(self.coords().iter().copied())
    }
}

/// An ordered batch of lines; the unit of work handed to the batch tagger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiLine {
    lines: Vec<Line>,
}

impl MultiLine {
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Line> {
        self.lines.iter()
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Bounding box of every coordinate of every line.
    pub fn bbox(&self) -> BoundingBox {
        self.lines
            .iter()
            .fold(BoundingBox::empty(), |acc, line| acc.union(&line.bbox()))
    }
}

impl FromIterator<Line> for MultiLine {
    fn from_iter<T: IntoIterator<Item = Line>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MultiLine {
    type Item = &'a Line;
    type IntoIter = std::slice::Iter<'a, Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_requires_full_containment() {
        let outer = BoundingBox::new(-10.0, 40.0, 10.0, 60.0);
        assert!(outer.contains(&BoundingBox::new(-5.0, 45.0, 5.0, 50.0)));
        assert!(outer.contains(&outer));
        // Overlapping is not enough
        assert!(!outer.contains(&BoundingBox::new(5.0, 45.0, 15.0, 50.0)));
        assert!(outer.intersects(&BoundingBox::new(5.0, 45.0, 15.0, 50.0)));
    }

    #[test]
    fn test_empty_box() {
        let empty = BoundingBox::default();
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(empty.is_empty());
        assert!(!empty.contains(&bbox));
        assert!(!bbox.contains(&empty));
        assert_eq!(empty.to_string(), "[]");
        assert_eq!(empty.union(&bbox), bbox);
        assert!(empty.tile_grid().is_empty());
    }

    #[test]
    fn test_padded() {
        let b = BoundingBox::new(1.0, 2.0, 3.0, 4.0).padded(0.5, 0.25);
        assert_eq!(b, BoundingBox::new(0.5, 1.75, 3.5, 4.25));
        assert!(BoundingBox::empty().padded(1.0, 1.0).is_empty());
    }

    #[test]
    fn test_tile_grid_single_tile() {
        let bbox = BoundingBox::new(2.3, 48.1, 2.9, 48.9);
        assert_eq!(bbox.tile_grid(), vec![(2, 48)]);
    }

    #[test]
    fn test_tile_grid_spans_negative_coords() {
        let bbox = BoundingBox::new(-0.5, -1.5, 0.5, -0.5);
        assert_eq!(bbox.tile_grid(), vec![(-1, -2), (-1, -1), (0, -2), (0, -1)]);
    }

    #[test]
    fn test_tile_grid_degenerate_box() {
        let bbox = BoundingBox::new(3.0, 45.0, 3.0, 45.0);
        assert_eq!(bbox.tile_grid(), vec![(3, 45)]);
    }

    #[test]
    fn test_line_rejects_empty() {
        assert!(Line::new(Vec::new()).is_err());
        let line = Line::from_xy(&[(0.0, 48.0)]).unwrap();
        assert_eq!(line.len(), 1);
        assert_eq!(line.first(), line.last());
    }

    #[test]
    fn test_multiline_bbox() {
        let lines: MultiLine = vec![
            Line::from_xy(&[(0.0, 48.0), (1.0, 49.0)]).unwrap(),
            Line::from_xy(&[(-2.0, 47.5)]).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(lines.bbox(), BoundingBox::new(-2.0, 47.5, 1.0, 49.0));
    }

    #[test]
    fn test_bbox_deserialize() {
        let bbox: BoundingBox =
            serde_json::from_str(r#"{"W": -10.0, "S": 40.0, "E": 10.0, "N": 60.0}"#).unwrap();
        assert!(!bbox.is_empty());
        assert_eq!(bbox, BoundingBox::new(-10.0, 40.0, 10.0, 60.0));
    }
}
