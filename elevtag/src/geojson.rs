//! Reading lines and contour features out of GeoJSON.
//!
//! Two directions use this module: the batch input (a set of polylines to
//! tag) and contour layers (lines or polygons carrying an elevation
//! property). Coordinates follow GeoJSON order, `[x, y]` or `[x, y, z]`;
//! any third value is ignored.

use std::path::Path;

use geo::Coord;
use geojson::{Feature, GeoJson, Geometry, Value as GeoJsonValue};

use crate::error::{ElevationError, Result};
use crate::geometry::{Line, MultiLine};

/// Parse GeoJSON text into the lines it contains.
///
/// Accepts a bare geometry, a `Feature` or a `FeatureCollection`. Every
/// `LineString` becomes one line and every `MultiLineString` contributes one
/// line per member, in document order. Other geometry types are an error,
/// since a point or polygon has no profile to tag.
pub fn lines_from_str(text: &str) -> Result<MultiLine> {
    let geojson: GeoJson = text.parse()?;
    lines_from_geojson(&geojson)
}

/// Read and parse a GeoJSON file of lines.
pub fn lines_from_file<P: AsRef<Path>>(path: P) -> Result<MultiLine> {
    let text = std::fs::read_to_string(path)?;
    lines_from_str(&text)
}

/// Collect the lines of an already-parsed document.
pub fn lines_from_geojson(geojson: &GeoJson) -> Result<MultiLine> {
    let mut lines = MultiLine::default();
    match geojson {
        GeoJson::Geometry(geometry) => push_lines(geometry, &mut lines)?,
        GeoJson::Feature(feature) => push_feature_lines(feature, &mut lines)?,
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                push_feature_lines(feature, &mut lines)?;
            }
        }
    }
    Ok(lines)
}

fn push_feature_lines(feature: &Feature, lines: &mut MultiLine) -> Result<()> {
    match &feature.geometry {
        Some(geometry) => push_lines(geometry, lines),
        None => Err(ElevationError::InvalidGeometry(
            "feature without geometry".to_string(),
        )),
    }
}

fn push_lines(geometry: &Geometry, lines: &mut MultiLine) -> Result<()> {
    match &geometry.value {
        GeoJsonValue::LineString(positions) => {
            lines.push(Line::new(to_coords(positions)?)?);
        }
        GeoJsonValue::MultiLineString(parts) => {
            for positions in parts {
                lines.push(Line::new(to_coords(positions)?)?);
            }
        }
        GeoJsonValue::GeometryCollection(geometries) => {
            for g in geometries {
                push_lines(g, lines)?;
            }
        }
        other => {
            return Err(ElevationError::InvalidGeometry(format!(
                "expected LineString or MultiLineString, found {}",
                other.type_name()
            )))
        }
    }
    Ok(())
}

/// The linework of a geometry: each line, or each ring of a polygon, as one
/// coordinate sequence. Points contribute nothing.
pub(crate) fn linework(geometry: &Geometry) -> Result<Vec<Vec<Coord<f64>>>> {
    let mut parts = Vec::new();
    collect_linework(&geometry.value, &mut parts)?;
    Ok(parts)
}

fn collect_linework(value: &GeoJsonValue, parts: &mut Vec<Vec<Coord<f64>>>) -> Result<()> {
    match value {
        GeoJsonValue::Point(_) | GeoJsonValue::MultiPoint(_) => {}
        GeoJsonValue::LineString(positions) => parts.push(to_coords(positions)?),
        GeoJsonValue::MultiLineString(lines) | GeoJsonValue::Polygon(lines) => {
            for positions in lines {
                parts.push(to_coords(positions)?);
            }
        }
        GeoJsonValue::MultiPolygon(polygons) => {
            for rings in polygons {
                for positions in rings {
                    parts.push(to_coords(positions)?);
                }
            }
        }
        GeoJsonValue::GeometryCollection(geometries) => {
            for g in geometries {
                collect_linework(&g.value, parts)?;
            }
        }
    }
    Ok(())
}

/// Convert GeoJSON positions to coordinates.
fn to_coords(positions: &[Vec<f64>]) -> Result<Vec<Coord<f64>>> {
    positions
        .iter()
        .map(|p| {
            if p.len() < 2 {
                return Err(ElevationError::InvalidGeometry(format!(
                    "coordinate must have at least 2 elements, got {}",
                    p.len()
                )));
            }
            Ok(Coord { x: p[0], y: p[1] })
        })
        .collect()
}
