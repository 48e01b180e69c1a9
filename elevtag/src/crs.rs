//! Coordinate reference systems and reprojection.
//!
//! CRSs are identified by `EPSG:<code>` strings. Only the codes listed in
//! [`proj_string`] are known; anything else is a configuration error.
//! Axis order is always `(x, y)`: longitude first for geographic systems,
//! easting first for projected ones.

use geo::Coord;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{ElevationError, Result};
use crate::geometry::BoundingBox;

/// EPSG code of WGS84 longitude/latitude.
pub const EPSG_WGS84: u32 = 4326;

/// Points projected per box edge by [`Reprojector::project_bbox`].
const EDGE_SAMPLES: usize = 32;

/// Parse a CRS identifier such as `"EPSG:26910"`, `"epsg:4326"` or `"4326"`.
pub fn parse_epsg(crs: &str) -> Result<u32> {
    let trimmed = crs.trim();
    let code = match trimmed.split_once(':') {
        Some((authority, code)) if authority.eq_ignore_ascii_case("epsg") => code,
        Some(_) => {
            return Err(ElevationError::Projection(format!(
                "unsupported CRS authority in '{}'",
                crs
            )))
        }
        None => trimmed,
    };
    code.trim()
        .parse()
        .map_err(|_| ElevationError::Projection(format!("invalid CRS identifier '{}'", crs)))
}

/// `true` if the identifier names WGS84.
pub fn is_wgs84(crs: &str) -> bool {
    matches!(parse_epsg(crs), Ok(EPSG_WGS84))
}

/// Whether coordinates of this CRS are angular degrees.
pub fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4269)
}

/// PROJ.4 definition for a supported EPSG code.
pub fn proj_string(epsg: u32) -> Option<String> {
    let def = match epsg {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        4269 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
            .to_string(),
        // WA State Plane North, US survey feet
        2285 => "+proj=lcc +lat_0=47 +lon_0=-120.833333333333 +lat_1=48.7333333333333 +lat_2=47.5 \
                 +x_0=500000.0001016 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 \
                 +to_meter=0.3048006096012192 +no_defs"
            .to_string(),
        // NY State Plane Long Island, US survey feet
        2263 => "+proj=lcc +lat_0=40.1666666666667 +lon_0=-74 +lat_1=41.0333333333333 \
                 +lat_2=40.6666666666667 +x_0=300000 +y_0=0 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 \
                 +to_meter=0.3048006096012192 +no_defs"
            .to_string(),
        27700 => "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 \
                  +ellps=airy +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs"
            .to_string(),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", epsg - 32600),
        32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            epsg - 32700
        ),
        _ => return None,
    };
    Some(def)
}

fn build_proj(epsg: u32) -> Result<Proj> {
    let def = proj_string(epsg)
        .ok_or_else(|| ElevationError::Projection(format!("EPSG:{} not supported", epsg)))?;
    Proj::from_proj_string(&def)
        .map_err(|e| ElevationError::Projection(format!("invalid projection EPSG:{}: {:?}", epsg, e)))
}

/// A point transform between two CRSs.
///
/// Construction is cheap and the value is not shared between workers;
/// each index builds its own.
pub struct Reprojector {
    source: Proj,
    target: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .finish()
    }
}

impl Reprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        Ok(Self {
            source: build_proj(source_epsg)?,
            target: build_proj(target_epsg)?,
            source_epsg,
            target_epsg,
        })
    }

    /// Transform from WGS84 into `crs`, or `None` when `crs` already is WGS84.
    pub fn from_wgs84(crs: &str) -> Result<Option<Self>> {
        if is_wgs84(crs) {
            return Ok(None);
        }
        Self::new(EPSG_WGS84, parse_epsg(crs)?).map(Some)
    }

    /// Transform from `crs` into WGS84, or `None` when `crs` already is WGS84.
    pub fn to_wgs84(crs: &str) -> Result<Option<Self>> {
        if is_wgs84(crs) {
            return Ok(None);
        }
        Self::new(parse_epsg(crs)?, EPSG_WGS84).map(Some)
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transform one coordinate.
    pub fn project(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = if is_geographic(self.source_epsg) {
            (c.x.to_radians(), c.y.to_radians())
        } else {
            (c.x, c.y)
        };
        let mut point = (x, y, 0.0);
        transform(&self.source, &self.target, &mut point)
            .map_err(|e| ElevationError::Projection(format!("transform failed: {:?}", e)))?;

        Ok(if is_geographic(self.target_epsg) {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        })
    }

    /// Transform a box by projecting points along its edges and taking
    /// their envelope.
    ///
    /// Straight edges in one CRS are curves in another, so the corners alone
    /// can miss the bulge of an edge (parallels in UTM, for instance).
    pub fn project_bbox(&self, bbox: &BoundingBox) -> Result<BoundingBox> {
        if bbox.is_empty() {
            return Ok(*bbox);
        }
        let corners = bbox.corners();
        let mut out = BoundingBox::empty();
        for (i, a) in corners.iter().enumerate() {
            let b = corners[(i + 1) % corners.len()];
            for k in 0..EDGE_SAMPLES {
                let t = k as f64 / EDGE_SAMPLES as f64;
                let c = Coord {
                    x: a.x + (b.x - a.x) * t,
                    y: a.y + (b.y - a.y) * t,
                };
                out = out.expand_to(self.project(c)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_epsg() {
        assert_eq!(parse_epsg("EPSG:4326").unwrap(), 4326);
        assert_eq!(parse_epsg("epsg:2285").unwrap(), 2285);
        assert_eq!(parse_epsg(" 32610 ").unwrap(), 32610);
        assert!(parse_epsg("ESRI:102003").is_err());
        assert!(parse_epsg("WGS84").is_err());
    }

    #[test]
    fn test_wgs84_needs_no_transform() {
        assert!(Reprojector::from_wgs84("EPSG:4326").unwrap().is_none());
        assert!(Reprojector::to_wgs84("epsg:4326").unwrap().is_none());
        assert!(is_wgs84("EPSG:4326"));
        assert!(!is_wgs84("EPSG:3857"));
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        assert!(proj_string(99999).is_none());
        assert!(Reprojector::from_wgs84("EPSG:99999").is_err());
    }

    #[test]
    fn test_utm_central_meridian() {
        // 3°E is the central meridian of UTM zone 31N
        let to_utm = Reprojector::from_wgs84("EPSG:32631").unwrap().unwrap();
        let p = to_utm.project(Coord { x: 3.0, y: 0.0 }).unwrap();
        assert_abs_diff_eq!(p.x, 500_000.0, epsilon = 1e-3);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_round_trip_through_utm() {
        let to_utm = Reprojector::from_wgs84("EPSG:32610").unwrap().unwrap();
        let back = Reprojector::to_wgs84("EPSG:32610").unwrap().unwrap();
        let seattle = Coord { x: -122.33, y: 47.61 };
        let p = back.project(to_utm.project(seattle).unwrap()).unwrap();
        assert_abs_diff_eq!(p.x, seattle.x, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, seattle.y, epsilon = 1e-6);
    }

    #[test]
    fn test_project_bbox_is_envelope() {
        let to_utm = Reprojector::from_wgs84("EPSG:32631").unwrap().unwrap();
        let bbox = to_utm
            .project_bbox(&BoundingBox::new(2.0, 1.0, 4.0, 2.0))
            .unwrap();
        assert!(bbox.is_valid());
        assert!(bbox.west < 500_000.0 && bbox.east > 500_000.0);
    }

    #[test]
    fn test_project_bbox_covers_curved_edges() {
        // In UTM 31N the parallel lat 60 sags to its lowest northing at the
        // central meridian, between the two southern corners
        let to_utm = Reprojector::from_wgs84("EPSG:32631").unwrap().unwrap();
        let query = BoundingBox::new(1.0, 60.0, 5.0, 60.5);
        let bbox = to_utm.project_bbox(&query).unwrap();

        let south_mid = to_utm.project(Coord { x: 3.0, y: 60.0 }).unwrap();
        let south_west = to_utm.project(Coord { x: 1.0, y: 60.0 }).unwrap();
        assert!(south_mid.y < south_west.y);
        assert!(bbox.contains_coord(south_mid));
        for corner in query.corners() {
            assert!(bbox.contains_coord(to_utm.project(corner).unwrap()));
        }
    }
}
