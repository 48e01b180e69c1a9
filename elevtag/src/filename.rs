//! SRTM tile naming.
//!
//! SRTM tiles follow the naming convention `{N|S}{lat}{E|W}{lon}.hgt`:
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N35, S12)
//! - Longitude: 3 digits with E/W prefix (e.g., E138, W077)
//!
//! The name identifies the **south-west corner** of the 1° × 1° tile.
//! Tiles are addressed here as `(x, y)` = `(lon, lat)` integer pairs, the
//! same order [`BoundingBox::tile_grid`](crate::BoundingBox::tile_grid) produces.

/// Base name (without extension) of the tile whose south-west corner is `(x, y)`.
///
/// # Examples
///
/// ```
/// use elevtag::filename::tile_name;
///
/// assert_eq!(tile_name((2, 48)), "N48E002");
/// assert_eq!(tile_name((-78, -13)), "S13W078");
/// ```
pub fn tile_name(tile: (i32, i32)) -> String {
    let (x, y) = tile;
    let lat_prefix = if y >= 0 { 'N' } else { 'S' };
    let lon_prefix = if x >= 0 { 'E' } else { 'W' };
    format!("{}{:02}{}{:03}", lat_prefix, y.abs(), lon_prefix, x.abs())
}

/// `.hgt` filename of the tile whose south-west corner is `(x, y)`.
pub fn tile_filename(tile: (i32, i32)) -> String {
    format!("{}.hgt", tile_name(tile))
}

/// Parse a tile filename back into its `(x, y)` south-west corner.
///
/// Accepts a bare name, a `.hgt` or `.hgt.zip` filename, or a full path.
///
/// # Examples
///
/// ```
/// use elevtag::filename::parse_tile_name;
///
/// assert_eq!(parse_tile_name("N48E002.hgt"), Some((2, 48)));
/// assert_eq!(parse_tile_name("/data/srtm_30m/S12W077.hgt.zip"), Some((-77, -12)));
/// assert_eq!(parse_tile_name("dem.tif"), None);
/// ```
pub fn parse_tile_name(filename: &str) -> Option<(i32, i32)> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let name = name.strip_suffix(".zip").unwrap_or(name);
    let name = name.strip_suffix(".hgt").unwrap_or(name);

    if name.len() != 7 || !name.is_ascii() {
        return None;
    }

    let bytes = name.as_bytes();
    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lat: i32 = name[1..3].parse().ok()?;
    let lon: i32 = name[4..7].parse().ok()?;

    Some((lon * lon_sign, lat * lat_sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_names() {
        assert_eq!(tile_filename((138, 35)), "N35E138.hgt");
        assert_eq!(tile_filename((0, 0)), "N00E000.hgt");
        assert_eq!(tile_filename((-1, -1)), "S01W001.hgt");
        assert_eq!(tile_filename((-180, -60)), "S60W180.hgt");
    }

    #[test]
    fn test_tile_filename_hemispheres() {
        assert_eq!(tile_filename((-78, -13)), "S13W078.hgt");
        assert_eq!(tile_filename((2, 48)), "N48E002.hgt");
        assert_eq!(tile_filename((-1, 0)), "N00W001.hgt");
    }

    #[test]
    fn test_parse_round_trip() {
        for tile in [(2, 48), (-122, 47), (-78, -13), (179, -60)] {
            assert_eq!(parse_tile_name(&tile_filename(tile)), Some(tile));
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_tile_name("N35E13.hgt"), None);
        assert_eq!(parse_tile_name("X35E138.hgt"), None);
        assert_eq!(parse_tile_name("N35Q138.hgt"), None);
        assert_eq!(parse_tile_name(""), None);
    }
}
