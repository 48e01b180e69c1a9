//! Reading the batch of paths to tag.

use anyhow::{bail, Context, Result};
use elevtag::{Line, MultiLine};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Read a GeoJSON file, or a text file with one `x1,y1,x2,y2,...` path per row.
pub fn read_lines(path: &Path) -> Result<MultiLine> {
    if is_geojson(path) {
        return Ok(elevtag::geojson::lines_from_file(path)?);
    }
    let file = File::open(path).context("Failed to open input file")?;
    read_text_lines(BufReader::new(file))
}

fn read_text_lines<R: Read>(reader: R) -> Result<MultiLine> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut lines = MultiLine::default();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let values = record
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| {
                f.parse::<f64>()
                    .with_context(|| format!("Row {}: invalid number '{}'", row + 1, f))
            })
            .collect::<Result<Vec<_>>>()?;

        if values.is_empty() {
            continue;
        }
        if values.len() % 2 != 0 {
            bail!("Row {}: odd number of coordinates ({})", row + 1, values.len());
        }
        let points: Vec<(f64, f64)> = values.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        lines.push(Line::from_xy(&points)?);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_text_rows() {
        let text = "0.0,48.0,0.5,48.2\n\n1.0, 45.0\n";
        let lines = read_text_lines(text.as_bytes()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.get(0).unwrap().len(), 2);
        assert_eq!(lines.get(1).unwrap().len(), 1);
    }

    #[test]
    fn test_text_errors() {
        assert!(read_text_lines("0.0,48.0,0.5\n".as_bytes()).is_err());
        assert!(read_text_lines("a,b\n".as_bytes()).is_err());
    }

    #[test]
    fn test_geojson_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("routes.geojson");
        std::fs::write(
            &path,
            r#"{"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]}"#,
        )
        .unwrap();
        let lines = read_lines(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.bbox().east, 3.0);
    }
}
