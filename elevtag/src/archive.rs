//! ZIP extraction for tile archives.
//!
//! Tile servers publish SRTM tiles as `N48E002.hgt.zip`, and users often
//! drop those archives straight into the data directory; both paths end up
//! here.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::error::{ElevationError, Result};

/// Extensions recognised as the payload inside an archive.
const PAYLOAD_EXTENSIONS: [&str; 4] = [".hgt", ".tif", ".tiff", ".geojson"];

fn is_payload(name: &str) -> bool {
    let lower = name.to_lowercase();
    PAYLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Return the first payload entry of a ZIP archive held in memory.
pub fn extract_from_zip_bytes(data: &[u8], label: &str) -> Result<Vec<u8>> {
    extract_first_payload(Cursor::new(data), label)
}

/// Extract the first payload entry of `archive_path` into `out_path`.
pub fn extract_zip_file(archive_path: &Path, out_path: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let contents = extract_first_payload(file, &archive_path.display().to_string())?;
    std::fs::write(out_path, contents)?;
    tracing::debug!(
        archive = %archive_path.display(),
        out = %out_path.display(),
        "Extracted archive"
    );
    Ok(())
}

fn extract_first_payload<R: Read + Seek>(reader: R, label: &str) -> Result<Vec<u8>> {
    let invalid = |reason: String| ElevationError::DownloadFailed {
        url: label.to_string(),
        reason,
    };

    let mut archive =
        ZipArchive::new(reader).map_err(|e| invalid(format!("Failed to read ZIP archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| invalid(format!("Failed to read ZIP entry: {}", e)))?;

        if is_payload(entry.name()) {
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| invalid(format!("Failed to extract {}: {}", entry.name(), e)))?;
            return Ok(contents);
        }
    }

    Err(invalid("No elevation file found in ZIP archive".to_string()))
}
