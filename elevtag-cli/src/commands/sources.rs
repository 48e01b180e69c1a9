use anyhow::Result;
use elevtag::{LookupMethod, SourceDescriptor};
use std::fs;
use std::path::Path;

use super::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let session = settings.session()?;
    let catalog = session.catalog();

    match session.config().resolved_catalog_path() {
        Some(path) => println!("Catalog: {}", path.display()),
        None => println!("Catalog: none (SRTM fallback only)"),
    }
    println!();
    println!(
        "{:<24} {:<10} {:<14} {:<6} {:>40}",
        "Name", "Method", "Lookup", "Units", "Coverage"
    );
    println!("{}", "-".repeat(98));

    let fallback = catalog.fallback();
    let rows = catalog
        .sources()
        .iter()
        .map(|s| (s, false))
        .chain(std::iter::once((fallback, true)));

    let mut total_files = 0usize;
    let mut total_size = 0u64;
    for (source, is_fallback) in rows {
        let name = if is_fallback {
            format!("{} (fallback)", source.name)
        } else {
            source.name.clone()
        };
        println!(
            "{:<24} {:<10} {:<14} {:<6} {:>40}",
            name,
            source.download_method.as_str(),
            lookup_label(source),
            units_label(source),
            source.coverage.to_string()
        );

        let dir = session.cache().source_dir(source);
        for (file, size) in cached_files(&dir)? {
            println!("    {:<40} {:>12}", file, format_size(size));
            total_files += 1;
            total_size += size;
        }
    }

    println!();
    println!("Summary:");
    println!("  Sources: {} + fallback", catalog.len());
    println!("  Cached files: {}", total_files);
    println!("  Total size: {}", format_size(total_size));
    println!("  Data directory: {}", session.data_dir().display());

    Ok(())
}

fn lookup_label(source: &SourceDescriptor) -> String {
    match source.lookup_method {
        LookupMethod::Raster => format!("raster {}", source.lookup_field),
        LookupMethod::ContourLines => format!("contour {}", source.lookup_field),
    }
}

fn units_label(source: &SourceDescriptor) -> &'static str {
    match source.source_units {
        elevtag::Units::Meters => "m",
        elevtag::Units::Feet => "ft",
    }
}

/// Regular files in `dir`, sorted by name. A missing directory has none.
fn cached_files(dir: &Path) -> Result<Vec<(String, u64)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), metadata.len()));
        }
    }
    files.sort();
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cached_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.tif"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("a.geojson"), [0u8; 3]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = cached_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![("a.geojson".to_string(), 3), ("b.tif".to_string(), 10)]
        );
        assert!(cached_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(25 * 1024 * 1024), "25.00 MB");
    }
}
