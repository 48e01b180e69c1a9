use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use super::Settings;
use crate::{input, output};

pub fn run(settings: &Settings, input_dir: &Path, input_file: &Path, output_dir: &Path) -> Result<()> {
    let input_path = input_dir.join(input_file);
    let lines = input::read_lines(&input_path)
        .with_context(|| format!("Failed to read paths from {}", input_path.display()))?;
    tracing::info!(path = %input_path.display(), lines = lines.len(), bbox = %lines.bbox(), "Read input");

    let mut session = settings.session()?;

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let progress = pb.clone();
    let stats = session
        .tag_with_progress(&lines, move |done| progress.set_position(done as u64))
        .context("Failed to tag paths")?;
    pb.finish_and_clear();

    let output_path = output_path(output_dir, input_file);
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    output::write_tsv(&output_path, &stats)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    let undetermined = stats.iter().filter(|s| s.is_undetermined()).count();
    tracing::info!(
        path = %output_path.display(),
        lines = stats.len(),
        undetermined,
        "Wrote output"
    );
    Ok(())
}

/// `<output_dir>/<input name>`, with GeoJSON inputs getting a `.tsv` extension.
fn output_path(output_dir: &Path, input_file: &Path) -> PathBuf {
    let name = input_file
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output.tsv"));
    if input::is_geojson(&name) {
        output_dir.join(name.with_extension("tsv"))
    } else {
        output_dir.join(name)
    }
}
