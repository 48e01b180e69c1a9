//! Tab-delimited output, one row per input path.

use anyhow::Result;
use elevtag::ElevationStats;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `start end climb descent` rows in input order. Undetermined paths
/// become empty rows so row numbers keep matching the input.
pub fn write_tsv(path: &Path, stats: &[ElevationStats]) -> Result<()> {
    let file = File::create(path)?;
    write_records(BufWriter::new(file), stats)
}

fn write_records<W: Write>(out: W, stats: &[ElevationStats]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_writer(out);

    for s in stats {
        match s.to_record() {
            Some(values) => writer.write_record(values.iter().map(|v| v.to_string()))?,
            None => {
                // csv would quote an empty record; write the bare terminator
                writer.flush()?;
                writer.get_mut().write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_and_blanks() {
        let stats = [
            ElevationStats {
                start: Some(30.48),
                end: Some(60.96),
                climb: 30.48,
                descent: 0.0,
                sequence_index: 0,
            },
            ElevationStats::undetermined(1),
            ElevationStats::flat(12.5, 2),
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, &stats).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "30.48\t60.96\t30.48\t0\n\n12.5\t12.5\t0\t0\n"
        );
    }
}
