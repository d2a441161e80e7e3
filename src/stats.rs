//! Optional processing statistics, persisted as a single-row CSV.

use std::io::Write;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub objects_parsed: u64,
    pub streams_decoded: u64,
    pub xref_sections: u64,
    pub rebuilt_xref: bool,
    pub objects_written: u64,
    pub bytes_written: u64,
}

const HEADER: &str = "objects_parsed;streams_decoded;xref_sections;rebuilt_xref;objects_written;bytes_written";

impl Stats {
    pub fn csv_row(&self) -> String {
        format!(
            "{};{};{};{};{};{}",
            self.objects_parsed,
            self.streams_decoded,
            self.xref_sections,
            self.rebuilt_xref,
            self.objects_written,
            self.bytes_written
        )
    }
}

/// Append one row, writing the header first when the file is new.
pub fn write_csv<P: AsRef<Path>>(path: P, stats: &Stats) -> Result<()> {
    let path = path.as_ref();
    let new_file = !path.exists();
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    if new_file {
        writeln!(file, "{HEADER}")?;
    }
    writeln!(file, "{}", stats.csv_row())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_appends_with_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let stats = Stats {
            objects_parsed: 12,
            streams_decoded: 3,
            xref_sections: 1,
            rebuilt_xref: false,
            objects_written: 10,
            bytes_written: 4096,
        };
        write_csv(&path, &stats).unwrap();
        write_csv(&path, &stats).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "12;3;1;false;10;4096");
        assert_eq!(lines[1], lines[2]);
    }
}
