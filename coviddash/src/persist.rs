//! Reading and writing the two processed tables.
//!
//! Output is plain CSV with a header row and ISO dates, written to fixed
//! well-known paths and overwritten unconditionally on every run.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use polars::prelude::*;

/// This module contains the names of the processed output files.
pub mod paths {
    pub const COUNTRY_DAILY: &str = "country_daily.csv";
    pub const GLOBAL_DAILY: &str = "global_daily.csv";
}

/// Write one processed table under `dir`, creating the directory if needed
/// and overwriting any previous output. Returns the full path written.
pub fn write_processed(dir: &Path, file_name: &str, frame: &mut DataFrame) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create processed directory {}", dir.display()))?;
    let path = dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(frame)
        .with_context(|| format!("Failed to write processed table to {}", path.display()))?;
    info!("Wrote {} rows to {}", frame.height(), path.display());
    Ok(path)
}

/// Read a processed table back, parsing the date column.
pub fn read_processed(path: &Path) -> Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open processed table {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to read processed table {}", path.display()))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use crate::aggregate::{country_daily, global_daily};
    use crate::COL;

    use super::*;

    fn processed_fixture() -> DataFrame {
        let unified = df!(
            COL::COUNTRY => &["A", "A", "A", "B", "B", "B"],
            COL::PROVINCE => &[""; 6],
            COL::DATE => &[
                "2020-01-01", "2020-01-02", "2020-01-03",
                "2020-01-01", "2020-01-02", "2020-01-03",
            ],
            COL::CONFIRMED => &[10i64, 15, 12, 3, 7, 20],
            COL::DEATHS => &[0i64, 1, 1, 0, 0, 2],
        )
        .unwrap();
        country_daily(unified).unwrap()
    }

    #[test]
    fn round_trip_preserves_numeric_columns_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let mut written = processed_fixture();
        let path = write_processed(dir.path(), paths::COUNTRY_DAILY, &mut written).unwrap();
        let read = read_processed(&path).unwrap();

        for name in [
            COL::CONFIRMED,
            COL::DEATHS,
            COL::NEW_CONFIRMED,
            COL::NEW_DEATHS,
        ] {
            assert!(
                written
                    .column(name)
                    .unwrap()
                    .equals(read.column(name).unwrap()),
                "Column {name} must survive the CSV round trip unchanged"
            );
        }
        for name in [COL::NEW_CONFIRMED_7DMA, COL::NEW_DEATHS_7DMA, COL::CFR] {
            let before: Vec<f64> = written
                .column(name)
                .unwrap()
                .f64()
                .unwrap()
                .into_no_null_iter()
                .collect();
            let after: Vec<f64> = read
                .column(name)
                .unwrap()
                .f64()
                .unwrap()
                .into_no_null_iter()
                .collect();
            assert_eq!(before, after, "Column {name} must round-trip losslessly");
        }
    }

    #[test]
    fn write_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = processed_fixture();
        write_processed(dir.path(), paths::GLOBAL_DAILY, &mut first).unwrap();

        let mut second = global_daily(processed_fixture()).unwrap();
        let path = write_processed(dir.path(), paths::GLOBAL_DAILY, &mut second).unwrap();

        let read = read_processed(&path).unwrap();
        assert_eq!(
            read.height(),
            second.height(),
            "The second write must fully replace the first"
        );
        assert!(
            !read.get_column_names().contains(&COL::COUNTRY),
            "The global table carries no country key"
        );
    }
}
