//! Loading and shaping of the persisted tables for the dashboard views.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;

use coviddash::config::Config;
use coviddash::{persist, COL};

/// Process-wide cache of loaded tables keyed by path and modification time.
/// A changed mtime invalidates the whole entry; there is no partial refresh
/// because the pipeline always rewrites the files in full.
pub struct TableCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

struct CacheEntry {
    modified: SystemTime,
    frame: DataFrame,
}

impl TableCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<DataFrame> {
        let modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                debug!("Table cache hit for {}", path.display());
                return Ok(entry.frame.clone());
            }
        }
        let frame = persist::read_processed(path)?;
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                frame: frame.clone(),
            },
        );
        Ok(frame)
    }
}

/// Column-wise view of one daily table (the global table, or one country's
/// slice of the country table). Optional columns stay `None` when the
/// persisted file lacks them; views degrade by omitting the dependent chart
/// or stat instead of erroring.
#[derive(Clone)]
pub struct SeriesTable {
    pub dates: Vec<NaiveDate>,
    pub confirmed: Vec<i64>,
    pub deaths: Vec<i64>,
    pub recovered: Option<Vec<i64>>,
    pub new_confirmed: Option<Vec<i64>>,
    pub new_deaths: Option<Vec<i64>>,
    pub new_confirmed_7dma: Option<Vec<f64>>,
    pub new_deaths_7dma: Option<Vec<f64>>,
    pub cfr: Option<Vec<f64>>,
}

impl SeriesTable {
    pub fn from_frame(frame: &DataFrame) -> Result<Self> {
        let dates = frame
            .column(COL::DATE)?
            .date()?
            .as_date_iter()
            .collect::<Option<Vec<_>>>()
            .context("Date column contains nulls")?;
        Ok(Self {
            dates,
            confirmed: required_ints(frame, COL::CONFIRMED)?,
            deaths: required_ints(frame, COL::DEATHS)?,
            recovered: optional_ints(frame, COL::RECOVERED)?,
            new_confirmed: optional_ints(frame, COL::NEW_CONFIRMED)?,
            new_deaths: optional_ints(frame, COL::NEW_DEATHS)?,
            new_confirmed_7dma: optional_floats(frame, COL::NEW_CONFIRMED_7DMA)?,
            new_deaths_7dma: optional_floats(frame, COL::NEW_DEATHS_7DMA)?,
            cfr: optional_floats(frame, COL::CFR)?,
        })
    }

    /// Index of the most recent observation.
    pub fn latest(&self) -> Option<usize> {
        self.dates.len().checked_sub(1)
    }
}

fn required_ints(frame: &DataFrame, name: &str) -> Result<Vec<i64>> {
    Ok(frame
        .column(name)?
        .i64()?
        .into_iter()
        .map(|value| value.unwrap_or(0))
        .collect())
}

fn optional_ints(frame: &DataFrame, name: &str) -> Result<Option<Vec<i64>>> {
    match frame.column(name) {
        Ok(series) => Ok(Some(
            series
                .i64()?
                .into_iter()
                .map(|value| value.unwrap_or(0))
                .collect(),
        )),
        Err(_) => Ok(None),
    }
}

fn optional_floats(frame: &DataFrame, name: &str) -> Result<Option<Vec<f64>>> {
    match frame.column(name) {
        Ok(series) => Ok(Some(
            series
                .f64()?
                .into_iter()
                .map(|value| value.unwrap_or(0.0))
                .collect(),
        )),
        Err(_) => Ok(None),
    }
}

/// Everything the dashboard needs in memory.
pub struct DashboardData {
    pub countries: Vec<String>,
    pub country_frame: DataFrame,
    pub global: SeriesTable,
}

pub fn load(cache: &mut TableCache, config: &Config) -> Result<DashboardData> {
    let processed = config.processed_dir();
    let country_frame = cache.load(&processed.join(persist::paths::COUNTRY_DAILY))?;
    let global_frame = cache.load(&processed.join(persist::paths::GLOBAL_DAILY))?;
    let countries = country_names(&country_frame)?;
    Ok(DashboardData {
        countries,
        country_frame,
        global: SeriesTable::from_frame(&global_frame)?,
    })
}

/// The distinct country set, sorted for stable display.
pub fn country_names(frame: &DataFrame) -> Result<Vec<String>> {
    let mut names: Vec<String> = frame
        .column(COL::COUNTRY)?
        .unique()?
        .str()?
        .into_no_null_iter()
        .map(str::to_string)
        .collect();
    names.sort();
    Ok(names)
}

/// One country's slice of the country table, ordered by date.
pub fn country_series(frame: &DataFrame, name: &str) -> Result<SeriesTable> {
    let filtered = frame
        .clone()
        .lazy()
        .filter(col(COL::COUNTRY).eq(lit(name.to_string())))
        .sort([COL::DATE], SortMultipleOptions::default())
        .collect()?;
    SeriesTable::from_frame(&filtered)
}

/// The latest-date per-country slice, ranked by cumulative confirmed. This
/// carries the data the original choropleth map displayed.
pub struct CountryLatest {
    pub name: String,
    pub confirmed: i64,
}

pub fn latest_by_country(frame: &DataFrame, top: usize) -> Result<(NaiveDate, Vec<CountryLatest>)> {
    let latest = frame
        .clone()
        .lazy()
        .filter(col(COL::DATE).eq(col(COL::DATE).max()))
        .sort(
            [COL::CONFIRMED],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(top as IdxSize)
        .collect()?;
    let date = latest
        .column(COL::DATE)?
        .date()?
        .as_date_iter()
        .next()
        .flatten()
        .context("Country table has no rows")?;
    let rows = latest
        .column(COL::COUNTRY)?
        .str()?
        .into_no_null_iter()
        .zip(latest.column(COL::CONFIRMED)?.i64()?.into_no_null_iter())
        .map(|(name, confirmed)| CountryLatest {
            name: name.to_string(),
            confirmed,
        })
        .collect();
    Ok((date, rows))
}

#[cfg(test)]
mod tests {
    use coviddash::aggregate::{country_daily, global_daily};
    use coviddash::persist::paths;

    use super::*;

    fn write_fixture(dir: &Path) -> Config {
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
        let mut country = country_daily(unified).unwrap();
        let mut global = global_daily(country.clone()).unwrap();
        let config = Config {
            base_url: "http://unused".into(),
            data_dir: dir.to_string_lossy().to_string(),
        };
        let processed = config.processed_dir();
        persist::write_processed(&processed, paths::COUNTRY_DAILY, &mut country).unwrap();
        persist::write_processed(&processed, paths::GLOBAL_DAILY, &mut global).unwrap();
        config
    }

    #[test]
    fn load_builds_sorted_country_set_and_global_series() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        let mut cache = TableCache::new();
        let data = load(&mut cache, &config).unwrap();

        assert_eq!(data.countries, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(data.global.dates.len(), 3);
        assert!(
            data.global.new_confirmed_7dma.is_some(),
            "The derived columns were persisted, so they should be present"
        );
        assert!(
            data.global.recovered.is_none(),
            "No recovered column was persisted, so the view degrades"
        );
    }

    #[test]
    fn repeated_loads_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        let mut cache = TableCache::new();
        let path = config.processed_dir().join(paths::COUNTRY_DAILY);
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert_eq!(first.shape(), second.shape());
    }

    #[test]
    fn country_series_filters_and_orders_one_country() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        let mut cache = TableCache::new();
        let data = load(&mut cache, &config).unwrap();

        let series = country_series(&data.country_frame, "A").unwrap();
        assert_eq!(series.confirmed, vec![10, 15, 12]);
        assert_eq!(
            series.new_confirmed.as_deref(),
            Some([10i64, 5, 0].as_slice()),
            "The revision on day 3 is clamped"
        );
        assert!(series.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn latest_by_country_ranks_by_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        let mut cache = TableCache::new();
        let data = load(&mut cache, &config).unwrap();

        let (date, rows) = latest_by_country(&data.country_frame, 10).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        assert_eq!(rows[0].name, "B", "B has 20 confirmed on the latest date");
        assert_eq!(rows[0].confirmed, 20);
        assert_eq!(rows[1].name, "A");
    }

    #[test]
    fn series_table_tolerates_missing_optional_columns() {
        let frame = df!(
            COL::DATE => &["2020-01-01", "2020-01-02"],
            COL::CONFIRMED => &[1i64, 2],
            COL::DEATHS => &[0i64, 0],
        )
        .unwrap()
        .lazy()
        .with_column(
            col(COL::DATE).str().to_date(StrptimeOptions {
                format: Some("%Y-%m-%d".into()),
                ..Default::default()
            }),
        )
        .collect()
        .unwrap();

        let series = SeriesTable::from_frame(&frame).unwrap();
        assert!(series.cfr.is_none());
        assert!(series.new_confirmed_7dma.is_none());
        assert_eq!(series.confirmed, vec![1, 2]);
    }
}
