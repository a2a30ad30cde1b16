//! Wide-to-long reshaping and the outer merge of the per-metric tables.

use anyhow::{Context, Result};
use log::debug;
use polars::prelude::*;

use crate::metrics::Metric;
use crate::COL;

/// Identifier columns of the upstream wide tables. Everything else is
/// treated as a date column, so a varying date range needs no handling here.
const ID_COLUMNS: [&str; 4] = [
    COL::RAW_PROVINCE,
    COL::RAW_COUNTRY,
    COL::RAW_LAT,
    COL::RAW_LON,
];

/// Date format of the upstream column headers, e.g. `1/22/20`.
const DATE_FORMAT: &str = "%m/%d/%y";

/// Unpivot one wide table into long observations keyed by
/// (country, province, date).
///
/// Country names are trimmed and stripped of `*` footnote markers here so
/// that every later join and display uses clean keys. Null provinces become
/// the empty string, keeping province usable as a join key.
pub fn melt_wide(wide: DataFrame, metric: Metric) -> Result<DataFrame> {
    let date_cols: Vec<String> = wide
        .get_column_names()
        .into_iter()
        .filter(|name| !ID_COLUMNS.contains(name))
        .map(String::from)
        .collect();
    debug!("Melting {metric} table over {} date columns", date_cols.len());

    let args = UnpivotArgsDSL {
        index: ID_COLUMNS.iter().map(|name| (*name).into()).collect(),
        on: date_cols.iter().map(|name| name.as_str().into()).collect(),
        variable_name: Some(COL::DATE.into()),
        value_name: Some(metric.column_name().into()),
    };

    let long = wide
        .lazy()
        .unpivot(args)
        .rename(
            [COL::RAW_COUNTRY, COL::RAW_PROVINCE],
            [COL::COUNTRY, COL::PROVINCE],
        )
        .with_columns([
            col(COL::DATE).str().to_date(StrptimeOptions {
                format: Some(DATE_FORMAT.into()),
                ..Default::default()
            }),
            col(COL::COUNTRY)
                .str()
                .replace_all(lit(r"\*"), lit(""), false)
                .str()
                .strip_chars(lit(Null {})),
            col(COL::PROVINCE).fill_null(lit("")),
        ])
        .drop([COL::RAW_LAT, COL::RAW_LON])
        .collect()
        .with_context(|| format!("Failed to melt the {metric} wide table"))?;
    Ok(long)
}

/// Outer-join the per-metric long tables on (country, province, date), so a
/// date present in one metric but absent in another still appears, with the
/// absent metric null.
pub fn merge_long(parts: Vec<DataFrame>) -> Result<DataFrame> {
    let mut parts = parts.into_iter();
    let first = parts
        .next()
        .context("At least one long table is required to merge")?;

    let keys = [col(COL::COUNTRY), col(COL::PROVINCE), col(COL::DATE)];
    let mut unified = first.lazy();
    for part in parts {
        let mut args = JoinArgs::new(JoinType::Full);
        args.coalesce = JoinCoalesce::CoalesceColumns;
        unified = unified.join(part.lazy(), keys.clone(), keys.clone(), args);
    }
    Ok(unified.collect()?)
}
