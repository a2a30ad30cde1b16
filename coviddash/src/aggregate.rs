//! Country-level and global aggregation of the unified long table.
//!
//! Everything here is a pure frame-to-frame reduction: sum provinces into
//! countries, derive daily deltas and trailing means per country, then sum
//! countries into the global table.

use anyhow::Result;
use polars::prelude::*;
use polars::series::ops::NullBehavior;

use crate::COL;

/// Trailing window for the moving averages.
const ROLLING_WINDOW: usize = 7;

fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.get_column_names().contains(&name)
}

/// Expression for the case-fatality ratio with the divide-by-zero guard:
/// zero wherever confirmed is zero.
fn cfr_expr() -> Expr {
    when(col(COL::CONFIRMED).gt(lit(0)))
        .then(col(COL::DEATHS).cast(DataType::Float64) / col(COL::CONFIRMED).cast(DataType::Float64))
        .otherwise(lit(0.0))
        .alias(COL::CFR)
}

/// Build the country-daily table from the unified long rows.
///
/// Null metrics are treated as zero before summing. Day-over-day deltas are
/// zero at a series start and clamped to zero when a cumulative series
/// decreases (source data revisions); the cumulative columns themselves are
/// passed through untouched.
pub fn country_daily(unified: DataFrame) -> Result<DataFrame> {
    let metric_cols: Vec<&str> = [COL::CONFIRMED, COL::DEATHS, COL::RECOVERED]
        .into_iter()
        .filter(|name| has_column(&unified, name))
        .collect();

    let mut lf = unified
        .lazy()
        .with_columns(
            metric_cols
                .iter()
                .map(|&name| col(name).fill_null(lit(0)).cast(DataType::Int64))
                .collect::<Vec<_>>(),
        )
        .group_by([col(COL::COUNTRY), col(COL::DATE)])
        .agg(
            metric_cols
                .iter()
                .map(|&name| col(name).sum())
                .collect::<Vec<_>>(),
        )
        .sort([COL::COUNTRY, COL::DATE], SortMultipleOptions::default());

    for (cumulative, new, rolling) in [
        (COL::CONFIRMED, COL::NEW_CONFIRMED, COL::NEW_CONFIRMED_7DMA),
        (COL::DEATHS, COL::NEW_DEATHS, COL::NEW_DEATHS_7DMA),
    ] {
        if !metric_cols.contains(&cumulative) {
            continue;
        }
        lf = lf
            .with_column(
                col(cumulative)
                    .diff(1, NullBehavior::Ignore)
                    .over([col(COL::COUNTRY)])
                    .fill_null(lit(0))
                    .alias(new),
            )
            .with_column(
                when(col(new).lt(lit(0)))
                    .then(lit(0))
                    .otherwise(col(new))
                    .cast(DataType::Int64)
                    .alias(new),
            )
            .with_column(
                col(new)
                    .rolling_mean(RollingOptionsFixedWindow {
                        window_size: ROLLING_WINDOW,
                        min_periods: 1,
                        ..Default::default()
                    })
                    .over([col(COL::COUNTRY)])
                    .alias(rolling),
            );
    }

    if metric_cols.contains(&COL::CONFIRMED) && metric_cols.contains(&COL::DEATHS) {
        lf = lf.with_column(cfr_expr());
    }

    Ok(lf.collect()?)
}

/// Reduce the country-daily table by date into the global table. Every
/// numeric column is summed across countries; the cfr is then recomputed
/// from the summed totals rather than averaging per-country ratios.
pub fn global_daily(country_daily: DataFrame) -> Result<DataFrame> {
    let has_cfr_inputs =
        has_column(&country_daily, COL::CONFIRMED) && has_column(&country_daily, COL::DEATHS);

    let mut lf = country_daily
        .lazy()
        .group_by([col(COL::DATE)])
        .agg([col("*").exclude([COL::COUNTRY, COL::DATE]).sum()])
        .sort([COL::DATE], SortMultipleOptions::default());

    if has_cfr_inputs {
        lf = lf.with_column(cfr_expr());
    }

    Ok(lf.collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(frame: &DataFrame, name: &str) -> Vec<i64> {
        frame
            .column(name)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn floats(frame: &DataFrame, name: &str) -> Vec<f64> {
        frame
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn single_country_unified() -> DataFrame {
        df!(
            COL::COUNTRY => &["A", "A", "A", "A"],
            COL::PROVINCE => &["", "", "", ""],
            COL::DATE => &["2020-01-01", "2020-01-02", "2020-01-03", "2020-01-04"],
            COL::CONFIRMED => &[10i64, 15, 12, 20],
            COL::DEATHS => &[0i64, 1, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn negative_deltas_are_clamped_to_zero() {
        let daily = country_daily(single_country_unified()).unwrap();
        assert_eq!(
            ints(&daily, COL::NEW_CONFIRMED),
            vec![10, 5, 0, 8],
            "The -3 revision must be clamped to 0, and the series start is the first value"
        );
    }

    #[test]
    fn cumulative_columns_are_passed_through_unclipped() {
        let daily = country_daily(single_country_unified()).unwrap();
        assert_eq!(
            ints(&daily, COL::CONFIRMED),
            vec![10, 15, 12, 20],
            "Revisions are absorbed in new_*, never corrected in the cumulative fields"
        );
    }

    #[test]
    fn rolling_mean_uses_only_available_observations() {
        let daily = country_daily(single_country_unified()).unwrap();
        let dma = floats(&daily, COL::NEW_CONFIRMED_7DMA);
        let expected = [10.0, 7.5, 5.0, 5.75];
        for (got, want) in dma.iter().zip(expected.iter()) {
            assert!(
                (got - want).abs() < 1e-12,
                "Trailing mean with fewer than 7 observations averages what is available: got {got}, want {want}"
            );
        }
    }

    #[test]
    fn provinces_sum_into_their_country() {
        let unified = df!(
            COL::COUNTRY => &["A", "A"],
            COL::PROVINCE => &["p1", "p2"],
            COL::DATE => &["2020-01-01", "2020-01-01"],
            COL::CONFIRMED => &[5i64, 10],
            COL::DEATHS => &[1i64, 0],
        )
        .unwrap();
        let daily = country_daily(unified).unwrap();
        assert_eq!(daily.height(), 1, "One row per (country, date)");
        assert_eq!(ints(&daily, COL::CONFIRMED), vec![15]);
        assert_eq!(ints(&daily, COL::DEATHS), vec![1]);
    }

    #[test]
    fn null_metrics_count_as_zero() {
        let unified = df!(
            COL::COUNTRY => &["A", "A"],
            COL::PROVINCE => &["", ""],
            COL::DATE => &["2020-01-01", "2020-01-02"],
            COL::CONFIRMED => &[Some(5i64), Some(8)],
            COL::DEATHS => &[None::<i64>, Some(1)],
        )
        .unwrap();
        let daily = country_daily(unified).unwrap();
        assert_eq!(
            ints(&daily, COL::DEATHS),
            vec![0, 1],
            "A metric missing for a key is zero, not null"
        );
    }

    #[test]
    fn cfr_is_exact_ratio_with_zero_guard() {
        let unified = df!(
            COL::COUNTRY => &["A", "A"],
            COL::PROVINCE => &["", ""],
            COL::DATE => &["2020-01-01", "2020-01-02"],
            COL::CONFIRMED => &[0i64, 200],
            COL::DEATHS => &[0i64, 10],
        )
        .unwrap();
        let daily = country_daily(unified).unwrap();
        let cfr = floats(&daily, COL::CFR);
        assert_eq!(cfr[0], 0.0, "cfr is exactly 0 when confirmed is 0");
        assert_eq!(cfr[1], 10.0 / 200.0, "cfr is exactly deaths/confirmed otherwise");
    }

    #[test]
    fn global_sums_countries_per_date() {
        let unified = df!(
            COL::COUNTRY => &["A", "A", "B", "B"],
            COL::PROVINCE => &["p1", "p2", "p1", "p2"],
            COL::DATE => &["2020-01-01"; 4],
            COL::CONFIRMED => &[5i64, 10, 3, 7],
            COL::DEATHS => &[0i64, 0, 0, 0],
        )
        .unwrap();
        let daily = country_daily(unified).unwrap();
        let global = global_daily(daily.clone()).unwrap();

        assert_eq!(global.height(), 1, "Dates are globally unique");
        assert_eq!(
            ints(&global, COL::CONFIRMED),
            vec![25],
            "Global confirmed is the reduction over all countries for the date"
        );
        let per_country: i64 = ints(&daily, COL::CONFIRMED).iter().sum();
        assert_eq!(
            per_country, 25,
            "Summing country_daily over countries must match global_daily"
        );
    }

    #[test]
    fn global_cfr_is_recomputed_from_totals() {
        let unified = df!(
            COL::COUNTRY => &["A", "B"],
            COL::PROVINCE => &["", ""],
            COL::DATE => &["2020-01-01", "2020-01-01"],
            COL::CONFIRMED => &[100i64, 300],
            COL::DEATHS => &[10i64, 0],
        )
        .unwrap();
        let global = global_daily(country_daily(unified).unwrap()).unwrap();
        let cfr = floats(&global, COL::CFR);
        assert_eq!(
            cfr,
            vec![10.0 / 400.0],
            "Global cfr is summed deaths over summed confirmed, not the mean of per-country ratios"
        );
    }

    #[test]
    fn missing_recovered_column_still_yields_derived_columns() {
        let daily = country_daily(single_country_unified()).unwrap();
        let names = daily.get_column_names();
        assert!(!names.contains(&COL::RECOVERED));
        assert!(names.contains(&COL::NEW_CONFIRMED));
        assert!(names.contains(&COL::NEW_DEATHS));
        assert!(names.contains(&COL::NEW_CONFIRMED_7DMA));
        assert!(names.contains(&COL::CFR));
    }

    #[test]
    fn new_columns_are_always_non_negative() {
        // A pathological series with repeated downward revisions.
        let unified = df!(
            COL::COUNTRY => &["A"; 6],
            COL::PROVINCE => &[""; 6],
            COL::DATE => &[
                "2020-01-01", "2020-01-02", "2020-01-03",
                "2020-01-04", "2020-01-05", "2020-01-06",
            ],
            COL::CONFIRMED => &[10i64, 8, 12, 4, 4, 30],
            COL::DEATHS => &[3i64, 1, 1, 0, 2, 1],
        )
        .unwrap();
        let daily = country_daily(unified).unwrap();
        assert!(ints(&daily, COL::NEW_CONFIRMED).iter().all(|v| *v >= 0));
        assert!(ints(&daily, COL::NEW_DEATHS).iter().all(|v| *v >= 0));
    }
}
