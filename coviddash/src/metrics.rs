//! The set of cumulative metrics published in the upstream time-series files.

use strum_macros::{Display, EnumString};

use crate::COL;

/// One upstream metric, i.e. one wide-format file per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    /// File name of the wide table in the upstream repository. Also used for
    /// the verbatim raw snapshot on disk.
    pub fn file_name(&self) -> &'static str {
        match self {
            Metric::Confirmed => "time_series_covid19_confirmed_global.csv",
            Metric::Deaths => "time_series_covid19_deaths_global.csv",
            Metric::Recovered => "time_series_covid19_recovered_global.csv",
        }
    }

    /// Column this metric occupies in the long and derived tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Confirmed => COL::CONFIRMED,
            Metric::Deaths => COL::DEATHS,
            Metric::Recovered => COL::RECOVERED,
        }
    }

    /// The metric set for a pipeline run. Recovered counts stopped being
    /// maintained upstream, so they are opt-in.
    pub fn for_run(include_recovered: bool) -> Vec<Metric> {
        let mut metrics = vec![Metric::Confirmed, Metric::Deaths];
        if include_recovered {
            metrics.push(Metric::Recovered);
        }
        metrics
    }
}
