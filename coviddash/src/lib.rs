use std::path::PathBuf;

use log::{debug, info};
use polars::frame::DataFrame;

use crate::config::Config;
use crate::error::CoviddashError;
use crate::metrics::Metric;

// Re-exports
pub use column_names as COL;

// Modules
pub mod aggregate;
pub mod column_names;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod persist;
pub mod reshape;

/// The two derived tables of a completed run, plus where they were written.
pub struct ProcessedTables {
    pub country_daily: DataFrame,
    pub global_daily: DataFrame,
    pub country_daily_path: PathBuf,
    pub global_daily_path: PathBuf,
}

/// Type for coviddash data and API
pub struct Coviddash {
    pub config: Config,
}

impl Coviddash {
    /// Setup the Coviddash object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the Coviddash object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Run the whole batch pipeline: download the wide tables, reshape them
    /// into long form, aggregate to country and global level, and overwrite
    /// the processed outputs. Any failure aborts the run.
    pub async fn fetch_and_process(
        &self,
        include_recovered: bool,
    ) -> Result<ProcessedTables, CoviddashError> {
        let metrics = Metric::for_run(include_recovered);
        info!("Fetching metrics: {metrics:?}");

        let raw_tables = fetch::fetch_wide_tables(&self.config, &metrics).await?;

        let mut long_parts = Vec::with_capacity(raw_tables.len());
        for table in raw_tables {
            long_parts.push(reshape::melt_wide(table.frame, table.metric)?);
        }
        let unified = reshape::merge_long(long_parts)?;
        debug!("Unified long table shape: {:?}", unified.shape());

        let mut country_daily = aggregate::country_daily(unified)?;
        let mut global_daily = aggregate::global_daily(country_daily.clone())?;

        let processed_dir = self.config.processed_dir();
        let country_daily_path = persist::write_processed(
            &processed_dir,
            persist::paths::COUNTRY_DAILY,
            &mut country_daily,
        )?;
        let global_daily_path = persist::write_processed(
            &processed_dir,
            persist::paths::GLOBAL_DAILY,
            &mut global_daily,
        )?;

        Ok(ProcessedTables {
            country_daily,
            global_daily,
            country_daily_path,
            global_daily_path,
        })
    }
}

impl Default for Coviddash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    const CONFIRMED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Albania,41.1533,20.1683,0,5,3
,Andorra,42.5063,1.5218,2,3,10
";
    const DEATHS_CSV: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
,Albania,41.1533,20.1683,0,1,1
,Andorra,42.5063,1.5218,0,0,2
";

    async fn mock_upstream(server: &MockServer) {
        for (metric, body) in [
            (Metric::Confirmed, CONFIRMED_CSV),
            (Metric::Deaths, DEATHS_CSV),
        ] {
            server
                .mock_async(move |when, then| {
                    when.method(GET).path(format!("/{}", metric.file_name()));
                    then.status(200).body(body);
                })
                .await;
        }
    }

    #[tokio::test]
    async fn full_pipeline_writes_both_processed_tables() {
        let server = MockServer::start_async().await;
        mock_upstream(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let coviddash = Coviddash::new_with_config(Config {
            base_url: server.base_url(),
            data_dir: dir.path().to_string_lossy().to_string(),
        });
        let tables = coviddash
            .fetch_and_process(false)
            .await
            .expect("the pipeline should complete");

        assert!(tables.country_daily_path.exists());
        assert!(tables.global_daily_path.exists());
        assert_eq!(
            tables.country_daily.height(),
            6,
            "Two countries over three dates"
        );
        assert_eq!(tables.global_daily.height(), 3, "One global row per date");

        // The Albania revision on 1/24 (5 -> 3) must be clamped in new_confirmed.
        let new_confirmed: Vec<i64> = tables
            .country_daily
            .column(COL::NEW_CONFIRMED)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(new_confirmed.iter().all(|v| *v >= 0));

        let reread = persist::read_processed(&tables.global_daily_path).unwrap();
        assert_eq!(
            reread.height(),
            tables.global_daily.height(),
            "Persisted global table should read back row-for-row"
        );
    }
}
