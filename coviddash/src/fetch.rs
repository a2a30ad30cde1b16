//! Retrieval of the upstream wide-format tables.
//!
//! One HTTP request per metric, no retries: a transport failure or non-2xx
//! status aborts the whole run. Each fetched body is snapshotted verbatim
//! under the raw-data directory before it is parsed.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use polars::prelude::*;
use reqwest::Client;

use crate::config::Config;
use crate::metrics::Metric;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A wide table as retrieved, one row per (province, country), one column
/// per calendar date.
pub struct RawTable {
    pub metric: Metric,
    pub frame: DataFrame,
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Download one CSV body, treating any non-2xx status as fatal.
async fn download_csv(client: &Client, url: &str) -> Result<String> {
    info!("Downloading {url}");
    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("Request to {url} returned an error status"))?
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {url}"))?;
    Ok(body)
}

fn parse_wide_csv(body: &str) -> Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(body.as_bytes()))
        .finish()
        .context("Failed to parse wide CSV table")?;
    Ok(frame)
}

/// Fetch the wide table for every requested metric, in order, snapshotting
/// each body to `{data_dir}/raw/` before parsing it.
pub async fn fetch_wide_tables(config: &Config, metrics: &[Metric]) -> Result<Vec<RawTable>> {
    let client = build_client()?;
    let raw_dir = config.raw_dir();
    std::fs::create_dir_all(&raw_dir)
        .with_context(|| format!("Failed to create raw data directory {}", raw_dir.display()))?;

    let mut tables = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let url = format!("{}/{}", config.base_url, metric.file_name());
        let body = download_csv(&client, &url).await?;

        let snapshot_path = raw_dir.join(metric.file_name());
        std::fs::write(&snapshot_path, &body).with_context(|| {
            format!("Failed to write raw snapshot to {}", snapshot_path.display())
        })?;
        debug!("Wrote raw {metric} table to {}", snapshot_path.display());

        let frame = parse_wide_csv(&body)?;
        debug!("Parsed {metric} table with shape {:?}", frame.shape());
        tables.push(RawTable {
            metric: *metric,
            frame,
        });
    }
    Ok(tables)
}
