use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series".into(),
            data_dir: "data".into(),
        }
    }
}

impl Config {
    /// Directory for verbatim snapshots of the upstream wide tables.
    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("raw")
    }

    /// Directory for the derived country-daily and global-daily tables.
    pub fn processed_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("processed")
    }
}
