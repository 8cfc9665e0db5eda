use crate::download::{Credentials, RetryPolicy};
use crate::error::FetchError;
use crate::geo::BoundingBox;
use crate::search::SearchWindow;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USERNAME_VAR: &str = "CDSE_USERNAME";
pub const PASSWORD_VAR: &str = "CDSE_PASSWORD";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Job {
    pub search: SearchSettings,
    pub download: DownloadSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SearchSettings {
    /// First acquisition day, `YYYY-MM-DD`.
    pub start: String,
    /// End of the search window (exclusive), `YYYY-MM-DD`.
    pub end: String,
    /// `[lon, lat]` or `[lon_min, lat_min, lon_max, lat_max]`.
    pub coordinates: Vec<f64>,
    #[serde(default)]
    pub product_type: String,
    pub collection: Option<String>,
    pub page_size: Option<u32>,
    #[serde(default = "default_true")]
    pub deduplicate: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_retry_delay_secs() -> u64 {
    RetryPolicy::default().delay.as_secs()
}

impl Job {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let job: Self = toml::from_str(&content)?;
        Ok(job)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let job: Self = toml::from_str(&table.to_string())?;
        Ok(job)
    }

    pub fn window(&self) -> Result<SearchWindow, FetchError> {
        SearchWindow::parse(&self.search.start, &self.search.end)
    }

    pub fn bbox(&self) -> Result<BoundingBox, FetchError> {
        BoundingBox::from_coordinates(&self.search.coordinates)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, FetchError> {
        if self.download.max_attempts == 0 {
            return Err(FetchError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.download.max_attempts,
            delay: Duration::from_secs(self.download.retry_delay_secs),
        })
    }
}

pub fn credentials_from_env() -> Result<Credentials> {
    let username =
        env::var(USERNAME_VAR).map_err(|_| anyhow!("{USERNAME_VAR} is not set"))?;
    let password =
        env::var(PASSWORD_VAR).map_err(|_| anyhow!("{PASSWORD_VAR} is not set"))?;
    Ok(Credentials::new(&username, &password))
}

/// Sentinel-3 OLCI full resolution scenes over Baía de Sepetiba, April 2021.
const JOB_TEMPLATE: &str = r#"
[search]
start = "2021-04-01"
end = "2021-05-01"
coordinates = [-44.06262124827551, -23.108686697869885, -43.59295572093176, -22.89505336946246]
product_type = "OL_1_EFR___"
collection = "SENTINEL-3"

[download]
output_dir = "./outputs/sentinel3"
"#;

pub fn job_template() -> toml::Table {
    JOB_TEMPLATE
        .parse()
        .expect("Job template should always parse")
}
