//! Configuration types for fanout-dl

use crate::error::{Error, Result};
use crate::pipeline::AdmissionScope;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Generic pipeline sizing
///
/// Worker count and admission capacity are separate knobs. When they are
/// equal the semaphore adds nothing, so `admission_capacity` is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of worker tasks (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Admission semaphore capacity (None = no admission control)
    #[serde(default)]
    pub admission_capacity: Option<usize>,

    /// Whether slots are held per item or per worker (default: per item)
    #[serde(default)]
    pub admission_scope: AdmissionScope,

    /// Merge stream capacity (default: 1)
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            admission_capacity: None,
            admission_scope: AdmissionScope::default(),
            output_capacity: default_output_capacity(),
        }
    }
}

impl PipelineConfig {
    /// Check the settings for values that would stall a run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers", "must be at least 1"));
        }
        if self.admission_capacity == Some(0) {
            return Err(Error::config(
                "admission_capacity",
                "must be at least 1 when set",
            ));
        }
        if self.output_capacity == 0 {
            return Err(Error::config("output_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// Settings for the photo downloader workload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Base URL of the JSON API; requests go to `{base_url}/photos/{n}`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of records to request (default: 5000)
    #[serde(default = "default_total_items")]
    pub total_items: usize,

    /// Admission capacity: requests in flight at once (default: 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Worker count (None = same as `concurrency`)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Whether admission slots are held per request or per worker
    #[serde(default)]
    pub admission_scope: AdmissionScope,

    /// Per-request deadline in milliseconds (default: 10000)
    #[serde(default = "default_request_timeout", with = "millis_serde")]
    pub request_timeout: Duration,

    /// Telemetry sampling period in milliseconds (default: 1000)
    #[serde(default = "default_telemetry_interval", with = "millis_serde")]
    pub telemetry_interval: Duration,

    /// Append-only telemetry log (default: "logs.txt")
    #[serde(default = "default_telemetry_log")]
    pub telemetry_log: PathBuf,

    /// Overall run deadline in milliseconds (None = until the source is exhausted)
    #[serde(default = "default_run_deadline", with = "optional_millis_serde")]
    pub run_deadline: Option<Duration>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            total_items: default_total_items(),
            concurrency: default_concurrency(),
            workers: None,
            admission_scope: AdmissionScope::default(),
            request_timeout: default_request_timeout(),
            telemetry_interval: default_telemetry_interval(),
            telemetry_log: default_telemetry_log(),
            run_deadline: default_run_deadline(),
        }
    }
}

impl DownloaderConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(self.concurrency)
    }

    /// Pipeline settings derived from this workload config
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.worker_count(),
            admission_capacity: Some(self.concurrency),
            admission_scope: self.admission_scope,
            output_capacity: default_output_capacity(),
        }
    }

    /// Check the settings for values that would stall or break a run
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(Error::config("workers", "must be at least 1 when set"));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(Error::config(
                "base_url",
                format!("not a valid URL: {}", self.base_url),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout", "must be greater than zero"));
        }
        if self.telemetry_interval.is_zero() {
            return Err(Error::config(
                "telemetry_interval",
                "must be greater than zero",
            ));
        }
        if self.run_deadline.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("run_deadline", "must be greater than zero when set"));
        }
        self.pipeline().validate()
    }
}

/// Top-level configuration document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Photo downloader settings
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

impl Config {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.downloader.validate()
    }
}

fn default_workers() -> usize {
    4
}

fn default_output_capacity() -> usize {
    crate::pipeline::MERGE_CHANNEL_CAPACITY
}

fn default_base_url() -> String {
    "https://jsonplaceholder.typicode.com".to_string()
}

fn default_total_items() -> usize {
    5000
}

fn default_concurrency() -> usize {
    1
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_telemetry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_telemetry_log() -> PathBuf {
    PathBuf::from("logs.txt")
}

fn default_run_deadline() -> Option<Duration> {
    Some(Duration::from_secs(180))
}

mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod optional_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_photo_workload() {
        let config = DownloaderConfig::default();
        assert_eq!(config.total_items, 5000);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.telemetry_interval, Duration::from_secs(1));
        assert_eq!(config.run_deadline, Some(Duration::from_secs(180)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn workers_can_exceed_concurrency() {
        let config = DownloaderConfig {
            concurrency: 5,
            workers: Some(100),
            ..Default::default()
        };
        let pipeline = config.pipeline();
        assert_eq!(pipeline.workers, 100);
        assert_eq!(pipeline.admission_capacity, Some(5));
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected_with_key() {
        let config = DownloaderConfig {
            concurrency: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("expected config error, got {other:?}"),
        }

        let pipeline = PipelineConfig {
            admission_capacity: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            pipeline.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "admission_capacity"
        ));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = DownloaderConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"downloader": {{"total_items": 3, "concurrency": 2, "telemetry_interval": 250, "run_deadline": null, "admission_scope": "per_worker"}}}}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.downloader.total_items, 3);
        assert_eq!(config.downloader.concurrency, 2);
        assert_eq!(config.downloader.telemetry_interval, Duration::from_millis(250));
        assert_eq!(config.downloader.run_deadline, None);
        assert_eq!(config.downloader.admission_scope, AdmissionScope::PerWorker);
        assert_eq!(config.downloader.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn sub_second_durations_survive_reload() {
        let config = Config {
            downloader: DownloaderConfig {
                request_timeout: Duration::from_millis(500),
                run_deadline: Some(Duration::from_millis(1500)),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""request_timeout":500"#), "{json}");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let back = Config::from_json_file(file.path()).unwrap();
        assert_eq!(back.downloader.request_timeout, Duration::from_millis(500));
        assert_eq!(back.downloader.run_deadline, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn from_json_file_rejects_invalid_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"downloader": {{"concurrency": 0}}}}"#).unwrap();
        match Config::from_json_file(file.path()) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("concurrency")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn pipeline_settings_follow_workload() {
        let config = DownloaderConfig {
            concurrency: 3,
            admission_scope: AdmissionScope::PerWorker,
            ..Default::default()
        };
        let pipeline = config.pipeline();
        assert_eq!(pipeline.workers, 3);
        assert_eq!(pipeline.admission_capacity, Some(3));
        assert_eq!(pipeline.admission_scope, AdmissionScope::PerWorker);
        assert_eq!(pipeline.output_capacity, 1);

        let zero_deadline = DownloaderConfig {
            run_deadline: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(zero_deadline.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_durations() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
