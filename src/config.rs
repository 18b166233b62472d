use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::info;
use url::Url;

use crate::error::PipelineError;

pub const DEFAULT_ENDPOINT: &str = "https://geosearch.planninglabs.nyc/v2/search";
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 250;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

/// Run configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Rows buffered in memory before each append to the output.
    pub batch_size: usize,
    /// Minimum pause between consecutive records.
    pub rate_limit_delay: Duration,
    /// Total attempts per request, the first one included.
    pub retry_count: u32,
    /// Seconds; attempt `n` waits `backoff_factor * 2^(n-1)` before the next.
    pub backoff_factor: f64,
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Settings {
    /// Settings with defaults for everything except the two paths.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_path: P, output_path: Q) -> Self {
        Settings {
            input_path: input_path.into(),
            output_path: output_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit_delay: Duration::from_millis(DEFAULT_RATE_LIMIT_DELAY_MS),
            retry_count: DEFAULT_RETRY_COUNT,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PipelineError::Config(format!("`{}` is not set", key)))
        };

        let mut settings = Settings::new(required("input_filename")?, required("output_filename")?);

        if let Some(v) = parse_opt::<usize>(&lookup, "batch_size")? {
            settings.batch_size = v;
        }
        if let Some(v) = parse_opt::<u64>(&lookup, "rate_limit_delay_ms")? {
            settings.rate_limit_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_opt::<u32>(&lookup, "retry_count")? {
            settings.retry_count = v;
        }
        if let Some(v) = parse_opt::<f64>(&lookup, "backoff_factor")? {
            settings.backoff_factor = v;
        }
        if let Some(v) = lookup("geosearch_url").filter(|v| !v.trim().is_empty()) {
            settings.endpoint = Url::parse(v.trim())
                .map_err(|e| PipelineError::Config(format!("`geosearch_url` {:?}: {}", v, e)))?;
        }
        if let Some(v) = parse_opt::<u64>(&lookup, "connect_timeout_secs")? {
            settings.connect_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_opt::<u64>(&lookup, "read_timeout_secs")? {
            settings.read_timeout = Duration::from_secs(v);
        }

        settings.validate()?;
        info!(
            "Configuration: input={:?} output={:?} batch_size={} delay={:?} retries={} backoff={}s",
            settings.input_path,
            settings.output_path,
            settings.batch_size,
            settings.rate_limit_delay,
            settings.retry_count,
            settings.backoff_factor
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("`batch_size` must be at least 1".into()));
        }
        if self.retry_count == 0 {
            return Err(PipelineError::Config("`retry_count` must be at least 1".into()));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(PipelineError::Config(format!(
                "`backoff_factor` must be a non-negative number, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

fn parse_opt<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, PipelineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PipelineError::Config(format!("`{}` = {:?}: {}", key, raw, e))),
        _ => Ok(None),
    }
}
