//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on missing or unparseable values.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::{RetryPolicy, SamplingParams};
use crate::worker::{LoopMode, WorkerConfig};
use secrecy::SecretString;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Required to run workers; not needed for operator commands.
    pub anthropic_api_key: Option<SecretString>,
    pub model: String,
    pub sampling: SamplingParams,
    pub prompt_file: Option<PathBuf>,
    pub required_result_keys: Vec<String>,
    pub claim_limit: usize,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub inter_batch_delay: Duration,
    pub error_backoff: Duration,
    pub lease_ttl: Duration,
    pub retry: RetryPolicy,
    pub worker_id: Option<String>,
    pub pool_size: usize,
    /// `Some` puts workers in bounded mode.
    pub max_empty_polls: Option<u32>,
    pub work_table: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let sampling = SamplingParams {
            temperature: vars.parsed("GENERATION_TEMPERATURE", 0.7)?,
            max_tokens: vars.parsed("GENERATION_MAX_TOKENS", 1024)?,
        };
        let retry = RetryPolicy {
            max_attempts: vars.parsed("RETRY_MAX_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(vars.parsed("RETRY_BASE_DELAY_MS", 1000)?),
        };

        let lease_ttl = vars
            .parsed::<u64>("LEASE_TTL_MINUTES", 10)?
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::Config("LEASE_TTL_MINUTES is too large".to_string()))?;

        Ok(Self {
            database_url: SecretString::from(vars.required("DATABASE_URL")?),
            anthropic_api_key: vars.optional("ANTHROPIC_API_KEY").map(SecretString::from),
            model: vars
                .optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            sampling,
            prompt_file: vars.optional("PROMPT_FILE").map(PathBuf::from),
            required_result_keys: vars
                .optional("REQUIRED_RESULT_KEYS")
                .map(|keys| {
                    keys.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            claim_limit: vars.parsed("CLAIM_LIMIT", 4)?,
            batch_size: vars.parsed("BATCH_SIZE", 4)?,
            poll_interval: Duration::from_millis(vars.parsed("POLL_INTERVAL_MS", 5000)?),
            inter_batch_delay: Duration::from_millis(vars.parsed("INTER_BATCH_DELAY_MS", 500)?),
            error_backoff: Duration::from_millis(vars.parsed("ERROR_BACKOFF_MS", 10_000)?),
            lease_ttl,
            retry,
            worker_id: vars.optional("WORKER_ID"),
            pool_size: vars.parsed("WORKER_POOL_SIZE", 4)?,
            max_empty_polls: vars.parsed_optional("MAX_EMPTY_POLLS")?,
            work_table: vars
                .optional("WORK_TABLE")
                .unwrap_or_else(|| "work_items".to_string()),
            otel_endpoint: vars.optional("OTEL_ENDPOINT"),
            log_level: vars
                .optional("LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Loop settings for one worker.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            claim_limit: self.claim_limit,
            batch_size: self.batch_size,
            empty_delay: self.poll_interval,
            inter_batch_delay: self.inter_batch_delay,
            error_backoff: self.error_backoff,
            mode: match self.max_empty_polls {
                Some(max_empty_polls) => LoopMode::Bounded { max_empty_polls },
                None => LoopMode::Continuous,
            },
        }
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-empty.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
    }

    fn parsed_optional<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.optional(name)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw:?}")))
            })
            .transpose()
    }

    fn parsed<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.parsed_optional(name)?.unwrap_or(default))
    }
}
