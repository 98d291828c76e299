//! Bounded fetch pool.
//!
//! Runs one keyed fetch per security with at most `workers` in flight. Each
//! worker pauses after its fetch while still holding its slot, which paces
//! the vendor independently of the client-side rate limiter. Failures are
//! isolated per key and an optional deadline caps the whole batch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::data::ProviderError;

use super::config::ScreenerConfig;

/// Pool sizing and pacing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub pause: Duration,
    pub deadline: Option<Duration>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_screener(&ScreenerConfig::default())
    }
}

impl PoolConfig {
    pub fn from_screener(config: &ScreenerConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            pause: Duration::from_millis(config.pause_ms),
            deadline: config.deadline_secs.map(Duration::from_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// What a batch produced.
#[derive(Debug)]
pub struct PoolOutcome<V> {
    /// Keys that produced a value
    pub values: HashMap<String, V>,
    /// Fetches that succeeded with no data
    pub empty: usize,
    /// Fetches that returned an error (after retries)
    pub failed: usize,
    /// Fetches still pending when the deadline fired
    pub aborted: usize,
    /// Tasks that panicked
    pub panicked: usize,
}

impl<V> PoolOutcome<V> {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            empty: 0,
            failed: 0,
            aborted: 0,
            panicked: 0,
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.values.get(key)
    }

    /// Keys without a value, for any reason.
    pub fn missing(&self) -> usize {
        self.empty + self.failed + self.aborted + self.panicked
    }
}

type TaskResult<V> = (String, Result<Option<V>, ProviderError>);

/// Bounded worker pool over keyed fetches.
#[derive(Debug, Clone)]
pub struct FetchPool {
    config: PoolConfig,
}

impl FetchPool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Fetch every key, returning once all tasks finish or the deadline fires.
    pub async fn run<V, F, Fut>(&self, keys: Vec<String>, fetch: F) -> PoolOutcome<V>
    where
        V: Send + 'static,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>, ProviderError>> + Send + 'static,
    {
        let total = keys.len();
        let mut outcome = PoolOutcome::new();
        if total == 0 {
            return outcome;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let fetch = Arc::new(fetch);
        let mut join_set: JoinSet<TaskResult<V>> = JoinSet::new();

        for key in keys {
            let semaphore = Arc::clone(&semaphore);
            let fetch = Arc::clone(&fetch);
            let config = self.config.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (key, Err(ProviderError::Internal("worker pool closed".into())));
                };

                let result = fetch_with_retry(&key, fetch.as_ref(), &config).await;

                if !config.pause.is_zero() {
                    tokio::time::sleep(config.pause).await;
                }
                (key, result)
            });
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let progress_step = (total / 10).max(1);
        let mut completed = 0usize;

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        outcome.aborted = join_set.len();
                        warn!(
                            pending = outcome.aborted,
                            completed, total, "Fetch deadline reached, aborting pending tasks"
                        );
                        join_set.shutdown().await;
                        break;
                    }
                },
                None => join_set.join_next().await,
            };

            let Some(joined) = next else { break };
            completed += 1;

            match joined {
                Ok((key, Ok(Some(value)))) => {
                    outcome.values.insert(key, value);
                }
                Ok((key, Ok(None))) => {
                    debug!(symbol = %key, "No data returned");
                    outcome.empty += 1;
                }
                Ok((key, Err(e))) => {
                    debug!(symbol = %key, error = %e, "Fetch failed");
                    outcome.failed += 1;
                }
                Err(join_error) => {
                    warn!(error = %join_error, "Fetch task panicked");
                    outcome.panicked += 1;
                }
            }

            if completed % progress_step == 0 || completed == total {
                info!(completed, total, "Fetch progress");
            }
        }

        outcome
    }
}

async fn fetch_with_retry<V, F, Fut>(
    key: &str,
    fetch: &F,
    config: &PoolConfig,
) -> Result<Option<V>, ProviderError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Option<V>, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match fetch(key.to_string()).await {
            Err(e) if e.is_recoverable() && attempt < config.max_retries => {
                attempt += 1;
                let backoff = retry_delay(&e, attempt, config);
                debug!(
                    symbol = %key,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying fetch"
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

/// Linear backoff, stretched to the vendor's `Retry-After` when it asks for longer.
fn retry_delay(error: &ProviderError, attempt: u32, config: &PoolConfig) -> Duration {
    let backoff = config.retry_backoff * attempt;
    match error {
        ProviderError::RateLimited {
            retry_after_secs: Some(secs),
        } => backoff.max(Duration::from_secs(*secs)),
        _ => backoff,
    }
}
