use futures::future::join_all;
use serde::Serialize;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use crate::providers::MetadataProvider;

/// At most this many poll sequences run concurrently when fanning out over
/// every offered quality, to avoid hammering the upstream provider.
pub const POLL_BATCH_SIZE: usize = 3;
const BATCH_PAUSE: Duration = Duration::from_millis(250);

const DEFAULT_MAX_ATTEMPTS: u32 = 15;
const DEFAULT_INTERVAL_MS: u64 = 1500;

/// Retry budget for one poll sequence. Tunable policy, not a contract:
/// defaults keep the total wait under ~30 seconds.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Final downloadable asset as reported by the processing provider.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyFile {
    pub file_url: String,
    pub file_name: Option<String>,
    pub file_size: Option<String>,
}

/// Outcome of a single status probe against a processing handle.
#[derive(Debug, Clone)]
pub enum PollCheck {
    /// Provider reported completion with a file URL.
    Completed(ReadyFile),
    /// Provider reported an in-progress percentage or status string.
    InProgress(String),
    /// The response carried no progress signal: the payload itself is the
    /// final asset and no further polling is needed.
    Direct(ReadyFile),
}

/// Terminal outcome of a poll sequence.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Ready(ReadyFile),
    Failed { attempts: u32, error: String },
    TimedOut { attempts: u32 },
}

/// Polls a processing handle until the asset is ready, the provider fails
/// terminally, or the attempt budget runs out. The wait between attempts is
/// a cooperative sleep; it never blocks other requests. Each caller runs its
/// own fresh sequence, even for a handle polled moments earlier.
pub async fn poll(
    provider: &dyn MetadataProvider,
    handle: &str,
    policy: &PollPolicy,
) -> ProcessingResult {
    for attempt in 1..=policy.max_attempts {
        match provider.check_processing(handle).await {
            Ok(PollCheck::Completed(file) | PollCheck::Direct(file)) => {
                debug!(attempt, file_url = %file.file_url, "processing ready");
                return ProcessingResult::Ready(file);
            }
            Ok(PollCheck::InProgress(progress)) => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    %progress,
                    "processing still in progress"
                );
            }
            Err(error) if !error.is_transient() => {
                warn!(attempt, %error, "processing failed permanently");
                return ProcessingResult::Failed {
                    attempts: attempt,
                    error: error.to_string(),
                };
            }
            Err(error) => {
                // Transient unless the budget just ran out.
                warn!(attempt, %error, "processing status check failed");
                if attempt == policy.max_attempts {
                    return ProcessingResult::Failed {
                        attempts: attempt,
                        error: error.to_string(),
                    };
                }
            }
        }
        if attempt < policy.max_attempts {
            sleep(policy.interval).await;
        }
    }
    ProcessingResult::TimedOut {
        attempts: policy.max_attempts,
    }
}

/// Runs a poll sequence for every `(quality key, handle)` pair with bounded
/// fan-out: batches of [`POLL_BATCH_SIZE`] run concurrently with a short
/// pause between batches. The futures stay owned by the caller, so dropping
/// the request cancels any in-flight polling.
pub async fn poll_all(
    provider: &dyn MetadataProvider,
    targets: &[(String, String)],
    policy: &PollPolicy,
) -> Vec<(String, ProcessingResult)> {
    let mut results = Vec::with_capacity(targets.len());
    let mut batches = targets.chunks(POLL_BATCH_SIZE).peekable();
    while let Some(batch) = batches.next() {
        let outcomes = join_all(batch.iter().map(|(key, handle)| async move {
            (key.clone(), poll(provider, handle, policy).await)
        }))
        .await;
        results.extend(outcomes);
        if batches.peek().is_some() {
            sleep(BATCH_PAUSE).await;
        }
    }
    results
}
