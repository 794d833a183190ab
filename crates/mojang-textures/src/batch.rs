//! Batching usernames → UUIDs resolver
//!
//! Individual lookups are queued and a background loop drains up to
//! `batch_size` of them per round, issuing one upstream request for the whole
//! batch. The delay between rounds is the only throttle against Mojang's
//! rate limit; there are no retries here.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mojang_api::ProfileInfo;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::stats::{BatchStats, Counter};
use crate::upstream::UsernamesToUuids;
use crate::uuids::UuidsProvider;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_DELAY: Duration = Duration::from_millis(2500);

/// Batching parameters
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum usernames per upstream request
    pub batch_size: usize,
    /// Delay between rounds
    pub delay: Duration,
    /// Also fire a round as soon as the queue reaches a multiple of `batch_size`
    pub fire_on_full: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: DEFAULT_DELAY,
            fire_on_full: false,
        }
    }
}

/// Observable lifecycle of the background loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running { stop: oneshot::Sender<()> },
    Stopped,
}

type JobReply = oneshot::Sender<Result<Option<ProfileInfo>>>;

struct Job {
    username: String,
    reply: JobReply,
}

#[derive(Default)]
struct JobQueue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

#[derive(Default)]
struct BatchCounters {
    rounds: Counter,
    usernames_sent: Counter,
    last_batch_size: Counter,
    last_queue_depth: Counter,
    last_round_duration_ms: Counter,
}

/// Resolves usernames to profile ids in time-windowed batches
pub struct BatchUuidsProvider {
    endpoint: Arc<dyn UsernamesToUuids>,
    config: BatchConfig,
    queue: Arc<Mutex<JobQueue>>,
    fire: Arc<Notify>,
    lifecycle: Mutex<Lifecycle>,
    counters: Arc<BatchCounters>,
}

impl BatchUuidsProvider {
    pub fn new(endpoint: Arc<dyn UsernamesToUuids>, config: BatchConfig) -> Self {
        let config = BatchConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };

        Self {
            endpoint,
            config,
            queue: Arc::new(Mutex::new(JobQueue::default())),
            fire: Arc::new(Notify::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
            counters: Arc::new(BatchCounters::default()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Resolve a username, waiting for the batch that carries it.
    ///
    /// `Ok(None)` means Mojang has no account with this name. Dropping the
    /// returned future releases the caller; the job itself stays queued and is
    /// discarded when its round comes.
    pub async fn get_uuid(&self, username: &str) -> Result<Option<ProfileInfo>> {
        let reply = self.enqueue(username)?;

        reply.await.map_err(|_| ProviderError::QueueStopped)?
    }

    /// Same as [`Self::get_uuid`], but gives up with [`ProviderError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn get_uuid_with_cancel(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ProfileInfo>> {
        let reply = self.enqueue(username)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = reply => result.map_err(|_| ProviderError::QueueStopped)?,
        }
    }

    /// Start the background loop. Called implicitly by the first lookup.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match *lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped => return Err(ProviderError::QueueStopped),
            Lifecycle::Idle => {}
        }

        let (stop, stopped) = oneshot::channel();
        tokio::spawn(run_queue(
            self.endpoint.clone(),
            self.config.clone(),
            self.queue.clone(),
            self.fire.clone(),
            self.counters.clone(),
            stopped,
        ));
        *lifecycle = Lifecycle::Running { stop };

        debug!(
            batch_size = self.config.batch_size,
            delay_ms = self.config.delay.as_millis() as u64,
            fire_on_full = self.config.fire_on_full,
            "UUIDs batching queue started"
        );
        Ok(())
    }

    /// Stop the background loop for good.
    ///
    /// Jobs still queued are released with [`ProviderError::QueueStopped`];
    /// a round already sent upstream still delivers its results.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);
        if let Lifecycle::Running { stop } = previous {
            let _ = stop.send(());
        }

        let mut queue = lock(&self.queue);
        queue.stopped = true;
        // Dropping the reply senders wakes the waiters
        queue.jobs.clear();
    }

    pub fn state(&self) -> QueueState {
        match *self.lifecycle() {
            Lifecycle::Idle => QueueState::Idle,
            Lifecycle::Running { .. } => QueueState::Running,
            Lifecycle::Stopped => QueueState::Stopped,
        }
    }

    /// Number of jobs waiting for a round
    pub fn queue_len(&self) -> usize {
        lock(&self.queue).jobs.len()
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats {
            rounds: self.counters.rounds.get(),
            usernames_sent: self.counters.usernames_sent.get(),
            last_batch_size: self.counters.last_batch_size.get(),
            last_queue_depth: self.counters.last_queue_depth.get(),
            last_round_duration_ms: self.counters.last_round_duration_ms.get(),
        }
    }

    fn enqueue(&self, username: &str) -> Result<oneshot::Receiver<Result<Option<ProfileInfo>>>> {
        self.start()?;

        let (reply, response) = oneshot::channel();
        let len = {
            let mut queue = lock(&self.queue);
            if queue.stopped {
                return Err(ProviderError::QueueStopped);
            }

            queue.jobs.push_back(Job {
                username: username.to_string(),
                reply,
            });
            queue.jobs.len()
        };

        if self.config.fire_on_full && len % self.config.batch_size == 0 {
            self.fire.notify_one();
        }

        Ok(response)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UuidsProvider for BatchUuidsProvider {
    async fn get_uuid(&self, username: &str) -> Result<Option<ProfileInfo>> {
        BatchUuidsProvider::get_uuid(self, username).await
    }
}

fn lock(queue: &Mutex<JobQueue>) -> MutexGuard<'_, JobQueue> {
    queue.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run_queue(
    endpoint: Arc<dyn UsernamesToUuids>,
    config: BatchConfig,
    queue: Arc<Mutex<JobQueue>>,
    fire: Arc<Notify>,
    counters: Arc<BatchCounters>,
    mut stopped: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            // Also resolves when the provider is dropped
            _ = &mut stopped => return,
            _ = tokio::time::sleep(config.delay) => {}
            _ = fire.notified(), if config.fire_on_full => {}
        }

        loop {
            let (jobs, left) = drain(&queue, config.batch_size);
            if jobs.is_empty() {
                break;
            }

            counters.last_batch_size.set(jobs.len() as u64);
            counters.last_queue_depth.set(left as u64);
            debug!(batch_size = jobs.len(), queue_depth = left, "Firing UUIDs batch");

            // A slow upstream must not hold back the next round
            tokio::spawn(fire_request(endpoint.clone(), jobs, counters.clone()));

            // Full-batch signals merge into a single wake-up, so every full
            // batch still queued goes out now
            if !config.fire_on_full || left < config.batch_size {
                break;
            }
        }
    }
}

/// Take up to `batch_size` jobs in arrival order, skipping jobs whose caller
/// is no longer waiting.
fn drain(queue: &Mutex<JobQueue>, batch_size: usize) -> (Vec<Job>, usize) {
    let mut queue = lock(queue);
    let mut jobs = Vec::with_capacity(batch_size);
    while jobs.len() < batch_size {
        match queue.jobs.pop_front() {
            Some(job) if job.reply.is_closed() => continue,
            Some(job) => jobs.push(job),
            None => break,
        }
    }

    (jobs, queue.jobs.len())
}

async fn fire_request(
    endpoint: Arc<dyn UsernamesToUuids>,
    jobs: Vec<Job>,
    counters: Arc<BatchCounters>,
) {
    let usernames: Vec<String> = jobs.iter().map(|job| job.username.clone()).collect();

    let started = Instant::now();
    let result = endpoint.usernames_to_uuids(&usernames).await;
    let elapsed = started.elapsed();

    counters.rounds.incr();
    counters.usernames_sent.add(usernames.len() as u64);
    counters.last_round_duration_ms.set(elapsed.as_millis() as u64);

    match result {
        Ok(profiles) => {
            debug!(
                requested = usernames.len(),
                found = profiles.len(),
                duration_ms = elapsed.as_millis() as u64,
                "UUIDs batch resolved"
            );
            let names: Vec<String> = profiles
                .iter()
                .map(|profile| profile.name.to_lowercase())
                .collect();
            for job in jobs {
                // Mojang doesn't keep the request order
                let username = job.username.to_lowercase();
                let profile = names
                    .iter()
                    .position(|name| *name == username)
                    .map(|i| profiles[i].clone());
                let _ = job.reply.send(Ok(profile));
            }
        }
        Err(err) => {
            warn!(
                requested = usernames.len(),
                error = %err,
                "UUIDs batch failed"
            );
            for job in jobs {
                let _ = job.reply.send(Err(ProviderError::Mojang(err.clone())));
            }
        }
    }
}
