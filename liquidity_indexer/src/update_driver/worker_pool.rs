use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    future::Future,
    hash::{Hash, Hasher},
    ops::AddAssign,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::UpdateDriver;
use crate::{
    error::LiquidityError,
    models::{EventPosition, UpdateNotification},
};

/// How often a store outage is retried before the update is given up
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Counters reported by the workers when they stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Notifications written to the ledger or the registry
    pub applied: u64,
    /// Duplicates, out-of-order notifications and stale rate observations
    pub skipped: u64,
    /// Notifications whose apply or recompute step failed for good
    pub failed: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Pool of workers that process update notifications
///
/// Notifications are routed by a hash of the user id, so every update of a
/// user goes through the same worker and is handled in arrival order. Updates
/// of different users run concurrently.
pub struct UpdateWorkerPool {
    senders: Vec<mpsc::Sender<UpdateNotification>>,
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl UpdateWorkerPool {
    pub fn new(
        driver: Arc<UpdateDriver>,
        workers: usize,
        queue_size: usize,
        retry_policy: RetryPolicy,
    ) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (sender, receiver) = mpsc::channel::<UpdateNotification>(queue_size.max(1));
            let worker = Worker {
                id: worker_id,
                driver: driver.clone(),
                retry_policy: retry_policy.clone(),
                last_positions: HashMap::new(),
                stats: WorkerStats::default(),
            };
            handles.push(tokio::spawn(worker.run(receiver)));
            senders.push(sender);
        }

        info!("Started {} update workers", workers);

        Self { senders, handles }
    }

    /// Queues a notification on the worker owning its user
    ///
    /// Waits while that worker's queue is full.
    pub async fn dispatch(&self, notification: UpdateNotification) -> Result<()> {
        let worker_id = self.worker_for(&notification.user);
        self.senders[worker_id]
            .send(notification)
            .await
            .map_err(|_| anyhow::anyhow!("Update worker {} stopped", worker_id))
    }

    fn worker_for(&self, user_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// Closes the queues, lets the workers drain them and returns the summed counters
    pub async fn shutdown(self) -> Result<WorkerStats> {
        drop(self.senders);

        let results = futures::future::try_join_all(self.handles)
            .await
            .context("Update worker panicked")?;

        let mut total = WorkerStats::default();
        for stats in results {
            total += stats;
        }
        info!(
            "Update workers stopped: {} applied, {} skipped, {} failed",
            total.applied, total.skipped, total.failed
        );
        Ok(total)
    }
}

struct Worker {
    id: usize,
    driver: Arc<UpdateDriver>,
    retry_policy: RetryPolicy,
    /// Last applied position per user of this worker
    last_positions: HashMap<String, EventPosition>,
    stats: WorkerStats,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<UpdateNotification>) -> WorkerStats {
        while let Some(notification) = receiver.recv().await {
            self.process(notification).await;
        }
        self.stats
    }

    async fn process(&mut self, notification: UpdateNotification) {
        if let Some(last) = self.last_positions.get(&notification.user) {
            if notification.position <= *last {
                warn!(
                    "Worker {} skipping {} at {} for user {}: already at {}",
                    self.id,
                    notification.event.name(),
                    notification.position,
                    notification.user,
                    last
                );
                self.stats.skipped += 1;
                return;
            }
        }

        let driver = &self.driver;
        let update = &notification;
        let applied =
            retry_store_outages(&self.retry_policy, "apply", move || driver.apply(update)).await;

        let changed = match applied {
            Ok(changed) => changed,
            Err(e) => {
                error!(
                    "Worker {} failed to apply {} at {} for user {}: {}",
                    self.id,
                    notification.event.name(),
                    notification.position,
                    notification.user,
                    e
                );
                self.stats.failed += 1;
                return;
            }
        };

        // From here on the notification is handled; a replay must not apply it twice
        self.last_positions
            .insert(notification.user.clone(), notification.position);

        if !changed {
            debug!(
                "Worker {} ignored stale {} at {} for market {}",
                self.id,
                notification.event.name(),
                notification.position,
                notification.market
            );
            self.stats.skipped += 1;
            return;
        }
        self.stats.applied += 1;

        let engine = driver.engine();
        let user_id = notification.user.as_str();
        let recomputed =
            retry_store_outages(&self.retry_policy, "recompute", move || engine.recompute(user_id))
                .await;

        if let Err(e) = recomputed {
            error!(
                "Worker {} failed to recompute user {} after {}: {}",
                self.id, notification.user, notification.position, e
            );
            self.stats.failed += 1;
        }
    }
}

/// Runs `operation`, repeating it while it fails with a retryable store error
async fn retry_store_outages<T, F, Fut>(
    retry_policy: &RetryPolicy,
    step: &str,
    mut operation: F,
) -> std::result::Result<T, LiquidityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, LiquidityError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(e) if e.is_retryable() && attempt < retry_policy.max_attempts => {
                warn!(
                    "{} attempt {}/{} failed: {}, retrying in {:?}",
                    step, attempt, retry_policy.max_attempts, e, retry_policy.delay
                );
                attempt += 1;
                tokio::time::sleep(retry_policy.delay).await;
            }
            result => return result,
        }
    }
}
