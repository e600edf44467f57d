use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tracing::{info, instrument, warn};

use crate::{
    config::LocalConfig,
    models::UpdateNotification,
    update_driver::{UpdateWorkerPool, WorkerStats},
};

/// Source name that reads notifications from standard input
pub const STDIN_SOURCE: &str = "-";

/// Counters of one pass over a notification stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub dispatched: u64,
    pub malformed: u64,
}

/// Feeds newline-delimited JSON update notifications into the worker pool
pub struct EventFeed;

impl EventFeed {
    /// Starts reading `events_source` in the background
    ///
    /// The task owns the pool: once the source is exhausted the queues are
    /// drained and the workers' counters are returned.
    ///
    /// # Arguments
    ///
    /// * `local_config` - The local configuration, `events_source` is a file path or `-` for stdin
    /// * `pool` - The worker pool the notifications are dispatched to
    ///
    /// # Returns
    ///
    /// * `Result<JoinHandle<Result<WorkerStats>>>` - The handle of the feed task
    #[instrument("EVENT_FEED", skip(local_config, pool))]
    pub async fn start_event_feed(
        local_config: &Arc<LocalConfig>,
        pool: UpdateWorkerPool,
    ) -> Result<JoinHandle<Result<WorkerStats>>> {
        let reader = Self::open_source(&local_config.events_source).await?;
        let events_source = local_config.events_source.clone();

        let handle = tokio::spawn(async move {
            info!("Reading update notifications from {}", events_source);

            let feed_stats = Self::consume(reader, &pool).await?;
            info!(
                "Event source exhausted: {} notifications dispatched, {} malformed lines",
                feed_stats.dispatched, feed_stats.malformed
            );

            pool.shutdown().await
        });

        Ok(handle)
    }

    async fn open_source(events_source: &str) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
        if events_source == STDIN_SOURCE {
            return Ok(Box::new(BufReader::new(tokio::io::stdin())));
        }

        let file = File::open(events_source)
            .await
            .with_context(|| format!("Failed to open events source {}", events_source))?;
        Ok(Box::new(BufReader::new(file)))
    }

    /// Dispatches every notification of `reader` to the pool
    ///
    /// Blank lines are ignored, lines that do not decode are logged and skipped.
    pub async fn consume<R>(reader: R, pool: &UpdateWorkerPool) -> Result<FeedStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = FeedStats::default();
        let mut lines = reader.lines();
        let mut line_number = 0u64;

        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read events source")?
        {
            line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let notification = match serde_json::from_str::<UpdateNotification>(line) {
                Ok(notification) => notification.normalized(),
                Err(e) => {
                    warn!("Skipping malformed notification on line {}: {}", line_number, e);
                    stats.malformed += 1;
                    continue;
                }
            };

            pool.dispatch(notification).await?;
            stats.dispatched += 1;
        }

        Ok(stats)
    }
}
