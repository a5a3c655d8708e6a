use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::ScheduleConfig;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::models::{millis, now_millis, Eligibility};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Refreshed { normalized_id: String, next_eligible_at: i64 },
    Failed { normalized_id: String, next_eligible_at: i64 },
}

/// Background loop that keeps recently requested feeds warm on the upstream.
///
/// Each tick refreshes at most one entry, the most overdue one that was
/// requested within the staleness window. Only one scheduler may run against
/// a repository.
pub struct RefreshScheduler {
    repository: Repository,
    fetcher: Arc<FeedFetcher>,
    schedule: ScheduleConfig,
}

impl RefreshScheduler {
    pub fn new(repository: Repository, fetcher: Arc<FeedFetcher>, schedule: ScheduleConfig) -> Self {
        Self {
            repository,
            fetcher,
            schedule,
        }
    }

    pub async fn tick(&self, now: i64) -> Result<TickOutcome> {
        let requested_since = now - millis(self.schedule.staleness_window());
        let Some(entry) = self.repository.next_due(now, requested_since).await? else {
            return Ok(TickOutcome::Idle);
        };
        debug_assert_eq!(
            entry.eligibility(now, self.schedule.staleness_window()),
            Eligibility::Due
        );

        // The body is discarded; the request itself warms the upstream.
        let outcome = match self.fetcher.fetch(&entry.display_id).await {
            Ok(_) => {
                tracing::info!("refreshed [{}]", entry.display_id);
                TickOutcome::Refreshed {
                    normalized_id: entry.normalized_id,
                    next_eligible_at: now + millis(self.schedule.success_interval()),
                }
            }
            Err(e) => {
                tracing::warn!("[{}] refresh failed: {}", entry.display_id, e);
                TickOutcome::Failed {
                    normalized_id: entry.normalized_id,
                    next_eligible_at: now + millis(self.schedule.error_interval()),
                }
            }
        };

        match &outcome {
            TickOutcome::Refreshed {
                normalized_id,
                next_eligible_at,
            }
            | TickOutcome::Failed {
                normalized_id,
                next_eligible_at,
            } => {
                self.repository
                    .reschedule(normalized_id, *next_eligible_at)
                    .await?
            }
            TickOutcome::Idle => {}
        }

        Ok(outcome)
    }

    /// Run until `shutdown` is cancelled. Cancellation is only observed while
    /// waiting between ticks, so a refresh in progress always finishes.
    pub async fn run(self, shutdown: CancellationToken) {
        let interval = self.schedule.tick_interval();
        tracing::info!("refresh scheduler started, tick every {:?}", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }

            match self.tick(now_millis()).await {
                Ok(TickOutcome::Idle) => tracing::trace!("nothing due"),
                Ok(_) => {}
                Err(e) => tracing::error!("refresh tick failed: {}", e),
            }
        }

        tracing::info!("refresh scheduler stopped");
    }
}
