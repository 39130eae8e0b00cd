use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::services::blob_store::BlobStore;
use crate::services::completion::completion_percent;
use crate::services::tracker::FragmentTracker;

/// Verdict for one in-progress upload, with the reason that ends up in
/// the log.
#[derive(Debug, PartialEq, Eq)]
pub enum SweepDecision {
    Keep(&'static str),
    Delete(&'static str),
}

/// Retention policy for an in-progress upload. Pure so every case can
/// be pinned in tests without clocks or databases.
///
/// The hard ttl wins over everything, including near-complete uploads
/// that keep trickling activity. Below that, recent activity keeps an
/// upload alive; stale ones survive on progress alone, with a shorter
/// leash the less of the file has arrived.
pub fn decide(
    config: &UploadConfig,
    now: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    received: u64,
    total: u64,
) -> SweepDecision {
    let age_secs = (now - created_at).num_seconds();
    if age_secs >= config.hard_ttl_secs {
        return SweepDecision::Delete("hard ttl exceeded");
    }

    let idle_secs = (now - last_activity).num_seconds();
    if idle_secs <= config.stale_after_secs {
        return SweepDecision::Keep("recent activity");
    }

    let percent = completion_percent(received, total);
    if percent > config.grace_completion_percent as f64 {
        return SweepDecision::Keep("nearly complete");
    }

    if percent > config.escalation_completion_percent as f64 {
        if idle_secs > config.escalation_after_secs {
            return SweepDecision::Delete("stalled past escalation window");
        }
        return SweepDecision::Keep("making progress");
    }

    SweepDecision::Delete("stale with low progress")
}

/// Background task reclaiming abandoned uploads. Owned by the process
/// lifecycle: main spawns it with a shutdown receiver and it stops when
/// told, so nothing keeps sweeping during graceful shutdown.
pub struct Sweeper {
    blob_store: Arc<BlobStore>,
    tracker: Arc<dyn FragmentTracker>,
    config: UploadConfig,
    shutdown: watch::Receiver<bool>,
}

impl Sweeper {
    pub fn new(
        blob_store: Arc<BlobStore>,
        tracker: Arc<dyn FragmentTracker>,
        config: UploadConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            blob_store,
            tracker,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!(
            "🧹 Sweeper started (every {}s, stale after {}s, hard ttl {}s)",
            self.config.sweep_interval_secs, self.config.stale_after_secs, self.config.hard_ttl_secs
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("🛑 Sweeper shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.sweep_interval_secs)) => {
                    match self.sweep_once().await {
                        Ok(0) => {}
                        Ok(n) => info!("🧹 Sweep pass reclaimed {} upload(s)", n),
                        Err(e) => error!("Sweep pass failed: {}", e),
                    }
                }
            }
        }
    }

    /// One pass over every in-progress upload. Returns how many were
    /// deleted. Per-upload failures are logged and left for the next
    /// pass rather than aborting the whole sweep.
    pub async fn sweep_once(&self) -> Result<usize, AppError> {
        let now = Utc::now();
        let sessions = self.blob_store.list_in_progress().await?;
        let mut deleted = 0;

        for session in sessions {
            let received = match self.blob_store.count_sequences(&session.id).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("Skipping {} this pass, chunk count failed: {}", session.id, e);
                    continue;
                }
            };

            let decision = decide(
                &self.config,
                now,
                session.created_at.with_timezone(&Utc),
                session.last_activity_at.with_timezone(&Utc),
                received,
                session.total_chunks as u64,
            );

            match decision {
                SweepDecision::Keep(_) => {}
                SweepDecision::Delete(reason) => {
                    info!(
                        "🧹 Reclaiming upload {} ({}/{} chunks): {}",
                        session.id, received, session.total_chunks, reason
                    );
                    match self.blob_store.delete_session(&session.id).await {
                        Ok(()) => {
                            self.tracker.remove(&session.id).await;
                            deleted += 1;
                        }
                        Err(e) => {
                            warn!("Failed to reclaim {}, retrying next pass: {}", session.id, e)
                        }
                    }
                }
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn at(now: DateTime<Utc>, minutes_ago: i64) -> DateTime<Utc> {
        now - ChronoDuration::minutes(minutes_ago)
    }

    fn config() -> UploadConfig {
        UploadConfig::default()
    }

    #[test]
    fn test_recent_activity_keeps_upload() {
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 40), at(now, 30), 4, 20);
        assert_eq!(decision, SweepDecision::Keep("recent activity"));
    }

    #[test]
    fn test_idle_boundary_is_inclusive() {
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 90), at(now, 60), 1, 20);
        assert_eq!(decision, SweepDecision::Keep("recent activity"));
    }

    #[test]
    fn test_nearly_complete_survives_staleness() {
        // 95% done, idle for 90 minutes
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 120), at(now, 90), 19, 20);
        assert_eq!(decision, SweepDecision::Keep("nearly complete"));
    }

    #[test]
    fn test_escalation_window_reclaims_stalled_upload() {
        // 60% done, idle for 3 hours
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 200), at(now, 180), 12, 20);
        assert_eq!(decision, SweepDecision::Delete("stalled past escalation window"));
    }

    #[test]
    fn test_escalation_window_spares_recent_stall() {
        // 60% done, idle for 90 minutes: stale, but inside the window
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 120), at(now, 90), 12, 20);
        assert_eq!(decision, SweepDecision::Keep("making progress"));
    }

    #[test]
    fn test_low_progress_reclaimed_when_stale() {
        // 10% done, idle for 3 hours
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 200), at(now, 180), 2, 20);
        assert_eq!(decision, SweepDecision::Delete("stale with low progress"));
    }

    #[test]
    fn test_hard_ttl_beats_progress_and_activity() {
        // 95% done and active ten minutes ago, but a day old
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 25 * 60), at(now, 10), 19, 20);
        assert_eq!(decision, SweepDecision::Delete("hard ttl exceeded"));
    }

    #[test]
    fn test_exact_grace_percent_is_not_enough() {
        // Exactly 90% does not clear the strictly-greater grace bar,
        // but at 90% it still sits above the escalation threshold
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 120), at(now, 90), 18, 20);
        assert_eq!(decision, SweepDecision::Keep("making progress"));
    }

    #[test]
    fn test_exact_escalation_percent_counts_as_low_progress() {
        let now = Utc::now();
        let decision = decide(&config(), now, at(now, 120), at(now, 90), 10, 20);
        assert_eq!(decision, SweepDecision::Delete("stale with low progress"));
    }
}
