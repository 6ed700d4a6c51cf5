//! Resets `Processing` files whose worker went away.
//!
//! A worker refreshes its claim when it starts a job and every job is bounded
//! by `job_timeout`, so a claim older than `job_timeout + stale_grace` cannot
//! belong to a job that is still running on any replica.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vsa_db::{DbResult, VideoStore};

/// Reason recorded on files reset by the sweep.
pub const STALE_CLAIM_REASON: &str = "processing was interrupted; please retry";

/// Reset every claim last refreshed more than `stale_after` ago.
pub async fn recover_stale_claims(
    videos: &dyn VideoStore,
    stale_after: Duration,
    reason: &str,
) -> DbResult<u64> {
    let age = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    let recovered = videos.recover_orphaned(cutoff, reason).await?;
    if recovered > 0 {
        warn!(recovered, "Reset stale processing claims");
    } else {
        debug!("No stale processing claims");
    }
    Ok(recovered)
}

/// Sweep stale claims every `interval` until the returned task is aborted.
pub fn spawn_stale_claim_sweeper(
    videos: Arc<dyn VideoStore>,
    stale_after: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        stale_after_secs = stale_after.as_secs(),
        interval_secs = interval.as_secs(),
        "Starting stale claim sweeper"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; startup recovery already ran.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = recover_stale_claims(videos.as_ref(), stale_after, STALE_CLAIM_REASON).await {
                error!("Stale claim sweep failed: {}", e);
            }
        }
    })
}
