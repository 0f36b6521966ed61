//! Background maintenance sweeps.
//!
//! Expired sessions, authorization codes, token records and reset tickets
//! are purged on a timer. Every sweep is best-effort: validity checks on
//! the read paths are what enforce expiry, the sweeps only reclaim space.

use std::time::Duration;

use crate::state::AppState;

/// Interval between sweep rounds.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Spawns the maintenance loop.
pub fn spawn_sweeps(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_sweep(&state).await;
        }
    });
}

async fn run_sweep(state: &AppState) {
    match state.sessions().purge_expired().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired sessions"),
        Err(err) => tracing::warn!(error = %err, "session sweep failed"),
    }

    match state.authorization().purge_expired_codes().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired authorization codes"),
        Err(err) => tracing::warn!(error = %err, "authorization code sweep failed"),
    }

    match state.tokens().purge_expired().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired token records"),
        Err(err) => tracing::warn!(error = %err, "token sweep failed"),
    }

    match state.passwords().purge_expired_tickets().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired reset tickets"),
        Err(err) => tracing::warn!(error = %err, "reset ticket sweep failed"),
    }
}
