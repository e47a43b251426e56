//! Signal handling and the bounded drain that follows a shutdown request.

use std::time::Duration;

use orchestrator_scheduler::Scheduler;
use tracing::warn;

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Poll the scheduler's in-flight set until it's empty or `timeout` elapses.
///
/// Runners that are still executing when the deadline passes are left to
/// write their own terminal state whenever they eventually finish. Returns
/// `true` if the set drained in time, `false` if the timeout was hit; the
/// caller exits with non-zero status in the latter case.
pub async fn drain(scheduler: &Scheduler, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut interval = tokio::time::interval(Duration::from_millis(100));

    loop {
        if scheduler.in_flight_ids().await.is_empty() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("shutdown timeout reached with tasks still in flight");
            return false;
        }
        interval.tick().await;
    }
}
