//! Stop signal shared by the driver task and the discovery poller.

use std::time::Duration;
use tokio::sync::watch;

pub(crate) type StopSignal = watch::Receiver<bool>;

/// True once a stop was requested or the owning client is gone.
pub(crate) fn is_stopped(signal: &StopSignal) -> bool {
    *signal.borrow() || signal.has_changed().is_err()
}

/// Resolves when a stop is requested.
pub(crate) async fn stopped(signal: &mut StopSignal) {
    // An Err means the sender was dropped, which also means stop.
    let _ = signal.wait_for(|stop| *stop).await;
}

/// Sleep for `duration` unless stopped first. Returns false if stopped.
pub(crate) async fn sleep_or_stop(duration: Duration, signal: &mut StopSignal) -> bool {
    if is_stopped(signal) {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => !is_stopped(signal),
        _ = stopped(signal) => false,
    }
}
