//! Refresh scheduler.
//!
//! Consumes raw change events and turns any burst of them into a single
//! recomputation pass after a quiet window. Passes are serialized by
//! construction (one task), and events that land while a pass is running
//! trigger exactly one follow-up pass, no matter how many there were.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use pulseboard_db::ChangeEvent;

/// Default quiet window. A single tracker transaction can fan out into
/// dozens of filesystem notifications; 75ms comfortably covers that without
/// a human-visible delay.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(75);

/// Spawn the scheduler task.
///
/// `refresh` runs one full recomputation pass. A failed pass is logged and
/// retried on the next incoming change event, never in a tight loop.
pub fn spawn<F, Fut>(
    mut rx: mpsc::Receiver<ChangeEvent>,
    window: Duration,
    mut refresh: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut open = true;
        while open {
            match rx.recv().await {
                Some(event) => trace!(origin = ?event.origin, "Change observed"),
                None => break,
            }

            // Absorb the rest of the burst until a quiet window passes.
            loop {
                match timeout(window, rx.recv()).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        open = false;
                        break;
                    }
                    Err(_) => break,
                }
            }

            loop {
                if let Err(e) = refresh().await {
                    warn!(error = %e, "Refresh pass failed, retrying on next change event");
                    break;
                }
                // Events that arrived mid-pass collapse into one follow-up.
                let mut dirty = false;
                while rx.try_recv().is_ok() {
                    dirty = true;
                }
                if !dirty {
                    break;
                }
                debug!("Changes arrived during refresh, running one follow-up pass");
            }
        }
        debug!("Change channel closed, scheduler exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_db::{change_channel, ChangeOrigin};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_millis(75);

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_pass() {
        let (tx, rx) = change_channel(64);
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let _task = spawn(rx, WINDOW, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        for _ in 0..25 {
            tx.notify(ChangeOrigin::Filesystem);
        }
        tokio::time::sleep(WINDOW * 4).await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_run_separate_passes() {
        let (tx, rx) = change_channel(64);
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let _task = spawn(rx, WINDOW, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tx.notify(ChangeOrigin::Manual);
        tokio::time::sleep(WINDOW * 4).await;
        tx.notify(ChangeOrigin::Manual);
        tokio::time::sleep(WINDOW * 4).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_retries_only_on_next_event() {
        let (tx, rx) = change_channel(64);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let _task = spawn(rx, WINDOW, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("snapshot read failed");
                }
                Ok(())
            }
        });

        tx.notify(ChangeOrigin::Filesystem);
        tokio::time::sleep(WINDOW * 4).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "no blind retry loop");

        tx.notify(ChangeOrigin::Filesystem);
        tokio::time::sleep(WINDOW * 4).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_during_pass_schedule_one_follow_up() {
        let (tx, rx) = change_channel(64);
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let poker = tx.clone();
        let _task = spawn(rx, WINDOW, move || {
            let counter = Arc::clone(&counter);
            let poker = poker.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Several writes land while the first pass is running.
                    poker.notify(ChangeOrigin::Filesystem);
                    poker.notify(ChangeOrigin::Filesystem);
                    poker.notify(ChangeOrigin::Filesystem);
                }
                Ok(())
            }
        });

        tx.notify(ChangeOrigin::Manual);
        tokio::time::sleep(WINDOW * 4).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2, "exactly one follow-up");
    }
}
