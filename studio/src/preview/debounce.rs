//! Debounced rebuild driver.
//!
//! The driver watches a revision counter rather than individual edits: a burst
//! of revisions inside one quiet period coalesces into a single rebuild of
//! whatever the latest revision is.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Call `rebuild` with the latest revision once `delay` has passed without a
/// newer one. Returns when `cancel` fires or every sender is gone.
pub async fn run_rebuild_driver<F>(
    mut revisions: watch::Receiver<u64>,
    delay: Duration,
    cancel: CancellationToken,
    mut rebuild: F,
) where
    F: FnMut(u64),
{
    let mut built: Option<u64> = None;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            changed = revisions.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        // Quiet period: restart the timer on every new revision.
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => break,
            }
        }

        let revision = *revisions.borrow_and_update();
        if built == Some(revision) {
            continue;
        }
        debug!(revision, "debounced rebuild");
        rebuild(revision);
        built = Some(revision);
    }
}
