//! Cooperative cancellation for the page loop and the retry wait.
//!
//! A [`CancelHandle`] flips a `tokio::sync::watch` flag; every clone of the
//! paired [`CancelSignal`] observes it. The pipeline checks the signal between
//! pages and races it against backoff sleeps, so an abort request never
//! interrupts a page write that is already in progress.

use std::time::Duration;
use tokio::sync::watch;

/// Receiving side, cheap to clone into config and tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending side; dropping it without calling [`CancelHandle::cancel`] never cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    /// Create a connected handle/signal pair.
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        if let Some(rx) = &self.rx {
            let mut rx = rx.clone();
            let raised = rx.wait_for(|c| *c).await.is_ok();
            if raised {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    /// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
    pub async fn sleep(&self, delay: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.cancelled() => false,
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn never_signal_sleeps_fully() {
        let s = CancelSignal::never();
        assert!(!s.is_cancelled());
        assert!(s.sleep(Duration::from_secs(30)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let (handle, signal) = CancelSignal::pair();
        let sleeper = tokio::spawn({
            let signal = signal.clone();
            async move { signal.sleep(Duration::from_secs(3600)).await }
        });
        tokio::task::yield_now().await;
        handle.cancel();
        assert!(!sleeper.await.unwrap());
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_does_not_cancel() {
        let (handle, signal) = CancelSignal::pair();
        drop(handle);
        assert!(!signal.is_cancelled());
        assert!(signal.sleep(Duration::from_millis(10)).await);
    }
}
