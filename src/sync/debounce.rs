/// Cancel/reset debounce timer
///
/// Every `touch` (re)starts a quiet period; the action fires once the period ends
/// with no newer touch. Touches arriving while the action runs start a fresh period
/// after it settles, so there is at most one pending firing at any time.
///
/// `cancel` discards a pending period without firing, for callers that already
/// did the work themselves. Dropping the handle stops scheduling: a pending period
/// is discarded, while an action already running is left to complete.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Touch,
    Cancel,
}

/// Handle to a running debounce loop
#[derive(Debug)]
pub struct Debouncer {
    signals: mpsc::UnboundedSender<Signal>,
}

impl Debouncer {
    /// Spawn the debounce loop on the current Tokio runtime
    pub fn spawn<F, Fut>(interval: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (signals, mut rx) = mpsc::unbounded_channel::<Signal>();

        tokio::spawn(async move {
            // Idle until the first change of a dirty period
            while let Some(signal) = rx.recv().await {
                if signal == Signal::Cancel {
                    continue;
                }
                let mut deadline = Instant::now() + interval;

                loop {
                    tokio::select! {
                        signal = rx.recv() => match signal {
                            Some(Signal::Touch) => deadline = Instant::now() + interval,
                            Some(Signal::Cancel) => break,
                            // Handle dropped: discard the pending period
                            None => return,
                        },
                        _ = sleep_until(deadline) => {
                            action().await;
                            break;
                        }
                    }
                }
            }
        });

        Self { signals }
    }

    /// Start or extend the quiet period
    pub fn touch(&self) {
        self.signal(Signal::Touch);
    }

    /// Discard the pending period, if any; the next touch starts a fresh one
    pub fn cancel(&self) {
        self.signal(Signal::Cancel);
    }

    fn signal(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!("⏸️ Debounce loop already stopped, ignoring {:?}", signal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting(interval_ms: u64) -> (Debouncer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let debouncer = Debouncer::spawn(Duration::from_millis(interval_ms), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_touches_coalesce_into_one_firing() {
        let (debouncer, fired) = counting(2000);

        for _ in 0..5 {
            debouncer.touch();
            sleep(Duration::from_millis(200)).await;
        }
        // Last touch was 200ms ago
        sleep(Duration::from_millis(1700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_dirty_periods_fire_separately() {
        let (debouncer, fired) = counting(100);

        debouncer.touch();
        sleep(Duration::from_millis(150)).await;
        debouncer.touch();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_period_but_not_later_ones() {
        let (debouncer, fired) = counting(100);

        debouncer.touch();
        sleep(Duration::from_millis(50)).await;
        debouncer.cancel();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Cancel while idle is a no-op
        debouncer.cancel();
        debouncer.touch();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_discards_pending_period() {
        let (debouncer, fired) = counting(100);

        debouncer.touch();
        drop(debouncer);
        sleep(Duration::from_millis(500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
