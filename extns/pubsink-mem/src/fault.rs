use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Controller for injecting errors and latency into the in-process transport.
///
/// Failure counters are consumed one per operation, so `fail_shutdowns(1)` fails exactly the
/// next topic shutdown and lets the following ones through.
#[derive(Debug, Default)]
pub struct FaultInjector {
    /// Artificial publish latency in nanoseconds.
    publish_latency_ns: AtomicU64,
    /// Fail the next N sends.
    fail_next_sends: AtomicUsize,
    /// Fail the next N topic shutdowns.
    fail_next_shutdowns: AtomicUsize,
    /// Fail the next N client closes.
    fail_next_client_closes: AtomicUsize,
    /// Fail the next N connection closes.
    fail_next_connection_closes: AtomicUsize,
}

impl FaultInjector {
    /// Create a new injector with all faults disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every publish by `latency`.
    pub fn set_publish_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.publish_latency_ns.store(nanos, Ordering::Relaxed);
    }

    /// Fail the next N sends.
    pub fn fail_sends(&self, count: usize) {
        self.fail_next_sends.store(count, Ordering::Relaxed);
    }

    /// Fail the next N topic shutdowns.
    pub fn fail_shutdowns(&self, count: usize) {
        self.fail_next_shutdowns.store(count, Ordering::Relaxed);
    }

    /// Fail the next N client closes.
    pub fn fail_client_closes(&self, count: usize) {
        self.fail_next_client_closes.store(count, Ordering::Relaxed);
    }

    /// Fail the next N connection closes.
    pub fn fail_connection_closes(&self, count: usize) {
        self.fail_next_connection_closes.store(count, Ordering::Relaxed);
    }

    /// Injected failures that have not been consumed yet, across all operations.
    pub fn pending_failures(&self) -> usize {
        [
            &self.fail_next_sends,
            &self.fail_next_shutdowns,
            &self.fail_next_client_closes,
            &self.fail_next_connection_closes,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::Relaxed))
        .sum()
    }

    pub(crate) fn publish_latency(&self) -> Duration {
        Duration::from_nanos(self.publish_latency_ns.load(Ordering::Relaxed))
    }

    pub(crate) fn should_fail_send(&self) -> bool {
        take(&self.fail_next_sends)
    }

    pub(crate) fn should_fail_shutdown(&self) -> bool {
        take(&self.fail_next_shutdowns)
    }

    pub(crate) fn should_fail_client_close(&self) -> bool {
        take(&self.fail_next_client_closes)
    }

    pub(crate) fn should_fail_connection_close(&self) -> bool {
        take(&self.fail_next_connection_closes)
    }
}

/// Decrement the counter if it is non-zero. Returns whether a failure was consumed.
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}
