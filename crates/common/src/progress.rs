//! Progress listener trait and implementations.
//!
//! Listeners are invoked synchronously on the scanning thread, so a slow
//! listener slows the scan down.

use std::fmt;
use std::sync::Arc;

/// Receives progress notifications from a directory scan.
pub trait ProgressListener: Send + Sync {
    /// Called once for every file or directory the scanner has finished with.
    fn on_progress_tick(&self);

    /// Called once after traversal of the scan root finishes.
    fn on_scan_complete(&self) {}
}

/// A listener that forwards ticks to a closure.
pub struct FnProgress<F> {
    callback: F,
}

impl<F> FnProgress<F>
where
    F: Fn() + Send + Sync,
{
    /// Create a new closure-based listener.
    ///
    /// # Arguments
    /// * `callback` - Closure invoked on every progress tick
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressListener for FnProgress<F>
where
    F: Fn() + Send + Sync,
{
    fn on_progress_tick(&self) {
        (self.callback)()
    }
}

/// Create a tick listener from a closure.
///
/// # Arguments
/// * `f` - Closure invoked on every progress tick
pub fn progress_fn<F>(f: F) -> FnProgress<F>
where
    F: Fn() + Send + Sync,
{
    FnProgress::new(f)
}

/// The set of listeners subscribed to a scan.
///
/// Every registered listener receives every notification, in
/// registration order.
#[derive(Clone, Default)]
pub struct ProgressListeners {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl ProgressListeners {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener.
    pub fn add(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    /// Deliver one progress tick to every listener.
    pub fn tick(&self) {
        for listener in &self.listeners {
            listener.on_progress_tick();
        }
    }

    /// Tell every listener the scan has concluded.
    pub fn conclude(&self) {
        for listener in &self.listeners {
            listener.on_scan_complete();
        }
    }
}

impl fmt::Debug for ProgressListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingListener {
        ticks: AtomicU64,
        completions: AtomicU64,
    }

    impl ProgressListener for CountingListener {
        fn on_progress_tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_scan_complete(&self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fn_progress_captures_state() {
        let counter: Arc<AtomicU64> = Arc::new(AtomicU64::new(0));
        let counter_clone: Arc<AtomicU64> = counter.clone();

        let listener = progress_fn(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        listener.on_progress_tick();
        listener.on_progress_tick();
        listener.on_scan_complete();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registry_delivers_to_every_listener() {
        let first: Arc<CountingListener> = Arc::new(CountingListener::default());
        let second: Arc<CountingListener> = Arc::new(CountingListener::default());

        let mut listeners: ProgressListeners = ProgressListeners::new();
        listeners.add(first.clone());
        listeners.add(second.clone());

        listeners.tick();
        listeners.tick();
        listeners.tick();
        listeners.conclude();

        for listener in [&first, &second] {
            assert_eq!(listener.ticks.load(Ordering::SeqCst), 3);
            assert_eq!(listener.completions.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_empty_registry() {
        let listeners: ProgressListeners = ProgressListeners::new();
        assert_eq!(format!("{:?}", listeners), "ProgressListeners { count: 0 }");
        listeners.tick();
        listeners.conclude();
    }
}
