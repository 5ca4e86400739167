use std::sync::atomic::{AtomicUsize, Ordering};

// 0 means "not configured yet".
static WORKER_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Number of worker threads the analysis pool should use. Defaults to half
/// the available hardware threads, with a floor of one.
pub fn worker_threads() -> usize {
    match WORKER_THREADS.load(Ordering::Relaxed) {
        0 => std::cmp::max(1, num_cpus::get() / 2),
        n => n,
    }
}

/// Override the worker pool size (the `-n` flag).
pub fn set_worker_threads(n: usize) {
    WORKER_THREADS.store(n, Ordering::Relaxed);
}
