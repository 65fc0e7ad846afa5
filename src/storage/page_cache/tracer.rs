use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for page cache activity
#[derive(Debug, Default)]
pub struct PageCacheTracer {
    pins: AtomicU64,
    faults: AtomicU64,
    evictions: AtomicU64,
    flushes: AtomicU64,
}

impl PageCacheTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self) {
        self.pins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evict(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pins(&self) -> u64 {
        self.pins.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Tracers handed to recovery
#[derive(Debug, Clone, Default)]
pub struct Tracers {
    pub page_cache: Arc<PageCacheTracer>,
}

impl Tracers {
    pub fn new() -> Self {
        Self::default()
    }
}
