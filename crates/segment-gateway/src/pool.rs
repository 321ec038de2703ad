//! Bounded read/write worker pools (spec.md §4.1/§5), grounded on
//! `ExecutorConfig` in `original_source/src/config/constants.py`
//! (`READ_WORKERS=30`, `WRITE_WORKERS=20`). A real thread-pool executor
//! doesn't translate to async Rust; a semaphore gating concurrent in-flight
//! calls is the direct equivalent for a `tokio`-scheduled gateway.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub const READ_WORKERS: usize = 30;
pub const WRITE_WORKERS: usize = 20;

pub struct WorkerPools {
    reads: Arc<Semaphore>,
    writes: Arc<Semaphore>,
}

impl Default for WorkerPools {
    fn default() -> Self {
        Self::new(READ_WORKERS, WRITE_WORKERS)
    }
}

impl WorkerPools {
    pub fn new(read_workers: usize, write_workers: usize) -> Self {
        Self {
            reads: Arc::new(Semaphore::new(read_workers)),
            writes: Arc::new(Semaphore::new(write_workers)),
        }
    }

    pub async fn acquire_read(&self) -> SemaphorePermit<'_> {
        self.reads.acquire().await.expect("read semaphore never closed")
    }

    pub async fn acquire_write(&self) -> SemaphorePermit<'_> {
        self.writes.acquire().await.expect("write semaphore never closed")
    }
}
