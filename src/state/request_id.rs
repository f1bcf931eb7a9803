use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::{format_completion_id, mix_u64};

/// Per-process completion-id generator. A random seed keeps ids from being
/// guessable across restarts; the counter keeps them unique within one.
pub(crate) struct CompletionIdGenerator {
    seed: u64,
    counter: AtomicU64,
}

impl CompletionIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            seed: fastrand::u64(..),
            counter: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub(crate) fn next(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format_completion_id(mix_u64(self.seed ^ seq))
    }
}
