//! Deferred destruction of samples.
//!
//! The processing thread must never free a sample. It pushes retired samples
//! onto a [`GcList`]; a background task later takes the whole list in one
//! atomic swap and drops it.

use crate::Sample;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Lock-free stack of retired samples, linked through the samples
/// themselves. Pushing never allocates.
#[derive(Debug)]
pub struct GcList {
    head: AtomicPtr<Sample>,
}

impl Default for GcList {
    fn default() -> Self {
        Self::new()
    }
}

impl GcList {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Retire `sample`. Safe from any thread, including the audio thread.
    pub fn push(&self, sample: Box<Sample>) {
        let node = Box::into_raw(sample);
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` came from `Box::into_raw` and is not shared until
            // the exchange below publishes it.
            unsafe { (*node).gc_next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
    }

    /// Take ownership of everything pushed so far.
    pub fn take_all(&self) -> GcBatch {
        GcBatch {
            head: self.head.swap(ptr::null_mut(), Ordering::Acquire),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl Drop for GcList {
    fn drop(&mut self) {
        drop(self.take_all());
    }
}

/// Samples detached from a [`GcList`]. Dropping the batch frees them.
#[derive(Debug)]
pub struct GcBatch {
    head: *mut Sample,
}

// SAFETY: the batch exclusively owns every node reachable from `head`.
unsafe impl Send for GcBatch {}

impl GcBatch {
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }
}

impl Iterator for GcBatch {
    type Item = Box<Sample>;

    fn next(&mut self) -> Option<Box<Sample>> {
        if self.head.is_null() {
            return None;
        }
        // SAFETY: nodes in the chain were produced by `Box::into_raw` in
        // `GcList::push` and are owned by this batch alone.
        let sample = unsafe { Box::from_raw(self.head) };
        self.head = sample.gc_next.swap(ptr::null_mut(), Ordering::Relaxed);
        Some(sample)
    }
}

impl Drop for GcBatch {
    fn drop(&mut self) {
        for sample in self.by_ref() {
            drop(sample);
        }
    }
}
