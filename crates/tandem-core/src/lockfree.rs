//! Lock-free primitives shared by backend and mirror ports.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn get_relaxed(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn set_relaxed(&self, value: f32) {
        self.value.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn swap(&self, value: f32) -> f32 {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Per-port change counter ("SID").
///
/// Writers store the payload first and then call [`publish`](Self::publish);
/// readers [`load`](Self::load) the counter and only then read the payload.
/// The release/acquire pair guarantees that a reader observing a new serial
/// also observes the payload written before it. Values wrap around, so only
/// inequality is meaningful, and only between reads of the same port.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct SerialCounter {
    value: AtomicU32,
}

impl SerialCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    /// Current serial (acquire).
    #[inline]
    pub fn load(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Commit a payload write. Returns the new serial.
    #[inline]
    pub fn publish(&self) -> u32 {
        self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Serial a freshly created reader should remember so that its first
    /// comparison reports a change.
    #[inline]
    pub fn cold_start(&self) -> u32 {
        self.load().wrapping_sub(1)
    }
}
