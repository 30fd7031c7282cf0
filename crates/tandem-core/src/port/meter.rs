//! Meter ports: last-write-wins, or peak-holding with fetch-and-clear.

use super::SyncPort;
use crate::lockfree::SerialCounter;
use crate::PortDescriptor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// NaN payload marking "nothing written since the UI last fetched".
const EMPTY_WINDOW: u32 = 0x7fc0_0e3d;

pub(crate) struct MeterCell {
    bits: AtomicU32,
    serial: SerialCounter,
}

/// Backend side of a meter, written by the processing thread.
pub struct MeterPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<MeterCell>,
    peak: bool,
}

impl MeterPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>) -> Self {
        let peak = desc.is_peak();
        let initial = if peak {
            EMPTY_WINDOW
        } else {
            desc.range.default.to_bits()
        };
        Self {
            desc,
            cell: Arc::new(MeterCell {
                bits: AtomicU32::new(initial),
                serial: SerialCounter::new(),
            }),
            peak,
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    /// Publish a reading.
    ///
    /// Peak meters keep the value with the largest magnitude since the UI
    /// last fetched; the first write after a fetch always lands.
    #[inline]
    pub fn set_value(&self, value: f32) {
        if !self.peak {
            self.cell.bits.store(value.to_bits(), Ordering::Release);
            self.cell.serial.publish();
            return;
        }

        let mut current = self.cell.bits.load(Ordering::Relaxed);
        loop {
            if current != EMPTY_WINDOW && f32::from_bits(current).abs() >= value.abs() {
                return;
            }
            match self.cell.bits.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.cell.serial.publish();
    }

    /// Value as seen by the processing thread (0.0 for an empty peak window).
    pub fn value(&self) -> f32 {
        let bits = self.cell.bits.load(Ordering::Acquire);
        if bits == EMPTY_WINDOW {
            0.0
        } else {
            f32::from_bits(bits)
        }
    }

    pub(crate) fn mirror(&self) -> MeterMirror {
        MeterMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            peak: self.peak,
            value: self.desc.range.default,
            serial: self.cell.serial.cold_start(),
        }
    }
}

/// UI side of a meter.
pub struct MeterMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<MeterCell>,
    peak: bool,
    value: f32,
    serial: u32,
}

impl SyncPort for MeterMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            return false;
        };

        if self.peak {
            // Fetch-and-clear: the next DSP write opens a new window
            let bits = cell.bits.swap(EMPTY_WINDOW, Ordering::AcqRel);
            self.serial = cell.serial.load();
            if bits == EMPTY_WINDOW {
                return false;
            }
            let value = f32::from_bits(bits);
            if value.to_bits() == self.value.to_bits() {
                return false;
            }
            self.value = value;
            return true;
        }

        let serial = cell.serial.load();
        if serial == self.serial {
            return false;
        }
        self.value = f32::from_bits(cell.bits.load(Ordering::Acquire));
        self.serial = serial;
        true
    }

    fn value(&self) -> f32 {
        self.value
    }
}
