//! Scalar control ports (controls, output controls, bypass, port sets).

use super::SyncPort;
use crate::lockfree::{AtomicFlag, AtomicFloat, SerialCounter};
use crate::{PortDescriptor, Role};
use std::sync::{Arc, Weak};

pub(crate) struct ControlCell {
    value: AtomicFloat,
    serial: SerialCounter,
    edited: AtomicFlag,
}

impl ControlCell {
    /// Store then publish, so a reader seeing the new serial sees the value.
    #[inline]
    fn commit(&self, value: f32) -> u32 {
        self.value.set(value);
        self.serial.publish()
    }
}

/// Backend side of a scalar port, owned by the processing thread.
pub struct ControlPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<ControlCell>,
    seen: u32,
}

impl ControlPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>) -> Self {
        let initial = desc.limit(desc.range.default);
        let cell = Arc::new(ControlCell {
            value: AtomicFloat::new(initial),
            serial: SerialCounter::new(),
            edited: AtomicFlag::new(false),
        });
        let seen = cell.serial.load();
        Self { desc, cell, seen }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.cell.value.get()
    }

    /// Store a value coming from the DSP (output controls) or from host
    /// automation (input controls). The value is limited to the port range.
    #[inline]
    pub fn set_value(&self, value: f32) {
        self.cell.commit(self.desc.limit(value));
    }

    /// True once per batch of writes since the last call.
    #[inline]
    pub fn changed(&mut self) -> bool {
        let serial = self.cell.serial.load();
        if serial == self.seen {
            return false;
        }
        self.seen = serial;
        true
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.cell.serial.load()
    }

    /// Consume the "edited from the UI" mark.
    pub fn take_edited(&self) -> bool {
        self.cell.edited.swap(false)
    }

    /// Host-facing bypass switch; the port itself stores "enabled".
    pub fn set_bypass(&self, bypassed: bool) {
        debug_assert_eq!(self.desc.role, Role::Bypass);
        self.cell.commit(if bypassed { 0.0 } else { 1.0 });
    }

    pub fn bypassed(&self) -> bool {
        self.value() < 0.5
    }

    pub(crate) fn mirror(&self) -> ControlMirror {
        ControlMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            value: self.desc.range.default,
            serial: self.cell.serial.cold_start(),
        }
    }
}

/// UI side of a scalar port.
pub struct ControlMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<ControlCell>,
    value: f32,
    serial: u32,
}

impl SyncPort for ControlMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            return false;
        };
        let serial = cell.serial.load();
        if serial == self.serial {
            return false;
        }
        self.value = cell.value.get();
        self.serial = serial;
        true
    }

    fn value(&self) -> f32 {
        self.value
    }

    /// Writes straight through to the backend. Output ports ignore it.
    fn set_value(&mut self, value: f32) {
        if self.desc.is_output() {
            return;
        }
        let value = self.desc.limit(value);
        self.value = value;
        if let Some(cell) = self.cell.upgrade() {
            // Adopt our own serial so the write does not echo back on sync()
            self.serial = cell.commit(value);
            cell.edited.set(true);
        }
    }
}
