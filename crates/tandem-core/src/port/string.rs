//! String and path ports.
//!
//! Text lives in a fixed-capacity [`StringSlot`] guarded by a sequence lock.
//! Writers truncate to exactly `capacity` bytes and NUL-terminate; readers
//! copy and retry if a write overlapped. The slot serial is `sequence / 2`.

use super::{PortBuffer, SyncPort};
use crate::lockfree::AtomicFlag;
use crate::{PortDescriptor, Role, Status};
use std::sync::atomic::{fence, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Attempts a reader makes before giving up until the next poll.
const READ_ATTEMPTS: usize = 16;

/// Slot serials only reach `u32::MAX / 2`.
const NOT_COMMITTED: u32 = u32::MAX;

/// Fixed-capacity text slot shared between threads.
pub struct StringSlot {
    bytes: Box<[AtomicU8]>,
    len: AtomicUsize,
    seq: AtomicU32,
}

impl StringSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: (0..=capacity).map(|_| AtomicU8::new(0)).collect(),
            len: AtomicUsize::new(0),
            seq: AtomicU32::new(0),
        }
    }

    /// Maximum stored length in bytes, excluding the terminator.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len() - 1
    }

    #[inline]
    pub fn serial(&self) -> u32 {
        self.seq.load(Ordering::Acquire) / 2
    }

    /// Store `value`, waiting for a concurrent writer to finish.
    /// Returns the stored length and the serial of the new value. Not for
    /// the audio thread.
    pub fn submit(&self, value: &[u8]) -> (usize, u32) {
        let seq = loop {
            if let Some(seq) = self.try_lock() {
                break seq;
            }
            std::hint::spin_loop();
        };
        self.store(seq, value)
    }

    /// Store `value` unless another writer holds the slot.
    pub fn try_submit(&self, value: &[u8]) -> Option<(usize, u32)> {
        let seq = self.try_lock()?;
        Some(self.store(seq, value))
    }

    fn try_lock(&self) -> Option<u32> {
        let seq = self.seq.load(Ordering::Relaxed);
        if seq & 1 != 0 {
            return None;
        }
        self.seq
            .compare_exchange_weak(seq, seq + 1, Ordering::Relaxed, Ordering::Relaxed)
            .ok()?;
        fence(Ordering::Release);
        Some(seq)
    }

    fn store(&self, seq: u32, value: &[u8]) -> (usize, u32) {
        let n = value.len().min(self.capacity());
        for (dst, &b) in self.bytes.iter().zip(&value[..n]) {
            dst.store(b, Ordering::Relaxed);
        }
        self.bytes[n].store(0, Ordering::Relaxed);
        self.len.store(n, Ordering::Relaxed);
        let next = seq.wrapping_add(2);
        self.seq.store(next, Ordering::Release);
        (n, next / 2)
    }

    /// Copy the current value and its terminator into `dst`.
    ///
    /// Returns `(length, serial)`, or `None` if writers kept the slot busy.
    /// `dst` must hold `capacity() + 1` bytes to receive the full value.
    pub fn read(&self, dst: &mut [u8]) -> Option<(usize, u32)> {
        if dst.is_empty() {
            return None;
        }
        for _ in 0..READ_ATTEMPTS {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }

            let len = self
                .len
                .load(Ordering::Relaxed)
                .min(self.capacity())
                .min(dst.len().saturating_sub(1));
            for (out, src) in dst.iter_mut().zip(&self.bytes[..=len]) {
                *out = src.load(Ordering::Relaxed);
            }
            dst[len] = 0;

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return Some((len, before / 2));
            }
        }
        None
    }
}

/// Longest valid UTF-8 prefix. Truncation may split a character.
fn utf8_prefix(bytes: &[u8]) -> &str {
    match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    }
}

pub(crate) struct StringCell {
    slot: StringSlot,
    /// Submit flags attached to the last UI write (path ports).
    flags: AtomicU32,
    /// Serial of the last value the DSP finished handling.
    committed: AtomicU32,
    edited: AtomicFlag,
}

/// Backend side of a string or path port.
///
/// The processing thread keeps its own copy of the text; it never allocates
/// after construction.
pub struct StringPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<StringCell>,
    local: Vec<u8>,
    len: usize,
    accepted: u32,
    flags: u32,
}

impl StringPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, default_capacity: usize) -> Self {
        let capacity = desc.capacity.unwrap_or(default_capacity);
        let cell = Arc::new(StringCell {
            slot: StringSlot::new(capacity),
            flags: AtomicU32::new(0),
            committed: AtomicU32::new(NOT_COMMITTED),
            edited: AtomicFlag::new(false),
        });
        let accepted = cell.slot.serial();
        Self {
            desc,
            cell,
            local: vec![0; capacity + 1],
            len: 0,
            accepted,
            flags: 0,
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    pub fn capacity(&self) -> usize {
        self.cell.slot.capacity()
    }

    /// Text last accepted by the processing thread.
    pub fn value(&self) -> &str {
        utf8_prefix(&self.local[..self.len])
    }

    /// Flags submitted along with the accepted value.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// A value newer than the accepted one is waiting.
    #[inline]
    pub fn pending(&self) -> bool {
        self.cell.slot.serial() != self.accepted
    }

    /// Take the pending value into the local copy. Returns false if nothing
    /// is pending or the writer is busy (retry next block).
    pub fn accept(&mut self) -> bool {
        if !self.pending() {
            return false;
        }
        let flags = self.cell.flags.load(Ordering::Acquire);
        match self.cell.slot.read(&mut self.local) {
            Some((len, serial)) => {
                self.len = len;
                self.accepted = serial;
                self.flags = flags;
                true
            }
            None => false,
        }
    }

    /// Report the accepted value as handled (a path finished loading).
    pub fn commit(&self) {
        self.cell.committed.store(self.accepted, Ordering::Release);
    }

    /// Accept then commit in one step, for plain string ports.
    pub fn changed(&mut self) -> bool {
        if !self.accept() {
            return false;
        }
        self.commit();
        true
    }

    /// Store text from the processing thread. Never waits: reports
    /// `BadState` if the UI is writing at the same moment.
    pub fn set_value(&mut self, value: &str) -> Status {
        match self.cell.slot.try_submit(value.as_bytes()) {
            Some((len, serial)) => {
                self.local[..len].copy_from_slice(&value.as_bytes()[..len]);
                self.local[len] = 0;
                self.len = len;
                self.accepted = serial;
                Status::Ok
            }
            None => Status::BadState,
        }
    }

    pub fn take_edited(&self) -> bool {
        self.cell.edited.swap(false)
    }

    pub(crate) fn mirror(&self) -> StringMirror {
        let capacity = self.capacity();
        StringMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            scratch: vec![0; capacity + 1],
            text: String::with_capacity(capacity),
            serial: self.cell.slot.serial().wrapping_sub(1),
        }
    }
}

/// UI side of a string or path port.
pub struct StringMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<StringCell>,
    scratch: Vec<u8>,
    text: String,
    serial: u32,
}

impl StringMirror {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Store a path together with host-defined submit flags.
    ///
    /// `BadState` on output ports, which only the processing thread writes.
    pub fn submit(&mut self, value: &str, flags: u32) -> Status {
        if self.desc.is_output() {
            return Status::BadState;
        }
        let Some(cell) = self.cell.upgrade() else {
            return Status::NoData;
        };
        cell.flags.store(flags, Ordering::Release);
        let (len, serial) = cell.slot.submit(value.as_bytes());
        cell.edited.set(true);

        self.text.clear();
        self.text.push_str(utf8_prefix(&value.as_bytes()[..len]));
        // Only our own value is skipped; a later DSP write still syncs
        self.serial = serial;
        Status::Ok
    }

    /// The processing thread has committed the latest submitted value.
    pub fn committed(&self) -> bool {
        self.cell.upgrade().is_some_and(|cell| {
            cell.committed.load(Ordering::Acquire) == cell.slot.serial()
        })
    }

    pub fn is_path(&self) -> bool {
        self.desc.role == Role::Path
    }
}

impl SyncPort for StringMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            return false;
        };
        if cell.slot.serial() == self.serial {
            return false;
        }
        let Some((len, serial)) = cell.slot.read(&mut self.scratch) else {
            return false;
        };
        self.text.clear();
        self.text.push_str(&String::from_utf8_lossy(&self.scratch[..len]));
        self.serial = serial;
        true
    }

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::Text(&self.text)
    }

    fn write(&mut self, data: &[u8]) -> Status {
        let Ok(text) = std::str::from_utf8(data) else {
            return Status::BadArguments;
        };
        self.submit(text, 0)
    }
}
