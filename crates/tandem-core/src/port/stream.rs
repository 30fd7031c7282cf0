//! Stream ports: multi-channel append-only sample rings (oscilloscopes,
//! waveform strips).
//!
//! The producer appends frames of up to `capacity / 4` samples per channel.
//! Cells are atomics, so the UI may read while the DSP writes; a reader
//! detects samples overwritten during its copy by re-reading the head after
//! an acquire fence and discards them.

use super::{PortBuffer, SyncPort};
use crate::lockfree::SerialCounter;
use crate::PortDescriptor;
use atomic_float::AtomicF32;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub(crate) struct StreamCell {
    channels: Box<[Box<[AtomicF32]>]>,
    capacity: usize,
    max_frame: usize,
    /// Samples committed per channel since creation.
    head: AtomicU64,
    frames: SerialCounter,
}

impl StreamCell {
    fn new(channels: usize, capacity: usize) -> Self {
        let capacity = capacity.max(4);
        Self {
            channels: (0..channels)
                .map(|_| (0..capacity).map(|_| AtomicF32::new(0.0)).collect())
                .collect(),
            capacity,
            max_frame: capacity / 4,
            head: AtomicU64::new(0),
            frames: SerialCounter::new(),
        }
    }

    /// Oldest position that a frame still being written cannot touch.
    #[inline]
    fn safe_from(&self, head: u64) -> u64 {
        (head + self.max_frame as u64).saturating_sub(self.capacity as u64)
    }
}

/// Backend side of a stream port.
pub struct StreamPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<StreamCell>,
    pending: usize,
}

impl StreamPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, default_capacity: usize) -> Self {
        let capacity = desc.capacity.unwrap_or(default_capacity);
        let cell = Arc::new(StreamCell::new(desc.buffers, capacity));
        Self {
            desc,
            cell,
            pending: 0,
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    pub fn channels(&self) -> usize {
        self.cell.channels.len()
    }

    /// Largest frame a single `begin` accepts.
    pub fn max_frame_size(&self) -> usize {
        self.cell.max_frame
    }

    /// Samples committed per channel since creation.
    pub fn head(&self) -> u64 {
        self.cell.head.load(Ordering::Relaxed)
    }

    /// Open a frame of `size` samples per channel. Returns the accepted size.
    ///
    /// Channels not written before [`commit`](Self::commit) keep whatever the
    /// ring held at those positions.
    #[inline]
    pub fn begin(&mut self, size: usize) -> usize {
        self.pending = size.min(self.cell.max_frame);
        // Pairs with the reader's acquire fence: a reader that sees any
        // sample of this frame also sees the previous head bump.
        fence(Ordering::Release);
        self.pending
    }

    /// Write the first samples of the open frame for one channel.
    #[inline]
    pub fn write(&mut self, channel: usize, data: &[f32]) -> usize {
        let Some(ring) = self.cell.channels.get(channel) else {
            return 0;
        };
        let n = data.len().min(self.pending);
        let head = self.cell.head.load(Ordering::Relaxed);
        let cap = self.cell.capacity;
        let start = (head % cap as u64) as usize;
        for (i, &value) in data[..n].iter().enumerate() {
            ring[(start + i) % cap].store(value, Ordering::Relaxed);
        }
        n
    }

    /// Publish the open frame.
    #[inline]
    pub fn commit(&mut self) {
        if self.pending == 0 {
            return;
        }
        let head = self.cell.head.load(Ordering::Relaxed);
        self.cell
            .head
            .store(head + self.pending as u64, Ordering::Release);
        self.cell.frames.publish();
        self.pending = 0;
    }

    pub(crate) fn mirror(&self) -> StreamMirror {
        let cap = self.cell.capacity;
        StreamMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            channels: vec![vec![0.0; cap]; self.cell.channels.len()],
            head: 0,
            valid_from: 0,
            frames: self.cell.frames.cold_start(),
        }
    }
}

/// UI side of a stream port: keeps its own ring of the same capacity,
/// indexed by the same absolute sample positions as the backend.
pub struct StreamMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<StreamCell>,
    channels: Vec<Vec<f32>>,
    head: u64,
    valid_from: u64,
    frames: u32,
}

impl StreamMirror {
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn capacity(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// Absolute position one past the newest sample.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Number of valid samples per channel held by the mirror.
    pub fn available(&self) -> usize {
        let oldest = self
            .valid_from
            .max(self.head.saturating_sub(self.capacity() as u64));
        (self.head - oldest) as usize
    }

    /// Frame serial observed by the last sync.
    pub fn frame_id(&self) -> u32 {
        self.frames
    }

    /// Copy the newest samples of one channel, oldest first.
    /// Returns the number of samples written to `dst`.
    pub fn read_last(&self, channel: usize, dst: &mut [f32]) -> usize {
        let Some(ring) = self.channels.get(channel) else {
            return 0;
        };
        let n = dst.len().min(self.available());
        let cap = ring.len() as u64;
        let start = self.head - n as u64;
        for (i, out) in dst[..n].iter_mut().enumerate() {
            *out = ring[((start + i as u64) % cap) as usize];
        }
        n
    }
}

impl SyncPort for StreamMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            return false;
        };
        let head = cell.head.load(Ordering::Acquire);
        if head == self.head {
            return false;
        }

        let cap = cell.capacity as u64;
        let from = self.head.max(cell.safe_from(head));
        for (dst, src) in self.channels.iter_mut().zip(cell.channels.iter()) {
            for pos in from..head {
                let idx = (pos % cap) as usize;
                dst[idx] = src[idx].load(Ordering::Relaxed);
            }
        }

        // Anything the producer reached while we were copying is torn.
        fence(Ordering::Acquire);
        let after = cell.head.load(Ordering::Relaxed);
        let valid = from.max(cell.safe_from(after)).min(head);

        if valid > self.head {
            self.valid_from = valid;
        }
        self.head = head;
        self.frames = cell.frames.load();
        true
    }

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::Stream(self)
    }
}
