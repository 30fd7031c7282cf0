//! Frame buffer ports: a rows x cols ring of fixed-width rows (spectrograms,
//! scrolling displays). Same copy-then-validate protocol as streams, with
//! one row of headroom for the row being written.

use super::{PortBuffer, SyncPort};
use crate::lockfree::SerialCounter;
use crate::PortDescriptor;
use atomic_float::AtomicF32;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub(crate) struct FrameBufferCell {
    data: Box<[AtomicF32]>,
    rows: usize,
    cols: usize,
    /// Rows committed since creation.
    head: AtomicU64,
    serial: SerialCounter,
}

impl FrameBufferCell {
    #[inline]
    fn safe_from(&self, head: u64) -> u64 {
        (head + 1).saturating_sub(self.rows as u64)
    }

    #[inline]
    fn row(&self, id: u64) -> &[AtomicF32] {
        let start = (id % self.rows as u64) as usize * self.cols;
        &self.data[start..start + self.cols]
    }
}

/// Backend side of a frame buffer.
pub struct FrameBufferPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<FrameBufferCell>,
}

impl FrameBufferPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, default_rows: usize) -> Self {
        let rows = if desc.rows == 0 { default_rows } else { desc.rows }.max(2);
        let cols = desc.buffers;
        let cell = Arc::new(FrameBufferCell {
            data: (0..rows * cols).map(|_| AtomicF32::new(0.0)).collect(),
            rows,
            cols,
            head: AtomicU64::new(0),
            serial: SerialCounter::new(),
        });
        Self { desc, cell }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    pub fn rows(&self) -> usize {
        self.cell.rows
    }

    pub fn cols(&self) -> usize {
        self.cell.cols
    }

    /// Id the next written row will get.
    pub fn next_row_id(&self) -> u64 {
        self.cell.head.load(Ordering::Relaxed)
    }

    /// Append one row. Short input is zero-padded, long input truncated.
    #[inline]
    pub fn write_row(&mut self, data: &[f32]) {
        let head = self.cell.head.load(Ordering::Relaxed);
        fence(Ordering::Release);

        let row = self.cell.row(head);
        for (i, cell) in row.iter().enumerate() {
            cell.store(data.get(i).copied().unwrap_or(0.0), Ordering::Relaxed);
        }

        self.cell.head.store(head + 1, Ordering::Release);
        self.cell.serial.publish();
    }

    pub(crate) fn mirror(&self) -> FrameBufferMirror {
        FrameBufferMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            data: vec![0.0; self.cell.rows * self.cell.cols],
            rows: self.cell.rows,
            cols: self.cell.cols,
            head: 0,
            valid_from: 0,
        }
    }
}

/// UI side of a frame buffer.
pub struct FrameBufferMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<FrameBufferCell>,
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    head: u64,
    valid_from: u64,
}

impl FrameBufferMirror {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Id of the newest row, `None` before the first row arrived.
    pub fn last_row_id(&self) -> Option<u64> {
        self.head.checked_sub(1)
    }

    /// Id of the oldest row still held.
    pub fn first_row_id(&self) -> u64 {
        self.valid_from
            .max(self.head.saturating_sub(self.rows as u64))
    }

    /// Row by absolute id, if still held by the mirror.
    pub fn row(&self, id: u64) -> Option<&[f32]> {
        if id < self.first_row_id() || id >= self.head {
            return None;
        }
        let start = (id % self.rows as u64) as usize * self.cols;
        Some(&self.data[start..start + self.cols])
    }
}

impl SyncPort for FrameBufferMirror {
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

        let from = self.head.max(cell.safe_from(head));
        for id in from..head {
            let start = (id % self.rows as u64) as usize * self.cols;
            let dst = &mut self.data[start..start + self.cols];
            for (out, src) in dst.iter_mut().zip(cell.row(id)) {
                *out = src.load(Ordering::Relaxed);
            }
        }

        fence(Ordering::Acquire);
        let after = cell.head.load(Ordering::Relaxed);
        let valid = from.max(cell.safe_from(after)).min(head);

        if valid > self.head {
            self.valid_from = valid;
        }
        self.head = head;
        true
    }

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::Frames(self)
    }
}
