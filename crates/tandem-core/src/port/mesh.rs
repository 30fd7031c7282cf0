//! Mesh ports: multi-buffer snapshots (graphs, curves) handed from the
//! processing thread to the UI.
//!
//! The backend holds one producer buffer guarded by a four-state handoff:
//!
//! ```text
//!   EMPTY --try_write--> WRITING --commit--> DATA --try_read--> READING
//!     ^                     | (dropped)                            |
//!     +---------------------+-------------cleanup------------------+
//! ```
//!
//! The producer only writes from `EMPTY`, the consumer only reads from
//! `DATA`, and data stays "ready" until the consumer explicitly cleans up.

use super::{PortBuffer, SyncPort};
use crate::PortDescriptor;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const DATA: u8 = 2;
const READING: u8 = 3;

struct MeshData {
    buffers: Vec<Vec<f32>>,
    items: usize,
}

pub(crate) struct MeshCell {
    state: AtomicU8,
    capacity: usize,
    data: UnsafeCell<MeshData>,
}

// SAFETY: `data` is only touched by the thread that moved `state` into
// WRITING or READING with a successful compare-exchange, so accesses never
// overlap. Acquire/release on `state` orders the payload.
unsafe impl Sync for MeshCell {}

impl MeshCell {
    fn new(buffers: usize, capacity: usize) -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            capacity,
            data: UnsafeCell::new(MeshData {
                buffers: vec![vec![0.0; capacity]; buffers],
                items: 0,
            }),
        }
    }

    fn try_write(&self) -> Option<MeshWriter<'_>> {
        self.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(MeshWriter {
            cell: self,
            committed: false,
        })
    }

    fn try_read(&self) -> Option<MeshReader<'_>> {
        self.state
            .compare_exchange(DATA, READING, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(MeshReader {
            cell: self,
            cleaned: false,
        })
    }

    #[inline]
    fn contains_data(&self) -> bool {
        self.state.load(Ordering::Acquire) == DATA
    }
}

/// Exclusive write access to the producer buffer.
pub struct MeshWriter<'a> {
    cell: &'a MeshCell,
    committed: bool,
}

impl MeshWriter<'_> {
    pub fn buffers(&self) -> usize {
        // SAFETY: state is WRITING and owned by this guard.
        unsafe { (*self.cell.data.get()).buffers.len() }
    }

    /// Full-capacity slice of buffer `index`.
    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        // SAFETY: state is WRITING and owned by this guard.
        let data = unsafe { &mut *self.cell.data.get() };
        data.buffers.get_mut(index).map(|b| b.as_mut_slice())
    }

    /// Publish `items` values per buffer and hand them to the UI.
    pub fn commit(mut self, items: usize) {
        // SAFETY: state is WRITING and owned by this guard.
        unsafe {
            (*self.cell.data.get()).items = items.min(self.cell.capacity);
        }
        self.committed = true;
        self.cell.state.store(DATA, Ordering::Release);
    }
}

impl Drop for MeshWriter<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.cell.state.store(EMPTY, Ordering::Release);
        }
    }
}

struct MeshReader<'a> {
    cell: &'a MeshCell,
    cleaned: bool,
}

impl MeshReader<'_> {
    fn data(&self) -> &MeshData {
        // SAFETY: state is READING and owned by this guard.
        unsafe { &*self.cell.data.get() }
    }

    /// Mark the data consumed so the producer may write again.
    fn cleanup(mut self) {
        self.cleaned = true;
        self.cell.state.store(EMPTY, Ordering::Release);
    }
}

impl Drop for MeshReader<'_> {
    fn drop(&mut self) {
        if !self.cleaned {
            // Not consumed: leave it for the next reader
            self.cell.state.store(DATA, Ordering::Release);
        }
    }
}

/// Backend side of a mesh port.
pub struct MeshPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<MeshCell>,
}

impl MeshPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, default_items: usize) -> Self {
        let items = desc.capacity.unwrap_or(default_items);
        let cell = Arc::new(MeshCell::new(desc.buffers, items));
        Self { desc, cell }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    pub fn capacity(&self) -> usize {
        self.cell.capacity
    }

    /// True when the UI has consumed the previous snapshot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cell.state.load(Ordering::Acquire) == EMPTY
    }

    /// Start writing a snapshot. `None` while the UI still owns the last one.
    #[inline]
    pub fn try_write(&self) -> Option<MeshWriter<'_>> {
        self.cell.try_write()
    }

    pub(crate) fn mirror(&self) -> MeshMirror {
        MeshMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            buffers: vec![vec![0.0; self.cell.capacity]; self.desc.buffers],
            items: 0,
        }
    }
}

/// UI side of a mesh port: accumulator with the producer's shape.
pub struct MeshMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<MeshCell>,
    buffers: Vec<Vec<f32>>,
    items: usize,
}

impl MeshMirror {
    /// Change the accumulator shape. Copies saturate to the smaller shape.
    pub fn reshape(&mut self, buffers: usize, capacity: usize) {
        self.buffers = vec![vec![0.0; capacity]; buffers];
        self.items = 0;
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.buffers.get(index).map(|b| &b[..self.items.min(b.len())])
    }

    /// True while a snapshot is waiting to be synced.
    pub fn pending(&self) -> bool {
        self.cell.upgrade().is_some_and(|c| c.contains_data())
    }
}

impl SyncPort for MeshMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        let Some(cell) = self.cell.upgrade() else {
            return false;
        };
        let Some(reader) = cell.try_read() else {
            return false;
        };

        let data = reader.data();
        let capacity = self.buffers.first().map_or(0, |b| b.len());
        let items = data.items.min(capacity);
        for (dst, src) in self.buffers.iter_mut().zip(data.buffers.iter()) {
            dst[..items].copy_from_slice(&src[..items]);
        }
        self.items = items;

        reader.cleanup();
        true
    }

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::Mesh {
            buffers: &self.buffers,
            items: self.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(buffers: usize, items: usize) -> MeshPort {
        MeshPort::new(Arc::new(PortDescriptor::mesh("graph", buffers, items)), 0)
    }

    fn fill(port: &MeshPort, base: f32, items: usize) -> bool {
        let Some(mut writer) = port.try_write() else {
            return false;
        };
        for b in 0..writer.buffers() {
            let buf = writer.buffer_mut(b).unwrap();
            for (i, v) in buf.iter_mut().take(items).enumerate() {
                *v = base + (b * 100 + i) as f32;
            }
        }
        writer.commit(items);
        true
    }

    #[test]
    fn test_sync_copies_then_cleans_up() {
        let port = mesh(2, 8);
        let mut mirror = port.mirror();
        assert!(!mirror.sync(), "no data yet");

        assert!(fill(&port, 0.0, 4));
        assert!(!port.is_empty());
        assert!(!fill(&port, 1.0, 4), "producer blocked until consumed");

        assert!(mirror.sync());
        assert_eq!(mirror.items(), 4);
        assert_eq!(mirror.channel(1).unwrap(), &[100.0, 101.0, 102.0, 103.0]);
        assert!(port.is_empty());
        assert!(!mirror.sync(), "no double delivery");
    }

    #[test]
    fn test_abandoned_write_releases_buffer() {
        let port = mesh(1, 4);
        drop(port.try_write().unwrap());
        assert!(port.is_empty());
        assert!(!port.mirror().sync());
    }

    #[test]
    fn test_channel_mismatch_saturates() {
        let port = mesh(3, 8);
        let mut mirror = port.mirror();
        mirror.reshape(2, 4);

        fill(&port, 0.0, 8);
        assert!(mirror.sync());
        assert_eq!(mirror.items(), 4);
        assert_eq!(mirror.channel(1).unwrap(), &[100.0, 101.0, 102.0, 103.0]);
        assert!(mirror.channel(2).is_none());

        mirror.reshape(4, 8);
        fill(&port, 0.0, 2);
        assert!(mirror.sync());
        assert_eq!(mirror.channel(2).unwrap(), &[200.0, 201.0]);
        assert_eq!(mirror.channel(3).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_cross_thread_handoff() {
        let port = Arc::new(mesh(1, 16));
        let mut mirror = port.mirror();
        let producer = Arc::clone(&port);

        let handle = std::thread::spawn(move || {
            let mut written = 0;
            while written < 100 {
                if fill(&producer, written as f32, 16) {
                    written += 1;
                }
                std::hint::spin_loop();
            }
        });

        let mut received = 0;
        while received < 100 {
            if mirror.sync() {
                let ch = mirror.channel(0).unwrap();
                // Whole snapshot comes from one write
                assert_eq!(ch[15] - ch[0], 15.0);
                received += 1;
            }
        }
        handle.join().unwrap();
    }
}
