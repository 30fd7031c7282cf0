//! OSC ports: a single-producer single-consumer queue of raw packets.
//!
//! Packets travel through a byte ring as `[len: u32 LE][payload]`. A port
//! carries one direction: `osc_in` ports are written by the UI and drained
//! by the DSP, `osc_out` ports the other way round. The writer and reader
//! ends are created together and the mirror claims its end once.

use super::{PortBuffer, SyncPort};
use crate::{PortDescriptor, Status};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::{Arc, Weak};

const HEADER: usize = 4;

/// Initial size of the mirror's receive buffer.
const MIRROR_BUFFER: usize = 256;

/// Writing end of a packet queue.
pub struct OscWriter {
    prod: HeapProd<u8>,
}

impl OscWriter {
    /// Queue one packet. Never blocks; `Overflow` if it does not fit.
    pub fn submit(&mut self, packet: &[u8]) -> Status {
        if packet.is_empty() {
            return Status::BadArguments;
        }
        let Ok(len) = u32::try_from(packet.len()) else {
            return Status::Overflow;
        };
        if self.prod.vacant_len() < HEADER + packet.len() {
            return Status::Overflow;
        }
        self.prod.push_slice(&len.to_le_bytes());
        self.prod.push_slice(packet);
        Status::Ok
    }

    pub fn vacant(&self) -> usize {
        self.prod.vacant_len()
    }
}

/// Reading end of a packet queue.
pub struct OscReader {
    cons: HeapCons<u8>,
}

impl OscReader {
    /// Size of the next packet, if one has arrived whole.
    pub fn peek_size(&self) -> Option<usize> {
        let occupied = self.cons.occupied_len();
        if occupied < HEADER {
            return None;
        }
        let mut header = [0u8; HEADER];
        for (dst, src) in header.iter_mut().zip(self.cons.iter()) {
            *dst = *src;
        }
        let size = u32::from_le_bytes(header) as usize;
        // The header is published before the payload
        (occupied - HEADER >= size).then_some(size)
    }

    /// Pop the next packet into `dst`.
    ///
    /// `NoData` when the queue is empty; `Overflow` when `dst` is smaller
    /// than the packet, which then stays queued.
    pub fn fetch(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
        let size = self.peek_size().ok_or(Status::NoData)?;
        if size > dst.len() {
            return Err(Status::Overflow);
        }
        self.cons.skip(HEADER);
        Ok(self.cons.pop_slice(&mut dst[..size]))
    }

    /// Drop the next packet. Returns its size.
    pub fn skip(&mut self) -> Option<usize> {
        let size = self.peek_size()?;
        self.cons.skip(HEADER + size);
        Some(size)
    }

    /// True while at least one packet is queued.
    pub fn pending(&self) -> bool {
        self.peek_size().is_some()
    }

    pub fn clear(&mut self) {
        let n = self.cons.occupied_len();
        self.cons.skip(n);
    }
}

fn queue(capacity: usize) -> (OscWriter, OscReader) {
    let (prod, cons) = HeapRb::<u8>::new(capacity).split();
    (OscWriter { prod }, OscReader { cons })
}

/// The UI end, parked here until the mirror claims it.
enum UiEnd {
    Writer(OscWriter),
    Reader(OscReader),
}

pub(crate) struct OscCell {
    ui_end: Mutex<Option<UiEnd>>,
}

enum DspEnd {
    Writer(OscWriter),
    Reader(OscReader),
}

/// Backend side of an OSC port, owned by the processing thread.
pub struct OscPort {
    desc: Arc<PortDescriptor>,
    cell: Arc<OscCell>,
    end: DspEnd,
}

impl OscPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, default_capacity: usize) -> Self {
        let capacity = desc.capacity.unwrap_or(default_capacity);
        let (writer, reader) = queue(capacity);
        let (end, ui_end) = if desc.is_output() {
            (DspEnd::Writer(writer), UiEnd::Reader(reader))
        } else {
            (DspEnd::Reader(reader), UiEnd::Writer(writer))
        };
        Self {
            desc,
            cell: Arc::new(OscCell {
                ui_end: Mutex::new(Some(ui_end)),
            }),
            end,
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    /// Queue a packet towards the UI (`osc_out` ports).
    pub fn submit(&mut self, packet: &[u8]) -> Status {
        match &mut self.end {
            DspEnd::Writer(writer) => writer.submit(packet),
            DspEnd::Reader(_) => Status::BadState,
        }
    }

    /// Reading end for `osc_in` ports.
    pub fn reader(&mut self) -> Option<&mut OscReader> {
        match &mut self.end {
            DspEnd::Reader(reader) => Some(reader),
            DspEnd::Writer(_) => None,
        }
    }

    /// Pop one packet coming from the UI (`osc_in` ports).
    pub fn fetch(&mut self, dst: &mut [u8]) -> Result<usize, Status> {
        match &mut self.end {
            DspEnd::Reader(reader) => reader.fetch(dst),
            DspEnd::Writer(_) => Err(Status::BadState),
        }
    }

    pub(crate) fn mirror(&self) -> OscMirror {
        let end = self.cell.ui_end.lock().take();
        if end.is_none() {
            tracing::warn!("OSC port '{}' already mirrored", self.desc.id);
        }
        OscMirror {
            desc: Arc::clone(&self.desc),
            cell: Arc::downgrade(&self.cell),
            end,
            packet: Vec::with_capacity(MIRROR_BUFFER),
            scratch: vec![0; MIRROR_BUFFER],
        }
    }
}

/// UI side of an OSC port.
///
/// For `osc_out` ports every `sync()` pops one packet into [`packet`](Self::packet);
/// loop on `sync_again()` to drain the backlog in one tick.
pub struct OscMirror {
    desc: Arc<PortDescriptor>,
    cell: Weak<OscCell>,
    end: Option<UiEnd>,
    packet: Vec<u8>,
    scratch: Vec<u8>,
}

impl OscMirror {
    /// Last packet received by `sync()`.
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    /// Current receive buffer size.
    pub fn buffer_size(&self) -> usize {
        self.scratch.len()
    }
}

/// Double `buf` until it holds `required` bytes.
fn grow(buf: &mut Vec<u8>, required: usize) -> Status {
    let mut size = buf.len().max(1);
    while size < required {
        size = size.saturating_mul(2);
    }
    if buf.try_reserve_exact(size - buf.len()).is_err() {
        return Status::NoMem;
    }
    buf.resize(size, 0);
    Status::Ok
}

impl SyncPort for OscMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        if self.cell.strong_count() == 0 {
            return false;
        }

        loop {
            let Some(UiEnd::Reader(reader)) = self.end.as_mut() else {
                return false;
            };
            match reader.fetch(&mut self.scratch) {
                Ok(size) => {
                    self.packet.clear();
                    self.packet.extend_from_slice(&self.scratch[..size]);
                    return true;
                }
                Err(Status::Overflow) => {
                    let required = reader.peek_size().unwrap_or(0);
                    if grow(&mut self.scratch, required) == Status::NoMem {
                        tracing::warn!(
                            "Dropping {} byte OSC packet on '{}': out of memory",
                            required,
                            self.desc.id
                        );
                        reader.skip();
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
    }

    fn sync_again(&mut self) -> bool {
        if self.cell.strong_count() == 0 {
            return false;
        }
        matches!(&self.end, Some(UiEnd::Reader(reader)) if reader.pending())
    }

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::Bytes(&self.packet)
    }

    /// Queue a packet towards the DSP (`osc_in` ports).
    fn write(&mut self, data: &[u8]) -> Status {
        if self.cell.strong_count() == 0 {
            return Status::NoData;
        }
        match self.end.as_mut() {
            Some(UiEnd::Writer(writer)) => writer.submit(data),
            _ => Status::BadState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_packet_boundaries() {
        let (mut writer, mut reader) = queue(64);
        assert_eq!(writer.submit(b"abc"), Status::Ok);
        assert_eq!(writer.submit(b"defgh"), Status::Ok);

        assert_eq!(reader.peek_size(), Some(3));
        let mut dst = [0u8; 16];
        assert_eq!(reader.fetch(&mut dst), Ok(3));
        assert_eq!(&dst[..3], b"abc");
        assert_eq!(reader.fetch(&mut dst), Ok(5));
        assert_eq!(&dst[..5], b"defgh");
        assert_eq!(reader.fetch(&mut dst), Err(Status::NoData));
    }

    #[test]
    fn test_small_destination_keeps_packet() {
        let (mut writer, mut reader) = queue(64);
        writer.submit(&[7u8; 10]);
        let mut small = [0u8; 4];
        assert_eq!(reader.fetch(&mut small), Err(Status::Overflow));
        assert!(reader.pending());
        assert_eq!(reader.skip(), Some(10));
        assert!(!reader.pending());
    }

    #[test]
    fn test_header_without_payload_is_not_delivered() {
        let (mut writer, mut reader) = queue(64);
        writer.prod.push_slice(&6u32.to_le_bytes());
        writer.prod.push_slice(b"/pl");

        let mut dst = [0u8; 16];
        assert_eq!(reader.peek_size(), None);
        assert!(!reader.pending());
        assert_eq!(reader.fetch(&mut dst), Err(Status::NoData));
        assert_eq!(reader.skip(), None);

        writer.prod.push_slice(b"ay!");
        assert!(reader.pending());
        assert_eq!(reader.fetch(&mut dst), Ok(6));
        assert_eq!(&dst[..6], b"/play!");
    }

    #[test]
    fn test_writer_overflow() {
        let (mut writer, _reader) = queue(16);
        assert_eq!(writer.submit(&[0u8; 12]), Status::Ok);
        assert_eq!(writer.submit(&[0u8; 1]), Status::Overflow);
        assert_eq!(writer.submit(&[]), Status::BadArguments);
    }

    #[test]
    fn test_mirror_grows_buffer_for_large_packets() {
        let mut port = OscPort::new(Arc::new(PortDescriptor::osc_out("events")), 4096);
        let mut mirror = port.mirror();

        let big = vec![0x5a; 1000];
        assert_eq!(port.submit(&big), Status::Ok);
        assert_eq!(port.submit(b"tail"), Status::Ok);

        assert!(mirror.sync());
        assert_eq!(mirror.packet().len(), 1000);
        assert_eq!(mirror.buffer_size(), 1024);
        assert!(mirror.sync_again());
        assert!(mirror.sync());
        assert_eq!(mirror.packet(), b"tail");
        assert!(!mirror.sync_again());
        assert!(!mirror.sync());
    }

    #[test]
    fn test_ui_to_dsp_direction() {
        let mut port = OscPort::new(Arc::new(PortDescriptor::osc_in("commands")), 256);
        let mut mirror = port.mirror();
        assert_eq!(mirror.write(b"/play"), Status::Ok);
        assert!(!mirror.sync(), "input mirrors do not receive");

        let mut dst = [0u8; 32];
        assert_eq!(port.fetch(&mut dst), Ok(5));
        assert_eq!(&dst[..5], b"/play");
        assert_eq!(port.submit(b"x"), Status::BadState);
    }

    #[test]
    fn test_second_mirror_gets_no_end() {
        let port = OscPort::new(Arc::new(PortDescriptor::osc_in("commands")), 256);
        let _first = port.mirror();
        let mut second = port.mirror();
        assert_eq!(second.write(b"/x"), Status::BadState);
    }

    #[test]
    fn test_missing_backend_is_noop() {
        let port = OscPort::new(Arc::new(PortDescriptor::osc_in("commands")), 256);
        let mut mirror = port.mirror();
        drop(port);
        assert_eq!(mirror.write(b"/x"), Status::NoData);
        assert!(!mirror.sync_again());
    }
}
