//! Backend and mirror ports.
//!
//! Every port descriptor gets one [`BackendPort`], owned by the processing
//! thread, and at most one [`MirrorPort`], owned by the UI thread. The two
//! share a cell: the backend holds an `Arc`, the mirror only a `Weak`, so
//! tearing down the engine never leaves a mirror with a dangling reference.
//! Once the backend is gone every mirror operation is a no-op.
//!
//! Change detection uses a per-port [`SerialCounter`](crate::SerialCounter):
//! the writer stores the payload and then bumps the counter with release
//! ordering, the mirror compares the counter with the one it saw last.
//! Bulk containers (mesh, stream, frame buffer) and OSC queues have their own
//! handoff, described in their modules.

mod audio;
mod control;
mod frame_buffer;
mod mesh;
mod meter;
mod osc;
mod stream;
mod string;
mod table;

pub use audio::{AudioMirror, AudioPort};
pub use control::{ControlMirror, ControlPort};
pub use frame_buffer::{FrameBufferMirror, FrameBufferPort};
pub use mesh::{MeshMirror, MeshPort, MeshWriter};
pub use meter::{MeterMirror, MeterPort};
pub use osc::{OscMirror, OscPort, OscReader, OscWriter};
pub use stream::{StreamMirror, StreamPort};
pub use string::{StringMirror, StringPort, StringSlot};
pub use table::{DefaultPortFactory, MirrorTable, PortFactory, PortListener, PortTable};

use crate::{PortDescriptor, Role, Status};

/// Payload view returned by [`SyncPort::buffer`].
pub enum PortBuffer<'a> {
    /// Scalar and audio ports.
    None,
    Mesh {
        buffers: &'a [Vec<f32>],
        items: usize,
    },
    Stream(&'a StreamMirror),
    Frames(&'a FrameBufferMirror),
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// UI-side view of one port.
pub trait SyncPort {
    fn descriptor(&self) -> &PortDescriptor;

    /// Pull the latest backend state. Returns true if anything changed.
    /// Never blocks.
    fn sync(&mut self) -> bool;

    /// True if another queued item can be pulled by calling `sync()` again
    /// within the same UI tick.
    fn sync_again(&mut self) -> bool {
        false
    }

    fn value(&self) -> f32 {
        self.descriptor().range.default
    }

    fn set_value(&mut self, _value: f32) {}

    fn buffer(&self) -> PortBuffer<'_> {
        PortBuffer::None
    }

    /// Push raw data to the backend (text, OSC packets).
    fn write(&mut self, _data: &[u8]) -> Status {
        Status::BadState
    }
}

/// Processing-thread storage for one port.
pub enum BackendPort {
    Audio(AudioPort),
    /// Controls, output controls, bypass and port sets.
    Control(ControlPort),
    Meter(MeterPort),
    Mesh(MeshPort),
    Stream(StreamPort),
    FrameBuffer(FrameBufferPort),
    /// String and path ports.
    Text(StringPort),
    Osc(OscPort),
}

impl BackendPort {
    pub fn descriptor(&self) -> &PortDescriptor {
        match self {
            BackendPort::Audio(p) => p.descriptor(),
            BackendPort::Control(p) => p.descriptor(),
            BackendPort::Meter(p) => p.descriptor(),
            BackendPort::Mesh(p) => p.descriptor(),
            BackendPort::Stream(p) => p.descriptor(),
            BackendPort::FrameBuffer(p) => p.descriptor(),
            BackendPort::Text(p) => p.descriptor(),
            BackendPort::Osc(p) => p.descriptor(),
        }
    }

    /// Scalar value; 0.0 for ports that carry none.
    pub fn value(&self) -> f32 {
        match self {
            BackendPort::Control(p) => p.value(),
            BackendPort::Meter(p) => p.value(),
            _ => 0.0,
        }
    }

    /// Scalar write from the processing thread or host automation.
    /// Ignored by ports that carry no scalar.
    pub fn set_value(&self, value: f32) {
        match self {
            BackendPort::Control(p) => p.set_value(value),
            BackendPort::Meter(p) => p.set_value(value),
            _ => {}
        }
    }

    /// Build the matching mirror.
    pub fn mirror(&self) -> MirrorPort {
        match self {
            BackendPort::Audio(p) => MirrorPort::Audio(p.mirror()),
            BackendPort::Control(p) => MirrorPort::Control(p.mirror()),
            BackendPort::Meter(p) => MirrorPort::Meter(p.mirror()),
            BackendPort::Mesh(p) => MirrorPort::Mesh(p.mirror()),
            BackendPort::Stream(p) => MirrorPort::Stream(p.mirror()),
            BackendPort::FrameBuffer(p) => MirrorPort::FrameBuffer(p.mirror()),
            BackendPort::Text(p) => MirrorPort::Text(p.mirror()),
            BackendPort::Osc(p) => MirrorPort::Osc(p.mirror()),
        }
    }
}

/// UI-thread shadow of a [`BackendPort`].
pub enum MirrorPort {
    Audio(AudioMirror),
    Control(ControlMirror),
    Meter(MeterMirror),
    Mesh(MeshMirror),
    Stream(StreamMirror),
    FrameBuffer(FrameBufferMirror),
    Text(StringMirror),
    Osc(OscMirror),
}

macro_rules! delegate {
    ($self:ident, $p:ident => $body:expr) => {
        match $self {
            MirrorPort::Audio($p) => $body,
            MirrorPort::Control($p) => $body,
            MirrorPort::Meter($p) => $body,
            MirrorPort::Mesh($p) => $body,
            MirrorPort::Stream($p) => $body,
            MirrorPort::FrameBuffer($p) => $body,
            MirrorPort::Text($p) => $body,
            MirrorPort::Osc($p) => $body,
        }
    };
}

impl MirrorPort {
    pub fn role(&self) -> Role {
        self.descriptor().role
    }

    pub fn id(&self) -> &str {
        &self.descriptor().id
    }
}

impl SyncPort for MirrorPort {
    fn descriptor(&self) -> &PortDescriptor {
        delegate!(self, p => p.descriptor())
    }

    fn sync(&mut self) -> bool {
        delegate!(self, p => p.sync())
    }

    fn sync_again(&mut self) -> bool {
        delegate!(self, p => p.sync_again())
    }

    fn value(&self) -> f32 {
        delegate!(self, p => p.value())
    }

    fn set_value(&mut self, value: f32) {
        delegate!(self, p => p.set_value(value))
    }

    fn buffer(&self) -> PortBuffer<'_> {
        delegate!(self, p => p.buffer())
    }

    fn write(&mut self, data: &[u8]) -> Status {
        delegate!(self, p => p.write(data))
    }
}
