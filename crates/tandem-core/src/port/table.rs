//! Port tables built from plugin metadata.
//!
//! [`PortFactory`] is the seam a host adapter implements: given a descriptor
//! it produces the backend port honoring the serial and buffer contracts.
//! [`DefaultPortFactory`] covers every role and is what adapters normally
//! delegate to.

use super::{
    AudioPort, BackendPort, ControlPort, FrameBufferPort, MeshPort, MeterPort, MirrorPort,
    OscPort, StreamPort, StringPort, SyncPort,
};
use crate::{EngineConfig, Error, PluginMetadata, PortDescriptor, Result, Role};
use std::collections::HashMap;
use std::sync::Arc;

/// Upper bound on `sync_again` rounds per port and tick.
const MAX_DRAIN: usize = 1024;

/// Creates backend ports for a host.
pub trait PortFactory: Send + Sync {
    fn create(&self, desc: Arc<PortDescriptor>, config: &EngineConfig) -> Result<BackendPort>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPortFactory;

impl PortFactory for DefaultPortFactory {
    fn create(&self, desc: Arc<PortDescriptor>, config: &EngineConfig) -> Result<BackendPort> {
        let port = match desc.role {
            Role::Audio => BackendPort::Audio(AudioPort::new(desc, config.max_block_size)),
            Role::Control | Role::Bypass | Role::PortSet => {
                BackendPort::Control(ControlPort::new(desc))
            }
            Role::Meter => BackendPort::Meter(MeterPort::new(desc)),
            Role::Mesh => {
                if desc.buffers == 0 {
                    return Err(Error::BadArguments(format!("mesh '{}' has no buffers", desc.id)));
                }
                BackendPort::Mesh(MeshPort::new(desc, config.mesh_capacity))
            }
            Role::Stream => {
                if desc.buffers == 0 {
                    return Err(Error::BadArguments(format!(
                        "stream '{}' has no channels",
                        desc.id
                    )));
                }
                BackendPort::Stream(StreamPort::new(desc, config.stream_capacity))
            }
            Role::FrameBuffer => {
                if desc.buffers == 0 {
                    return Err(Error::BadArguments(format!(
                        "frame buffer '{}' has no columns",
                        desc.id
                    )));
                }
                BackendPort::FrameBuffer(FrameBufferPort::new(desc, config.frame_buffer_rows))
            }
            Role::Path | Role::String => {
                BackendPort::Text(StringPort::new(desc, config.string_capacity))
            }
            Role::Osc => BackendPort::Osc(OscPort::new(desc, config.osc_buffer_size)),
        };
        Ok(port)
    }
}

/// Receives change notifications from [`MirrorTable::sync_all`].
pub trait PortListener {
    fn port_changed(&mut self, index: usize, port: &MirrorPort);
}

impl<F> PortListener for F
where
    F: FnMut(usize, &MirrorPort),
{
    fn port_changed(&mut self, index: usize, port: &MirrorPort) {
        self(index, port)
    }
}

/// Backend ports of one plugin instance, in descriptor order.
pub struct PortTable {
    meta: Arc<PluginMetadata>,
    ports: Vec<BackendPort>,
    index: HashMap<String, usize>,
}

macro_rules! accessor {
    ($name:ident, $name_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, index: usize) -> Option<&$ty> {
            match self.ports.get(index) {
                Some(BackendPort::$variant(p)) => Some(p),
                _ => None,
            }
        }

        pub fn $name_mut(&mut self, index: usize) -> Option<&mut $ty> {
            match self.ports.get_mut(index) {
                Some(BackendPort::$variant(p)) => Some(p),
                _ => None,
            }
        }
    };
}

impl PortTable {
    /// Build with the default factory.
    pub fn new(meta: Arc<PluginMetadata>, config: &EngineConfig) -> Result<Self> {
        Self::build(meta, config, &DefaultPortFactory)
    }

    pub fn build(
        meta: Arc<PluginMetadata>,
        config: &EngineConfig,
        factory: &dyn PortFactory,
    ) -> Result<Self> {
        meta.validate()?;
        config.validate()?;

        let mut ports = Vec::with_capacity(meta.ports.len());
        let mut index = HashMap::with_capacity(meta.ports.len());
        for desc in &meta.ports {
            index.insert(desc.id.clone(), ports.len());
            ports.push(factory.create(Arc::new(desc.clone()), config)?);
        }

        tracing::debug!("Created {} ports for plugin {}", ports.len(), meta.uid);
        Ok(Self { meta, ports, index })
    }

    pub fn metadata(&self) -> &Arc<PluginMetadata> {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&BackendPort> {
        self.ports.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BackendPort> {
        self.ports.get_mut(index)
    }

    pub fn port(&self, id: &str) -> Option<&BackendPort> {
        self.index_of(id).and_then(|i| self.ports.get(i))
    }

    pub fn port_mut(&mut self, id: &str) -> Option<&mut BackendPort> {
        let i = self.index_of(id)?;
        self.ports.get_mut(i)
    }

    accessor!(audio, audio_mut, Audio, AudioPort);
    accessor!(control, control_mut, Control, ControlPort);
    accessor!(meter, meter_mut, Meter, MeterPort);
    accessor!(mesh, mesh_mut, Mesh, MeshPort);
    accessor!(stream, stream_mut, Stream, StreamPort);
    accessor!(frame_buffer, frame_buffer_mut, FrameBuffer, FrameBufferPort);
    accessor!(text, text_mut, Text, StringPort);
    accessor!(osc, osc_mut, Osc, OscPort);

    pub fn iter(&self) -> impl Iterator<Item = &BackendPort> {
        self.ports.iter()
    }

    /// Indices of audio output ports, in descriptor order.
    pub fn audio_outputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.ports.iter().enumerate().filter_map(|(i, p)| {
            let desc = p.descriptor();
            (desc.role == Role::Audio && desc.is_output()).then_some(i)
        })
    }

    /// Create the UI-side table. Call once per UI instance.
    pub fn mirrors(&self) -> MirrorTable {
        MirrorTable {
            ports: self.ports.iter().map(BackendPort::mirror).collect(),
            index: self.index.clone(),
        }
    }
}

/// Mirror ports of one plugin instance, in descriptor order.
pub struct MirrorTable {
    ports: Vec<MirrorPort>,
    index: HashMap<String, usize>,
}

impl MirrorTable {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&MirrorPort> {
        self.ports.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MirrorPort> {
        self.ports.get_mut(index)
    }

    pub fn port(&self, id: &str) -> Option<&MirrorPort> {
        self.index_of(id).and_then(|i| self.ports.get(i))
    }

    pub fn port_mut(&mut self, id: &str) -> Option<&mut MirrorPort> {
        let i = self.index_of(id)?;
        self.ports.get_mut(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirrorPort> {
        self.ports.iter()
    }

    /// Poll every mirror once, draining queued items, and report each change.
    /// Returns the number of notifications sent.
    pub fn sync_all(&mut self, listener: &mut dyn PortListener) -> usize {
        let mut changes = 0;
        for (i, port) in self.ports.iter_mut().enumerate() {
            if !port.sync() {
                continue;
            }
            listener.port_changed(i, port);
            changes += 1;

            let mut rounds = 0;
            while rounds < MAX_DRAIN && port.sync_again() {
                rounds += 1;
                if port.sync() {
                    listener.port_changed(i, port);
                    changes += 1;
                }
            }
        }
        changes
    }
}
