//! Cross-thread port synchronization between a real-time processing thread
//! and a UI thread.
//!
//! # Primary API
//!
//! - [`PluginMetadata`] / [`PortDescriptor`]: static port descriptions
//! - [`PortTable`]: backend ports, owned by the processing thread
//! - [`MirrorTable`]: mirror ports, owned by the UI thread, polled with
//!   [`MirrorTable::sync_all`]
//! - [`KvtStorage`] / [`KvtSynchronizer`]: sparse named parameters
//! - [`TaskExecutor`]: background work (file I/O, deferred frees)
//!
//! # Example
//!
//! ```ignore
//! use tandem_core::*;
//!
//! let meta = Arc::new(
//!     PluginMetadata::new("tandem.gain", "Gain")
//!         .port(PortDescriptor::control("gain", PortRange::new(0.0, 2.0, 0.0, 1.0)))
//!         .port(PortDescriptor::meter("level", PortRange::unit()).flags(PortFlags::PEAK)),
//! );
//! let ports = PortTable::new(meta, &EngineConfig::default())?;
//! let mut mirrors = ports.mirrors();
//!
//! // Processing thread
//! ports.meter(1).unwrap().set_value(0.8);
//!
//! // UI thread
//! mirrors.sync_all(&mut |index: usize, port: &MirrorPort| {
//!     println!("{} = {}", port.id(), port.value());
//! });
//! ```

pub mod error;
pub use error::{Error, Result, Status};

pub mod config;
pub use config::{EngineConfig, ExecutorConfig};

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat, SerialCounter};

pub mod metadata;
pub use metadata::{
    ChannelRole, GroupKind, PluginMetadata, PluginRegistry, PortDescriptor, PortFlags, PortGroup,
    PortRange, Role, Unit,
};

pub mod port;
pub use port::{
    AudioMirror, AudioPort, BackendPort, ControlMirror, ControlPort, DefaultPortFactory,
    FrameBufferMirror, FrameBufferPort, MeshMirror, MeshPort, MeshWriter, MeterMirror, MeterPort,
    MirrorPort, MirrorTable, OscMirror, OscPort, OscReader, OscWriter, PortBuffer, PortFactory,
    PortListener, PortTable, StreamMirror, StreamPort, StringMirror, StringPort, StringSlot,
    SyncPort,
};

pub mod osc;

pub mod kvt;
pub use kvt::{KvtFlags, KvtParam, KvtStorage, KvtSyncReport, KvtSynchronizer, SharedKvt};

pub mod executor;
pub use executor::{
    run_task, Executor, ManualExecutor, Task, TaskExecutor, TaskState, TaskStatus,
};
