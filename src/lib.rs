//! # Tandem - plugin state shared between a processing thread and a UI
//!
//! One plugin implementation, two cooperating threads.
//!
//! ## Architecture
//!
//! Tandem is an umbrella crate that coordinates:
//! - **tandem-core** - Port descriptors, backend/mirror ports, bulk containers
//!   (mesh, stream, frame buffer, OSC, strings), KVT, task executor
//! - **tandem-sampler** - Asynchronous sample loading and playback
//!
//! ## Quick Start
//!
//! ```ignore
//! use tandem::prelude::*;
//!
//! let meta = PluginMetadata::new("tandem.gain", "Gain")
//!     .port(PortDescriptor::audio_in("in"))
//!     .port(PortDescriptor::audio_out("out"))
//!     .port(PortDescriptor::control("gain", PortRange::new(0.0, 2.0, 0.0, 1.0)))
//!     .port(PortDescriptor::meter("level", PortRange::unit()).flags(PortFlags::PEAK));
//!
//! let engine = TandemEngine::builder().plugin(meta).build()?;
//! let (mut ports, mut mirrors) = engine.instantiate("tandem.gain")?.into_parts();
//!
//! // Processing thread
//! ports.meter_mut(3).unwrap().set_value(0.7);
//!
//! // UI thread, once per frame
//! mirrors.sync_all(&mut |_, port: &MirrorPort| println!("{} = {}", port.id(), port.value()));
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything
//! - `sampler` - Sample playback

/// Re-export of tandem-core for direct access
pub use tandem_core as core;

pub use tandem_core::{
    // Lock-free primitives
    AtomicFlag,
    AtomicFloat,
    SerialCounter,

    // Configuration
    EngineConfig,
    ExecutorConfig,

    // Metadata
    ChannelRole,
    GroupKind,
    PluginMetadata,
    PluginRegistry,
    PortDescriptor,
    PortFlags,
    PortGroup,
    PortRange,
    Role,
    Unit,

    // Ports
    BackendPort,
    MirrorPort,
    MirrorTable,
    PortBuffer,
    PortFactory,
    PortListener,
    PortTable,
    Status,
    SyncPort,

    // KVT
    KvtFlags,
    KvtParam,
    KvtStorage,
    KvtSyncReport,
    KvtSynchronizer,
    SharedKvt,

    // Executor
    Executor,
    ManualExecutor,
    Task,
    TaskExecutor,
    TaskStatus,
};

// Sampler subsystem
#[cfg(feature = "sampler")]
pub use tandem_sampler as sampler;

#[cfg(feature = "sampler")]
pub use tandem_sampler::{Sample, SamplePlayer, SamplePlayerConfig, SampleRequester};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::TandemEngineBuilder;
pub use engine::{PluginInstance, TandemEngine};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{PluginInstance, TandemEngine, TandemEngineBuilder};

    // Descriptions
    pub use crate::core::{PluginMetadata, PortDescriptor, PortFlags, PortGroup, PortRange, Unit};

    // Ports
    pub use crate::core::{MirrorPort, MirrorTable, PortBuffer, PortTable, Status, SyncPort};

    // KVT
    pub use crate::core::{KvtFlags, KvtParam};

    // Sampler
    #[cfg(feature = "sampler")]
    pub use crate::sampler::{SamplePlayer, SamplePlayerConfig};
}
