//! TandemEngine that owns the shared services of a plugin library.

use crate::{Error, Result, TandemEngineBuilder};
use std::sync::Arc;
use tandem_core::{
    EngineConfig, Executor, KvtParam, KvtSyncReport, KvtSynchronizer, MirrorTable, PluginMetadata,
    PluginRegistry, PortFactory, PortTable, SharedKvt, Status, TaskExecutor,
};

#[cfg(feature = "sampler")]
use crate::sampler::{SamplePlayer, SamplePlayerConfig};

/// Shared services for every plugin instance of one library: the plugin
/// registry, the background executor and the KVT.
///
/// # Example
///
/// ```ignore
/// use tandem::prelude::*;
///
/// let engine = TandemEngine::builder().plugin(meta).build()?;
/// let PluginInstance { mut ports, mut mirrors } = engine.instantiate("tandem.gain")?;
///
/// // Processing thread owns `ports`, UI thread owns `mirrors`
/// mirrors.sync_all(&mut |_, port: &MirrorPort| println!("{}", port.id()));
/// ```
pub struct TandemEngine {
    config: EngineConfig,
    registry: PluginRegistry,
    executor: Arc<TaskExecutor>,
    kvt: SharedKvt,
    kvt_sync: KvtSynchronizer,
}

/// Both halves of one plugin instance.
pub struct PluginInstance {
    /// Backend ports, for the processing thread.
    pub ports: PortTable,
    /// Mirror ports, for the UI thread.
    pub mirrors: MirrorTable,
}

impl PluginInstance {
    pub fn into_parts(self) -> (PortTable, MirrorTable) {
        (self.ports, self.mirrors)
    }
}

impl TandemEngine {
    pub fn builder() -> TandemEngineBuilder {
        TandemEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        registry: PluginRegistry,
        executor: Arc<TaskExecutor>,
        kvt: SharedKvt,
        kvt_sync: KvtSynchronizer,
    ) -> Self {
        Self {
            config,
            registry,
            executor,
            kvt,
            kvt_sync,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Register another plugin after build.
    pub fn register(&self, meta: PluginMetadata) -> Result<Arc<PluginMetadata>> {
        Ok(self.registry.register(meta)?)
    }

    pub fn metadata(&self, uid: &str) -> Result<Arc<PluginMetadata>> {
        self.registry
            .get(uid)
            .ok_or_else(|| Error::UnknownPlugin(uid.to_string()))
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    /// Create the backend and mirror ports of a registered plugin.
    pub fn instantiate(&self, uid: &str) -> Result<PluginInstance> {
        let meta = self.metadata(uid)?;
        let ports = PortTable::new(meta, &self.config)?;
        let mirrors = ports.mirrors();
        Ok(PluginInstance { ports, mirrors })
    }

    /// Same as [`instantiate`](Self::instantiate) with a custom port factory.
    pub fn instantiate_with(
        &self,
        uid: &str,
        factory: &dyn PortFactory,
    ) -> Result<PluginInstance> {
        let meta = self.metadata(uid)?;
        let ports = PortTable::build(meta, &self.config, factory)?;
        let mirrors = ports.mirrors();
        Ok(PluginInstance { ports, mirrors })
    }

    pub fn kvt(&self) -> &SharedKvt {
        &self.kvt
    }

    /// Deliver pending KVT changes both ways. UI thread only.
    pub fn sync_kvt<U, D>(&self, to_ui: U, to_dsp: D) -> KvtSyncReport
    where
        U: FnMut(&str, Option<&KvtParam>) -> Status,
        D: FnMut(&str, Option<&KvtParam>) -> Status,
    {
        self.kvt_sync.sync_shared(&self.kvt, to_ui, to_dsp)
    }

    /// Sample player bound to this engine's executor and sample rate.
    #[cfg(feature = "sampler")]
    pub fn sample_player(
        &self,
        config: SamplePlayerConfig,
        meta: &PluginMetadata,
    ) -> Result<SamplePlayer> {
        let mut player = SamplePlayer::new(config)?;
        player.init(self.executor(), meta)?;
        player.set_sample_rate(self.config.sample_rate.round() as u32);
        Ok(player)
    }

    /// Stop the executor and close the registry. Idempotent.
    pub fn shutdown(&self) {
        self.executor.shutdown();
        self.registry.shutdown();
    }
}

impl Drop for TandemEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
