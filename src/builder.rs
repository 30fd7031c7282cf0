//! Builder for configuring and constructing a `TandemEngine`.

use crate::{Result, TandemEngine};
use std::sync::Arc;
use tandem_core::{
    EngineConfig, KvtStorage, KvtSynchronizer, PluginMetadata, PluginRegistry, TaskExecutor,
};

/// Plugins given to the builder are registered when it builds; the first
/// invalid or duplicate one fails the build.
///
/// # Example
///
/// ```ignore
/// use tandem::prelude::*;
///
/// let engine = TandemEngine::builder()
///     .sample_rate(48000.0)
///     .workers(2)
///     .plugin(meta)
///     .build()?;
/// ```
pub struct TandemEngineBuilder {
    config: EngineConfig,
    plugins: Vec<PluginMetadata>,
    kvt_passes: Option<usize>,
}

impl Default for TandemEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            plugins: Vec::new(),
            kvt_passes: None,
        }
    }
}

impl TandemEngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 8192
    pub fn max_block_size(mut self, samples: usize) -> Self {
        self.config.max_block_size = samples;
        self
    }

    /// Executor worker threads. Default: 1
    pub fn workers(mut self, count: usize) -> Self {
        self.config.executor.workers = count;
        self
    }

    /// Default: 64
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.executor.queue_capacity = capacity;
        self
    }

    pub fn low_priority(mut self, enabled: bool) -> Self {
        self.config.executor.low_priority = enabled;
        self
    }

    /// Default: 64KB
    pub fn osc_buffer_size(mut self, bytes: usize) -> Self {
        self.config.osc_buffer_size = bytes;
        self
    }

    /// Default: 4096
    pub fn string_capacity(mut self, bytes: usize) -> Self {
        self.config.string_capacity = bytes;
        self
    }

    /// Bound on KVT enumeration passes per direction.
    pub fn kvt_passes(mut self, passes: usize) -> Self {
        self.kvt_passes = Some(passes);
        self
    }

    pub fn plugin(mut self, meta: PluginMetadata) -> Self {
        self.plugins.push(meta);
        self
    }

    pub fn build(self) -> Result<TandemEngine> {
        self.config.validate()?;

        let registry = PluginRegistry::new();
        for meta in self.plugins {
            registry.register(meta)?;
        }

        let executor = Arc::new(TaskExecutor::new(&self.config.executor)?);
        let kvt_sync = match self.kvt_passes {
            Some(passes) => KvtSynchronizer::with_max_passes(passes),
            None => KvtSynchronizer::new(),
        };

        tracing::debug!(
            "Engine built: {} Hz, {} plugin(s), {} worker(s)",
            self.config.sample_rate,
            registry.len(),
            self.config.executor.workers
        );
        Ok(TandemEngine::from_parts(
            self.config,
            registry,
            executor,
            KvtStorage::new().shared(),
            kvt_sync,
        ))
    }
}
