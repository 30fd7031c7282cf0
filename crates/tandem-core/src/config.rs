//! Engine and executor configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the background task executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of worker threads (default: 1)
    pub workers: usize,
    /// Maximum number of queued tasks before `submit` refuses (default: 64)
    pub queue_capacity: usize,
    /// Worker thread name prefix (default: "tandem-executor")
    pub thread_name: String,
    /// Run workers below normal priority (default: true)
    pub low_priority: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 64,
            thread_name: "tandem-executor".into(),
            low_priority: true,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("executor needs at least one worker".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("executor queue_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Configuration for one plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Largest block the host will ever pass to `process` (default: 8192)
    pub max_block_size: usize,
    pub executor: ExecutorConfig,
    /// Byte capacity of each OSC packet ring (default: 64KB)
    pub osc_buffer_size: usize,
    /// Byte capacity of string ports without an explicit capacity (default: 4096)
    pub string_capacity: usize,
    /// Items per mesh buffer when the descriptor does not say (default: 1024)
    pub mesh_capacity: usize,
    /// Samples per stream channel when the descriptor does not say (default: 65536)
    pub stream_capacity: usize,
    /// Rows kept by frame buffers when the descriptor does not say (default: 64)
    pub frame_buffer_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_block_size: 8192,
            executor: ExecutorConfig::default(),
            osc_buffer_size: 64 * 1024,
            string_capacity: 4096,
            mesh_capacity: 1024,
            stream_capacity: 65536,
            frame_buffer_rows: 64,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(Error::InvalidConfig("max_block_size must be > 0".into()));
        }
        for (name, value) in [
            ("osc_buffer_size", self.osc_buffer_size),
            ("string_capacity", self.string_capacity),
            ("mesh_capacity", self.mesh_capacity),
            ("stream_capacity", self.stream_capacity),
            ("frame_buffer_rows", self.frame_buffer_rows),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        self.executor.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.executor.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let config = EngineConfig {
            sample_rate: 1000.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = EngineConfig {
            osc_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            executor: ExecutorConfig {
                workers: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
