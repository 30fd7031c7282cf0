//! Audio ports. Buffers live on the processing thread only.

use super::SyncPort;
use crate::PortDescriptor;
use std::sync::Arc;

/// Audio buffer of one channel, pre-allocated to the maximum block size.
pub struct AudioPort {
    desc: Arc<PortDescriptor>,
    buffer: Vec<f32>,
}

impl AudioPort {
    pub(crate) fn new(desc: Arc<PortDescriptor>, max_block_size: usize) -> Self {
        Self {
            desc,
            buffer: vec![0.0; max_block_size],
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    #[inline]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Copy host input into the port. Excess host samples are ignored.
    #[inline]
    pub fn bind(&mut self, input: &[f32]) -> usize {
        let n = input.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&input[..n]);
        n
    }

    /// Zero the first `samples` frames.
    #[inline]
    pub fn clear(&mut self, samples: usize) {
        let n = samples.min(self.buffer.len());
        self.buffer[..n].fill(0.0);
    }

    pub(crate) fn mirror(&self) -> AudioMirror {
        AudioMirror {
            desc: Arc::clone(&self.desc),
        }
    }
}

/// Audio is never mirrored to the UI; the mirror only exposes metadata.
pub struct AudioMirror {
    desc: Arc<PortDescriptor>,
}

impl SyncPort for AudioMirror {
    fn descriptor(&self) -> &PortDescriptor {
        &self.desc
    }

    fn sync(&mut self) -> bool {
        false
    }
}
