//! Per-output playback engine.

use crate::Sample;
use smallvec::SmallVec;

/// One in-flight play of the bound sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    position: usize,
}

/// Renders the bound sample into one output channel.
///
/// The channel mapping follows the output layout:
///
/// | outputs | sample   | mapping                         |
/// |---------|----------|---------------------------------|
/// | 1       | mono     | direct                          |
/// | 1       | n > 1    | all channels mixed at `1/n`     |
/// | 2       | mono     | duplicated at unity             |
/// | 2       | n > 1    | one sample channel per output   |
#[derive(Debug)]
pub struct ChannelPlayer {
    output: usize,
    outputs: usize,
    mapping: SmallVec<[(usize, f32); 2]>,
    playbacks: SmallVec<[Playback; 4]>,
    max_playbacks: usize,
    gain: f32,
}

impl ChannelPlayer {
    /// Player for output `output` of `outputs`, allowing `max_playbacks`
    /// overlapping plays.
    pub fn new(output: usize, outputs: usize, max_playbacks: usize) -> Self {
        let max_playbacks = max_playbacks.max(1);
        let mut playbacks = SmallVec::new();
        playbacks.reserve_exact(max_playbacks);
        Self {
            output,
            outputs,
            mapping: SmallVec::new(),
            playbacks,
            max_playbacks,
            gain: 1.0,
        }
    }

    /// Recompute the channel mapping for a sample with `channels` channels.
    /// Cancels all playbacks.
    pub fn bind(&mut self, channels: usize) {
        self.cancel();
        self.mapping.clear();
        if channels == 0 || self.output >= self.outputs {
            return;
        }
        match self.outputs {
            1 => {
                let g = 1.0 / channels as f32;
                self.mapping.extend((0..channels).map(|ch| (ch, g)));
            }
            _ if channels == 1 => self.mapping.push((0, 1.0)),
            _ => self.mapping.push((self.output.min(channels - 1), 1.0)),
        }
    }

    /// Forget the mapping and all playbacks.
    pub fn unbind(&mut self) {
        self.cancel();
        self.mapping.clear();
    }

    /// Start playing from frame `position`. The oldest playback is dropped
    /// when the limit is reached.
    pub fn start(&mut self, position: usize) {
        if self.playbacks.len() >= self.max_playbacks {
            self.playbacks.remove(0);
        }
        self.playbacks.push(Playback { position });
    }

    /// Stop every playback. Idempotent.
    pub fn cancel(&mut self) {
        self.playbacks.clear();
    }

    #[inline]
    pub fn playing(&self) -> bool {
        !self.playbacks.is_empty()
    }

    /// Position of the newest playback.
    pub fn position(&self) -> Option<usize> {
        self.playbacks.last().map(|p| p.position)
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Overwrite `out` with the next `out.len()` frames. Writes silence when
    /// nothing plays. Playbacks that run past the end are dropped.
    pub fn render(&mut self, sample: Option<&Sample>, out: &mut [f32]) {
        out.fill(0.0);
        let Some(sample) = sample else {
            return;
        };
        let len = sample.len();

        for playback in &mut self.playbacks {
            let start = playback.position.min(len);
            let n = out.len().min(len - start);
            for &(ch, g) in &self.mapping {
                let Some(src) = sample.channel(ch) else {
                    continue;
                };
                let g = g * self.gain;
                for (o, s) in out[..n].iter_mut().zip(&src[start..start + n]) {
                    *o += s * g;
                }
            }
            playback.position = start + n;
        }
        self.playbacks.retain(|p| p.position < len);
    }
}
