//! Decoded audio assets.

use crate::{Error, Result};
use rayon::prelude::*;
use std::path::Path;
use std::ptr;
use std::sync::atomic::AtomicPtr;

/// Fully decoded, planar audio.
///
/// Immutable once handed to a player. Samples are retired through the
/// [`GcList`](crate::GcList), which links them through an intrusive pointer
/// so retiring never allocates.
#[derive(Debug)]
pub struct Sample {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    pub(crate) gc_next: AtomicPtr<Sample>,
}

impl Sample {
    /// Build from planar channel data. All channels must have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(Error::EmptySample);
        };
        let len = first.len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(Error::UnsupportedFormat("channels differ in length".into()));
        }
        if sample_rate == 0 {
            return Err(Error::UnsupportedFormat("sample rate is zero".into()));
        }
        Ok(Self {
            channels,
            sample_rate,
            gc_next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    /// Decode a WAV file (integer 8/16/24/32 bit or 32 bit float).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = hound::WavReader::open(path.as_ref())?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(Error::EmptySample);
        }

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => {
                reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?
            }
            (hound::SampleFormat::Int, 8) => read_int::<i8, _>(reader, 8)?,
            (hound::SampleFormat::Int, 16) => read_int::<i16, _>(reader, 16)?,
            (hound::SampleFormat::Int, 24) => read_int::<i32, _>(reader, 24)?,
            (hound::SampleFormat::Int, 32) => read_int::<i32, _>(reader, 32)?,
            (format, bits) => {
                return Err(Error::UnsupportedFormat(format!("{:?} {} bit", format, bits)))
            }
        };

        let frames = interleaved.len() / channels;
        if frames == 0 {
            return Err(Error::EmptySample);
        }
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &s) in planar.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::from_channels(planar, spec.sample_rate)
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Scale so the peak reaches 1.0. Silent samples are left alone.
    pub fn normalize(&mut self) {
        let peak = self.peak();
        if peak <= f32::EPSILON {
            return;
        }
        let gain = 1.0 / peak;
        self.channels
            .par_iter_mut()
            .for_each(|c| c.iter_mut().for_each(|s| *s *= gain));
    }

    /// Linear-interpolation resample to `target_rate`, one channel per
    /// rayon task.
    pub fn resample(&self, target_rate: u32) -> Result<Sample> {
        if target_rate == 0 {
            return Err(Error::Resample("target rate is zero".into()));
        }
        if target_rate == self.sample_rate {
            return Self::from_channels(self.channels.clone(), self.sample_rate);
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len = ((self.len() as f64) / ratio).ceil() as usize;
        if out_len == 0 {
            return Err(Error::Resample("resampled length is zero".into()));
        }

        let channels = self
            .channels
            .par_iter()
            .map(|src| resample_channel(src, ratio, out_len))
            .collect();
        Self::from_channels(channels, target_rate)
    }
}

fn resample_channel(src: &[f32], ratio: f64, out_len: usize) -> Vec<f32> {
    let last = src.len().saturating_sub(1);
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = src[idx];
            let b = src[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

fn read_int<S, R>(reader: hound::WavReader<R>, bits: u32) -> Result<Vec<f32>>
where
    S: hound::Sample + Into<i32>,
    R: std::io::Read,
{
    let scale = 1.0 / (1i64 << (bits - 1)) as f32;
    reader
        .into_samples::<S>()
        .map(|s| s.map(|v| v.into() as f32 * scale).map_err(Error::from))
        .collect()
}
