//! Test helpers and fixtures for tandem integration tests
//!
//! Every fixture runs without a host: the test drives the processing side and
//! the UI side by hand, block by block.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem::prelude::*;
use tandem::{ChannelRole, GroupKind, ManualExecutor};

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Standard block size for deterministic testing
pub const TEST_BLOCK_SIZE: usize = 512;

/// Uid of [`demo_meta`].
pub const DEMO_UID: &str = "tandem.demo";

/// Plugin exercising every port kind.
///
/// Port order (and therefore index):
/// 0 `in`, 1 `out_l`, 2 `out_r`, 3 `gain`, 4 `gain_out`, 5 `level`, 6 `peak`,
/// 7 `spectrum`, 8 `scope`, 9 `waterfall`, 10 `label`, 11 `file`, 12 `events_in`,
/// 13 `events_out`, 14 `enabled`
pub fn demo_meta() -> PluginMetadata {
    PluginMetadata::new(DEMO_UID, "Demo")
        .port(PortDescriptor::audio_in("in"))
        .port(PortDescriptor::audio_out("out_l"))
        .port(PortDescriptor::audio_out("out_r"))
        .port(PortDescriptor::control("gain", PortRange::new(0.0, 2.0, 0.0, 1.0)).unit(Unit::Gain))
        .port(
            PortDescriptor::control("gain_out", PortRange::new(0.0, 2.0, 0.0, 1.0))
                .flags(PortFlags::OUTPUT),
        )
        .port(PortDescriptor::meter("level", PortRange::unit()))
        .port(PortDescriptor::meter("peak", PortRange::unit()).flags(PortFlags::PEAK))
        .port(PortDescriptor::mesh("spectrum", 2, 64))
        .port(PortDescriptor::stream("scope", 2, 256))
        .port(PortDescriptor::frame_buffer("waterfall", 8, 16))
        .port(PortDescriptor::string("label", 32))
        .port(PortDescriptor::path("file"))
        .port(PortDescriptor::osc_in("events_in"))
        .port(PortDescriptor::osc_out("events_out"))
        .port(PortDescriptor::bypass("enabled"))
        .group(PortGroup::stereo_out("main_out", "out_l", "out_r"))
}

/// Route engine logs to the test harness. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Create a basic test engine with [`demo_meta`] registered.
pub fn test_engine() -> TandemEngine {
    init_tracing();
    TandemEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .max_block_size(TEST_BLOCK_SIZE)
        .osc_buffer_size(1024)
        .plugin(demo_meta())
        .build()
        .expect("Failed to create test engine")
}

/// Both halves of a [`demo_meta`] instance.
pub fn demo_instance() -> (TandemEngine, PortTable, MirrorTable) {
    let engine = test_engine();
    let (ports, mirrors) = engine
        .instantiate(DEMO_UID)
        .expect("Failed to instantiate demo plugin")
        .into_parts();
    (engine, ports, mirrors)
}

pub fn manual_executor() -> Arc<ManualExecutor> {
    Arc::new(ManualExecutor::default())
}

/// Poll `cond` until it holds or `max_wait_ms` elapses.
pub fn wait_until(max_wait_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Records every notification of a `sync_all` call.
#[derive(Default)]
pub struct Recorder {
    pub changes: Vec<(usize, f32)>,
}

impl Recorder {
    pub fn indices(&self) -> Vec<usize> {
        self.changes.iter().map(|(i, _)| *i).collect()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

impl tandem::PortListener for Recorder {
    fn port_changed(&mut self, index: usize, port: &MirrorPort) {
        self.changes.push((index, port.value()));
    }
}

// =============================================================================
// Deterministic Signal Generators
// =============================================================================

/// Integer staircase [0, 1, 2, ..., n-1] as f32, for exact routing checks.
pub fn generate_integer_staircase(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}

/// Sine wave at `frequency` for `num_samples`.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

// =============================================================================
// WAV fixtures
// =============================================================================

/// Write planar channels as a 32-bit float WAV.
pub fn save_wav_file_f32(path: &Path, sample_rate: u32, channels: &[Vec<f32>]) -> PathBuf {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for i in 0..channels[0].len() {
        for ch in channels {
            writer.write_sample(ch[i]).expect("Failed to write sample");
        }
    }
    writer.finalize().expect("Failed to finalize WAV");
    path.to_path_buf()
}

/// Write planar channels as a 16-bit PCM WAV.
pub fn save_wav_file_pcm16(path: &Path, sample_rate: u32, channels: &[Vec<f32>]) -> PathBuf {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for i in 0..channels[0].len() {
        for ch in channels {
            let s = (ch[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(s).expect("Failed to write sample");
        }
    }
    writer.finalize().expect("Failed to finalize WAV");
    path.to_path_buf()
}

/// Stereo metadata resolved by role rather than position.
pub fn main_out_roles(meta: &PluginMetadata) -> Option<(usize, usize)> {
    let group = meta
        .groups
        .iter()
        .find(|g| g.output && g.kind == GroupKind::Stereo)?;
    let l = meta.find(group.port(ChannelRole::Left)?)?;
    let r = meta.find(group.port(ChannelRole::Right)?)?;
    Some((l, r))
}
