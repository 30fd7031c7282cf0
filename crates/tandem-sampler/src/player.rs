//! Asynchronous sample player.
//!
//! The UI thread records requests through a [`SampleRequester`]. Once per
//! block the processing thread picks up the latest request, submits at most
//! one [`LoadTask`], binds finished loads, and renders into its output ports.
//! Retired samples go to a [`GcList`] drained by a [`GcTask`].

use crate::{ChannelPlayer, GcList, GcTask, LoadTask, Result, Sample};
use smallvec::SmallVec;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tandem_core::{
    ChannelRole, Executor, GroupKind, PluginMetadata, PortTable, Role, StringSlot, Task,
};

/// Sample player configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlayerConfig {
    /// Output channels, 1 or 2.
    pub channels: usize,
    /// Overlapping plays of the bound sample. 1 means a new play supersedes
    /// the current one.
    pub max_playbacks: usize,
    /// Peak-normalize loaded files.
    pub normalize: bool,
    /// Longest file name in bytes.
    pub path_capacity: usize,
}

impl Default for SamplePlayerConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            max_playbacks: 1,
            normalize: false,
            path_capacity: 4096,
        }
    }
}

impl SamplePlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.channels) {
            return Err(tandem_core::Error::InvalidConfig(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            ))
            .into());
        }
        if self.max_playbacks == 0 {
            return Err(
                tandem_core::Error::InvalidConfig("max_playbacks must be > 0".into()).into(),
            );
        }
        if self.path_capacity == 0 {
            return Err(
                tandem_core::Error::InvalidConfig("path_capacity must be > 0".into()).into(),
            );
        }
        Ok(())
    }
}

/// Latest request from the UI thread.
///
/// A sequence lock covers the whole payload: writers make `seq` odd, store
/// the file, position and release flag, then make it even again. The request
/// counter is `seq / 2`.
pub struct PlayRequest {
    file: StringSlot,
    position: AtomicU64,
    release: AtomicBool,
    seq: AtomicU32,
}

/// Consistent copy of one request, taken by the processing thread.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RequestSnapshot {
    counter: u32,
    len: usize,
    position: u64,
    release: bool,
}

/// Retries before the processing thread gives up on a busy request.
const SNAPSHOT_ATTEMPTS: usize = 8;

impl PlayRequest {
    fn new(path_capacity: usize) -> Self {
        Self {
            file: StringSlot::new(path_capacity),
            position: AtomicU64::new(0),
            release: AtomicBool::new(false),
            seq: AtomicU32::new(0),
        }
    }

    /// Number of requests issued so far (wrapping).
    pub fn counter(&self) -> u32 {
        self.seq.load(Ordering::Acquire) / 2
    }

    fn submit(&self, file: &str, position: u64, release: bool) {
        let seq = loop {
            let seq = self.seq.load(Ordering::Relaxed);
            if seq & 1 == 0
                && self
                    .seq
                    .compare_exchange_weak(
                        seq,
                        seq.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                break seq;
            }
            std::hint::spin_loop();
        };
        fence(Ordering::Release);

        self.file.submit(file.as_bytes());
        self.position.store(position, Ordering::Relaxed);
        self.release.store(release, Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy the current request, file name into `file`. `None` while a
    /// writer keeps the request busy; the caller retries next block.
    fn snapshot(&self, file: &mut FileName) -> Option<RequestSnapshot> {
        for _ in 0..SNAPSHOT_ATTEMPTS {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let Some((len, _)) = self.file.read(&mut file.bytes) else {
                continue;
            };
            let position = self.position.load(Ordering::Relaxed);
            let release = self.release.load(Ordering::Relaxed);

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                file.len = len;
                return Some(RequestSnapshot {
                    counter: before / 2,
                    len,
                    position,
                    release,
                });
            }
        }
        None
    }
}

/// UI-side handle of a [`SamplePlayer`].
#[derive(Clone)]
pub struct SampleRequester {
    request: Arc<PlayRequest>,
}

impl SampleRequester {
    /// Play `file` from frame `position`. An empty `file` cancels playback;
    /// `release` additionally drops the loaded sample. Never blocks on the
    /// processing thread.
    pub fn play_sample(&self, file: &str, position: u64, release: bool) {
        self.request.submit(file, position, release);
    }
}

/// Fixed-capacity byte buffer for file names held by the processing thread.
struct FileName {
    bytes: Vec<u8>,
    len: usize,
}

impl FileName {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity + 1],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn copy_from(&mut self, other: &FileName) {
        let n = other.len.min(self.bytes.len() - 1);
        self.bytes[..n].copy_from_slice(&other.bytes[..n]);
        self.len = n;
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

pub struct SamplePlayer {
    config: SamplePlayerConfig,
    sample_rate: u32,
    executor: Option<Arc<dyn Executor>>,

    request: Arc<PlayRequest>,
    seen: u32,

    load_task: Arc<LoadTask>,
    load_counter: u32,
    load_position: u64,
    loading_file: FileName,

    gc_list: Arc<GcList>,
    gc_task: Arc<GcTask>,

    sample: Option<Box<Sample>>,
    loaded_file: FileName,
    requested_file: FileName,

    players: SmallVec<[ChannelPlayer; 2]>,
    outputs: SmallVec<[usize; 2]>,
}

impl SamplePlayer {
    pub fn new(config: SamplePlayerConfig) -> Result<Self> {
        config.validate()?;
        let gc_list = Arc::new(GcList::new());
        let request = Arc::new(PlayRequest::new(config.path_capacity));
        Ok(Self {
            sample_rate: 0,
            executor: None,
            seen: request.counter(),
            request,
            load_task: Arc::new(LoadTask::new(config.path_capacity)),
            load_counter: 0,
            load_position: 0,
            loading_file: FileName::new(config.path_capacity),
            gc_task: Arc::new(GcTask::new(Arc::clone(&gc_list))),
            gc_list,
            sample: None,
            loaded_file: FileName::new(config.path_capacity),
            requested_file: FileName::new(config.path_capacity),
            players: SmallVec::new(),
            outputs: SmallVec::new(),
            config,
        })
    }

    /// Attach the executor and resolve output ports from `meta`.
    ///
    /// Outputs come from the main output group of the configured layout
    /// (center for mono, left and right for stereo). Without one, the first
    /// audio outputs not claimed by any group are used. A mono player that
    /// still has no output takes the first channel of the main output group.
    /// Finding fewer outputs than configured is not an error; missing
    /// channels are silent.
    pub fn init(&mut self, executor: Arc<dyn Executor>, meta: &PluginMetadata) -> Result<()> {
        self.executor = Some(executor);
        self.outputs = resolve_outputs(meta, self.config.channels);
        let count = self.outputs.len();
        self.players = (0..count)
            .map(|i| ChannelPlayer::new(i, count, self.config.max_playbacks))
            .collect();
        if let Some(sample) = self.sample.as_deref() {
            for p in &mut self.players {
                p.bind(sample.channels());
            }
        }
        if count == 0 {
            tracing::warn!("Sample player found no audio outputs in {}", meta.uid);
        } else {
            tracing::debug!("Sample player bound to {} output(s) of {}", count, meta.uid);
        }
        Ok(())
    }

    /// Rate loaded files are resampled to. Zero keeps the file rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn requester(&self) -> SampleRequester {
        SampleRequester {
            request: Arc::clone(&self.request),
        }
    }

    /// See [`SampleRequester::play_sample`].
    pub fn play_sample(&self, file: &str, position: u64, release: bool) {
        self.requester().play_sample(file, position, release);
    }

    /// Port indices rendered into, in output order.
    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    pub fn playing(&self) -> bool {
        self.players.iter().any(ChannelPlayer::playing)
    }

    pub fn loaded(&self) -> bool {
        self.sample.is_some()
    }

    /// File name of the bound sample.
    pub fn loaded_file(&self) -> Option<&str> {
        self.sample.as_ref()?;
        std::str::from_utf8(self.loaded_file.as_bytes()).ok()
    }

    pub fn load_task(&self) -> &Arc<LoadTask> {
        &self.load_task
    }

    pub fn gc_task(&self) -> &Arc<GcTask> {
        &self.gc_task
    }

    pub fn set_gain(&mut self, gain: f32) {
        for p in &mut self.players {
            p.set_gain(gain);
        }
    }

    /// One block: handle requests, schedule collection, render `samples`
    /// frames into the output ports.
    pub fn process(&mut self, ports: &mut PortTable, samples: usize) {
        self.process_async_requests();
        self.process_gc();

        let sample = self.sample.as_deref();
        for (player, &index) in self.players.iter_mut().zip(&self.outputs) {
            if let Some(port) = ports.audio_mut(index) {
                let buf = port.buffer_mut();
                let n = samples.min(buf.len());
                player.render(sample, &mut buf[..n]);
            }
        }
    }

    /// Render into caller-provided buffers, one per output.
    pub fn render(&mut self, outputs: &mut [&mut [f32]]) {
        let sample = self.sample.as_deref();
        for (player, out) in self.players.iter_mut().zip(outputs.iter_mut()) {
            player.render(sample, out);
        }
    }

    /// Reap a finished load, then act on the newest request.
    ///
    /// Release, cancel and same-file restarts apply in the block that sees
    /// them. Only a new load waits for the load slot to free up.
    pub fn process_async_requests(&mut self) {
        self.reap_load();

        if self.request.counter() == self.seen {
            return;
        }
        let Some(req) = self.request.snapshot(&mut self.requested_file) else {
            return;
        };
        if req.counter == self.seen {
            return;
        }

        if req.release {
            self.unbind();
        }
        if req.len == 0 {
            self.cancel();
            self.seen = req.counter;
            return;
        }
        if self.sample.is_some() && self.requested_file.as_bytes() == self.loaded_file.as_bytes()
        {
            self.start(req.position);
            self.seen = req.counter;
            return;
        }

        // At most one load in flight; the request stays pending until then
        if !self.load_task.idle() {
            return;
        }
        let Some(executor) = self.executor.as_ref() else {
            return;
        };
        if !self.load_task.prepare(
            self.requested_file.as_bytes(),
            self.sample_rate,
            self.config.normalize,
        ) {
            return;
        }
        let task: Arc<dyn Task> = self.load_task.clone();
        if executor.submit(task) {
            self.seen = req.counter;
            self.load_counter = req.counter;
            self.load_position = req.position;
            self.loading_file.copy_from(&self.requested_file);
        }
    }

    fn reap_load(&mut self) {
        if !self.load_task.completed() {
            return;
        }
        let result = self.load_task.take_result();
        let current = self.load_task.successful() && self.request.counter() == self.load_counter;
        match result {
            Some(sample) if current => {
                self.bind(sample);
                self.loaded_file.copy_from(&self.loading_file);
                self.start(self.load_position);
            }
            Some(sample) => self.gc_list.push(sample),
            None => {}
        }
        self.load_task.reset();
    }

    /// Submit the collector when something is waiting and it is free.
    pub fn process_gc(&mut self) {
        if self.gc_task.completed() {
            self.gc_task.reset();
        }
        if self.gc_list.is_empty() || !self.gc_task.idle() {
            return;
        }
        if let Some(executor) = self.executor.as_ref() {
            let task: Arc<dyn Task> = self.gc_task.clone();
            executor.submit(task);
        }
    }

    fn bind(&mut self, sample: Box<Sample>) {
        self.unbind();
        for p in &mut self.players {
            p.bind(sample.channels());
        }
        self.sample = Some(sample);
    }

    fn unbind(&mut self) {
        for p in &mut self.players {
            p.unbind();
        }
        if let Some(old) = self.sample.take() {
            self.gc_list.push(old);
        }
        self.loaded_file.clear();
    }

    fn start(&mut self, position: u64) {
        let position = usize::try_from(position).unwrap_or(usize::MAX);
        for p in &mut self.players {
            p.start(position);
        }
    }

    fn cancel(&mut self) {
        for p in &mut self.players {
            p.cancel();
        }
    }

    /// Stop playback and free every sample the player holds. Call from a
    /// non-real-time thread.
    pub fn destroy(&mut self) {
        self.unbind();
        drop(self.load_task.take_result());
        let freed = self.gc_task.perform_gc();
        if freed > 0 {
            tracing::debug!("Sample player released {} sample(s)", freed);
        }
    }
}

impl Drop for SamplePlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn resolve_outputs(meta: &PluginMetadata, channels: usize) -> SmallVec<[usize; 2]> {
    let (kind, roles): (GroupKind, &[ChannelRole]) = if channels == 1 {
        (GroupKind::Mono, &[ChannelRole::Center])
    } else {
        (GroupKind::Stereo, &[ChannelRole::Left, ChannelRole::Right])
    };

    let group = meta
        .groups
        .iter()
        .filter(|g| g.output && g.kind == kind)
        .min_by_key(|g| !g.main);
    if let Some(group) = group {
        let found: SmallVec<[usize; 2]> = roles
            .iter()
            .filter_map(|&role| group.port(role).and_then(|id| meta.find(id)))
            .collect();
        if found.len() == roles.len() {
            return found;
        }
    }

    let claimed = |id: &str| {
        meta.groups
            .iter()
            .any(|g| g.items.iter().any(|(port, _)| port == id))
    };
    let loose: SmallVec<[usize; 2]> = meta
        .ports
        .iter()
        .enumerate()
        .filter(|(_, d)| d.role == Role::Audio && d.is_output() && !claimed(&d.id))
        .map(|(i, _)| i)
        .take(channels)
        .collect();
    if !loose.is_empty() || channels != 1 {
        return loose;
    }

    // Mono player on a plugin with only multichannel groups: first channel
    // of the main output group
    meta.groups
        .iter()
        .filter(|g| g.output)
        .min_by_key(|g| !g.main)
        .and_then(|g| {
            g.port(ChannelRole::Left)
                .or_else(|| g.items.first().map(|(id, _)| id.as_str()))
        })
        .and_then(|id| meta.find(id))
        .into_iter()
        .collect()
}
