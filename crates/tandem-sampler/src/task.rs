//! Executor tasks owned by a sample player.

use crate::{GcList, Sample};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tandem_core::{StringSlot, Task, TaskStatus};

/// Loads one file in the background.
///
/// The player fills in the file name while the task is idle, submits it,
/// and takes the result once it completes.
pub struct LoadTask {
    status: TaskStatus,
    file: StringSlot,
    sample_rate: AtomicU32,
    normalize: AtomicBool,
    result: Mutex<Option<Box<Sample>>>,
}

impl LoadTask {
    pub fn new(path_capacity: usize) -> Self {
        Self {
            status: TaskStatus::new(),
            file: StringSlot::new(path_capacity),
            sample_rate: AtomicU32::new(0),
            normalize: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }

    /// Set the next job. Only valid while idle; false otherwise.
    ///
    /// A `sample_rate` of zero keeps the file's own rate.
    pub fn prepare(&self, file: &[u8], sample_rate: u32, normalize: bool) -> bool {
        if !self.status.idle() || self.file.try_submit(file).is_none() {
            return false;
        }
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.normalize.store(normalize, Ordering::Relaxed);
        true
    }

    /// File name of the current job.
    pub fn file(&self) -> String {
        let mut buf = vec![0u8; self.file.capacity() + 1];
        match self.file.read(&mut buf) {
            Some((len, _)) => String::from_utf8_lossy(&buf[..len]).into_owned(),
            None => String::new(),
        }
    }

    /// Take the loaded sample. Never blocks.
    pub fn take_result(&self) -> Option<Box<Sample>> {
        self.result.try_lock().and_then(|mut r| r.take())
    }

    fn load(&self, path: &str) -> crate::Result<Sample> {
        let mut sample = Sample::load(path)?;
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate != 0 && rate != sample.sample_rate() {
            sample = sample.resample(rate)?;
        }
        if self.normalize.load(Ordering::Relaxed) {
            sample.normalize();
        }
        Ok(sample)
    }
}

impl Task for LoadTask {
    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn run(&self) -> tandem_core::Result<()> {
        let path = self.file();
        let sample = self.load(&path)?;
        tracing::debug!(
            "Loaded {}: {} channel(s), {} frames at {} Hz",
            path,
            sample.channels(),
            sample.len(),
            sample.sample_rate()
        );
        // A result nobody picked up is replaced here, off the audio thread
        *self.result.lock() = Some(Box::new(sample));
        Ok(())
    }
}

/// Frees everything on a [`GcList`].
pub struct GcTask {
    status: TaskStatus,
    list: Arc<GcList>,
}

impl GcTask {
    pub fn new(list: Arc<GcList>) -> Self {
        Self {
            status: TaskStatus::new(),
            list,
        }
    }

    /// Take the list and drop every sample on it. Returns how many.
    pub fn perform_gc(&self) -> usize {
        self.list.take_all().count()
    }
}

impl Task for GcTask {
    fn status(&self) -> &TaskStatus {
        &self.status
    }

    fn run(&self) -> tandem_core::Result<()> {
        let freed = self.perform_gc();
        tracing::trace!("Collected {} sample(s)", freed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{Executor, ManualExecutor};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn write_wav(path: &std::path::Path, rate: u32, data: &[f32]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in data {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_task() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 22050, &[0.0, 0.25, 0.5, 0.25]);

        let task = Arc::new(LoadTask::new(256));
        let executor = ManualExecutor::default();
        assert!(task.prepare(path.to_str().unwrap().as_bytes(), 44100, true));
        assert!(executor.submit(task.clone()));
        assert!(!task.prepare(b"other.wav", 0, false), "busy task");
        executor.run_pending();

        assert!(task.successful());
        let sample = task.take_result().unwrap();
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.len(), 8);
        assert!((sample.peak() - 1.0).abs() < 1e-6);
        assert!(task.take_result().is_none());
    }

    #[test]
    fn test_load_task_failure() {
        let task = Arc::new(LoadTask::new(64));
        let executor = ManualExecutor::default();
        assert!(task.prepare(b"/no/such/file.wav", 0, false));
        executor.submit(task.clone());
        executor.run_pending();
        assert!(task.completed());
        assert!(!task.successful());
        assert!(task.take_result().is_none());
        assert!(task.reset());
        assert_eq!(task.file(), "/no/such/file.wav");
    }

    #[test]
    fn test_gc_task() {
        let list = Arc::new(GcList::new());
        let task = Arc::new(GcTask::new(Arc::clone(&list)));
        for _ in 0..3 {
            list.push(Box::new(Sample::from_channels(vec![vec![0.0; 16]], 44100).unwrap()));
        }
        let executor = ManualExecutor::default();
        executor.submit(task.clone());
        executor.run_pending();
        assert!(task.successful());
        assert!(list.is_empty());
        assert_eq!(task.perform_gc(), 0);
    }
}
