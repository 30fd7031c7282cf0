//! Drains pending KVT changes in both directions.

use super::{KvtFlags, KvtIterator, KvtParam, KvtStorage, SharedKvt};
use crate::Status;

/// Default bound on enumeration passes per direction and sync.
const MAX_PASSES: usize = 8;

/// Counts of one [`KvtSynchronizer::sync`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KvtSyncReport {
    /// Entries delivered from the DSP to the UI.
    pub to_ui: usize,
    /// Entries delivered from the UI to the DSP.
    pub to_dsp: usize,
    /// Entries reclaimed by garbage collection.
    pub collected: usize,
}

/// Delivers pending entries and commits each one once.
///
/// Delivery callbacks receive the entry name and its value (`None` for a
/// removal) and return [`Status::Ok`] once the change is handed over. Any
/// other status leaves the entry pending for the next sync.
#[derive(Debug, Clone, Copy)]
pub struct KvtSynchronizer {
    max_passes: usize,
}

impl Default for KvtSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl KvtSynchronizer {
    pub fn new() -> Self {
        Self {
            max_passes: MAX_PASSES,
        }
    }

    pub fn with_max_passes(max_passes: usize) -> Self {
        Self {
            max_passes: max_passes.max(1),
        }
    }

    /// Drain TX (DSP to UI), then RX (UI to DSP), then collect garbage.
    pub fn sync<U, D>(
        &self,
        storage: &mut KvtStorage,
        mut to_ui: U,
        mut to_dsp: D,
    ) -> KvtSyncReport
    where
        U: FnMut(&str, Option<&KvtParam>) -> Status,
        D: FnMut(&str, Option<&KvtParam>) -> Status,
    {
        let to_ui = self.drain(storage, KvtFlags::TX, &mut to_ui);
        let to_dsp = self.drain(storage, KvtFlags::RX, &mut to_dsp);
        let collected = storage.gc();

        if to_ui + to_dsp + collected > 0 {
            tracing::trace!(
                "KVT sync: {} to UI, {} to DSP, {} collected",
                to_ui,
                to_dsp,
                collected
            );
        }
        KvtSyncReport {
            to_ui,
            to_dsp,
            collected,
        }
    }

    /// Same as [`sync`](Self::sync) on shared storage. Blocks on the lock,
    /// so call it from the UI thread or an executor, never from the DSP.
    pub fn sync_shared<U, D>(&self, storage: &SharedKvt, to_ui: U, to_dsp: D) -> KvtSyncReport
    where
        U: FnMut(&str, Option<&KvtParam>) -> Status,
        D: FnMut(&str, Option<&KvtParam>) -> Status,
    {
        let mut guard = storage.lock();
        self.sync(&mut guard, to_ui, to_dsp)
    }

    fn drain(
        &self,
        storage: &mut KvtStorage,
        direction: KvtFlags,
        deliver: &mut dyn FnMut(&str, Option<&KvtParam>) -> Status,
    ) -> usize {
        let mut total = 0;
        for _ in 0..self.max_passes {
            let mut it = if direction == KvtFlags::TX {
                storage.enum_tx_pending()
            } else {
                storage.enum_rx_pending()
            };
            let progress = drain_pass(&mut it, direction, deliver);
            if progress == 0 {
                break;
            }
            total += progress;
        }
        total
    }
}

fn drain_pass(
    it: &mut KvtIterator<'_>,
    direction: KvtFlags,
    deliver: &mut dyn FnMut(&str, Option<&KvtParam>) -> Status,
) -> usize {
    let mut progress = 0;
    while it.next() {
        let Some(name) = it.name() else {
            break;
        };
        if !deliver(name, it.value()).is_ok() {
            // Receiver is full, retry on the next sync
            break;
        }
        if it.commit(direction).is_ok() {
            progress += 1;
        }
    }
    progress
}
