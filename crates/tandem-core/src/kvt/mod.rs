//! Key-value tree: sparse named parameters outside the fixed port list.
//!
//! Names are absolute `/`-separated paths. Every entry carries two pending
//! bits, one per direction: [`KvtFlags::TX`] (DSP to UI) and
//! [`KvtFlags::RX`] (UI to DSP). Writers raise the bit for the direction the
//! change must travel; the [`KvtSynchronizer`] delivers pending entries and
//! commits each bit once. Removed entries stay as tombstones until delivered
//! and collected by [`KvtStorage::gc`].

mod sync;

pub use sync::{KvtSyncReport, KvtSynchronizer};

use crate::Status;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Bound, BitOr};
use std::sync::Arc;

/// Storage shared between the UI thread and the processing thread.
/// The processing thread only ever calls `try_lock`.
pub type SharedKvt = Arc<Mutex<KvtStorage>>;

/// Parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvtParam {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Blob {
        content_type: Option<String>,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KvtFlags(u8);

impl KvtFlags {
    /// Pending delivery from the UI to the DSP.
    pub const RX: Self = Self(1 << 0);
    /// Pending delivery from the DSP to the UI.
    pub const TX: Self = Self(1 << 1);
    /// Never transmitted.
    pub const PRIVATE: Self = Self(1 << 2);
    /// Dropped once delivered in every pending direction.
    pub const TRANSIENT: Self = Self(1 << 3);

    const DIRECTIONS: Self = Self(Self::RX.0 | Self::TX.0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    const fn only(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl BitOr for KvtFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    /// `None` marks a tombstone.
    param: Option<KvtParam>,
    pending: KvtFlags,
    transient: bool,
}

/// Check an entry name: `/a/b`, no empty segments, no trailing slash.
pub fn validate_name(name: &str) -> Status {
    if name.len() < 2 || !name.starts_with('/') || name.ends_with('/') {
        return Status::BadArguments;
    }
    if name[1..].split('/').any(str::is_empty) {
        return Status::BadArguments;
    }
    Status::Ok
}

#[derive(Debug, Default)]
pub struct KvtStorage {
    entries: BTreeMap<String, Entry>,
}

impl KvtStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap for sharing between threads.
    pub fn shared(self) -> SharedKvt {
        Arc::new(Mutex::new(self))
    }

    /// Live (non-tombstone) entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.param.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a value. `flags` selects the pending directions; `PRIVATE`
    /// suppresses them, `TRANSIENT` drops the entry once delivered.
    pub fn put(&mut self, name: &str, param: KvtParam, flags: KvtFlags) -> Status {
        let status = validate_name(name);
        if !status.is_ok() {
            return status;
        }
        let pending = pending_bits(flags);
        let transient = flags.contains(KvtFlags::TRANSIENT);
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.param = Some(param);
                entry.pending = entry.pending | pending;
                entry.transient = transient;
            }
            None => {
                self.entries.insert(
                    name.to_owned(),
                    Entry {
                        param: Some(param),
                        pending,
                        transient,
                    },
                );
            }
        }
        Status::Ok
    }

    pub fn get(&self, name: &str) -> Result<&KvtParam, Status> {
        let status = validate_name(name);
        if !status.is_ok() {
            return Err(status);
        }
        self.entries
            .get(name)
            .and_then(|e| e.param.as_ref())
            .ok_or(Status::NoData)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Turn the entry into a tombstone so the removal is delivered too.
    pub fn remove(&mut self, name: &str, flags: KvtFlags) -> Result<KvtParam, Status> {
        let status = validate_name(name);
        if !status.is_ok() {
            return Err(status);
        }
        let entry = self.entries.get_mut(name).ok_or(Status::NoData)?;
        let param = entry.param.take().ok_or(Status::NoData)?;
        entry.pending = entry.pending | pending_bits(flags);
        Ok(param)
    }

    /// Mark an entry pending again without changing it.
    pub fn touch(&mut self, name: &str, flags: KvtFlags) -> Status {
        let status = validate_name(name);
        if !status.is_ok() {
            return status;
        }
        match self.entries.get_mut(name) {
            Some(entry) if entry.param.is_some() => {
                entry.pending = entry.pending | pending_bits(flags);
                Status::Ok
            }
            _ => Status::NoData,
        }
    }

    /// Live entries whose name starts with `branch` (which must end in `/`).
    pub fn enum_branch<'a>(
        &'a self,
        branch: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a KvtParam)> + 'a {
        let valid = branch.starts_with('/') && branch.ends_with('/');
        self.entries
            .range::<str, _>((Bound::Included(branch), Bound::Unbounded))
            .take_while(move |(name, _)| valid && name.starts_with(branch))
            .filter_map(|(name, e)| e.param.as_ref().map(|p| (name.as_str(), p)))
    }

    /// Entries waiting to travel from the DSP to the UI.
    pub fn enum_tx_pending(&mut self) -> KvtIterator<'_> {
        KvtIterator::new(self, KvtFlags::TX)
    }

    /// Entries waiting to travel from the UI to the DSP.
    pub fn enum_rx_pending(&mut self) -> KvtIterator<'_> {
        KvtIterator::new(self, KvtFlags::RX)
    }

    /// Clear `flag` on every entry. Returns the number of entries touched.
    pub fn commit_all(&mut self, flag: KvtFlags) -> usize {
        let flag = flag.only(KvtFlags::DIRECTIONS);
        let mut count = 0;
        for entry in self.entries.values_mut() {
            if entry.pending.intersects(flag) {
                entry.pending = entry.pending.without(flag);
                count += 1;
            }
        }
        count
    }

    /// Number of entries pending in the given direction.
    pub fn pending(&self, flag: KvtFlags) -> usize {
        self.entries
            .values()
            .filter(|e| e.pending.intersects(flag))
            .count()
    }

    /// Drop delivered tombstones and delivered transient entries.
    /// Returns the number of entries reclaimed.
    pub fn gc(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| !e.pending.is_empty() || (e.param.is_some() && !e.transient));
        before - self.entries.len()
    }
}

fn pending_bits(flags: KvtFlags) -> KvtFlags {
    if flags.contains(KvtFlags::PRIVATE) {
        KvtFlags::empty()
    } else {
        flags.only(KvtFlags::DIRECTIONS)
    }
}

/// Cursor over entries pending in one direction.
///
/// Walks names in order; entries changed behind the cursor are picked up by
/// the next enumeration.
pub struct KvtIterator<'a> {
    storage: &'a mut KvtStorage,
    direction: KvtFlags,
    current: Option<String>,
}

impl<'a> KvtIterator<'a> {
    fn new(storage: &'a mut KvtStorage, direction: KvtFlags) -> Self {
        Self {
            storage,
            direction,
            current: None,
        }
    }

    /// Advance to the next pending entry. False at the end.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let lower = match &self.current {
            Some(name) => Bound::Excluded(name.as_str()),
            None => Bound::Unbounded,
        };
        let direction = self.direction;
        let next = self
            .storage
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .find(|(_, e)| e.pending.intersects(direction))
            .map(|(name, _)| name.clone());
        self.current = next;
        self.current.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Current value; `None` for a removal.
    pub fn value(&self) -> Option<&KvtParam> {
        let name = self.current.as_deref()?;
        self.storage.entries.get(name)?.param.as_ref()
    }

    /// Clear `flag` on the current entry. `NoData` if there is none or it
    /// was already committed.
    pub fn commit(&mut self, flag: KvtFlags) -> Status {
        let Some(name) = self.current.as_deref() else {
            return Status::NoData;
        };
        let Some(entry) = self.storage.entries.get_mut(name) else {
            return Status::NoData;
        };
        let flag = flag.only(KvtFlags::DIRECTIONS);
        if !entry.pending.intersects(flag) {
            return Status::NoData;
        }
        entry.pending = entry.pending.without(flag);
        Status::Ok
    }
}
