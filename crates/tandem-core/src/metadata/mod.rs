//! Static port and plugin descriptions.
//!
//! Descriptors are immutable for the lifetime of the process. Backend and
//! mirror ports only ever read them.

mod range;
mod registry;

pub use range::PortRange;
pub use registry::PluginRegistry;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::{BitOr, BitOrAssign};

/// What a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Audio,
    Control,
    Meter,
    Mesh,
    Stream,
    FrameBuffer,
    Path,
    String,
    Osc,
    Bypass,
    PortSet,
}

impl Role {
    /// Roles that carry a single float value.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Role::Control | Role::Meter | Role::Bypass | Role::PortSet
        )
    }
}

/// Measurement unit of a port value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    None,
    Bool,
    Samples,
    Seconds,
    Millis,
    Hz,
    Db,
    Gain,
    Percent,
    Bar,
    Semitones,
    Cents,
    Degrees,
}

/// Port flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortFlags(u32);

impl PortFlags {
    /// Port is written by the DSP and read by the UI.
    pub const OUTPUT: Self = Self(1 << 0);
    /// Logarithmic scale.
    pub const LOG: Self = Self(1 << 1);
    /// Integer values only.
    pub const INT: Self = Self(1 << 2);
    /// Momentary value, resets after being handled.
    pub const TRIGGER: Self = Self(1 << 3);
    /// Value wraps around at the range bounds.
    pub const CYCLIC: Self = Self(1 << 4);
    /// Meter holds the peak between two UI polls.
    pub const PEAK: Self = Self(1 << 5);
    /// Host may leave the port unconnected.
    pub const OPTIONAL: Self = Self(1 << 6);
    /// Clamp to `max`.
    pub const UPPER: Self = Self(1 << 7);
    /// Clamp to `min`.
    pub const LOWER: Self = Self(1 << 8);
    /// Value is quantized to `step`.
    pub const STEP: Self = Self(1 << 9);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for PortFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PortFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

const BOUNDED: PortFlags = PortFlags::LOWER.union(PortFlags::UPPER);

/// Static description of one port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Unique within the plugin.
    pub id: String,
    pub role: Role,
    pub unit: Unit,
    pub range: PortRange,
    pub flags: PortFlags,
    /// Byte capacity (string, path, OSC), items per buffer (mesh),
    /// samples per channel (stream). `None` takes the engine default.
    pub capacity: Option<usize>,
    /// Buffers (mesh), channels (stream), columns (frame buffer),
    /// selectable items (port set).
    pub buffers: usize,
    /// Rows kept by a frame buffer.
    pub rows: usize,
}

impl PortDescriptor {
    fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            unit: Unit::None,
            range: PortRange::unit(),
            flags: PortFlags::empty(),
            capacity: None,
            buffers: 0,
            rows: 0,
        }
    }

    pub fn audio_in(id: impl Into<String>) -> Self {
        Self::new(id, Role::Audio)
    }

    pub fn audio_out(id: impl Into<String>) -> Self {
        Self::new(id, Role::Audio).flags(PortFlags::OUTPUT)
    }

    /// Input control clamped to `range`.
    pub fn control(id: impl Into<String>, range: PortRange) -> Self {
        let mut desc = Self::new(id, Role::Control).flags(BOUNDED);
        desc.range = range;
        desc
    }

    /// Output meter. Add [`PortFlags::PEAK`] for peak-holding meters.
    pub fn meter(id: impl Into<String>, range: PortRange) -> Self {
        let mut desc = Self::new(id, Role::Meter).flags(PortFlags::OUTPUT);
        desc.range = range;
        desc
    }

    pub fn mesh(id: impl Into<String>, buffers: usize, items: usize) -> Self {
        let mut desc = Self::new(id, Role::Mesh).flags(PortFlags::OUTPUT);
        desc.buffers = buffers;
        desc.capacity = Some(items);
        desc
    }

    pub fn stream(id: impl Into<String>, channels: usize, capacity: usize) -> Self {
        let mut desc = Self::new(id, Role::Stream).flags(PortFlags::OUTPUT);
        desc.buffers = channels;
        desc.capacity = Some(capacity);
        desc
    }

    pub fn frame_buffer(id: impl Into<String>, rows: usize, cols: usize) -> Self {
        let mut desc = Self::new(id, Role::FrameBuffer).flags(PortFlags::OUTPUT);
        desc.rows = rows;
        desc.buffers = cols;
        desc
    }

    pub fn path(id: impl Into<String>) -> Self {
        Self::new(id, Role::Path)
    }

    pub fn string(id: impl Into<String>, capacity: usize) -> Self {
        let mut desc = Self::new(id, Role::String);
        desc.capacity = Some(capacity);
        desc
    }

    /// OSC packets from the UI to the DSP.
    pub fn osc_in(id: impl Into<String>) -> Self {
        Self::new(id, Role::Osc)
    }

    /// OSC packets from the DSP to the UI.
    pub fn osc_out(id: impl Into<String>) -> Self {
        Self::new(id, Role::Osc).flags(PortFlags::OUTPUT)
    }

    /// Plugin "enabled" switch, 1.0 = processing.
    pub fn bypass(id: impl Into<String>) -> Self {
        let mut desc = Self::new(id, Role::Bypass).flags(BOUNDED | PortFlags::INT);
        desc.range = PortRange::toggle(true);
        desc.unit = Unit::Bool;
        desc
    }

    /// Selector over `count` port groups.
    pub fn port_set(id: impl Into<String>, count: usize) -> Self {
        let max = count.saturating_sub(1) as i32;
        let mut desc = Self::new(id, Role::PortSet).flags(BOUNDED | PortFlags::INT);
        desc.range = PortRange::integer(0, max, 0);
        desc.buffers = count;
        desc
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn flags(mut self, flags: PortFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.role == Role::Meter || self.flags.contains(PortFlags::OUTPUT)
    }

    #[inline]
    pub fn is_peak(&self) -> bool {
        self.flags.contains(PortFlags::PEAK)
    }

    /// Bring `value` into this port's range.
    #[inline]
    pub fn limit(&self, value: f32) -> f32 {
        self.range.limit(value, self.flags)
    }
}

/// Channel layout of a port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Mono,
    Stereo,
}

/// Role of one port inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelRole {
    Center,
    Left,
    Right,
}

/// Named set of audio ports forming one logical bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortGroup {
    pub id: String,
    pub kind: GroupKind,
    /// Main bus of its direction.
    pub main: bool,
    pub output: bool,
    pub items: Vec<(String, ChannelRole)>,
}

impl PortGroup {
    pub fn mono_out(id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: GroupKind::Mono,
            main: true,
            output: true,
            items: vec![(port.into(), ChannelRole::Center)],
        }
    }

    pub fn stereo_out(
        id: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: GroupKind::Stereo,
            main: true,
            output: true,
            items: vec![
                (left.into(), ChannelRole::Left),
                (right.into(), ChannelRole::Right),
            ],
        }
    }

    /// Port id holding the given channel role, if any.
    pub fn port(&self, role: ChannelRole) -> Option<&str> {
        self.items
            .iter()
            .find(|(_, r)| *r == role)
            .map(|(id, _)| id.as_str())
    }
}

/// Everything the metadata system knows about one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub uid: String,
    pub name: String,
    pub ports: Vec<PortDescriptor>,
    pub groups: Vec<PortGroup>,
}

impl PluginMetadata {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            ports: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn port(mut self, desc: PortDescriptor) -> Self {
        self.ports.push(desc);
        self
    }

    pub fn group(mut self, group: PortGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Index of the port with this id.
    pub fn find(&self, id: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.id == id)
    }

    /// Reject duplicate port ids and groups naming unknown or non-audio ports.
    pub fn validate(&self) -> Result<()> {
        if self.uid.is_empty() {
            return Err(Error::BadArguments("plugin uid is empty".into()));
        }

        let mut seen = HashSet::with_capacity(self.ports.len());
        for port in &self.ports {
            if port.id.is_empty() {
                return Err(Error::BadArguments("port id is empty".into()));
            }
            if !seen.insert(port.id.as_str()) {
                return Err(Error::DuplicatePort(port.id.clone()));
            }
        }

        for group in &self.groups {
            for (id, _) in &group.items {
                match self.find(id) {
                    Some(index) if self.ports[index].role == Role::Audio => {}
                    Some(_) => {
                        return Err(Error::BadArguments(format!(
                            "group '{}' references non-audio port '{}'",
                            group.id, id
                        )))
                    }
                    None => return Err(Error::UnknownPort(id.clone())),
                }
            }
        }
        Ok(())
    }
}
