//! Numeric range of a control port.
//!
//! Provides limiting of values coming from the host or the UI, plus
//! normalized (0.0-1.0) ↔ real value conversion.
//!
//! # Example
//!
//! ```
//! use tandem_core::{PortFlags, PortRange};
//!
//! // Filter cutoff: 20Hz to 20kHz, logarithmic scaling
//! let cutoff = PortRange::new(20.0, 20000.0, 0.0, 1000.0);
//! let flags = PortFlags::LOG | PortFlags::LOWER | PortFlags::UPPER;
//!
//! let hz = cutoff.denormalize(0.5, flags); // ~632 Hz (geometric mean)
//! let back = cutoff.normalize(hz, flags); // ~0.5
//! assert!((back - 0.5).abs() < 1e-4);
//! ```

use super::PortFlags;
use serde::{Deserialize, Serialize};

/// Range of a port's value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortRange {
    /// Minimum real value
    pub min: f32,
    /// Maximum real value
    pub max: f32,
    /// Step for integer and stepped controls (0 = continuous)
    pub step: f32,
    /// Default real value
    pub default: f32,
}

impl PortRange {
    /// Create a new range. `default` is clamped into `[min, max]`.
    pub fn new(min: f32, max: f32, step: f32, default: f32) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            step,
            default: default.clamp(lo, hi),
        }
    }

    /// 0.0 .. 1.0 continuous.
    pub fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 0.0)
    }

    /// Off/on toggle.
    pub fn toggle(default_on: bool) -> Self {
        Self::new(0.0, 1.0, 1.0, if default_on { 1.0 } else { 0.0 })
    }

    /// Integer range.
    pub fn integer(min: i32, max: i32, default: i32) -> Self {
        Self::new(min as f32, max as f32, 1.0, default as f32)
    }

    #[inline]
    fn bounds(&self) -> (f32, f32) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }

    /// Bring a value into the range according to the port flags.
    ///
    /// `CYCLIC` wraps into `[min, max)`, otherwise `LOWER`/`UPPER` clamp.
    /// `STEP` then snaps to the nearest `min + k * step` that stays in range,
    /// and `INT` rounds to the nearest integer last.
    pub fn limit(&self, value: f32, flags: PortFlags) -> f32 {
        if !value.is_finite() {
            return self.default;
        }
        let (lo, hi) = self.bounds();
        let mut v = value;

        if flags.contains(PortFlags::CYCLIC) {
            let span = hi - lo;
            if span > 0.0 {
                v = lo + (v - lo).rem_euclid(span);
            }
        } else {
            if flags.contains(PortFlags::UPPER) && v > hi {
                v = hi;
            }
            if flags.contains(PortFlags::LOWER) && v < lo {
                v = lo;
            }
        }

        if flags.contains(PortFlags::STEP) && self.step > 0.0 {
            v = self.quantize(v, flags);
        }
        if flags.contains(PortFlags::INT) {
            v = v.round();
        }
        v
    }

    fn quantize(&self, value: f32, flags: PortFlags) -> f32 {
        let (lo, hi) = self.bounds();
        let v = lo + ((value - lo) / self.step).round() * self.step;
        if flags.contains(PortFlags::CYCLIC) {
            return if v >= hi { lo } else { v };
        }
        // Rounding must not push a clamped value back out of range
        if flags.contains(PortFlags::UPPER) && v > hi {
            return v - self.step;
        }
        if flags.contains(PortFlags::LOWER) && v < lo {
            return v + self.step;
        }
        v
    }

    /// Convert a real value to normalized (0.0-1.0).
    #[inline]
    pub fn normalize(&self, value: f32, flags: PortFlags) -> f32 {
        let (lo, hi) = self.bounds();
        let value = value.clamp(lo, hi);
        let span = hi - lo;

        if span <= 0.0 {
            return 0.0;
        }

        if flags.contains(PortFlags::LOG) && lo > 0.0 {
            let log_min = lo.ln();
            let log_max = hi.ln();
            (value.ln() - log_min) / (log_max - log_min)
        } else {
            (value - lo) / span
        }
    }

    /// Convert a normalized value (0.0-1.0) to a real value.
    #[inline]
    pub fn denormalize(&self, normalized: f32, flags: PortFlags) -> f32 {
        let normalized = normalized.clamp(0.0, 1.0);
        let (lo, hi) = self.bounds();

        let value = if flags.contains(PortFlags::LOG) && lo > 0.0 {
            let log_min = lo.ln();
            let log_max = hi.ln();
            (log_min + normalized * (log_max - log_min)).exp()
        } else {
            lo + normalized * (hi - lo)
        };

        if flags.contains(PortFlags::INT) {
            value.round()
        } else {
            value
        }
    }

    /// Check if a real value is within range.
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        let (lo, hi) = self.bounds();
        value >= lo && value <= hi
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::unit()
    }
}
