// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wraparound-safe timekeeping on a 32-bit free-running counter.
//!
//! # Types for describing time
//!
//! `TickTime` represents a specific point in time, measured as the value of the
//! hardware's free-running counter. Unlike a 64-bit uptime counter, this one
//! is only 32 bits wide and *does* wrap -- at typical timer clock rates it
//! comes around every minute or so. That means two `TickTime`s can't be
//! compared with `<`. Instead, they're compared by looking at the sign of their
//! wrapping difference, which gives the right answer as long as the two times
//! are less than 2^31 ticks apart. `TickTime` intentionally doesn't implement
//! `PartialOrd`, so you can't get this wrong by accident.
//!
//! `Ticks` represents a relative time interval measured in counter ticks. This
//! uses the same representation as `TickTime`, so adding them together is a
//! single wrapping add.
//!
//! `TickRate` describes how fast the counter runs, and converts microseconds
//! into `Ticks`.
//!
//! # Keeping comparisons honest
//!
//! Any stored `TickTime` that might be compared against "now" later has to be
//! refreshed more often than once per half wrap period, or it will silently
//! flip from "long ago" to "far in the future." The dispatch core does this for
//! its own state; see [`crate::task`].

use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Half of the counter range. Two times separated by this much or more can't
/// be ordered.
pub const HALF_RANGE: u32 = 1 << 31;

/// A moment in time, as the value of the 32-bit hardware counter.
///
/// Comparisons must go through [`TickTime::is_before`] or
/// [`TickTime::wrapping_diff`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TickTime(u32);

impl TickTime {
    /// Wraps a raw counter value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Gets the raw counter value back out.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks whether `self` comes strictly before `other` on the circular
    /// timeline.
    ///
    /// This is only meaningful if the two times are less than 2^31 ticks
    /// apart. Past that, the answer flips.
    #[inline]
    pub const fn is_before(self, other: TickTime) -> bool {
        self.wrapping_diff(other) < 0
    }

    /// Computes `self - other` as a signed tick count. Positive means `self` is
    /// later.
    #[inline]
    pub const fn wrapping_diff(self, other: TickTime) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    /// Adds `ticks` with wraparound. Equivalent to `+`.
    #[inline]
    pub const fn wrapping_add(self, ticks: Ticks) -> Self {
        Self(self.0.wrapping_add(ticks.0))
    }

    /// Subtracts `ticks` with wraparound. Equivalent to `-`.
    #[inline]
    pub const fn wrapping_sub(self, ticks: Ticks) -> Self {
        Self(self.0.wrapping_sub(ticks.0))
    }
}

impl fmt::Debug for TickTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TickTime({:#010x})", self.0)
    }
}

impl From<TickTime> for u32 {
    fn from(t: TickTime) -> Self {
        t.0
    }
}

/// Adds a span to a time, wrapping at 2^32. Wrapping is the normal condition
/// for this counter, so this never panics.
impl Add<Ticks> for TickTime {
    type Output = Self;
    fn add(self, other: Ticks) -> Self::Output {
        self.wrapping_add(other)
    }
}

impl AddAssign<Ticks> for TickTime {
    fn add_assign(&mut self, other: Ticks) {
        *self = self.wrapping_add(other);
    }
}

impl Sub<Ticks> for TickTime {
    type Output = Self;
    fn sub(self, other: Ticks) -> Self::Output {
        self.wrapping_sub(other)
    }
}

/// A span of time measured in counter ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Ticks(pub u32);

impl Ticks {
    /// A zero-length span.
    pub const ZERO: Self = Ticks(0);

    /// Gets the span as a signed value, for comparing against a
    /// [`TickTime::wrapping_diff`]. Spans of 2^31 or more saturate.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        if self.0 >= HALF_RANGE {
            i32::MAX
        } else {
            self.0 as i32
        }
    }
}

impl From<u32> for Ticks {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<Ticks> for u32 {
    fn from(x: Ticks) -> Self {
        x.0
    }
}

/// The rate at which the hardware counter advances.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickRate {
    hz: u32,
}

impl TickRate {
    /// Describes a counter running at `hz` ticks per second.
    ///
    /// # Panics
    ///
    /// If `hz` is zero. In a `const` context, that's a compile error.
    pub const fn from_hz(hz: u32) -> Self {
        if hz == 0 {
            panic!("tick rate must not be zero");
        }
        Self { hz }
    }

    /// Ticks per second.
    pub const fn hz(self) -> u32 {
        self.hz
    }

    /// Whole ticks per microsecond, rounded down. Zero for counters slower than
    /// 1 MHz.
    pub const fn ticks_per_micro(self) -> u32 {
        self.hz / 1_000_000
    }

    /// Converts a number of microseconds into the closest whole number of
    /// ticks. Results that don't fit in 32 bits saturate.
    pub const fn from_micros(self, us: u32) -> Ticks {
        // 2^32 * 2^32 can't overflow a u64, and the rounding bias is tiny in
        // comparison.
        let t = (self.hz as u64 * us as u64 + 500_000) / 1_000_000;
        if t > u32::MAX as u64 {
            Ticks(u32::MAX)
        } else {
            Ticks(t as u32)
        }
    }
}
