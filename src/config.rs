// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tuning knobs for the dispatch loop.
//!
//! All thresholds are expressed in counter ticks so that the interrupt handler
//! never has to convert units. [`Thresholds::for_rate`] derives a conservative
//! set from the counter's tick rate, which is what most applications want:
//!
//! ```ignore
//! const RATE: TickRate = TickRate::from_hz(48_000_000);
//! static CORE: TimerCore<TcAlarm> =
//!     TimerCore::new(unsafe { TcAlarm::tc4() }, Thresholds::for_rate(RATE));
//! ```
//!
//! If you adjust individual fields, run the result through
//! [`Thresholds::checked`] once at startup.

use core::fmt;

use crate::time::{TickRate, Ticks, HALF_RANGE};

/// Default minimum lead time, in microseconds, for a deadline to be armed in
/// hardware rather than waited for inline.
pub const DEFAULT_MIN_TRY_US: u32 = 2;
/// Default delay, in microseconds, before re-entering the handler after
/// yielding to pending work.
pub const DEFAULT_DEFER_REPEAT_US: u32 = 5;
/// Default length, in microseconds, of the retry window granted after
/// yielding.
pub const DEFAULT_REPEAT_US: u32 = 100;
/// Default length, in microseconds, of the retry window when nothing else
/// wants the CPU.
pub const DEFAULT_IDLE_REPEAT_US: u32 = 500;
/// Default lateness, in microseconds, at which a rescheduled timer is treated
/// as a fatal scheduling error.
pub const DEFAULT_FATAL_PAST_US: u32 = 1000;

/// Counter reads performed per tick of lead time during the inline wait.
///
/// This only sizes the default wait budget. When the CPU reads a slow counter
/// more often than this per tick, the budget runs out before the deadline and
/// the loop arms the alarm `min_try` ahead of the last reading instead, so the
/// timer runs a little late. Raise [`Thresholds::spin_limit`] with
/// [`Thresholds::with_cpu_clock`] to avoid that.
pub const SPIN_READS_PER_TICK: u32 = 16;

/// Thresholds controlling the dispatch loop's retry and deferral behavior.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Thresholds {
    /// A next deadline at least this far in the future is armed in hardware
    /// and the handler returns. Closer deadlines are waited for inline.
    pub min_try: Ticks,
    /// When yielding to pending work, the handler re-arms for `now +
    /// defer_repeat`.
    pub defer_repeat: Ticks,
    /// When yielding to pending work, the retry window is set to `now +
    /// repeat`.
    pub repeat: Ticks,
    /// When idle, the retry window is extended to `now + idle_repeat`.
    pub idle_repeat: Ticks,
    /// A due timer more than this far in the past, after the retry window has
    /// expired, is fatal.
    pub fatal_past: Ticks,
    /// Maximum number of counter reads in one inline wait.
    pub spin_limit: u32,
}

impl Thresholds {
    /// Derives the default thresholds for a counter running at `rate`.
    ///
    /// Each threshold is at least one tick, so slow counters still behave
    /// sensibly.
    pub const fn for_rate(rate: TickRate) -> Self {
        let min_try = at_least_one(rate.from_micros(DEFAULT_MIN_TRY_US));
        Self {
            min_try,
            defer_repeat: at_least_one(rate.from_micros(DEFAULT_DEFER_REPEAT_US)),
            repeat: at_least_one(rate.from_micros(DEFAULT_REPEAT_US)),
            idle_repeat: at_least_one(rate.from_micros(DEFAULT_IDLE_REPEAT_US)),
            fatal_past: at_least_one(rate.from_micros(DEFAULT_FATAL_PAST_US)),
            spin_limit: min_try.0.saturating_mul(SPIN_READS_PER_TICK),
        }
    }

    /// Checks that this set of thresholds is usable. See [`ConfigError`] for
    /// the rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("min_try", self.min_try),
            ("defer_repeat", self.defer_repeat),
            ("repeat", self.repeat),
            ("idle_repeat", self.idle_repeat),
            ("fatal_past", self.fatal_past),
        ];
        for (name, value) in fields {
            if value.0 == 0 {
                return Err(ConfigError::Zero(name));
            }
            // The whole point of these is to be compared against signed
            // differences; anything near half the range can't be.
            if value.0 >= HALF_RANGE / 2 {
                return Err(ConfigError::TooLarge(name));
            }
        }
        if self.fatal_past <= self.min_try {
            return Err(ConfigError::FatalWithinMinTry);
        }
        if self.idle_repeat < self.repeat {
            return Err(ConfigError::IdleShorterThanBusy);
        }
        if self.spin_limit == 0 {
            return Err(ConfigError::Zero("spin_limit"));
        }
        Ok(())
    }

    /// Sizes the wait budget for a CPU running at `cpu` reading a counter
    /// running at `counter`, assuming at most one counter read per CPU cycle.
    pub const fn with_cpu_clock(mut self, cpu: TickRate, counter: TickRate) -> Self {
        let per_tick = cpu.hz() / counter.hz();
        let per_tick = if per_tick < SPIN_READS_PER_TICK {
            SPIN_READS_PER_TICK
        } else {
            per_tick
        };
        self.spin_limit = self.min_try.0.saturating_mul(per_tick);
        self
    }

    /// Validates `self`, passing it through on success.
    pub fn checked(self) -> Result<Self, ConfigError> {
        self.validate().map(|()| self)
    }

    /// Delay used to kick the alarm: long enough for the compare write to
    /// land before the counter passes it.
    pub const fn kick_delay(&self) -> Ticks {
        Ticks(self.min_try.0.saturating_mul(4))
    }

    /// Longest interval the resync task may sleep between resyncs while still
    /// keeping the retry window comparable with "now."
    ///
    /// This is a quarter of the wrap period, leaving the other quarter as
    /// margin for the window extensions the loop itself makes.
    pub const fn max_resync_interval(&self) -> Ticks {
        Ticks(HALF_RANGE / 2)
    }
}

const fn at_least_one(t: Ticks) -> Ticks {
    if t.0 == 0 {
        Ticks(1)
    } else {
        t
    }
}

/// Reasons [`Thresholds::validate`] can reject a configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The named field is zero.
    Zero(&'static str),
    /// The named field is a quarter of the counter range or more, which makes
    /// it useless for signed comparisons.
    TooLarge(&'static str),
    /// `fatal_past` must be larger than `min_try`, or ordinary jitter would be
    /// fatal.
    FatalWithinMinTry,
    /// `idle_repeat` must be at least `repeat`.
    IdleShorterThanBusy,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero(name) => write!(f, "threshold `{name}` must not be zero"),
            Self::TooLarge(name) => {
                write!(f, "threshold `{name}` must be under a quarter of the counter range")
            }
            Self::FatalWithinMinTry => f.write_str("`fatal_past` must exceed `min_try`"),
            Self::IdleShorterThanBusy => {
                f.write_str("`idle_repeat` must be at least `repeat`")
            }
        }
    }
}
