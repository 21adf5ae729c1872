// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the hardware counter and its compare/alarm register.
//!
//! Each hardware target supplies one implementation of [`HardwareAlarm`]; the
//! dispatch loop is written once against the trait. A port needs to provide:
//!
//! - A way to read the free-running counter (`now`).
//! - A way to program the compare register (`arm`).
//! - A way to mask and unmask the alarm's interrupt source, and *only* that
//!   source (`mask_source`, `unmask_source`).
//!
//! Optionally, it can also override `spin_scope` to let other interrupts run
//! while the dispatch loop busy-waits for an imminent deadline.
//!
//! The alarm's interrupt is the only thing that should ever cause dispatch. The
//! port's interrupt handler should do nothing but call
//! [`TimerCore::on_alarm`][crate::dispatch::TimerCore::on_alarm].

use crate::time::TickTime;

/// A free-running counter plus one compare-match interrupt.
///
/// All methods take `&self` because the alarm is used from both the interrupt
/// handler and task code; implementations are expected to be thin wrappers
/// around memory-mapped registers.
pub trait HardwareAlarm {
    /// Reads the current counter value.
    ///
    /// Must be safe to call from both interrupt and task context. Ports with a
    /// counter wider than 32 bits return the low 32 bits.
    fn now(&self) -> TickTime;

    /// Programs the compare register so that the interrupt fires at `next`.
    ///
    /// This must not wait for the write to take effect. Ports with a wider
    /// compare register should use [`extend_deadline`] to keep the high-order
    /// bits consistent with the running counter.
    fn arm(&self, next: TickTime);

    /// Masks this alarm's interrupt source, returning `true` if it was enabled
    /// before the call.
    fn mask_source(&self) -> bool;

    /// Unmasks this alarm's interrupt source.
    fn unmask_source(&self);

    /// Runs `body` during an inline busy-wait.
    ///
    /// The dispatch loop calls this with the alarm's own source masked. Ports
    /// that run the dispatch loop with *all* interrupts disabled can override
    /// this to open them up for the duration; the default just runs `body`.
    fn spin_scope<R>(&self, body: impl FnOnce() -> R) -> R {
        body()
    }
}

impl<A: HardwareAlarm> HardwareAlarm for &A {
    fn now(&self) -> TickTime {
        (**self).now()
    }

    fn arm(&self, next: TickTime) {
        (**self).arm(next)
    }

    fn mask_source(&self) -> bool {
        (**self).mask_source()
    }

    fn unmask_source(&self) {
        (**self).unmask_source()
    }

    fn spin_scope<R>(&self, body: impl FnOnce() -> R) -> R {
        (**self).spin_scope(body)
    }
}

/// Widens a 32-bit deadline to a 64-bit compare value, given the current
/// 64-bit counter value.
///
/// The high-order bits of `current` are preserved. If the low 32 bits of the
/// deadline are numerically below those of `current` but `next` is *later* on
/// the circular timeline, the low word has wrapped and the high word is carried
/// by one. Conversely, a deadline slightly in the past that straddles a wrap
/// borrows from the high word, so the compare value is still "now-ish" and
/// fires immediately rather than 2^32 ticks from now.
///
/// This is for ports whose comparator is wider than the 32-bit time the
/// scheduler speaks, such as a RISC-V `mtimecmp` or a 64-bit system timer.
/// Such a port's [`HardwareAlarm::arm`] reads the full counter and writes
/// `extend_deadline(counter, next)` to the comparator.
pub const fn extend_deadline(current: u64, next: TickTime) -> u64 {
    let now = TickTime::from_raw(current as u32);
    let diff = next.wrapping_diff(now) as i64;
    current.wrapping_add(diff as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Ticks;

    #[test]
    fn extend_same_epoch() {
        let current = 0x0000_0003_0000_1000;
        let next = TickTime::from_raw(0x0000_2000);
        assert_eq!(extend_deadline(current, next), 0x0000_0003_0000_2000);
    }

    #[test]
    fn extend_carries_on_wrap() {
        let current = 0x0000_0003_ffff_ff00;
        let next = TickTime::from_raw(0xffff_ff00) + Ticks(0x200);
        assert_eq!(next.raw(), 0x0000_0100);
        assert_eq!(extend_deadline(current, next), 0x0000_0004_0000_0100);
    }

    #[test]
    fn extend_borrows_for_past_deadline() {
        let current = 0x0000_0004_0000_0010;
        let next = TickTime::from_raw(0xffff_fff0);
        assert_eq!(extend_deadline(current, next), 0x0000_0003_ffff_fff0);
    }

    #[test]
    fn extend_keeps_low_word() {
        for current in [0, 0x1234_5678_9abc_def0, u64::MAX - 5] {
            for lo in [0, 1, 0x8000_0000, u32::MAX] {
                let v = extend_deadline(current, TickTime::from_raw(lo));
                assert_eq!(v as u32, lo);
            }
        }
    }
}
