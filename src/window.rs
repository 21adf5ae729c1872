// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The retry window shared between the alarm handler and task code.

use portable_atomic::{AtomicU32, Ordering};

use crate::critical::SourceMasked;
use crate::time::TickTime;

/// End of the period during which the dispatch loop may keep retrying inline
/// instead of yielding (`repeat_until`).
///
/// This is the only piece of state written from both interrupt and task
/// context. Every access requires a [`SourceMasked`] token, so a reader never
/// sees it half-updated, provided the token comes from masking the alarm that
/// owns this window. [`TimerCore`][crate::TimerCore] makes sure of that. It's stored in an atomic only so the type is `Sync`
/// and can sit in a `static`; the ordering is provided by the critical section.
#[derive(Debug)]
pub struct RepeatWindow {
    until: AtomicU32,
}

impl RepeatWindow {
    /// Creates a window that ends at `t`.
    pub const fn new(t: TickTime) -> Self {
        Self {
            until: AtomicU32::new(t.raw()),
        }
    }

    /// Reads the end of the window.
    #[inline]
    pub fn get(&self, _cs: &SourceMasked<'_>) -> TickTime {
        TickTime::from_raw(self.until.load(Ordering::Relaxed))
    }

    /// Moves the end of the window to `t`.
    #[inline]
    pub fn set(&self, _cs: &SourceMasked<'_>, t: TickTime) {
        self.until.store(t.raw(), Ordering::Relaxed);
    }

    /// Pulls a stale window forward to `now`.
    ///
    /// If the window already ended before `now`, it gets snapped to `now` and
    /// this returns `true`. Otherwise it's left alone. Doing this regularly
    /// keeps the window within 2^31 ticks of the present, so it can't wrap
    /// around and start looking like it's in the future again.
    pub fn resync(&self, cs: &SourceMasked<'_>, now: TickTime) -> bool {
        if self.get(cs).is_before(now) {
            self.set(cs, now);
            true
        } else {
            false
        }
    }
}
