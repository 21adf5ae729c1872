// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Foreground upkeep for the retry window.
//!
//! The dispatch loop only moves the retry window when the alarm fires with
//! timers due. On a quiet system that may not happen for a long time, and a
//! window left alone for half the counter's wrap period starts to look like
//! it's in the future. [`TimerCore::resync`] pulls it back to the present;
//! [`resync_task`] does that forever, as a cooperative task.

use core::convert::Infallible;
use core::future::Future;

use crate::alarm::HardwareAlarm;
use crate::critical::with_source_masked;
use crate::dispatch::TimerCore;

impl<A: HardwareAlarm> TimerCore<A> {
    /// Snaps the retry window forward to the current time if it has already
    /// expired. Returns `true` if it moved.
    ///
    /// Call this from task context at least once per quarter of the counter's
    /// wrap period (see
    /// [`Thresholds::max_resync_interval`][crate::config::Thresholds::max_resync_interval]).
    pub fn resync(&self) -> bool {
        let now = self.now();
        let moved = with_source_masked(self.alarm(), |cs| self.window.resync(cs, now));
        if moved {
            log::trace!("repeat window resynced to {:?}", now);
        }
        moved
    }
}

/// Task body that resyncs `core` and then awaits `sleep()`, forever.
///
/// This doesn't depend on any particular executor. With `lilos`, for
/// instance:
///
/// ```ignore
/// let resync = pin!(resync_task(&CORE, || sleep_for(Millis(100))));
/// ```
///
/// The sleep has to be well under
/// [`Thresholds::max_resync_interval`][crate::config::Thresholds::max_resync_interval].
///
/// # Cancellation
///
/// Dropping this future between polls just stops the resyncs; the window is
/// never left half-written, since each resync completes before the await.
pub async fn resync_task<A, S, F>(core: &TimerCore<A>, mut sleep: S) -> Infallible
    where A: HardwareAlarm,
          S: FnMut() -> F,
          F: Future<Output = ()>,
{
    loop {
        core.resync();
        sleep().await;
    }
}
