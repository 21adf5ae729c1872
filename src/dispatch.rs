// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The alarm interrupt's dispatch loop.
//!
//! Software timers tend to come in bursts -- think of a stepper driver emitting
//! pulses a few microseconds apart. Taking one interrupt per timer would spend
//! most of the CPU on interrupt entry and exit, so instead the handler keeps
//! running timers inline for as long as the next one is due now or very soon.
//!
//! That can't go on forever, or the handler would starve the task code.
//! [`TimerCore::dispatch_many`] bounds it with a *retry window*: while the
//! window is open, the loop waits out short gaps inline. Once the window has
//! closed, the loop asks the scheduler whether anything else wants to run:
//!
//! - If so, it yields: it opens a short window for next time and asks to be
//!   woken again a few microseconds from now.
//! - If not, it grants itself a longer window and keeps going, since nobody is
//!   waiting.
//!
//! A timer that shows up more than `fatal_past` late after the window closed
//! means the scheduler has fallen hopelessly behind, which is reported as
//! fatal rather than retried.
//!
//! # Hooking it up
//!
//! Put a [`TimerCore`] somewhere both the interrupt handler and task code can
//! see it -- usually a `static` -- and call [`TimerCore::on_alarm`] from the
//! alarm's interrupt handler:
//!
//! ```ignore
//! static CORE: TimerCore<TcAlarm> = /* ... */;
//!
//! #[interrupt]
//! fn TC4() {
//!     CORE.on_alarm(&mut sched::Timers);
//! }
//! ```
//!
//! Task code must also run [`resync_task`][crate::task::resync_task] (or call
//! [`TimerCore::resync`] periodically some other way).

use core::fmt;

use crate::alarm::HardwareAlarm;
use crate::config::Thresholds;
use crate::critical::{with_source_masked, SourceMasked};
use crate::time::{TickTime, Ticks};
use crate::window::RepeatWindow;

/// The software timer scheduler, as seen from the alarm interrupt.
///
/// The scheduler owns the queue of pending timers; this crate only needs to
/// run them and find out when the next one is due.
pub trait Scheduler {
    /// Runs exactly one due timer and returns the deadline of the timer that
    /// is now at the head of the queue.
    ///
    /// This is called repeatedly in a tight loop from interrupt context, so it
    /// must not block.
    fn dispatch_next(&mut self) -> TickTime;

    /// Checks whether any cooperative work outside the timer queue is ready to
    /// run. Must not block.
    fn has_pending_work(&mut self) -> bool;

    /// Halts normal operation in response to a fatal scheduling error.
    fn report_fatal(&mut self, fatal: Fatal) -> !;
}

/// A scheduling error the system can't recover from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fatal {
    /// The scheduler handed back a deadline more than `fatal_past` behind the
    /// counter after the retry window had already closed.
    RescheduledInPast {
        /// How far behind the counter the deadline was.
        late_by: Ticks,
    },
}

impl Fatal {
    /// A fixed description, suitable for a shutdown message.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Fatal::RescheduledInPast { .. } => "Rescheduled timer in the past",
        }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::RescheduledInPast { late_by } => {
                write!(f, "{} ({} ticks late)", self.as_str(), late_by.0)
            }
        }
    }
}

/// Everything the alarm handler and the resync task share: the hardware, the
/// retry window, and the thresholds.
///
/// One `TimerCore` per hardware alarm. It's designed to live in a `static`,
/// hence the `const` constructor.
#[derive(Debug)]
pub struct TimerCore<A> {
    alarm: A,
    pub(crate) window: RepeatWindow,
    thresholds: Thresholds,
}

impl<A> TimerCore<A> {
    /// Creates a core driving `alarm` with the given thresholds.
    ///
    /// This doesn't touch the hardware; call [`TimerCore::init`] once before
    /// enabling the alarm interrupt.
    pub const fn new(alarm: A, thresholds: Thresholds) -> Self {
        Self {
            alarm,
            window: RepeatWindow::new(TickTime::from_raw(0)),
            thresholds,
        }
    }

    /// The hardware alarm this core drives.
    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    /// The thresholds in use.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl<A: HardwareAlarm> TimerCore<A> {
    /// Reads the hardware counter.
    pub fn now(&self) -> TickTime {
        self.alarm.now()
    }

    /// Starts timekeeping: closes the retry window at the current time and
    /// kicks the alarm so the first dispatch happens right away.
    pub fn init(&self) {
        let now = self.alarm.now();
        with_source_masked(&self.alarm, |cs| self.window.set(cs, now));
        log::trace!("timer core initialized at {:?}", now);
        self.kick();
    }

    /// Arms the alarm to fire almost immediately.
    ///
    /// A scheduler calls this when it adds a timer that's due sooner than the
    /// deadline currently armed.
    pub fn kick(&self) {
        let delay = self.thresholds.kick_delay();
        with_source_masked(&self.alarm, |_| {
            let at = self.alarm.now() + delay;
            self.alarm.arm(at);
            log::trace!("alarm kicked for {:?}", at);
        });
    }

    /// Reads the end of the current retry window.
    pub fn repeat_until(&self) -> TickTime {
        with_source_masked(&self.alarm, |cs| self.window.get(cs))
    }

    /// Interrupt entry point. Call this, and nothing else, from the alarm's
    /// interrupt handler.
    ///
    /// Runs due timers via [`TimerCore::dispatch_many`] and re-arms the alarm
    /// for the deadline it settles on. If the loop detects a fatal condition,
    /// this hands it to [`Scheduler::report_fatal`] and never returns.
    pub fn on_alarm<S>(&self, sched: &mut S)
        where S: Scheduler + ?Sized,
    {
        let result = with_source_masked(&self.alarm, |cs| {
            let r = self.dispatch_many(cs, &mut *sched);
            if let Ok(next) = r {
                self.alarm.arm(next);
            }
            r
        });
        if let Err(fatal) = result {
            log::error!("{}", fatal);
            sched.report_fatal(fatal);
        }
    }

    /// Runs timers until the next one is safely in the future, or until it's
    /// time to yield, and returns the deadline the alarm should be armed for.
    ///
    /// The caller is responsible for arming the alarm with the result;
    /// [`TimerCore::on_alarm`] does that for you.
    ///
    /// # Loop behavior
    ///
    /// Each iteration runs one timer and looks at the gap `diff` between the
    /// next deadline and the counter:
    ///
    /// - `diff >= min_try`: far enough out for hardware; return it. The
    ///   boundary is inclusive.
    /// - Otherwise, if the retry window has closed, either fail (`diff <
    ///   -fatal_past`), yield (`now + defer_repeat`, opening a `repeat` window)
    ///   if the scheduler has pending work, or extend the window by
    ///   `idle_repeat`.
    /// - If the deadline is still ahead, wait for it inline, for at most
    ///   `spin_limit` counter reads. If the counter doesn't get there in that
    ///   many reads, the loop returns `now + min_try` for the hardware to
    ///   handle. The timer runs up to `min_try` ticks late, never early, and
    ///   the alarm is never armed closer than `min_try`.
    pub fn dispatch_many<S>(
        &self,
        cs: &SourceMasked<'_>,
        sched: &mut S,
    ) -> Result<TickTime, Fatal>
        where S: Scheduler + ?Sized,
    {
        debug_assert!(cs.guards(&self.alarm), "section masks some other alarm");
        let t = &self.thresholds;
        let mut tru = self.window.get(cs);
        loop {
            let next = sched.dispatch_next();

            let now = self.alarm.now();
            let mut diff = next.wrapping_diff(now);
            if diff >= t.min_try.as_i32() {
                return Ok(next);
            }

            if tru.is_before(now) {
                if diff < -t.fatal_past.as_i32() {
                    return Err(Fatal::RescheduledInPast {
                        late_by: Ticks(diff.unsigned_abs()),
                    });
                }
                if sched.has_pending_work() {
                    self.window.set(cs, now + t.repeat);
                    return Ok(now + t.defer_repeat);
                }
                tru = now + t.idle_repeat;
                self.window.set(cs, tru);
            }

            // The next timer is close; wait for it rather than taking another
            // interrupt.
            if diff > 0 {
                let gave_up_at = self.alarm.spin_scope(|| {
                    let mut reads = 0;
                    let mut now = now;
                    while diff > 0 {
                        if reads == t.spin_limit {
                            return Some(now);
                        }
                        reads += 1;
                        now = self.alarm.now();
                        diff = next.wrapping_diff(now);
                    }
                    None
                });
                if let Some(now) = gave_up_at {
                    // `next` is still inside the MIN_TRY margin, too close to
                    // arm safely. Push it out to the margin instead.
                    return Ok(now + t.min_try);
                }
            }
        }
    }
}
