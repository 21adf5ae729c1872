// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Glue between a hardware timer interrupt and a software timer scheduler.
//!
//! Microcontrollers usually give you one free-running counter and one
//! compare-match interrupt per timer peripheral. Software wants many timers.
//! A scheduler (not part of this crate) keeps the queue of pending timers;
//! this crate keeps that scheduler fed from the hardware:
//!
//! - Every due timer fires with bounded latency.
//! - The hardware alarm is always re-armed for the right next deadline.
//! - Timekeeping survives the 32-bit counter wrapping around, indefinitely.
//! - Bursts of closely-spaced timers are run inline, without starving task
//!   code.
//!
//! # Pieces
//!
//! - [`time`]: wraparound-safe [`TickTime`] comparisons and unit conversion.
//! - [`alarm`]: the [`HardwareAlarm`] trait each hardware target implements.
//! - [`critical`]: critical sections that mask only the alarm's own interrupt.
//! - [`window`]: the retry window shared by the interrupt and task code.
//! - [`dispatch`]: the [`TimerCore`] and its interrupt-time dispatch loop.
//! - [`task`]: the foreground resync that keeps the retry window fresh.
//! - [`config`]: thresholds that tune the loop.
//!
//! # Concurrency
//!
//! The design assumes one core, one alarm interrupt, and a cooperative
//! task scheduler. The interrupt may preempt tasks; tasks never preempt the
//! interrupt. The only state shared between the two is the retry window, and
//! it can only be touched inside a [`critical::with_source_masked`] section.
//!
//! There's no global state: everything lives in a [`TimerCore`] that you put
//! wherever suits your application (usually a `static`) and hand to both the
//! interrupt handler and the resync task.
//!
//! # Fatal errors
//!
//! If the scheduler hands back a deadline that's hopelessly in the past -- more
//! than [`Thresholds::fatal_past`] -- something upstream is badly broken. The
//! loop reports this through [`Scheduler::report_fatal`], which must not
//! return.

#![cfg_attr(not(test), no_std)]
#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications
)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod alarm;
pub mod config;
pub mod critical;
pub mod dispatch;
pub mod task;
pub mod time;
pub mod window;

#[cfg(all(timer_irq_has_nvic, feature = "samd-tc"))]
pub mod samd_tc;

pub use alarm::HardwareAlarm;
pub use config::{ConfigError, Thresholds};
pub use dispatch::{Fatal, Scheduler, TimerCore};
pub use task::resync_task;
pub use time::{TickRate, TickTime, Ticks};
