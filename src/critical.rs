// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Critical sections that mask only the alarm's own interrupt source.
//!
//! The state shared between the alarm handler and task code is touched by
//! nothing else, so there is no need to stop the world to protect it. Masking
//! the one source is enough, and leaves every other interrupt's latency alone.
//!
//! Entering a section produces a [`SourceMasked`] token. Code that needs to be
//! inside a section, like [`RepeatWindow`][crate::window::RepeatWindow], asks
//! for a reference to the token, which can't be obtained any other way.

use core::marker::PhantomData;

use scopeguard::defer;

use crate::alarm::HardwareAlarm;

/// Proof that an alarm's interrupt source is masked for the lifetime `'cs`.
///
/// The token remembers which alarm was masked, but code taking a
/// `&SourceMasked` only sees that *some* source is masked. Use
/// [`SourceMasked::guards`] where it matters which one;
/// [`TimerCore`][crate::TimerCore] checks this in debug builds.
///
/// This is deliberately neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct SourceMasked<'cs> {
    _scope: PhantomData<&'cs ()>,
    source: *const (),
}

impl SourceMasked<'_> {
    fn new<A>(alarm: &A) -> Self {
        let source: *const A = alarm;
        Self {
            _scope: PhantomData,
            source: source.cast(),
        }
    }

    /// Checks whether this token came from masking `alarm`.
    ///
    /// Identity is by address, so a token from masking `&alarm` does not
    /// guard `alarm` itself. Compare through the same reference the section
    /// was entered with.
    pub fn guards<A>(&self, alarm: &A) -> bool {
        let other: *const A = alarm;
        core::ptr::eq(self.source, other.cast())
    }
}

/// Masks `alarm`'s interrupt source and runs `body`.
///
/// On the way out -- whether `body` returns normally or unwinds -- the source
/// is unmasked again if, and only if, it was unmasked on the way in. This makes
/// nesting harmless: only the outermost section restores anything.
pub fn with_source_masked<A, R>(
    alarm: &A,
    body: impl FnOnce(&SourceMasked<'_>) -> R,
) -> R
    where A: HardwareAlarm,
{
    let was_enabled = alarm.mask_source();
    defer! {
        if was_enabled {
            alarm.unmask_source();
        }
    }
    body(&SourceMasked::new(alarm))
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::time::TickTime;

    /// Alarm that only tracks its mask state.
    #[derive(Default)]
    struct MaskSpy {
        masked: Cell<bool>,
        unmask_calls: Cell<usize>,
    }

    impl HardwareAlarm for MaskSpy {
        fn now(&self) -> TickTime {
            TickTime::default()
        }

        fn arm(&self, _next: TickTime) {}

        fn mask_source(&self) -> bool {
            !self.masked.replace(true)
        }

        fn unmask_source(&self) {
            self.unmask_calls.set(self.unmask_calls.get() + 1);
            self.masked.set(false);
        }
    }

    #[test]
    fn masks_during_body_and_restores() {
        let spy = MaskSpy::default();
        let r = with_source_masked(&spy, |_| {
            assert!(spy.masked.get());
            42
        });
        assert_eq!(r, 42);
        assert!(!spy.masked.get());
        assert_eq!(spy.unmask_calls.get(), 1);
    }

    #[test]
    fn early_return_restores() {
        let spy = MaskSpy::default();
        let f = || -> Option<u32> {
            with_source_masked(&spy, |_| {
                let x: Option<u32> = None;
                let y = x?;
                Some(y + 1)
            })
        };
        assert_eq!(f(), None);
        assert!(!spy.masked.get());
    }

    #[test]
    fn nested_sections_only_restore_outermost() {
        let spy = MaskSpy::default();
        with_source_masked(&spy, |_| {
            with_source_masked(&spy, |_| {
                assert!(spy.masked.get());
            });
            // The inner section found the source already masked and must not
            // have unmasked it.
            assert!(spy.masked.get());
            assert_eq!(spy.unmask_calls.get(), 0);
        });
        assert!(!spy.masked.get());
        assert_eq!(spy.unmask_calls.get(), 1);
    }

    #[test]
    fn already_masked_stays_masked() {
        let spy = MaskSpy::default();
        spy.masked.set(true);
        with_source_masked(&spy, |_| ());
        assert!(spy.masked.get());
        assert_eq!(spy.unmask_calls.get(), 0);
    }

    #[test]
    fn token_names_the_masked_alarm() {
        let a = MaskSpy::default();
        let b = MaskSpy::default();
        with_source_masked(&a, |cs| {
            assert!(cs.guards(&a));
            assert!(!cs.guards(&b));
        });
    }

    #[test]
    fn panic_in_body_restores() {
        let spy = MaskSpy::default();
        let result = catch_unwind(AssertUnwindSafe(|| {
            with_source_masked(&spy, |_| {
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert!(!spy.masked.get());
    }
}
