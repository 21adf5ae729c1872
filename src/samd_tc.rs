// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SAMD21 implementation of the alarm interface, using a TC in 32-bit mode.
//!
//! On the SAMD21, TC4 and TC5 pair up into a single 32-bit counter when TC4 is
//! put in COUNT32 mode. Compare channel 0 serves as the alarm, and the TC4
//! interrupt line is the only source this module ever masks.
//!
//! Routing a generic clock to TC4/TC5 and enabling the bus clock in the power
//! manager are left to the application's clock setup, which has to happen
//! before [`TcAlarm::start`].
//!
//! **Note:** this module is only available on Cortex-M targets with the
//! `samd-tc` feature, which is on by default.

use core::ptr::{read_volatile, write_volatile};

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

use crate::alarm::HardwareAlarm;
use crate::time::TickTime;

/// Base address of TC4 on the SAMD21.
pub const TC4_BASE: usize = 0x4200_3000;
/// NVIC line of TC4 on the SAMD21.
pub const TC4_IRQ: IrqLine = IrqLine(19);

// Register offsets in COUNT32 mode.
const CTRLA: usize = 0x00;
const READREQ: usize = 0x02;
const INTENSET: usize = 0x0D;
const INTFLAG: usize = 0x0E;
const STATUS: usize = 0x0F;
const COUNT: usize = 0x10;
const CC0: usize = 0x18;

const CTRLA_ENABLE: u16 = 1 << 1;
const CTRLA_MODE_COUNT32: u16 = 0x2 << 2;
const READREQ_RREQ: u16 = 1 << 15;
const READREQ_RCONT: u16 = 1 << 14;
const STATUS_SYNCBUSY: u8 = 1 << 7;
const INT_MC0: u8 = 1 << 4;

/// An NVIC interrupt line number.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IrqLine(pub u16);

// Safety: the number is only ever passed to the NVIC, and it's the caller of
// `TcAlarm::new` that promises it names the right line.
unsafe impl InterruptNumber for IrqLine {
    fn number(self) -> u16 {
        self.0
    }
}

/// A TC configured as a 32-bit free-running counter with CC0 as the alarm.
#[derive(Debug)]
pub struct TcAlarm {
    base: usize,
    irq: IrqLine,
}

impl TcAlarm {
    /// Creates a handle for the TC at `base`, whose interrupt is `irq`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a TC register block capable of COUNT32
    /// mode, and `irq` its interrupt line. Nothing else in the program may
    /// touch that TC once this handle exists.
    pub const unsafe fn new(base: usize, irq: IrqLine) -> Self {
        Self { base, irq }
    }

    /// Creates a handle for TC4.
    ///
    /// # Safety
    ///
    /// Nothing else in the program may use TC4 or TC5.
    pub const unsafe fn tc4() -> Self {
        // Safety: passed through to our caller.
        unsafe { Self::new(TC4_BASE, TC4_IRQ) }
    }

    /// Resets the counter to zero, selects COUNT32 mode, enables the CC0
    /// interrupt in the peripheral and starts counting.
    ///
    /// The NVIC line is left alone; unmask it once the timer core has been
    /// initialized.
    pub fn start(&self) {
        // Safety: the register block is ours by the contract of `new`.
        unsafe {
            self.write16(CTRLA, 0);
            self.wait_sync();
            self.write16(CTRLA, CTRLA_MODE_COUNT32);
            self.wait_sync();
            self.write32(COUNT, 0);
            self.wait_sync();
            self.write8(INTFLAG, INT_MC0);
            self.write8(INTENSET, INT_MC0);
            // Continuous read synchronization, so `now` never has to wait.
            self.write16(READREQ, READREQ_RREQ | READREQ_RCONT | COUNT as u16);
            self.write16(CTRLA, CTRLA_MODE_COUNT32 | CTRLA_ENABLE);
            self.wait_sync();
        }
    }

    fn wait_sync(&self) {
        // Safety: STATUS is a read-only register in our block.
        while unsafe { self.read8(STATUS) } & STATUS_SYNCBUSY != 0 {
            // Clock domain crossing takes a handful of TC clocks.
        }
    }

    unsafe fn read8(&self, offset: usize) -> u8 {
        // Safety: caller ensures `offset` names an 8-bit register.
        unsafe { read_volatile((self.base + offset) as *const u8) }
    }

    unsafe fn read32(&self, offset: usize) -> u32 {
        // Safety: caller ensures `offset` names a 32-bit register.
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    unsafe fn write8(&self, offset: usize, value: u8) {
        // Safety: caller ensures `offset` names an 8-bit register.
        unsafe { write_volatile((self.base + offset) as *mut u8, value) }
    }

    unsafe fn write16(&self, offset: usize, value: u16) {
        // Safety: caller ensures `offset` names a 16-bit register.
        unsafe { write_volatile((self.base + offset) as *mut u16, value) }
    }

    unsafe fn write32(&self, offset: usize, value: u32) {
        // Safety: caller ensures `offset` names a 32-bit register.
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}

impl HardwareAlarm for TcAlarm {
    fn now(&self) -> TickTime {
        // With RCONT set by `start`, COUNT is always synchronized.
        //
        // Safety: COUNT is a 32-bit register in our block.
        TickTime::from_raw(unsafe { self.read32(COUNT) })
    }

    fn arm(&self, next: TickTime) {
        // Clear the stale match before moving CC0, never after: a match
        // against the new value must not be thrown away. A match against the
        // old value in between only costs a spurious interrupt.
        //
        // Safety: CC0 and INTFLAG are ours.
        unsafe {
            self.write8(INTFLAG, INT_MC0);
            self.write32(CC0, next.raw());
        }
    }

    fn mask_source(&self) -> bool {
        let was_enabled = NVIC::is_enabled(self.irq);
        NVIC::mask(self.irq);
        // Make sure the mask has taken effect before touching shared state.
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
        was_enabled
    }

    fn unmask_source(&self) {
        // Safety: the alarm handler only touches state that is guarded by
        // this mask, so letting it run again can't break a critical section.
        unsafe {
            NVIC::unmask(self.irq);
        }
    }
}
