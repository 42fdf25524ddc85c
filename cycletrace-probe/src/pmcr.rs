//! SH4 performance-monitor counter driver.
//!
//! The processor exposes two 48-bit counters behind memory-mapped
//! registers. Channel 1 runs in elapsed-time mode and is the cycle
//! source (1 count = 1 cycle = 5 ns at 200 MHz); channel 2 counts
//! operand-cache fills. Counters are configured at startup and stopped
//! at teardown only; the hot path just reads them.
//!
//! Without the `hardware-counters` feature the module substitutes a
//! monotonic host clock scaled to the target's cycle rate, so the
//! probe can be exercised off-target.

/// Nanoseconds per cycle count in elapsed-time mode at 200 MHz.
pub const NS_PER_CYCLE: u64 = 5;

/// Counter channel selector. The SH4 has exactly two.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    One,
    Two,
}

/// What a channel counts. Values are the PMCR mode field encodings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum CounterMode {
    IcacheFill = 0x21,
    OcacheFill = 0x22,
    ElapsedTime = 0x23,
}

#[cfg(feature = "hardware-counters")]
mod imp {
    use super::{Channel, CounterMode};
    use core::ptr::{read_volatile, write_volatile};

    // 16-bit control registers.
    const PMCR1_CTRL_REG: usize = 0xFF00_0084;
    const PMCR2_CTRL_REG: usize = 0xFF00_0088;

    // 32-bit high/low halves of each 48-bit counter.
    const PMCTR1H_REG: usize = 0xFF10_0004;
    const PMCTR1L_REG: usize = 0xFF10_0008;
    const PMCTR2H_REG: usize = 0xFF10_000C;
    const PMCTR2L_REG: usize = 0xFF10_0010;

    const PMCR_RUN_COUNTER: u16 = 0xC000;
    const PMCR_STOP_COUNTER: u16 = 0x2000;
    const PMCR_DISABLE_COUNTER: u16 = 0x0000;
    const PMCR_RESET_COUNTER_SHIFT: u16 = 13;

    fn ctrl_reg(channel: Channel) -> *mut u16 {
        match channel {
            Channel::One => PMCR1_CTRL_REG as *mut u16,
            Channel::Two => PMCR2_CTRL_REG as *mut u16,
        }
    }

    fn counter_regs(channel: Channel) -> (*const u32, *const u32) {
        match channel {
            Channel::One => (PMCTR1H_REG as *const u32, PMCTR1L_REG as *const u32),
            Channel::Two => (PMCTR2H_REG as *const u32, PMCTR2L_REG as *const u32),
        }
    }

    pub fn enable(channel: Channel, mode: CounterMode) {
        // Reset to zero, count CPU cycles (not bus-ratio), run.
        let ctrl = PMCR_RUN_COUNTER | (1 << PMCR_RESET_COUNTER_SHIFT) | mode as u16;
        unsafe { write_volatile(ctrl_reg(channel), ctrl) };
    }

    pub fn stop(channel: Channel) {
        unsafe { write_volatile(ctrl_reg(channel), PMCR_STOP_COUNTER) };
    }

    pub fn disable(channel: Channel) {
        unsafe { write_volatile(ctrl_reg(channel), PMCR_DISABLE_COUNTER) };
    }

    pub fn read(channel: Channel) -> u64 {
        let (high, low) = counter_regs(channel);
        // The counter is 48 bits: 16 valid bits in the high register.
        unsafe {
            ((read_volatile(high) & 0xFFFF) as u64) << 32 | read_volatile(low) as u64
        }
    }
}

#[cfg(not(feature = "hardware-counters"))]
mod imp {
    use super::{Channel, CounterMode, NS_PER_CYCLE};

    pub fn enable(_channel: Channel, _mode: CounterMode) {}
    pub fn stop(_channel: Channel) {}
    pub fn disable(_channel: Channel) {}

    pub fn read(channel: Channel) -> u64 {
        match channel {
            Channel::One => {
                let mut ts = libc::timespec {
                    tv_sec: 0,
                    tv_nsec: 0,
                };
                unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
                (ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64) / NS_PER_CYCLE
            }
            // No cache-event source on the host.
            Channel::Two => 0,
        }
    }
}

/// Configure and start both channels for a profiling run.
pub fn start() {
    imp::enable(Channel::One, CounterMode::ElapsedTime);
    imp::enable(Channel::Two, CounterMode::OcacheFill);
}

/// Stop both channels without clearing them.
pub fn stop_all() {
    imp::stop(Channel::One);
    imp::stop(Channel::Two);
}

/// Stop and release both channels.
pub fn disable_all() {
    imp::disable(Channel::One);
    imp::disable(Channel::Two);
}

/// Current cycle count.
#[inline]
pub fn read_cycles() -> u64 {
    imp::read(Channel::One)
}

/// Current values of the two event counters. Channel 1 is burned as
/// the cycle source on this target, so the second slot stays zero.
#[inline]
pub fn read_events() -> [u64; 2] {
    [imp::read(Channel::Two), 0]
}
