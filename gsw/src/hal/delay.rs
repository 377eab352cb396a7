//! Settle Delays
//!
//! Rail transitions need fixed settle times and a jittered window before
//! the payload bit may change. Both are modelled here so that tests can
//! record them instead of sleeping.
//!
//! Delays block the caller and cannot be cancelled.

/// Blocking delay source
pub trait Delay {
    /// Sleep for `ms` milliseconds
    fn msleep(&mut self, ms: u32);

    /// Sleep for some duration within `[min_us, max_us]` microseconds
    fn usleep_range(&mut self, min_us: u32, max_us: u32);
}

/// Busy-wait delay on the time stamp counter
///
/// For early or interrupt-less contexts where the host cannot provide a
/// sleeping delay. The window delay picks its point from the low TSC bits.
#[cfg(target_arch = "x86_64")]
pub struct TscDelay {
    tsc_hz: u64,
}

#[cfg(target_arch = "x86_64")]
impl TscDelay {
    /// `tsc_hz` is the calibrated TSC frequency. There is no uncalibrated
    /// fallback: without a frequency the settle times have no lower bound.
    pub fn new(tsc_hz: u64) -> Option<Self> {
        if tsc_hz == 0 {
            log::error!("TSC frequency not calibrated, cannot time rail settles");
            return None;
        }
        Some(Self { tsc_hz })
    }

    fn stall_us(&self, microseconds: u64) {
        let ticks = (microseconds * self.tsc_hz) / 1_000_000;
        let start = read_tsc();

        while read_tsc().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl Delay for TscDelay {
    fn msleep(&mut self, ms: u32) {
        self.stall_us(ms as u64 * 1000);
    }

    fn usleep_range(&mut self, min_us: u32, max_us: u32) {
        let span = max_us.saturating_sub(min_us) as u64;
        let jitter = if span == 0 { 0 } else { read_tsc() % (span + 1) };
        self.stall_us(min_us as u64 + jitter);
    }
}

/// Read the time stamp counter
#[cfg(target_arch = "x86_64")]
#[inline]
fn read_tsc() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}
