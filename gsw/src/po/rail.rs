//! dGPU Rail Sequencing
//!
//! The PMH7 only latches the power bit while the commit bit is low, and
//! acts on it when commit goes high again. Both sequences therefore drop
//! commit first and only touch the power bit afterwards.
//!
//! # Disable
//! 1. commit = 0
//! 2. wait 1-2 ms
//! 3. power = 0
//! 4. wait 100 ms
//!
//! # Enable
//! 1. commit = 0
//! 2. power = 1
//! 3. wait 10-20 ms
//! 4. commit = 1
//! 5. wait 100 ms
//!
//! The trailing wait is the rail's settle time before config space may be
//! touched. None of the delays are optional.

use crate::hal::delay::Delay;
use crate::hal::ec::{PowerControl, RegisterBackend};

/// Window before dropping the power bit
pub const DISABLE_WINDOW_US: (u32, u32) = (1_000, 2_000);
/// Window between raising power and raising commit
pub const ENABLE_WINDOW_US: (u32, u32) = (10_000, 20_000);
/// Rail settle time after either sequence
pub const RAIL_SETTLE_MS: u32 = 100;

/// Cut the dGPU rail
pub fn disable_rails<E, D>(ec: &mut E, delay: &mut D)
where
    E: RegisterBackend + ?Sized,
    D: Delay + ?Sized,
{
    log::info!("Disabling discrete GPU power rails");
    ec.poke(PowerControl::WRITE_ENABLE, false);
    delay.usleep_range(DISABLE_WINDOW_US.0, DISABLE_WINDOW_US.1);
    ec.poke(PowerControl::POWER, false);
    delay.msleep(RAIL_SETTLE_MS);
}

/// Raise the dGPU rail
pub fn enable_rails<E, D>(ec: &mut E, delay: &mut D)
where
    E: RegisterBackend + ?Sized,
    D: Delay + ?Sized,
{
    log::info!("Enabling discrete GPU power rails");
    ec.poke(PowerControl::WRITE_ENABLE, false);
    ec.poke(PowerControl::POWER, true);
    delay.usleep_range(ENABLE_WINDOW_US.0, ENABLE_WINDOW_US.1);
    ec.poke(PowerControl::WRITE_ENABLE, true);
    delay.msleep(RAIL_SETTLE_MS);
}
