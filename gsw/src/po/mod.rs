//! Power Manager (po)
//!
//! Drives the dGPU rail and keeps it consistent with the PCI device and
//! with system sleep.
//!
//! ## Components
//! - **rail**: Commit/power bit sequences with their settle delays
//! - **liveness**: Effective power state from the EC bit plus config space
//! - **dgpu**: The device context; wraps rail sequences in PCI teardown
//!   and bring-up under one lock
//! - **notify**: Sleep transition events and the observer chain
//! - **suspend**: Restores the pre-suspend rail state across sleep
//!
//! ## Lock Ordering
//! There is one lock, owned by [`dgpu::DiscreteGpu`]. Every register
//! access and every composite sequence runs under it, as does the
//! suspend snapshot.

pub mod dgpu;
pub mod liveness;
pub mod notify;
pub mod rail;
pub mod suspend;

use core::fmt;

/// Effective power state of the dGPU
///
/// Never stored; always derived from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => f.write_str("on"),
            PowerState::Off => f.write_str("off"),
        }
    }
}

/// What an enable/disable request ended up doing
///
/// Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested state; no register writes
    Unchanged,
    /// Disable skipped because a driver owns the device
    InUse,
    /// Sequence ran to completion
    Completed,
}
