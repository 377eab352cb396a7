//! ThinkPad PMH7 Graphics Switcher
//!
//! Gates the discrete GPU power rail through the Lenovo PMH7 power
//! management hub, an indexed register window behind the embedded
//! controller, and keeps the rail consistent with the PCI device lifecycle
//! and system sleep transitions.
//!
//! # Layout
//!
//! The crate follows the NT-style subsystem split:
//!
//! - **hal** - Hardware access: EC register window, PCI config space,
//!   ACPI power states, delays
//! - **po** - Power Manager: rail sequencing, liveness, the dGPU context
//!   and the suspend/resume orchestrator
//! - **io** - Outward surfaces: the `gpu_state` attribute and the GPU
//!   switch handler
//! - **cm** - Configuration: load/unload desired states
//! - **driver** - Module load/unload
//!
//! # Usage
//! ```ignore
//! let params = cm::Params::from_pairs(&[("load_state", "off")])?;
//! let gsw = driver::Pmh7Gsw::load(params, ec, pci, delay, notifier, attrs)?;
//! // ...
//! gsw.unload(notifier, attrs);
//! ```

#![cfg_attr(not(test), no_std)]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod cm;
pub mod driver;
pub mod hal;
pub mod io;
pub mod po;

#[cfg(test)]
pub(crate) mod testing;

use core::fmt;

pub use hal::pci::PciError;

/// Driver version reported in the load banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors surfaced by the graphics switcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GswError {
    /// No discrete display-class device was found on the bus
    DeviceNotFound,
    /// The control attribute could not be created
    AttributeCreation,
    /// Unrecognized power state or parameter value
    InvalidArgument,
    /// A fixed-size table (notifier chain) is full
    InsufficientResources,
}

impl fmt::Display for GswError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GswError::DeviceNotFound => write!(f, "no discrete GPU found"),
            GswError::AttributeCreation => write!(f, "failed to create control attribute"),
            GswError::InvalidArgument => write!(f, "invalid argument"),
            GswError::InsufficientResources => write!(f, "insufficient resources"),
        }
    }
}

/// Result alias used throughout the crate
pub type GswResult<T> = Result<T, GswError>;
