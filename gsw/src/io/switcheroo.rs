//! GPU Switch Handler
//!
//! Hooks the switcher into the host's GPU switching framework. The PMH7
//! is a power gate, not a display multiplexer: output switching is a
//! no-op and only power requests for the discrete client do anything.

use alloc::sync::Arc;

use crate::hal::delay::Delay;
use crate::hal::ec::RegisterBackend;
use crate::hal::pci::{PciPlatform, PCI_VENDOR_ID_INTEL, PCI_VENDOR_ID_NVIDIA};
use crate::po::dgpu::DiscreteGpu;
use crate::{GswError, GswResult};

/// Client roles known to the switching framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientId {
    /// Integrated GPU
    Integrated,
    /// Discrete GPU
    Discrete,
    Unknown,
}

/// Raw power state values used by the framework
pub mod state {
    pub const OFF: u32 = 0;
    pub const ON: u32 = 1;
}

/// Map a GPU vendor to its client role on this platform
pub fn client_id(vendor: u16) -> ClientId {
    match vendor {
        PCI_VENDOR_ID_NVIDIA => ClientId::Discrete,
        PCI_VENDOR_ID_INTEL => ClientId::Integrated,
        _ => {
            log::warn!("Unrecognized GPU vendor ID {:04x}", vendor);
            ClientId::Unknown
        }
    }
}

/// Switching framework handler
pub struct SwitcherooHandler<E, P, D> {
    gpu: Arc<DiscreteGpu<E, P, D>>,
}

impl<E, P, D> SwitcherooHandler<E, P, D>
where
    E: RegisterBackend,
    P: PciPlatform,
    D: Delay,
{
    pub fn new(gpu: Arc<DiscreteGpu<E, P, D>>) -> Self {
        Self { gpu }
    }

    /// Route display output to `client`
    pub fn switch_to(&self, _client: ClientId) -> GswResult<()> {
        Ok(())
    }

    /// Apply a raw power state to `client`
    pub fn power_state(&self, client: ClientId, raw_state: u32) -> GswResult<()> {
        if client != ClientId::Discrete {
            return Ok(());
        }

        match raw_state {
            state::OFF => {
                self.gpu.disable();
                Ok(())
            }
            state::ON => {
                self.gpu.enable();
                Ok(())
            }
            _ => {
                log::warn!("Unrecognized power state: {}", raw_state);
                Err(GswError::InvalidArgument)
            }
        }
    }
}
