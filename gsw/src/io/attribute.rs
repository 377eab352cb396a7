//! `gpu_state` Control Attribute
//!
//! A file-like attribute published by the host:
//!
//! - read: `"1\n"` if the dGPU is powered, `"0\n"` if not
//! - write: first byte `'0'` powers it down, `'1'` powers it up; anything
//!   else is ignored
//!
//! Writes report one byte consumed for a recognized command and zero
//! otherwise.

use alloc::sync::Arc;

use crate::hal::delay::Delay;
use crate::hal::ec::RegisterBackend;
use crate::hal::pci::PciPlatform;
use crate::po::dgpu::DiscreteGpu;
use crate::GswResult;

/// Name of the control attribute
pub const GPU_STATE_ATTR: &str = "gpu_state";

/// A file-like attribute
pub trait Attribute: Send + Sync {
    fn name(&self) -> &str;

    /// Current contents
    fn show(&self) -> &'static str;

    /// Handle a write; returns the number of bytes consumed
    fn store(&self, buf: &[u8]) -> usize;
}

/// Host side of attribute publication
pub trait AttributeHost {
    fn publish(&self, attr: Arc<dyn Attribute>) -> GswResult<()>;
    fn withdraw(&self, name: &str);
}

/// The `gpu_state` attribute
pub struct GpuStateAttribute<E, P, D> {
    gpu: Arc<DiscreteGpu<E, P, D>>,
}

impl<E, P, D> GpuStateAttribute<E, P, D> {
    pub fn new(gpu: Arc<DiscreteGpu<E, P, D>>) -> Self {
        Self { gpu }
    }
}

impl<E, P, D> Attribute for GpuStateAttribute<E, P, D>
where
    E: RegisterBackend + Send,
    P: PciPlatform + Send,
    D: Delay + Send,
{
    fn name(&self) -> &str {
        GPU_STATE_ATTR
    }

    fn show(&self) -> &'static str {
        if self.gpu.is_disabled() {
            "0\n"
        } else {
            "1\n"
        }
    }

    fn store(&self, buf: &[u8]) -> usize {
        match buf.first() {
            Some(b'0') => {
                self.gpu.disable();
                1
            }
            Some(b'1') => {
                self.gpu.enable();
                1
            }
            _ => 0,
        }
    }
}
