//! dGPU Liveness
//!
//! The EC power bit alone is not trusted. It can read "on" while the
//! device has not appeared on the bus yet, or after the device dropped
//! off. A set bit is confirmed by reading the first config dword.

use crate::hal::ec::{PowerControl, RegisterBackend};
use crate::hal::pci::{PciConfigAccess, PciLocation, PCI_NOT_RESPONDING};

/// True unless the rail is on and the device answers config reads
pub fn is_disabled<E, A>(ec: &mut E, pci: &mut A, loc: PciLocation) -> bool
where
    E: RegisterBackend + ?Sized,
    A: PciConfigAccess + ?Sized,
{
    if !ec.peek(PowerControl::POWER) {
        return true;
    }

    pci.read_config_u32(loc, 0) == PCI_NOT_RESPONDING
}
