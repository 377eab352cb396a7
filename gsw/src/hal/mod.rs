//! Hardware Abstraction Layer (hal)
//!
//! Everything the switcher touches on the platform sits behind a trait here
//! so the power manager can be driven by bare-metal backends or by mocks:
//!
//! - **ec**: PMH7 register window (index/data ports)
//! - **pci**: Configuration space, device discovery and the PCI/ACPI
//!   primitives owned by the host
//! - **acpi**: ACPI device power states
//! - **delay**: Settle delays

pub mod acpi;
pub mod delay;
pub mod ec;
pub mod pci;
