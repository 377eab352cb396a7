//! PCI Bus Access
//!
//! Configuration space access, display device discovery and the device
//! power primitives the power manager sequences.
//!
//! Config space reads and bus-master control have default implementations
//! on top of [`PciConfigAccess`]. Everything that needs the host's device
//! model (driver binding, runtime PM references, ACPI handles, the real
//! `D0`/`D3cold` transitions) is left to the [`PciPlatform`] implementor.

use alloc::vec::Vec;
use core::fmt;

use super::acpi::AcpiPowerState;

/// PCI configuration address port
pub const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
/// PCI configuration data port
pub const PCI_CONFIG_DATA: u16 = 0xCFC;

/// Value read back from config space of an absent or unpowered function
pub const PCI_NOT_RESPONDING: u32 = 0xFFFF_FFFF;

/// NVIDIA vendor ID
pub const PCI_VENDOR_ID_NVIDIA: u16 = 0x10DE;
/// Intel vendor ID
pub const PCI_VENDOR_ID_INTEL: u16 = 0x8086;

/// Display controller base class
pub const PCI_CLASS_DISPLAY: u8 = 0x03;

/// PCI configuration registers
pub mod config {
    pub const VENDOR_ID: u8 = 0x00;
    pub const DEVICE_ID: u8 = 0x02;
    pub const COMMAND: u8 = 0x04;
    pub const STATUS: u8 = 0x06;
    pub const CLASS_CODE: u8 = 0x0B;
    pub const HEADER_TYPE: u8 = 0x0E;
    pub const BIST: u8 = 0x0F;
}

/// BIST register bit that starts a self-test
pub const BIST_START: u8 = 0x40;

/// Size of the saved standard header in dwords
pub const CONFIG_HEADER_DWORDS: usize = 16;

bitflags::bitflags! {
    /// PCI command register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PciCommand: u16 {
        const IO_SPACE = 0x0001;
        const MEMORY_SPACE = 0x0002;
        const BUS_MASTER = 0x0004;
        const INTERRUPT_DISABLE = 0x0400;
    }
}

/// PCI device location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciLocation {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciLocation {
    pub fn new(bus: u8, device: u8, function: u8) -> Self {
        Self { bus, device, function }
    }

    /// Generate configuration space address
    fn config_address(&self, offset: u8) -> u32 {
        0x80000000
            | ((self.bus as u32) << 16)
            | ((self.device as u32) << 11)
            | ((self.function as u32) << 8)
            | ((offset as u32) & 0xFC)
    }
}

impl fmt::Display for PciLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:02X}.{}", self.bus, self.device, self.function)
    }
}

/// PCI device power states
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePowerState {
    /// D0 - Full power
    D0 = 0,
    /// D1 - Device-specific low power
    D1 = 1,
    /// D2 - Device-specific lower power
    D2 = 2,
    /// D3hot - Off, config space still reachable
    D3Hot = 3,
    /// D3cold - Rail removed
    D3Cold = 4,
}

/// Failures reported by the PCI/ACPI primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciError {
    /// Config space reads back as all ones
    DeviceNotResponding,
    /// The requested PCI power transition was refused
    PowerTransitionFailed,
    /// Generic device enable failed
    EnableFailed,
    /// ACPI power state could not be set
    AcpiFailed,
}

impl fmt::Display for PciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PciError::DeviceNotResponding => write!(f, "device not responding"),
            PciError::PowerTransitionFailed => write!(f, "power transition failed"),
            PciError::EnableFailed => write!(f, "device enable failed"),
            PciError::AcpiFailed => write!(f, "ACPI power state change failed"),
        }
    }
}

/// Saved standard configuration header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub dwords: [u32; CONFIG_HEADER_DWORDS],
}

/// Identity of a discovered function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciDeviceInfo {
    pub location: PciLocation,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u8,
}

/// Dword-granular configuration space access
pub trait PciConfigAccess {
    fn read_config_u32(&mut self, loc: PciLocation, offset: u8) -> u32;
    fn write_config_u32(&mut self, loc: PciLocation, offset: u8, value: u32);

    /// Read 8-bit value from PCI config space
    fn read_config_u8(&mut self, loc: PciLocation, offset: u8) -> u8 {
        let value = self.read_config_u32(loc, offset & 0xFC);
        ((value >> ((offset & 3) * 8)) & 0xFF) as u8
    }

    /// Read 16-bit value from PCI config space
    fn read_config_u16(&mut self, loc: PciLocation, offset: u8) -> u16 {
        let value = self.read_config_u32(loc, offset & 0xFC);
        ((value >> ((offset & 2) * 8)) & 0xFFFF) as u16
    }

    /// Write 16-bit value to PCI config space
    fn write_config_u16(&mut self, loc: PciLocation, offset: u8, value: u16) {
        let mut old = self.read_config_u32(loc, offset & 0xFC);
        let shift = (offset & 2) * 8;
        // Status shares the dword with command and is write-1-to-clear
        if offset == config::COMMAND {
            old &= 0x0000_FFFF;
        }
        let mask = !(0xFFFF << shift);
        let new = (old & mask) | ((value as u32) << shift);
        self.write_config_u32(loc, offset & 0xFC, new);
    }
}

/// Host-owned device primitives
///
/// The power manager decides when these run and in which order; the host
/// decides how.
pub trait PciPlatform: PciConfigAccess {
    /// Save configuration state ahead of a power-off
    fn save_state(&mut self, loc: PciLocation) -> ConfigSnapshot {
        save_config_header(self, loc)
    }

    /// Restore state saved by [`Self::save_state`]
    fn restore_state(&mut self, loc: PciLocation, snapshot: &ConfigSnapshot) {
        restore_config_header(self, loc, snapshot)
    }

    /// Set or clear bus mastering
    fn set_bus_master(&mut self, loc: PciLocation, enable: bool) {
        set_bus_master(self, loc, enable)
    }

    /// Generic device teardown
    fn disable_device(&mut self, loc: PciLocation);

    /// Generic device bring-up
    fn enable_device(&mut self, loc: PciLocation) -> Result<(), PciError>;

    /// Request a PCI power state
    fn set_power_state(&mut self, loc: PciLocation, state: DevicePowerState)
        -> Result<(), PciError>;

    /// Cached ACPI power state of the device's handle, `None` without one
    fn acpi_power_state(&mut self, loc: PciLocation) -> Option<AcpiPowerState>;

    /// Force the ACPI power state of the device's handle
    fn acpi_set_power_state(&mut self, loc: PciLocation, state: AcpiPowerState)
        -> Result<(), PciError>;

    /// Take a runtime power reference on the upstream bridge
    fn bridge_runtime_get(&mut self, loc: PciLocation);

    /// Drop a reference taken by [`Self::bridge_runtime_get`]
    fn bridge_runtime_put(&mut self, loc: PciLocation);

    /// True if some driver is bound to the device
    fn driver_bound(&mut self, loc: PciLocation) -> bool;
}

/// Read the standard header
pub fn save_config_header<A: PciConfigAccess + ?Sized>(
    access: &mut A,
    loc: PciLocation,
) -> ConfigSnapshot {
    let mut dwords = [0u32; CONFIG_HEADER_DWORDS];
    for (i, dword) in dwords.iter_mut().enumerate() {
        *dword = access.read_config_u32(loc, (i * 4) as u8);
    }
    ConfigSnapshot { dwords }
}

/// Write a saved header back
///
/// IDs are read-only and skipped. Dwords go back highest first so the
/// command register (which re-enables decoding) is written last. Status is
/// written as zero and BIST is left alone.
pub fn restore_config_header<A: PciConfigAccess + ?Sized>(
    access: &mut A,
    loc: PciLocation,
    snapshot: &ConfigSnapshot,
) {
    for i in (1..CONFIG_HEADER_DWORDS).rev() {
        let offset = (i * 4) as u8;
        let value = match offset {
            o if o == config::COMMAND => snapshot.dwords[i] & 0x0000_FFFF,
            o if o == config::BIST & 0xFC => snapshot.dwords[i] & 0x00FF_FFFF,
            _ => snapshot.dwords[i],
        };
        access.write_config_u32(loc, offset, value);
    }
}

/// Set or clear the bus-master bit in the command register
pub fn set_bus_master<A: PciConfigAccess + ?Sized>(access: &mut A, loc: PciLocation, enable: bool) {
    let mut cmd = PciCommand::from_bits_retain(access.read_config_u16(loc, config::COMMAND));
    cmd.set(PciCommand::BUS_MASTER, enable);
    access.write_config_u16(loc, config::COMMAND, cmd.bits());
}

/// Scan every bus for display-class functions from `vendor`
pub fn find_display_devices<A: PciConfigAccess + ?Sized>(
    access: &mut A,
    vendor: u16,
) -> Vec<PciDeviceInfo> {
    let mut devices = Vec::new();

    for bus in 0..=255u8 {
        for device in 0..32u8 {
            for function in 0..8u8 {
                let loc = PciLocation::new(bus, device, function);
                let vendor_id = access.read_config_u16(loc, config::VENDOR_ID);

                if vendor_id == 0xFFFF {
                    if function == 0 {
                        break;
                    }
                    continue;
                }

                let class_code = access.read_config_u8(loc, config::CLASS_CODE);
                if vendor_id == vendor && class_code == PCI_CLASS_DISPLAY {
                    let device_id = access.read_config_u16(loc, config::DEVICE_ID);
                    log::debug!(
                        "found display device {:04x}:{:04x} at {}",
                        vendor_id,
                        device_id,
                        loc
                    );
                    devices.push(PciDeviceInfo {
                        location: loc,
                        vendor_id,
                        device_id,
                        class_code,
                    });
                }

                // Only check function 0 if not multifunction
                if function == 0 {
                    let header_type = access.read_config_u8(loc, config::HEADER_TYPE);
                    if (header_type & 0x80) == 0 {
                        break;
                    }
                }
            }
        }
    }

    devices
}

/// Configuration mechanism #1 through ports `0xCF8`/`0xCFC`
#[cfg(target_arch = "x86_64")]
pub struct PortConfigAccess {
    _private: (),
}

#[cfg(target_arch = "x86_64")]
impl PortConfigAccess {
    /// # Safety
    ///
    /// The caller must run with I/O privilege and serialize all users of
    /// the configuration ports.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl PciConfigAccess for PortConfigAccess {
    fn read_config_u32(&mut self, loc: PciLocation, offset: u8) -> u32 {
        use x86_64::instructions::port::Port;
        let mut addr_port: Port<u32> = Port::new(PCI_CONFIG_ADDRESS);
        let mut data_port: Port<u32> = Port::new(PCI_CONFIG_DATA);
        // SAFETY: I/O privilege and serialization asserted in `new`.
        unsafe {
            addr_port.write(loc.config_address(offset));
            data_port.read()
        }
    }

    fn write_config_u32(&mut self, loc: PciLocation, offset: u8, value: u32) {
        use x86_64::instructions::port::Port;
        let mut addr_port: Port<u32> = Port::new(PCI_CONFIG_ADDRESS);
        let mut data_port: Port<u32> = Port::new(PCI_CONFIG_DATA);
        // SAFETY: I/O privilege and serialization asserted in `new`.
        unsafe {
            addr_port.write(loc.config_address(offset));
            data_port.write(value);
        }
    }
}
