//! ACPI Device Power States
//!
//! The host keeps a cached ACPI power state per device handle. When that
//! cache says `Unknown` the firmware rejects the next transition, so the
//! power manager forces `D0` first.

use core::fmt;

/// ACPI device power state as cached by the host
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcpiPowerState {
    /// D0 - Full power
    D0 = 0,
    /// D1 - Device-specific low power
    D1 = 1,
    /// D2 - Device-specific lower power
    D2 = 2,
    /// D3hot - Off, auxiliary power kept
    D3Hot = 3,
    /// D3cold - Off, no power
    D3Cold = 4,
    /// Never evaluated or lost
    #[default]
    Unknown = 0xff,
}

impl From<u8> for AcpiPowerState {
    fn from(value: u8) -> Self {
        match value {
            0 => AcpiPowerState::D0,
            1 => AcpiPowerState::D1,
            2 => AcpiPowerState::D2,
            3 => AcpiPowerState::D3Hot,
            4 => AcpiPowerState::D3Cold,
            _ => AcpiPowerState::Unknown,
        }
    }
}

impl fmt::Display for AcpiPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcpiPowerState::D0 => "D0",
            AcpiPowerState::D1 => "D1",
            AcpiPowerState::D2 => "D2",
            AcpiPowerState::D3Hot => "D3hot",
            AcpiPowerState::D3Cold => "D3cold",
            AcpiPowerState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
