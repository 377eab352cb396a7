//! PMH7 Embedded Controller Register Window
//!
//! The Lenovo PMH7 exposes its registers through an indexed window in I/O
//! space:
//!
//! - `BASE + 0x0C`: Address low byte
//! - `BASE + 0x0D`: Address high byte
//! - `BASE + 0x0E`: Data
//!
//! The index is not sticky. The EC drops the selection after every data
//! access, so both address bytes are rewritten before each read and each
//! write.
//!
//! The dGPU control byte lives at index `0x0050`:
//!
//! - bit 7: write-enable (commit). The firmware latches the power bit only
//!   while this is low and acts on it once it is raised again.
//! - bit 3: rail power.
//!
//! All other bits belong to the firmware and are written back unchanged.
//!
//! # Locking
//!
//! [`RegisterBackend`] operations are not atomic with respect to each
//! other. Callers must hold the device lock (see `po::dgpu`).

use bitflags::bitflags;

/// PMH7 I/O base
pub const PMH7_BASE: u16 = 0x15e0;
/// Address low port
pub const PMH7_ADDR_L: u16 = PMH7_BASE + 0x0c;
/// Address high port
pub const PMH7_ADDR_H: u16 = PMH7_BASE + 0x0d;
/// Data port
pub const PMH7_DATA: u16 = PMH7_BASE + 0x0e;

/// Index of the dGPU control byte, low half
pub const DGPU_SELECT_L: u8 = 0x50;
/// Index of the dGPU control byte, high half
pub const DGPU_SELECT_H: u8 = 0x00;

bitflags! {
    /// dGPU control byte
    ///
    /// Only two bits are defined; undefined bits are carried with
    /// `from_bits_retain` so they survive a read-modify-write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PowerControl: u8 {
        /// Commit ("write-enable")
        const WRITE_ENABLE = 1 << 7;
        /// Rail power
        const POWER = 1 << 3;
    }
}

/// Two-byte EC index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAddress {
    pub low: u8,
    pub high: u8,
}

impl RegisterAddress {
    /// The dGPU control byte
    pub const DGPU_CONTROL: Self = Self {
        low: DGPU_SELECT_L,
        high: DGPU_SELECT_H,
    };
}

/// Raw byte access to I/O ports
pub trait EcPorts {
    fn inb(&mut self, port: u16) -> u8;
    fn outb(&mut self, port: u16, value: u8);
}

/// Bit-level access to the dGPU control byte
pub trait RegisterBackend {
    /// Returns true if `bit` is set
    fn peek(&mut self, bit: PowerControl) -> bool;

    /// Sets (`set == true`) or clears `bit`, leaving every other bit as read
    fn poke(&mut self, bit: PowerControl, set: bool);
}

/// Access counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pmh7Stats {
    /// Data port reads
    pub reads: u64,
    /// Data port writes
    pub writes: u64,
}

/// PMH7 register window over a set of I/O ports
pub struct Pmh7<P: EcPorts> {
    ports: P,
    address: RegisterAddress,
    stats: Pmh7Stats,
}

impl<P: EcPorts> Pmh7<P> {
    /// Window targeting the dGPU control byte
    pub fn new(ports: P) -> Self {
        Self {
            ports,
            address: RegisterAddress::DGPU_CONTROL,
            stats: Pmh7Stats::default(),
        }
    }

    /// Write both index bytes. Must precede every data access.
    fn select(&mut self) {
        self.ports.outb(PMH7_ADDR_L, self.address.low);
        self.ports.outb(PMH7_ADDR_H, self.address.high);
    }

    fn read_data(&mut self) -> u8 {
        self.select();
        self.stats.reads += 1;
        self.ports.inb(PMH7_DATA)
    }

    fn write_data(&mut self, value: u8) {
        self.select();
        self.stats.writes += 1;
        self.ports.outb(PMH7_DATA, value);
    }

    /// Read the whole control byte, undefined bits included
    pub fn read_control(&mut self) -> PowerControl {
        PowerControl::from_bits_retain(self.read_data())
    }

    pub fn stats(&self) -> Pmh7Stats {
        self.stats
    }
}

impl<P: EcPorts> RegisterBackend for Pmh7<P> {
    fn peek(&mut self, bit: PowerControl) -> bool {
        self.read_control().intersects(bit)
    }

    fn poke(&mut self, bit: PowerControl, set: bool) {
        let mut control = self.read_control();
        control.set(bit, set);
        self.write_data(control.bits());
    }
}

/// Bare-metal port access through `in`/`out`
#[cfg(target_arch = "x86_64")]
pub struct X86Ports {
    _private: (),
}

#[cfg(target_arch = "x86_64")]
impl X86Ports {
    /// # Safety
    ///
    /// The caller must run with I/O privilege for the PMH7 range and must
    /// be the only owner of that range.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl EcPorts for X86Ports {
    fn inb(&mut self, port: u16) -> u8 {
        let mut port: x86_64::instructions::port::Port<u8> =
            x86_64::instructions::port::Port::new(port);
        // SAFETY: I/O privilege and exclusive ownership asserted in `new`.
        unsafe { port.read() }
    }

    fn outb(&mut self, port: u16, value: u8) {
        let mut port: x86_64::instructions::port::Port<u8> =
            x86_64::instructions::port::Port::new(port);
        // SAFETY: I/O privilege and exclusive ownership asserted in `new`.
        unsafe { port.write(value) }
    }
}
