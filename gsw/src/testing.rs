//! Test doubles
//!
//! In-memory models of the PMH7 window, the PCI host and the delay source.
//! All three append to one shared [`Trace`] so tests can check ordering
//! across them.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::hal::acpi::AcpiPowerState;
use crate::hal::delay::Delay;
use crate::hal::ec::{
    EcPorts, Pmh7, PowerControl, DGPU_SELECT_H, DGPU_SELECT_L, PMH7_ADDR_H, PMH7_ADDR_L,
    PMH7_DATA,
};
use crate::hal::pci::{
    self, ConfigSnapshot, DevicePowerState, PciConfigAccess, PciDeviceInfo, PciError,
    PciLocation, PciPlatform, BIST_START, PCI_NOT_RESPONDING, PCI_VENDOR_ID_NVIDIA,
};
use crate::po::dgpu::DiscreteGpu;

pub const GPU_LOCATION: PciLocation = PciLocation {
    bus: 1,
    device: 0,
    function: 0,
};
pub const GPU_DEVICE_ID: u16 = 0x0FD5;

/// Firmware-owned bits of the control byte
pub const OTHER_BITS: u8 = 0x21;
pub const CONTROL_ON: u8 = OTHER_BITS | 0x88;
pub const CONTROL_OFF: u8 = OTHER_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    EcWrite(u8),
    Sleep(u32),
    SleepRange(u32, u32),
    BridgeGet,
    BridgePut,
    SaveState,
    RestoreState,
    BusMaster(bool),
    DisableDevice,
    EnableDevice,
    SetPower(DevicePowerState),
    AcpiSet(AcpiPowerState),
}

pub type Trace = Arc<Mutex<Vec<Event>>>;

pub fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(trace: &Trace) -> Vec<Event> {
    trace.lock().clone()
}

/// Events without the EC writes and sleeps
pub fn pci_events(trace: &Trace) -> Vec<Event> {
    events(trace)
        .into_iter()
        .filter(|e| !matches!(e, Event::EcWrite(_) | Event::Sleep(_) | Event::SleepRange(..)))
        .collect()
}

struct EcModel {
    control: u8,
    latch_low: Option<u8>,
    latch_high: Option<u8>,
    writes: u32,
    unselected: u32,
    commit_violations: u32,
}

impl EcModel {
    fn take_selection(&mut self) -> bool {
        let selected = self.latch_low == Some(DGPU_SELECT_L) && self.latch_high == Some(DGPU_SELECT_H);
        self.latch_low = None;
        self.latch_high = None;
        if !selected {
            self.unselected += 1;
        }
        selected
    }
}

/// PMH7 model that forgets its index after every data access
#[derive(Clone)]
pub struct MockEc {
    model: Arc<Mutex<EcModel>>,
    trace: Trace,
}

impl MockEc {
    pub fn new(control: u8, trace: Trace) -> Self {
        Self {
            model: Arc::new(Mutex::new(EcModel {
                control,
                latch_low: None,
                latch_high: None,
                writes: 0,
                unselected: 0,
                commit_violations: 0,
            })),
            trace,
        }
    }

    pub fn control(&self) -> u8 {
        self.model.lock().control
    }

    pub fn set_control(&self, control: u8) {
        self.model.lock().control = control;
    }

    pub fn writes(&self) -> u32 {
        self.model.lock().writes
    }

    pub fn unselected_accesses(&self) -> u32 {
        self.model.lock().unselected
    }

    /// Writes that changed the power bit while the commit bit was high
    /// before or after
    pub fn commit_violations(&self) -> u32 {
        self.model.lock().commit_violations
    }
}

impl EcPorts for MockEc {
    fn inb(&mut self, port: u16) -> u8 {
        let mut model = self.model.lock();
        if port != PMH7_DATA {
            return 0xFF;
        }
        if !model.take_selection() {
            return 0xFF;
        }
        model.control
    }

    fn outb(&mut self, port: u16, value: u8) {
        let mut model = self.model.lock();
        match port {
            PMH7_ADDR_L => model.latch_low = Some(value),
            PMH7_ADDR_H => model.latch_high = Some(value),
            PMH7_DATA => {
                if !model.take_selection() {
                    return;
                }
                let old = model.control;
                let power_changed = (old ^ value) & PowerControl::POWER.bits() != 0;
                let commit_high = (old | value) & PowerControl::WRITE_ENABLE.bits() != 0;
                if power_changed && commit_high {
                    model.commit_violations += 1;
                }
                model.control = value;
                model.writes += 1;
                self.trace.lock().push(Event::EcWrite(value));
            }
            _ => {}
        }
    }
}

struct MockFunction {
    loc: PciLocation,
    header: [u32; 16],
}

struct PciModel {
    functions: Vec<MockFunction>,
    responding: bool,
    driver_bound: bool,
    acpi_state: Option<AcpiPowerState>,
    enable_fails: bool,
    power_fails: bool,
    acpi_fails: bool,
    bridge_refs: i32,
    gpu_reads: u32,
    bist_starts: u32,
}

/// Host PCI model with one NVIDIA display function at [`GPU_LOCATION`]
#[derive(Clone)]
pub struct MockPci {
    model: Arc<Mutex<PciModel>>,
    trace: Trace,
}

fn header(vendor: u16, device: u16, class: u8) -> [u32; 16] {
    let mut header = [0u32; 16];
    header[0] = ((device as u32) << 16) | vendor as u32;
    header[1] = 0x0010_0006;
    header[2] = (class as u32) << 24;
    header
}

impl MockPci {
    pub fn new(trace: Trace) -> Self {
        Self {
            model: Arc::new(Mutex::new(PciModel {
                functions: alloc::vec![MockFunction {
                    loc: GPU_LOCATION,
                    header: header(PCI_VENDOR_ID_NVIDIA, GPU_DEVICE_ID, 0x03),
                }],
                responding: true,
                driver_bound: false,
                acpi_state: Some(AcpiPowerState::D0),
                enable_fails: false,
                power_fails: false,
                acpi_fails: false,
                bridge_refs: 0,
                gpu_reads: 0,
                bist_starts: 0,
            })),
            trace,
        }
    }

    pub fn add_function(&mut self, loc: PciLocation, vendor: u16, device: u16, class: u8) {
        self.model.lock().functions.push(MockFunction {
            loc,
            header: header(vendor, device, class),
        });
    }

    pub fn gpu_info() -> PciDeviceInfo {
        PciDeviceInfo {
            location: GPU_LOCATION,
            vendor_id: PCI_VENDOR_ID_NVIDIA,
            device_id: GPU_DEVICE_ID,
            class_code: 0x03,
        }
    }

    fn with_gpu<R>(&self, f: impl FnOnce(&mut [u32; 16]) -> R) -> R {
        let mut model = self.model.lock();
        let func = model
            .functions
            .iter_mut()
            .find(|f| f.loc == GPU_LOCATION)
            .expect("gpu function");
        f(&mut func.header)
    }

    pub fn set_responding(&self, responding: bool) {
        self.model.lock().responding = responding;
    }

    pub fn set_id_dword(&self, value: u32) {
        self.with_gpu(|h| h[0] = value);
    }

    pub fn command(&self) -> u16 {
        self.with_gpu(|h| h[1] as u16)
    }

    pub fn set_command(&self, command: u16) {
        self.with_gpu(|h| h[1] = (h[1] & 0xFFFF_0000) | command as u32);
    }

    pub fn status(&self) -> u16 {
        self.with_gpu(|h| (h[1] >> 16) as u16)
    }

    pub fn set_status(&self, status: u16) {
        self.with_gpu(|h| h[1] = (h[1] & 0x0000_FFFF) | ((status as u32) << 16));
    }

    /// Set dword 3 (cache line, latency, header type, BIST) directly
    pub fn set_bist_dword(&self, value: u32) {
        self.with_gpu(|h| h[3] = value);
    }

    /// Writes that set the BIST start bit
    pub fn bist_starts(&self) -> u32 {
        self.model.lock().bist_starts
    }

    pub fn set_driver_bound(&self, bound: bool) {
        self.model.lock().driver_bound = bound;
    }

    pub fn set_acpi_state(&self, state: Option<AcpiPowerState>) {
        self.model.lock().acpi_state = state;
    }

    pub fn set_enable_fails(&self, fails: bool) {
        self.model.lock().enable_fails = fails;
    }

    /// Make `D0`/`D3cold` requests fail without changing the device
    pub fn set_power_fails(&self, fails: bool) {
        self.model.lock().power_fails = fails;
    }

    pub fn set_acpi_fails(&self, fails: bool) {
        self.model.lock().acpi_fails = fails;
    }

    pub fn bridge_refs(&self) -> i32 {
        self.model.lock().bridge_refs
    }

    /// Config reads that targeted the GPU
    pub fn gpu_reads(&self) -> u32 {
        self.model.lock().gpu_reads
    }

    fn push(&self, event: Event) {
        self.trace.lock().push(event);
    }
}

impl PciConfigAccess for MockPci {
    fn read_config_u32(&mut self, loc: PciLocation, offset: u8) -> u32 {
        let mut model = self.model.lock();
        if loc == GPU_LOCATION {
            model.gpu_reads += 1;
            if !model.responding {
                return PCI_NOT_RESPONDING;
            }
        }
        match model.functions.iter().find(|f| f.loc == loc) {
            Some(func) => func.header.get((offset / 4) as usize).copied().unwrap_or(0),
            None => PCI_NOT_RESPONDING,
        }
    }

    fn write_config_u32(&mut self, loc: PciLocation, offset: u8, value: u32) {
        let mut guard = self.model.lock();
        let model = &mut *guard;
        if loc == GPU_LOCATION && !model.responding {
            return;
        }
        let Some(func) = model.functions.iter_mut().find(|f| f.loc == loc) else {
            return;
        };
        let Some(dword) = func.header.get_mut((offset / 4) as usize) else {
            return;
        };

        *dword = match offset / 4 {
            // Status is write-1-to-clear
            1 => {
                let status = (*dword >> 16) & !(value >> 16);
                (status << 16) | (value & 0x0000_FFFF)
            }
            // BIST: only the start bit is writable
            3 => {
                if value & ((BIST_START as u32) << 24) != 0 {
                    model.bist_starts += 1;
                }
                (*dword & 0xFF00_0000) | (value & 0x00FF_FFFF)
            }
            _ => value,
        };
    }
}

impl PciPlatform for MockPci {
    fn save_state(&mut self, loc: PciLocation) -> ConfigSnapshot {
        self.push(Event::SaveState);
        pci::save_config_header(self, loc)
    }

    fn restore_state(&mut self, loc: PciLocation, snapshot: &ConfigSnapshot) {
        self.push(Event::RestoreState);
        pci::restore_config_header(self, loc, snapshot)
    }

    fn set_bus_master(&mut self, loc: PciLocation, enable: bool) {
        self.push(Event::BusMaster(enable));
        pci::set_bus_master(self, loc, enable)
    }

    fn disable_device(&mut self, _loc: PciLocation) {
        self.push(Event::DisableDevice);
    }

    fn enable_device(&mut self, _loc: PciLocation) -> Result<(), PciError> {
        self.push(Event::EnableDevice);
        if self.model.lock().enable_fails {
            return Err(PciError::EnableFailed);
        }
        Ok(())
    }

    fn set_power_state(&mut self, _loc: PciLocation, state: DevicePowerState) -> Result<(), PciError> {
        self.push(Event::SetPower(state));
        let mut model = self.model.lock();
        if model.power_fails {
            return Err(PciError::PowerTransitionFailed);
        }
        match state {
            DevicePowerState::D0 => model.responding = true,
            DevicePowerState::D3Cold => model.responding = false,
            _ => {}
        }
        Ok(())
    }

    fn acpi_power_state(&mut self, _loc: PciLocation) -> Option<AcpiPowerState> {
        self.model.lock().acpi_state
    }

    fn acpi_set_power_state(&mut self, _loc: PciLocation, state: AcpiPowerState) -> Result<(), PciError> {
        self.push(Event::AcpiSet(state));
        let mut model = self.model.lock();
        if model.acpi_fails {
            return Err(PciError::AcpiFailed);
        }
        model.acpi_state = Some(state);
        Ok(())
    }

    fn bridge_runtime_get(&mut self, _loc: PciLocation) {
        self.push(Event::BridgeGet);
        self.model.lock().bridge_refs += 1;
    }

    fn bridge_runtime_put(&mut self, _loc: PciLocation) {
        self.push(Event::BridgePut);
        self.model.lock().bridge_refs -= 1;
    }

    fn driver_bound(&mut self, _loc: PciLocation) -> bool {
        self.model.lock().driver_bound
    }
}

/// Delay that records instead of sleeping
pub struct MockDelay {
    trace: Trace,
}

impl MockDelay {
    pub fn new(trace: Trace) -> Self {
        Self { trace }
    }
}

impl Delay for MockDelay {
    fn msleep(&mut self, ms: u32) {
        self.trace.lock().push(Event::Sleep(ms));
    }

    fn usleep_range(&mut self, min_us: u32, max_us: u32) {
        self.trace.lock().push(Event::SleepRange(min_us, max_us));
    }
}

pub type MockGpu = DiscreteGpu<Pmh7<MockEc>, MockPci, MockDelay>;

/// A dGPU context wired to fresh mocks
pub struct Harness {
    pub trace: Trace,
    pub ec: MockEc,
    pub pci: MockPci,
    pub gpu: Arc<MockGpu>,
}

impl Harness {
    pub fn new(powered: bool) -> Self {
        let trace = trace();
        let ec = MockEc::new(if powered { CONTROL_ON } else { CONTROL_OFF }, trace.clone());
        let pci = MockPci::new(trace.clone());
        pci.set_responding(powered);
        let gpu = Arc::new(DiscreteGpu::new(
            MockPci::gpu_info(),
            Pmh7::new(ec.clone()),
            pci.clone(),
            MockDelay::new(trace.clone()),
        ));
        Self { trace, ec, pci, gpu }
    }

    pub fn clear_trace(&self) {
        self.trace.lock().clear();
    }
}
