//! Discrete GPU Context
//!
//! One [`DiscreteGpu`] exists per driver instance. It owns the register
//! backend, the PCI host handle and the delay source behind a single lock,
//! so rail sequences from the control attribute, the sleep notifier and
//! module load/unload never interleave.
//!
//! # Disable
//! 1. Already off: nothing to do
//! 2. Driver bound: warn and leave it alone
//! 3. Save config state, clear bus mastering, generic PCI disable
//! 4. ACPI state unknown: force D0 so the firmware takes the next request
//! 5. Request D3cold
//! 6. Wait 50 ms
//! 7. Cut the rail
//!
//! # Enable
//! 1. Already on: nothing to do
//! 2. Wait 50 ms
//! 3. Raise the rail
//! 4. Request D0, restore config state, generic PCI enable, set bus
//!    mastering
//!
//! Both run with a runtime reference held on the upstream bridge, since
//! the device's config space is unreachable while the bridge sleeps.
//! PCI and ACPI failures are logged and the sequence carries on; stopping
//! halfway would leave the rail and the device out of step.

use spin::{Mutex, MutexGuard};

use super::{liveness, rail, PowerState, Transition};
use crate::hal::acpi::AcpiPowerState;
use crate::hal::delay::Delay;
use crate::hal::ec::RegisterBackend;
use crate::hal::pci::{
    find_display_devices, ConfigSnapshot, DevicePowerState, PciDeviceInfo, PciLocation,
    PciPlatform, PCI_VENDOR_ID_NVIDIA,
};
use crate::{GswError, GswResult};

/// Wait between PCI power requests and rail changes
pub const PCI_SETTLE_MS: u32 = 50;

struct GpuInner<E, P, D> {
    ec: E,
    pci: P,
    delay: D,
    /// Valid between a disable and the next enable
    saved_config: Option<ConfigSnapshot>,
    /// "Was disabled before suspend", consumed by the matching resume
    suspend_snapshot: Option<bool>,
}

/// The discrete GPU and everything needed to switch it
pub struct DiscreteGpu<E, P, D> {
    info: PciDeviceInfo,
    inner: Mutex<GpuInner<E, P, D>>,
}

impl<E, P, D> DiscreteGpu<E, P, D>
where
    E: RegisterBackend,
    P: PciPlatform,
    D: Delay,
{
    pub fn new(info: PciDeviceInfo, ec: E, pci: P, delay: D) -> Self {
        Self {
            info,
            inner: Mutex::new(GpuInner {
                ec,
                pci,
                delay,
                saved_config: None,
                suspend_snapshot: None,
            }),
        }
    }

    /// Locate the NVIDIA display function and build its context
    pub fn discover(ec: E, mut pci: P, delay: D) -> GswResult<Self> {
        let found = find_display_devices(&mut pci, PCI_VENDOR_ID_NVIDIA);

        let info = match found.first() {
            Some(info) => *info,
            None => {
                log::error!("No discrete GPU found");
                return Err(GswError::DeviceNotFound);
            }
        };

        if found.len() > 1 {
            log::warn!(
                "{} discrete GPUs found, switching the one at {}",
                found.len(),
                info.location
            );
        }

        log::info!(
            "Found discrete GPU {:04x}:{:04x} at {}",
            info.vendor_id,
            info.device_id,
            info.location
        );

        Ok(Self::new(info, ec, pci, delay))
    }

    pub fn info(&self) -> &PciDeviceInfo {
        &self.info
    }

    /// Take the device lock
    ///
    /// Blocks while another sequence is running.
    pub fn session(&self) -> GpuSession<'_, E, P, D> {
        GpuSession {
            loc: self.info.location,
            inner: self.inner.lock(),
        }
    }

    /// Liveness check with the bridge held awake
    pub fn is_disabled(&self) -> bool {
        let mut session = self.session();
        session.bridge_get();
        let disabled = session.is_disabled();
        session.bridge_put();
        disabled
    }

    pub fn power_state(&self) -> PowerState {
        if self.is_disabled() {
            PowerState::Off
        } else {
            PowerState::On
        }
    }

    pub fn enable(&self) -> Transition {
        self.session().enable()
    }

    pub fn disable(&self) -> Transition {
        self.session().disable()
    }

    pub fn set_power_state(&self, state: PowerState) -> Transition {
        match state {
            PowerState::On => self.enable(),
            PowerState::Off => self.disable(),
        }
    }
}

/// Exclusive access to the dGPU for the lifetime of the value
pub struct GpuSession<'a, E, P, D> {
    loc: PciLocation,
    inner: MutexGuard<'a, GpuInner<E, P, D>>,
}

impl<E, P, D> GpuSession<'_, E, P, D>
where
    E: RegisterBackend,
    P: PciPlatform,
    D: Delay,
{
    pub fn bridge_get(&mut self) {
        self.inner.pci.bridge_runtime_get(self.loc);
    }

    pub fn bridge_put(&mut self) {
        self.inner.pci.bridge_runtime_put(self.loc);
    }

    /// Liveness check; the caller holds the bridge
    pub fn is_disabled(&mut self) -> bool {
        let inner = &mut *self.inner;
        liveness::is_disabled(&mut inner.ec, &mut inner.pci, self.loc)
    }

    pub fn disable(&mut self) -> Transition {
        self.bridge_get();
        let result = self.disable_locked();
        self.bridge_put();
        result
    }

    pub fn enable(&mut self) -> Transition {
        self.bridge_get();
        let result = self.enable_locked();
        self.bridge_put();
        result
    }

    fn disable_locked(&mut self) -> Transition {
        if self.is_disabled() {
            return Transition::Unchanged;
        }

        let loc = self.loc;
        let inner = &mut *self.inner;

        if inner.pci.driver_bound(loc) {
            log::warn!("Discrete GPU at {} is in use by a driver, not disabling", loc);
            return Transition::InUse;
        }

        inner.saved_config = Some(inner.pci.save_state(loc));
        inner.pci.set_bus_master(loc, false);
        inner.pci.disable_device(loc);

        if inner.pci.acpi_power_state(loc) == Some(AcpiPowerState::Unknown) {
            if let Err(e) = inner.pci.acpi_set_power_state(loc, AcpiPowerState::D0) {
                log::warn!("Failed to force ACPI D0 on {}: {}", loc, e);
            }
        }

        if let Err(e) = inner.pci.set_power_state(loc, DevicePowerState::D3Cold) {
            log::warn!("Failed to put {} into D3cold: {}", loc, e);
        }

        inner.delay.msleep(PCI_SETTLE_MS);
        rail::disable_rails(&mut inner.ec, &mut inner.delay);

        Transition::Completed
    }

    fn enable_locked(&mut self) -> Transition {
        if !self.is_disabled() {
            return Transition::Unchanged;
        }

        let loc = self.loc;
        let inner = &mut *self.inner;

        inner.delay.msleep(PCI_SETTLE_MS);
        rail::enable_rails(&mut inner.ec, &mut inner.delay);

        if let Err(e) = inner.pci.set_power_state(loc, DevicePowerState::D0) {
            log::warn!("Failed to put {} into D0: {}", loc, e);
        }

        match inner.saved_config.take() {
            Some(saved) => inner.pci.restore_state(loc, &saved),
            None => log::debug!("No saved config state for {}", loc),
        }

        if let Err(e) = inner.pci.enable_device(loc) {
            log::warn!("Failed to re-enable discrete GPU at {}: {}", loc, e);
        }
        inner.pci.set_bus_master(loc, true);

        Transition::Completed
    }

    pub(crate) fn record_suspend_snapshot(&mut self, was_disabled: bool) {
        self.inner.suspend_snapshot = Some(was_disabled);
    }

    pub(crate) fn take_suspend_snapshot(&mut self) -> Option<bool> {
        self.inner.suspend_snapshot.take()
    }
}
