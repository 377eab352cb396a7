//! Driver Load/Unload
//!
//! # Load
//! 1. Announce the version
//! 2. Discover the dGPU (fatal if absent)
//! 3. Subscribe the suspend handler to sleep events
//! 4. Publish `gpu_state` (fatal on failure; the subscription is undone)
//! 5. Apply the `load_state` parameter
//!
//! # Unload
//! 1. Apply the `unload_state` parameter
//! 2. Withdraw `gpu_state`
//! 3. Unsubscribe from sleep events

use alloc::sync::Arc;

use crate::cm::{DesiredState, Params};
use crate::hal::delay::Delay;
use crate::hal::ec::RegisterBackend;
use crate::hal::pci::PciPlatform;
use crate::io::attribute::{AttributeHost, GpuStateAttribute, GPU_STATE_ATTR};
use crate::io::switcheroo::SwitcherooHandler;
use crate::po::dgpu::DiscreteGpu;
use crate::po::notify::{NotifierHandle, SleepNotifier};
use crate::po::suspend::SuspendHandler;
use crate::po::{PowerState, Transition};
use crate::{GswResult, VERSION};

/// Priority of the suspend handler on the sleep notifier chain
pub const SUSPEND_NOTIFIER_PRIORITY: u32 = 0;

/// A loaded switcher instance
pub struct Pmh7Gsw<E, P, D> {
    gpu: Arc<DiscreteGpu<E, P, D>>,
    params: Params,
    notifier_handle: NotifierHandle,
}

impl<E, P, D> Pmh7Gsw<E, P, D>
where
    E: RegisterBackend + Send + 'static,
    P: PciPlatform + Send + 'static,
    D: Delay + Send + 'static,
{
    pub fn load<N, H>(
        params: Params,
        ec: E,
        pci: P,
        delay: D,
        notifier: &N,
        attrs: &H,
    ) -> GswResult<Self>
    where
        N: SleepNotifier + ?Sized,
        H: AttributeHost + ?Sized,
    {
        log::info!("ThinkPad PMH7 graphics switcher v{}", VERSION);

        let gpu = Arc::new(DiscreteGpu::discover(ec, pci, delay)?);

        let handler = Arc::new(SuspendHandler::new(gpu.clone()));
        let notifier_handle = notifier.subscribe(handler, SUSPEND_NOTIFIER_PRIORITY)?;

        let attr = Arc::new(GpuStateAttribute::new(gpu.clone()));
        if let Err(e) = attrs.publish(attr) {
            log::error!("Failed to create {} attribute: {}", GPU_STATE_ATTR, e);
            notifier.unsubscribe(notifier_handle);
            return Err(e);
        }

        let gsw = Self {
            gpu,
            params,
            notifier_handle,
        };
        gsw.apply(params.on_load, "load");
        Ok(gsw)
    }

    pub fn unload<N, H>(self, notifier: &N, attrs: &H)
    where
        N: SleepNotifier + ?Sized,
        H: AttributeHost + ?Sized,
    {
        self.apply(self.params.on_unload, "unload");
        attrs.withdraw(GPU_STATE_ATTR);
        notifier.unsubscribe(self.notifier_handle);
    }

    fn apply(&self, desired: DesiredState, stage: &str) -> Option<Transition> {
        let target = desired.target()?;
        log::info!("Turning discrete GPU {} at {}", target, stage);
        Some(self.gpu.set_power_state(target))
    }

    pub fn gpu(&self) -> &Arc<DiscreteGpu<E, P, D>> {
        &self.gpu
    }

    pub fn power_state(&self) -> PowerState {
        self.gpu.power_state()
    }

    /// Handler to register with the host's GPU switching framework
    pub fn switcheroo_handler(&self) -> SwitcherooHandler<E, P, D> {
        SwitcherooHandler::new(self.gpu.clone())
    }
}
