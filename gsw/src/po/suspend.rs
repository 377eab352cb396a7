//! Suspend/Resume Handling
//!
//! The generic suspend path snapshots the config space of every PCI
//! device. A dGPU with its rail cut reads back as all ones there, so it is
//! powered up for the duration of the transition and cut again on resume.
//!
//! # Prepare (suspend, hibernation)
//! Record whether the rail was off; if so, enable it.
//!
//! # Post (resume, post-hibernation, post-restore)
//! If the recorded snapshot says the rail was off, disable it again. The
//! snapshot is consumed either way.
//!
//! # Restore-prepare
//! Nothing. It precedes image restoration and is always followed by
//! `PostRestore`.
//!
//! The snapshot lives under the dGPU lock, so a prepare and its post never
//! race a control-attribute write halfway through.

use alloc::sync::Arc;

use super::dgpu::DiscreteGpu;
use super::notify::{NotifyResult, SleepEvent, SleepObserver};
use crate::hal::delay::Delay;
use crate::hal::ec::RegisterBackend;
use crate::hal::pci::PciPlatform;

/// Keeps the rail state across system sleep
pub struct SuspendHandler<E, P, D> {
    gpu: Arc<DiscreteGpu<E, P, D>>,
}

impl<E, P, D> SuspendHandler<E, P, D>
where
    E: RegisterBackend,
    P: PciPlatform,
    D: Delay,
{
    pub fn new(gpu: Arc<DiscreteGpu<E, P, D>>) -> Self {
        Self { gpu }
    }

    /// Suspend or hibernation is about to start
    pub fn on_suspend_prepare(&self) {
        let mut session = self.gpu.session();
        session.bridge_get();

        let was_disabled = session.is_disabled();
        session.record_suspend_snapshot(was_disabled);
        if was_disabled {
            log::info!("Powering discrete GPU up for suspend");
            session.enable();
        }

        session.bridge_put();
    }

    /// Resume, post-hibernation or post-restore
    pub fn on_resume_complete(&self) {
        let mut session = self.gpu.session();

        if session.take_suspend_snapshot() == Some(true) {
            log::info!("Powering discrete GPU back down after resume");
            session.bridge_get();
            session.disable();
            session.bridge_put();
        }
    }
}

impl<E, P, D> SleepObserver for SuspendHandler<E, P, D>
where
    E: RegisterBackend + Send,
    P: PciPlatform + Send,
    D: Delay + Send,
{
    fn on_sleep_event(&self, event: SleepEvent) -> NotifyResult {
        match event {
            SleepEvent::SuspendPrepare | SleepEvent::HibernationPrepare => {
                self.on_suspend_prepare();
                NotifyResult::Done
            }
            SleepEvent::PostSuspend | SleepEvent::PostHibernation | SleepEvent::PostRestore => {
                self.on_resume_complete();
                NotifyResult::Done
            }
            SleepEvent::RestorePrepare => NotifyResult::Ignored,
        }
    }
}
