//! Sleep Transition Notifications
//!
//! The host announces system sleep transitions to registered observers.
//! The switcher only needs subscribe/unsubscribe; [`SleepNotifier`] is
//! that capability, and [`NotifierChain`] is a self-contained
//! implementation for hosts without their own.
//!
//! # Event Pairs
//!
//! Events arrive as prepare/post pairs without reordering:
//!
//! - `SuspendPrepare` → `PostSuspend`
//! - `HibernationPrepare` → `PostHibernation`
//! - `RestorePrepare` → `PostRestore`
//!
//! A prepare may also be followed by nothing (aborted transition) and then
//! by a fresh prepare.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::{GswError, GswResult};

/// Maximum number of observers on one chain
pub const MAX_SLEEP_OBSERVERS: usize = 16;

/// System sleep transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepEvent {
    /// Going into suspend-to-RAM
    SuspendPrepare,
    /// Back from suspend-to-RAM
    PostSuspend,
    /// Going into hibernation
    HibernationPrepare,
    /// Hibernation image written, or hibernation aborted
    PostHibernation,
    /// About to restore a hibernation image
    RestorePrepare,
    /// Image restore finished or failed
    PostRestore,
}

/// Observer verdict, as the host's notifier chain expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// Event handled
    Done,
    /// Event not of interest
    Ignored,
}

/// Receives sleep transitions
pub trait SleepObserver: Send + Sync {
    fn on_sleep_event(&self, event: SleepEvent) -> NotifyResult;
}

/// Registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierHandle(usize);

/// Subscribe/unsubscribe capability offered by the host
pub trait SleepNotifier {
    /// Add `observer`; lower `priority` runs first
    fn subscribe(&self, observer: Arc<dyn SleepObserver>, priority: u32) -> GswResult<NotifierHandle>;

    /// Remove a registration. Returns false for a stale handle.
    fn unsubscribe(&self, handle: NotifierHandle) -> bool;
}

struct Registration {
    observer: Arc<dyn SleepObserver>,
    priority: u32,
    /// Registration order, for ties
    seq: u64,
}

struct ChainState {
    slots: Vec<Option<Registration>>,
    next_seq: u64,
}

/// Fixed-size observer table
pub struct NotifierChain {
    state: Mutex<ChainState>,
}

impl NotifierChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                slots: (0..MAX_SLEEP_OBSERVERS).map(|_| None).collect(),
                next_seq: 0,
            }),
        }
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.state.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every observer by priority
    ///
    /// Observers run without the chain lock held, so they may block and may
    /// (un)subscribe.
    pub fn notify(&self, event: SleepEvent) -> NotifyResult {
        let mut observers: Vec<(u32, u64, Arc<dyn SleepObserver>)> = {
            let state = self.state.lock();
            state
                .slots
                .iter()
                .flatten()
                .map(|r| (r.priority, r.seq, r.observer.clone()))
                .collect()
        };
        observers.sort_by_key(|(priority, seq, _)| (*priority, *seq));

        log::debug!("Delivering {:?} to {} observers", event, observers.len());

        let mut result = NotifyResult::Ignored;
        for (_, _, observer) in observers {
            if observer.on_sleep_event(event) == NotifyResult::Done {
                result = NotifyResult::Done;
            }
        }
        result
    }
}

impl SleepNotifier for NotifierChain {
    fn subscribe(&self, observer: Arc<dyn SleepObserver>, priority: u32) -> GswResult<NotifierHandle> {
        let mut state = self.state.lock();
        let seq = state.next_seq;

        let index = state
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(GswError::InsufficientResources)?;

        state.slots[index] = Some(Registration {
            observer,
            priority,
            seq,
        });
        state.next_seq += 1;
        Ok(NotifierHandle(index))
    }

    fn unsubscribe(&self, handle: NotifierHandle) -> bool {
        let mut state = self.state.lock();
        match state.slots.get_mut(handle.0) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }
}
