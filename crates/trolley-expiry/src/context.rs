//! The process-scoped context shared by the controllers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;
use crate::config::ExpiryConfig;
use crate::notify::{Notice, Notifier};
use crate::store::DurableStore;
use crate::timer::{Resource, TimerHandle, TimerManager};

/// What to do when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    ExpireCart,
    PollSession,
    ClearHighlight,
    HideCartPopup,
}

/// Everything the controllers share: storage, time, notices and timers.
///
/// Owned by the coordinator and lent to each controller call, so only one
/// piece of logic touches it at a time.
#[derive(Debug)]
pub struct ExpiryContext {
    pub store: DurableStore,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub timers: TimerManager<TimerAction>,
    pub config: ExpiryConfig,
}

impl ExpiryContext {
    pub fn new(
        store: DurableStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            timers: TimerManager::new(),
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Arm `resource` to run `action` after `delay` from now.
    pub fn arm(
        &mut self,
        resource: Resource,
        delay: TimeDelta,
        action: TimerAction,
    ) -> TimerHandle {
        let now = self.clock.now();
        self.timers.arm(resource, now, delay, action)
    }

    pub fn cancel(&mut self, resource: Resource) -> bool {
        self.timers.cancel(resource)
    }

    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(&notice);
    }
}
