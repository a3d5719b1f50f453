//! One-shot timers keyed by logical resource.
//!
//! Each [`Resource`] owns at most one live [`TimerHandle`]. Arming a resource
//! replaces its previous handle, so no call site can double-arm. Handles carry
//! a generation number: a caller that captured a handle before it was
//! superseded can hand it back to [`TimerManager::fire`] and will get `None`
//! instead of running stale logic.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

/// Logical timer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Cart inactivity expiry.
    Cart,
    /// Recurring session validity check.
    SessionPoll,
    /// "Just added" highlight on the last added line.
    Highlight,
    /// Cart popup visibility.
    CartPopup,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Cart => write!(f, "cart"),
            Resource::SessionPoll => write!(f, "session-poll"),
            Resource::Highlight => write!(f, "highlight"),
            Resource::CartPopup => write!(f, "cart-popup"),
        }
    }
}

/// Identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub resource: Resource,
    pub deadline: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Debug)]
struct Armed<T> {
    handle: TimerHandle,
    action: T,
}

/// Owns every scheduled timer of one coordinator.
///
/// The manager never runs anything itself. Firing hands the armed action back
/// to the owner after the handle has been cleared, so the owner may re-arm the
/// same resource from inside its handling logic.
#[derive(Debug)]
pub struct TimerManager<T> {
    live: HashMap<Resource, Armed<T>>,
    next_generation: u64,
}

impl<T> Default for TimerManager<T> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
            next_generation: 1,
        }
    }
}

impl<T> TimerManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire `delay` after `now`, replacing any timer
    /// already armed for `resource`.
    pub fn arm(
        &mut self,
        resource: Resource,
        now: DateTime<Utc>,
        delay: TimeDelta,
        action: T,
    ) -> TimerHandle {
        let deadline = now
            .checked_add_signed(delay.max(TimeDelta::zero()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.arm_at(resource, deadline, action)
    }

    /// Schedule `action` at an absolute deadline, replacing any timer already
    /// armed for `resource`.
    pub fn arm_at(
        &mut self,
        resource: Resource,
        deadline: DateTime<Utc>,
        action: T,
    ) -> TimerHandle {
        let handle = TimerHandle {
            resource,
            deadline,
            generation: self.next_generation,
        };
        self.next_generation += 1;

        if let Some(previous) = self.live.insert(resource, Armed { handle, action }) {
            trace!(
                %resource,
                generation = previous.handle.generation,
                "Superseded armed timer"
            );
        }
        debug!(%resource, %deadline, generation = handle.generation, "Timer armed");
        handle
    }

    /// Cancel the timer for `resource`. Returns whether one was armed.
    pub fn cancel(&mut self, resource: Resource) -> bool {
        match self.live.remove(&resource) {
            Some(armed) => {
                debug!(%resource, generation = armed.handle.generation, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether `resource` currently has a live timer.
    pub fn is_armed(&self, resource: Resource) -> bool {
        self.live.contains_key(&resource)
    }

    /// The live handle for `resource`, if any.
    pub fn handle(&self, resource: Resource) -> Option<TimerHandle> {
        self.live.get(&resource).map(|armed| armed.handle)
    }

    /// Whether `handle` is still the live timer for its resource.
    pub fn is_current(&self, handle: &TimerHandle) -> bool {
        self.live
            .get(&handle.resource)
            .is_some_and(|armed| armed.handle.generation == handle.generation)
    }

    /// Number of live timers across all resources.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Earliest live handle, ties broken by arming order.
    pub fn next_due(&self) -> Option<TimerHandle> {
        self.live
            .values()
            .map(|armed| armed.handle)
            .min_by_key(|handle| (handle.deadline, handle.generation))
    }

    /// Fire the timer identified by `handle`.
    ///
    /// Returns `None` when the handle has been cancelled or superseded since
    /// it was captured. On success the resource's slot is already empty.
    pub fn fire(&mut self, handle: &TimerHandle) -> Option<T> {
        if !self.is_current(handle) {
            trace!(
                resource = %handle.resource,
                generation = handle.generation,
                "Ignoring stale timer"
            );
            return None;
        }
        self.live.remove(&handle.resource).map(|armed| armed.action)
    }

    /// Fire the earliest timer whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<(TimerHandle, T)> {
        let handle = self.next_due().filter(|handle| handle.deadline <= now)?;
        self.fire(&handle).map(|action| (handle, action))
    }
}
