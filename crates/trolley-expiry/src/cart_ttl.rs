//! Cart inactivity expiry.
//!
//! The controller keeps three things in agreement: whether the cart has
//! lines, whether a `cartTimestamp` record is persisted, and whether the
//! cart timer is armed. Every mutation resets the deadline to `now + TTL`;
//! a cold start re-derives the remaining time from the persisted record.

use chrono::TimeDelta;
use tracing::{debug, info, warn};

use crate::cart::{Cart, MutationKind};
use crate::context::{ExpiryContext, TimerAction};
use crate::error::Error;
use crate::notify::Notice;
use crate::timer::Resource;

/// Outcome of startup reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// No record was persisted; nothing to do.
    NoRecord,
    /// The TTL elapsed while the client was not running; the cart was cleared.
    Expired { elapsed: TimeDelta },
    /// The record could not be parsed; treated as expired.
    Unreadable,
    /// The cart survived and its timer was re-armed.
    Rearmed { remaining: TimeDelta },
    /// A record existed for an empty cart and was removed.
    Orphaned { timestamp: i64 },
}

/// Keeps the persisted cart timestamp and the cart timer consistent with
/// cart occupancy.
#[derive(Debug, Clone, Copy)]
pub struct CartTtlController {
    ttl: TimeDelta,
}

impl CartTtlController {
    pub fn new(ttl: TimeDelta) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// React to a cart command.
    ///
    /// A non-empty cart touched by anything but `Clear` gets a fresh
    /// timestamp and a full TTL; otherwise the record and timer go away.
    pub fn on_cart_mutated(&self, ctx: &mut ExpiryContext, cart: &Cart, kind: MutationKind) {
        if !cart.is_empty() && kind != MutationKind::Clear {
            let now = ctx.clock.now_millis();
            ctx.store.set_cart_timestamp(now);
            ctx.arm(Resource::Cart, self.ttl, TimerAction::ExpireCart);
            debug!(%kind, timestamp = now, "Cart activity recorded");
        } else {
            ctx.store.remove_cart_timestamp();
            ctx.cancel(Resource::Cart);
            debug!(%kind, "Cart idle, expiry disarmed");
        }
    }

    /// The cart timer fired: empty the cart and tell the user.
    pub fn on_expire(&self, ctx: &mut ExpiryContext, cart: &mut Cart) {
        let lines = cart.len();
        cart.clear();
        ctx.store.remove_cart_timestamp();
        ctx.cancel(Resource::Cart);
        info!(lines, "Cart cleared after inactivity");
        ctx.notify(Notice::cart_expired());
    }

    /// Re-derive timer state from the persisted record after a cold start.
    ///
    /// Precondition: `cart` already holds the contents rehydrated from the
    /// same durable store. Expiry discovered here is silent because it
    /// happened while the client was not running.
    pub fn reconcile_on_startup(
        &self,
        ctx: &mut ExpiryContext,
        cart: &mut Cart,
    ) -> Reconciliation {
        let timestamp = match ctx.store.cart_timestamp() {
            None => return Reconciliation::NoRecord,
            Some(Ok(timestamp)) => timestamp,
            Some(Err(raw)) => {
                warn!(raw = %raw, "Unreadable cart timestamp, treating cart as expired");
                cart.clear();
                ctx.store.remove_cart_timestamp();
                ctx.cancel(Resource::Cart);
                return Reconciliation::Unreadable;
            }
        };

        let elapsed = TimeDelta::milliseconds(ctx.clock.now_millis().saturating_sub(timestamp));

        if elapsed >= self.ttl {
            info!(
                elapsed_ms = elapsed.num_milliseconds(),
                lines = cart.len(),
                "Cart expired while offline"
            );
            cart.clear();
            ctx.store.remove_cart_timestamp();
            ctx.cancel(Resource::Cart);
            return Reconciliation::Expired { elapsed };
        }

        if cart.is_empty() {
            let err = Error::OrphanedTimestampRecord(timestamp);
            debug!(error = %err, "Removing record for empty cart");
            ctx.store.remove_cart_timestamp();
            return Reconciliation::Orphaned { timestamp };
        }

        // A timestamp from the future (clock moved backwards) never extends
        // the window past one full TTL.
        let remaining = (self.ttl - elapsed).min(self.ttl);
        ctx.arm(Resource::Cart, remaining, TimerAction::ExpireCart);
        debug!(
            remaining_ms = remaining.num_milliseconds(),
            lines = cart.len(),
            "Cart expiry re-armed from persisted timestamp"
        );
        Reconciliation::Rearmed { remaining }
    }
}
