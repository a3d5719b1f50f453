//! Timing configuration for the coordinator.

use chrono::TimeDelta;

/// Default cart inactivity TTL (3 hours).
pub const DEFAULT_CART_TTL: TimeDelta = TimeDelta::hours(3);

/// Default interval between session validity checks.
pub const DEFAULT_POLL_INTERVAL: TimeDelta = TimeDelta::seconds(60);

/// Default lifetime of the "just added" highlight.
pub const DEFAULT_HIGHLIGHT_DELAY: TimeDelta = TimeDelta::seconds(5);

/// Default lifetime of the cart popup.
pub const DEFAULT_POPUP_DELAY: TimeDelta = TimeDelta::seconds(5);

/// Timing configuration for cart and session expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryConfig {
    /// Inactivity window after which a non-empty cart is cleared.
    pub cart_ttl: TimeDelta,

    /// Interval between session validity checks while polling.
    pub poll_interval: TimeDelta,

    /// How long the last added line stays highlighted.
    pub highlight_delay: TimeDelta,

    /// How long the cart popup stays visible after an add.
    pub popup_delay: TimeDelta,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            cart_ttl: DEFAULT_CART_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            highlight_delay: DEFAULT_HIGHLIGHT_DELAY,
            popup_delay: DEFAULT_POPUP_DELAY,
        }
    }
}

impl ExpiryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cart_ttl(mut self, ttl: TimeDelta) -> Self {
        self.cart_ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, interval: TimeDelta) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_highlight_delay(mut self, delay: TimeDelta) -> Self {
        self.highlight_delay = delay;
        self
    }

    pub fn with_popup_delay(mut self, delay: TimeDelta) -> Self {
        self.popup_delay = delay;
        self
    }
}
