//! Expiring client state for a shopping cart and a login session.
//!
//! This crate keeps time-based state consistent across restarts:
//! - Cart inactivity TTL with a persisted last-activity timestamp
//! - Recurring session token validity checks
//! - One live timer per resource, with stale fires ignored
//! - Cold-start reconciliation against the durable store
//!
//! # Example
//!
//! ```rust,ignore
//! use trolley_expiry::{Coordinator, DurableStore, ExpiryConfig, SystemClock, TracingNotifier};
//!
//! let mut coordinator = Coordinator::new(
//!     DurableStore::in_memory(),
//!     Arc::new(SystemClock),
//!     Arc::new(TracingNotifier),
//!     ExpiryConfig::default(),
//! );
//! coordinator.startup();
//! ```

mod cart;
mod cart_ttl;
mod clock;
mod config;
mod context;
mod coordinator;
mod error;
mod notify;
mod session;
mod store;
mod timer;

pub use cart::{Cart, CartItem, MutationKind, Product, Variant};
pub use cart_ttl::{CartTtlController, Reconciliation};
pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::{
    DEFAULT_CART_TTL, DEFAULT_HIGHLIGHT_DELAY, DEFAULT_POLL_INTERVAL, DEFAULT_POPUP_DELAY,
    ExpiryConfig,
};
pub use context::{ExpiryContext, TimerAction};
pub use coordinator::{CartView, Command, Coordinator, Startup};
pub use error::{Error, Result};
pub use notify::{Notice, NoticeKind, Notifier, RecordingNotifier, TracingNotifier};
pub use session::{Claims, Role, SessionController, SessionState, TokenStatus, UserId, decode};
pub use store::{
    CART_ITEMS_KEY, CART_TIMESTAMP_KEY, DurableStore, FileStore, KeyValueStore, MemoryStore,
    TOKEN_KEY,
};
pub use timer::{Resource, TimerHandle, TimerManager};
