//! The application-root object tying cart, session and timers together.
//!
//! A [`Coordinator`] is owned by exactly one task. Outer logic either calls
//! its methods directly or sends [`Command`]s to [`Coordinator::run`], which
//! interleaves commands with timer deadlines on a single logical thread.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::cart::{Cart, CartItem, MutationKind, Product};
use crate::cart_ttl::{CartTtlController, Reconciliation};
use crate::clock::Clock;
use crate::config::ExpiryConfig;
use crate::context::{ExpiryContext, TimerAction};
use crate::error::{Error, Result};
use crate::notify::{Notice, Notifier};
use crate::session::{SessionController, SessionState, TokenStatus};
use crate::store::DurableStore;
use crate::timer::{Resource, TimerHandle, TimerManager};

/// What a cold start found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Startup {
    pub cart: Reconciliation,
    pub session: TokenStatus,
}

/// Read-only snapshot of everything the UI layer shows.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u64,
    pub total_price: f64,
    pub last_added: Option<CartItem>,
    pub popup_visible: bool,
    pub session: SessionState,
    pub user_id: Option<String>,
    pub cart_expires_at: Option<DateTime<Utc>>,
}

/// Messages accepted by [`Coordinator::run`].
#[derive(Debug)]
pub enum Command {
    Add {
        product: Product,
        size_id: u64,
        quantity: u32,
        available_stock: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    Increment {
        product_id: u64,
        size_id: u64,
        reply: oneshot::Sender<Result<bool>>,
    },
    Decrement {
        product_id: u64,
        size_id: u64,
    },
    Remove {
        product_id: u64,
        size_id: u64,
    },
    Replace(Vec<CartItem>),
    Clear,
    Login {
        token: String,
        reply: oneshot::Sender<Result<SessionState>>,
    },
    Logout,
    StartPolling,
    Snapshot(oneshot::Sender<CartView>),
}

/// Owns the cart, the session and every timer of one client instance.
#[derive(Debug)]
pub struct Coordinator {
    ctx: ExpiryContext,
    cart: Cart,
    cart_ttl: CartTtlController,
    session: SessionController,
    last_added: Option<CartItem>,
    popup_visible: bool,
}

impl Coordinator {
    pub fn new(
        store: DurableStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: ExpiryConfig,
    ) -> Self {
        Self {
            ctx: ExpiryContext::new(store, clock, notifier, config),
            cart: Cart::new(),
            cart_ttl: CartTtlController::new(config.cart_ttl),
            session: SessionController::new(),
            last_added: None,
            popup_visible: false,
        }
    }

    /// Cold-start sequence.
    ///
    /// Cart contents are rehydrated first, bypassing TTL observation, because
    /// reconciliation needs the persisted timestamp untouched and the real
    /// cart contents in hand. Only then is the timestamp reconciled and the
    /// session restored.
    pub fn startup(&mut self) -> Startup {
        self.cart = Cart::from_items(self.ctx.store.cart_items());

        let cart = self
            .cart_ttl
            .reconcile_on_startup(&mut self.ctx, &mut self.cart);
        match cart {
            Reconciliation::Expired { .. } | Reconciliation::Unreadable => {
                self.ctx.store.set_cart_items(self.cart.items());
            }
            Reconciliation::NoRecord if !self.cart.is_empty() => {
                warn!(
                    lines = self.cart.len(),
                    "Cart contents persisted without a timestamp, starting a fresh window"
                );
                self.observe(MutationKind::Replace);
            }
            _ => {}
        }

        let session = self.session.restore(&mut self.ctx);
        info!(?cart, ?session, lines = self.cart.len(), "Startup reconciled");
        Startup { cart, session }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cart commands
    // ─────────────────────────────────────────────────────────────────────

    /// Add units of a product variant, bounded by the stock on hand.
    pub fn add(
        &mut self,
        product: &Product,
        size_id: u64,
        quantity: u32,
        available_stock: u32,
    ) -> Result<()> {
        let result = self
            .cart
            .add(product, size_id, quantity, available_stock)
            .cloned();

        let outcome = match result {
            Ok(item) => {
                self.last_added = Some(item);
                self.popup_visible = true;
                let config = self.ctx.config;
                self.ctx.arm(
                    Resource::Highlight,
                    config.highlight_delay,
                    TimerAction::ClearHighlight,
                );
                self.ctx.arm(
                    Resource::CartPopup,
                    config.popup_delay,
                    TimerAction::HideCartPopup,
                );
                Ok(())
            }
            Err(e) => Err(self.report(e)),
        };

        self.observe(MutationKind::Add);
        outcome
    }

    /// Add one unit to an existing line.
    pub fn increment(&mut self, product_id: u64, size_id: u64) -> Result<bool> {
        let outcome = self
            .cart
            .increment(product_id, size_id)
            .map_err(|e| self.report(e));
        self.observe(MutationKind::Increment);
        outcome
    }

    /// Remove one unit from a line, never dropping below one.
    pub fn decrement(&mut self, product_id: u64, size_id: u64) -> bool {
        let changed = self.cart.decrement(product_id, size_id);
        self.observe(MutationKind::Decrement);
        changed
    }

    pub fn remove(&mut self, product_id: u64, size_id: u64) -> bool {
        let changed = self.cart.remove(product_id, size_id);
        self.observe(MutationKind::Remove);
        changed
    }

    pub fn replace(&mut self, items: Vec<CartItem>) {
        self.cart.replace(items);
        self.observe(MutationKind::Replace);
    }

    /// Empty the cart. The only cart command that never arms a timer.
    pub fn clear(&mut self) {
        self.cart.clear();
        self.observe(MutationKind::Clear);
    }

    pub fn show_cart_popup(&mut self) {
        self.popup_visible = true;
    }

    pub fn hide_cart_popup(&mut self) {
        self.popup_visible = false;
        self.ctx.cancel(Resource::CartPopup);
    }

    pub fn clear_last_added(&mut self) {
        self.last_added = None;
        self.ctx.cancel(Resource::Highlight);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session commands
    // ─────────────────────────────────────────────────────────────────────

    pub fn login(&mut self, token: &str) -> Result<SessionState> {
        self.session.login(&mut self.ctx, token)
    }

    pub fn logout(&mut self) {
        self.session.logout(&mut self.ctx);
        info!("Logged out");
    }

    pub fn start_polling(&mut self) -> TokenStatus {
        self.session.start_polling(&mut self.ctx)
    }

    pub fn stop_polling(&mut self) {
        self.session.stop_polling(&mut self.ctx);
    }

    pub fn check_validity(&mut self) -> TokenStatus {
        self.session.check_validity(&mut self.ctx)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    pub fn total_price(&self) -> f64 {
        self.cart.total_price()
    }

    pub fn last_added(&self) -> Option<&CartItem> {
        self.last_added.as_ref()
    }

    pub fn popup_visible(&self) -> bool {
        self.popup_visible
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    pub fn timers(&self) -> &TimerManager<TimerAction> {
        &self.ctx.timers
    }

    pub fn store(&self) -> &DurableStore {
        &self.ctx.store
    }

    pub fn view(&self) -> CartView {
        CartView {
            items: self.cart.items().to_vec(),
            item_count: self.cart.item_count(),
            total_price: self.cart.total_price(),
            last_added: self.last_added.clone(),
            popup_visible: self.popup_visible,
            session: self.session.state(),
            user_id: self.session.user_id().map(str::to_string),
            cart_expires_at: self.ctx.timers.handle(Resource::Cart).map(|h| h.deadline),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Timers
    // ─────────────────────────────────────────────────────────────────────

    /// Fire `handle` if it is still live and due. Returns whether it ran.
    pub fn fire(&mut self, handle: &TimerHandle) -> bool {
        if handle.deadline > self.ctx.now() {
            return false;
        }
        match self.ctx.timers.fire(handle) {
            Some(action) => {
                self.dispatch(action);
                true
            }
            None => false,
        }
    }

    /// Fire every timer due at the current clock time, earliest first.
    pub fn fire_due(&mut self) -> usize {
        let now = self.ctx.now();
        let mut fired = 0;
        while let Some((_, action)) = self.ctx.timers.take_due(now) {
            self.dispatch(action);
            fired += 1;
        }
        fired
    }

    /// Serve commands and timers until every command sender is dropped.
    ///
    /// Returns the coordinator so callers can inspect the final state.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Self {
        loop {
            let next = self.ctx.timers.next_due();
            let wait = next
                .and_then(|handle| (handle.deadline - self.ctx.now()).to_std().ok())
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = tokio::time::sleep(wait), if next.is_some() => {
                    if let Some(handle) = next {
                        self.fire(&handle);
                    }
                }
            }
        }
        debug!(live_timers = self.ctx.timers.live_count(), "Coordinator stopped");
        self
    }

    fn handle(&mut self, command: Command) {
        trace!(?command, "Handling command");
        match command {
            Command::Add {
                product,
                size_id,
                quantity,
                available_stock,
                reply,
            } => {
                let _ = reply.send(self.add(&product, size_id, quantity, available_stock));
            }
            Command::Increment {
                product_id,
                size_id,
                reply,
            } => {
                let _ = reply.send(self.increment(product_id, size_id));
            }
            Command::Decrement {
                product_id,
                size_id,
            } => {
                self.decrement(product_id, size_id);
            }
            Command::Remove {
                product_id,
                size_id,
            } => {
                self.remove(product_id, size_id);
            }
            Command::Replace(items) => self.replace(items),
            Command::Clear => self.clear(),
            Command::Login { token, reply } => {
                let _ = reply.send(self.login(&token));
            }
            Command::Logout => self.logout(),
            Command::StartPolling => {
                self.start_polling();
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.view());
            }
        }
    }

    fn dispatch(&mut self, action: TimerAction) {
        trace!(?action, "Timer fired");
        match action {
            TimerAction::ExpireCart => {
                self.cart_ttl.on_expire(&mut self.ctx, &mut self.cart);
                self.ctx.store.set_cart_items(self.cart.items());
            }
            TimerAction::PollSession => {
                self.session.on_poll(&mut self.ctx);
            }
            TimerAction::ClearHighlight => self.last_added = None,
            TimerAction::HideCartPopup => self.popup_visible = false,
        }
    }

    /// Let the TTL controller see a cart command and persist the contents.
    fn observe(&mut self, kind: MutationKind) {
        self.cart_ttl.on_cart_mutated(&mut self.ctx, &self.cart, kind);
        self.ctx.store.set_cart_items(self.cart.items());
    }

    fn report(&self, error: Error) -> Error {
        match &error {
            Error::StockExceeded {
                product_name,
                size_id,
                available,
            } => {
                self.ctx
                    .notify(Notice::stock_exceeded(product_name, *size_id, *available));
            }
            other => warn!(error = %other, "Cart command rejected"),
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::TimeDelta;

    use super::*;
    use crate::cart::Variant;
    use crate::clock::{ManualClock, MonotonicClock};
    use crate::notify::{NoticeKind, RecordingNotifier};
    use crate::store::{CART_ITEMS_KEY, CART_TIMESTAMP_KEY, KeyValueStore, MemoryStore, TOKEN_KEY};

    const T0: i64 = 1_700_000_000_000;

    fn jacket() -> Product {
        Product {
            product_id: 11,
            product_name: "Rain jacket".to_string(),
            image_url_primary: None,
            variants: vec![Variant {
                size_id: 3,
                size: "L".to_string(),
                price: 1_200.0,
            }],
        }
    }

    struct Client {
        coordinator: Coordinator,
        backend: MemoryStore,
        clock: ManualClock,
        notices: RecordingNotifier,
    }

    fn client_on(backend: MemoryStore, clock: ManualClock) -> Client {
        let notices = RecordingNotifier::new();
        let mut coordinator = Coordinator::new(
            DurableStore::new(Arc::new(backend.clone())),
            Arc::new(clock.clone()),
            Arc::new(notices.clone()),
            ExpiryConfig::default(),
        );
        coordinator.startup();
        Client {
            coordinator,
            backend,
            clock,
            notices,
        }
    }

    fn fresh_client() -> Client {
        client_on(MemoryStore::new(), ManualClock::at_millis(T0))
    }

    /// Simulates a page reload: same durable store, new process state.
    fn restart(client: &Client) -> Client {
        client_on(client.backend.clone(), client.clock.clone())
    }

    fn assert_cart_invariant(client: &Client) {
        let non_empty = !client.coordinator.cart().is_empty();
        assert_eq!(client.backend.contains(CART_TIMESTAMP_KEY), non_empty);
        assert_eq!(
            client.coordinator.timers().is_armed(Resource::Cart),
            non_empty
        );
    }

    #[test]
    fn test_invariant_holds_across_mutations() {
        let mut c = fresh_client();
        assert_cart_invariant(&c);

        c.coordinator.add(&jacket(), 3, 1, 4).unwrap();
        assert_cart_invariant(&c);
        c.coordinator.increment(11, 3).unwrap();
        assert_cart_invariant(&c);
        c.coordinator.decrement(11, 3);
        assert_cart_invariant(&c);
        c.coordinator.remove(11, 3);
        assert_cart_invariant(&c);
        c.coordinator.replace(vec![]);
        assert_cart_invariant(&c);
        c.coordinator.add(&jacket(), 3, 2, 4).unwrap();
        c.coordinator.clear();
        assert_cart_invariant(&c);
    }

    #[test]
    fn test_second_add_over_stock_is_fully_rejected() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 3, 5).unwrap();

        let err = c.coordinator.add(&jacket(), 3, 3, 5).unwrap_err();

        assert!(matches!(err, Error::StockExceeded { available: 5, .. }));
        assert_eq!(c.coordinator.cart().find(11, 3).unwrap().quantity, 3);
        assert_eq!(c.notices.kinds(), vec![NoticeKind::StockExceeded]);
    }

    #[test]
    fn test_add_sets_highlight_and_popup_that_self_clear() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 1, 5).unwrap();

        assert!(c.coordinator.popup_visible());
        assert_eq!(c.coordinator.last_added().unwrap().product_id, 11);

        c.clock.advance(TimeDelta::seconds(5));
        assert_eq!(c.coordinator.fire_due(), 2);

        assert!(!c.coordinator.popup_visible());
        assert!(c.coordinator.last_added().is_none());
        assert!(c.coordinator.timers().is_armed(Resource::Cart));
        assert_eq!(c.coordinator.cart().len(), 1);
    }

    #[test]
    fn test_expiry_clears_cart_and_notifies() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 1, 5).unwrap();

        c.clock.advance(TimeDelta::hours(3));
        c.coordinator.fire_due();

        assert!(c.coordinator.cart().is_empty());
        assert!(!c.backend.contains(CART_ITEMS_KEY));
        assert_cart_invariant(&c);
        assert_eq!(c.notices.kinds(), vec![NoticeKind::CartExpired]);
    }

    #[test]
    fn test_restart_just_before_expiry_rearms_remaining_time() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 2, 5).unwrap();

        c.clock
            .advance(TimeDelta::hours(3) - TimeDelta::milliseconds(1));
        let mut reloaded = restart(&c);

        assert_eq!(reloaded.coordinator.cart().find(11, 3).unwrap().quantity, 2);
        let handle = reloaded.coordinator.timers().handle(Resource::Cart).unwrap();
        assert_eq!(
            handle.deadline - reloaded.clock.now(),
            TimeDelta::milliseconds(1)
        );

        reloaded.clock.advance(TimeDelta::milliseconds(1));
        assert!(reloaded.coordinator.fire(&handle));
        assert!(reloaded.coordinator.cart().is_empty());
    }

    #[test]
    fn test_restart_at_expiry_is_silent() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 2, 5).unwrap();
        c.notices.take();

        c.clock.advance(TimeDelta::hours(3));
        let reloaded = restart(&c);

        assert!(reloaded.coordinator.cart().is_empty());
        assert!(!reloaded.backend.contains(CART_ITEMS_KEY));
        assert_cart_invariant(&reloaded);
        assert!(reloaded.notices.notices().is_empty());
    }

    #[test]
    fn test_clear_then_restart_finds_nothing() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 1, 5).unwrap();
        c.coordinator.clear();

        assert!(!c.coordinator.timers().is_armed(Resource::Cart));
        assert!(!c.backend.contains(CART_TIMESTAMP_KEY));

        let reloaded = restart(&c);
        assert!(reloaded.coordinator.cart().is_empty());
        assert!(!reloaded.coordinator.timers().is_armed(Resource::Cart));
    }

    #[test]
    fn test_stale_handle_is_ignored_after_rearm() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 1, 5).unwrap();
        let stale = c.coordinator.timers().handle(Resource::Cart).unwrap();

        c.clock.advance(TimeDelta::hours(1));
        c.coordinator.increment(11, 3).unwrap();

        c.clock.advance(TimeDelta::hours(2));
        assert!(!c.coordinator.fire(&stale));
        assert_eq!(c.coordinator.cart().find(11, 3).unwrap().quantity, 2);
    }

    #[test]
    fn test_contents_without_timestamp_start_fresh_window() {
        let backend = MemoryStore::new();
        let item = CartItem {
            product_id: 11,
            size_id: 3,
            product_name: "Rain jacket".to_string(),
            price: 1_200.0,
            size: "L".to_string(),
            quantity: 1,
            image_url: None,
            stock_limit: None,
        };
        backend
            .set(CART_ITEMS_KEY, &serde_json::to_string(&vec![item]).unwrap())
            .unwrap();

        let c = client_on(backend, ManualClock::at_millis(T0 + 1_000));
        assert_eq!(c.coordinator.cart().len(), 1);
        assert_cart_invariant(&c);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_expires_cart_on_schedule() {
        let anchor = DateTime::from_timestamp_millis(T0).unwrap();
        let notices = RecordingNotifier::new();
        let config = ExpiryConfig::default().with_cart_ttl(TimeDelta::minutes(10));
        let mut coordinator = Coordinator::new(
            DurableStore::in_memory(),
            Arc::new(MonotonicClock::anchored_at(anchor)),
            Arc::new(notices.clone()),
            config,
        );
        coordinator.startup();

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(coordinator.run(rx));

        let (reply, added) = oneshot::channel();
        tx.send(Command::Add {
            product: jacket(),
            size_id: 3,
            quantity: 1,
            available_stock: 2,
            reply,
        })
        .await
        .unwrap();
        added.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(9 * 60)).await;
        let (reply, view) = oneshot::channel();
        tx.send(Command::Snapshot(reply)).await.unwrap();
        let view = view.await.unwrap();
        assert_eq!(view.item_count, 1);
        assert!(!view.popup_visible);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        drop(tx);
        let coordinator = task.await.unwrap();

        assert!(coordinator.cart().is_empty());
        assert_eq!(notices.kinds(), vec![NoticeKind::CartExpired]);
    }

    #[test]
    fn test_popup_and_highlight_can_be_dismissed_early() {
        let mut c = fresh_client();
        c.coordinator.add(&jacket(), 3, 1, 5).unwrap();

        c.coordinator.hide_cart_popup();
        c.coordinator.clear_last_added();

        assert!(!c.coordinator.popup_visible());
        assert!(c.coordinator.last_added().is_none());
        assert!(!c.coordinator.timers().is_armed(Resource::CartPopup));
        assert!(!c.coordinator.timers().is_armed(Resource::Highlight));
        assert!(c.coordinator.timers().is_armed(Resource::Cart));

        c.coordinator.show_cart_popup();
        c.clock.advance(TimeDelta::seconds(5));
        assert_eq!(c.coordinator.fire_due(), 0);
        assert!(c.coordinator.popup_visible());
    }

    fn driven(backend: &MemoryStore, notices: &RecordingNotifier) -> Coordinator {
        let anchor = DateTime::from_timestamp_millis(T0).unwrap();
        let mut coordinator = Coordinator::new(
            DurableStore::new(Arc::new(backend.clone())),
            Arc::new(MonotonicClock::anchored_at(anchor)),
            Arc::new(notices.clone()),
            ExpiryConfig::default().with_cart_ttl(TimeDelta::minutes(10)),
        );
        coordinator.startup();
        coordinator
    }

    async fn snapshot(tx: &mpsc::Sender<Command>) -> CartView {
        let (reply, view) = oneshot::channel();
        tx.send(Command::Snapshot(reply)).await.unwrap();
        view.await.unwrap()
    }

    fn line(product_id: u64, size_id: u64, quantity: u32) -> CartItem {
        CartItem {
            product_id,
            size_id,
            product_name: format!("Product {}", product_id),
            price: 100.0,
            size: "M".to_string(),
            quantity,
            image_url: None,
            stock_limit: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_applies_cart_commands_in_order() {
        let backend = MemoryStore::new();
        let notices = RecordingNotifier::new();
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(driven(&backend, &notices).run(rx));

        let (reply, added) = oneshot::channel();
        tx.send(Command::Add {
            product: jacket(),
            size_id: 3,
            quantity: 1,
            available_stock: 3,
            reply,
        })
        .await
        .unwrap();
        added.await.unwrap().unwrap();

        let (reply, incremented) = oneshot::channel();
        tx.send(Command::Increment {
            product_id: 11,
            size_id: 3,
            reply,
        })
        .await
        .unwrap();
        assert!(incremented.await.unwrap().unwrap());

        tx.send(Command::Decrement {
            product_id: 11,
            size_id: 3,
        })
        .await
        .unwrap();
        tx.send(Command::Replace(vec![line(11, 3, 2), line(12, 1, 1)]))
            .await
            .unwrap();
        tx.send(Command::Remove {
            product_id: 12,
            size_id: 1,
        })
        .await
        .unwrap();

        let view = snapshot(&tx).await;
        assert_eq!(view.item_count, 2);
        assert!(view.cart_expires_at.is_some());
        assert!(backend.contains(CART_TIMESTAMP_KEY));

        tx.send(Command::Clear).await.unwrap();
        let view = snapshot(&tx).await;
        assert_eq!(view.item_count, 0);
        assert!(view.cart_expires_at.is_none());
        assert!(!backend.contains(CART_TIMESTAMP_KEY));
        assert!(!backend.contains(CART_ITEMS_KEY));

        tokio::time::sleep(Duration::from_secs(15 * 60)).await;
        drop(tx);
        let coordinator = task.await.unwrap();

        assert!(!coordinator.timers().is_armed(Resource::Cart));
        assert!(notices.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_polls_session_until_expiry() {
        let backend = MemoryStore::new();
        let notices = RecordingNotifier::new();
        let exp = T0 / 1000 + 90;
        let token = format!(
            "h.{}.s",
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"role":"user"}}"#, exp))
        );

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(driven(&backend, &notices).run(rx));

        let (reply, logged_in) = oneshot::channel();
        tx.send(Command::Login { token, reply }).await.unwrap();
        assert_eq!(
            logged_in.await.unwrap().unwrap(),
            SessionState::LoggedInUser
        );

        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(snapshot(&tx).await.session, SessionState::LoggedInUser);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(snapshot(&tx).await.session, SessionState::LoggedOut);
        assert_eq!(notices.kinds(), vec![NoticeKind::SessionExpired]);
        assert!(!backend.contains(TOKEN_KEY));

        tx.send(Command::StartPolling).await.unwrap();
        drop(tx);
        let coordinator = task.await.unwrap();
        assert!(coordinator.timers().is_armed(Resource::SessionPoll));

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(coordinator.run(rx));
        tx.send(Command::Logout).await.unwrap();
        drop(tx);
        let coordinator = task.await.unwrap();
        assert!(!coordinator.timers().is_armed(Resource::SessionPoll));
    }
}
