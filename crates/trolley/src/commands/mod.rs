//! CLI command handlers.

pub mod cart;
pub mod session;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::TimeDelta;
use console::Style;
use tracing::{debug, warn};
use trolley_config::TrolleyConfig;
use trolley_expiry::{
    CartView, Coordinator, DurableStore, ExpiryConfig, FileStore, SystemClock, TracingNotifier,
};

/// State file used when neither `--state` nor `[storage] path` is set.
const FALLBACK_STATE_FILE: &str = "trolley-state.json";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration.
    pub config: TrolleyConfig,
    /// Durable state file.
    pub state_path: PathBuf,
}

impl Context {
    /// Discover configuration and resolve the state file.
    pub fn load(state: Option<PathBuf>, json_output: bool, verbose: bool) -> Result<Self> {
        let loaded = trolley_config::load_config(None)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }
        debug!(sources = ?loaded.loaded_from(), "Configuration loaded");

        let state_path = state
            .or_else(|| loaded.config.storage().resolve_path())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_STATE_FILE));

        Ok(Self {
            json_output,
            verbose,
            config: loaded.config,
            state_path,
        })
    }

    /// Timer settings derived from the `[cart]` and `[session]` sections.
    pub fn expiry_config(&self) -> Result<ExpiryConfig> {
        let cart = self.config.cart();
        let session = self.config.session();
        Ok(ExpiryConfig::new()
            .with_cart_ttl(TimeDelta::from_std(cart.ttl()).context("cart.ttl_secs out of range")?)
            .with_highlight_delay(
                TimeDelta::from_std(cart.highlight()).context("cart.highlight_ms out of range")?,
            )
            .with_popup_delay(
                TimeDelta::from_std(cart.popup()).context("cart.popup_ms out of range")?,
            )
            .with_poll_interval(
                TimeDelta::from_std(session.poll_interval())
                    .context("session.poll_interval_secs out of range")?,
            ))
    }

    /// Build a coordinator over the state file and run the cold-start sequence.
    pub fn coordinator(&self) -> Result<Coordinator> {
        let store = DurableStore::new(Arc::new(FileStore::new(&self.state_path)));
        let mut coordinator = Coordinator::new(
            store,
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
            self.expiry_config()?,
        );
        let startup = coordinator.startup();
        debug!(state = %self.state_path.display(), ?startup, "Coordinator ready");
        Ok(coordinator)
    }
}

/// Print a snapshot as JSON or as a short human summary.
pub fn print_view(view: &CartView, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let bold = Style::new().bold();

    println!();
    if view.items.is_empty() {
        println!("  {}", dim.apply_to("Cart is empty"));
    } else {
        for item in &view.items {
            let highlighted = view
                .last_added
                .as_ref()
                .is_some_and(|last| last.is(item.product_id, item.size_id));
            let marker = if highlighted { "*" } else { " " };
            println!(
                " {} {:>3} x {} ({}) {}",
                marker,
                item.quantity,
                bold.apply_to(&item.product_name),
                item.size,
                dim.apply_to(format!("{:.2}", item.line_total()))
            );
        }
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "  {} items, total {:.2}",
            view.item_count, view.total_price
        );
        if let Some(expires) = view.cart_expires_at {
            println!(
                "  {} {}",
                dim.apply_to("Expires:"),
                expires.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    println!("  {} {}", dim.apply_to("Session:"), session_label(view));
    if ctx.verbose {
        println!("  {} {}", dim.apply_to("State:"), ctx.state_path.display());
    }
    println!();
    Ok(())
}

fn session_label(view: &CartView) -> String {
    match &view.user_id {
        Some(id) => format!("{} as {}", view.session, id),
        None => view.session.to_string(),
    }
}
