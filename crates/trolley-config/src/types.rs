//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [cart]        # inactivity TTL and UI timer lifetimes
//! [session]     # token validity polling
//! [storage]     # where durable state lives
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrolleyConfig {
    /// Cart timing (`[cart]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartConfig>,

    /// Session polling (`[session]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    /// Durable state location (`[storage]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
}

impl TrolleyConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: TrolleyConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole; unset sections keep the current value.
    pub fn merge(&mut self, other: TrolleyConfig) {
        if other.cart.is_some() {
            self.cart = other.cart;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
    }

    /// Reject values that would make the timers meaningless.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref cart) = self.cart
            && cart.ttl_secs == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "cart.ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(ref session) = self.session
            && session.poll_interval_secs == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "session.poll_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The `[cart]` section, or its defaults.
    pub fn cart(&self) -> CartConfig {
        self.cart.clone().unwrap_or_default()
    }

    /// The `[session]` section, or its defaults.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// The `[storage]` section, or its defaults.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cart
// ─────────────────────────────────────────────────────────────────────────────

/// Cart timing.
///
/// ```toml
/// [cart]
/// ttl_secs = 10800
/// highlight_ms = 5000
/// popup_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Inactivity window after which a non-empty cart is emptied.
    pub ttl_secs: u64,
    /// How long the last added line stays highlighted.
    pub highlight_ms: u64,
    /// How long the cart popup stays open after an add.
    pub popup_ms: u64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3 * 60 * 60,
            highlight_ms: 5_000,
            popup_ms: 5_000,
        }
    }
}

impl CartConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn popup(&self) -> Duration {
        Duration::from_millis(self.popup_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Session polling.
///
/// ```toml
/// [session]
/// poll_interval_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between token validity checks.
    pub poll_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Location of the durable state file.
///
/// ```toml
/// [storage]
/// path = "/var/lib/trolley/state.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit state file. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured path, else `<data dir>/trolley/state.json`.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("trolley").join("state.json")))
    }
}
