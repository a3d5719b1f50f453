//! CLI integration tests for the trolley command-line interface.
//!
//! Every test runs against a throwaway state file and config directory, so
//! each invocation is an independent cold start over the same durable state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use assert_cmd::Command;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn state(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    /// A trolley command isolated from the user's config and state.
    fn trolley(&self) -> Command {
        let mut cmd = Command::cargo_bin("trolley").unwrap();
        cmd.current_dir(self.dir.path())
            .env("TROLLEY_CONFIG_DIR", self.dir.path().join("config"))
            .env_remove("TROLLEY_STATE")
            .env_remove("TROLLEY_TOKEN")
            .arg("--state")
            .arg(self.state());
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.trolley().arg("--json").args(args).output().unwrap();
        assert!(output.status.success(), "{:?} failed: {:?}", args, output);
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn write_state(&self, entries: &[(&str, String)]) {
        let map: serde_json::Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        fs::write(self.state(), serde_json::to_string_pretty(&map).unwrap()).unwrap();
    }

    fn read_state(&self) -> serde_json::Map<String, Value> {
        read_json(&self.state())
    }
}

fn read_json(path: &Path) -> serde_json::Map<String, Value> {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

fn token_with(claims: &str) -> String {
    format!("header.{}.signature", URL_SAFE_NO_PAD.encode(claims))
}

fn cart_line() -> String {
    r#"[{"product_id":7,"size_id":2,"product_name":"Scarf","price":250.0,"size":"M","quantity":2}]"#
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("trolley")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cart"))
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_version_displays() {
    Command::cargo_bin("trolley")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trolley"));
}

#[test]
fn test_cart_help_lists_operations() {
    Command::cargo_bin("trolley")
        .unwrap()
        .args(["cart", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("inc"))
        .stdout(predicate::str::contains("dec"))
        .stdout(predicate::str::contains("clear"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Cart Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_add_persists_items_and_timestamp() {
    let sandbox = Sandbox::new();

    let view = sandbox.json(&[
        "cart", "add", "--product-id", "7", "--size-id", "2", "--name", "Scarf", "--price",
        "250", "--quantity", "2", "--stock", "5",
    ]);
    assert_eq!(view["item_count"], 2);
    assert_eq!(view["popup_visible"], true);
    assert!(view["cart_expires_at"].is_string());

    let state = sandbox.read_state();
    assert!(state.contains_key("cartTimestamp"));
    assert!(state.contains_key("cartItems"));

    let view = sandbox.json(&["cart", "show"]);
    assert_eq!(view["item_count"], 2);
    assert_eq!(view["total_price"], 500.0);
}

#[test]
fn test_add_over_stock_is_rejected() {
    let sandbox = Sandbox::new();
    let add = [
        "cart", "add", "--product-id", "7", "--size-id", "2", "--name", "Scarf", "--price",
        "250", "--quantity", "3", "--stock", "4",
    ];

    sandbox.trolley().args(add).assert().success();
    sandbox
        .trolley()
        .args(add)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only 4 units"));

    let view = sandbox.json(&["cart", "show"]);
    assert_eq!(view["item_count"], 3);
}

#[test]
fn test_decrement_floors_at_one() {
    let sandbox = Sandbox::new();
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", now_millis().to_string()),
    ]);

    sandbox.json(&["cart", "dec", "7", "2"]);
    let view = sandbox.json(&["cart", "dec", "7", "2"]);

    assert_eq!(view["item_count"], 1);
}

#[test]
fn test_clear_removes_timestamp() {
    let sandbox = Sandbox::new();
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", now_millis().to_string()),
    ]);

    let view = sandbox.json(&["cart", "clear"]);

    assert_eq!(view["item_count"], 0);
    assert!(view["cart_expires_at"].is_null());
    let state = sandbox.read_state();
    assert!(!state.contains_key("cartTimestamp"));
    assert!(!state.contains_key("cartItems"));
}

#[test]
fn test_stale_cart_is_emptied_on_startup() {
    let sandbox = Sandbox::new();
    let four_hours_ago = now_millis() - 4 * 60 * 60 * 1000;
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", four_hours_ago.to_string()),
    ]);

    let view = sandbox.json(&["cart", "show"]);

    assert_eq!(view["item_count"], 0);
    assert!(!sandbox.read_state().contains_key("cartTimestamp"));
}

#[test]
fn test_recent_cart_survives_startup() {
    let sandbox = Sandbox::new();
    let an_hour_ago = now_millis() - 60 * 60 * 1000;
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", an_hour_ago.to_string()),
    ]);

    let view = sandbox.json(&["cart", "show"]);

    assert_eq!(view["item_count"], 2);
    assert_eq!(
        sandbox.read_state()["cartTimestamp"],
        Value::String(an_hour_ago.to_string())
    );
}

#[test]
fn test_configured_ttl_applies() {
    let sandbox = Sandbox::new();
    fs::write(
        sandbox.dir.path().join("trolley.toml"),
        "[cart]\nttl_secs = 60\n",
    )
    .unwrap();
    let two_minutes_ago = now_millis() - 2 * 60 * 1000;
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", two_minutes_ago.to_string()),
    ]);

    let view = sandbox.json(&["cart", "show"]);

    assert_eq!(view["item_count"], 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_login_and_logout() {
    let sandbox = Sandbox::new();
    let token = token_with(r#"{"exp":4102444800,"role":"admin","userid":42}"#);

    let status = sandbox.json(&["session", "login", "--token", &token]);
    assert_eq!(status["session"], "logged_in_admin");
    assert_eq!(status["user_id"], "42");
    assert!(sandbox.read_state().contains_key("token"));

    let status = sandbox.json(&["session", "status"]);
    assert_eq!(status["logged_in"], true);

    let status = sandbox.json(&["session", "logout"]);
    assert_eq!(status["session"], "logged_out");
    assert!(!sandbox.read_state().contains_key("token"));
}

#[test]
fn test_malformed_token_is_rejected() {
    let sandbox = Sandbox::new();

    sandbox
        .trolley()
        .args(["session", "login", "--token", "not-a-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed session token"));
}

#[test]
fn test_expired_token_logs_out_on_startup() {
    let sandbox = Sandbox::new();
    sandbox.write_state(&[("token", token_with(r#"{"exp":1000,"role":"user"}"#))]);

    let status = sandbox.json(&["session", "status"]);

    assert_eq!(status["session"], "logged_out");
    assert!(!sandbox.read_state().contains_key("token"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_watch_fires_cart_expiry_live() {
    let sandbox = Sandbox::new();
    fs::write(
        sandbox.dir.path().join("trolley.toml"),
        "[cart]\nttl_secs = 1\n",
    )
    .unwrap();
    sandbox.write_state(&[
        ("cartItems", cart_line()),
        ("cartTimestamp", (now_millis() - 200).to_string()),
    ]);

    let view = sandbox.json(&["watch", "--for", "2"]);

    assert_eq!(view["item_count"], 0);
    assert!(!sandbox.read_state().contains_key("cartItems"));
}
