//! Session validity tracking.
//!
//! The session token is issued elsewhere and persisted under the `token`
//! key. This module only decodes its claims (the base64 JSON second segment)
//! and re-checks them on a fixed poll, because external login and logout
//! flows may rewrite or remove the token at any time.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{ExpiryContext, TimerAction};
use crate::error::{Error, Result};
use crate::notify::Notice;
use crate::timer::Resource;

/// Polls never run closer together than this.
const MIN_POLL_INTERVAL: TimeDelta = TimeDelta::seconds(1);

/// Role claimed by a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// Login state derived from the persisted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedInUser,
    LoggedInAdmin,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        !matches!(self, SessionState::LoggedOut)
    }
}

impl From<Role> for SessionState {
    fn from(role: Role) -> Self {
        match role {
            Role::User => SessionState::LoggedInUser,
            Role::Admin => SessionState::LoggedInAdmin,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::LoggedOut => write!(f, "logged out"),
            SessionState::LoggedInUser => write!(f, "logged in"),
            SessionState::LoggedInAdmin => write!(f, "logged in (admin)"),
        }
    }
}

/// User identifier claim; issuers emit either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Decoded token claims.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry in seconds since the UNIX epoch, possibly fractional.
    /// Absent means no expiry.
    #[serde(default)]
    pub exp: Option<f64>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default, alias = "userId", alias = "user_id")]
    pub userid: Option<UserId>,
}

impl Claims {
    /// Anything other than `"admin"` is a regular user.
    pub fn role(&self) -> Role {
        match self.role.as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    /// Whether `exp` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        self.exp.is_some_and(|exp| exp < now_secs)
    }

    /// `exp` truncated to whole seconds, for reporting.
    pub fn exp_secs(&self) -> Option<i64> {
        self.exp.map(|exp| exp.floor() as i64)
    }
}

/// Decode the claims segment of a dot-separated token.
pub fn decode(token: &str) -> Result<Claims> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedToken("missing claims segment".to_string()))?;

    let trimmed = segment.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| Error::MalformedToken(format!("claims are not base64: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("claims are not valid JSON: {}", e)))
}

/// Result of one validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token is persisted.
    Absent,
    /// The token decoded and has not expired.
    Valid(Role),
    /// The token could not be decoded; it was removed.
    Malformed,
    /// The token's `exp` has passed; it was removed.
    Expired,
}

impl TokenStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenStatus::Valid(_))
    }
}

/// Tracks login state and drives the recurring validity poll.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    user_id: Option<String>,
    polling: bool,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            state: SessionState::LoggedOut,
            user_id: None,
            polling: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Re-read the persisted token and update the login state.
    pub fn check_validity(&mut self, ctx: &mut ExpiryContext) -> TokenStatus {
        let Some(token) = ctx.store.token() else {
            self.state = SessionState::LoggedOut;
            self.user_id = None;
            return TokenStatus::Absent;
        };

        let claims = match decode(&token) {
            Ok(claims) => claims,
            Err(e) => {
                // Polling stays armed so a token written later is picked up.
                warn!(error = %e, "Discarding undecodable session token");
                self.discard_token(ctx);
                return TokenStatus::Malformed;
            }
        };

        let now = ctx.clock.now();
        if claims.is_expired_at(now) {
            let err = Error::ExpiredToken {
                exp: claims.exp_secs().unwrap_or_default(),
            };
            info!(error = %err, now = now.timestamp(), "Forcing logout");
            self.force_logout(ctx);
            ctx.notify(Notice::session_expired());
            return TokenStatus::Expired;
        }

        let role = claims.role();
        self.state = role.into();
        self.user_id = claims.userid.map(|id| id.to_string());
        TokenStatus::Valid(role)
    }

    /// Check now, then keep checking every poll interval.
    pub fn start_polling(&mut self, ctx: &mut ExpiryContext) -> TokenStatus {
        self.polling = true;
        self.poll(ctx)
    }

    /// Cancel the recurring check.
    pub fn stop_polling(&mut self, ctx: &mut ExpiryContext) {
        if self.polling {
            debug!("Session polling stopped");
        }
        self.polling = false;
        ctx.cancel(Resource::SessionPoll);
    }

    /// The poll timer fired.
    pub fn on_poll(&mut self, ctx: &mut ExpiryContext) -> TokenStatus {
        if !self.polling {
            return TokenStatus::Absent;
        }
        self.poll(ctx)
    }

    /// Restore the session from a persisted token after a cold start.
    ///
    /// A decodable token selects the role and starts polling, whose first
    /// check catches a token that expired while the client was not running.
    pub fn restore(&mut self, ctx: &mut ExpiryContext) -> TokenStatus {
        let Some(token) = ctx.store.token() else {
            self.logout(ctx);
            return TokenStatus::Absent;
        };

        match decode(&token) {
            Ok(claims) => {
                self.state = claims.role().into();
                self.user_id = claims.userid.map(|id| id.to_string());
                self.start_polling(ctx)
            }
            Err(e) => {
                warn!(error = %e, "Invalid persisted session token");
                self.force_logout(ctx);
                TokenStatus::Malformed
            }
        }
    }

    /// Accept a freshly issued token.
    ///
    /// Tokens that do not decode or are already expired are rejected and
    /// nothing is persisted.
    pub fn login(&mut self, ctx: &mut ExpiryContext, token: &str) -> Result<SessionState> {
        let claims = decode(token)?;
        if let Some(exp) = claims.exp_secs()
            && claims.is_expired_at(ctx.clock.now())
        {
            return Err(Error::ExpiredToken { exp });
        }

        ctx.store.set_token(token);
        self.restore(ctx);
        info!(state = %self.state, user_id = ?self.user_id, "Logged in");
        Ok(self.state)
    }

    /// Explicit logout.
    pub fn logout(&mut self, ctx: &mut ExpiryContext) {
        self.stop_polling(ctx);
        ctx.store.remove_token();
        self.state = SessionState::LoggedOut;
        self.user_id = None;
    }

    /// Drop an unusable token without touching the poll.
    fn discard_token(&mut self, ctx: &mut ExpiryContext) {
        ctx.store.remove_token();
        self.state = SessionState::LoggedOut;
        self.user_id = None;
    }

    fn force_logout(&mut self, ctx: &mut ExpiryContext) {
        self.logout(ctx);
        info!("Session forcibly logged out");
    }

    fn poll(&mut self, ctx: &mut ExpiryContext) -> TokenStatus {
        let status = self.check_validity(ctx);
        if self.polling {
            let interval = ctx.config.poll_interval.max(MIN_POLL_INTERVAL);
            ctx.arm(Resource::SessionPoll, interval, TimerAction::PollSession);
        }
        status
    }
}
