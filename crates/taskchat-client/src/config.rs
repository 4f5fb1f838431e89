//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration against a local development backend.

use std::time::Duration;

use taskchat_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SEND_TIMEOUT_SECS, DEFAULT_UPLOAD_TIMEOUT_SECS, RECONCILE_WINDOW_SECS,
};
use taskchat_shared::SenderKind;
use taskchat_store::ReconcileMode;

use crate::pipeline::Timeouts;
use crate::session::SessionSettings;

/// Client configuration.
#[derive(Clone)]
pub struct ChatConfig {
    /// Base URL of the REST API.
    /// Env: `TASKCHAT_API_URL`
    /// Default: `http://127.0.0.1:8080/api`
    pub api_base_url: String,

    /// Bearer token sent with every request.
    /// Env: `TASKCHAT_AUTH_TOKEN`
    /// Default: none.
    pub auth_token: Option<String>,

    /// Interval between authoritative list refreshes; `None` polls never.
    /// Env: `TASKCHAT_POLL_INTERVAL_SECS` (0 disables)
    /// Default: 5 s
    pub poll_interval: Option<Duration>,

    /// Env: `TASKCHAT_UPLOAD_TIMEOUT_SECS`
    /// Default: 60 s
    pub upload_timeout: Duration,

    /// Env: `TASKCHAT_SEND_TIMEOUT_SECS`
    /// Default: 30 s
    pub send_timeout: Duration,

    /// Env: `TASKCHAT_FETCH_TIMEOUT_SECS`
    /// Default: 15 s
    pub fetch_timeout: Duration,

    /// Tolerance between local and server timestamps when matching a pending
    /// message to its confirmation.
    /// Env: `TASKCHAT_RECONCILE_WINDOW_SECS`
    /// Default: 60 s
    pub reconcile_window: Duration,

    /// Env: `TASKCHAT_RECONCILE_MODE` (`heuristic` / `correlation`)
    /// Default: `correlation`
    pub reconcile_mode: ReconcileMode,

    /// The local user's role on the task; messages with this kind are own.
    /// Env: `TASKCHAT_SELF_KIND`
    /// Default: `poster`
    pub self_kind: SenderKind,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            poll_interval: Some(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            reconcile_window: Duration::from_secs(RECONCILE_WINDOW_SECS),
            reconcile_mode: ReconcileMode::default(),
            self_kind: SenderKind::Poster,
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_base_url", &self.api_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("upload_timeout", &self.upload_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("reconcile_window", &self.reconcile_window)
            .field("reconcile_mode", &self.reconcile_mode)
            .field("self_kind", &self.self_kind)
            .finish()
    }
}

impl ChatConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("TASKCHAT_API_URL") {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().to_string();
            }
        }

        if let Some(token) = lookup("TASKCHAT_AUTH_TOKEN") {
            if !token.trim().is_empty() {
                config.auth_token = Some(token.trim().to_string());
            }
        }

        if let Some(secs) = parse_secs(&lookup, "TASKCHAT_POLL_INTERVAL_SECS") {
            config.poll_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(secs) = parse_positive_secs(&lookup, "TASKCHAT_UPLOAD_TIMEOUT_SECS") {
            config.upload_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_positive_secs(&lookup, "TASKCHAT_SEND_TIMEOUT_SECS") {
            config.send_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_positive_secs(&lookup, "TASKCHAT_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_positive_secs(&lookup, "TASKCHAT_RECONCILE_WINDOW_SECS") {
            config.reconcile_window = Duration::from_secs(secs);
        }

        if let Some(mode) = lookup("TASKCHAT_RECONCILE_MODE") {
            match mode.parse::<ReconcileMode>() {
                Ok(parsed) => config.reconcile_mode = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid TASKCHAT_RECONCILE_MODE, using default"),
            }
        }

        if let Some(kind) = lookup("TASKCHAT_SELF_KIND") {
            match kind.parse::<SenderKind>() {
                Ok(parsed) => config.self_kind = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid TASKCHAT_SELF_KIND, using default"),
            }
        }

        config
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            upload: self.upload_timeout,
            submit: self.send_timeout,
            fetch: self.fetch_timeout,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeouts: self.timeouts(),
            poll_interval: self.poll_interval,
            reconcile_mode: self.reconcile_mode,
            reconcile_window: self.reconcile_window,
        }
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid number of seconds, using default");
            None
        }
    }
}

fn parse_positive_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    match parse_secs(lookup, key)? {
        0 => {
            tracing::warn!(key, "Zero is not a valid timeout, using default");
            None
        }
        secs => Some(secs),
    }
}
