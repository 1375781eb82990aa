//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.fedadmin/config.json`); secrets
//! and deployment paths can be overridden from the environment. Required
//! values (admin password, daemon basedir) are checked at startup and the
//! process refuses to run without them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Operator identity and session settings.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Gateway bind and cookie settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Supervised daemon settings (basedir, binary, per-run timeout).
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Request rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Admin identity and session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfig {
    /// Operator username (default "admin"). Overridden by FEDADMIN_ADMIN_USER.
    #[serde(default = "default_admin_user")]
    pub user: String,

    /// Operator password. Overridden by FEDADMIN_ADMIN_PASS. Required;
    /// running unauthenticated is too risky, so startup fails without it.
    pub pass: Option<String>,

    /// Session signing secret. Overridden by FEDADMIN_SESSION_SECRET. When
    /// absent, a restart-stable secret is derived from the admin password.
    pub session_secret: Option<String>,

    /// Session lifetime in milliseconds (default 12 hours).
    #[serde(default = "default_session_ttl_ms")]
    pub session_ttl_ms: u64,
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_session_ttl_ms() -> u64 {
    12 * 60 * 60 * 1000
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: default_admin_user(),
            pass: None,
            session_secret: None,
            session_ttl_ms: default_session_ttl_ms(),
        }
    }
}

/// Gateway bind, port, and cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the HTTP API and UI (default 3939).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"; expose via a reverse proxy if needed).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Set the Secure attribute on the session cookie (turn on behind TLS).
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_gateway_port() -> u16 {
    3939
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            cookie_secure: false,
        }
    }
}

/// Supervised daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Storage directory the daemon operates on. Overridden by FEDD_BASEDIR.
    /// Required; must contain a `server.json` layout marker.
    pub basedir: Option<PathBuf>,

    /// Path to the daemon control binary. Overridden by FEDD_BIN. Defaults to
    /// "fedd" resolved from PATH.
    pub bin: Option<PathBuf>,

    /// Wall-clock timeout per invocation in milliseconds (default 60s).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            basedir: None,
            bin: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Fixed-window request rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Window length in milliseconds (default 60s).
    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per client per window (default 120).
    #[serde(default = "default_rate_limit")]
    pub limit: u32,
}

fn default_rate_window_ms() -> u64 {
    60_000
}

fn default_rate_limit() -> u32 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_rate_window_ms(),
            limit: default_rate_limit(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the admin username: env FEDADMIN_ADMIN_USER overrides config.
pub fn resolve_admin_user(config: &Config) -> String {
    env_nonempty("FEDADMIN_ADMIN_USER").unwrap_or_else(|| config.admin.user.clone())
}

/// Resolve the admin password: env FEDADMIN_ADMIN_PASS overrides config.
pub fn resolve_admin_pass(config: &Config) -> Option<String> {
    env_nonempty("FEDADMIN_ADMIN_PASS").or_else(|| {
        config
            .admin
            .pass
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the session signing secret: env FEDADMIN_SESSION_SECRET overrides config.
pub fn resolve_session_secret(config: &Config) -> Option<String> {
    env_nonempty("FEDADMIN_SESSION_SECRET").or_else(|| {
        config
            .admin
            .session_secret
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the daemon basedir: env FEDD_BASEDIR overrides config.
pub fn resolve_basedir(config: &Config) -> Option<PathBuf> {
    env_nonempty("FEDD_BASEDIR")
        .map(PathBuf::from)
        .or_else(|| config.daemon.basedir.clone())
}

/// Resolve the daemon binary: env FEDD_BIN overrides config; falls back to
/// "fedd" from PATH.
pub fn resolve_daemon_bin(config: &Config) -> PathBuf {
    env_nonempty("FEDD_BIN")
        .map(PathBuf::from)
        .or_else(|| config.daemon.bin.clone())
        .unwrap_or_else(|| PathBuf::from("fedd"))
}

/// Refuse directories that do not look like daemon storage: the layout marker
/// `server.json` must exist at the root.
pub fn check_basedir(dir: &Path) -> Result<()> {
    let marker = dir.join("server.json");
    if !marker.exists() {
        anyhow::bail!(
            "basedir does not contain server.json (not a daemon storage directory?): {}",
            marker.display()
        );
    }
    Ok(())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("FEDADMIN_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".fedadmin").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or FEDADMIN_CONFIG_PATH). A missing file
/// yields the default config, so env-only deployments need no file at all.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
