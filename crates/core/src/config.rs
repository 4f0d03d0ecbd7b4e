use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub audit: AuditConfig,
    pub alerts: AlertConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CUSTOS_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CUSTOS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            audit: AuditConfig::from_env_profiled(p),
            alerts: AlertConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  rules:   dir={}", self.rules.rules_dir.display());
        tracing::info!("  custody: gap_threshold_hours={}", self.rules.custody_gap_threshold_hours);
        tracing::info!("  audit:   signing_key={}", if self.audit.is_keyed() { "set" } else { "(none)" });
        tracing::info!("  alerts:  dedup={}", self.alerts.dedup);
    }
}

// ── Rules ─────────────────────────────────────────────────────

/// Default chain-of-custody gap threshold in hours.
pub const DEFAULT_CUSTODY_GAP_HOURS: u32 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub rules_dir: PathBuf,
    pub custody_gap_threshold_hours: u32,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            custody_gap_threshold_hours: profiled_env_u32(
                p,
                "CUSTODY_GAP_THRESHOLD_HOURS",
                DEFAULT_CUSTODY_GAP_HOURS,
            ),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("data/rules"),
            custody_gap_threshold_hours: DEFAULT_CUSTODY_GAP_HOURS,
        }
    }
}

// ── Audit ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Key material mixed into every audit digest. Never logged.
    #[serde(skip_serializing)]
    pub signing_key: Option<String>,
}

impl AuditConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            signing_key: profiled_env_opt(p, "AUDIT_SIGNING_KEY"),
        }
    }

    pub fn is_keyed(&self) -> bool {
        self.signing_key.is_some()
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Suppress a new alert while an open alert with the same (rule, evidence) key exists.
    pub dedup: bool,
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dedup: profiled_env_bool(p, "ALERT_DEDUP", false),
        }
    }
}
