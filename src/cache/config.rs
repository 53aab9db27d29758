//! Configuration for the cache system
//!
//! Two kinds of configuration live here:
//! - [`CachePolicy`]: per-operation bounds (size, TTL), whose fields form the
//!   fingerprint that decides which operations share a store
//! - [`CacheSettings`]: process-level switches for the interceptor

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable that turns caching on or off
pub const ENV_ENABLED: &str = "ASYNC_CACHE_ENABLED";

/// Environment variable that creates stores on first use
pub const ENV_AUTO_REGISTER: &str = "ASYNC_CACHE_AUTO_REGISTER";

const DEFAULT_POLICY_NAME: &str = "default1000Item5MinuteCache";
const DEFAULT_MAX_ENTRIES: u64 = 1000;
const DEFAULT_TTL_SECONDS: u64 = 300;

/// Size and expiry bounds for one cache store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Logical cache name
    pub name: String,

    /// Approximate upper bound on entries held by the store
    pub max_entries: u64,

    /// Seconds a successful result stays cached after it completes
    pub ttl_seconds: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            name: DEFAULT_POLICY_NAME.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl CachePolicy {
    pub fn new(name: impl Into<String>, max_entries: u64, ttl_seconds: u64) -> Self {
        Self {
            name: name.into(),
            max_entries,
            ttl_seconds,
        }
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::Configuration(
                "policy name must not be empty".to_string(),
            ));
        }

        if self.max_entries == 0 {
            return Err(CacheError::Configuration(format!(
                "policy `{}`: max_entries must be greater than 0",
                self.name
            )));
        }

        if self.ttl_seconds == 0 {
            return Err(CacheError::Configuration(format!(
                "policy `{}`: ttl_seconds must be greater than 0",
                self.name
            )));
        }

        Ok(())
    }

    /// Time-to-live as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Identity of the store this policy maps to
    pub fn fingerprint(&self) -> PolicyFingerprint {
        PolicyFingerprint {
            name: self.name.clone(),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl_seconds,
        }
    }
}

/// All policy fields; equal fingerprints share one store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyFingerprint {
    name: String,
    max_entries: u64,
    ttl_seconds: u64,
}

impl PolicyFingerprint {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PolicyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.name, self.ttl_seconds, self.max_entries)
    }
}

/// Process-level interceptor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false every call goes straight to its producer
    pub enabled: bool,

    /// Create a policy's store on first use instead of bypassing unregistered policies
    pub auto_register: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_register: false,
        }
    }
}

impl CacheSettings {
    /// Create a new builder for cache settings
    pub fn builder() -> CacheSettingsBuilder {
        CacheSettingsBuilder::default()
    }

    /// Load settings from the environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from an arbitrary variable source; unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            enabled: parse_flag(ENV_ENABLED, lookup(ENV_ENABLED))?.unwrap_or(defaults.enabled),
            auto_register: parse_flag(ENV_AUTO_REGISTER, lookup(ENV_AUTO_REGISTER))?
                .unwrap_or(defaults.auto_register),
        })
    }
}

fn parse_flag(name: &str, raw: Option<String>) -> Result<Option<bool>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(CacheError::Configuration(format!(
            "{name}: expected a boolean, got `{other}`"
        ))),
    }
}

/// Builder for cache settings
#[derive(Debug, Default)]
pub struct CacheSettingsBuilder {
    enabled: Option<bool>,
    auto_register: Option<bool>,
}

impl CacheSettingsBuilder {
    /// Enable or disable caching
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Enable or disable store creation on first use
    pub fn auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = Some(auto_register);
        self
    }

    /// Build the cache settings
    pub fn build(self) -> CacheSettings {
        let defaults = CacheSettings::default();

        CacheSettings {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            auto_register: self.auto_register.unwrap_or(defaults.auto_register),
        }
    }
}
