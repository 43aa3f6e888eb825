//! Element locate / wait helpers for browser automation
//!
//! Resolves elements by locator strategy, runs explicit and implicit waits,
//! and polls elements for AngularJS `ng-hide` or inline `display:none;`
//! markers within a bounded budget. Driven through chromiumoxide.

mod browser;
pub mod browser_setup;
pub mod driver;
pub mod elements;
pub mod locator;
mod session;
mod utils;
pub mod waiter;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::utils::constants::{
    DEFAULT_CHILD_HIDE_ESCALATE_AFTER, DEFAULT_CHILD_HIDE_ESCALATED_POLL_SECS,
    DEFAULT_CHILD_HIDE_POLL_SECS, DEFAULT_EXPLICIT_POLL_MS, DEFAULT_HIDE_POLL_SECS,
    DEFAULT_HIDE_TIMEOUT_SECS, DEFAULT_IMPLICIT_WAIT_SECS, DEFAULT_WAIT_SECS,
};
use crate::utils::timeout::{validate_hide_wait, validate_lookup_wait, validate_poll_interval};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub waits: WaitConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Wait timings, in the units of their field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,

    #[serde(default = "default_implicit_wait_secs")]
    pub implicit_wait_secs: u64,

    #[serde(default = "default_explicit_poll_ms")]
    pub explicit_poll_ms: u64,

    #[serde(default = "default_hide_timeout_secs")]
    pub hide_timeout_secs: u64,

    #[serde(default = "default_hide_poll_secs")]
    pub hide_poll_secs: u64,

    /// Child-element hide wait: interval before escalation
    #[serde(default = "default_child_hide_poll_secs")]
    pub child_hide_poll_secs: u64,

    /// Child-element hide wait: interval after escalation
    #[serde(default = "default_child_hide_escalated_poll_secs")]
    pub child_hide_escalated_poll_secs: u64,

    #[serde(default = "default_child_hide_escalate_after")]
    pub child_hide_escalate_after: u32,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_wait_secs() -> u64 {
    DEFAULT_WAIT_SECS
}
fn default_implicit_wait_secs() -> u64 {
    DEFAULT_IMPLICIT_WAIT_SECS
}
fn default_explicit_poll_ms() -> u64 {
    DEFAULT_EXPLICIT_POLL_MS
}
fn default_hide_timeout_secs() -> u64 {
    DEFAULT_HIDE_TIMEOUT_SECS
}
fn default_hide_poll_secs() -> u64 {
    DEFAULT_HIDE_POLL_SECS
}
fn default_child_hide_poll_secs() -> u64 {
    DEFAULT_CHILD_HIDE_POLL_SECS
}
fn default_child_hide_escalated_poll_secs() -> u64 {
    DEFAULT_CHILD_HIDE_ESCALATED_POLL_SECS
}
fn default_child_hide_escalate_after() -> u32 {
    DEFAULT_CHILD_HIDE_ESCALATE_AFTER
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            default_wait_secs: default_wait_secs(),
            implicit_wait_secs: default_implicit_wait_secs(),
            explicit_poll_ms: default_explicit_poll_ms(),
            hide_timeout_secs: default_hide_timeout_secs(),
            hide_poll_secs: default_hide_poll_secs(),
            child_hide_poll_secs: default_child_hide_poll_secs(),
            child_hide_escalated_poll_secs: default_child_hide_escalated_poll_secs(),
            child_hide_escalate_after: default_child_hide_escalate_after(),
        }
    }
}

impl WaitConfig {
    /// Validate against the configured bounds and convert to durations
    pub fn to_settings(&self) -> ElementResult<WaitSettings> {
        let secs_as_ms = |secs: u64| secs.saturating_mul(1_000);

        Ok(WaitSettings {
            default_wait: validate_lookup_wait(Some(self.default_wait_secs), DEFAULT_WAIT_SECS)?,
            implicit_wait: validate_lookup_wait(
                Some(self.implicit_wait_secs),
                DEFAULT_IMPLICIT_WAIT_SECS,
            )?,
            explicit_poll: validate_poll_interval(self.explicit_poll_ms)?,
            hide_timeout: validate_hide_wait(Some(self.hide_timeout_secs), DEFAULT_HIDE_TIMEOUT_SECS)?,
            hide_poll: validate_poll_interval(secs_as_ms(self.hide_poll_secs))?,
            child_hide_poll: validate_poll_interval(secs_as_ms(self.child_hide_poll_secs))?,
            child_hide_escalated_poll: validate_poll_interval(secs_as_ms(
                self.child_hide_escalated_poll_secs,
            ))?,
            child_hide_escalate_after: self.child_hide_escalate_after,
        })
    }
}

/// Load config from a YAML file
///
/// With no explicit path, `config.yaml` in the package root is used if it
/// exists and defaults otherwise. An explicit path must exist.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
            if !default_path.exists() {
                return Ok(Config::default());
            }
            default_path
        }
    };

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Invalid config {}", config_path.display()))?;
    Ok(config)
}

pub use browser::{
    BrowserError, BrowserResult, BrowserWrapper, download_managed_browser,
    find_browser_executable, launch_browser,
};
pub use driver::PageDriver;
pub use elements::{ElementHelper, WaitSettings};
pub use locator::{Locator, LocatorStrategy, NativeSelector};
pub use session::BrowserSession;
pub use utils::constants;
pub use utils::errors::{ElementError, ElementResult};
pub use waiter::{HideMarker, PollBudget, WaitOutcome, wait_for_marker};
