//! Browser lifecycle for element sessions
//!
//! Launches a chromiumoxide browser with its own profile directory and keeps
//! the CDP event handler task alive for as long as the browser is owned.

use anyhow::Result;
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed; dropping the wrapper does that.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the profile directory (blocking)
    ///
    /// MUST be called after `browser.wait()` completes so Chrome has
    /// released its file handles.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();

        if let Some(dir) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without explicit cleanup. \
                Temp directory will be orphaned: {}. \
                Call BrowserSession::shutdown() before dropping to ensure proper cleanup.",
                dir.display()
            );
        }
    }
}

/// Launch a browser with a fresh profile directory
///
/// Returns the browser, its handler task and the profile directory that
/// MUST be removed once the browser has shut down.
pub async fn launch_browser(config: &BrowserConfig) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    info!("Launching browser for element session");

    // Unique per session so concurrent sessions never share a profile lock
    let user_data_dir =
        std::env::temp_dir().join(format!("kodegen_webelements_{}", Uuid::new_v4()));

    let (browser, handler) =
        crate::browser_setup::launch_browser(config, Some(user_data_dir.clone())).await?;

    Ok((browser, handler, user_data_dir))
}
