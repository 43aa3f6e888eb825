//! One browser, one page, one element helper per caller
//!
//! A `BrowserSession` owns its browser process outright; there is no shared
//! instance. Callers that need several pages launch several sessions.
//!
//! # Shutdown
//!
//! `shutdown()` must be awaited for a clean exit: it closes the browser,
//! waits for the process to exit and only then removes the profile
//! directory. Dropping a session just aborts the handler task.

use chromiumoxide::page::Page;
use tracing::{debug, info, warn};
use url::Url;

use crate::Config;
use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
use crate::elements::{ElementHelper, WaitSettings};

/// Schemes a session will navigate to
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "file", "about", "data"];

fn parse_target(url: &str) -> BrowserResult<Url> {
    let parsed = Url::parse(url).map_err(|e| BrowserError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(BrowserError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            url,
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

pub struct BrowserSession {
    wrapper: BrowserWrapper,
    page: Page,
    settings: WaitSettings,
}

impl BrowserSession {
    /// Launch a browser and open a blank page
    ///
    /// Wait settings are validated before anything is launched.
    pub async fn launch(config: &Config) -> BrowserResult<Self> {
        let settings = config
            .waits
            .to_settings()
            .map_err(|e| BrowserError::Config(e.to_string()))?;

        let (browser, handler, user_data_dir) = launch_browser(&config.browser)
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("{:#}", e)))?;
        let wrapper = BrowserWrapper::new(browser, handler, user_data_dir);

        let opened = wrapper.browser().new_page("about:blank").await;
        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                Self::close(wrapper).await;
                return Err(BrowserError::PageCreationFailed(e.to_string()));
            }
        };

        info!("Browser session ready");
        Ok(Self {
            wrapper,
            page,
            settings,
        })
    }

    /// Load `url` in the session page and wait for the load event
    pub async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let target = parse_target(url)?;
        info!("Navigating to {}", target);
        self.page
            .goto(target.as_str())
            .await
            .map_err(|e| BrowserError::NavigationFailed(format!("{}: {}", target, e)))?;
        Ok(())
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// An element helper bound to the session page
    pub fn elements(&self) -> ElementHelper<Page> {
        ElementHelper::new(self.page.clone(), self.settings)
    }

    /// Whether the browser still answers CDP commands
    pub async fn is_healthy(&self) -> bool {
        match self.wrapper.browser().version().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Browser health check failed: {}", e);
                false
            }
        }
    }

    /// Close the browser, wait for it to exit and remove its profile
    pub async fn shutdown(self) -> BrowserResult<()> {
        info!("Shutting down browser session");
        Self::close(self.wrapper).await;
        Ok(())
    }

    async fn close(mut wrapper: BrowserWrapper) {
        if let Err(e) = wrapper.browser_mut().close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = wrapper.browser_mut().wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        wrapper.cleanup_temp_dir();
    }
}
