//! Locating, downloading and launching Chrome / Chromium

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::BrowserConfig;

/// CDP request timeout for every command sent to the browser
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(target_os = "windows")]
const CANDIDATE_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const CANDIDATE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "~/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CANDIDATE_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/local/bin/chromium",
    "/opt/google/chrome/chrome",
];

/// Flags passed to every launch
const BASE_ARGS: &[&str] = &[
    "--disable-infobars",
    "--disable-notifications",
    "--disable-print-preview",
    "--disable-software-rasterizer",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-breakpad",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--password-store=basic",
    "--use-mock-keychain",
    "--mute-audio",
];

const INSECURE_ARGS: &[&str] = &[
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--ignore-certificate-errors",
];

const NO_SANDBOX_ARGS: &[&str] = &["--no-sandbox", "--disable-setuid-sandbox"];

/// RAII guard that removes a freshly created profile directory unless kept
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Hand the directory over to the caller
    fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!("Cleaned up temp dir after launch failure: {}", self.path.display()),
            Err(e) => warn!("Failed to clean up temp dir {}: {}", self.path.display(), e),
        }
    }
}

/// Expand `~/` and `%VAR%` in a candidate path; `None` if home is unknown
fn expand_candidate(candidate: &str) -> Option<PathBuf> {
    if let Some(rest) = candidate.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if candidate.contains('%') {
        return Some(PathBuf::from(expand_env_vars(candidate)));
    }
    Some(PathBuf::from(candidate))
}

/// Replace `%VAR%` tokens with their environment values
///
/// Unknown variables are left as written; `%%` collapses to `%`.
fn expand_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        let name: String = chars.by_ref().take_while(|&c| c != '%').collect();
        match std::env::var(&name) {
            Ok(value) if !name.is_empty() => result.push_str(&value),
            _ if name.is_empty() => result.push('%'),
            _ => {
                result.push('%');
                result.push_str(&name);
                result.push('%');
            }
        }
    }

    result
}

/// Find a local Chrome / Chromium
///
/// `CHROMIUM_PATH` wins, then the platform install locations, then `which`.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to a missing file: {}", path.display());
    }

    if let Some(path) = CANDIDATE_PATHS
        .iter()
        .filter_map(|candidate| expand_candidate(candidate))
        .find(|path| path.exists())
    {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser using 'which {}': {}", cmd, found);
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    warn!("No Chrome/Chromium executable found. Will download and use fetcher.");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache dir and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join(".cache");
            warn!(
                "Could not determine system cache directory, using {}",
                fallback.display()
            );
            fallback
        })
        .join("kodegen/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());
    Ok(revision_info.executable_path)
}

/// Command-line flags for a launch
fn launch_args(config: &BrowserConfig, in_container: bool) -> Vec<&'static str> {
    let mut args = BASE_ARGS.to_vec();
    if config.disable_security {
        args.extend_from_slice(INSECURE_ARGS);
    }
    // setuid sandboxing does not work inside containers
    if in_container || config.disable_security {
        args.extend_from_slice(NO_SANDBOX_ARGS);
    }
    args
}

/// CDP events chromiumoxide cannot deserialize; they do not affect the session
///
/// See mattsse/chromiumoxide#167 and #229.
fn is_benign_handler_error(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

fn in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

/// Find or download Chrome/Chromium and launch it
///
/// # Arguments
/// * `config` - Headless mode, window size and the security switch
/// * `chrome_data_dir` - Profile directory; falls back to one keyed by process ID
///
/// The profile directory is removed again if the launch fails.
pub async fn launch_browser(
    config: &BrowserConfig,
    chrome_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir = chrome_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("kodegen_webelements_{}", std::process::id()))
    });
    let temp_guard = TempDirGuard::new(user_data_dir)?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(REQUEST_TIMEOUT)
        .window_size(config.window.width, config.window.height)
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path);

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    let container = in_container();
    if container {
        info!("Detected containerized environment, disabling sandbox");
    }
    if config.disable_security {
        warn!("Disabling browser security features (disable_security=true)");
    }
    for arg in launch_args(config, container) {
        builder = builder.arg(arg);
    }

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                if is_benign_handler_error(&message) {
                    trace!("Suppressed benign CDP serialization error: {}", message);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    temp_guard.keep();
    Ok((browser, handler_task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_launch_keeps_the_sandbox() {
        let args = launch_args(&BrowserConfig::default(), false);
        assert!(args.contains(&"--no-first-run"));
        assert!(!args.contains(&"--no-sandbox"));
        assert!(!args.contains(&"--disable-web-security"));
    }

    #[test]
    fn containers_drop_the_sandbox_only() {
        let args = launch_args(&BrowserConfig::default(), true);
        assert!(args.contains(&"--no-sandbox"));
        assert!(!args.contains(&"--ignore-certificate-errors"));
    }

    #[test]
    fn insecure_launch_adds_security_flags() {
        let config = BrowserConfig {
            disable_security: true,
            ..BrowserConfig::default()
        };
        let args = launch_args(&config, false);
        assert!(args.contains(&"--disable-web-security"));
        assert!(args.contains(&"--no-sandbox"));
    }

    #[test]
    fn serialization_noise_is_benign() {
        assert!(is_benign_handler_error(
            "data did not match any variant of untagged enum Message"
        ));
        assert!(!is_benign_handler_error("connection closed"));
    }

    #[test]
    fn unknown_env_vars_are_left_alone() {
        assert_eq!(
            expand_env_vars(r"%KODEGEN_SURELY_UNSET_VAR%\chrome.exe"),
            r"%KODEGEN_SURELY_UNSET_VAR%\chrome.exe"
        );
        assert_eq!(expand_env_vars("100%%"), "100%");
        assert_eq!(
            expand_candidate("/usr/bin/chromium"),
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }
}
