// kodegen-webelements: launch a browser, open a page and run one element wait.
//
// Exit status is 0 when the wait is satisfied and 1 when it times out.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use chromiumoxide::Page;
use kodegen_tools_webelements::{
    BrowserSession, ElementHelper, Locator, LocatorStrategy, WaitOutcome, load_yaml_config,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kodegen-webelements")]
#[command(version, about = "Locate a page element and wait on it")]
struct Cli {
    /// Page to open
    #[arg(long)]
    url: String,

    /// Locator strategy (id, class-name, xpath, css-selector, name, tag-name, link-text, partial-link-text)
    #[arg(long, default_value = "css-selector")]
    by: LocatorStrategy,

    /// Locator value
    #[arg(long)]
    value: String,

    /// What to wait for
    #[arg(long, value_enum, default_value_t = Mode::Present)]
    mode: Mode,

    /// Wait budget; defaults to the configured wait for the mode
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// YAML config file
    #[arg(long, value_name = "FILE", env = "KODEGEN_WEBELEMENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Element is in the DOM
    Present,
    /// Element is displayed
    Visible,
    /// Element is absent or not displayed
    Hidden,
    /// Element has the ng-hide class
    NgHide,
    /// Element's inline style contains display:none;
    DisplayNone,
}

async fn run(
    elements: &ElementHelper<Page>,
    locator: &Locator,
    mode: Mode,
    timeout: Option<Duration>,
) -> Result<bool> {
    let settings = *elements.settings();
    let lookup_wait = timeout.unwrap_or(settings.default_wait);
    let hide_wait = timeout.unwrap_or(settings.hide_timeout);

    let satisfied = match mode {
        Mode::Present => {
            elements.element_within(locator, lookup_wait).await?;
            println!("present: {}", locator);
            true
        }
        Mode::Visible => {
            elements.visible_element(locator, lookup_wait).await?;
            println!("visible: {}", locator);
            true
        }
        Mode::Hidden => {
            let hidden = elements.wait_until_hidden(locator, lookup_wait).await?;
            println!("hidden: {} = {}", locator, hidden);
            hidden
        }
        Mode::NgHide => report(elements.wait_angular_hidden_within(locator, hide_wait).await?),
        Mode::DisplayNone => report(elements.wait_hidden_by_display_within(locator, hide_wait).await?),
    };

    Ok(satisfied)
}

fn report(outcome: WaitOutcome) -> bool {
    match outcome {
        WaitOutcome::Satisfied { reads, elapsed } => {
            println!("satisfied after {} read(s) in {:?}", reads, elapsed);
            true
        }
        WaitOutcome::TimedOut {
            reads,
            elapsed,
            last_value,
        } => {
            println!(
                "timed out after {} read(s) in {:?}, last value: {}",
                reads,
                elapsed,
                last_value.as_deref().unwrap_or("<unset>")
            );
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_yaml_config(cli.config.as_deref())?;
    if cli.headful {
        config.browser.headless = false;
    }
    let locator = Locator::new(cli.by, cli.value);

    let session = BrowserSession::launch(&config)
        .await
        .context("Failed to start browser session")?;

    let result = match session.navigate(&cli.url).await {
        Ok(()) => {
            let elements = session.elements();
            run(&elements, &locator, cli.mode, cli.timeout_secs.map(Duration::from_secs)).await
        }
        Err(e) => Err(e.into()),
    };

    session.shutdown().await?;

    let satisfied = result?;
    info!("{:?} wait on {} finished", cli.mode, locator);
    Ok(if satisfied { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
