//! Polling waiter for hide markers
//!
//! Loading masks and AngularJS `ng-show`/`ng-hide` toggles change state
//! asynchronously and the driver offers no completion event for them. The
//! waiter re-reads one attribute of an element on a fixed (or escalating)
//! interval until a marker shows up or the poll budget runs out.
//!
//! Running out of budget is not an error: [`wait_for_marker`] reports it as
//! [`WaitOutcome::TimedOut`] and the caller decides whether that matters.
//! Only a failure to read the element at all is returned as `Err`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::driver::PageDriver;
use crate::utils::constants::{DISPLAY_NONE_STYLE, NG_HIDE_CLASS};
use crate::utils::errors::{ElementError, ElementResult};

/// Shortest poll interval a budget accepts
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Marker whose presence in an attribute means "hidden"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideMarker {
    /// Substring of the `class` attribute, e.g. `ng-hide`
    ClassToken(String),
    /// Substring of the inline `style` attribute, compared with all
    /// whitespace removed from both sides
    InlineStyle(String),
}

impl HideMarker {
    pub fn ng_hide() -> Self {
        HideMarker::ClassToken(NG_HIDE_CLASS.to_string())
    }

    pub fn display_none() -> Self {
        HideMarker::InlineStyle(DISPLAY_NONE_STYLE.to_string())
    }

    /// Attribute this marker is read from
    pub fn attribute(&self) -> &'static str {
        match self {
            HideMarker::ClassToken(_) => "class",
            HideMarker::InlineStyle(_) => "style",
        }
    }

    /// Whether `value` carries the marker; a missing value never does
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };

        match self {
            HideMarker::ClassToken(token) => value.contains(token.as_str()),
            HideMarker::InlineStyle(style) => {
                let wanted = strip_whitespace(style);
                !wanted.is_empty() && strip_whitespace(value).contains(&wanted)
            }
        }
    }
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Interval change after a number of polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    pub after: u32,
    pub interval: Duration,
}

/// Total time and poll interval of a wait
///
/// Invariant: `timeout >= interval >= 1ms`. The number of sleeps is the largest
/// count whose summed intervals still fit in `timeout`; for a fixed interval
/// that is `floor(timeout / interval)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    timeout: Duration,
    interval: Duration,
    escalation: Option<Escalation>,
}

impl PollBudget {
    /// # Errors
    /// `InvalidBudget` when `interval` is under [`MIN_POLL_INTERVAL`] or longer than `timeout`.
    pub fn new(timeout: Duration, interval: Duration) -> ElementResult<Self> {
        check_interval("poll interval", interval)?;
        if timeout < interval {
            return Err(ElementError::InvalidBudget(format!(
                "timeout {}ms is shorter than poll interval {}ms",
                timeout.as_millis(),
                interval.as_millis()
            )));
        }

        Ok(Self {
            timeout,
            interval,
            escalation: None,
        })
    }

    /// Switch to `interval` once `after` polls have been made
    pub fn escalating(mut self, after: u32, interval: Duration) -> ElementResult<Self> {
        check_interval("escalated poll interval", interval)?;
        self.escalation = Some(Escalation { after, interval });
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn escalation(&self) -> Option<Escalation> {
        self.escalation
    }

    /// Interval slept before poll number `poll` (0-based)
    pub fn interval_for(&self, poll: u32) -> Duration {
        match self.escalation {
            Some(esc) if poll >= esc.after => esc.interval,
            _ => self.interval,
        }
    }

    /// Maximum number of sleeps (and therefore re-reads) the budget allows
    pub fn max_polls(&self) -> u32 {
        let initial = fits(self.timeout, self.interval);
        let Some(esc) = self.escalation else {
            return initial;
        };
        if initial <= esc.after {
            return initial;
        }

        let spent = self.interval * esc.after;
        esc.after.saturating_add(fits(self.timeout - spent, esc.interval))
    }
}

/// The tokio timer cannot sleep for less than a millisecond
fn check_interval(name: &str, interval: Duration) -> ElementResult<()> {
    if interval < MIN_POLL_INTERVAL {
        return Err(ElementError::InvalidBudget(format!(
            "{} must be at least {}ms, got {:?}",
            name,
            MIN_POLL_INTERVAL.as_millis(),
            interval
        )));
    }
    Ok(())
}

/// How many whole `interval`s fit in `total`
fn fits(total: Duration, interval: Duration) -> u32 {
    u32::try_from(total.as_nanos() / interval.as_nanos()).unwrap_or(u32::MAX)
}

/// Result of a marker wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied {
        reads: u32,
        elapsed: Duration,
    },
    TimedOut {
        reads: u32,
        elapsed: Duration,
        last_value: Option<String>,
    },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut { .. })
    }

    /// Attribute reads performed, including the first one
    pub fn reads(&self) -> u32 {
        match self {
            WaitOutcome::Satisfied { reads, .. } | WaitOutcome::TimedOut { reads, .. } => *reads,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Satisfied { elapsed, .. } | WaitOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }

    /// Turn a timeout into an error for callers that cannot continue without the marker
    pub fn require(self, what: &str, budget: &PollBudget) -> ElementResult<Self> {
        match self {
            WaitOutcome::TimedOut { .. } => Err(ElementError::Timeout {
                what: what.to_string(),
                timeout: budget.timeout(),
            }),
            satisfied => Ok(satisfied),
        }
    }
}

/// One attribute read, abandoned once `deadline` passes (`Ok(None)`)
async fn read_until<D>(
    driver: &D,
    element: &D::Element,
    attribute: &str,
    deadline: Instant,
) -> ElementResult<Option<Option<String>>>
where
    D: PageDriver + ?Sized,
{
    match tokio::time::timeout_at(deadline, driver.attribute(element, attribute)).await {
        Ok(value) => value.map(Some),
        Err(_) => Ok(None),
    }
}

/// Poll `element` until `marker` appears or `budget` is spent
///
/// Reads the marker attribute once and returns straight away if the marker
/// is already there. Otherwise sleeps, re-reads and counts until the marker
/// appears, `budget.max_polls()` sleeps have been made or `budget.timeout()`
/// has elapsed, whichever comes first. Sleeps never run past the timeout and
/// a read still pending one interval after it is abandoned, so a timed out
/// wait ends within one interval of the timeout even when reads are slow.
///
/// # Errors
/// Only driver failures while reading the attribute (for example a detached
/// node). A missing attribute counts as "marker absent".
pub async fn wait_for_marker<D>(
    driver: &D,
    element: &D::Element,
    marker: &HideMarker,
    budget: &PollBudget,
) -> ElementResult<WaitOutcome>
where
    D: PageDriver + ?Sized,
{
    let start = Instant::now();
    let deadline = start + budget.timeout();
    let attribute = marker.attribute();
    let max_polls = budget.max_polls();

    let Some(mut value) =
        read_until(driver, element, attribute, deadline + budget.interval_for(0)).await?
    else {
        debug!("first {} read outlived the budget", attribute);
        return Ok(WaitOutcome::TimedOut {
            reads: 0,
            elapsed: start.elapsed(),
            last_value: None,
        });
    };
    let mut reads = 1u32;
    debug!("{} poll 0: {:?}", attribute, value);

    let mut polls = 0u32;
    while !marker.matches(value.as_deref()) {
        let elapsed = start.elapsed();
        if polls >= max_polls || elapsed >= budget.timeout() {
            debug!(
                "gave up waiting for {:?} after {} poll(s) in {:?}",
                marker, polls, elapsed
            );
            return Ok(WaitOutcome::TimedOut {
                reads,
                elapsed,
                last_value: value,
            });
        }

        let interval = budget.interval_for(polls);
        tokio::time::sleep(interval.min(budget.timeout() - elapsed)).await;
        polls += 1;

        match read_until(driver, element, attribute, deadline + interval).await? {
            Some(next) => value = next,
            None => {
                debug!("{} poll {} outlived the budget", attribute, polls);
                return Ok(WaitOutcome::TimedOut {
                    reads,
                    elapsed: start.elapsed(),
                    last_value: value,
                });
            }
        }
        reads += 1;
        debug!("{} poll {}: {:?}", attribute, polls, value);
    }

    Ok(WaitOutcome::Satisfied {
        reads,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockNode};
    use crate::locator::NativeSelector;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn mask() -> NativeSelector {
        NativeSelector::Css("#mask".into())
    }

    #[test]
    fn class_marker_is_a_substring_match() {
        let marker = HideMarker::ng_hide();
        assert!(marker.matches(Some("panel ng-hide active")));
        assert!(marker.matches(Some("ng-hide-animate ng-hide")));
        assert!(!marker.matches(Some("panel active")));
        assert!(!marker.matches(Some("")));
        assert!(!marker.matches(None));
    }

    #[test]
    fn style_marker_ignores_whitespace() {
        let marker = HideMarker::display_none();
        assert!(marker.matches(Some("display:none;")));
        assert!(marker.matches(Some("display: none;")));
        assert!(marker.matches(Some("color: red;  display :\tnone ; width: 10px")));
        assert!(!marker.matches(Some("display: block;")));
        assert!(!marker.matches(Some("display: none")));
        assert!(!marker.matches(None));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            PollBudget::new(secs(10), Duration::ZERO),
            Err(ElementError::InvalidBudget(_))
        ));
        assert!(matches!(
            PollBudget::new(secs(10), secs(1)).unwrap().escalating(5, Duration::ZERO),
            Err(ElementError::InvalidBudget(_))
        ));
    }

    #[test]
    fn sub_millisecond_interval_is_rejected() {
        assert!(matches!(
            PollBudget::new(secs(1), Duration::from_micros(100)),
            Err(ElementError::InvalidBudget(_))
        ));
        assert!(matches!(
            PollBudget::new(secs(1), secs(1))
                .unwrap()
                .escalating(2, Duration::from_micros(999)),
            Err(ElementError::InvalidBudget(_))
        ));
        assert!(PollBudget::new(secs(1), MIN_POLL_INTERVAL).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reads_do_not_stretch_the_budget() {
        let driver = MockDriver::new();
        let node = driver.add(
            MockNode::matching(mask())
                .attribute("class", &[Some("mask")])
                .slow_reads(secs(4)),
        );
        let budget = PollBudget::new(secs(120), secs(5)).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        // reads end at 4s, 13s, ..., 112s; the last sleep is 5s and its read ends at 121s
        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                reads: 14,
                elapsed: secs(121),
                last_value: Some("mask".into()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn read_outliving_the_budget_is_abandoned() {
        let driver = MockDriver::new();
        let node = driver.add(
            MockNode::matching(mask())
                .attribute("class", &[Some("mask")])
                .slow_reads(secs(30)),
        );
        let budget = PollBudget::new(secs(10), secs(5)).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        assert!(outcome.is_timed_out());
        assert_eq!(outcome.reads(), 0);
        assert_eq!(outcome.elapsed(), secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn millisecond_polls_end_at_the_timeout() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute("class", &[Some("mask")]));
        let budget = PollBudget::new(Duration::from_millis(100), MIN_POLL_INTERVAL).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        assert!(outcome.is_timed_out());
        assert_eq!(outcome.elapsed(), Duration::from_millis(100));
        assert_eq!(outcome.reads(), 101);
    }

    #[test]
    fn interval_longer_than_timeout_is_rejected() {
        assert!(PollBudget::new(secs(3), secs(5)).is_err());
        assert!(PollBudget::new(secs(5), secs(5)).is_ok());
    }

    #[test]
    fn max_polls_is_floor_of_timeout_over_interval() {
        assert_eq!(PollBudget::new(secs(10), secs(5)).unwrap().max_polls(), 2);
        assert_eq!(PollBudget::new(secs(12), secs(5)).unwrap().max_polls(), 2);
        assert_eq!(PollBudget::new(secs(120), secs(5)).unwrap().max_polls(), 24);
        assert_eq!(
            PollBudget::new(Duration::from_millis(1_500), Duration::from_millis(400))
                .unwrap()
                .max_polls(),
            3
        );
    }

    #[test]
    fn escalating_budget_fits_in_the_timeout() {
        let budget = PollBudget::new(secs(120), secs(1))
            .unwrap()
            .escalating(5, secs(5))
            .unwrap();
        // 5 x 1s, then 115s / 5s
        assert_eq!(budget.max_polls(), 5 + 23);
        assert_eq!(budget.interval_for(0), secs(1));
        assert_eq!(budget.interval_for(4), secs(1));
        assert_eq!(budget.interval_for(5), secs(5));

        let short = PollBudget::new(secs(3), secs(1))
            .unwrap()
            .escalating(5, secs(5))
            .unwrap();
        assert_eq!(short.max_polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_one_read_when_marker_is_already_there() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute("class", &[Some("mask ng-hide")]));
        let budget = PollBudget::new(secs(10), secs(5)).unwrap();
        let start = Instant::now();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        assert!(outcome.is_satisfied());
        assert_eq!(outcome.reads(), 1);
        assert_eq!(driver.attribute_reads(node, "class"), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_floor_plus_one_reads() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute("class", &[Some("mask")]));
        let budget = PollBudget::new(secs(10), secs(5)).unwrap();
        let start = Instant::now();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                reads: 3,
                elapsed: secs(10),
                last_value: Some("mask".into()),
            }
        );
        assert_eq!(driver.attribute_reads(node, "class"), 3);
        assert!(start.elapsed() <= budget.timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_stays_within_one_interval_of_the_timeout() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute("style", &[Some("display: block;")]));
        let budget = PollBudget::new(secs(12), secs(5)).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::display_none(), &budget)
            .await
            .unwrap();

        assert!(outcome.is_timed_out());
        assert!(outcome.elapsed() <= budget.timeout());
        assert!(budget.timeout() - outcome.elapsed() < budget.interval());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_polling_once_the_marker_appears() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute(
            "style",
            &[Some("display: block;"), Some("display: block;"), Some("display: none;")],
        ));
        let budget = PollBudget::new(secs(120), secs(5)).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::display_none(), &budget)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WaitOutcome::Satisfied {
                reads: 3,
                elapsed: secs(10),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_attribute_keeps_polling() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).attribute("class", &[None, Some(""), Some("ng-hide")]));
        let budget = PollBudget::new(secs(30), secs(5)).unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        assert!(outcome.is_satisfied());
        assert_eq!(outcome.reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn escalating_budget_switches_interval_after_five_polls() {
        let driver = MockDriver::new();
        let mut script = vec![Some("mask"); 7];
        script.push(Some("mask ng-hide"));
        let node = driver.add(MockNode::matching(mask()).attribute("class", &script));
        let budget = PollBudget::new(secs(120), secs(1))
            .unwrap()
            .escalating(5, secs(5))
            .unwrap();

        let outcome = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap();

        // 5 polls at 1s then 2 polls at 5s
        assert_eq!(outcome.elapsed(), secs(15));
        assert_eq!(outcome.reads(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_element_is_an_error() {
        let driver = MockDriver::new();
        let node = driver.add(MockNode::matching(mask()).detached());
        let budget = PollBudget::new(secs(10), secs(5)).unwrap();

        let err = wait_for_marker(&driver, &node, &HideMarker::ng_hide(), &budget)
            .await
            .unwrap_err();

        assert!(matches!(err, ElementError::Stale(_)));
    }

    #[test]
    fn require_turns_timeout_into_an_error() {
        let budget = PollBudget::new(secs(10), secs(5)).unwrap();
        let timed_out = WaitOutcome::TimedOut {
            reads: 3,
            elapsed: secs(10),
            last_value: None,
        };
        assert!(matches!(
            timed_out.require("mask", &budget),
            Err(ElementError::Timeout { .. })
        ));

        let done = WaitOutcome::Satisfied {
            reads: 1,
            elapsed: Duration::ZERO,
        };
        assert!(done.require("mask", &budget).unwrap().is_satisfied());
    }
}
