//! Element helper: locate, wait for and interact with page elements
//!
//! One [`ElementHelper`] is owned per driver session. Every lookup takes a
//! [`Locator`], lowers it once and runs one of three wait styles:
//!
//! - explicit waits (`*_within`, `visible_*`, `wait_until_hidden`) poll on
//!   `explicit_poll` until their condition holds or the given wait elapses;
//! - `find_elements` retries for the helper's current implicit wait;
//! - immediate lookups (`find_element`, `*_now`, `try_element`,
//!   `child_element`) look once.
//!
//! The hide waits at the bottom resolve an element and hand it to the
//! polling waiter in [`crate::waiter`].

use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::driver::PageDriver;
use crate::locator::{Locator, NativeSelector};
use crate::utils::constants::{
    DEFAULT_CHILD_HIDE_ESCALATE_AFTER, DEFAULT_CHILD_HIDE_ESCALATED_POLL_SECS,
    DEFAULT_CHILD_HIDE_POLL_SECS, DEFAULT_EXPLICIT_POLL_MS, DEFAULT_HIDE_POLL_SECS,
    DEFAULT_HIDE_TIMEOUT_SECS, DEFAULT_IMPLICIT_WAIT_SECS, DEFAULT_WAIT_SECS,
};
use crate::utils::errors::{ElementError, ElementResult};
use crate::utils::wait_until::poll_until;
use crate::waiter::{HideMarker, PollBudget, WaitOutcome, wait_for_marker};

/// Validated wait timings used by an [`ElementHelper`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Explicit wait used when a method takes no wait argument
    pub default_wait: Duration,
    /// Implicit wait restored by `implicit_wait_on()`
    pub implicit_wait: Duration,
    /// Poll interval of explicit and implicit waits
    pub explicit_poll: Duration,
    /// Total budget of the hide waits
    pub hide_timeout: Duration,
    /// Poll interval of the hide waits
    pub hide_poll: Duration,
    pub child_hide_poll: Duration,
    pub child_hide_escalated_poll: Duration,
    pub child_hide_escalate_after: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            implicit_wait: Duration::from_secs(DEFAULT_IMPLICIT_WAIT_SECS),
            explicit_poll: Duration::from_millis(DEFAULT_EXPLICIT_POLL_MS),
            hide_timeout: Duration::from_secs(DEFAULT_HIDE_TIMEOUT_SECS),
            hide_poll: Duration::from_secs(DEFAULT_HIDE_POLL_SECS),
            child_hide_poll: Duration::from_secs(DEFAULT_CHILD_HIDE_POLL_SECS),
            child_hide_escalated_poll: Duration::from_secs(DEFAULT_CHILD_HIDE_ESCALATED_POLL_SECS),
            child_hide_escalate_after: DEFAULT_CHILD_HIDE_ESCALATE_AFTER,
        }
    }
}

pub struct ElementHelper<D: PageDriver> {
    driver: D,
    settings: WaitSettings,
    implicit_wait: RwLock<Duration>,
}

impl<D: PageDriver> ElementHelper<D> {
    pub fn new(driver: D, settings: WaitSettings) -> Self {
        Self {
            implicit_wait: RwLock::new(settings.implicit_wait),
            driver,
            settings,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    // --- implicit wait -------------------------------------------------

    pub fn implicit_wait(&self) -> Duration {
        *self.implicit_wait.read()
    }

    pub fn set_implicit_wait(&self, wait: Duration) {
        *self.implicit_wait.write() = wait;
    }

    pub fn implicit_wait_off(&self) {
        self.set_implicit_wait(Duration::ZERO);
    }

    /// Restore the configured implicit wait
    pub fn implicit_wait_on(&self) {
        self.set_implicit_wait(self.settings.implicit_wait);
    }

    // --- checks --------------------------------------------------------

    async fn first_now(&self, selector: &NativeSelector) -> ElementResult<Option<D::Element>> {
        Ok(self.driver.find_all(selector).await?.into_iter().next())
    }

    async fn all_present(&self, selector: &NativeSelector) -> ElementResult<Option<Vec<D::Element>>> {
        let found = self.driver.find_all(selector).await?;
        Ok((!found.is_empty()).then_some(found))
    }

    /// First match, if it is displayed
    async fn first_displayed(&self, selector: &NativeSelector) -> ElementResult<Option<D::Element>> {
        match self.first_now(selector).await? {
            Some(element) if self.driver.is_displayed(&element).await? => Ok(Some(element)),
            _ => Ok(None),
        }
    }

    /// All matches, once there is at least one and every match is displayed
    async fn all_displayed(&self, selector: &NativeSelector) -> ElementResult<Option<Vec<D::Element>>> {
        let found = self.driver.find_all(selector).await?;
        if found.is_empty() {
            return Ok(None);
        }
        for element in &found {
            if !self.driver.is_displayed(element).await? {
                return Ok(None);
            }
        }
        Ok(Some(found))
    }

    /// `Some(())` when no match is displayed
    ///
    /// No match at all counts as hidden, and so does a match that went
    /// stale between the lookup and the visibility check.
    async fn none_displayed(&self, selector: &NativeSelector) -> ElementResult<Option<()>> {
        for element in self.driver.find_all(selector).await? {
            match self.driver.is_displayed(&element).await {
                Ok(true) => return Ok(None),
                Ok(false) => {}
                Err(e) if e.is_absence() => debug!("match went stale, counting it as hidden: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(Some(()))
    }

    // --- explicit waits ------------------------------------------------

    /// First element matching `locator` once it is displayed
    pub async fn visible_element(&self, locator: &Locator, wait: Duration) -> ElementResult<D::Element> {
        let selector = &locator.to_native()?;
        let what = format!("visibility of {}", locator);
        poll_until(wait, self.settings.explicit_poll, &what, || self.first_displayed(selector)).await
    }

    /// Every element matching `locator`, once all of them are displayed
    pub async fn visible_elements(
        &self,
        locator: &Locator,
        wait: Duration,
    ) -> ElementResult<Vec<D::Element>> {
        let selector = &locator.to_native()?;
        let what = format!("visibility of all {}", locator);
        poll_until(wait, self.settings.explicit_poll, &what, || self.all_displayed(selector)).await
    }

    /// Wait for `locator` to be absent or not displayed
    ///
    /// Returns `false` if it is still displayed when `wait` runs out.
    pub async fn wait_until_hidden(&self, locator: &Locator, wait: Duration) -> ElementResult<bool> {
        let selector = &locator.to_native()?;
        let what = format!("invisibility of {}", locator);
        match poll_until(wait, self.settings.explicit_poll, &what, || self.none_displayed(selector)).await {
            Ok(()) => Ok(true),
            Err(ElementError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// First element matching `locator` once present in the DOM
    pub async fn element_within(&self, locator: &Locator, wait: Duration) -> ElementResult<D::Element> {
        let selector = &locator.to_native()?;
        let what = format!("presence of {}", locator);
        poll_until(wait, self.settings.explicit_poll, &what, || self.first_now(selector)).await
    }

    /// [`Self::element_within`] with the default wait
    pub async fn element(&self, locator: &Locator) -> ElementResult<D::Element> {
        self.element_within(locator, self.settings.default_wait).await
    }

    /// All elements matching `locator` once at least one is present
    pub async fn elements_within(
        &self,
        locator: &Locator,
        wait: Duration,
    ) -> ElementResult<Vec<D::Element>> {
        let selector = &locator.to_native()?;
        let what = format!("presence of any {}", locator);
        poll_until(wait, self.settings.explicit_poll, &what, || self.all_present(selector)).await
    }

    pub async fn elements(&self, locator: &Locator) -> ElementResult<Vec<D::Element>> {
        self.elements_within(locator, self.settings.default_wait).await
    }

    // --- implicit and immediate lookups --------------------------------

    /// "No check" lookup: a single find that never waits
    ///
    /// The helper's implicit wait is neither used nor changed.
    ///
    /// # Errors
    /// `NotFound` when nothing matches right now.
    pub async fn find_element(&self, locator: &Locator) -> ElementResult<D::Element> {
        self.element_now(locator).await
    }

    /// Lookup that retries for the current implicit wait; empty when nothing matched
    pub async fn find_elements(&self, locator: &Locator) -> ElementResult<Vec<D::Element>> {
        let selector = &locator.to_native()?;
        let wait = self.implicit_wait();
        let what = locator.to_string();
        match poll_until(wait, self.settings.explicit_poll, &what, || self.all_present(selector)).await {
            Ok(found) => Ok(found),
            Err(ElementError::Timeout { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Single lookup, ignoring the implicit wait
    pub async fn element_now(&self, locator: &Locator) -> ElementResult<D::Element> {
        self.try_element(locator)
            .await?
            .ok_or_else(|| ElementError::NotFound(locator.to_string()))
    }

    /// Single lookup, ignoring the implicit wait
    pub async fn elements_now(&self, locator: &Locator) -> ElementResult<Vec<D::Element>> {
        self.driver.find_all(&locator.to_native()?).await
    }

    /// The element if it is in the DOM right now
    pub async fn try_element(&self, locator: &Locator) -> ElementResult<Option<D::Element>> {
        self.first_now(&locator.to_native()?).await
    }

    /// Single lookup relative to `parent`
    pub async fn child_element(&self, parent: &D::Element, locator: &Locator) -> ElementResult<D::Element> {
        self.driver
            .find_all_within(parent, &locator.to_native()?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ElementError::NotFound(format!("{} under parent element", locator)))
    }

    // --- interactions --------------------------------------------------

    pub async fn text_within(&self, locator: &Locator, wait: Duration) -> ElementResult<String> {
        let element = self.element_within(locator, wait).await?;
        self.driver.text(&element).await
    }

    pub async fn text(&self, locator: &Locator) -> ElementResult<String> {
        self.text_within(locator, self.settings.default_wait).await
    }

    /// Rendered text of each element
    pub async fn texts(&self, elements: &[D::Element]) -> ElementResult<Vec<String>> {
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(self.driver.text(element).await?);
        }
        Ok(texts)
    }

    /// Current `value` of a text field or text area
    pub async fn field_value(&self, locator: &Locator) -> ElementResult<String> {
        let element = self.element(locator).await?;
        Ok(self
            .driver
            .attribute(&element, "value")
            .await?
            .unwrap_or_default())
    }

    pub async fn click_within(&self, locator: &Locator, wait: Duration) -> ElementResult<()> {
        let element = self.element_within(locator, wait).await?;
        self.driver.click(&element).await
    }

    pub async fn click(&self, locator: &Locator) -> ElementResult<()> {
        self.click_within(locator, self.settings.default_wait).await
    }

    /// Styled inputs (iCheck and friends) hide the real input and draw an
    /// `<ins>` right after it; that sibling is what takes the click.
    async fn click_decorated_input(&self, input_css: &str) -> ElementResult<()> {
        let locator = Locator::css(format!("{} + ins", input_css));
        let element = self.element(&locator).await?;
        self.driver.scroll_into_view(&element).await?;
        self.driver.click(&element).await
    }

    fn id_css(id: &str) -> ElementResult<String> {
        match Locator::id(id).to_native()? {
            NativeSelector::Css(css) => Ok(css),
            NativeSelector::XPath(_) => Err(ElementError::InvalidLocator(format!(
                "id '{}' did not lower to css",
                id
            ))),
        }
    }

    pub async fn click_checkbox_by_id(&self, id: &str) -> ElementResult<()> {
        self.click_decorated_input(&Self::id_css(id)?).await
    }

    pub async fn click_checkbox_by_css(&self, css: &str) -> ElementResult<()> {
        self.click_decorated_input(css).await
    }

    pub async fn click_radio_by_id(&self, id: &str) -> ElementResult<()> {
        self.click_decorated_input(&Self::id_css(id)?).await
    }

    pub async fn click_radio_by_css(&self, css: &str) -> ElementResult<()> {
        self.click_decorated_input(css).await
    }

    /// Clear the field, then type `text`
    pub async fn send_keys_within(&self, locator: &Locator, text: &str, wait: Duration) -> ElementResult<()> {
        let element = self.element_within(locator, wait).await?;
        self.driver.clear(&element).await?;
        self.driver.type_text(&element, text).await
    }

    pub async fn send_keys(&self, locator: &Locator, text: &str) -> ElementResult<()> {
        self.send_keys_within(locator, text, self.settings.default_wait).await
    }

    // --- hide waits ----------------------------------------------------

    /// Budget of `total`, polling every `interval` (shortened to `total` if longer)
    fn hide_budget(total: Duration, interval: Duration) -> ElementResult<PollBudget> {
        PollBudget::new(total, interval.min(total))
    }

    /// Wait for an AngularJS element to gain the `ng-hide` class
    pub async fn wait_angular_hidden(&self, locator: &Locator) -> ElementResult<WaitOutcome> {
        self.wait_angular_hidden_within(locator, self.settings.hide_timeout).await
    }

    pub async fn wait_angular_hidden_within(
        &self,
        locator: &Locator,
        total: Duration,
    ) -> ElementResult<WaitOutcome> {
        let budget = Self::hide_budget(total, self.settings.hide_poll)?;
        let element = self.element(locator).await?;
        let outcome = wait_for_marker(&self.driver, &element, &HideMarker::ng_hide(), &budget).await?;
        info!("ng-hide wait on {}: {:?}", locator, outcome);
        Ok(outcome)
    }

    /// `ng-hide` wait on a child of `parent`, polling fast at first
    ///
    /// Polls every `child_hide_poll` and switches to
    /// `child_hide_escalated_poll` after `child_hide_escalate_after` polls.
    pub async fn wait_angular_child_hidden(
        &self,
        parent: &D::Element,
        locator: &Locator,
        total: Duration,
    ) -> ElementResult<WaitOutcome> {
        let budget = Self::hide_budget(total, self.settings.child_hide_poll)?.escalating(
            self.settings.child_hide_escalate_after,
            self.settings.child_hide_escalated_poll,
        )?;
        let element = self.child_element(parent, locator).await?;
        let outcome = wait_for_marker(&self.driver, &element, &HideMarker::ng_hide(), &budget).await?;
        info!("ng-hide wait on child {}: {:?}", locator, outcome);
        Ok(outcome)
    }

    /// Wait for the element's inline style to contain `display:none;`
    pub async fn wait_hidden_by_display(&self, locator: &Locator) -> ElementResult<WaitOutcome> {
        self.wait_hidden_by_display_within(locator, self.settings.hide_timeout).await
    }

    pub async fn wait_hidden_by_display_within(
        &self,
        locator: &Locator,
        total: Duration,
    ) -> ElementResult<WaitOutcome> {
        let budget = Self::hide_budget(total, self.settings.hide_poll)?;
        let element = self.element(locator).await?;
        let outcome =
            wait_for_marker(&self.driver, &element, &HideMarker::display_none(), &budget).await?;
        debug!("display:none wait on {}: {:?}", locator, outcome);
        Ok(outcome)
    }
}
