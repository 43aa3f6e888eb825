//! Driver seam
//!
//! Everything the element helper needs from a browser driver, expressed over
//! native selectors. `chromiumoxide::Page` implements it in [`chromium`].

mod chromium;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::locator::NativeSelector;
use crate::utils::errors::ElementResult;

/// A page that can find elements and act on them
///
/// Lookups return an empty list when nothing matches; an `Err` always means
/// the driver itself failed.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Opaque handle into the page's DOM
    type Element: Send + Sync;

    async fn find_all(&self, selector: &NativeSelector) -> ElementResult<Vec<Self::Element>>;

    /// Lookup evaluated relative to `parent`
    async fn find_all_within(
        &self,
        parent: &Self::Element,
        selector: &NativeSelector,
    ) -> ElementResult<Vec<Self::Element>>;

    /// `None` when the attribute is not set
    async fn attribute(&self, element: &Self::Element, name: &str) -> ElementResult<Option<String>>;

    /// Rendered text
    async fn text(&self, element: &Self::Element) -> ElementResult<String>;

    async fn is_displayed(&self, element: &Self::Element) -> ElementResult<bool>;

    async fn click(&self, element: &Self::Element) -> ElementResult<()>;

    /// Empty an input or textarea
    async fn clear(&self, element: &Self::Element) -> ElementResult<()>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> ElementResult<()>;

    async fn scroll_into_view(&self, element: &Self::Element) -> ElementResult<()>;
}
