//! `PageDriver` over a chromiumoxide page
//!
//! CSS lookups go straight to `querySelectorAll`. XPath lookups are
//! evaluated in the page, the matches are tagged with a one-off attribute,
//! collected with a CSS lookup for that tag, and untagged again. This keeps
//! XPath strict (CDP `DOM.performSearch` also matches plain text) and works
//! the same way relative to a parent element.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::element::Element;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::driver::PageDriver;
use crate::locator::NativeSelector;
use crate::utils::constants::XPATH_TAG_ATTRIBUTE;
use crate::utils::errors::{ElementError, ElementResult};

/// JS body that tags every element node of `__snapshot` and returns the count
fn tag_snapshot_js(xpath: &str, context: &str, token: &str) -> String {
    // serde_json gives us correctly escaped JS string literals
    let xpath = Value::String(xpath.to_string());
    let attr = Value::String(XPATH_TAG_ATTRIBUTE.to_string());
    let token = Value::String(token.to_string());
    format!(
        "const snap = document.evaluate({xpath}, {context}, null, \
         XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
         let tagged = 0; \
         for (let i = 0; i < snap.snapshotLength; i++) {{ \
             const node = snap.snapshotItem(i); \
             if (node.nodeType === Node.ELEMENT_NODE) {{ node.setAttribute({attr}, {token}); tagged++; }} \
         }} \
         return tagged;"
    )
}

fn tag_selector(token: &str) -> String {
    format!("[{}=\"{}\"]", XPATH_TAG_ATTRIBUTE, token)
}

fn untag_js(token: &str) -> String {
    let selector = Value::String(tag_selector(token));
    let attr = Value::String(XPATH_TAG_ATTRIBUTE.to_string());
    format!("document.querySelectorAll({selector}).forEach(n => n.removeAttribute({attr}))")
}

/// Run a JS function on `element` and return its value
async fn call_on(element: &Element, function: &str) -> ElementResult<Option<Value>> {
    let returns = element.call_js_fn(function, false).await?;
    if let Some(details) = returns.exception_details {
        return Err(ElementError::Driver(format!(
            "script failed on element: {}",
            details.text
        )));
    }
    Ok(returns.result.value)
}

/// Collect tagged nodes and always remove the tags afterwards
async fn collect_tagged(page: &Page, token: &str, tagged: u64) -> ElementResult<Vec<Element>> {
    let found = if tagged == 0 {
        Ok(Vec::new())
    } else {
        page.find_elements(tag_selector(token))
            .await
            .map_err(ElementError::from)
    };

    if let Err(e) = page.evaluate(untag_js(token)).await {
        warn!("Failed to remove xpath tags {}: {}", token, e);
    }

    found
}

#[async_trait]
impl PageDriver for Page {
    type Element = Element;

    async fn find_all(&self, selector: &NativeSelector) -> ElementResult<Vec<Element>> {
        match selector {
            NativeSelector::Css(css) => Ok(self.find_elements(css.as_str()).await?),
            NativeSelector::XPath(xpath) => {
                let token = Uuid::new_v4().to_string();
                let script = format!(
                    "(() => {{ {} }})()",
                    tag_snapshot_js(xpath, "document", &token)
                );
                let tagged = self
                    .evaluate(script)
                    .await?
                    .value()
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                debug!("xpath {} matched {} element(s)", xpath, tagged);
                collect_tagged(self, &token, tagged).await
            }
        }
    }

    async fn find_all_within(
        &self,
        parent: &Element,
        selector: &NativeSelector,
    ) -> ElementResult<Vec<Element>> {
        match selector {
            NativeSelector::Css(css) => Ok(parent.find_elements(css.as_str()).await?),
            NativeSelector::XPath(xpath) => {
                let token = Uuid::new_v4().to_string();
                let function = format!(
                    "function() {{ {} }}",
                    tag_snapshot_js(xpath, "this", &token)
                );
                let tagged = call_on(parent, &function)
                    .await?
                    .as_ref()
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                collect_tagged(self, &token, tagged).await
            }
        }
    }

    async fn attribute(&self, element: &Element, name: &str) -> ElementResult<Option<String>> {
        Ok(element.attribute(name).await?)
    }

    async fn text(&self, element: &Element) -> ElementResult<String> {
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    async fn is_displayed(&self, element: &Element) -> ElementResult<bool> {
        let shown = call_on(
            element,
            "function() { \
                 const style = window.getComputedStyle(this); \
                 if (style.display === 'none' || style.visibility === 'hidden' \
                     || style.visibility === 'collapse' || Number(style.opacity) === 0) { return false; } \
                 const rect = this.getBoundingClientRect(); \
                 return rect.width > 0 && rect.height > 0; \
             }",
        )
        .await?;
        Ok(shown.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    async fn click(&self, element: &Element) -> ElementResult<()> {
        element.scroll_into_view().await?;
        // Click at the element's point rather than Element::click, which can
        // hang on the IntersectionObserver check
        let point = element.clickable_point().await?;
        self.click(point).await?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> ElementResult<()> {
        call_on(
            element,
            "function() { \
                 this.value = ''; \
                 this.dispatchEvent(new Event('input', { bubbles: true })); \
                 this.dispatchEvent(new Event('change', { bubbles: true })); \
             }",
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, element: &Element, text: &str) -> ElementResult<()> {
        element.focus().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> ElementResult<()> {
        element.scroll_into_view().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_script_quotes_the_xpath() {
        let js = tag_snapshot_js("//a[@title=\"x\"]", "this", "tok");
        assert!(js.contains(r#"document.evaluate("//a[@title=\"x\"]", this,"#));
        assert!(js.contains(r#"node.setAttribute("data-kodegen-xpath", "tok")"#));
    }

    #[test]
    fn untag_script_targets_only_its_token() {
        assert_eq!(
            untag_js("abc"),
            r#"document.querySelectorAll("[data-kodegen-xpath=\"abc\"]").forEach(n => n.removeAttribute("data-kodegen-xpath"))"#
        );
    }
}
