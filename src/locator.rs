//! Locator strategies and their translation to driver-native selectors
//!
//! A [`Locator`] pairs one of the eight classic WebDriver strategies with a
//! value. The driver boundary only understands CSS and XPath, so every
//! strategy is lowered once, in [`Locator::to_native`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::errors::{ElementError, ElementResult};

/// How an element is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorStrategy {
    Id,
    ClassName,
    XPath,
    CssSelector,
    Name,
    TagName,
    LinkText,
    PartialLinkText,
}

impl LocatorStrategy {
    pub const ALL: [LocatorStrategy; 8] = [
        LocatorStrategy::Id,
        LocatorStrategy::ClassName,
        LocatorStrategy::XPath,
        LocatorStrategy::CssSelector,
        LocatorStrategy::Name,
        LocatorStrategy::TagName,
        LocatorStrategy::LinkText,
        LocatorStrategy::PartialLinkText,
    ];

    /// Kebab-case name, as accepted by `FromStr` and shown in messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::ClassName => "class-name",
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::CssSelector => "css-selector",
            LocatorStrategy::Name => "name",
            LocatorStrategy::TagName => "tag-name",
            LocatorStrategy::LinkText => "link-text",
            LocatorStrategy::PartialLinkText => "partial-link-text",
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocatorStrategy {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "id" => Ok(LocatorStrategy::Id),
            "class-name" | "classname" | "class" => Ok(LocatorStrategy::ClassName),
            "xpath" => Ok(LocatorStrategy::XPath),
            "css-selector" | "cssselector" | "css" => Ok(LocatorStrategy::CssSelector),
            "name" => Ok(LocatorStrategy::Name),
            "tag-name" | "tagname" | "tag" => Ok(LocatorStrategy::TagName),
            "link-text" | "linktext" => Ok(LocatorStrategy::LinkText),
            "partial-link-text" | "partiallinktext" => Ok(LocatorStrategy::PartialLinkText),
            _ => Err(ElementError::InvalidLocator(format!(
                "unknown locator strategy '{}'",
                s
            ))),
        }
    }
}

/// Selector in a form the driver can run directly
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeSelector {
    Css(String),
    XPath(String),
}

impl fmt::Display for NativeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeSelector::Css(css) => write!(f, "css={}", css),
            NativeSelector::XPath(xpath) => write!(f, "xpath={}", xpath),
        }
    }
}

/// A strategy and the value it is applied to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::ClassName, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::XPath, value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::CssSelector, value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Name, value)
    }

    pub fn tag_name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::TagName, value)
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::LinkText, value)
    }

    pub fn partial_link_text(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::PartialLinkText, value)
    }

    /// Lower this locator to a CSS or XPath selector
    ///
    /// # Errors
    /// `InvalidLocator` for an empty value, a compound class name, or a tag
    /// name that is not a plain identifier.
    pub fn to_native(&self) -> ElementResult<NativeSelector> {
        if self.value.trim().is_empty() {
            return Err(ElementError::InvalidLocator(format!(
                "{} locator has an empty value",
                self.strategy
            )));
        }

        let value = self.value.as_str();
        let native = match self.strategy {
            LocatorStrategy::Id => NativeSelector::Css(format!("[id={}]", css_string(value))),
            LocatorStrategy::ClassName => {
                let class = value.trim();
                if class.split_whitespace().nth(1).is_some() {
                    return Err(ElementError::InvalidLocator(format!(
                        "compound class names are not permitted: '{}'",
                        value
                    )));
                }
                NativeSelector::Css(format!("[class~={}]", css_string(class)))
            }
            LocatorStrategy::XPath => NativeSelector::XPath(value.to_string()),
            LocatorStrategy::CssSelector => NativeSelector::Css(value.to_string()),
            LocatorStrategy::Name => NativeSelector::Css(format!("[name={}]", css_string(value))),
            LocatorStrategy::TagName => {
                let tag = value.trim();
                if !tag
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                {
                    return Err(ElementError::InvalidLocator(format!(
                        "invalid tag name '{}'",
                        value
                    )));
                }
                NativeSelector::Css(tag.to_string())
            }
            LocatorStrategy::LinkText => NativeSelector::XPath(format!(
                "//a[normalize-space(string(.))={}]",
                xpath_literal(value.trim())
            )),
            LocatorStrategy::PartialLinkText => NativeSelector::XPath(format!(
                "//a[contains(string(.),{})]",
                xpath_literal(value)
            )),
        };

        Ok(native)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}

/// Quote a value as a CSS string
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            // Newlines must be written as a hex escape inside CSS strings
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Quote a value as an XPath 1.0 literal
///
/// XPath has no escape sequences, so a value holding both quote kinds is
/// split and rebuilt with `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }

    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
