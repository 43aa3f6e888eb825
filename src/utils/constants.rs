//! Shared configuration constants for element lookups and waits
//!
//! Default values used by the wait configuration and the element helper so
//! the same numbers are not repeated across modules.

/// Default explicit wait for element lookups (seconds)
pub const DEFAULT_WAIT_SECS: u64 = 15;

/// Implicit wait restored by `implicit_wait_on()` (seconds)
pub const DEFAULT_IMPLICIT_WAIT_SECS: u64 = 15;

/// Poll interval used by explicit waits (milliseconds)
///
/// Matches the WebDriverWait default of the Selenium bindings.
pub const DEFAULT_EXPLICIT_POLL_MS: u64 = 500;

/// Total budget for hide waits (seconds)
pub const DEFAULT_HIDE_TIMEOUT_SECS: u64 = 120;

/// Poll interval for hide waits (seconds)
pub const DEFAULT_HIDE_POLL_SECS: u64 = 5;

/// Initial poll interval of the child-element hide wait (seconds)
pub const DEFAULT_CHILD_HIDE_POLL_SECS: u64 = 1;

/// Interval the child-element hide wait escalates to (seconds)
pub const DEFAULT_CHILD_HIDE_ESCALATED_POLL_SECS: u64 = 5;

/// Number of polls before the child-element hide wait escalates
pub const DEFAULT_CHILD_HIDE_ESCALATE_AFTER: u32 = 5;

/// Class token AngularJS adds to hidden elements
pub const NG_HIDE_CLASS: &str = "ng-hide";

/// Inline style marker of a hidden element, whitespace already stripped
pub const DISPLAY_NONE_STYLE: &str = "display:none;";

/// Attribute used to tag nodes matched by a scoped XPath lookup
pub const XPATH_TAG_ATTRIBUTE: &str = "data-kodegen-xpath";
