use std::time::Duration;

use thiserror::Error;

/// Errors produced while resolving or waiting on page elements
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid poll budget: {0}")]
    InvalidBudget(String),

    #[error("No element found for {0}")]
    NotFound(String),

    #[error("Timed out after {}ms waiting for {what}", timeout.as_millis())]
    Timeout { what: String, timeout: Duration },

    /// The handle points at a node that has left the document
    #[error("Stale element: {0}")]
    Stale(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

impl ElementError {
    /// True when the element is not (or no longer) on the page, as opposed
    /// to a broken driver or a bad request
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            ElementError::NotFound(_) | ElementError::Timeout { .. } | ElementError::Stale(_)
        )
    }
}

/// CDP error texts for a node id or remote object that no longer resolves
const STALE_NODE_MESSAGES: &[&str] = &[
    "No node with given id found",
    "Could not find node with given id",
    "Node with given id does not belong to the document",
    "Cannot find context with specified id",
    "Could not find object with given id",
];

fn is_stale_node_message(message: &str) -> bool {
    STALE_NODE_MESSAGES.iter().any(|m| message.contains(m))
}

/// Implement From<chromiumoxide::error::CdpError> for ElementError
impl From<chromiumoxide::error::CdpError> for ElementError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let message = err.to_string();
        if is_stale_node_message(&message) {
            ElementError::Stale(message)
        } else {
            ElementError::Driver(message)
        }
    }
}

pub type ElementResult<T> = Result<T, ElementError>;
