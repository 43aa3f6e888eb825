// Shared utilities for element waits
pub mod constants;
pub mod errors;
pub mod timeout;
pub mod wait_until;
