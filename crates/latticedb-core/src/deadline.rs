//! Deadlines for public operations.
//!
//! Every public operation accepts a [`Deadline`]. Expiry is checked at CG
//! iteration boundaries and around I/O; on expiry the in-flight result is
//! discarded and no receipt is emitted.

use std::time::{Duration, Instant};

use crate::error::CoreError;

/// An optional absolute deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline; the operation may run to completion.
    pub const fn none() -> Self {
        Self(None)
    }

    /// A deadline at a fixed instant.
    pub const fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// A deadline this far in the future.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Fail with [`CoreError::DeadlineExceeded`] if the deadline has passed.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.expired() {
            Err(CoreError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
