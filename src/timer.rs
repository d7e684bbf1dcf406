//! One-slot timer.
//!
//! Holds at most one pending token.  Arming while a token is pending
//! replaces it, so the earlier continuation is discarded rather than run.
//! Time is supplied by the caller in seconds; nothing here blocks.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct OneShot<T> {
    pending: Option<(f64, T)>,
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> OneShot<T> {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Schedule `token` to fire `delay` seconds after `now`.
    ///
    /// A non-positive or non-finite delay is rejected with
    /// [`Error::InvalidDelay`] and leaves any pending token untouched.
    pub fn after(&mut self, now: f64, delay: f64, token: T) -> Result<(), Error> {
        if !(delay.is_finite() && delay > 0.0) {
            return Err(Error::InvalidDelay(delay));
        }
        self.pending = Some((now + delay, token));
        Ok(())
    }

    /// Take the token if its deadline has been reached.
    pub fn poll(&mut self, now: f64) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if now >= deadline => self.pending.take().map(|(_, t)| t),
            _ => None,
        }
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, t)| t)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|(d, _)| *d)
    }
}
