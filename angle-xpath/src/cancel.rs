use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Debug)]
struct Inner {
    cancelled: Cell<bool>,
    deadline: Option<Instant>,
}

/// A cooperative cancellation token.
///
/// Cloned tokens share state. Every axis walk, predicate loop, template
/// activation and built-in entry polls [`Cancellation::check`]; once the
/// token fires the active evaluation unwinds with [`Error::Cancelled`].
#[derive(Debug, Clone)]
pub struct Cancellation {
    inner: Rc<Inner>,
}

impl Cancellation {
    pub fn new() -> Self {
        Cancellation {
            inner: Rc::new(Inner {
                cancelled: Cell::new(false),
                deadline: None,
            }),
        }
    }

    /// A token that fires once `timeout` has elapsed.
    pub fn with_deadline(timeout: Duration) -> Self {
        Cancellation {
            inner: Rc::new(Inner {
                cancelled: Cell::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.get() {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_cancel() {
        let token = Cancellation::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert_eq!(token.check(), Err(Error::Cancelled));
    }

    #[test]
    fn test_deadline() {
        let token = Cancellation::with_deadline(Duration::from_secs(0));
        assert!(token.check().is_err());
        let token = Cancellation::with_deadline(Duration::from_secs(3600));
        assert!(token.check().is_ok());
    }
}
