use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::{CoreError, CoreResult};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-call inputs every engine operation receives: the wall-clock instant the
/// call is evaluated at, plus an optional deadline and cancellation token.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub now: NaiveDateTime,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl CallContext {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn current() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Called before and between I/O steps.
    pub fn check(&self) -> CoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(CoreError::deadline_exceeded());
        }
        Ok(())
    }
}
