//! Cooperative cancellation for batch operations
//!
//! A [`CancelToken`] is shared between whoever may request cancellation
//! (the signal handler, a test, a wrapping client) and the engines, which
//! check it between units of work. Work already in flight finishes; work
//! not yet started is reported as not started.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Why a batch was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// Requested programmatically
    User,
    /// SIGINT/SIGTERM
    Signal,
}

impl CancelReason {
    fn code(self) -> u8 {
        match self {
            CancelReason::User => 1,
            CancelReason::Signal => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CancelReason::User),
            2 => Some(CancelReason::Signal),
            _ => None,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::User => write!(f, "USER"),
            CancelReason::Signal => write!(f, "SIGNAL"),
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    reason: Arc<AtomicU8>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Only the first reason is kept.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self
            .reason
            .compare_exchange(0, reason.code(), Ordering::SeqCst, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<CancelReason> {
        CancelReason::from_code(self.reason.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_initial() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel(CancelReason::User);

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::User));
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel(CancelReason::Signal);
        token.cancel(CancelReason::User);
        assert_eq!(token.reason(), Some(CancelReason::Signal));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(CancelReason::Signal.to_string(), "SIGNAL");
        assert_eq!(
            serde_json::to_string(&CancelReason::User).unwrap(),
            "\"USER\""
        );
    }
}
