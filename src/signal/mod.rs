//! Signal handling for graceful cancellation (SIGINT/SIGTERM)
//!
//! On the first signal the shared [`CancelToken`] is cancelled: the
//! running batch stops before its next definition and still reports what
//! it finished. A second signal exits immediately with code 80.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::cancel::{CancelReason, CancelToken};
use crate::summary::ExitCode;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    token: CancelToken,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state that cancels `token` on the first signal
    pub fn with_token(token: CancelToken) -> Self {
        Self {
            token,
            signal_count: AtomicU8::new(0),
        }
    }

    /// Token cancelled by the first signal
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Handle a signal (SIGINT/SIGTERM)
    ///
    /// Returns the action to take
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.token.cancel(CancelReason::Signal);
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: finish the current definition, then stop
    InitiateCancellation,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Installs the process signal handler
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new(token: CancelToken) -> Self {
        Self {
            state: Arc::new(SignalState::with_token(token)),
        }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install handlers for SIGINT and SIGTERM.
    ///
    /// Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                eprintln!("\nReceived interrupt, finishing the current flow (Ctrl-C again to abort)...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately.");
                std::process::exit(ExitCode::Cancelled.as_i32());
            }
            SignalAction::Ignore => {}
        })
    }
}
