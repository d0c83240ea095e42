//! One-shot view over a client's QR channel.

use tracing::trace;

use crate::messaging::{QrEvent, QrEvents};

/// Terminal result of a pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The phone scanned the code.
    Paired,
    /// Every code expired unscanned.
    Expired,
    /// The messaging network reported an error.
    Failed(String),
    /// The channel closed without a terminal event.
    Closed,
}

/// Yields the single terminal event of a login, skipping code rotations.
#[derive(Debug)]
pub struct LoginNotifier {
    events: QrEvents,
}

impl LoginNotifier {
    pub fn new(events: QrEvents) -> Self {
        Self { events }
    }

    /// Wait for the terminal event. Consumes the notifier.
    ///
    /// Unbounded on its own; callers bound it with the pending login's deadline.
    pub async fn wait(mut self) -> LoginOutcome {
        while let Some(event) = self.events.recv().await {
            match event {
                QrEvent::Code(_) => trace!("Skipping rotated login code"),
                QrEvent::Success => return LoginOutcome::Paired,
                QrEvent::Timeout => return LoginOutcome::Expired,
                QrEvent::Error(reason) => return LoginOutcome::Failed(reason),
            }
        }
        LoginOutcome::Closed
    }
}
