//! Trust lifecycle of a registered component.
//!
//! ```text
//!                 ClickVerified{needs_confirmation: true}
//!   Registered ───────────────────────────────► PendingConfirmation
//!     ▲   │                                        │          │
//!     │   │ ClickVerified{false}   Accepted ◄──────┘          │ Rejected
//!     │   ▼                                                   ▼
//!     │ Granted ◄──────────────────────────────────────  Registered
//!     │   │
//!     └───┘ Revoked
//!
//!   any state ── Unregistered ──► Unregistered (terminal)
//! ```
//!
//! A click arriving while a dialog is outstanding is refused with
//! [`SecCompError::PendingConfirmation`]; `Granted` may be re-entered by
//! another verified click.

use std::fmt;

use crate::domain::component::ComponentId;
use crate::error::SecCompError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustState {
    #[default]
    Registered,
    PendingConfirmation,
    Granted,
    Unregistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustEvent {
    /// `check_touch_info` accepted a click.
    ClickVerified { needs_confirmation: bool },
    ConfirmationAccepted,
    ConfirmationRejected,
    /// Explicit revoke, owner death, or an invalidating descriptor update.
    Revoked,
    Unregistered,
}

impl fmt::Display for TrustState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrustState::Registered => "registered",
            TrustState::PendingConfirmation => "pending_confirmation",
            TrustState::Granted => "granted",
            TrustState::Unregistered => "unregistered",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TrustEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustEvent::ClickVerified { needs_confirmation } => {
                write!(f, "click_verified(needs_confirmation={needs_confirmation})")
            }
            TrustEvent::ConfirmationAccepted => f.write_str("confirmation_accepted"),
            TrustEvent::ConfirmationRejected => f.write_str("confirmation_rejected"),
            TrustEvent::Revoked => f.write_str("revoked"),
            TrustEvent::Unregistered => f.write_str("unregistered"),
        }
    }
}

impl TrustState {
    /// Computes the state after `event` for component `sc_id`.
    ///
    /// # Errors
    ///
    /// [`SecCompError::PendingConfirmation`] for a click while a dialog is
    /// outstanding, [`SecCompError::InvalidTransition`] for any other event
    /// the current state does not accept.
    pub fn apply(self, sc_id: ComponentId, event: TrustEvent) -> Result<TrustState, SecCompError> {
        use TrustEvent as E;
        use TrustState as S;

        match (self, event) {
            (S::Unregistered, _) => Err(self.invalid(event)),
            (_, E::Unregistered) => Ok(S::Unregistered),

            (S::PendingConfirmation, E::ClickVerified { .. }) => {
                Err(SecCompError::PendingConfirmation(sc_id))
            }
            (_, E::ClickVerified { needs_confirmation: true }) => Ok(S::PendingConfirmation),
            (_, E::ClickVerified { needs_confirmation: false }) => Ok(S::Granted),

            (S::PendingConfirmation, E::ConfirmationAccepted) => Ok(S::Granted),
            (S::PendingConfirmation, E::ConfirmationRejected) => Ok(S::Registered),

            (S::Granted, E::Revoked) | (S::Registered, E::Revoked) => Ok(S::Registered),
            (S::PendingConfirmation, E::Revoked) => Ok(S::Registered),

            (_, E::ConfirmationAccepted) | (_, E::ConfirmationRejected) => {
                Err(self.invalid(event))
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self == TrustState::Unregistered
    }

    fn invalid(self, event: TrustEvent) -> SecCompError {
        SecCompError::InvalidTransition {
            from: self.to_string(),
            event: event.to_string(),
        }
    }
}
