//! ReportClickUseCase: turns a reported click into a temporary permission.
//!
//! ```text
//! report_click(sc_id, caller, reported descriptor, event)
//!  ├─ lookup            → ComponentNotFound
//!  ├─ ownership         → PermissionDenied
//!  ├─ pending dialog?   → PendingConfirmation
//!  ├─ descriptor match  → ComponentInfoMismatch
//!  ├─ check_touch_info  → ClickVerificationFailed     (no lock held)
//!  ├─ re-check entry    → ComponentNotFound / PendingConfirmation / ComponentInfoMismatch
//!  └─ confirmation needed?
//!       ├─ yes: show dialog, state = PendingConfirmation
//!       │        ... complete_confirmation(sc_id, accepted)
//!       └─ no:  grant
//! ```
//!
//! Verification runs on a snapshot of the record, so a slow backend only
//! delays the click it is verifying.  The entry lock is taken again for the
//! transition, and anything that changed the entry meanwhile (removal, an
//! update, a concurrent click reaching the dialog first) wins.
//!
//! Every failure leaves the record's grant state untouched.  The use case
//! depends only on traits; the dialog, clock and audit sink are injected.

use std::sync::Arc;

use clickgate_core::trust::{AuditSink, MonotonicClock, TrustEvent, TrustState, VerifyContext};
use clickgate_core::{CallerInfo, ClickEvent, ComponentDescriptor, ComponentId, SecCompError};
use tracing::{error, info, warn};

use crate::application::manage_components::{
    check_owner, lock_entry, ClickTarget, ComponentRegistry, RegistryEntry,
};

/// The user-confirmation dialog, owned outside the trust core.
///
/// `show` only starts the dialog; its verdict arrives later through
/// [`ReportClickUseCase::complete_confirmation`].
pub trait ConfirmationDialog: Send + Sync {
    fn needs_confirmation(&self, caller: &CallerInfo, descriptor: &ComponentDescriptor) -> bool;

    fn show(
        &self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), String>;
}

/// Result of a successfully verified click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Granted,
    AwaitingConfirmation,
}

pub struct ReportClickUseCase {
    dialog: Arc<dyn ConfirmationDialog>,
    clock: Arc<dyn MonotonicClock>,
    audit: Arc<dyn AuditSink>,
}

impl ReportClickUseCase {
    pub fn new(
        dialog: Arc<dyn ConfirmationDialog>,
        clock: Arc<dyn MonotonicClock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            dialog,
            clock,
            audit,
        }
    }

    /// Verifies a click on `sc_id` and grants or asks for confirmation.
    ///
    /// # Errors
    ///
    /// See the module diagram.  A grant whose bookkeeping fails returns the
    /// bookkeeper's error; the record is then left granted.
    pub fn report_click(
        &self,
        registry: &ComponentRegistry,
        sc_id: ComponentId,
        caller: &CallerInfo,
        reported: &ComponentDescriptor,
        event: &ClickEvent,
    ) -> Result<ClickOutcome, SecCompError> {
        let target = registry.click_target(sc_id)?;
        self.report_click_on(&target, caller, reported, event)
    }

    /// [`report_click`](Self::report_click) on handles already detached
    /// from the registry.
    ///
    /// # Errors
    ///
    /// As for [`report_click`](Self::report_click).
    pub fn report_click_on(
        &self,
        target: &ClickTarget,
        caller: &CallerInfo,
        reported: &ComponentDescriptor,
        event: &ClickEvent,
    ) -> Result<ClickOutcome, SecCompError> {
        let sc_id = target.sc_id;
        let snapshot = {
            let entry = lock_entry(&target.entry);
            precheck(&entry, caller)?;
            if !entry.record.compare_basic_info(reported) {
                warn!(sc_id, "click rejected: reported component info mismatch");
                return Err(SecCompError::ComponentInfoMismatch(sc_id));
            }
            entry.record.clone()
        };

        let ctx = VerifyContext {
            adapter: target.adapter.as_ref(),
            clock: self.clock.as_ref(),
            audit: self.audit.as_ref(),
        };
        if !snapshot.check_touch_info(event, &ctx) {
            return Err(SecCompError::ClickVerificationFailed(sc_id));
        }

        let mut entry = lock_entry(&target.entry);
        precheck(&entry, caller)?;
        if !entry.record.compare_basic_info(snapshot.descriptor()) {
            warn!(sc_id, "click dropped: component changed during verification");
            return Err(SecCompError::ComponentInfoMismatch(sc_id));
        }

        let needs_confirmation = self
            .dialog
            .needs_confirmation(caller, entry.record.descriptor());
        if needs_confirmation {
            self.dialog
                .show(sc_id, caller, entry.record.descriptor())
                .map_err(|reason| {
                    error!(sc_id, "confirmation dialog failed to start: {reason}");
                    SecCompError::CallbackOperationFailed(reason)
                })?;
        }

        entry.transition(TrustEvent::ClickVerified { needs_confirmation })?;
        if needs_confirmation {
            info!(sc_id, "click verified, awaiting user confirmation");
            return Ok(ClickOutcome::AwaitingConfirmation);
        }
        entry.record.grant(target.bookkeeper.as_ref())?;
        Ok(ClickOutcome::Granted)
    }

    /// Applies the dialog's verdict for `sc_id`.  Returns whether the
    /// permission was granted.
    ///
    /// # Errors
    ///
    /// [`SecCompError::ComponentNotFound`] if the component went away while
    /// the dialog was open, [`SecCompError::InvalidTransition`] if no dialog
    /// was pending, or the bookkeeper's grant error.
    pub fn complete_confirmation(
        &self,
        registry: &ComponentRegistry,
        sc_id: ComponentId,
        accepted: bool,
    ) -> Result<bool, SecCompError> {
        let target = registry.click_target(sc_id)?;
        let mut entry = lock_entry(&target.entry);
        if entry.is_removed() {
            return Err(SecCompError::ComponentNotFound(sc_id));
        }
        let event = if accepted {
            TrustEvent::ConfirmationAccepted
        } else {
            TrustEvent::ConfirmationRejected
        };
        entry.transition(event)?;
        if !accepted {
            info!(sc_id, "user declined the permission");
            return Ok(false);
        }
        entry.record.grant(target.bookkeeper.as_ref())?;
        Ok(true)
    }
}

/// Checks that apply both before and after verification.
fn precheck(entry: &RegistryEntry, caller: &CallerInfo) -> Result<(), SecCompError> {
    let sc_id = entry.record.sc_id();
    if entry.is_removed() {
        return Err(SecCompError::ComponentNotFound(sc_id));
    }
    check_owner(entry, caller)?;
    if entry.state == TrustState::PendingConfirmation {
        warn!(sc_id, "click ignored: confirmation already pending");
        return Err(SecCompError::PendingConfirmation(sc_id));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
