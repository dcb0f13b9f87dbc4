//! Headless confirmation dialog.
//!
//! There is no UI in the service binary, so `AutoConfirmDialog` answers
//! every dialog with a fixed verdict.  `show` only queues the request; the
//! service loop drains the queue with [`AutoConfirmDialog::take_decisions`]
//! and feeds each verdict back through `complete_confirmation`, just as a
//! real dialog's callback would.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use clickgate_core::{CallerInfo, ComponentDescriptor, ComponentId, ComponentType};
use tracing::info;

use crate::application::report_click::ConfirmationDialog;

pub struct AutoConfirmDialog {
    confirm_types: Vec<ComponentType>,
    accept: bool,
    shown: Mutex<VecDeque<ComponentId>>,
}

impl AutoConfirmDialog {
    /// `confirm_types` lists the component types that need confirmation;
    /// every dialog is answered with `accept`.
    pub fn new(confirm_types: Vec<ComponentType>, accept: bool) -> Self {
        Self {
            confirm_types,
            accept,
            shown: Mutex::new(VecDeque::new()),
        }
    }

    /// Removes and returns the verdicts of every dialog shown so far.
    pub fn take_decisions(&self) -> Vec<(ComponentId, bool)> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|sc_id| (sc_id, self.accept))
            .collect()
    }
}

impl ConfirmationDialog for AutoConfirmDialog {
    fn needs_confirmation(&self, _caller: &CallerInfo, descriptor: &ComponentDescriptor) -> bool {
        self.confirm_types.contains(&descriptor.component_type)
    }

    fn show(
        &self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), String> {
        info!(
            sc_id,
            pid = caller.pid,
            component_type = %descriptor.component_type,
            accept = self.accept,
            "auto-answering confirmation dialog"
        );
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(sc_id);
        Ok(())
    }
}
