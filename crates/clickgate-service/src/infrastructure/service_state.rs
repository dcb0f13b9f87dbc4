//! Shared service state: the composition root behind the binary.
//!
//! ```text
//! ServiceConfig
//!  ├─ [enhance] → build_catalog → EnhanceAdapter ─┐
//!  ├─ [dialog]  → AutoConfirmDialog               ├─ ComponentRegistry (Mutex)
//!  └─ InMemoryPermissionStore ────────────────────┘
//!                 ReportClickUseCase(dialog, clock, TracingAuditSink)
//! ```
//!
//! The registry lock is held only to add, remove or look up components.  A
//! click runs on the blocking pool against its own entry, so clicks on
//! different components verify in parallel.

use std::sync::Arc;

use clickgate_core::trust::{MonotonicClock, SystemMonotonicClock};
use clickgate_core::{
    BackendCatalog, CallerInfo, CallsiteToken, ClickEvent, ComponentDescriptor, ComponentId,
    EnhanceAdapter, SecCompError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::manage_components::ComponentRegistry;
use crate::application::report_click::{ClickOutcome, ReportClickUseCase};
use crate::infrastructure::audit::TracingAuditSink;
use crate::infrastructure::backends::build_catalog;
use crate::infrastructure::dialog::AutoConfirmDialog;
use crate::infrastructure::dump::{dump, StaticForegroundTracker};
use crate::infrastructure::permissions::InMemoryPermissionStore;
use crate::infrastructure::storage::config::{DialogConfig, ServiceConfig};

pub struct ServiceState {
    adapter: Arc<EnhanceAdapter>,
    registry: Mutex<ComponentRegistry>,
    report_click: Arc<ReportClickUseCase>,
    dialog: Arc<AutoConfirmDialog>,
    permissions: Arc<InMemoryPermissionStore>,
    foreground: StaticForegroundTracker,
}

impl ServiceState {
    /// Builds the state described by `config`, on the system clock.
    pub fn from_config(config: &ServiceConfig) -> Arc<Self> {
        Self::with_parts(
            &config.dialog,
            build_catalog(&config.enhance),
            Arc::new(SystemMonotonicClock::new()),
        )
    }

    /// Builds the state from an explicit catalog and clock.
    pub fn with_parts(
        dialog: &DialogConfig,
        catalog: BackendCatalog,
        clock: Arc<dyn MonotonicClock>,
    ) -> Arc<Self> {
        let adapter = Arc::new(EnhanceAdapter::new(catalog));
        let permissions = Arc::new(InMemoryPermissionStore::new());
        let dialog = Arc::new(AutoConfirmDialog::new(
            dialog.confirm_types.clone(),
            dialog.auto_accept,
        ));
        let registry = ComponentRegistry::new(Arc::clone(&adapter), permissions.clone());
        let report_click = Arc::new(ReportClickUseCase::new(
            dialog.clone(),
            clock,
            Arc::new(TracingAuditSink),
        ));

        Arc::new(Self {
            adapter,
            registry: Mutex::new(registry),
            report_click,
            dialog,
            permissions,
            foreground: StaticForegroundTracker::new(),
        })
    }

    pub fn adapter(&self) -> &EnhanceAdapter {
        &self.adapter
    }

    pub fn permissions(&self) -> &InMemoryPermissionStore {
        &self.permissions
    }

    pub fn foreground(&self) -> &StaticForegroundTracker {
        &self.foreground
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Starts the service backend and turns on input enhancement.
    pub fn start(&self) {
        self.adapter.start_service();
        if let Err(e) = self.adapter.enable_input_enhance() {
            warn!("failed to enable input enhancement: {e}");
        }
        for (role, status) in self.adapter.status() {
            info!(%role, %status, "enhance backend");
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.adapter.disable_input_enhance() {
            warn!("failed to disable input enhancement: {e}");
        }
        self.adapter.exit_service();
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    pub async fn register(
        &self,
        caller: CallerInfo,
        component_info: &str,
        callsite: CallsiteToken,
    ) -> Result<ComponentId, SecCompError> {
        self.registry
            .lock()
            .await
            .register(caller, component_info, callsite)
    }

    pub async fn update(
        &self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        component_info: &str,
    ) -> Result<(), SecCompError> {
        self.registry
            .lock()
            .await
            .update(sc_id, caller, component_info)
    }

    pub async fn unregister(
        &self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        callsite: CallsiteToken,
    ) -> Result<(), SecCompError> {
        self.registry
            .lock()
            .await
            .unregister(sc_id, caller, callsite)
    }

    pub async fn report_click(
        &self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        reported: &ComponentDescriptor,
        event: &ClickEvent,
    ) -> Result<ClickOutcome, SecCompError> {
        let target = self.registry.lock().await.click_target(sc_id)?;
        let use_case = Arc::clone(&self.report_click);
        let caller = *caller;
        let reported = reported.clone();
        let event = event.clone();
        tokio::task::spawn_blocking(move || {
            use_case.report_click_on(&target, &caller, &reported, &event)
        })
        .await
        .map_err(|e| {
            SecCompError::CallbackOperationFailed(format!("click verification task failed: {e}"))
        })?
    }

    pub async fn process_died(&self, pid: i32) -> usize {
        self.registry.lock().await.on_process_died(pid)
    }

    /// Applies every dialog verdict queued since the last call and returns
    /// how many were applied.
    pub async fn pump_dialog(&self) -> usize {
        let decisions = self.dialog.take_decisions();
        if decisions.is_empty() {
            return 0;
        }
        let registry = self.registry.lock().await;
        let mut applied = 0;
        for (sc_id, accepted) in decisions {
            match self
                .report_click
                .complete_confirmation(&registry, sc_id, accepted)
            {
                Ok(granted) => {
                    debug!(sc_id, granted, "confirmation applied");
                    applied += 1;
                }
                Err(e) => warn!(sc_id, "dropping confirmation verdict: {e}"),
            }
        }
        applied
    }

    pub async fn component_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Renders the diagnostic dump selected by `args`.
    pub async fn dump(&self, args: &[String]) -> String {
        let registry = self.registry.lock().await;
        dump(args, &registry, &self.foreground)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
