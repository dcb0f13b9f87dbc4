//! ComponentRegistry: the keyed collection of trust records.
//!
//! Owns one [`TrustRecord`] plus its [`TrustState`] per registered security
//! component, allocates component ids and keeps the enhance adapter's
//! per-process and per-component hooks in step with the collection.
//!
//! Each entry sits behind its own mutex.  The service locks the registry
//! only to add, remove or look up entries; a click holds just the lock of
//! the component it targets, and not while the backend verifies it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickgate_core::domain::id_allocator::ComponentIdAllocator;
use clickgate_core::trust::{PermissionBookkeeper, TrustEvent, TrustRecord, TrustState};
use clickgate_core::{
    CallerInfo, CallsiteToken, ComponentDescriptor, ComponentId, EnhanceAdapter, SecCompError,
};
use tracing::{debug, info, warn};

/// One registered component.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub record: TrustRecord,
    pub state: TrustState,
    /// Callsite the component was registered from.
    pub callsite: CallsiteToken,
}

impl RegistryEntry {
    /// Moves to the state `event` leads to.
    ///
    /// # Errors
    ///
    /// Propagates the lifecycle's refusal; the state is left unchanged.
    pub fn transition(&mut self, event: TrustEvent) -> Result<TrustState, SecCompError> {
        let next = self.state.apply(self.record.sc_id(), event)?;
        debug!(
            sc_id = self.record.sc_id(),
            from = %self.state,
            to = %next,
            %event,
            "trust state transition"
        );
        self.state = next;
        Ok(next)
    }

    /// Removed from the registry; any handle still held is stale.
    pub fn is_removed(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Shared handle to one entry.
pub type EntryHandle = Arc<Mutex<RegistryEntry>>;

/// Locks `entry`, recovering the data of a poisoned lock.
pub fn lock_entry(entry: &Mutex<RegistryEntry>) -> MutexGuard<'_, RegistryEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything a click on one component needs, detached from the registry.
#[derive(Clone)]
pub struct ClickTarget {
    pub sc_id: ComponentId,
    pub entry: EntryHandle,
    pub adapter: Arc<EnhanceAdapter>,
    pub bookkeeper: Arc<dyn PermissionBookkeeper>,
}

/// In-memory registry of all security components known to the service.
pub struct ComponentRegistry {
    adapter: Arc<EnhanceAdapter>,
    bookkeeper: Arc<dyn PermissionBookkeeper>,
    allocator: ComponentIdAllocator,
    entries: HashMap<ComponentId, EntryHandle>,
}

impl ComponentRegistry {
    pub fn new(adapter: Arc<EnhanceAdapter>, bookkeeper: Arc<dyn PermissionBookkeeper>) -> Self {
        Self {
            adapter,
            bookkeeper,
            allocator: ComponentIdAllocator::new(),
            entries: HashMap::new(),
        }
    }

    pub fn adapter(&self) -> &EnhanceAdapter {
        &self.adapter
    }

    pub fn bookkeeper(&self) -> &dyn PermissionBookkeeper {
        self.bookkeeper.as_ref()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers the component described by `component_info` (its JSON form)
    /// and returns its newly allocated id.
    ///
    /// # Errors
    ///
    /// - [`SecCompError::InvalidValue`] if the descriptor does not parse or
    ///   is geometrically malformed, or ids are exhausted.
    /// - Anything the enhance backends report while preprocessing, checking
    ///   or registering the component.
    pub fn register(
        &mut self,
        caller: CallerInfo,
        component_info: &str,
        callsite: CallsiteToken,
    ) -> Result<ComponentId, SecCompError> {
        let mut info = component_info.to_string();
        self.adapter.preprocess_component_info(callsite, &mut info)?;
        let descriptor = self.parse_descriptor(caller.pid, &info)?;

        let sc_id = self
            .allocator
            .allocate()
            .ok_or_else(|| SecCompError::InvalidValue("component ids exhausted".to_string()))?;
        self.adapter.register_component_id(callsite, sc_id)?;

        if !self.has_process(caller.pid) {
            self.adapter.add_process(caller.pid);
        }
        info!(
            sc_id,
            pid = caller.pid,
            token_id = caller.token_id,
            component_type = %descriptor.component_type,
            %callsite,
            "component registered"
        );
        self.entries.insert(
            sc_id,
            Arc::new(Mutex::new(RegistryEntry {
                record: TrustRecord::new(sc_id, caller, descriptor),
                state: TrustState::Registered,
                callsite,
            })),
        );
        Ok(sc_id)
    }

    /// Replaces the descriptor of `sc_id`.  Any outstanding grant or pending
    /// confirmation is revoked first.
    ///
    /// # Errors
    ///
    /// [`SecCompError::ComponentNotFound`], [`SecCompError::PermissionDenied`],
    /// descriptor errors as for [`register`](Self::register), or the
    /// bookkeeper's revoke error.
    pub fn update(
        &mut self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        component_info: &str,
    ) -> Result<(), SecCompError> {
        let handle = self.owned_entry(sc_id, caller)?;
        let descriptor = self.parse_descriptor(caller.pid, component_info)?;

        let mut entry = lock_entry(&handle);
        if entry.state != TrustState::Registered {
            entry.transition(TrustEvent::Revoked)?;
        }
        entry.record.revoke(self.bookkeeper.as_ref())?;
        entry.record.update_descriptor(descriptor);
        info!(sc_id, "component updated");
        Ok(())
    }

    /// Removes `sc_id`, revoking any grant it holds.
    ///
    /// # Errors
    ///
    /// [`SecCompError::ComponentNotFound`] or [`SecCompError::PermissionDenied`].
    /// A failing revoke or backend unregistration is logged; the record is
    /// removed regardless.
    pub fn unregister(
        &mut self,
        sc_id: ComponentId,
        caller: &CallerInfo,
        callsite: CallsiteToken,
    ) -> Result<(), SecCompError> {
        self.owned_entry(sc_id, caller)?;
        let Some(handle) = self.entries.remove(&sc_id) else {
            return Err(SecCompError::ComponentNotFound(sc_id));
        };
        let pid = self.retire(&handle, callsite);
        if !self.has_process(pid) {
            self.adapter.remove_process(pid);
        }
        info!(sc_id, pid, "component unregistered");
        Ok(())
    }

    /// Drops every component owned by `pid`, revoking their grants, and
    /// returns how many were removed.
    pub fn on_process_died(&mut self, pid: i32) -> usize {
        let dead: Vec<ComponentId> = self
            .entries
            .iter()
            .filter(|(_, e)| lock_entry(e).record.caller().pid == pid)
            .map(|(id, _)| *id)
            .collect();

        for sc_id in &dead {
            if let Some(handle) = self.entries.remove(sc_id) {
                let callsite = lock_entry(&handle).callsite;
                self.retire(&handle, callsite);
            }
        }
        self.adapter.notify_process_died(pid);
        if !dead.is_empty() {
            info!(pid, removed = dead.len(), "process died, components dropped");
        }
        dead.len()
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Snapshot of the entry for `sc_id`.
    pub fn get(&self, sc_id: ComponentId) -> Option<RegistryEntry> {
        self.entries.get(&sc_id).map(|e| lock_entry(e).clone())
    }

    /// Detached handles for driving a click on `sc_id` without the registry.
    ///
    /// # Errors
    ///
    /// [`SecCompError::ComponentNotFound`] if `sc_id` is not registered.
    pub fn click_target(&self, sc_id: ComponentId) -> Result<ClickTarget, SecCompError> {
        let entry = self
            .entries
            .get(&sc_id)
            .ok_or(SecCompError::ComponentNotFound(sc_id))?;
        Ok(ClickTarget {
            sc_id,
            entry: Arc::clone(entry),
            adapter: Arc::clone(&self.adapter),
            bookkeeper: Arc::clone(&self.bookkeeper),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct pids owning at least one component, ascending.
    pub fn pids(&self) -> Vec<i32> {
        let mut pids: Vec<i32> = self
            .entries
            .values()
            .map(|e| lock_entry(e).record.caller().pid)
            .collect();
        pids.sort_unstable();
        pids.dedup();
        pids
    }

    // ── Dump ─────────────────────────────────────────────────────────────────

    /// Appends every record, ordered by id, to `out`.
    pub fn dump_all(&self, out: &mut String) {
        let mut ids: Vec<&ComponentId> = self.entries.keys().collect();
        ids.sort_unstable();
        for id in ids {
            let entry = lock_entry(&self.entries[id]);
            let _ = write!(out, "[{}] ", entry.state);
            entry.record.dump(out);
        }
    }

    /// Appends the owning pids to `out`, one line.
    pub fn dump_pids(&self, out: &mut String) {
        let pids: Vec<String> = self.pids().iter().map(i32::to_string).collect();
        let _ = writeln!(out, "pids: [{}]", pids.join(", "));
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Revokes, marks unregistered and unhooks a removed entry.  Returns the
    /// owner pid.
    fn retire(&self, handle: &Mutex<RegistryEntry>, callsite: CallsiteToken) -> i32 {
        let mut entry = lock_entry(handle);
        let sc_id = entry.record.sc_id();
        if let Err(e) = entry.record.revoke(self.bookkeeper.as_ref()) {
            warn!(sc_id, "revoke during removal failed: {e}");
        }
        if let Err(e) = entry.transition(TrustEvent::Unregistered) {
            warn!(sc_id, "unexpected lifecycle state on removal: {e}");
        }
        if let Err(e) = self.adapter.unregister_component_id(callsite, sc_id) {
            warn!(sc_id, %callsite, "backend unregistration failed: {e}");
        }
        entry.record.caller().pid
    }

    fn has_process(&self, pid: i32) -> bool {
        self.entries
            .values()
            .any(|e| lock_entry(e).record.caller().pid == pid)
    }

    fn parse_descriptor(&self, pid: i32, raw: &str) -> Result<ComponentDescriptor, SecCompError> {
        let descriptor = ComponentDescriptor::from_json(raw)?;
        descriptor.validate()?;
        self.adapter.check_component_info(pid, &descriptor, raw)?;
        Ok(descriptor)
    }

    fn owned_entry(&self, sc_id: ComponentId, caller: &CallerInfo) -> Result<EntryHandle, SecCompError> {
        let handle = self
            .entries
            .get(&sc_id)
            .ok_or(SecCompError::ComponentNotFound(sc_id))?;
        check_owner(&lock_entry(handle), caller)?;
        Ok(Arc::clone(handle))
    }
}

/// A component may only be driven by the process and token that registered it.
pub(crate) fn check_owner(entry: &RegistryEntry, caller: &CallerInfo) -> Result<(), SecCompError> {
    let owner = entry.record.caller();
    if owner.token_id != caller.token_id || owner.pid != caller.pid {
        warn!(
            sc_id = entry.record.sc_id(),
            owner_pid = owner.pid,
            caller_pid = caller.pid,
            "caller does not own component"
        );
        return Err(SecCompError::PermissionDenied(entry.record.sc_id()));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
