//! In-memory temporary-permission bookkeeping.
//!
//! Grants live only as long as the service process.  The store answers
//! "does this token currently hold a temporary permission of this type?"
//! and counts overlapping grants, so two granted components of the same
//! type keep the permission alive until both are revoked.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use clickgate_core::trust::PermissionBookkeeper;
use clickgate_core::{ComponentDescriptor, ComponentType, SecCompError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: Mutex<HashMap<(u32, ComponentType), u32>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while `token_id` holds at least one grant of `component_type`.
    pub fn has_permission(&self, token_id: u32, component_type: ComponentType) -> bool {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(token_id, component_type))
            .is_some_and(|count| *count > 0)
    }

    /// Number of distinct (token, type) pairs currently granted.
    pub fn active_grants(&self) -> usize {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PermissionBookkeeper for InMemoryPermissionStore {
    fn grant_temp_permission(
        &self,
        token_id: u32,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError> {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        let count = grants
            .entry((token_id, descriptor.component_type))
            .or_insert(0);
        *count += 1;
        debug!(token_id, component_type = %descriptor.component_type, count = *count, "temporary permission granted");
        Ok(())
    }

    fn revoke_temp_permission(
        &self,
        token_id: u32,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError> {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (token_id, descriptor.component_type);
        match grants.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                grants.remove(&key);
            }
            None => {
                warn!(token_id, component_type = %descriptor.component_type, "revoke without matching grant");
                return Err(SecCompError::CallbackOperationFailed(format!(
                    "token {token_id} holds no {} permission",
                    descriptor.component_type
                )));
            }
        }
        debug!(token_id, component_type = %descriptor.component_type, "temporary permission revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickgate_core::Rect;

    fn descriptor(component_type: ComponentType) -> ComponentDescriptor {
        ComponentDescriptor::new(
            component_type,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )
    }

    #[test]
    fn test_grant_then_revoke_clears_permission() {
        let store = InMemoryPermissionStore::new();
        let paste = descriptor(ComponentType::Paste);

        store.grant_temp_permission(7, &paste).unwrap();
        assert!(store.has_permission(7, ComponentType::Paste));
        assert!(!store.has_permission(7, ComponentType::Save));

        store.revoke_temp_permission(7, &paste).unwrap();
        assert!(!store.has_permission(7, ComponentType::Paste));
        assert_eq!(store.active_grants(), 0);
    }

    #[test]
    fn test_overlapping_grants_need_matching_revokes() {
        let store = InMemoryPermissionStore::new();
        let save = descriptor(ComponentType::Save);

        store.grant_temp_permission(7, &save).unwrap();
        store.grant_temp_permission(7, &save).unwrap();
        store.revoke_temp_permission(7, &save).unwrap();

        assert!(store.has_permission(7, ComponentType::Save));
    }

    #[test]
    fn test_revoke_without_grant_fails() {
        let store = InMemoryPermissionStore::new();
        let result = store.revoke_temp_permission(7, &descriptor(ComponentType::Location));
        assert!(matches!(result, Err(SecCompError::CallbackOperationFailed(_))));
    }
}
