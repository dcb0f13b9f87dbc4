//! Caller identity carried through the trust pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the application that owns a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerInfo {
    /// Access token of the calling application; permissions are keyed on it.
    pub token_id: u32,
    pub uid: i32,
    pub pid: i32,
}

impl CallerInfo {
    pub fn new(token_id: u32, uid: i32, pid: i32) -> Self {
        Self {
            token_id,
            uid,
            pid,
        }
    }
}

/// Opaque, stable identifier of the application call site that issued an
/// API call.
///
/// The caller supplies it explicitly at the API boundary.  The core never
/// interprets it; it is forwarded untouched to the client-role enhance
/// backend, which may apply per-callsite policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallsiteToken(pub u64);

impl fmt::Display for CallsiteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callsite:{:#x}", self.0)
    }
}
