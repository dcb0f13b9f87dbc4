//! Verification backend adapter.
//!
//! - **`backend`** – one capability trait per backend role.
//! - **`catalog`** – the statically-built registry the adapter loads from.
//! - **`adapter`** – [`EnhanceAdapter`], the call surface with fallbacks.

pub mod adapter;
pub mod backend;
pub mod catalog;

pub use adapter::{EnhanceAdapter, SlotStatus};
pub use backend::{BackendRole, ClientEnhanceBackend, InputEnhanceBackend, ServiceEnhanceBackend};
pub use catalog::{
    module_id, BackendCatalog, ClientModule, LoadError, CLIENT_MODULE, INPUT_MODULE,
    SERVICE_MODULE,
};
