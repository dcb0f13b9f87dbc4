//! Concrete enhance backends and the configuration-driven catalog builder.
//!
//! [`build_catalog`] turns the `[enhance]` config section into a
//! [`BackendCatalog`]: each role gets the backend its `BackendKind` names, or
//! nothing at all for `none`.  Key problems do not abort start-up; the role's
//! loader reports the failure and the adapter falls back, the same way a
//! backend module that cannot be opened would.

pub mod hmac_sha256;
pub mod recording;

use std::sync::Arc;

use clickgate_core::enhance::{
    ClientEnhanceBackend, ClientModule, InputEnhanceBackend, LoadError, ServiceEnhanceBackend,
    CLIENT_MODULE, INPUT_MODULE, SERVICE_MODULE,
};
use clickgate_core::BackendCatalog;
use tracing::debug;

use crate::infrastructure::storage::config::{BackendKind, EnhanceConfig};

use self::hmac_sha256::{HmacClientBackend, HmacInputBackend, HmacServiceBackend};
use self::recording::RecordingBackend;

/// Builds the backend catalog described by `config`.
pub fn build_catalog(config: &EnhanceConfig) -> BackendCatalog {
    let mut catalog = BackendCatalog::new();
    let key = config.hmac_key().map_err(|e| e.to_string());

    match config.input {
        BackendKind::None => debug!("input role has no backend configured"),
        BackendKind::Hmac => {
            let key = key.clone();
            catalog.register_input(INPUT_MODULE, move || {
                let key = key.clone().map_err(|reason| failed(INPUT_MODULE, reason))?;
                Ok(Arc::new(HmacInputBackend::new(key)) as Arc<dyn InputEnhanceBackend>)
            });
        }
        BackendKind::Recording => {
            catalog = catalog.with_input_backend(Arc::new(RecordingBackend::new()));
        }
    }

    match config.service {
        BackendKind::None => debug!("service role has no backend configured"),
        BackendKind::Hmac => {
            let key = key.clone();
            catalog.register_service(SERVICE_MODULE, move || {
                let key = key.clone().map_err(|reason| failed(SERVICE_MODULE, reason))?;
                Ok(Arc::new(HmacServiceBackend::new(key)) as Arc<dyn ServiceEnhanceBackend>)
            });
        }
        BackendKind::Recording => {
            catalog = catalog.with_service_backend(Arc::new(RecordingBackend::new()));
        }
    }

    match config.client {
        BackendKind::None => debug!("client role has no backend configured"),
        BackendKind::Hmac => {
            catalog.register_client(CLIENT_MODULE, move || {
                let key = key.clone().map_err(|reason| failed(CLIENT_MODULE, reason))?;
                Ok(ClientModule::with_factory(move || {
                    Some(Arc::new(HmacClientBackend::new(key.clone())) as Arc<dyn ClientEnhanceBackend>)
                }))
            });
        }
        BackendKind::Recording => {
            catalog = catalog.with_client_backend(Arc::new(RecordingBackend::new()));
        }
    }

    catalog
}

fn failed(module: &str, reason: String) -> LoadError {
    LoadError::Failed {
        module: module.to_string(),
        reason,
    }
}
