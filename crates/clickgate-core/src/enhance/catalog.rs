//! Backend catalog: the statically-built registry of enhance backends.
//!
//! The adapter never resolves symbols at runtime.  Instead, the binary that
//! embeds the trust core builds a `BackendCatalog` at start-up (from its
//! configuration) and registers a loader under each role's fixed module
//! identifier.  A role with nothing registered behaves exactly like a
//! backend library that failed to load.
//!
//! # Client-role factories
//!
//! The client role mirrors a two-step load: the module is first "opened"
//! (its loader runs and returns a [`ClientModule`]), then its factory entry
//! point is resolved and invoked to obtain the instance.  A module without a
//! factory, or a factory that produces no instance, counts as a load failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::enhance::backend::{
    BackendRole, ClientEnhanceBackend, InputEnhanceBackend, ServiceEnhanceBackend,
};

/// Module identifier of the input-role backend.
pub const INPUT_MODULE: &str = "clickgate.enhance.input";
/// Module identifier of the service-role backend.
pub const SERVICE_MODULE: &str = "clickgate.enhance.service";
/// Module identifier of the client-role backend.
pub const CLIENT_MODULE: &str = "clickgate.enhance.client";

/// Returns the fixed module identifier for `role`.
pub fn module_id(role: BackendRole) -> &'static str {
    match role {
        BackendRole::Input => INPUT_MODULE,
        BackendRole::Service => SERVICE_MODULE,
        BackendRole::Client => CLIENT_MODULE,
    }
}

/// Why a backend could not be loaded.  Never surfaced to callers of the
/// adapter; only logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("module {0} is not registered")]
    NotFound(String),

    #[error("module {module} does not provide the {expected} role")]
    RoleMismatch { module: String, expected: BackendRole },

    #[error("module {module} failed to load: {reason}")]
    Failed { module: String, reason: String },

    #[error("module {0} has no factory entry point")]
    MissingFactory(String),

    #[error("factory of module {0} returned no instance")]
    FactoryReturnedNone(String),
}

/// Loader for the input role.
pub type InputLoader =
    Box<dyn Fn() -> Result<Arc<dyn InputEnhanceBackend>, LoadError> + Send + Sync>;

/// Loader for the service role.
pub type ServiceLoader =
    Box<dyn Fn() -> Result<Arc<dyn ServiceEnhanceBackend>, LoadError> + Send + Sync>;

/// Factory entry point exported by a client module.
pub type ClientFactory = Box<dyn Fn() -> Option<Arc<dyn ClientEnhanceBackend>> + Send + Sync>;

/// Loader for the client role; yields the opened module.
pub type ClientLoader = Box<dyn Fn() -> Result<ClientModule, LoadError> + Send + Sync>;

/// An opened client module, possibly lacking its factory entry point.
pub struct ClientModule {
    factory: Option<ClientFactory>,
}

impl ClientModule {
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn ClientEnhanceBackend>> + Send + Sync + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
        }
    }

    pub fn without_factory() -> Self {
        Self { factory: None }
    }
}

enum ModuleLoader {
    Input(InputLoader),
    Service(ServiceLoader),
    Client(ClientLoader),
}

impl ModuleLoader {
    fn role(&self) -> BackendRole {
        match self {
            ModuleLoader::Input(_) => BackendRole::Input,
            ModuleLoader::Service(_) => BackendRole::Service,
            ModuleLoader::Client(_) => BackendRole::Client,
        }
    }
}

/// Modules available to the adapter, keyed by module identifier.
#[derive(Default)]
pub struct BackendCatalog {
    modules: HashMap<String, ModuleLoader>,
}

impl fmt::Debug for BackendCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<(&String, BackendRole)> =
            self.modules.iter().map(|(k, v)| (k, v.role())).collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        f.debug_struct("BackendCatalog").field("modules", &names).finish()
    }
}

impl BackendCatalog {
    /// An empty catalog: every role falls back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an input loader under `module`.
    pub fn register_input<F>(&mut self, module: &str, loader: F)
    where
        F: Fn() -> Result<Arc<dyn InputEnhanceBackend>, LoadError> + Send + Sync + 'static,
    {
        self.modules
            .insert(module.to_string(), ModuleLoader::Input(Box::new(loader)));
    }

    /// Registers a service loader under `module`.
    pub fn register_service<F>(&mut self, module: &str, loader: F)
    where
        F: Fn() -> Result<Arc<dyn ServiceEnhanceBackend>, LoadError> + Send + Sync + 'static,
    {
        self.modules
            .insert(module.to_string(), ModuleLoader::Service(Box::new(loader)));
    }

    /// Registers a client loader under `module`.
    pub fn register_client<F>(&mut self, module: &str, loader: F)
    where
        F: Fn() -> Result<ClientModule, LoadError> + Send + Sync + 'static,
    {
        self.modules
            .insert(module.to_string(), ModuleLoader::Client(Box::new(loader)));
    }

    /// Registers a ready-made input backend under [`INPUT_MODULE`].
    pub fn with_input_backend(mut self, backend: Arc<dyn InputEnhanceBackend>) -> Self {
        self.register_input(INPUT_MODULE, move || Ok(Arc::clone(&backend)));
        self
    }

    /// Registers a ready-made service backend under [`SERVICE_MODULE`].
    pub fn with_service_backend(mut self, backend: Arc<dyn ServiceEnhanceBackend>) -> Self {
        self.register_service(SERVICE_MODULE, move || Ok(Arc::clone(&backend)));
        self
    }

    /// Registers a client module whose factory returns `backend`.
    pub fn with_client_backend(mut self, backend: Arc<dyn ClientEnhanceBackend>) -> Self {
        self.register_client(CLIENT_MODULE, move || {
            let backend = Arc::clone(&backend);
            Ok(ClientModule::with_factory(move || Some(Arc::clone(&backend))))
        });
        self
    }

    /// `true` if a loader is registered under `module`.
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Runs the input-role loader.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] describing why no instance is available.
    pub fn load_input(&self) -> Result<Arc<dyn InputEnhanceBackend>, LoadError> {
        match self.lookup(BackendRole::Input)? {
            ModuleLoader::Input(load) => load(),
            _ => Err(mismatch(BackendRole::Input)),
        }
    }

    /// Runs the service-role loader.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] describing why no instance is available.
    pub fn load_service(&self) -> Result<Arc<dyn ServiceEnhanceBackend>, LoadError> {
        match self.lookup(BackendRole::Service)? {
            ModuleLoader::Service(load) => load(),
            _ => Err(mismatch(BackendRole::Service)),
        }
    }

    /// Opens the client module, resolves its factory, and invokes it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::MissingFactory`] or
    /// [`LoadError::FactoryReturnedNone`] in addition to the plain load errors.
    pub fn load_client(&self) -> Result<Arc<dyn ClientEnhanceBackend>, LoadError> {
        let module = match self.lookup(BackendRole::Client)? {
            ModuleLoader::Client(load) => load()?,
            _ => return Err(mismatch(BackendRole::Client)),
        };
        let factory = module
            .factory
            .ok_or_else(|| LoadError::MissingFactory(CLIENT_MODULE.to_string()))?;
        factory().ok_or_else(|| LoadError::FactoryReturnedNone(CLIENT_MODULE.to_string()))
    }

    fn lookup(&self, role: BackendRole) -> Result<&ModuleLoader, LoadError> {
        let id = module_id(role);
        self.modules
            .get(id)
            .ok_or_else(|| LoadError::NotFound(id.to_string()))
    }
}

fn mismatch(role: BackendRole) -> LoadError {
    LoadError::RoleMismatch {
        module: module_id(role).to_string(),
        expected: role,
    }
}
