//! Provider contracts and registries
//!
//! Five independent name-to-implementation maps: backend, frontend,
//! migration, cloud and network. Registration happens once at process
//! start; lookups are concurrent and total: an unknown id produces
//! an error listing every registered id so the message is actionable.

pub mod backend;
pub mod cloud;
pub mod frontend;
pub mod migration;
pub mod network;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use backend::{BackendProvider, BuildRequest};
pub use cloud::CloudProvider;
pub use frontend::FrontendProvider;
pub use migration::{MigrationEngine, MigrationRequest};
pub use network::NetworkProvider;

/// A named, described sub-step returned by a provider's pure plan
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStep {
    pub name: String,
    pub description: String,
}

impl ProviderStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Name-to-implementation map for one provider contract. Writes
/// happen only during startup registration; reads are lock-free in
/// practice (the write lock is never held after initialization).
pub struct Registry<T: ?Sized> {
    component: &'static str,
    entries: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub const fn new(component: &'static str) -> Self {
        Self {
            component,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register an implementation. Re-registering an id replaces the
    /// previous implementation; tests use this to install fakes.
    pub fn register(&self, id: impl Into<String>, provider: Arc<T>) {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(id.into(), provider);
    }

    /// Total lookup: unknown ids fail with the full registered set.
    pub fn get(&self, id: &str) -> Result<Arc<T>, ConfigError> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProvider {
                component: self.component,
                id: id.to_string(),
                available: entries.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(id)
    }
}

static BACKENDS: Registry<dyn BackendProvider> = Registry::new("backend");
static FRONTENDS: Registry<dyn FrontendProvider> = Registry::new("frontend");
static MIGRATIONS: Registry<dyn MigrationEngine> = Registry::new("migration");
static CLOUDS: Registry<dyn CloudProvider> = Registry::new("cloud");
static NETWORKS: Registry<dyn NetworkProvider> = Registry::new("network");

pub fn backends() -> &'static Registry<dyn BackendProvider> {
    &BACKENDS
}

pub fn frontends() -> &'static Registry<dyn FrontendProvider> {
    &FRONTENDS
}

pub fn migrations() -> &'static Registry<dyn MigrationEngine> {
    &MIGRATIONS
}

pub fn clouds() -> &'static Registry<dyn CloudProvider> {
    &CLOUDS
}

pub fn networks() -> &'static Registry<dyn NetworkProvider> {
    &NETWORKS
}

static BUILTINS: OnceLock<()> = OnceLock::new();

/// Register the built-in providers. Idempotent; called once from
/// main and from any test that needs the registries populated.
pub fn register_builtins() {
    BUILTINS.get_or_init(|| {
        BACKENDS.register("docker", Arc::new(backend::DockerBackend));
        FRONTENDS.register("static", Arc::new(frontend::StaticFrontend));
        MIGRATIONS.register("sql", Arc::new(migration::SqlMigrationEngine));
        CLOUDS.register("manual", Arc::new(cloud::ManualCloud));
        NETWORKS.register("none", Arc::new(network::NoopNetwork));
        NETWORKS.register("tailscale", Arc::new(network::TailscaleNetwork));
    });
}
