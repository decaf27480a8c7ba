//! Config model & loader.
//!
//! The full set of endpoint descriptors is loaded from a JSON file, indexed
//! by `(route, routeType)` and by `dbTable`, and published behind an
//! `ArcSwap` so in-flight requests keep whichever [`ConfigSet`] snapshot
//! they started with while `configReload` swaps in a new one atomically —
//! the same pattern `conduit-rules::RuleEngine` uses for its own hot reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use conduit_core::config::secrets::{resolve_placeholders, DefaultSecretResolver, SecretResolver};
use serde::Deserialize;

use crate::descriptor::{DescriptorError, EndpointDescriptor, RouteType};

#[derive(Debug)]
pub enum ConfigLoadError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Secret(conduit_core::config::ConfigError),
    Descriptor(DescriptorError),
    DuplicateRoute(String),
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::Io(e) => write!(f, "reading config file: {e}"),
            ConfigLoadError::Json(e) => write!(f, "parsing config JSON: {e}"),
            ConfigLoadError::Secret(e) => write!(f, "resolving placeholder: {e}"),
            ConfigLoadError::Descriptor(e) => write!(f, "invalid descriptor: {e}"),
            ConfigLoadError::DuplicateRoute(r) => write!(f, "duplicate route registered: {r}"),
        }
    }
}

impl std::error::Error for ConfigLoadError {}

impl From<std::io::Error> for ConfigLoadError {
    fn from(e: std::io::Error) -> Self {
        ConfigLoadError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigLoadError {
    fn from(e: serde_json::Error) -> Self {
        ConfigLoadError::Json(e)
    }
}

/// A fully loaded, indexed snapshot of every endpoint descriptor.
/// Immutable once built — reloads build a fresh one and swap it in.
#[derive(Debug, Default)]
pub struct ConfigSet {
    pub descriptors: Vec<Arc<EndpointDescriptor>>,
    by_route: HashMap<(String, RouteType), usize>,
    by_table: HashMap<String, Vec<usize>>,
}

impl ConfigSet {
    fn build(descriptors: Vec<EndpointDescriptor>) -> Result<Self, ConfigLoadError> {
        let mut set = ConfigSet { descriptors: Vec::with_capacity(descriptors.len()), ..Default::default() };

        for descriptor in descriptors {
            descriptor.validate().map_err(ConfigLoadError::Descriptor)?;
            let idx = set.descriptors.len();

            if let Some(route) = descriptor.route.clone() {
                let key = (route.clone(), descriptor.route_type);
                if set.by_route.insert(key, idx).is_some() {
                    return Err(ConfigLoadError::DuplicateRoute(route));
                }
            }
            if let Some(table) = descriptor.db_table.clone() {
                set.by_table.entry(table).or_default().push(idx);
            }

            set.descriptors.push(Arc::new(descriptor));
        }

        Ok(set)
    }

    pub fn find_route(&self, route: &str, route_type: RouteType) -> Option<&Arc<EndpointDescriptor>> {
        self.by_route.get(&(route.to_string(), route_type)).map(|&idx| &self.descriptors[idx])
    }

    /// All descriptors matching a path exactly, regardless of route type —
    /// used by the synthesizer when dispatching by path alone.
    pub fn find_by_path(&self, route: &str) -> Option<&Arc<EndpointDescriptor>> {
        RouteType::all().iter().find_map(|&rt| self.find_route(route, rt))
    }

    pub fn by_table(&self, table: &str) -> impl Iterator<Item = &Arc<EndpointDescriptor>> {
        self.by_table.get(table).into_iter().flatten().map(move |&idx| &self.descriptors[idx])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl RouteType {
    fn all() -> [RouteType; 7] {
        [
            RouteType::Database,
            RouteType::Proxy,
            RouteType::Plugin,
            RouteType::Static,
            RouteType::Def,
            RouteType::FileUpload,
            RouteType::Dynamic,
        ]
    }
}

#[derive(Deserialize)]
struct RawDescriptorFile {
    #[serde(default)]
    endpoints: Vec<serde_json::Value>,
}

/// Loads the descriptor file from disk, resolving `${VAR}`-style
/// placeholders in every string field before deserializing the typed
/// descriptor — this lets `dbConnection`, `proxy.targetUrl`, etc. reference
/// environment-provided secrets without baking them into the committed file.
pub struct ConfigLoader {
    path: PathBuf,
    resolver: Arc<dyn SecretResolver>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), resolver: Arc::new(DefaultSecretResolver) }
    }

    pub fn with_resolver(path: impl Into<PathBuf>, resolver: Arc<dyn SecretResolver>) -> Self {
        Self { path: path.into(), resolver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ConfigSet, ConfigLoadError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        self.load_from_str(&raw)
    }

    fn load_from_str(&self, raw: &str) -> Result<ConfigSet, ConfigLoadError> {
        // Accept either a bare JSON array or `{"endpoints": [...]}`.
        let trimmed = raw.trim_start();
        let entries: Vec<serde_json::Value> = if trimmed.starts_with('[') {
            serde_json::from_str(raw)?
        } else {
            serde_json::from_str::<RawDescriptorFile>(raw)?.endpoints
        };

        let mut descriptors = Vec::with_capacity(entries.len());
        for mut entry in entries {
            resolve_value_placeholders(&mut entry, self.resolver.as_ref()).map_err(ConfigLoadError::Secret)?;
            let descriptor: EndpointDescriptor = serde_json::from_value(entry)?;
            descriptors.push(descriptor);
        }

        ConfigSet::build(descriptors)
    }
}

fn resolve_value_placeholders(
    value: &mut serde_json::Value,
    resolver: &dyn SecretResolver,
) -> Result<(), conduit_core::config::ConfigError> {
    match value {
        serde_json::Value::String(s) => {
            if s.contains("${") {
                *s = resolve_placeholders(s, resolver)?;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                resolve_value_placeholders(item, resolver)?;
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                resolve_value_placeholders(item, resolver)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Atomically swappable handle to the active [`ConfigSet`]. Hot reload
/// must not drop in-flight requests.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<ConfigSet>>,
    loader: Arc<ConfigLoader>,
}

impl ConfigHandle {
    pub async fn load(loader: ConfigLoader) -> Result<Self, ConfigLoadError> {
        let set = loader.load().await?;
        Ok(Self { inner: Arc::new(ArcSwap::from_pointee(set)), loader: Arc::new(loader) })
    }

    /// Current snapshot. Cheap `Arc` clone; safe to hold across an entire
    /// request's lifetime even if a reload happens concurrently.
    pub fn current(&self) -> Arc<ConfigSet> {
        self.inner.load_full()
    }

    /// Reload from disk and swap in the new snapshot only if it parses and
    /// validates cleanly — on error the previously active config stays live.
    pub async fn reload(&self) -> Result<(), ConfigLoadError> {
        let fresh = self.loader.load().await?;
        self.inner.store(Arc::new(fresh));
        Ok(())
    }
}
