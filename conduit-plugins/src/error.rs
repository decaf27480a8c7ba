//! Plugin-manager error taxonomy.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum PluginError {
    /// `libloading::Library::new` or symbol lookup failed.
    Load { path: PathBuf, source: libloading::Error },
    /// No plugin is registered under this name (unload/reload of an
    /// unknown plugin).
    NotLoaded(String),
    /// A plugin is already loaded under this name; load is idempotent and
    /// returns `Ok(())` instead, this variant is for internal use only
    /// where that isn't the right behavior (e.g. conflicting versions).
    AlreadyLoaded(String),
    /// `initialize()` returned an error.
    Init { name: String, message: String },
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::Load { path, source } => {
                write!(f, "failed to load plugin at {}: {source}", path.display())
            }
            PluginError::NotLoaded(name) => write!(f, "no plugin loaded under name {name:?}"),
            PluginError::AlreadyLoaded(name) => write!(f, "plugin {name:?} is already loaded"),
            PluginError::Init { name, message } => write!(f, "plugin {name:?} failed to initialize: {message}"),
        }
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PluginError::Load { source, .. } => Some(source),
            _ => None,
        }
    }
}
