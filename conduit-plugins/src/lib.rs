//! # conduit-plugins — Dynamic-library plugin manager
//!
//! Implements the gateway's plugin system: plugins are
//! `cdylib`s discovered under a configured directory, loaded on demand via
//! `libloading`, and unloaded/reloaded idempotently. See [`plugin`] for the
//! ABI boundary and [`manager`] for load/unload/discovery.

pub mod error;
pub mod manager;
pub mod plugin;

pub use error::PluginError;
pub use manager::{PluginManager, PluginSummary};
pub use plugin::{ConduitPlugin, PluginDeps, PluginEntryFn, RouteSpec, PLUGIN_ENTRY_SYMBOL};
