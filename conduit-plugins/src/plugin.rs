//! The plugin ABI boundary.
//!
//! A conduit plugin is a `cdylib` exposing one `#[no_mangle] extern "C"`
//! entry point that hands back a freshly boxed trait object:
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "C" fn conduit_plugin_entry() -> *mut dyn conduit_plugins::ConduitPlugin {
//!     Box::into_raw(Box::new(MyPlugin::default()))
//! }
//! ```
//!
//! This mirrors the shape of the teacher's `r2e_core::plugin` system
//! (`name`, route registration, lifecycle hooks) but swaps compile-time
//! builder chaining for a `dlopen`-style boundary, since Rust has no
//! hot-`require()` equivalent. The manager takes ownership of the raw
//! pointer via [`Box::from_raw`] immediately after the call returns.

use conduit_http::{Method, Request, Response};
use conduit_rules::ActionRegistry;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Dependencies handed to a plugin at `initialize` time.
#[derive(Clone)]
pub struct PluginDeps {
    /// The gateway's named-action registry (spec: "plugins extending the
    /// action registry via `context.actions.<name>`").
    pub actions: Arc<ActionRegistry>,
}

/// One route a plugin wants mounted under its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Method,
    /// Path relative to the plugin's mount point, e.g. `/status`.
    pub path: String,
}

/// The trait every dynamically loaded plugin implements.
///
/// `register_routes` is called once right after `initialize` succeeds; the
/// manager stores the returned list on the plugin's record and hands it to
/// the route synthesizer. Unloading a plugin simply drops that owned list
/// — the manager never has to scan router internals to find what a plugin
/// contributed.
pub trait ConduitPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    /// Called once after load, before `register_routes`. Plugins typically
    /// register named actions here.
    fn initialize(&mut self, deps: &PluginDeps) -> Result<(), String>;

    fn register_routes(&self) -> Vec<RouteSpec>;

    /// Handle a request for one of this plugin's registered routes.
    /// `route` is the same path string the plugin returned from
    /// `register_routes`.
    fn handle<'a>(&'a self, route: &'a str, req: Request) -> BoxFuture<'a, Response>;

    /// Called once before the manager drops the plugin and unloads its
    /// library. Plugins release any held resources here.
    fn cleanup(&mut self);
}

/// The symbol name every plugin `cdylib` must export.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"conduit_plugin_entry";

/// Signature of the exported entry point.
pub type PluginEntryFn = unsafe extern "C" fn() -> *mut dyn ConduitPlugin;
