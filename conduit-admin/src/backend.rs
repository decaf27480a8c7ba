//! The host-implemented surface behind every admin command. `conduit-admin`
//! only owns the transport (line protocol, accept loop, shutdown
//! integration); the gateway binary supplies the real config/rules/plugin
//! state via this trait.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait AdminBackend: Send + Sync {
    fn version(&self) -> String;

    /// Begin graceful shutdown of the whole process (not just the admin
    /// listener). The admin server triggers this and then closes its own
    /// connection.
    async fn shutdown(&self);

    async fn user_gen_token(&self, username: &str, acl: &str) -> Result<String, String>;
    async fn app_gen_token(&self, table: &str, acl: &str) -> Result<String, String>;

    async fn show_config(&self) -> Value;
    async fn show_rules(&self) -> Value;
    async fn node_info(&self, target: &str, route_type: &str) -> Value;

    /// Run the full `configReload` sequence: load → categorize
    /// → update validation rules → rebuild rule-engine middleware → clear
    /// route table → re-register routes. On `Err`, the previously active
    /// config must remain in effect — that invariant is the backend's
    /// responsibility, not the transport's.
    async fn config_reload(&self) -> Result<(), String>;

    async fn load_plugin(&self, name: &str) -> Result<(), String>;
    async fn unload_plugin(&self, name: &str) -> Result<(), String>;
    async fn reload_plugin(&self, name: &str) -> Result<(), String>;
    async fn reload_all_plugins(&self) -> Result<(), String>;

    async fn list(&self) -> Vec<String>;
    async fn list_plugins(&self) -> Value;
    async fn list_actions(&self) -> Vec<String>;
    async fn routes(&self) -> Value;
    async fn request_log(&self, id: &str) -> Option<Value>;
    async fn validate_config(&self) -> Result<(), String>;
}
