//! Shared context & dependency manager: one process-wide
//! struct every handler, middleware closure, and admin command reaches
//! through. Not `ConduitState`'s `FromRef` machinery — the routes are
//! synthesized at runtime, so there is exactly one concrete state type,
//! threaded explicitly rather than resolved generically (see DESIGN.md).

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use conduit_admin::AdminBackend;
use conduit_cache::CacheStore;
use conduit_core::builder::ShutdownHandle;
use conduit_events::queue::{EventLoggerQueue, EventSink, EventsError, QueueItem};
use conduit_plugins::{PluginDeps, PluginManager};
use conduit_rate_limit::RateLimitRegistry;
use conduit_rules::{ActionRegistry, ActionSink, RuleEngine, RuleError};
use conduit_security::jwt::JwtClaimsValidator;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde_json::{json, Value};

use crate::config_store::{ConfigHandle, ConfigLoader};
use crate::db::DbFacade;

const REQUEST_LOG_CAPACITY: usize = 500;

pub struct GatewayContext {
    pub config: ConfigHandle,
    pub db: Arc<DbFacade>,
    pub rules: Arc<RuleEngine>,
    pub actions: Arc<ActionRegistry>,
    pub plugins: Arc<PluginManager>,
    pub events: Arc<EventLoggerQueue>,
    pub rate_limits: RateLimitRegistry,
    pub cache: Arc<dyn CacheStore>,
    pub jwt: Arc<JwtClaimsValidator>,
    pub http_client: reqwest::Client,
    /// Base URL this process is reachable at, used by the proxy route
    /// kind's `enrich` step to call back into another locally registered
    /// route rather than re-implementing route dispatch out of band.
    pub internal_base_url: String,
    encoding_key: EncodingKey,
    jwt_issuer: String,
    jwt_audience: String,
    pub shutdown: ShutdownHandle,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
    started_at: SystemTime,
    request_log: DashMap<String, Value>,
    request_log_order: std::sync::Mutex<std::collections::VecDeque<String>>,
    /// Lets `ActionSink` methods (which only receive `&self`) hand the
    /// event-logger queue an `Arc<dyn EventSink>` pointing back at this
    /// same context, without an unsound `Arc::from_raw` reconstruction.
    self_ref: std::sync::Weak<GatewayContext>,
}

pub struct GatewayContextConfig {
    pub descriptor_path: String,
    pub plugin_directory: String,
    pub redis_url: String,
    pub event_queue_key: String,
    pub event_batch_size: usize,
    pub event_flush_interval: Duration,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub internal_base_url: String,
}

impl GatewayContext {
    pub async fn bootstrap(cfg: GatewayContextConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let config = ConfigHandle::load(ConfigLoader::new(cfg.descriptor_path)).await?;
        let db = DbFacade::new();
        let actions = Arc::new(ActionRegistry::new());
        let plugins = Arc::new(PluginManager::new(cfg.plugin_directory, PluginDeps { actions: actions.clone() }));
        let events = Arc::new(EventLoggerQueue::from_url(
            &cfg.redis_url,
            cfg.event_queue_key,
            cfg.event_batch_size,
            cfg.event_flush_interval,
        )?);
        let rate_limits = RateLimitRegistry::new(conduit_rate_limit::RedisWindowBackend::from_url(&cfg.redis_url)?);
        let security_config = conduit_security::SecurityConfig::new("", &cfg.jwt_issuer, &cfg.jwt_audience)
            .with_allowed_algorithm(Algorithm::HS256);
        let jwt = Arc::new(JwtClaimsValidator::new_with_static_key(
            DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            security_config,
        ));

        let (shutdown, shutdown_rx) = ShutdownHandle::new();

        Ok(Arc::new_cyclic(|self_ref| Self {
            config,
            db,
            rules: Arc::new(RuleEngine::empty()),
            actions,
            plugins,
            events,
            rate_limits,
            cache: conduit_cache::cache_backend(),
            jwt,
            http_client: reqwest::Client::new(),
            internal_base_url: cfg.internal_base_url,
            encoding_key: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            jwt_issuer: cfg.jwt_issuer,
            jwt_audience: cfg.jwt_audience,
            shutdown,
            shutdown_rx,
            started_at: SystemTime::now(),
            request_log: DashMap::new(),
            request_log_order: std::sync::Mutex::new(std::collections::VecDeque::new()),
            self_ref: self_ref.clone(),
        }))
    }

    fn as_event_sink(&self) -> Arc<dyn EventSink> {
        self.self_ref.upgrade().expect("GatewayContext dropped while in use") as Arc<dyn EventSink>
    }

    /// Mint a signed token for `userGenToken`/`appGenToken` and the
    /// `body`-mode login route — `sub` is the username or table name, `acl`
    /// is comma-separated role tags carried in the `acl` claim.
    pub fn issue_token(&self, sub: &str, acl: &str) -> Result<String, jsonwebtoken::errors::Error> {
        #[derive(serde::Serialize)]
        struct Claims<'a> {
            sub: &'a str,
            acl: &'a str,
            iss: &'a str,
            aud: &'a str,
            exp: u64,
            iat: u64,
        }
        let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs();
        let claims = Claims { sub, acl, iss: &self.jwt_issuer, aud: &self.jwt_audience, exp: now + 86_400, iat: now };
        jsonwebtoken::encode(&jsonwebtoken::Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Record one finished request for the admin `requestLog` command,
    /// evicting the oldest entry past `REQUEST_LOG_CAPACITY`.
    pub fn record_request(&self, request_id: &str, entry: Value) {
        self.request_log.insert(request_id.to_string(), entry);
        let mut order = self.request_log_order.lock().unwrap();
        order.push_back(request_id.to_string());
        if order.len() > REQUEST_LOG_CAPACITY {
            if let Some(oldest) = order.pop_front() {
                self.request_log.remove(&oldest);
            }
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().unwrap_or_default().as_secs()
    }
}

/// Rule-engine `ActionSink` — `INSERT INTO`/`UPDATE ... WHERE`/`TRIGGER`
/// from an inbound rule are always queued through the event logger (spec
/// §4.C: "async by default"), never executed inline against the database.
#[async_trait]
impl ActionSink for GatewayContext {
    async fn insert_into(&self, table: &str, values: &[Value]) -> Result<(), RuleError> {
        let Some((connection, db_type, columns)) = self.connection_for_table(table) else {
            return Err(RuleError::Eval { message: format!("no database descriptor declares table {table}") });
        };
        let cfg = json!({ "connection": connection, "dbType": db_type, "columns": columns });
        self.events
            .log(cfg, table, Value::Array(values.to_vec()), self.as_event_sink())
            .await
            .map_err(|e| RuleError::Eval { message: e.to_string() })
    }

    async fn update(
        &self,
        table: &str,
        assignments: &[(String, Value)],
        filters: &[(String, Value)],
    ) -> Result<(), RuleError> {
        let Some((connection, db_type, _)) = self.connection_for_table(table) else {
            return Err(RuleError::Eval { message: format!("no database descriptor declares table {table}") });
        };
        let cfg = json!({ "connection": connection, "dbType": db_type, "table": table });
        let params: Vec<Value> = assignments.iter().map(|(_, v)| v.clone()).chain(filters.iter().map(|(_, v)| v.clone())).collect();
        let sql = format!(
            "{{\"assignments\":{},\"filters\":{}}}",
            serde_json::to_string(assignments).unwrap_or_default(),
            serde_json::to_string(filters).unwrap_or_default()
        );
        self.events
            .log_update(cfg, &sql, params, self.as_event_sink())
            .await
            .map_err(|e| RuleError::Eval { message: e.to_string() })
    }

    async fn trigger(&self, object: Value) -> Result<(), RuleError> {
        self.events.trigger(object, self.as_event_sink()).await.map_err(|e| RuleError::Eval { message: e.to_string() })
    }
}

impl GatewayContext {
    fn connection_for_table(&self, table: &str) -> Option<(String, Option<String>, Vec<String>)> {
        let config = self.config.current();
        let descriptor = config.by_table(table).next()?;
        Some((descriptor.db_connection.clone()?, descriptor.db_type.clone(), descriptor.allow_write.clone()))
    }
}

/// Executes dequeued event-logger items against the real database — the
/// flush-side counterpart to the `ActionSink` impl above.
#[async_trait]
impl EventSink for GatewayContext {
    async fn apply(&self, item: QueueItem) -> Result<(), EventsError> {
        match item {
            QueueItem::Insert { cfg, entity, payload } => {
                let connection = cfg.get("connection").and_then(Value::as_str).unwrap_or_default();
                let db_type = cfg.get("dbType").and_then(Value::as_str).map(str::to_string);
                let columns: Vec<String> = cfg
                    .get("columns")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let values = payload.as_array().cloned().unwrap_or_default();
                self.db
                    .insert_values(connection, db_type.as_deref(), &entity, &columns, &values)
                    .await
                    .map_err(|e| EventsError::Sink(e.to_string()))
            }
            QueueItem::Update { cfg, sql, params } => {
                let connection = cfg.get("connection").and_then(Value::as_str).unwrap_or_default();
                let db_type = cfg.get("dbType").and_then(Value::as_str).map(str::to_string);
                let table = cfg.get("table").and_then(Value::as_str).unwrap_or_default();
                let parsed: Value = serde_json::from_str(&sql).unwrap_or(Value::Null);
                let assignments: Vec<(String, Value)> =
                    serde_json::from_value(parsed.get("assignments").cloned().unwrap_or_default()).unwrap_or_default();
                let filters: Vec<(String, Value)> =
                    serde_json::from_value(parsed.get("filters").cloned().unwrap_or_default()).unwrap_or_default();
                let _ = params;
                self.db
                    .update_values(connection, db_type.as_deref(), table, &assignments, &filters)
                    .await
                    .map_err(|e| EventsError::Sink(e.to_string()))
            }
            QueueItem::Trigger { object } => {
                tracing::info!(trigger = %object, "event logger trigger delivered");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AdminBackend for GatewayContext {
    fn version(&self) -> String {
        format!("conduit/{}", env!("CARGO_PKG_VERSION"))
    }

    async fn shutdown(&self) {
        self.shutdown.trigger();
    }

    async fn user_gen_token(&self, username: &str, acl: &str) -> Result<String, String> {
        self.issue_token(username, acl).map_err(|e| e.to_string())
    }

    async fn app_gen_token(&self, table: &str, acl: &str) -> Result<String, String> {
        self.issue_token(table, acl).map_err(|e| e.to_string())
    }

    async fn show_config(&self) -> Value {
        let config = self.config.current();
        json!({ "count": config.len(), "descriptors": config.descriptors.iter().map(|d| d.as_ref()).collect::<Vec<_>>() })
    }

    async fn show_rules(&self) -> Value {
        json!({ "rules": self.rules.current().rules.len() })
    }

    async fn node_info(&self, target: &str, route_type: &str) -> Value {
        let config = self.config.current();
        let rt = match route_type {
            "database" => crate::descriptor::RouteType::Database,
            "proxy" => crate::descriptor::RouteType::Proxy,
            "plugin" => crate::descriptor::RouteType::Plugin,
            "static" => crate::descriptor::RouteType::Static,
            "fileUpload" => crate::descriptor::RouteType::FileUpload,
            "dynamic" => crate::descriptor::RouteType::Dynamic,
            _ => crate::descriptor::RouteType::Def,
        };
        match config.find_route(target, rt).or_else(|| config.by_table(target).next()) {
            Some(descriptor) => serde_json::to_value(descriptor.as_ref()).unwrap_or(Value::Null),
            None => json!({ "error": format!("no descriptor matches {target}") }),
        }
    }

    async fn config_reload(&self) -> Result<(), String> {
        self.config.reload().await.map_err(|e| e.to_string())
    }

    async fn load_plugin(&self, name: &str) -> Result<(), String> {
        self.plugins.load(name).map_err(|e| e.to_string())
    }

    async fn unload_plugin(&self, name: &str) -> Result<(), String> {
        self.plugins.unload(name).map_err(|e| e.to_string())
    }

    async fn reload_plugin(&self, name: &str) -> Result<(), String> {
        self.plugins.reload(name).map_err(|e| e.to_string())
    }

    async fn reload_all_plugins(&self) -> Result<(), String> {
        self.plugins.reload_all().map_err(|e| e.to_string())
    }

    async fn list(&self) -> Vec<String> {
        let config = self.config.current();
        let mut tables: Vec<String> = config.descriptors.iter().filter_map(|d| d.db_table.clone()).collect();
        tables.sort();
        tables.dedup();
        tables
    }

    async fn list_plugins(&self) -> Value {
        let summaries = self.plugins.list();
        json!(summaries
            .into_iter()
            .map(|s| json!({ "name": s.name, "version": s.version, "routes": s.routes.len() }))
            .collect::<Vec<_>>())
    }

    async fn list_actions(&self) -> Vec<String> {
        let mut names = vec!["NOW".to_string(), "UUID".to_string()];
        names.extend(self.actions.registered_names());
        names
    }

    async fn routes(&self) -> Value {
        let config = self.config.current();
        json!(config
            .descriptors
            .iter()
            .filter_map(|d| d.route.clone().map(|r| json!({ "route": r, "routeType": d.route_type })))
            .collect::<Vec<_>>())
    }

    async fn request_log(&self, id: &str) -> Option<Value> {
        self.request_log.get(id).map(|e| e.clone())
    }

    async fn validate_config(&self) -> Result<(), String> {
        let config = self.config.current();
        for descriptor in &config.descriptors {
            descriptor.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
