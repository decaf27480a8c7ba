//! Endpoint descriptor — the declarative record an operator writes per
//! route. One JSON array of these is the entire input to the config model
//! and the route synthesizer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// What kind of handler a descriptor materializes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteType {
    Database,
    Proxy,
    Plugin,
    Static,
    /// Schema-only: registers a table/entity without exposing an HTTP route.
    Def,
    FileUpload,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_axum(self) -> axum::http::Method {
        match self {
            HttpMethod::Get => axum::http::Method::GET,
            HttpMethod::Post => axum::http::Method::POST,
            HttpMethod::Put => axum::http::Method::PUT,
            HttpMethod::Delete => axum::http::Method::DELETE,
            HttpMethod::Patch => axum::http::Method::PATCH,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_axum())
    }
}

/// `none` / `token` (bearer JWT) / `basic` (header credentials against a
/// table) / `body` (credentials in the request body, always returns a
/// token on success).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuthMode {
    None,
    Token,
    Basic { username_field: String, password_field: String, password_fn: PasswordFn },
    Body { username_field: String, password_field: String, password_fn: PasswordFn },
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordFn {
    Bcrypt,
    Sha256,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSpec {
    pub per_minute: Option<u64>,
    pub per_hour: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub related_table: String,
    pub foreign_key: String,
    pub related_key: String,
    pub join_type: JoinType,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    pub target_url: String,
    #[serde(default)]
    pub query_mapping: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub enrich: Vec<EnrichStep>,
    #[serde(default)]
    pub response_mapping: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStep {
    pub route: String,
    pub merge_as: String,
}

/// The full declarative record for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub route_type: RouteType,
    /// URL path; absent for `def` descriptors.
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub db_connection: Option<String>,
    #[serde(default)]
    pub db_table: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub allow_read: Vec<String>,
    #[serde(default)]
    pub allow_write: Vec<String>,
    #[serde(default)]
    pub allow_methods: HashSet<HttpMethod>,
    #[serde(default)]
    pub acl: HashSet<String>,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default)]
    pub cache: u64,
    #[serde(default)]
    pub rate_limit: RateLimitSpec,
    #[serde(default)]
    pub column_definitions: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub validation_rules: std::collections::HashMap<String, String>,
    /// Name of the plugin implementing this route (`routeType = plugin`)
    /// or providing supplementary business logic for a `database` route.
    #[serde(default)]
    pub business_logic: Option<String>,
    /// Path to a rules DSL file, loaded into the rule engine under this
    /// descriptor's bucket.
    #[serde(default)]
    pub business_rules: Option<String>,
    #[serde(default)]
    pub open_graph_mapping: Option<serde_json::Value>,
    #[serde(default)]
    pub mlmodel: Vec<String>,
    #[serde(default)]
    pub proxy: Option<ProxySpec>,
    #[serde(default)]
    pub static_path: Option<String>,
    #[serde(default)]
    pub max_size: Option<u64>,
}

static IDENTIFIER_RE_SOURCE: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,63}$";

/// Validate a bare identifier against the required naming rule
/// (`^[A-Za-z_][A-Za-z0-9_]{0,63}$`), without pulling in a regex crate for a
/// single anchored pattern.
pub fn is_valid_identifier(ident: &str) -> bool {
    if ident.is_empty() || ident.len() > 64 {
        return false;
    }
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug)]
pub enum DescriptorError {
    MissingField { route_type: RouteType, field: &'static str },
    InvalidIdentifier { field: &'static str, value: String },
    WriteNotDefined { field: String },
    NoMutationKeys,
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorError::MissingField { route_type, field } => {
                write!(f, "{route_type:?} descriptor missing required field `{field}`")
            }
            DescriptorError::InvalidIdentifier { field, value } => {
                write!(f, "`{field}` = {value:?} does not match {IDENTIFIER_RE_SOURCE}")
            }
            DescriptorError::WriteNotDefined { field } => {
                write!(f, "allowWrite references undefined column `{field}`")
            }
            DescriptorError::NoMutationKeys => {
                write!(f, "database descriptor allows mutating methods but declares no `keys`")
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

impl EndpointDescriptor {
    /// Cross-field invariant checks, run once at load time.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        match self.route_type {
            RouteType::Database | RouteType::Def => {
                let table = self.db_table.as_deref().ok_or(DescriptorError::MissingField {
                    route_type: self.route_type,
                    field: "dbTable",
                })?;
                if !is_valid_identifier(table) {
                    return Err(DescriptorError::InvalidIdentifier { field: "dbTable", value: table.to_string() });
                }
                for column in self.allow_write.iter().chain(self.allow_read.iter()) {
                    if !is_valid_identifier(column) {
                        return Err(DescriptorError::InvalidIdentifier {
                            field: "allowRead/allowWrite",
                            value: column.clone(),
                        });
                    }
                }
                let defined: HashSet<&str> = self
                    .column_definitions
                    .keys()
                    .map(String::as_str)
                    .chain(self.relationships.iter().flat_map(|r| r.fields.iter().map(String::as_str)))
                    .collect();
                if !defined.is_empty() {
                    for column in &self.allow_write {
                        if !defined.contains(column.as_str()) {
                            return Err(DescriptorError::WriteNotDefined { field: column.clone() });
                        }
                    }
                }
                let mutates = self
                    .allow_methods
                    .iter()
                    .any(|m| matches!(m, HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete | HttpMethod::Patch));
                if self.route_type == RouteType::Database && mutates && self.keys.is_empty() {
                    return Err(DescriptorError::NoMutationKeys);
                }
            }
            RouteType::Proxy => {
                if self.proxy.is_none() {
                    return Err(DescriptorError::MissingField { route_type: self.route_type, field: "proxy" });
                }
            }
            RouteType::Plugin => {
                if self.business_logic.is_none() {
                    return Err(DescriptorError::MissingField { route_type: self.route_type, field: "businessLogic" });
                }
            }
            RouteType::Static => {
                if self.static_path.is_none() {
                    return Err(DescriptorError::MissingField { route_type: self.route_type, field: "staticPath" });
                }
            }
            RouteType::FileUpload => {
                if self.max_size.is_none() {
                    return Err(DescriptorError::MissingField { route_type: self.route_type, field: "maxSize" });
                }
            }
            RouteType::Dynamic => {}
        }

        if !matches!(self.route_type, RouteType::Def) && self.route.is_none() {
            return Err(DescriptorError::MissingField { route_type: self.route_type, field: "route" });
        }

        Ok(())
    }

    /// Normalized `dbConnection` name: `-` becomes `_`.
    pub fn normalized_connection(&self) -> Option<String> {
        self.db_connection.as_deref().map(|c| c.replace('-', "_"))
    }
}
