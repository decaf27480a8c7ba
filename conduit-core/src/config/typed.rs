use super::{ConfigError, ConduitConfig};

/// Metadata about a single configuration property.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Relative key (e.g., `"pool_size"`, or `"jwks.url"` for a custom key).
    pub key: String,
    /// Absolute key (e.g., `"app.database.pool_size"`).
    pub full_key: String,
    /// Rust type name (e.g., `"i64"`).
    pub type_name: &'static str,
    /// Whether the property is required (no default and not `Option`).
    pub required: bool,
    /// Default value as a string, if any.
    pub default_value: Option<String>,
    /// Description from doc comments.
    pub description: Option<String>,
    /// Explicit environment variable this field may be read from, if declared.
    pub env_var: Option<String>,
    /// Whether this property is a nested `#[config(section)]` rather than a scalar.
    pub is_section: bool,
}

/// Trait for strongly-typed configuration sections.
///
/// Endpoint-descriptor config (§4.A) is a distinct JSON-array code path and
/// does not implement this trait — this is for ambient process config only
/// (ports, Redis URL, JWT secret, ...), hand-implemented per section rather
/// than derived.
///
/// ```ignore
/// struct DatabaseConfig {
///     pub url: String,
///     pub pool_size: i64,
///     pub timeout: Option<i64>,
/// }
///
/// impl ConfigProperties for DatabaseConfig {
///     fn prefix() -> &'static str { "app.database" }
///     fn properties_metadata() -> Vec<PropertyMeta> { vec![/* ... */] }
///     fn from_config_prefixed(config: &ConduitConfig, prefix: &str) -> Result<Self, ConfigError> {
///         Ok(Self {
///             url: config.get(&format!("{prefix}.url"))?,
///             pool_size: config.get_or(&format!("{prefix}.pool_size"), 10),
///             timeout: config.get(&format!("{prefix}.timeout")).ok(),
///         })
///     }
/// }
/// ```
pub trait ConfigProperties: Sized {
    /// The configuration key prefix (e.g., `"app.database"`).
    fn prefix() -> &'static str;

    /// Metadata about all expected properties.
    fn properties_metadata() -> Vec<PropertyMeta>;

    /// Construct from a `ConduitConfig` instance using an explicit prefix,
    /// overriding `Self::prefix()`. Lets the same section type be mounted at
    /// different points in the config tree.
    fn from_config_prefixed(config: &ConduitConfig, prefix: &str) -> Result<Self, ConfigError>;

    /// Construct from a `ConduitConfig` instance, using `Self::prefix()`.
    fn from_config(config: &ConduitConfig) -> Result<Self, ConfigError> {
        Self::from_config_prefixed(config, Self::prefix())
    }
}
