pub mod builder;
pub mod config;
pub mod error;
pub mod guards;
pub mod http;
pub mod interceptors;
pub mod params;
pub mod request_id;
pub mod secure_headers;
pub mod state;
#[cfg(feature = "multipart")]
pub mod multipart;

pub use builder::{AppBuilder, OperationalSignal, ShutdownHandle};
pub use config::{
    ConduitConfig, ConfigError, ConfigProperties, ConfigValidationError, ConfigValue,
    DefaultSecretResolver, FromConfigValue, MissingKeyError, PropertyMeta, RegisteredSection,
    SecretResolver, register_section, registered_sections, validate_keys, validate_section,
};
pub use error::AppError;
pub use guards::{
    Guard, GuardContext, Identity, NoIdentity, PathParams, PreAuthGuard, PreAuthGuardContext,
    RolesGuard,
};
pub use interceptors::{Cacheable, Interceptor, InterceptorContext};
pub use params::{parse_query_string, ParamError};
pub use request_id::{current_request_id, request_id_layer, RequestId};
pub use secure_headers::SecureHeaders;
pub use state::ConduitState;

pub use schemars;
