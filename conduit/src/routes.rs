//! Route synthesizer: turns each loaded endpoint descriptor
//! into one or more axum routes, each wrapped in the per-route
//! [`crate::middleware::gateway_chain`]. Database descriptors get CRUD
//! handlers over [`crate::db::DbFacade`]; proxy, plugin, static, and
//! file-upload descriptors get their own handler shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, delete, get, post, put, MethodRouter};
use axum::Router;
use conduit_cache::CacheStore;
use conduit_core::params::parse_query_string;
use conduit_core::AppError;
use conduit_static::StaticRoot;
use serde_json::{json, Map, Value};

use crate::context::GatewayContext;
use crate::db::DbError;
use crate::descriptor::{EndpointDescriptor, HttpMethod, ProxySpec, RouteType};
use crate::middleware::{gateway_chain, success_envelope, RouteState};

/// Build the full HTTP router from every descriptor in the currently
/// active config snapshot.
pub fn build_router(ctx: Arc<GatewayContext>) -> Router {
    let mut router = Router::new();
    let config = ctx.config.current();
    for descriptor in config.descriptors.iter().cloned() {
        router = match descriptor.route_type {
            RouteType::Database => register_database(router, ctx.clone(), descriptor),
            RouteType::Proxy => register_proxy(router, ctx.clone(), descriptor),
            RouteType::Plugin => register_plugin(router, ctx.clone(), descriptor),
            RouteType::Static => register_static(router, ctx.clone(), descriptor),
            RouteType::FileUpload => register_file_upload(router, ctx.clone(), descriptor),
            // `def` registers schema only; `dynamic` has no fixed shape to
            // synthesize generically and is left for a future plugin-backed
            // extension point.
            RouteType::Def | RouteType::Dynamic => router,
        };
    }
    router
}

/// Append one `{key}` path segment per declared primary key, axum 0.8's
/// brace path-param syntax.
fn key_path(route: &str, keys: &[String]) -> String {
    let mut path = route.trim_end_matches('/').to_string();
    for key in keys {
        path.push('/');
        path.push('{');
        path.push_str(key);
        path.push('}');
    }
    path
}

fn wrap(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, method_router: MethodRouter) -> MethodRouter {
    method_router.layer(from_fn_with_state(RouteState { ctx, descriptor }, gateway_chain))
}

fn db_error(err: DbError) -> AppError {
    match err {
        DbError::NotFound => AppError::NotFound("row not found".into()),
        DbError::InvalidIdentifier(m) => AppError::Validation(m),
        DbError::Unavailable(m) => AppError::Db { message: m, transient: true },
        DbError::Query(m) => AppError::Db { message: m, transient: false },
    }
}

fn project_fields(row: Value, fields: &[&str]) -> Value {
    let Value::Object(obj) = row else { return row };
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = obj.get(*field) {
            out.insert((*field).to_string(), value.clone());
        }
    }
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Database (CRUD)
// ---------------------------------------------------------------------------

fn register_database(mut router: Router, ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>) -> Router {
    let Some(route) = descriptor.route.clone() else { return router };
    let methods = descriptor.allow_methods.clone();

    if methods.contains(&HttpMethod::Get) {
        let list_ctx = ctx.clone();
        let list_descriptor = descriptor.clone();
        let list = get(move |Query(params): Query<HashMap<String, String>>| {
            let ctx = list_ctx.clone();
            let descriptor = list_descriptor.clone();
            async move { list_handler(ctx, descriptor, params).await }
        });
        router = router.route(&route, wrap(ctx.clone(), descriptor.clone(), list));

        if !descriptor.keys.is_empty() {
            let by_key_ctx = ctx.clone();
            let by_key_descriptor = descriptor.clone();
            let by_key = get(move |Path(params): Path<HashMap<String, String>>| {
                let ctx = by_key_ctx.clone();
                let descriptor = by_key_descriptor.clone();
                async move { by_key_handler(ctx, descriptor, params).await }
            });
            let path = key_path(&route, &descriptor.keys);
            router = router.route(&path, wrap(ctx.clone(), descriptor.clone(), by_key));
        }
    }

    if methods.contains(&HttpMethod::Post) {
        let create_ctx = ctx.clone();
        let create_descriptor = descriptor.clone();
        let create = post(move |Json(body): Json<Value>| {
            let ctx = create_ctx.clone();
            let descriptor = create_descriptor.clone();
            async move { create_handler(ctx, descriptor, body).await }
        });
        router = router.route(&route, wrap(ctx.clone(), descriptor.clone(), create));
    }

    if !descriptor.keys.is_empty() && (methods.contains(&HttpMethod::Put) || methods.contains(&HttpMethod::Patch)) {
        let update_ctx = ctx.clone();
        let update_descriptor = descriptor.clone();
        let update = put(move |Path(keys): Path<HashMap<String, String>>, Json(body): Json<Value>| {
            let ctx = update_ctx.clone();
            let descriptor = update_descriptor.clone();
            async move { update_handler(ctx, descriptor, keys, body).await }
        });
        let path = key_path(&route, &descriptor.keys);
        router = router.route(&path, wrap(ctx.clone(), descriptor.clone(), update));
    }

    if !descriptor.keys.is_empty() && methods.contains(&HttpMethod::Delete) {
        let delete_ctx = ctx.clone();
        let delete_descriptor = descriptor.clone();
        let del = delete(move |Path(keys): Path<HashMap<String, String>>| {
            let ctx = delete_ctx.clone();
            let descriptor = delete_descriptor.clone();
            async move { delete_handler(ctx, descriptor, keys).await }
        });
        let path = key_path(&route, &descriptor.keys);
        router = router.route(&path, wrap(ctx, descriptor, del));
    }

    router
}

/// `_fields` (comma list), `_sort` (`col`, `-col`, or `col:desc`), `_page`/
/// `_limit` pagination, everything else an equality filter — all layered
/// over the per-descriptor TTL cache keyed by route + raw query params.
async fn list_handler(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, mut params: HashMap<String, String>) -> Response {
    let fields = params.remove("_fields");
    let sort = params.remove("_sort");
    let page: Option<u64> = params.remove("_page").and_then(|v| v.parse().ok());
    let limit: Option<u64> = params.remove("_limit").and_then(|v| v.parse().ok());
    let offset = match (page, limit) {
        (Some(page), Some(limit)) if page > 0 => Some((page.saturating_sub(1)).saturating_mul(limit)),
        _ => None,
    };
    let sort_spec: Option<(String, bool)> = sort.as_deref().map(|s| {
        if let Some(col) = s.strip_prefix('-') {
            (col.to_string(), false)
        } else if let Some((col, dir)) = s.split_once(':') {
            (col.to_string(), !dir.eq_ignore_ascii_case("desc"))
        } else {
            (s.to_string(), true)
        }
    });

    let cache_key = (descriptor.cache > 0).then(|| {
        let mut sorted: Vec<(&String, &String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let query_part: String = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        format!("db:{}:{}:{}", descriptor.route.as_deref().unwrap_or(""), query_part, sort.as_deref().unwrap_or(""))
    });

    if let Some(key) = &cache_key {
        if let Some(bytes) = ctx.cache.get(key).await {
            if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                return Json(success_envelope(value)).into_response();
            }
        }
    }

    let page_result = match ctx
        .db
        .query(&descriptor, &params, sort_spec.as_ref().map(|(c, asc)| (c.as_str(), *asc)), limit, offset)
        .await
    {
        Ok(page) => page,
        Err(err) => return db_error(err).into_response(),
    };

    let rows = if let Some(fields) = fields.as_deref() {
        let wanted: Vec<&str> = fields.split(',').map(str::trim).collect();
        page_result.rows.into_iter().map(|row| project_fields(row, &wanted)).collect()
    } else {
        page_result.rows
    };

    let data = json!({ "items": rows, "total": page_result.total });
    if let Some(key) = cache_key {
        let bytes = serde_json::to_vec(&data).unwrap_or_default();
        ctx.cache.set(&key, bytes.into(), Duration::from_secs(descriptor.cache)).await;
    }
    Json(success_envelope(data)).into_response()
}

async fn by_key_handler(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, keys: HashMap<String, String>) -> Response {
    match ctx.db.read_by_key(&descriptor, &keys).await {
        Ok(row) => Json(success_envelope(row)).into_response(),
        Err(err) => db_error(err).into_response(),
    }
}

async fn create_handler(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, body: Value) -> Response {
    let Value::Object(map) = body else {
        return AppError::Validation("request body must be a JSON object".into()).into_response();
    };
    match ctx.db.create(&descriptor, &map).await {
        Ok(row) => (StatusCode::CREATED, Json(success_envelope(row))).into_response(),
        Err(err) => db_error(err).into_response(),
    }
}

async fn update_handler(
    ctx: Arc<GatewayContext>,
    descriptor: Arc<EndpointDescriptor>,
    keys: HashMap<String, String>,
    body: Value,
) -> Response {
    let Value::Object(map) = body else {
        return AppError::Validation("request body must be a JSON object".into()).into_response();
    };
    match ctx.db.update(&descriptor, &keys, &map).await {
        Ok(row) => Json(success_envelope(row)).into_response(),
        Err(err) => db_error(err).into_response(),
    }
}

async fn delete_handler(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, keys: HashMap<String, String>) -> Response {
    match ctx.db.delete(&descriptor, &keys).await {
        Ok(()) => Json(success_envelope(Value::Null)).into_response(),
        Err(err) => db_error(err).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Proxy (forwards to targetUrl)
// ---------------------------------------------------------------------------

fn register_proxy(mut router: Router, ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>) -> Router {
    let (Some(route), Some(proxy)) = (descriptor.route.clone(), descriptor.proxy.clone()) else { return router };

    let handler_ctx = ctx.clone();
    let handler_descriptor = descriptor.clone();
    let handler = any(move |req: Request| {
        let ctx = handler_ctx.clone();
        let descriptor = handler_descriptor.clone();
        let proxy = proxy.clone();
        async move { proxy_handler(ctx, descriptor, proxy, req).await }
    });
    router.route(&route, wrap(ctx, descriptor, handler))
}

async fn proxy_handler(ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>, proxy: ProxySpec, req: Request) -> Response {
    let method = req.method().clone();
    if !descriptor.allow_methods.is_empty() && !descriptor.allow_methods.iter().any(|m| m.as_axum() == method) {
        return AppError::Custom {
            status: StatusCode::METHOD_NOT_ALLOWED,
            body: json!({ "message": "method not allowed for this proxy route" }),
        }
        .into_response();
    }

    let query = req.uri().query().map(str::to_string);
    let (parts, body) = req.into_parts();
    let body_bytes = match http_body_util::BodyExt::collect(body).await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return AppError::Internal(format!("failed to read request body: {err}")).into_response(),
    };

    let outbound_query: Vec<(String, String)> = parse_query_string(query.as_deref())
        .into_iter()
        .map(|(k, v)| (proxy.query_mapping.get(&k).cloned().unwrap_or(k), v))
        .collect();

    let mut outbound = ctx.http_client.request(method, &proxy.target_url).query(&outbound_query);
    if let Some(content_type) = parts.headers.get(axum::http::header::CONTENT_TYPE) {
        outbound = outbound.header(axum::http::header::CONTENT_TYPE, content_type.clone());
    }
    if !body_bytes.is_empty() {
        outbound = outbound.body(body_bytes.to_vec());
    }

    let upstream = match outbound.send().await {
        Ok(resp) => resp,
        Err(err) => return AppError::Internal(format!("proxy request failed: {err}")).into_response(),
    };
    let status = upstream.status();
    let mut payload: Value = upstream.json().await.unwrap_or(Value::Null);

    for step in &proxy.enrich {
        let url = format!("{}{}", ctx.internal_base_url.trim_end_matches('/'), step.route);
        match ctx.http_client.get(&url).send().await {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(enriched) => {
                    if let Value::Object(obj) = &mut payload {
                        obj.insert(step.merge_as.clone(), enriched);
                    }
                }
                Err(err) => tracing::warn!(error = %err, route = %step.route, "enrich step returned non-JSON response"),
            },
            Err(err) => tracing::warn!(error = %err, route = %step.route, "enrich step request failed"),
        }
    }

    if !proxy.response_mapping.is_empty() {
        if let Value::Object(obj) = payload {
            let mut mapped = Map::new();
            for (key, value) in obj {
                let target_key = proxy.response_mapping.get(&key).cloned().unwrap_or(key);
                mapped.insert(target_key, value);
            }
            payload = Value::Object(mapped);
        }
    }

    let code = status.as_u16();
    let body = json!({
        "success": status.is_success(),
        "message": if status.is_success() { "ok" } else { "upstream error" },
        "error": if status.is_success() { Value::Null } else { Value::String(status.to_string()) },
        "data": payload,
        "module": Value::Null,
        "code": code,
        "requestId": conduit_core::request_id::current_request_id(),
    });
    (StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY), Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

fn register_plugin(mut router: Router, ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>) -> Router {
    let (Some(route), Some(name)) = (descriptor.route.clone(), descriptor.business_logic.clone()) else { return router };

    if let Err(err) = ctx.plugins.load(&name) {
        tracing::warn!(plugin = %name, error = %err, "failed to load plugin at route registration");
    }

    let root_ctx = ctx.clone();
    let root_name = name.clone();
    let root_handler = any(move |req: Request| {
        let ctx = root_ctx.clone();
        let name = root_name.clone();
        async move { plugin_handler(ctx, name, String::new(), req).await }
    });
    router = router.route(&route, wrap(ctx.clone(), descriptor.clone(), root_handler));

    let tail_ctx = ctx.clone();
    let tail_name = name;
    let tail_handler = any(move |Path(tail): Path<String>, req: Request| {
        let ctx = tail_ctx.clone();
        let name = tail_name.clone();
        async move { plugin_handler(ctx, name, format!("/{tail}"), req).await }
    });
    let tail_path = format!("{}/{{*tail}}", route.trim_end_matches('/'));
    router.route(&tail_path, wrap(ctx, descriptor, tail_handler))
}

async fn plugin_handler(ctx: Arc<GatewayContext>, name: String, route: String, req: Request) -> Response {
    match ctx.plugins.handle(&name, &route, req).await {
        Ok(response) => response,
        Err(err) => AppError::Plugin(err.to_string()).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

fn register_static(mut router: Router, ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>) -> Router {
    let (Some(route), Some(path)) = (descriptor.route.clone(), descriptor.static_path.clone()) else { return router };
    let root = StaticRoot::new(path);

    let tail_root = root.clone();
    let tail_handler = get(move |Path(tail): Path<String>| {
        let root = tail_root.clone();
        async move { root.serve(&tail).await }
    });
    let tail_path = format!("{}/{{*tail}}", route.trim_end_matches('/'));
    router = router.route(&tail_path, wrap(ctx.clone(), descriptor.clone(), tail_handler));

    let index_handler = get(move || {
        let root = root.clone();
        async move { root.serve(".").await }
    });
    router.route(&route, wrap(ctx, descriptor, index_handler))
}

// ---------------------------------------------------------------------------
// FileUpload
// ---------------------------------------------------------------------------

fn register_file_upload(mut router: Router, ctx: Arc<GatewayContext>, descriptor: Arc<EndpointDescriptor>) -> Router {
    let (Some(route), Some(max_size)) = (descriptor.route.clone(), descriptor.max_size) else { return router };
    // `staticPath` is repurposed as the upload destination directory for
    // this route kind — the descriptor has no separate field for it.
    let upload_dir = descriptor.static_path.clone().unwrap_or_else(|| "./uploads".to_string());

    let handler = post(move |multipart: Multipart| {
        let dir = upload_dir.clone();
        async move { file_upload_handler(dir, max_size, multipart).await }
    });
    router.route(&route, wrap(ctx, descriptor, handler))
}

async fn file_upload_handler(dir: String, max_size: u64, mut multipart: Multipart) -> Response {
    if let Err(err) = tokio::fs::create_dir_all(&dir).await {
        return AppError::Internal(format!("failed to prepare upload directory: {err}")).into_response();
    }

    let mut saved = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return AppError::Validation(format!("malformed multipart body: {err}")).into_response(),
        };
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return AppError::Validation(format!("failed to read upload field: {err}")).into_response(),
        };
        if bytes.len() as u64 > max_size {
            return AppError::Validation(format!("file exceeds maximum size of {max_size} bytes")).into_response();
        }

        let stored_name = format!("{}-{}", uuid::Uuid::new_v4(), original_name);
        let dest = std::path::Path::new(&dir).join(&stored_name);
        if let Err(err) = tokio::fs::write(&dest, &bytes).await {
            return AppError::Internal(format!("failed to persist upload: {err}")).into_response();
        }
        saved.push(json!({ "originalName": original_name, "storedName": stored_name, "size": bytes.len() }));
    }

    Json(success_envelope(json!({ "files": saved }))).into_response()
}
