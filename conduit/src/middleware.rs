//! Per-route middleware chain: rate limiter → authenticator →
//! ACL gate → rule engine (inbound) → handler → rule engine (outbound, GET
//! only) → finalize. The request-id tagger and request logger wrap the
//! whole router once in `main.rs`; everything here is specific to a single
//! endpoint descriptor, so it is captured by closure and threaded through
//! [`RouteState`] rather than resolved generically through
//! `conduit_core::state::ConduitState`'s `FromRef` machinery — the route
//! table is built at runtime from JSON, so there is exactly one concrete
//! state shape per route, known at registration time (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use base64::Engine;
use conduit_core::params::parse_query_string;
use conduit_core::AppError;
use conduit_rules::eval::truthy;
use conduit_rules::{Direction, Evaluator, Method as RuleMethod, Rule as DslRule, Scope};
use http_body_util::BodyExt;
use serde_json::{json, Value};

use crate::context::GatewayContext;
use crate::descriptor::{AuthMode, EndpointDescriptor, PasswordFn};

/// Per-route state threaded through `axum::middleware::from_fn_with_state`:
/// the shared gateway context plus the one descriptor this route was
/// synthesized from.
#[derive(Clone)]
pub struct RouteState {
    pub ctx: Arc<GatewayContext>,
    pub descriptor: Arc<EndpointDescriptor>,
}

/// An authenticated principal: built from JWT claims (`token` auth) or a
/// successful basic/body credential check against the backing table.
/// Stashed as a request extension so the handler and the rule engine's
/// `context` scope root can both read it.
#[derive(Debug, Clone)]
pub struct Principal {
    pub sub: String,
    pub roles: Vec<String>,
    pub claims: Value,
}

impl Principal {
    fn anonymous() -> Self {
        Self { sub: String::new(), roles: Vec::new(), claims: Value::Null }
    }

    fn to_json(&self) -> Value {
        json!({ "id": self.sub, "roles": self.roles, "claims": self.claims })
    }
}

fn client_ip(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `(route, client-ip)` counters, one bucket per window.
/// Absence of a limit on the descriptor means unlimited.
fn rate_limit_stage(ctx: &GatewayContext, descriptor: &EndpointDescriptor, headers: &axum::http::HeaderMap) -> Option<Response> {
    let route = descriptor.route.as_deref().unwrap_or("");
    let ip = client_ip(headers);
    if let Some(max) = descriptor.rate_limit.per_minute {
        let key = format!("{route}:{ip}:min");
        if !ctx.rate_limits.try_acquire(&key, max, 60) {
            return Some(AppError::RateLimit("rate limit exceeded".into()).into_response());
        }
    }
    if let Some(max) = descriptor.rate_limit.per_hour {
        let key = format!("{route}:{ip}:hour");
        if !ctx.rate_limits.try_acquire(&key, max, 3600) {
            return Some(AppError::RateLimit("rate limit exceeded".into()).into_response());
        }
    }
    None
}

/// Verify `username`/`password` against the descriptor's own backing table
/// (the same `dbTable` the route otherwise serves), using the declared
/// password function. `username_field` must be readable (in `allowRead`)
/// for the lookup to find the row at all.
async fn verify_against_table(
    ctx: &GatewayContext,
    descriptor: &EndpointDescriptor,
    username_field: &str,
    password_field: &str,
    password_fn: PasswordFn,
    username: &str,
    password: &str,
) -> Result<Principal, Response> {
    let mut filters = HashMap::new();
    filters.insert(username_field.to_string(), username.to_string());
    let page = ctx
        .db
        .query(descriptor, &filters, None, Some(1), None)
        .await
        .map_err(|e| AppError::Auth(format!("credential lookup failed: {e}")).into_response())?;
    let row = page.rows.into_iter().next().ok_or_else(|| AppError::Auth("invalid credentials".into()).into_response())?;
    let stored = row
        .get(password_field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Auth("invalid credentials".into()).into_response())?;

    let ok = match password_fn {
        PasswordFn::Bcrypt => bcrypt::verify(password, stored).unwrap_or(false),
        PasswordFn::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(password.as_bytes());
            format!("{:x}", hasher.finalize()) == stored
        }
    };
    if !ok {
        return Err(AppError::Auth("invalid credentials".into()).into_response());
    }

    let sub = row.get(username_field).and_then(|v| v.as_str()).unwrap_or(username).to_string();
    let roles = row
        .get("roles")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    Ok(Principal { sub, roles, claims: Value::Null })
}

fn basic_credentials(headers: &axum::http::HeaderMap) -> Result<(String, String), Response> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("missing authorization header".into()).into_response())?;
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| AppError::Auth("expected a Basic authorization header".into()).into_response())?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AppError::Auth("malformed basic credentials".into()).into_response())?;
    let text = String::from_utf8(decoded).map_err(|_| AppError::Auth("malformed basic credentials".into()).into_response())?;
    let (username, password) =
        text.split_once(':').ok_or_else(|| AppError::Auth("malformed basic credentials".into()).into_response())?;
    Ok((username.to_string(), password.to_string()))
}

async fn authenticate(
    ctx: &GatewayContext,
    descriptor: &EndpointDescriptor,
    headers: &axum::http::HeaderMap,
    body: &Value,
) -> Result<Principal, Response> {
    match &descriptor.auth {
        AuthMode::None => Ok(Principal::anonymous()),
        AuthMode::Token => {
            let header = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::Auth("missing bearer token".into()).into_response())?;
            let token = header
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::Auth("expected a Bearer authorization header".into()).into_response())?;
            let claims = ctx.jwt.validate(token).await.map_err(|e| AppError::Auth(e.to_string()).into_response())?;
            let sub = claims.get("sub").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let roles = claims
                .get("acl")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            Ok(Principal { sub, roles, claims })
        }
        AuthMode::Basic { username_field, password_field, password_fn } => {
            let (username, password) = basic_credentials(headers)?;
            verify_against_table(ctx, descriptor, username_field, password_field, *password_fn, &username, &password).await
        }
        AuthMode::Body { username_field, password_field, password_fn } => {
            let username = body
                .get(username_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppError::Auth(format!("missing `{username_field}` in request body")).into_response())?;
            let password = body
                .get(password_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppError::Auth(format!("missing `{password_field}` in request body")).into_response())?;
            verify_against_table(ctx, descriptor, username_field, password_field, *password_fn, username, password).await
        }
    }
}

/// The `{success, message, error, data, module, code, requestId}` envelope
/// every successful route response shares with [`AppError`]'s error
/// formatting, so callers see one consistent shape regardless of outcome.
pub fn success_envelope(data: Value) -> Value {
    json!({
        "success": true,
        "message": "ok",
        "error": Value::Null,
        "data": data,
        "module": Value::Null,
        "code": 200,
        "requestId": conduit_core::request_id::current_request_id(),
    })
}

fn issue_token_response(ctx: &GatewayContext, principal: &Principal) -> Response {
    let acl = principal.roles.join(",");
    match ctx.issue_token(&principal.sub, &acl) {
        Ok(token) => Json(success_envelope(json!({ "token": token }))).into_response(),
        Err(e) => AppError::Internal(format!("failed to issue token: {e}")).into_response(),
    }
}

fn headers_to_json(headers: &axum::http::HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_string(), Value::String(v.to_string()));
        }
    }
    Value::Object(map)
}

fn query_to_json(query: Option<&str>) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in parse_query_string(query) {
        map.insert(k, Value::String(v));
    }
    Value::Object(map)
}

/// Fold virtual-column rule assignments into `req.body` so the handler's
/// persisted record carries them: the `data` scratch root's fields, and any
/// bare assignment target outside the reserved `req`/`res`/`context`/`data`
/// roots (e.g. `discount = req.body.price * 0.1`), both become top-level
/// fields on the request body before the handler runs.
fn fold_inbound_assignments(scope: &mut Scope) {
    let data_fields = matches!(scope.root("data"), Some(Value::Object(data)) if !data.is_empty());
    let extra_roots = scope.extra_root_names();
    if !data_fields && extra_roots.is_empty() {
        return;
    }

    let mut body = scope.get(&["req".to_string(), "body".to_string()]);
    if !body.is_object() {
        body = json!({});
    }
    let map = body.as_object_mut().expect("just coerced to an object above");

    if let Some(Value::Object(data)) = scope.root("data") {
        for (k, v) in data {
            map.insert(k.clone(), v.clone());
        }
    }

    for name in extra_roots {
        if let Some(v) = scope.root(&name) {
            map.insert(name, v.clone());
        }
    }

    scope.set(&["req".to_string(), "body".to_string()], body);
}

/// Evaluate the short-circuit policy against the `res` scope root after
/// inbound rules run: any non-empty `res.data`, truthy `res.error`, or
/// `status ≠ 200` terminates the chain and writes the envelope. `status ==
/// 600` is rewritten to `200` for compatibility.
fn check_short_circuit(scope: &Scope) -> Option<Response> {
    let status_v = scope.get(&["res".to_string(), "status".to_string()]);
    let error_v = scope.get(&["res".to_string(), "error".to_string()]);
    let data_v = scope.get(&["res".to_string(), "data".to_string()]);

    let status_num = status_v.as_i64().unwrap_or(200);
    let has_data = !matches!(&data_v, Value::Null) && data_v != json!({});
    let has_error = truthy(&error_v);

    if !(has_data || has_error || status_num != 200) {
        return None;
    }

    let rewritten = if status_num == 600 { 200 } else { status_num };
    let code = axum::http::StatusCode::from_u16(rewritten.clamp(100, 599) as u16).unwrap_or(axum::http::StatusCode::OK);
    let body = json!({
        "success": !has_error,
        "message": if has_error { error_v.clone() } else { Value::String("ok".to_string()) },
        "error": error_v,
        "data": data_v,
        "module": Value::Null,
        "code": rewritten,
        "requestId": conduit_core::request_id::current_request_id(),
    });
    Some((code, Json(body)).into_response())
}

/// Outbound (GET-only) rules operate over the response envelope's `data`
/// field — an array gets per-row treatment, a single object is treated as
/// one row — via expression interpolation evaluated in a per-row `data`
/// scope.
async fn apply_outbound_rules(ctx: &GatewayContext, rules: &[&DslRule], response: Response) -> Response {
    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return AppError::Internal("failed to read response body".into()).into_response(),
    };
    let mut envelope: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    let evaluator = Evaluator::new(&ctx.actions, ctx.as_ref());
    if let Some(data) = envelope.get_mut("data") {
        match data {
            Value::Array(rows) => {
                for row in rows.iter_mut() {
                    let mut scope = Scope::new();
                    scope.set_root("data", row.clone());
                    for rule in rules {
                        if let Err(err) = evaluator.run_rule(rule, &mut scope).await {
                            tracing::warn!(error = %err, "outbound rule evaluation failed");
                        }
                    }
                    *row = scope.get(&["data".to_string()]);
                }
            }
            Value::Object(_) => {
                let mut scope = Scope::new();
                scope.set_root("data", data.clone());
                for rule in rules {
                    if let Err(err) = evaluator.run_rule(rule, &mut scope).await {
                        tracing::warn!(error = %err, "outbound rule evaluation failed");
                    }
                }
                *data = scope.get(&["data".to_string()]);
            }
            _ => {}
        }
    }

    let new_bytes = serde_json::to_vec(&envelope).unwrap_or_else(|_| bytes.to_vec());
    let mut new_parts = parts;
    new_parts.headers.insert(CONTENT_LENGTH, HeaderValue::from_str(&new_bytes.len().to_string()).unwrap());
    Response::from_parts(new_parts, Body::from(new_bytes))
}

/// The full per-route middleware chain, installed via
/// `axum::middleware::from_fn_with_state(route_state, gateway_chain)`.
pub async fn gateway_chain(State(state): State<RouteState>, req: Request, next: Next) -> Response {
    let RouteState { ctx, descriptor } = state;

    if let Some(resp) = rate_limit_stage(&ctx, &descriptor, req.headers()) {
        return resp;
    }

    let method = req.method().clone();
    let uri = req.uri().clone();
    let (parts, body) = req.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return AppError::Validation(format!("failed to read request body: {err}")).into_response(),
    };
    let body_json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    let principal = match authenticate(&ctx, &descriptor, &parts.headers, &body_json).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if !descriptor.acl.is_empty() && !descriptor.acl.iter().any(|role| principal.roles.contains(role)) {
        return AppError::Forbidden("insufficient role for this endpoint".into()).into_response();
    }

    // Body-auth endpoints always answer with a fresh token, never reaching
    // the synthesized handler.
    if matches!(descriptor.auth, AuthMode::Body { .. }) {
        return issue_token_response(&ctx, &principal);
    }

    let resource = descriptor.db_table.clone().unwrap_or_else(|| descriptor.route.clone().unwrap_or_default());
    let rule_method = RuleMethod::parse(method.as_str());

    let mut scope = Scope::new();
    scope.set_root(
        "req",
        json!({
            "method": method.as_str(),
            "headers": headers_to_json(&parts.headers),
            "query": query_to_json(uri.query()),
            "body": body_json,
        }),
    );
    scope.set_root("context", json!({ "user": principal.to_json() }));
    scope.set_root("data", json!({}));
    scope.set_root("res", json!({ "status": 200, "error": Value::Null, "data": Value::Null }));

    if let Some(rmethod) = rule_method {
        let ruleset = ctx.rules.current();
        let rules = ruleset.bucket(rmethod, &resource, Direction::In);
        if !rules.is_empty() {
            let evaluator = Evaluator::new(&ctx.actions, ctx.as_ref());
            for rule in rules {
                if let Err(err) = evaluator.run_rule(rule, &mut scope).await {
                    tracing::warn!(error = %err, route = %resource, "inbound rule evaluation failed");
                }
            }
        }
    }

    if let Some(short_circuit) = check_short_circuit(&scope) {
        return short_circuit;
    }

    fold_inbound_assignments(&mut scope);

    let mutated_body = scope.get(&["req".to_string(), "body".to_string()]);
    let new_body_bytes = if mutated_body.is_null() { Vec::new() } else { serde_json::to_vec(&mutated_body).unwrap_or_default() };
    let mut next_req = Request::from_parts(parts, Body::from(new_body_bytes));
    next_req.extensions_mut().insert(principal);
    next_req.extensions_mut().insert(descriptor.clone());

    let response = next.run(next_req).await;

    if matches!(rule_method, Some(RuleMethod::Get)) {
        let ruleset = ctx.rules.current();
        let outbound = ruleset.bucket(RuleMethod::Get, &resource, Direction::Out);
        if !outbound.is_empty() {
            return apply_outbound_rules(&ctx, &outbound, response).await;
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_circuit_skips_on_default_res() {
        let mut scope = Scope::new();
        scope.set_root("res", json!({ "status": 200, "error": Value::Null, "data": Value::Null }));
        assert!(check_short_circuit(&scope).is_none());
    }

    #[test]
    fn short_circuit_rewrites_600_to_200() {
        let mut scope = Scope::new();
        scope.set_root("res", json!({ "status": 600, "error": Value::Null, "data": { "ok": true } }));
        let resp = check_short_circuit(&scope).expect("600 with data short-circuits");
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn short_circuit_triggers_on_truthy_error() {
        let mut scope = Scope::new();
        scope.set_root("res", json!({ "status": 200, "error": "bad input", "data": Value::Null }));
        let resp = check_short_circuit(&scope).expect("truthy error short-circuits");
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn fold_inbound_assignments_merges_data_and_bare_roots_into_body() {
        let mut scope = Scope::new();
        scope.set_root("req", json!({ "body": { "price": 100.0 } }));
        scope.set_root("data", json!({ "taxRate": 0.07 }));
        scope.set(&["discount".to_string()], json!(10.0));

        fold_inbound_assignments(&mut scope);

        let body = scope.get(&["req".to_string(), "body".to_string()]);
        assert_eq!(body, json!({ "price": 100.0, "taxRate": 0.07, "discount": 10.0 }));
    }

    #[test]
    fn fold_inbound_assignments_coerces_non_object_body_to_object() {
        let mut scope = Scope::new();
        scope.set_root("req", json!({ "body": Value::Null }));
        scope.set_root("data", json!({}));
        scope.set(&["discount".to_string()], json!(5.0));

        fold_inbound_assignments(&mut scope);

        let body = scope.get(&["req".to_string(), "body".to_string()]);
        assert_eq!(body, json!({ "discount": 5.0 }));
    }
}
