//! Tree-walking evaluator over the rules AST.
//!
//! Expression evaluation is synchronous and pure (the DSL's safe subset
//! never performs I/O). Action execution is asynchronous: `INSERT`,
//! `UPDATE`, and `TRIGGER` go through an [`ActionSink`] supplied by the
//! host (the gateway's `DbFacade` and event logger); bare named calls go
//! through the [`crate::registry::ActionRegistry`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::ast::{Action, BinOp, Expr, InterpPart, Literal, Rule};
use crate::error::RuleError;
use crate::registry::ActionRegistry;

/// Named root values visible to an evaluating rule: `req`, `res`,
/// `context`, `data`. Assignment targets address into these roots,
/// creating nested objects as needed.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    roots: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self { roots: HashMap::new() }
    }

    pub fn set_root(&mut self, name: impl Into<String>, value: Value) {
        self.roots.insert(name.into(), value);
    }

    pub fn root(&self, name: &str) -> Option<&Value> {
        self.roots.get(name)
    }

    /// Names of every root other than the well-known `req`/`res`/`context`/
    /// `data` ones — created by a bare assignment target such as
    /// `discount = req.body.price * 0.1`.
    pub fn extra_root_names(&self) -> Vec<String> {
        self.roots.keys().filter(|k| !matches!(k.as_str(), "req" | "res" | "context" | "data")).cloned().collect()
    }

    /// Resolve a dotted path against the scope; missing segments resolve
    /// to `Value::Null` rather than erroring (matches the DSL's permissive
    /// field-access semantics).
    pub fn get(&self, path: &[String]) -> Value {
        let Some((head, rest)) = path.split_first() else {
            return Value::Null;
        };
        let mut cur = match self.roots.get(head) {
            Some(v) => v,
            None => return Value::Null,
        };
        for segment in rest {
            match cur.get(segment) {
                Some(next) => cur = next,
                None => return Value::Null,
            }
        }
        cur.clone()
    }

    /// Write `value` at `path`, creating intermediate objects as needed.
    /// The first segment names (or creates) a root; if it already holds a
    /// non-object value and more segments follow, those segments overwrite
    /// it with a fresh object.
    pub fn set(&mut self, path: &[String], value: Value) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.roots.insert(head.clone(), value);
            return;
        }
        let root = self.roots.entry(head.clone()).or_insert_with(|| Value::Object(Map::new()));
        let mut cur = root;
        for segment in &rest[..rest.len() - 1] {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            cur = cur.as_object_mut().unwrap().entry(segment.clone()).or_insert_with(|| Value::Object(Map::new()));
        }
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        cur.as_object_mut().unwrap().insert(rest[rest.len() - 1].clone(), value);
    }
}

/// JS-like truthiness: everything is truthy except `null`, `false`, `0`,
/// and the empty string.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Result<f64, RuleError> {
    value
        .as_f64()
        .ok_or_else(|| RuleError::Eval { message: format!("expected a number, found {value}") })
}

/// The gateway-provided executor for DSL actions that touch the outside
/// world: inserting/updating rows and enqueuing triggers on the event
/// logger. Dyn-compatible via `async-trait` so the evaluator can be handed
/// a trait object at request-handling time.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn insert_into(&self, table: &str, values: &[Value]) -> Result<(), RuleError>;

    /// `filters` is the set of `column == value` equalities extracted from
    /// the rule's `WHERE` clause (see [`extract_equality_filters`]).
    async fn update(
        &self,
        table: &str,
        assignments: &[(String, Value)],
        filters: &[(String, Value)],
    ) -> Result<(), RuleError>;

    async fn trigger(&self, object: Value) -> Result<(), RuleError>;
}

pub struct Evaluator<'a> {
    registry: &'a ActionRegistry,
    sink: &'a dyn ActionSink,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a ActionRegistry, sink: &'a dyn ActionSink) -> Self {
        Self { registry, sink }
    }

    pub fn eval_expr(&self, expr: &Expr, scope: &Scope) -> Result<Value, RuleError> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Path(path) => Ok(scope.get(path)),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval_expr(inner, scope)?))),
            Expr::Neg(inner) => Ok(Value::from(-as_number(&self.eval_expr(inner, scope)?)?)),
            Expr::Binary(lhs, op, rhs) => self.eval_binary(lhs, *op, rhs, scope),
            Expr::Call(name, args) => self.eval_builtin_call(name, args, scope),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (key, value_expr) in fields {
                    map.insert(key.clone(), self.eval_expr(value_expr, scope)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        InterpPart::Text(text) => out.push_str(text),
                        InterpPart::Expr(e) => out.push_str(&value_to_interp_string(&self.eval_expr(e, scope)?)),
                    }
                }
                Ok(Value::String(out))
            }
        }
    }

    fn eval_builtin_call(&self, name: &str, args: &[Expr], scope: &Scope) -> Result<Value, RuleError> {
        match name.to_ascii_uppercase().as_str() {
            "NOW" => Ok(Value::String(chrono::Utc::now().to_rfc3339())),
            "UUID" => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
            _ => {
                // Non-builtin calls are only valid as bare action statements
                // (`Action::Call`), not inside a value-producing expression.
                let _ = args.iter().map(|a| self.eval_expr(a, scope)).collect::<Result<Vec<_>, _>>()?;
                Err(RuleError::UnknownAction(name.to_string()))
            }
        }
    }

    fn eval_binary(&self, lhs: &Expr, op: BinOp, rhs: &Expr, scope: &Scope) -> Result<Value, RuleError> {
        if op == BinOp::And {
            let l = self.eval_expr(lhs, scope)?;
            return if !truthy(&l) { Ok(l) } else { self.eval_expr(rhs, scope) };
        }
        if op == BinOp::Or {
            let l = self.eval_expr(lhs, scope)?;
            return if truthy(&l) { Ok(l) } else { self.eval_expr(rhs, scope) };
        }

        let l = self.eval_expr(lhs, scope)?;
        let r = self.eval_expr(rhs, scope)?;
        match op {
            BinOp::Eq => Ok(Value::Bool(l == r)),
            BinOp::Neq => Ok(Value::Bool(l != r)),
            BinOp::Lt => Ok(Value::Bool(compare(&l, &r)? == std::cmp::Ordering::Less)),
            BinOp::Lte => Ok(Value::Bool(compare(&l, &r)? != std::cmp::Ordering::Greater)),
            BinOp::Gt => Ok(Value::Bool(compare(&l, &r)? == std::cmp::Ordering::Greater)),
            BinOp::Gte => Ok(Value::Bool(compare(&l, &r)? != std::cmp::Ordering::Less)),
            BinOp::Add => match (&l, &r) {
                (Value::String(a), _) => Ok(Value::String(format!("{a}{}", value_to_interp_string(&r)))),
                (_, Value::String(b)) => Ok(Value::String(format!("{}{b}", value_to_interp_string(&l)))),
                _ => Ok(Value::from(as_number(&l)? + as_number(&r)?)),
            },
            BinOp::Sub => Ok(Value::from(as_number(&l)? - as_number(&r)?)),
            BinOp::Mul => Ok(Value::from(as_number(&l)? * as_number(&r)?)),
            BinOp::Div => Ok(Value::from(as_number(&l)? / as_number(&r)?)),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    /// Run a single rule: evaluate its guard, then the `then` or `else`
    /// action. Returns whether an action ran.
    pub async fn run_rule(&self, rule: &Rule, scope: &mut Scope) -> Result<bool, RuleError> {
        if truthy(&self.eval_expr(&rule.condition, scope)?) {
            self.run_action(&rule.action, scope).await?;
            Ok(true)
        } else if let Some(else_action) = &rule.else_action {
            self.run_action(else_action, scope).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn run_action(&self, action: &Action, scope: &mut Scope) -> Result<(), RuleError> {
        match action {
            Action::Assign { target, value } => {
                let evaluated = self.eval_expr(value, scope)?;
                scope.set(target, evaluated);
                Ok(())
            }
            Action::InsertInto { table, values } => {
                let evaluated =
                    values.iter().map(|v| self.eval_expr(v, scope)).collect::<Result<Vec<_>, _>>()?;
                self.sink.insert_into(table, &evaluated).await
            }
            Action::Update { table, assignments, condition } => {
                let evaluated = assignments
                    .iter()
                    .map(|(field, expr)| Ok((field.clone(), self.eval_expr(expr, scope)?)))
                    .collect::<Result<Vec<_>, RuleError>>()?;
                let filters = extract_equality_filters(condition, self, scope)?;
                self.sink.update(table, &evaluated, &filters).await
            }
            Action::Trigger { object } => {
                let evaluated = self.eval_expr(object, scope)?;
                self.sink.trigger(evaluated).await
            }
            Action::Call { name, args } => {
                let evaluated =
                    args.iter().map(|a| self.eval_expr(a, scope)).collect::<Result<Vec<_>, _>>()?;
                self.registry.call(name, evaluated).await.map(|_| ())
            }
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::from(*n),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, RuleError> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_number(a)?
            .partial_cmp(&as_number(b)?)
            .ok_or_else(|| RuleError::Eval { message: "NaN comparison".into() }),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(RuleError::Eval { message: format!("cannot compare {a} and {b}") }),
    }
}

fn value_to_interp_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `WHERE` clauses in the DSL are restricted to a conjunction of
/// `<column> == <expr>` equalities — every rule written against this engine
/// is of this shape, and it keeps action sinks from having to
/// interpret arbitrary AST. Evaluating a richer condition here is a
/// deliberate Non-goal; anything else is an eval error naming the
/// offending subexpression.
fn extract_equality_filters(
    condition: &Expr,
    evaluator: &Evaluator<'_>,
    scope: &Scope,
) -> Result<Vec<(String, Value)>, RuleError> {
    let mut out = Vec::new();
    collect_equality_filters(condition, evaluator, scope, &mut out)?;
    Ok(out)
}

fn collect_equality_filters(
    expr: &Expr,
    evaluator: &Evaluator<'_>,
    scope: &Scope,
    out: &mut Vec<(String, Value)>,
) -> Result<(), RuleError> {
    match expr {
        Expr::Binary(lhs, BinOp::And, rhs) => {
            collect_equality_filters(lhs, evaluator, scope, out)?;
            collect_equality_filters(rhs, evaluator, scope, out)
        }
        Expr::Binary(lhs, BinOp::Eq, rhs) => {
            let column = match lhs.as_ref() {
                Expr::Path(segments) => segments.last().cloned().ok_or_else(|| RuleError::Eval {
                    message: "empty path on left side of WHERE equality".into(),
                })?,
                other => {
                    return Err(RuleError::Eval {
                        message: format!("WHERE clause column must be a field path, found {other:?}"),
                    })
                }
            };
            let value = evaluator.eval_expr(rhs, scope)?;
            out.push((column, value));
            Ok(())
        }
        other => Err(RuleError::Eval {
            message: format!("WHERE clause must be a conjunction of equalities, found {other:?}"),
        }),
    }
}
