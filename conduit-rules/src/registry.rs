//! Named action registry: the host application registers custom
//! side-effecting actions (`sendWelcomeEmail`, `chargeCard`, ...) that a
//! bare `name(args...)` statement in the DSL can invoke.
//!
//! Pure, deterministic built-ins used *inside expressions* (`NOW()`,
//! `UUID()`) are handled directly by [`crate::eval::Evaluator::eval_expr`]
//! and do not go through this registry — they never need to run
//! asynchronously or touch the outside world.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RuleError;

pub type ActionFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, RuleError>> + Send + Sync>;

/// A table of `name -> async fn(args) -> Value` entries, looked up when a
/// rule executes a bare `Action::Call`.
#[derive(Default)]
pub struct ActionRegistry {
    fns: DashMap<String, ActionFn>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self { fns: DashMap::new() }
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, RuleError>> + Send + 'static,
    {
        self.fns.insert(name.into(), Arc::new(move |args| Box::pin(f(args))));
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, RuleError> {
        let f = self
            .fns
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuleError::UnknownAction(name.to_string()))?;
        f(args).await
    }

    /// Names of every action registered via [`Self::register`], for
    /// admin-facing enumeration (e.g. the `listActions` command).
    pub fn registered_names(&self) -> Vec<String> {
        self.fns.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_action_errors() {
        let registry = ActionRegistry::new();
        let err = registry.call("sendWelcomeEmail", vec![]).await.unwrap_err();
        assert!(matches!(err, RuleError::UnknownAction(name) if name == "sendWelcomeEmail"));
    }

    #[tokio::test]
    async fn registered_action_runs() {
        let registry = ActionRegistry::new();
        registry.register("double", |args| async move {
            let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Value::from(n * 2.0))
        });
        let result = registry.call("double", vec![Value::from(21)]).await.unwrap();
        assert_eq!(result, Value::from(42.0));
    }

    #[tokio::test]
    async fn registered_names_lists_every_registration() {
        let registry = ActionRegistry::new();
        registry.register("sendWelcomeEmail", |_| async { Ok(Value::Null) });
        registry.register("chargeCard", |_| async { Ok(Value::Null) });
        let mut names = registry.registered_names();
        names.sort();
        assert_eq!(names, vec!["chargeCard".to_string(), "sendWelcomeEmail".to_string()]);
    }
}
