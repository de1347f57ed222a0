use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::schema::{CompiledSchema, ParamSchema};

/// Executes one registered tool. Arguments have already been validated
/// against the tool's [`ParamSchema`] when this is called.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, arguments: Value) -> anyhow::Result<Value>;
}

/// Failure of a single invocation. Recovered by the orchestrator and
/// reported back to the model as a tool-error turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("tool '{0}' does not exist")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("'{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },

    #[error("'{tool}' timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("tool '{tool}' has an invalid parameter schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// What the model (and API clients) are told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub struct ToolDefinition {
    name: String,
    description: String,
    schema: ParamSchema,
    validator: CompiledSchema,
    executor: Arc<dyn ToolExecutor>,
}

impl ToolDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.to_json_schema(),
        }
    }

    /// Validates and then runs the tool, bounded by `timeout`.
    pub async fn invoke(&self, arguments: Value, timeout: Duration) -> Result<Value, ToolError> {
        info!(tool = %self.name, %arguments, "tool call");

        self.validator
            .validate(&arguments)
            .map_err(|reason| ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason,
            })?;

        match tokio::time::timeout(timeout, self.executor.execute(arguments)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ToolError::Execution {
                tool: self.name.clone(),
                reason: format!("{e:#}"),
            }),
            Err(_) => Err(ToolError::TimedOut {
                tool: self.name.clone(),
                after: timeout,
            }),
        }
    }
}

/// Closed table of tools the assistant may call, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParamSchema,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let validator = schema
            .compile()
            .map_err(|reason| RegistryError::InvalidSchema {
                tool: name.clone(),
                reason,
            })?;

        self.by_name.insert(name.clone(), self.tools.len());
        self.tools.push(ToolDefinition {
            name,
            description: description.into(),
            schema,
            validator,
            executor,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition, ToolError> {
        self.by_name
            .get(name)
            .map(|&index| &self.tools[index])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Resolves `name` and invokes it. Every failure comes back as a
    /// [`ToolError`]; nothing here panics or aborts the caller.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, ToolError> {
        let result = match self.lookup(name) {
            Ok(tool) => tool.invoke(arguments, timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(tool = %name, error = %e, "tool invocation failed");
        }
        result
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDefinition::spec).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::schema::ParamType;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolExecutor for Counting {
        async fn execute(&self, arguments: Value) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(arguments)
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolExecutor for Failing {
        async fn execute(&self, _arguments: Value) -> anyhow::Result<Value> {
            anyhow::bail!("store unreachable")
        }
    }

    struct Sleepy;

    #[async_trait]
    impl ToolExecutor for Sleepy {
        async fn execute(&self, _arguments: Value) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Value::Null)
        }
    }

    fn meal_schema() -> ParamSchema {
        ParamSchema::empty().required("mealId", ParamType::String, "The meal")
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register("getMealDetails", "first", meal_schema(), Arc::new(Counting::default()))
            .unwrap();

        let err = registry
            .register("getMealDetails", "second", meal_schema(), Arc::new(Counting::default()))
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateName("getMealDetails".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_miss_is_unknown_tool() {
        let registry = ToolRegistry::new();

        assert_eq!(
            registry.lookup("deleteEverything").err(),
            Some(ToolError::UnknownTool("deleteEverything".into()))
        );
    }

    #[test]
    fn specs_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["b", "a", "c"] {
            registry
                .register(name, "", ParamSchema::empty(), Arc::new(Counting::default()))
                .unwrap();
        }

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_executor() {
        let executor = Arc::new(Counting::default());
        let mut registry = ToolRegistry::new();
        registry
            .register("getMealDetails", "", meal_schema(), executor.clone())
            .unwrap();

        let err = registry
            .invoke("getMealDetails", json!({ "mealId": 42 }), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_arguments_are_executed() {
        let executor = Arc::new(Counting::default());
        let mut registry = ToolRegistry::new();
        registry
            .register("getMealDetails", "", meal_schema(), executor.clone())
            .unwrap();

        let value = registry
            .invoke("getMealDetails", json!({ "mealId": "m1" }), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(value, json!({ "mealId": "m1" }));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn executor_faults_carry_the_reason() {
        let mut registry = ToolRegistry::new();
        registry
            .register("getAreas", "", ParamSchema::empty(), Arc::new(Failing))
            .unwrap();

        let err = registry.invoke("getAreas", json!({}), TIMEOUT).await.unwrap_err();

        assert_eq!(
            err,
            ToolError::Execution {
                tool: "getAreas".into(),
                reason: "store unreachable".into(),
            }
        );
    }

    #[tokio::test]
    async fn slow_executors_time_out() {
        let mut registry = ToolRegistry::new();
        registry
            .register("getAreas", "", ParamSchema::empty(), Arc::new(Sleepy))
            .unwrap();

        let err = registry
            .invoke("getAreas", json!({}), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::TimedOut { .. }));
    }
}
