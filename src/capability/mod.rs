//! Capability traits: Actions and Oracles
//!
//! A capability is a named, schema-described unit of behavior. Oracles
//! supply read-only context for the planner, Actions perform a task for the
//! current goal. Bodies are invoked through `consult_oracle` /
//! `invoke_action`, which return a lazy `Deferred` computation: nothing runs
//! until it is awaited, and failures (including panics inside the body)
//! come back as `Err` values.

use crate::error::OrchestrationError;
use crate::models::Goal;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Lazily evaluated capability result
pub type Deferred<'a, T> = BoxFuture<'a, Result<T>>;

/// Shared shape of every registrable capability
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

impl CapabilityDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        output_schema: Value,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
        }
    }
}

/// Supplies context data; must not mutate goal state
#[async_trait]
pub trait Oracle: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn description(&self) -> &str {
        &self.descriptor().description
    }

    async fn consult(&self, args: Value) -> Result<Value>;
}

/// Performs a task for the current goal. The goal carries its history.
#[async_trait]
pub trait Action: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn description(&self) -> &str {
        &self.descriptor().description
    }

    async fn perform(&self, input: Value, goal: &Goal) -> Result<Value>;
}

/// Deferred oracle invocation. Input is not validated here.
pub fn consult_oracle<'a>(oracle: &'a dyn Oracle, args: Value) -> Deferred<'a, Value> {
    let name = oracle.name().to_string();
    capture(name, async move { oracle.consult(args).await })
}

/// Deferred action invocation. Input is not validated here.
pub fn invoke_action<'a>(action: &'a dyn Action, input: Value, goal: &'a Goal) -> Deferred<'a, Value> {
    let name = action.name().to_string();
    capture(name, async move { action.perform(input, goal).await })
}

fn capture<'a, F>(name: String, body: F) -> Deferred<'a, Value>
where
    F: Future<Output = Result<Value>> + Send + 'a,
{
    AssertUnwindSafe(body)
        .catch_unwind()
        .map(move |outcome| match outcome {
            Ok(result) => result,
            Err(panic) => Err(OrchestrationError::CapabilityPanicked(format!(
                "{}: {}",
                name,
                panic_message(panic.as_ref())
            ))),
        })
        .boxed()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//
// ========== Closure-backed capabilities ==========
//

type OracleBody = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
type ActionBody = Arc<dyn Fn(Value, Goal) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Oracle defined from a descriptor and an async closure
pub struct FnOracle {
    descriptor: CapabilityDescriptor,
    body: OracleBody,
}

impl FnOracle {
    pub fn define<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        output_schema: Value,
        input_schema: Value,
        body: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            descriptor: CapabilityDescriptor::new(name, description, output_schema, input_schema),
            body: Arc::new(move |args| body(args).boxed()),
        }
    }
}

#[async_trait]
impl Oracle for FnOracle {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn consult(&self, args: Value) -> Result<Value> {
        (self.body)(args).await
    }
}

/// Action defined from a descriptor and an async closure.
/// The closure receives a snapshot of the goal.
pub struct FnAction {
    descriptor: CapabilityDescriptor,
    body: ActionBody,
}

impl FnAction {
    pub fn define<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        output_schema: Value,
        input_schema: Value,
        body: F,
    ) -> Self
    where
        F: Fn(Value, Goal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            descriptor: CapabilityDescriptor::new(name, description, output_schema, input_schema),
            body: Arc::new(move |input, goal| body(input, goal).boxed()),
        }
    }
}

#[async_trait]
impl Action for FnAction {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn perform(&self, input: Value, goal: &Goal) -> Result<Value> {
        (self.body)(input, goal.clone()).await
    }
}
