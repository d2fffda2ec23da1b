//! Dispatching model-suggested function calls to local handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, VertexError};
use crate::schema::{FunctionCall, FunctionDeclaration, FunctionResponse, Tool};

/// An async function handler. Errors are reported as plain messages.
pub type FunctionHandler = Arc<
    dyn Fn(Map<String, Value>) -> BoxFuture<'static, std::result::Result<Value, String>>
        + Send
        + Sync,
>;

struct RegisteredFunction {
    declaration: FunctionDeclaration,
    handler: FunctionHandler,
}

/// Declared functions and the handlers that implement them.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, RegisteredFunction>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under the declaration's name, replacing any
    /// previous registration.
    pub fn register<F, Fut>(&mut self, declaration: FunctionDeclaration, handler: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        debug!("registering function {}", declaration.name);
        let handler: FunctionHandler = Arc::new(move |args| handler(args).boxed());
        self.functions.insert(
            declaration.name.clone(),
            RegisteredFunction {
                declaration,
                handler,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Declarations sorted by name.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.functions
            .values()
            .map(|f| f.declaration.clone())
            .collect()
    }

    /// A tool offering every registered function to the model.
    pub fn tool(&self) -> Tool {
        Tool::new(self.declarations())
    }

    fn check(&self, call: &FunctionCall) -> Result<&RegisteredFunction> {
        let function = self
            .functions
            .get(&call.name)
            .ok_or_else(|| VertexError::UnknownFunction(call.name.clone()))?;

        function
            .declaration
            .validate_args(&call.args)
            .map_err(|reason| VertexError::InvalidArguments {
                name: call.name.clone(),
                reason,
            })?;

        Ok(function)
    }

    async fn invoke(function: &RegisteredFunction, call: &FunctionCall) -> Result<FunctionResponse> {
        let value = (function.handler)(call.args.clone())
            .await
            .map_err(|message| VertexError::Handler {
                name: call.name.clone(),
                message,
            })?;
        Ok(FunctionResponse::new(call.name.clone(), value))
    }

    /// Validate and run a single call.
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<FunctionResponse> {
        let function = self.check(call)?;
        Self::invoke(function, call).await
    }

    /// Validate every call, then run all handlers concurrently.
    ///
    /// No handler runs unless every call is valid. Responses are returned
    /// in call order.
    pub async fn dispatch_all(&self, calls: &[FunctionCall]) -> Result<Vec<FunctionResponse>> {
        let functions = calls
            .iter()
            .map(|call| self.check(call))
            .collect::<Result<Vec<_>>>()?;

        info!("dispatching {} function call(s)", calls.len());
        join_all(
            functions
                .into_iter()
                .zip(calls)
                .map(|(function, call)| Self::invoke(function, call)),
        )
        .await
        .into_iter()
        .collect()
    }
}
