// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

/// Metadata of one invocation, handed to the handler with the message.
///
/// Built fresh for every call from the passthrough fields of the request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationContext {
    pub function_name: String,
    pub invoke_id: String,
    pub qos: i32,
    pub topic: String,
    pub timestamp: Option<i64>,
}

impl InvocationContext {
    pub fn from_request(request: &fnhost_api::invocation::InvocationRequest) -> Self {
        Self {
            function_name: request.function_name.clone(),
            invoke_id: request.invoke_id.clone(),
            qos: request.qos,
            topic: request.topic.clone(),
            timestamp: request.timestamp,
        }
    }

    /// JSON document with the context keys known to handler authors.
    /// `messageTimestamp` is only present when the request carried one.
    pub fn to_json(&self) -> serde_json::Value {
        let mut ctx = serde_json::json!({
            "messageQOS": self.qos,
            "messageTopic": self.topic,
            "functionName": self.function_name,
            "functionInvokeID": self.invoke_id,
            "invokeid": self.invoke_id,
        });
        if let (Some(timestamp), Some(obj)) = (self.timestamp, ctx.as_object_mut()) {
            obj.insert("messageTimestamp".to_string(), serde_json::Value::from(timestamp));
        }
        ctx
    }
}

impl std::fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ({})", self.function_name, self.invoke_id)
    }
}

/// Payload as seen by the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Structured(serde_json::Value),
    Raw(Vec<u8>),
}

/// Object-safe view of a serializable value, so that handlers can return
/// any `Serialize` type as a structured result.
pub trait StructuredValue: Send {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: serde::Serialize + Send> StructuredValue for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Outcome of a successful handler call, classified by the handler author.
pub enum InvocationResult {
    Empty,
    /// Returned to the caller verbatim.
    Bytes(Vec<u8>),
    /// Returned to the caller as JSON text.
    Structured(Box<dyn StructuredValue>),
}

impl InvocationResult {
    pub fn structured<T: serde::Serialize + Send + 'static>(value: T) -> Self {
        Self::Structured(Box::new(value))
    }
}

impl std::fmt::Debug for InvocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationResult::Empty => write!(f, "Empty"),
            InvocationResult::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            InvocationResult::Structured(_) => write!(f, "Structured(..)"),
        }
    }
}

#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Handle one message. An error fails the invocation with its text.
    async fn handle(&self, message: DecodedMessage, context: InvocationContext) -> anyhow::Result<InvocationResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F> {
    fun: F,
}

#[async_trait::async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(DecodedMessage, InvocationContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<InvocationResult>> + Send,
{
    async fn handle(&self, message: DecodedMessage, context: InvocationContext) -> anyhow::Result<InvocationResult> {
        (self.fun)(message, context).await
    }
}

pub fn handler_fn<F, Fut>(fun: F) -> std::sync::Arc<dyn Handler>
where
    F: Fn(DecodedMessage, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<InvocationResult>> + Send + 'static,
{
    std::sync::Arc::new(FnHandler { fun })
}
