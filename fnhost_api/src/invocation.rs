// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

/// Request to invoke a function, as received from the broker.
///
/// All fields except `function_name` and `payload` are passed through to the
/// handler untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationRequest {
    pub function_name: String,
    pub payload: Vec<u8>,
    pub qos: i32,
    pub topic: String,
    pub invoke_id: String,
    /// Only set by protocol revisions that carry the event time.
    pub timestamp: Option<i64>,
}

impl std::fmt::Display for InvocationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "function {}, invoke_id {}, qos {}, topic {}, payload {} bytes",
            self.function_name,
            self.invoke_id,
            self.qos,
            self.topic,
            self.payload.len()
        )
    }
}

/// Per-call failures, returned to the caller as the outcome of the invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("function not found: '{0}'")]
    FunctionNotFound(String),
    /// The handler reported a failure; the text is the handler's own message.
    #[error("[UserCodeInvoke] {0}")]
    HandlerInvocation(String),
    /// The handler's result could not be turned into a payload.
    #[error("[UserCodeReturn] {0}")]
    Serialization(String),
    /// The runtime is shutting down and does not take new work.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    /// Too many invocations are already running.
    #[error("runtime overloaded: {0}")]
    Overloaded(String),
}

/// The single operation exposed by a function runtime.
#[async_trait::async_trait]
pub trait InvocationAPI: Send + Sync {
    /// Invoke the function named in `request` and return the reply payload.
    async fn invoke(&self, request: InvocationRequest) -> Result<Vec<u8>, InvocationError>;
}
