// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::codec::{JsonCodec, PayloadCodec};
use crate::handler::InvocationContext;
use crate::registry::HandlerRegistry;
use fnhost_api::invocation::{InvocationError, InvocationRequest};

/// Routes invocation requests to the handlers of a registry.
pub struct Dispatcher<C: PayloadCodec = JsonCodec> {
    registry: std::sync::Arc<HandlerRegistry>,
    _codec: std::marker::PhantomData<fn() -> C>,
}

impl<C: PayloadCodec> Dispatcher<C> {
    pub fn new(registry: std::sync::Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            _codec: std::marker::PhantomData,
        }
    }

    /// Run one invocation to completion.
    ///
    /// Unknown functions are rejected before the payload is looked at.
    pub async fn dispatch(&self, request: InvocationRequest) -> Result<Vec<u8>, InvocationError> {
        let handler = match self.registry.resolve(&request.function_name) {
            Some(handler) => handler,
            None => {
                log::warn!("no function registered as '{}'", request.function_name);
                return Err(InvocationError::FunctionNotFound(request.function_name));
            }
        };

        let context = InvocationContext::from_request(&request);
        let message = C::decode(request.payload);
        log::debug!("invoking {} (invoke_id {})", request.function_name, request.invoke_id);

        let result = match handler.handle(message, context).await {
            Ok(result) => result,
            Err(err) => {
                log::error!("function {} (invoke_id {}) failed: {:#}", request.function_name, request.invoke_id, err);
                return Err(InvocationError::HandlerInvocation(format!("{:#}", err)));
            }
        };

        match C::encode(result) {
            Ok(payload) => {
                log::debug!("function {} (invoke_id {}) replied {} bytes", request.function_name, request.invoke_id, payload.len());
                Ok(payload)
            }
            Err(err) => {
                log::error!("function {} (invoke_id {}) reply not serializable: {}", request.function_name, request.invoke_id, err);
                Err(err)
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: PayloadCodec> fnhost_api::invocation::InvocationAPI for Dispatcher<C> {
    async fn invoke(&self, request: InvocationRequest) -> Result<Vec<u8>, InvocationError> {
        self.dispatch(request).await
    }
}
