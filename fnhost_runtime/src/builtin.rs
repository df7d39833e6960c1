// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::handler::{DecodedMessage, Handler, InvocationContext, InvocationResult};
use crate::registry::HandlerCatalog;

/// Handlers available without loading any library:
/// `sayhi.handler` and `echo.handler`.
pub fn catalog() -> HandlerCatalog {
    let mut catalog = HandlerCatalog::new();
    catalog.register("sayhi", "handler", std::sync::Arc::new(SayHi {}));
    catalog.register("echo", "handler", std::sync::Arc::new(Echo {}));
    catalog
}

/// Greets: structured objects come back with `name` and `say` added.
pub struct SayHi {}

#[async_trait::async_trait]
impl Handler for SayHi {
    async fn handle(&self, message: DecodedMessage, context: InvocationContext) -> anyhow::Result<InvocationResult> {
        log::debug!("sayhi invoked by {}", context);
        let mut greeting = match message {
            DecodedMessage::Structured(serde_json::Value::Object(obj)) => obj,
            DecodedMessage::Structured(other) => serde_json::Map::from_iter([("event".to_string(), other)]),
            DecodedMessage::Raw(data) => {
                serde_json::Map::from_iter([("bytes".to_string(), serde_json::Value::from(data.len()))])
            }
        };
        greeting.insert("name".to_string(), serde_json::Value::from("openedge"));
        greeting.insert("say".to_string(), serde_json::Value::from("hello world"));
        Ok(InvocationResult::structured(greeting))
    }
}

/// Returns the message unchanged.
pub struct Echo {}

#[async_trait::async_trait]
impl Handler for Echo {
    async fn handle(&self, message: DecodedMessage, _context: InvocationContext) -> anyhow::Result<InvocationResult> {
        match message {
            DecodedMessage::Structured(value) => Ok(InvocationResult::structured(value)),
            DecodedMessage::Raw(data) => Ok(InvocationResult::Bytes(data)),
        }
    }
}
