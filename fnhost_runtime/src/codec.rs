// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::handler::{DecodedMessage, InvocationResult};
use fnhost_api::invocation::InvocationError;

/// Conversion between wire payloads and handler messages.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Never fails: undecodable payloads are handed over as they are.
    fn decode(payload: Vec<u8>) -> DecodedMessage;

    /// Fails only with [`InvocationError::Serialization`].
    fn encode(result: InvocationResult) -> Result<Vec<u8>, InvocationError>;
}

/// JSON text when the payload parses as such, opaque bytes otherwise.
pub struct JsonCodec {}

impl PayloadCodec for JsonCodec {
    fn decode(payload: Vec<u8>) -> DecodedMessage {
        if payload.is_empty() {
            return DecodedMessage::Structured(serde_json::Value::Object(serde_json::Map::new()));
        }
        match serde_json::from_slice::<serde_json::Value>(&payload) {
            Ok(value) => DecodedMessage::Structured(value),
            Err(_) => DecodedMessage::Raw(payload),
        }
    }

    fn encode(result: InvocationResult) -> Result<Vec<u8>, InvocationError> {
        match result {
            InvocationResult::Empty => Ok(vec![]),
            InvocationResult::Bytes(data) => Ok(data),
            InvocationResult::Structured(value) => value.to_json().map_err(|err| InvocationError::Serialization(err.to_string())),
        }
    }
}
