// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT
use fnhost_function::*;

struct Greeter;

impl NativeFunction for Greeter {
    fn handle(message: Message<'_>, context: Context) -> Reply {
        let mut greeting = match message {
            Message::Structured(serde_json::Value::Object(obj)) => obj,
            Message::Structured(serde_json::Value::Null) => serde_json::Map::new(),
            Message::Structured(other) => serde_json::Map::from_iter([("event".to_string(), other)]),
            Message::Raw(data) => return Reply::Bytes([b"hello ".as_slice(), data].concat()),
        };
        greeting.insert("name".to_string(), serde_json::Value::from("openedge"));
        greeting.insert("say".to_string(), serde_json::Value::from("hello world"));
        if !context.invoke_id.is_empty() {
            greeting.insert("invokeid".to_string(), serde_json::Value::from(context.invoke_id));
        }
        Reply::Structured(serde_json::Value::Object(greeting))
    }
}

fnhost_function::export!(Greeter, handler);
