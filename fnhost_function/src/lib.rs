// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

//! Bindings for function handlers compiled as native shared libraries.
//!
//! A handler library is a `cdylib` that implements [`NativeFunction`] and
//! exports it with the [`export!`] macro under the symbol named in the
//! runtime configuration (`handler = "<library>.<symbol>"`).

/// Provides the `export` macro generating the `extern "C"` entry point.
pub mod export;

/// The message is JSON text.
pub const MESSAGE_STRUCTURED: u32 = 0;
/// The message is opaque bytes.
pub const MESSAGE_RAW: u32 = 1;

pub const REPLY_EMPTY: u32 = 0;
pub const REPLY_BYTES: u32 = 1;
/// The reply is JSON text.
pub const REPLY_STRUCTURED: u32 = 2;
/// The reply is the UTF-8 text of the handler's error.
pub const REPLY_ERR: u32 = 3;

/// Completion callback handed to the entry point by the runtime.
///
/// The data is borrowed for the duration of the call only: the runtime
/// copies it before returning.
pub type CompleteFn = unsafe extern "C" fn(reply: *mut core::ffi::c_void, kind: u32, data_ptr: *const u8, data_len: usize);

/// Signature of the symbol exported by a handler library.
pub type EntryPointFn = unsafe extern "C" fn(
    message_kind: u32,
    message_ptr: *const u8,
    message_len: usize,
    context_ptr: *const u8,
    context_len: usize,
    reply: *mut core::ffi::c_void,
    complete: CompleteFn,
);

pub enum Message<'a> {
    Structured(serde_json::Value),
    Raw(&'a [u8]),
}

pub enum Reply {
    Empty,
    Bytes(Vec<u8>),
    Structured(serde_json::Value),
    Err(String),
}

/// Metadata of the invocation, as sent by the runtime.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
pub struct Context {
    #[serde(rename = "functionName", default)]
    pub function_name: String,
    #[serde(rename = "functionInvokeID", default)]
    pub invoke_id: String,
    #[serde(rename = "messageQOS", default)]
    pub qos: i32,
    #[serde(rename = "messageTopic", default)]
    pub topic: String,
    #[serde(rename = "messageTimestamp", default)]
    pub timestamp: Option<i64>,
}

pub trait NativeFunction {
    fn handle(message: Message<'_>, context: Context) -> Reply;
}
