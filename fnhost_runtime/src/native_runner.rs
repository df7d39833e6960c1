// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::handler::{DecodedMessage, Handler, InvocationContext, InvocationResult};
use crate::registry::EntryPoint;
use crate::settings::ConfigError;
use fnhost_function::EntryPointFn;

/// Handler exported by a shared library through the `fnhost_function` ABI.
///
/// The entry point is called inline on the invoking task and must signal its
/// reply through the completion callback before returning.
pub struct NativeHandler {
    // Keeps the library mapped while `entry_point` may be called.
    _library: Option<std::sync::Arc<libloading::Library>>,
    entry_point: EntryPointFn,
    name: String,
}

#[derive(Default)]
struct Completion {
    reply: Option<(u32, Vec<u8>)>,
}

unsafe extern "C" fn complete(reply: *mut core::ffi::c_void, kind: u32, data_ptr: *const u8, data_len: usize) {
    if reply.is_null() {
        return;
    }
    let completion = &mut *(reply as *mut Completion);
    if completion.reply.is_some() {
        log::warn!("native handler signalled completion more than once, ignoring");
        return;
    }
    let data = if data_ptr.is_null() || data_len == 0 {
        vec![]
    } else {
        std::slice::from_raw_parts(data_ptr, data_len).to_vec()
    };
    completion.reply = Some((kind, data));
}

/// JSON text returned by a native handler, checked when the reply is encoded.
struct JsonText(Vec<u8>);

impl serde::Serialize for JsonText {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match serde_json::from_slice::<serde_json::Value>(&self.0) {
            Ok(value) => serde::Serialize::serialize(&value, serializer),
            Err(err) => Err(<S::Error as serde::ser::Error>::custom(format!("handler returned malformed JSON: {}", err))),
        }
    }
}

/// Candidate paths of `module` in `codedir`, the platform library name first.
fn library_paths(codedir: &str, module: &str) -> Vec<std::path::PathBuf> {
    let dir = std::path::Path::new(codedir);
    vec![dir.join(libloading::library_filename(module)), dir.join(module)]
}

impl NativeHandler {
    pub fn load(codedir: &str, entry_point: &EntryPoint) -> Result<Self, ConfigError> {
        let path = match library_paths(codedir, &entry_point.module).into_iter().find(|path| path.is_file()) {
            Some(path) => path,
            None => {
                return Err(ConfigError::ModuleNotFound {
                    module: entry_point.module.clone(),
                    codedir: codedir.to_string(),
                    reason: "no such library".to_string(),
                })
            }
        };
        log::debug!("loading native library {}", path.display());

        // SAFETY: loading runs the library initialisers; handler libraries are
        // trusted code deployed with the runtime configuration.
        let library = match unsafe { libloading::Library::new(&path) } {
            Ok(library) => library,
            Err(err) => {
                return Err(ConfigError::ModuleNotFound {
                    module: entry_point.module.clone(),
                    codedir: codedir.to_string(),
                    reason: err.to_string(),
                })
            }
        };
        // SAFETY: the symbol is declared with the signature produced by `fnhost_function::export!`.
        let symbol = match unsafe { library.get::<EntryPointFn>(entry_point.symbol.as_bytes()) } {
            Ok(symbol) => *symbol,
            Err(err) => {
                log::debug!("lookup of {} failed: {}", entry_point, err);
                return Err(ConfigError::SymbolNotExported {
                    module: entry_point.module.clone(),
                    symbol: entry_point.symbol.clone(),
                });
            }
        };

        Ok(Self {
            _library: Some(std::sync::Arc::new(library)),
            entry_point: symbol,
            name: entry_point.to_string(),
        })
    }

    /// Wrap an entry point already linked into the process.
    pub fn from_entry_point(name: &str, entry_point: EntryPointFn) -> Self {
        Self {
            _library: None,
            entry_point,
            name: name.to_string(),
        }
    }

    fn call(&self, message_kind: u32, message: &[u8], context: &[u8]) -> Option<(u32, Vec<u8>)> {
        let mut completion = Completion::default();
        // SAFETY: all buffers outlive the call and `complete` copies the reply
        // before returning, as required by the ABI.
        unsafe {
            (self.entry_point)(
                message_kind,
                message.as_ptr(),
                message.len(),
                context.as_ptr(),
                context.len(),
                &mut completion as *mut Completion as *mut core::ffi::c_void,
                complete,
            );
        }
        completion.reply
    }
}

#[async_trait::async_trait]
impl Handler for NativeHandler {
    async fn handle(&self, message: DecodedMessage, context: InvocationContext) -> anyhow::Result<InvocationResult> {
        let (message_kind, message) = match message {
            DecodedMessage::Structured(value) => (fnhost_function::MESSAGE_STRUCTURED, serde_json::to_vec(&value)?),
            DecodedMessage::Raw(data) => (fnhost_function::MESSAGE_RAW, data),
        };
        let context = serde_json::to_vec(&context.to_json())?;

        match self.call(message_kind, &message, &context) {
            None => anyhow::bail!("handler {} returned without signalling completion", self.name),
            Some((fnhost_function::REPLY_EMPTY, _)) => Ok(InvocationResult::Empty),
            Some((fnhost_function::REPLY_BYTES, data)) => Ok(InvocationResult::Bytes(data)),
            Some((fnhost_function::REPLY_STRUCTURED, data)) => Ok(InvocationResult::structured(JsonText(data))),
            Some((fnhost_function::REPLY_ERR, text)) => Err(anyhow::anyhow!("{}", String::from_utf8_lossy(&text))),
            Some((kind, _)) => anyhow::bail!("handler {} replied with unknown kind {}", self.name, kind),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::PayloadCodec;

    struct Reverse;

    impl fnhost_function::NativeFunction for Reverse {
        fn handle(message: fnhost_function::Message<'_>, context: fnhost_function::Context) -> fnhost_function::Reply {
            match message {
                fnhost_function::Message::Raw(data) => fnhost_function::Reply::Bytes(data.iter().rev().cloned().collect()),
                fnhost_function::Message::Structured(serde_json::Value::String(text)) if text == "fail" => {
                    fnhost_function::Reply::Err(format!("boom in {}", context.invoke_id))
                }
                fnhost_function::Message::Structured(serde_json::Value::Null) => fnhost_function::Reply::Empty,
                fnhost_function::Message::Structured(_) => fnhost_function::Reply::Structured(serde_json::json!({
                    "function": context.function_name,
                    "topic": context.topic,
                    "qos": context.qos,
                    "timestamp": context.timestamp,
                })),
            }
        }
    }

    fnhost_function::export!(Reverse, fnhost_runtime_test_reverse);

    unsafe extern "C" fn silent(
        _message_kind: u32,
        _message_ptr: *const u8,
        _message_len: usize,
        _context_ptr: *const u8,
        _context_len: usize,
        _reply: *mut core::ffi::c_void,
        _complete: fnhost_function::CompleteFn,
    ) {
    }

    unsafe extern "C" fn malformed(
        _message_kind: u32,
        _message_ptr: *const u8,
        _message_len: usize,
        _context_ptr: *const u8,
        _context_len: usize,
        reply: *mut core::ffi::c_void,
        complete: fnhost_function::CompleteFn,
    ) {
        let text = b"{not json";
        complete(reply, fnhost_function::REPLY_STRUCTURED, text.as_ptr(), text.len());
        complete(reply, fnhost_function::REPLY_EMPTY, std::ptr::null(), 0);
    }

    fn context() -> InvocationContext {
        InvocationContext {
            function_name: "reverse".to_string(),
            invoke_id: "abc".to_string(),
            qos: 1,
            topic: "t1".to_string(),
            timestamp: Some(1700000000),
        }
    }

    #[tokio::test]
    async fn native_replies() {
        let handler = NativeHandler::from_entry_point("reverse.handler", fnhost_runtime_test_reverse);

        match handler.handle(DecodedMessage::Raw(vec![1, 2, 3]), context()).await.unwrap() {
            InvocationResult::Bytes(data) => assert_eq!(vec![3, 2, 1], data),
            other => panic!("unexpected result {:?}", other),
        }

        let result = handler.handle(DecodedMessage::Structured(serde_json::json!({})), context()).await.unwrap();
        let encoded = crate::codec::JsonCodec::encode(result).unwrap();
        assert_eq!(
            serde_json::json!({"function": "reverse", "topic": "t1", "qos": 1, "timestamp": 1700000000}),
            serde_json::from_slice::<serde_json::Value>(&encoded).unwrap()
        );

        assert!(matches!(
            handler.handle(DecodedMessage::Structured(serde_json::Value::Null), context()).await.unwrap(),
            InvocationResult::Empty
        ));

        let err = handler.handle(DecodedMessage::Structured(serde_json::json!("fail")), context()).await.unwrap_err();
        assert_eq!("boom in abc", err.to_string());
    }

    #[tokio::test]
    async fn missing_completion() {
        let handler = NativeHandler::from_entry_point("silent.handler", silent);
        let err = handler.handle(DecodedMessage::Raw(vec![]), context()).await.unwrap_err();
        assert!(err.to_string().contains("without signalling completion"));
    }

    #[tokio::test]
    async fn malformed_structured_reply() {
        let handler = NativeHandler::from_entry_point("malformed.handler", malformed);
        let result = handler.handle(DecodedMessage::Raw(vec![]), context()).await.unwrap();
        match crate::codec::JsonCodec::encode(result) {
            Err(fnhost_api::invocation::InvocationError::Serialization(text)) => assert!(text.contains("malformed JSON")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let entry_point = "sayhi.handler".parse::<EntryPoint>().unwrap();
        match NativeHandler::load(dir.path().to_str().unwrap(), &entry_point) {
            Err(ConfigError::ModuleNotFound { module, .. }) => assert_eq!("sayhi", module),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("library loaded from an empty directory"),
        }
    }

    #[test]
    fn invalid_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(libloading::library_filename("broken")), b"not a library").unwrap();
        let entry_point = "broken.handler".parse::<EntryPoint>().unwrap();
        assert!(matches!(
            NativeHandler::load(dir.path().to_str().unwrap(), &entry_point),
            Err(ConfigError::ModuleNotFound { .. })
        ));
    }
}
