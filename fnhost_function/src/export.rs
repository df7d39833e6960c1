// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

/// Export Macro generating the entry point that the runtime loads from the
/// library and that calls into an implementation of `NativeFunction`.
///
/// `export!(SayHi, handler);` exports the symbol `handler`.
#[macro_export]
macro_rules! export {
    ( $fun:ident, $symbol:ident ) => {
        #[no_mangle]
        pub unsafe extern "C" fn $symbol(
            message_kind: u32,
            message_ptr: *const u8,
            message_len: usize,
            context_ptr: *const u8,
            context_len: usize,
            reply: *mut core::ffi::c_void,
            complete: $crate::CompleteFn,
        ) {
            let message = $crate::export::borrow(message_ptr, message_len);
            let context = $crate::export::borrow(context_ptr, context_len);
            let ret = std::panic::catch_unwind(|| {
                <$fun as $crate::NativeFunction>::handle(
                    $crate::export::parse_message(message_kind, message),
                    $crate::export::parse_context(context),
                )
            })
            .unwrap_or_else(|_| $crate::Reply::Err(String::from("handler panicked")));
            $crate::export::complete_with(ret, reply, complete);
        }
    };
}

#[doc(hidden)]
pub unsafe fn borrow<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        core::slice::from_raw_parts(ptr, len)
    }
}

#[doc(hidden)]
pub fn parse_message(kind: u32, data: &[u8]) -> crate::Message<'_> {
    if kind == crate::MESSAGE_STRUCTURED {
        if let Ok(value) = serde_json::from_slice(data) {
            return crate::Message::Structured(value);
        }
    }
    crate::Message::Raw(data)
}

#[doc(hidden)]
pub fn parse_context(data: &[u8]) -> crate::Context {
    serde_json::from_slice(data).unwrap_or_default()
}

#[doc(hidden)]
pub unsafe fn complete_with(ret: crate::Reply, reply: *mut core::ffi::c_void, complete: crate::CompleteFn) {
    let (kind, data) = match ret {
        crate::Reply::Empty => (crate::REPLY_EMPTY, vec![]),
        crate::Reply::Bytes(data) => (crate::REPLY_BYTES, data),
        crate::Reply::Structured(value) => match serde_json::to_vec(&value) {
            Ok(data) => (crate::REPLY_STRUCTURED, data),
            Err(err) => (crate::REPLY_ERR, err.to_string().into_bytes()),
        },
        crate::Reply::Err(text) => (crate::REPLY_ERR, text.into_bytes()),
    };
    complete(reply, kind, data.as_ptr(), data.len());
}

#[cfg(test)]
mod test {
    use crate::*;
    use super::*;

    struct Greeter;

    impl NativeFunction for Greeter {
        fn handle(message: Message<'_>, context: Context) -> Reply {
            match message {
                Message::Structured(serde_json::Value::Object(mut obj)) => {
                    if obj.contains_key("fail") {
                        return Reply::Err(format!("refusing invocation {}", context.invoke_id));
                    }
                    obj.insert("functionName".to_string(), serde_json::Value::from(context.function_name));
                    Reply::Structured(serde_json::Value::Object(obj))
                }
                Message::Structured(_) => Reply::Empty,
                Message::Raw(data) => Reply::Bytes(data.to_vec()),
            }
        }
    }

    crate::export!(Greeter, fnhost_function_test_greeter);

    unsafe extern "C" fn collect(reply: *mut core::ffi::c_void, kind: u32, data_ptr: *const u8, data_len: usize) {
        let reply = &mut *(reply as *mut Vec<(u32, Vec<u8>)>);
        reply.push((kind, borrow(data_ptr, data_len).to_vec()));
    }

    fn call(kind: u32, message: &[u8], context: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let mut replies: Vec<(u32, Vec<u8>)> = vec![];
        unsafe {
            fnhost_function_test_greeter(
                kind,
                message.as_ptr(),
                message.len(),
                context.as_ptr(),
                context.len(),
                &mut replies as *mut Vec<(u32, Vec<u8>)> as *mut core::ffi::c_void,
                collect,
            );
        }
        replies
    }

    #[test]
    fn structured_message_and_context() {
        let replies = call(
            MESSAGE_STRUCTURED,
            br#"{"id":1}"#,
            br#"{"functionName":"sayhi","functionInvokeID":"abc","invokeid":"abc","messageQOS":1,"messageTopic":"t1"}"#,
        );
        assert_eq!(1, replies.len());
        assert_eq!(REPLY_STRUCTURED, replies[0].0);
        let value: serde_json::Value = serde_json::from_slice(&replies[0].1).unwrap();
        assert_eq!(serde_json::json!({"id": 1, "functionName": "sayhi"}), value);
    }

    #[test]
    fn raw_message_is_echoed() {
        let replies = call(MESSAGE_RAW, &[0xde, 0xad, 0xbe, 0xef], b"{}");
        assert_eq!(vec![(REPLY_BYTES, vec![0xde, 0xad, 0xbe, 0xef])], replies);
    }

    #[test]
    fn handler_error_text() {
        let replies = call(MESSAGE_STRUCTURED, br#"{"fail":true}"#, br#"{"functionInvokeID":"x1"}"#);
        assert_eq!(vec![(REPLY_ERR, b"refusing invocation x1".to_vec())], replies);
    }

    #[test]
    fn empty_and_malformed_inputs() {
        assert_eq!(vec![(REPLY_EMPTY, vec![])], call(MESSAGE_STRUCTURED, b"[1,2]", b""));
        assert_eq!(Context::default(), parse_context(b"not json"));
        assert!(matches!(parse_message(MESSAGE_STRUCTURED, b"hello"), Message::Raw(b"hello")));
        assert!(unsafe { borrow(core::ptr::null(), 0) }.is_empty());
    }
}
