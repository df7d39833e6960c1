// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::invocation::{InvocationError, InvocationRequest};

/// Listener options of the runtime API server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Maximum size of a decoded request and of an encoded reply, in bytes.
    pub max_message_length: usize,
    pub tls_config: Option<crate::grpc_impl::tls_config::TlsConfig>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_message_length: 4 * 1024 * 1024,
            tls_config: None,
        }
    }
}

#[derive(Clone)]
pub struct RuntimeAPIClient {
    client: crate::grpc_impl::api::runtime_client::RuntimeClient<tonic::transport::Channel>,
}

pub struct RuntimeAPIService {
    pub invocation_api: std::sync::Arc<dyn crate::invocation::InvocationAPI>,
}

impl RuntimeAPIClient {
    pub async fn new(server_addr: &str, retry_interval: Option<u64>) -> anyhow::Result<Self> {
        loop {
            match crate::grpc_impl::api::runtime_client::RuntimeClient::connect(server_addr.to_string()).await {
                Ok(client) => {
                    let client = client.max_decoding_message_size(usize::MAX).max_encoding_message_size(usize::MAX);
                    return Ok(Self { client });
                }
                Err(err) => match retry_interval {
                    Some(val) => tokio::time::sleep(tokio::time::Duration::from_secs(val)).await,
                    None => {
                        return Err(anyhow::anyhow!("Error when connecting to {}: {}", server_addr, err));
                    }
                },
            }
        }
    }

    /// Invoke a function and return the reply payload.
    ///
    /// Failures reported by the runtime are returned as an [`InvocationError`]
    /// wrapped in the `anyhow::Error`, so callers can `downcast_ref` them.
    pub async fn invoke(&mut self, request: InvocationRequest) -> anyhow::Result<Vec<u8>> {
        match self.client.handle(tonic::Request::new(serialize_invocation_request(&request))).await {
            Ok(reply) => Ok(reply.into_inner().payload),
            Err(status) => match parse_status(&status) {
                Some(err) => Err(anyhow::Error::new(err)),
                None => Err(anyhow::anyhow!(
                    "Communication error while invoking function {}: {}",
                    request.function_name,
                    status
                )),
            },
        }
    }
}

#[async_trait::async_trait]
impl crate::grpc_impl::api::runtime_server::Runtime for RuntimeAPIService {
    async fn handle(
        &self,
        request: tonic::Request<crate::grpc_impl::api::Message>,
    ) -> Result<tonic::Response<crate::grpc_impl::api::Message>, tonic::Status> {
        let mut message = request.into_inner();
        let payload = std::mem::take(&mut message.payload);
        let parsed_request = parse_message(&message, payload);
        log::debug!("invocation received: {}", parsed_request);

        // The reply is the request message with its payload replaced.
        match self.invocation_api.invoke(parsed_request).await {
            Ok(payload) => {
                message.payload = payload;
                Ok(tonic::Response::new(message))
            }
            Err(err) => {
                log::warn!("invocation of {} (invoke_id {}) failed: {}", message.function_name, message.function_invoke_id, err);
                Err(serialize_invocation_error(&err))
            }
        }
    }
}

pub struct RuntimeAPIServer {}

impl RuntimeAPIServer {
    /// Serve the runtime API on an already bound listener until `shutdown`
    /// resolves, then finish the calls in flight before returning.
    ///
    /// The server is configured before this returns, so an invalid TLS
    /// configuration is reported here and not by the returned future.
    pub fn run(
        invocation_api: std::sync::Arc<dyn crate::invocation::InvocationAPI>,
        listener: tokio::net::TcpListener,
        options: ServerOptions,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<futures::future::BoxFuture<'static, anyhow::Result<()>>> {
        let runtime_api = RuntimeAPIService { invocation_api };
        let local_addr = listener.local_addr()?;

        let mut server_builder = tonic::transport::Server::builder();
        if let Some(tls_config) = &options.tls_config {
            if let Some(config) = tls_config.create_server_tls_config()? {
                log::info!("TLS enabled for GRPC server");
                server_builder = server_builder.tls_config(config)?;
            }
        }
        let router = server_builder.add_service(
            crate::grpc_impl::api::runtime_server::RuntimeServer::new(runtime_api)
                .max_decoding_message_size(options.max_message_length)
                .max_encoding_message_size(options.max_message_length),
        );

        Ok(Box::pin(async move {
            log::info!("Start RuntimeAPI GRPC Server at {}", local_addr);

            let incoming = futures::stream::unfold(listener, |listener| async move {
                let connection = listener.accept().await.map(|(stream, _)| stream);
                Some((connection, listener))
            });

            let res = router.serve_with_incoming_shutdown(Box::pin(incoming), shutdown).await;

            log::info!("Stop RuntimeAPI GRPC Server");
            match res {
                Ok(_) => {
                    log::debug!("Clean Exit");
                    Ok(())
                }
                Err(err) => Err(anyhow::anyhow!("GRPC Server Failure: {}", err)),
            }
        }))
    }
}

pub fn parse_message(api_message: &crate::grpc_impl::api::Message, payload: Vec<u8>) -> InvocationRequest {
    InvocationRequest {
        function_name: api_message.function_name.clone(),
        payload,
        qos: api_message.qos,
        topic: api_message.topic.clone(),
        invoke_id: api_message.function_invoke_id.clone(),
        timestamp: api_message.timestamp,
    }
}

pub fn serialize_invocation_request(request: &InvocationRequest) -> crate::grpc_impl::api::Message {
    crate::grpc_impl::api::Message {
        qos: request.qos,
        topic: request.topic.clone(),
        payload: request.payload.clone(),
        function_name: request.function_name.clone(),
        function_invoke_id: request.invoke_id.clone(),
        timestamp: request.timestamp,
    }
}

pub fn serialize_invocation_error(err: &InvocationError) -> tonic::Status {
    match err {
        InvocationError::FunctionNotFound(_) => tonic::Status::not_found(err.to_string()),
        InvocationError::HandlerInvocation(_) => tonic::Status::unknown(err.to_string()),
        InvocationError::Serialization(_) => tonic::Status::internal(err.to_string()),
        InvocationError::Unavailable(_) => tonic::Status::unavailable(err.to_string()),
        InvocationError::Overloaded(_) => tonic::Status::resource_exhausted(err.to_string()),
    }
}

/// Recover the [`InvocationError`] carried by a status produced by
/// [`serialize_invocation_error`]. Other statuses (transport failures,
/// errors raised by tonic itself) yield `None`.
pub fn parse_status(status: &tonic::Status) -> Option<InvocationError> {
    let message = status.message();
    match status.code() {
        tonic::Code::NotFound => message
            .strip_prefix("function not found: '")
            .and_then(|name| name.strip_suffix('\''))
            .map(|name| InvocationError::FunctionNotFound(name.to_string())),
        tonic::Code::Unknown => message
            .strip_prefix("[UserCodeInvoke] ")
            .map(|text| InvocationError::HandlerInvocation(text.to_string())),
        tonic::Code::Internal => message
            .strip_prefix("[UserCodeReturn] ")
            .map(|text| InvocationError::Serialization(text.to_string())),
        tonic::Code::Unavailable => message
            .strip_prefix("runtime unavailable: ")
            .map(|text| InvocationError::Unavailable(text.to_string())),
        tonic::Code::ResourceExhausted => message
            .strip_prefix("runtime overloaded: ")
            .map(|text| InvocationError::Overloaded(text.to_string())),
        _ => None,
    }
}
