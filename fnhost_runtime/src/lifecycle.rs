// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

use crate::settings::ServerSettings;
use fnhost_api::invocation::{InvocationAPI, InvocationError, InvocationRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Serving,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight invocation completed before the deadline.
    Drained,
    /// The deadline elapsed, or none was configured, and the remaining work was aborted.
    ForceTerminated,
}

/// Refuses new invocations once shutdown has begun or when the concurrency
/// limit is reached, and aborts those still running when the server is
/// force-terminated.
struct GatedInvocationAPI {
    inner: Arc<dyn InvocationAPI>,
    accepting: Arc<AtomicBool>,
    terminate: tokio_util::sync::CancellationToken,
    limit: Option<(usize, Arc<tokio::sync::Semaphore>)>,
}

#[async_trait::async_trait]
impl InvocationAPI for GatedInvocationAPI {
    async fn invoke(&self, request: InvocationRequest) -> Result<Vec<u8>, InvocationError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(InvocationError::Unavailable("shutting down".to_string()));
        }
        let _permit = match &self.limit {
            Some((max, semaphore)) => match semaphore.try_acquire() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    log::warn!("rejecting {}: {} invocations already running", request.function_name, max);
                    return Err(InvocationError::Overloaded(format!("concurrency limit of {} reached", max)));
                }
            },
            None => None,
        };
        tokio::select! {
            res = self.inner.invoke(request) => res,
            _ = self.terminate.cancelled() => Err(InvocationError::Unavailable("terminated by shutdown".to_string())),
        }
    }
}

/// Owns the gRPC listener of the runtime.
pub struct Lifecycle {
    settings: ServerSettings,
    invocation_api: Arc<dyn InvocationAPI>,
    state: LifecycleState,
    local_addr: Option<std::net::SocketAddr>,
    accepting: Arc<AtomicBool>,
    terminate: tokio_util::sync::CancellationToken,
    shutdown_sender: Option<tokio::sync::oneshot::Sender<()>>,
    server_task: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
}

impl Lifecycle {
    pub fn new(settings: ServerSettings, invocation_api: Arc<dyn InvocationAPI>) -> Self {
        Self {
            settings,
            invocation_api,
            state: LifecycleState::Unstarted,
            local_addr: None,
            accepting: Arc::new(AtomicBool::new(false)),
            terminate: tokio_util::sync::CancellationToken::new(),
            shutdown_sender: None,
            server_task: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Address actually bound, known once serving.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.local_addr
    }

    fn gate(&self) -> GatedInvocationAPI {
        GatedInvocationAPI {
            inner: self.invocation_api.clone(),
            accepting: self.accepting.clone(),
            terminate: self.terminate.clone(),
            limit: self
                .settings
                .concurrency_limit
                .map(|max| (max, Arc::new(tokio::sync::Semaphore::new(max)))),
        }
    }

    /// Bind the listener and serve in a background task.
    ///
    /// On error nothing is served and the state stays `Unstarted`.
    pub async fn start(&mut self) -> anyhow::Result<std::net::SocketAddr> {
        if self.state != LifecycleState::Unstarted {
            anyhow::bail!("cannot start the runtime server in state {:?}", self.state);
        }
        let address = fnhost_api::util::listen_address(&self.settings.address)?;
        let listener = match tokio::net::TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(err) => anyhow::bail!("failed to bind {}: {}", address, err),
        };
        let local_addr = listener.local_addr()?;

        let (shutdown_sender, shutdown_receiver) = tokio::sync::oneshot::channel::<()>();
        let server = match fnhost_api::grpc_impl::runtime::RuntimeAPIServer::run(
            Arc::new(self.gate()),
            listener,
            self.settings.server_options(),
            async move {
                let _ = shutdown_receiver.await;
            },
        ) {
            Ok(server) => server,
            Err(err) => anyhow::bail!("failed to configure the runtime server: {:#}", err),
        };

        self.accepting.store(true, Ordering::SeqCst);
        self.server_task = Some(tokio::spawn(server));
        self.shutdown_sender = Some(shutdown_sender);
        self.local_addr = Some(local_addr);
        self.state = LifecycleState::Serving;
        log::info!("serving at {}", local_addr);
        Ok(local_addr)
    }

    /// Resolve when the server task ends without a shutdown request, which
    /// means that the runtime no longer serves.
    ///
    /// Meant to be raced against the shutdown trigger.
    pub async fn server_exited(&mut self) -> anyhow::Result<()> {
        let result = match self.server_task.as_mut() {
            Some(server_task) => server_task.await,
            None => anyhow::bail!("runtime server not running"),
        };
        self.server_task = None;
        self.shutdown_sender = None;
        self.accepting.store(false, Ordering::SeqCst);
        self.state = LifecycleState::Stopped;
        match result {
            Ok(Ok(())) => anyhow::bail!("runtime server exited"),
            Ok(Err(err)) => Err(err),
            Err(err) => anyhow::bail!("runtime server task failed: {}", err),
        }
    }

    /// Stop accepting, let in-flight invocations finish within the configured
    /// timeout, then abort whatever is left.
    ///
    /// Only a serving runtime can be shut down.
    pub async fn shutdown(&mut self) -> anyhow::Result<ShutdownOutcome> {
        if self.state != LifecycleState::Serving {
            log::warn!("shutdown requested in state {:?}", self.state);
            anyhow::bail!("cannot shut down the runtime server in state {:?}", self.state);
        }

        self.state = LifecycleState::Draining;
        self.accepting.store(false, Ordering::SeqCst);
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        match self.settings.timeout {
            Some(timeout) => log::info!("draining in-flight invocations for up to {} ms", timeout.as_millis()),
            None => log::info!("no shutdown timeout configured, terminating immediately"),
        }

        let outcome = match self.server_task.take() {
            Some(mut server_task) => drain(&mut server_task, self.settings.timeout).await,
            None => ShutdownOutcome::Drained,
        };
        if outcome == ShutdownOutcome::ForceTerminated {
            log::warn!("in-flight invocations force-terminated");
            self.terminate.cancel();
        }

        self.state = LifecycleState::Stopped;
        log::info!("runtime server stopped");
        Ok(outcome)
    }
}

/// Wait for `task` to finish, aborting it once `deadline` elapses.
///
/// Without a deadline the task is aborted right away.
pub async fn drain(task: &mut tokio::task::JoinHandle<anyhow::Result<()>>, deadline: Option<std::time::Duration>) -> ShutdownOutcome {
    let deadline = match deadline {
        Some(deadline) => deadline,
        None => {
            task.abort();
            return ShutdownOutcome::ForceTerminated;
        }
    };
    match tokio::time::timeout(deadline, &mut *task).await {
        Ok(Ok(Ok(()))) => ShutdownOutcome::Drained,
        Ok(Ok(Err(err))) => {
            log::error!("{}", err);
            ShutdownOutcome::Drained
        }
        Ok(Err(err)) => {
            log::error!("server task failed: {}", err);
            ShutdownOutcome::Drained
        }
        Err(_) => {
            task.abort();
            ShutdownOutcome::ForceTerminated
        }
    }
}
