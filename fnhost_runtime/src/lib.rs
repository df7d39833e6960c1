// SPDX-FileCopyrightText: © 2026 fnhost contributors
// SPDX-License-Identifier: MIT

pub mod builtin;
pub mod codec;
pub mod dispatcher;
pub mod handler;
pub mod lifecycle;
pub mod logging;
pub mod native_runner;
pub mod registry;
pub mod settings;

/// Serve the configured functions until SIGINT or SIGTERM, then shut down.
///
/// Fails if the server cannot start or stops serving on its own.
pub async fn fnhost_runtime_main(settings: settings::RuntimeSettings) -> anyhow::Result<()> {
    log::info!("Starting fnhost runtime {}", settings.name);
    log::debug!("Settings: {:?}", settings);

    let registry = std::sync::Arc::new(registry::HandlerRegistry::load(&settings.functions, &builtin::catalog())?);
    log::info!("functions loaded: {}", registry.function_names().join(", "));

    let dispatcher = dispatcher::Dispatcher::<codec::JsonCodec>::new(registry);
    let mut lifecycle = lifecycle::Lifecycle::new(settings.server.clone(), std::sync::Arc::new(dispatcher));
    lifecycle.start().await?;

    tokio::select! {
        _ = shutdown_signal() => {}
        res = lifecycle.server_exited() => {
            res?;
            anyhow::bail!("fnhost runtime {} stopped serving", settings.name);
        }
    }

    match lifecycle.shutdown().await? {
        lifecycle::ShutdownOutcome::Drained => log::info!("fnhost runtime {} stopped", settings.name),
        lifecycle::ShutdownOutcome::ForceTerminated => {
            log::warn!("fnhost runtime {} stopped, in-flight invocations terminated", settings.name)
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("failed to install the SIGINT handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install the SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("SIGINT received, shutting down"),
        _ = terminate => log::info!("SIGTERM received, shutting down"),
    }
}

pub fn fnhost_runtime_default_conf() -> String {
    String::from(
        r##"name = "sayhi-runtime"

[server]
address = "127.0.0.1:50051"
# Shutdown deadline for in-flight invocations, in milliseconds.
timeout = 30000
message.length.max = 4194304

[function]
name = "sayhi"
handler = "sayhi.handler"
codedir = "var/db/fnhost/sayhi"

[logger]
level = "info"
"##,
    )
}
