//! Server initialization
//!
//! Boot sequence: configuration, logging, application bootstrap, the
//! first discovery pass, transports, and the directory agent, followed by
//! graceful shutdown with the documented exit codes.
//!
//! # Transport modes
//!
//! - **stdio**: MCP over stdin/stdout (default)
//! - **http**: JSON-RPC and admin surface on one HTTP listener
//! - **hybrid**: both concurrently

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use mcs_domain::error::ErrorKind;
use mcs_infrastructure::config::TransportMode;
use mcs_infrastructure::{init_app, AppContext, ConfigLoader};

use crate::transport::http::serve_http;
use crate::transport::stdio::StdioServerExt;
use crate::McpServer;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal shutdown
    Clean,
    /// Configuration invalid
    ConfigInvalid,
    /// Required dependency unreachable at boot after the retry budget
    DependencyUnreachable,
    /// Interrupted by SIGINT
    Interrupted,
    /// Unexpected runtime failure
    Failure,
}

impl ExitStatus {
    /// Process exit code
    pub fn code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::ConfigInvalid => 2,
            Self::DependencyUnreachable => 3,
            Self::Interrupted => 130,
            Self::Failure => 1,
        }
    }
}

/// Run the capability server until shutdown
pub async fn run(config_path: Option<&Path>, transport: Option<TransportMode>) -> ExitStatus {
    // Configuration and logging come up before anything else
    let loader = match config_path {
        Some(path) => ConfigLoader::new().with_config_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration invalid: {e}");
            return ExitStatus::ConfigInvalid;
        }
    };
    if let Some(transport) = transport {
        config.server.transport_mode = transport;
    }
    // The guard keeps the non-blocking file writer alive until shutdown
    let _log_guard = match mcs_infrastructure::logging::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("configuration invalid: {e}");
            return ExitStatus::ConfigInvalid;
        }
    };

    info!(
        transport_mode = ?config.server.transport_mode,
        host = %config.server.host,
        port = config.server.port,
        "starting MCP capability server"
    );

    // Bootstrap: providers, registry, dispatcher, selector, pipelines
    let app = match init_app(config).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!(error = %e, "bootstrap failed");
            return match e.kind() {
                ErrorKind::UpstreamUnavailable | ErrorKind::TimedOut => {
                    ExitStatus::DependencyUnreachable
                }
                ErrorKind::InvalidArgument => ExitStatus::ConfigInvalid,
                _ => match &e {
                    mcs_domain::Error::Configuration { .. } => ExitStatus::ConfigInvalid,
                    _ => ExitStatus::Failure,
                },
            };
        }
    };

    // Discovery populates the catalog before any listener opens
    let report = app.discovery.run_at_boot().await;
    info!(
        live = report.live_total(),
        rejected = report.rejected.len(),
        "initial discovery pass complete"
    );

    let server = McpServer::new(Arc::clone(&app));
    let transport_mode = app.config.server.transport_mode;
    let transports = start_transports(server, Arc::clone(&app), transport_mode);

    // Readiness reached: listener bound (when applicable) and the catalog
    // populated. Register with the directory now.
    let agent_handle = start_directory_agent(&app);

    let status = wait_for_shutdown(transports).await;

    // Shutdown: stop background work, cancel in-flight invocations, and
    // let the agent deregister before the process exits
    app.shutdown.cancel();
    if let Some(handle) = agent_handle {
        let _ = handle.await;
    }
    info!(code = status.code(), "shutdown complete");
    status
}

/// Launch the configured transports as one joinable task
fn start_transports(
    server: McpServer,
    app: Arc<AppContext>,
    mode: TransportMode,
) -> JoinHandle<Result<(), String>> {
    let addr: SocketAddr = (
        app.config
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
        app.config.server.port,
    )
        .into();
    let shutdown = app.shutdown.clone();

    match mode {
        TransportMode::Stdio => tokio::spawn(async move {
            server.serve_stdio().await.map_err(|e| e.to_string())
        }),
        TransportMode::Http => tokio::spawn(async move {
            serve_http(app, addr, shutdown).await.map_err(|e| e.to_string())
        }),
        TransportMode::Hybrid => tokio::spawn(async move {
            let stdio_server = server;
            let http_app = Arc::clone(&app);

            let stdio_handle = tokio::spawn(async move {
                info!("hybrid: starting stdio transport");
                if let Err(e) = stdio_server.serve_stdio().await {
                    error!(error = %e, "hybrid: stdio transport failed");
                }
            });
            let http_handle = tokio::spawn(async move {
                info!("hybrid: starting HTTP transport");
                if let Err(e) = serve_http(http_app, addr, shutdown).await {
                    error!(error = %e, "hybrid: HTTP transport failed");
                }
            });

            let (stdio_result, http_result) = tokio::join!(stdio_handle, http_handle);
            if let Err(e) = stdio_result {
                error!(error = %e, "hybrid: stdio transport task panicked");
            }
            if let Err(e) = http_result {
                error!(error = %e, "hybrid: HTTP transport task panicked");
            }
            Ok(())
        }),
    }
}

/// Spawn the directory agent when enabled
fn start_directory_agent(app: &Arc<AppContext>) -> Option<JoinHandle<()>> {
    if !app.config.directory.enabled {
        return None;
    }
    info!(
        directory = app.directory_client.provider_name(),
        instance_id = %app.instance_id(),
        "starting service directory agent"
    );
    Some(app.directory_agent().spawn(app.shutdown.clone()))
}

/// Wait for a shutdown signal or transport completion
async fn wait_for_shutdown(transports: JoinHandle<Result<(), String>>) -> ExitStatus {
    #[cfg(unix)]
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return ExitStatus::Failure;
        }
    };

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt; shutting down");
                ExitStatus::Interrupted
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM; shutting down gracefully");
                ExitStatus::Clean
            }
            result = transports => match result {
                Ok(Ok(())) => ExitStatus::Clean,
                Ok(Err(e)) => {
                    error!(error = %e, "transport failed");
                    ExitStatus::Failure
                }
                Err(e) => {
                    error!(error = %e, "transport task panicked");
                    ExitStatus::Failure
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt; shutting down");
                ExitStatus::Interrupted
            }
            result = transports => match result {
                Ok(Ok(())) => ExitStatus::Clean,
                Ok(Err(e)) => {
                    error!(error = %e, "transport failed");
                    ExitStatus::Failure
                }
                Err(e) => {
                    error!(error = %e, "transport task panicked");
                    ExitStatus::Failure
                }
            }
        }
    }
}
