//! Listener binding, request serving and graceful shutdown.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use quire_config::ListenEndpoint;

use crate::bootstrap::Daemon;
use crate::health::HealthReporter;
use crate::http::router;

#[cfg(unix)]
use tokio::net::UnixListener;

const TARGET: &str = "quired::serve";

/// Errors raised while binding or serving.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The TCP listener could not be bound.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint that failed to bind.
        endpoint: ListenEndpoint,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Another process is accepting connections on the Unix socket.
    #[error("unix socket '{path}' is already in use")]
    SocketInUse {
        /// Socket path.
        path: PathBuf,
    },

    /// The Unix socket path is occupied by something other than a socket.
    #[error("'{path}' exists and is not a socket")]
    NotASocket {
        /// Occupied path.
        path: PathBuf,
    },

    /// A stale Unix socket could not be removed.
    #[error("failed to remove stale socket '{path}': {source}")]
    StaleSocket {
        /// Socket path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Unix sockets are not available on this platform.
    #[error("unix sockets are unsupported for {endpoint}")]
    UnsupportedUnix {
        /// Requested endpoint.
        endpoint: ListenEndpoint,
    },

    /// The server loop failed.
    #[error("server failed: {0}")]
    Server(#[source] Arc<io::Error>),
}

enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Listener bound to the configured endpoint.
pub struct BoundListener {
    endpoint: ListenEndpoint,
    listener: ListenerKind,
}

impl BoundListener {
    /// Binds `endpoint`, replacing a stale Unix socket left by a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError`] when the address is taken or cannot be bound.
    pub async fn bind(endpoint: &ListenEndpoint) -> Result<Self, ServeError> {
        let bind_failed = |source: io::Error| ServeError::Bind {
            endpoint: endpoint.clone(),
            source: Arc::new(source),
        };
        match endpoint {
            ListenEndpoint::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(bind_failed)?;
                Ok(Self {
                    endpoint: endpoint.clone(),
                    listener: ListenerKind::Tcp(listener),
                })
            }
            ListenEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    let socket = path.as_std_path();
                    clear_stale_socket(socket)?;
                    let listener = UnixListener::bind(socket).map_err(bind_failed)?;
                    Ok(Self {
                        endpoint: endpoint.clone(),
                        listener: ListenerKind::Unix(listener),
                    })
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(ServeError::UnsupportedUnix {
                        endpoint: endpoint.clone(),
                    })
                }
            }
        }
    }

    /// Endpoint the listener was bound for.
    #[must_use]
    pub const fn endpoint(&self) -> &ListenEndpoint {
        &self.endpoint
    }

    /// Local TCP address, when bound over TCP.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Serves `app` until `shutdown` resolves, then drains in-flight requests.
    ///
    /// A Unix socket file is removed once serving stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Server`] when the accept loop fails.
    pub async fn serve<F>(self, app: Router, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let result = match self.listener {
            ListenerKind::Tcp(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
            #[cfg(unix)]
            ListenerKind::Unix(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
        };

        release(&self.endpoint);
        result.map_err(|error| ServeError::Server(Arc::new(error)))
    }
}

#[cfg(unix)]
fn clear_stale_socket(path: &Path) -> Result<(), ServeError> {
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    if !metadata.file_type().is_socket() {
        return Err(ServeError::NotASocket {
            path: path.to_path_buf(),
        });
    }
    if UnixStream::connect(path).is_ok() {
        return Err(ServeError::SocketInUse {
            path: path.to_path_buf(),
        });
    }
    debug!(target: TARGET, path = %path.display(), "removing stale socket");
    std::fs::remove_file(path).map_err(|source| ServeError::StaleSocket {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

#[cfg(unix)]
fn release(endpoint: &ListenEndpoint) {
    let Some(path) = endpoint.unix_path().map(|socket| socket.as_std_path()) else {
        return;
    };
    match std::fs::remove_file(path) {
        Ok(()) => debug!(target: TARGET, path = %path.display(), "removed socket"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(target: TARGET, path = %path.display(), %error, "failed to remove socket"),
    }
}

#[cfg(not(unix))]
const fn release(_endpoint: &ListenEndpoint) {}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(target: TARGET, %error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!(target: TARGET, %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!(target: TARGET, signal = "interrupt", "shutdown signal received"),
        () = terminate => info!(target: TARGET, signal = "terminate", "shutdown signal received"),
    }
}

/// Serves a bootstrapped daemon until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServeError`] when binding or serving fails.
pub async fn serve_until<F>(daemon: Daemon, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let reporter = daemon.reporter();
    let result = serve_inner(&daemon, Arc::clone(&reporter), shutdown).await;
    if let Err(error) = &result {
        reporter.serve_failed(error);
    }
    result
}

async fn serve_inner<F>(
    daemon: &Daemon,
    reporter: Arc<dyn HealthReporter>,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = BoundListener::bind(daemon.config().listen()).await?;
    reporter.listening(listener.endpoint());
    let notifier = Arc::clone(&reporter);
    let app = router(daemon.state().clone());
    listener
        .serve(app, async move {
            shutdown.await;
            notifier.shutdown_requested();
        })
        .await
}

/// Serves a bootstrapped daemon until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns [`ServeError`] when binding or serving fails.
pub async fn run_daemon(daemon: Daemon) -> Result<(), ServeError> {
    serve_until(daemon, shutdown_signal()).await
}
