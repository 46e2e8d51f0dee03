//! Listener and graceful shutdown tests over real sockets.

use std::path::Path;
use std::sync::Arc;

use rstest::rstest;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use quire_config::ListenEndpoint;

use crate::bootstrap::{StaticConfigLoader, bootstrap_with};
use crate::http::router;
use crate::serve::{BoundListener, ServeError, serve_until};

use super::support::{HealthEvent, MISSING_RUNTIME, RecordingHealthReporter, Sandbox};

const NEW_PROJECT: &[u8] =
    b"POST /api/new-project HTTP/1.1\r\nHost: quire\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

async fn exchange<S>(mut stream: S) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(NEW_PROJECT).await.expect("write request");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read response");
    String::from_utf8_lossy(&response).into_owned()
}

#[rstest]
#[tokio::test]
async fn tcp_listener_serves_until_shutdown() {
    let sandbox = Sandbox::new();
    let listener = BoundListener::bind(&ListenEndpoint::tcp("127.0.0.1", 0))
        .await
        .expect("bind tcp");
    let addr = listener.local_addr().expect("tcp address");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(listener.serve(
        router(sandbox.state(Path::new(MISSING_RUNTIME), None)),
        async move {
            drop(stopped.await);
        },
    ));

    let stream = TcpStream::connect(addr).await.expect("connect");
    let response = exchange(stream).await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.contains("\"id\""));

    stop.send(()).expect("server still running");
    server.await.expect("join").expect("serve");
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn unix_socket_is_removed_after_shutdown() {
    let sandbox = Sandbox::new();
    let socket = sandbox.path().join("quired.sock");
    let endpoint = ListenEndpoint::unix(socket.to_str().expect("utf-8 path"));
    let listener = BoundListener::bind(&endpoint).await.expect("bind unix");
    assert!(listener.local_addr().is_none());
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(listener.serve(
        router(sandbox.state(Path::new(MISSING_RUNTIME), None)),
        async move {
            drop(stopped.await);
        },
    ));

    let stream = tokio::net::UnixStream::connect(&socket)
        .await
        .expect("connect");
    let response = exchange(stream).await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");

    stop.send(()).expect("server still running");
    server.await.expect("join").expect("serve");
    assert!(!socket.exists());
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn stale_socket_is_replaced() {
    let sandbox = Sandbox::new();
    let socket = sandbox.path().join("stale.sock");
    drop(std::os::unix::net::UnixListener::bind(&socket).expect("bind stale"));
    assert!(socket.exists());

    let endpoint = ListenEndpoint::unix(socket.to_str().expect("utf-8 path"));
    let listener = BoundListener::bind(&endpoint).await;

    assert!(listener.is_ok(), "stale socket blocked bind: {:?}", listener.err());
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn live_socket_is_not_stolen() {
    let sandbox = Sandbox::new();
    let socket = sandbox.path().join("live.sock");
    let _owner = std::os::unix::net::UnixListener::bind(&socket).expect("bind live");

    let endpoint = ListenEndpoint::unix(socket.to_str().expect("utf-8 path"));
    let result = BoundListener::bind(&endpoint).await;

    assert!(matches!(result, Err(ServeError::SocketInUse { .. })));
    assert!(socket.exists());
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn daemon_reports_listening_and_shutdown() {
    let sandbox = Sandbox::new();
    let socket = sandbox.path().join("daemon.sock");
    let endpoint = ListenEndpoint::unix(socket.to_str().expect("utf-8 path"));
    let config = sandbox.config(Path::new(MISSING_RUNTIME), endpoint.clone());
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&StaticConfigLoader::new(config), reporter.clone())
        .expect("bootstrap should succeed");
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(serve_until(daemon, async move {
        drop(stopped.await);
    }));
    while !socket.exists() {
        tokio::task::yield_now().await;
    }
    stop.send(()).expect("server still running");
    server.await.expect("join").expect("serve");

    assert_eq!(
        reporter.events(),
        [
            HealthEvent::BootstrapStarting,
            HealthEvent::BootstrapSucceeded,
            HealthEvent::Listening(endpoint),
            HealthEvent::ShutdownRequested,
        ]
    );
}

#[rstest]
#[tokio::test]
async fn bind_failure_is_reported() {
    let sandbox = Sandbox::new();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let port = taken.local_addr().expect("reserved address").port();
    let config = sandbox.config(
        Path::new(MISSING_RUNTIME),
        ListenEndpoint::tcp("127.0.0.1", port),
    );
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon = bootstrap_with(&StaticConfigLoader::new(config), reporter.clone())
        .expect("bootstrap should succeed");

    let result = serve_until(daemon, std::future::pending()).await;

    assert!(matches!(result, Err(ServeError::Bind { .. })));
    assert!(matches!(
        reporter.events().last(),
        Some(HealthEvent::ServeFailed(_))
    ));
}
