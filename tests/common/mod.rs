//! Shared utilities for integration tests: a proxy launcher and mock upstreams.
#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use session_proxy::{HttpServer, ProxyConfig, Shutdown};

/// A running proxy under test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on an ephemeral port, forwarding to `target`.
pub async fn start_proxy(target: &str) -> TestProxy {
    start_proxy_with(target, |_| {}).await
}

/// Start the proxy with a config tweak applied before the server is built.
pub async fn start_proxy_with<F>(target: &str, tweak: F) -> TestProxy
where
    F: FnOnce(&mut ProxyConfig),
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ProxyConfig::default();
    config.listener.bind_host = "127.0.0.1".into();
    config.listener.port = addr.port();
    config.upstream.url = target.to_string();
    tweak(&mut config);

    let server = HttpServer::new(config).expect("valid test config");
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

/// HTTP client that never reuses connections and ignores proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What a recording upstream saw for one request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream that records every request, echoes the body and sets three cookies.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub calls: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingBackend {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Recorded {
        self.requests.lock().unwrap().last().cloned().expect("upstream saw a request")
    }
}

pub async fn start_recording_backend() -> (SocketAddr, RecordingBackend) {
    let backend = RecordingBackend::default();
    let app = Router::new()
        .fallback(record_and_echo)
        .with_state(backend.clone());
    (serve(app).await, backend)
}

async fn record_and_echo(State(backend): State<RecordingBackend>, request: Request<Body>) -> impl IntoResponse {
    backend.calls.fetch_add(1, Ordering::SeqCst);
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    backend.requests.lock().unwrap().push(Recorded {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body: body.clone(),
    });

    (
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, "session=abc123; Path=/; HttpOnly"),
            (header::SET_COOKIE, "csrf=xyz; Path=/"),
            (header::SET_COOKIE, "theme=dark; Expires=Wed, 21 Oct 2026 07:28:00 GMT"),
        ]),
        [("x-upstream", "recording")],
        body,
    )
}

/// Upstream that sends `chunks` pieces, `interval` apart, as one streaming body.
pub async fn start_streaming_backend(chunks: usize, interval: Duration) -> SocketAddr {
    let app = Router::new().fallback(move || async move {
        let stream = futures_util::stream::iter(0..chunks).then(move |i| async move {
            tokio::time::sleep(interval).await;
            Ok::<_, Infallible>(Bytes::from(format!("data: {}\n\n", i)))
        });
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(stream),
        )
    });
    serve(app).await
}

/// Upstream that answers after `delay`, or immediately for paths starting with `/fast`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move |request: Request<Body>| async move {
        if !request.uri().path().starts_with("/fast") {
            tokio::time::sleep(delay).await;
        }
        "done"
    });
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Events observed by the WebSocket echo upstream.
#[derive(Debug, PartialEq, Eq)]
pub enum WsEvent {
    Received(String),
    Closed,
}

/// WebSocket upstream that echoes text frames and reports what it sees.
pub async fn start_ws_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<WsEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(echo_websocket(stream, events_tx.clone()));
        }
    });

    (addr, events_rx)
}

async fn echo_websocket<S>(stream: S, events: mpsc::UnboundedSender<WsEvent>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(m) if m.is_text() => {
                let text = m.to_text().unwrap_or_default().to_string();
                let _ = events.send(WsEvent::Received(text.clone()));
                if ws.send(m).await.is_err() {
                    break;
                }
            }
            Ok(m) if m.is_close() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = events.send(WsEvent::Closed);
}

/// Upstream that announces `content-length: 100`, sends a few bytes and hangs up.
pub async fn start_truncating_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                    .await;
                let _ = stream.flush().await;
                // Dropping the socket cuts the body 93 bytes short.
            });
        }
    });

    addr
}

/// TLS acceptor with a fresh self-signed certificate for `localhost`.
pub fn self_signed_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::try_from(cert.signing_key.serialize_der()).unwrap();
    let certs = vec![CertificateDer::from(cert.cert.der().to_vec())];

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// HTTPS upstream answering `secure <path>` and echoing the `Host` it saw.
pub async fn start_https_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = self_signed_acceptor();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let service = service_fn(|request: Request<Incoming>| async move {
                    let host = request
                        .headers()
                        .get(header::HOST)
                        .cloned()
                        .unwrap_or_else(|| header::HeaderValue::from_static("-"));
                    let body = Full::new(Bytes::from(format!("secure {}", request.uri().path())));
                    let mut response = hyper::Response::new(body);
                    response.headers_mut().insert("x-upstream-host", host);
                    Ok::<_, Infallible>(response)
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(tls), service)
                    .await;
            });
        }
    });

    addr
}

/// WebSocket echo upstream behind TLS.
pub async fn start_wss_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<WsEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = self_signed_acceptor();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let events = events_tx.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    echo_websocket(tls, events).await;
                }
            });
        }
    });

    (addr, events_rx)
}
