//! A pretend upstream for trying the proxy by hand.
//!
//! ```text
//! cargo run --example mock_upstream            # listens on 127.0.0.1:3845
//! TARGET_URL=http://127.0.0.1:3845 cargo run   # proxy on :6969
//! curl -i http://localhost:6969/login          # two Set-Cookie headers + X-Proxied-By
//! curl -N http://localhost:6969/events         # server-sent events, one per second
//! ```

use axum::{
    body::{Body, Bytes},
    http::header,
    response::AppendHeaders,
    routing::get,
    Router,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/", get(|| async { "Hello from the pretend upstream" }))
        .route(
            "/login",
            get(|| async {
                (
                    AppendHeaders([
                        (header::SET_COOKIE, "session=demo; Path=/; HttpOnly"),
                        (header::SET_COOKIE, "theme=dark; Path=/"),
                    ]),
                    "logged in",
                )
            }),
        )
        .route(
            "/events",
            get(|| async {
                let ticks = ticks(5, Duration::from_secs(1));
                ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(ticks))
            }),
        );

    let addr = SocketAddr::from(([127, 0, 0, 1], 3845));
    println!("Pretend upstream listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn ticks(
    count: usize,
    every: Duration,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> {
    use futures_util::StreamExt;

    futures_util::stream::iter(0..count).then(move |i| async move {
        tokio::time::sleep(every).await;
        Ok(Bytes::from(format!("data: tick {}\n\n", i)))
    })
}
