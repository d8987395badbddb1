//! End-to-end: a real TCP connection through `Server` into an `App`.

use std::net::SocketAddr;

use rttp_router::context::Context;
use rttp_router::middleware::{CatchAndRenderErrors, from_middleware};
use rttp_router::router::Router;
use rttp_router::{App, Response, Server, StatusCode, apps};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start() -> SocketAddr {
    let mut router = Router::new();
    router
        .middleware(from_middleware(CatchAndRenderErrors::new()))
        .get("/hello/:name", |ctx: Context| async move {
            let name = ctx.params().get("name").unwrap_or_default().to_owned();
            Ok(Some(Response::text(StatusCode::Ok, format!("hello {name}"))))
        })
        .post("/echo", |ctx: Context| async move {
            let text = ctx.body().text()?.to_owned();
            Ok(Some(Response::text(StatusCode::Ok, text)))
        })
        .routes(apps::not_found());
    let app = App::new(router.build().unwrap()).unwrap();

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(app));
    addr
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_matched_route() {
    let addr = start().await;
    let response = roundtrip(
        addr,
        "GET /hello/world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nhello world"), "{response}");
}

#[tokio::test]
async fn reads_content_length_body() {
    let addr = start().await;
    let response = roundtrip(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhowdy",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("howdy"), "{response}");
}

#[tokio::test]
async fn unknown_paths_render_not_found_page() {
    let addr = start().await;
    let response = roundtrip(
        addr,
        "GET /nope.json HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.contains(r#""statusCode":404"#), "{response}");
}

#[tokio::test]
async fn keep_alive_serves_pipelined_requests() {
    let addr = start().await;
    let response = roundtrip(
        addr,
        "GET /hello/a HTTP/1.1\r\nHost: localhost\r\n\r\n\
         GET /hello/b HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2, "{response}");
    assert!(response.contains("hello a"));
    assert!(response.ends_with("hello b"));
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let addr = start().await;
    let response = roundtrip(addr, "NOT A REQUEST\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
}
