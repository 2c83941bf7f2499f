//! End-to-end checks of the demo routes.

use httpwire::app::App;
use httpwire::config::Config;
use httpwire::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serves one canned response to the first connection and returns the
/// request it received.
async fn fake_upstream(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        while !received.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response).await.unwrap();
        String::from_utf8(received).unwrap()
    });

    (url, task)
}

async fn start(cfg: Config) -> Server {
    let app = App::new(&cfg).unwrap();
    Server::bind("127.0.0.1:0", app).await.unwrap()
}

async fn get(server: &Server, target: &str) -> String {
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let req = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Concatenates the chunk data that follows the response head.
fn chunked_payload(response: &str) -> String {
    let (_, mut rest) = response.split_once("\r\n\r\n").unwrap();
    let mut payload = String::new();
    loop {
        let (size, tail) = rest.split_once("\r\n").unwrap();
        let size = usize::from_str_radix(size, 16).unwrap();
        if size == 0 {
            return payload;
        }
        payload.push_str(&tail[..size]);
        rest = &tail[size + 2..];
    }
}

#[tokio::test]
async fn test_status_pages() {
    let server = start(Config::default()).await;

    let ok = get(&server, "/").await;
    assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(ok.contains("content-type: text/html\r\n"));
    assert!(ok.contains("<h1>Success!</h1>"));

    let bad = get(&server, "/yourproblem").await;
    assert!(bad.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    let err = get(&server, "/myproblem").await;
    assert!(err.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));

    server.close();
}

#[tokio::test]
async fn test_passthrough_relays_chunked_with_trailer() {
    let (upstream, received) = fake_upstream(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}",
    )
    .await;
    let server = start(Config {
        upstream,
        ..Config::default()
    })
    .await;

    let response = get(&server, "/httpbin/stream/1").await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("transfer-encoding: chunked\r\n"));
    assert!(response.contains("trailer: X-Content-SHA256, X-Content-Length\r\n"));
    assert!(response.contains("content-type: application/json\r\n"));
    assert!(!response.contains("content-length:"));
    assert!(response.contains("\r\n\r\nb\r\n{\"ok\":true}\r\n0\r\n"));
    assert!(response.contains(
        "x-content-sha256: 4062edaf750fb8074e7e83e0c9028c94e32468a8b6f1614774328ef045150f93\r\n"
    ));
    assert!(response.contains("x-content-length: 11\r\n"));
    assert!(response.ends_with("\r\n\r\n"));

    let upstream_request = received.await.unwrap();
    assert!(upstream_request.starts_with("GET /stream/1 HTTP/1.1\r\n"));
    assert!(upstream_request.contains("connection: close\r\n"));

    server.close();
}

#[tokio::test]
async fn test_passthrough_decodes_chunked_upstream() {
    let (upstream, _received) = fake_upstream(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain\r\n\r\n\
          5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\nX-Upstream: dropped\r\n\r\n",
    )
    .await;
    let server = start(Config {
        upstream,
        ..Config::default()
    })
    .await;

    let response = get(&server, "/httpbin/stream/2").await;

    // Payload is re-chunked once, never wrapped around the upstream framing
    assert_eq!(chunked_payload(&response), "hello world");
    assert!(response.contains("x-content-length: 11\r\n"));
    assert!(response.contains(
        "x-content-sha256: b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9\r\n"
    ));
    assert!(!response.contains("x-upstream"));
    assert!(!response.contains("5;ext=1"));
    server.close();
}

#[tokio::test]
async fn test_passthrough_splits_large_bodies() {
    static RESPONSE: std::sync::OnceLock<Vec<u8>> = std::sync::OnceLock::new();
    let response = RESPONSE.get_or_init(|| {
        let mut r = b"HTTP/1.1 200 OK\r\nContent-Length: 2500\r\n\r\n".to_vec();
        r.extend(std::iter::repeat_n(b'q', 2500));
        r
    });

    let (upstream, _received) = fake_upstream(response).await;
    let server = start(Config {
        upstream,
        ..Config::default()
    })
    .await;

    let response = get(&server, "/httpbin/bytes").await;

    // 1024 = 0x400; 2500 bytes arrive as at least three chunks
    assert!(response.contains("\r\n400\r\n"));
    assert!(response.contains("\r\n0\r\n"));
    assert!(response.contains("x-content-length: 2500\r\n"));
    server.close();
}

#[tokio::test]
async fn test_passthrough_unreachable_upstream() {
    // Grab a free port, then release it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let server = start(Config {
        upstream,
        ..Config::default()
    })
    .await;

    let response = get(&server, "/httpbin/get").await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    server.close();
}

#[tokio::test]
async fn test_video_streams_file() {
    let path = std::env::temp_dir().join(format!("httpwire-video-{}.mp4", std::process::id()));
    let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &content).unwrap();

    let server = start(Config {
        video_path: path.to_string_lossy().into_owned(),
        ..Config::default()
    })
    .await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET /video HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();

    let head_end = response.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let head = String::from_utf8_lossy(&response[..head_end]);
    assert!(head.contains("content-type: video/mp4\r\n"));
    assert!(head.contains("content-length: 20000\r\n"));
    assert_eq!(&response[head_end..], &content[..]);

    std::fs::remove_file(&path).unwrap();
    server.close();
}

#[tokio::test]
async fn test_missing_video_is_server_error() {
    let server = start(Config {
        video_path: "/nonexistent/httpwire/video.mp4".to_string(),
        ..Config::default()
    })
    .await;

    let response = get(&server, "/video").await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    server.close();
}

#[test]
fn test_app_rejects_non_http_upstream() {
    let cfg = Config {
        upstream: "https://httpbin.org".to_string(),
        ..Config::default()
    };
    assert!(App::new(&cfg).is_err());
}
