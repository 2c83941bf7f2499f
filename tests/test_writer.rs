use httpwire::http::error::WriteError;
use httpwire::http::headers::HeaderBlock;
use httpwire::http::writer::{ResponseWriter, StatusCode, WriterStage, default_headers};

fn written(w: &ResponseWriter<Vec<u8>>) -> String {
    String::from_utf8(w.get_ref().clone()).unwrap()
}

#[test]
fn test_status_codes() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::try_from(500).unwrap(), StatusCode::InternalServerError);
    assert!(matches!(StatusCode::try_from(404), Err(WriteError::UnsupportedStatus(404))));
}

#[test]
fn test_default_headers() {
    let headers = default_headers(42);

    assert_eq!(headers.len(), 3);
    assert_eq!(headers.get("Content-Length"), Some("42"));
    assert_eq!(headers.get("Connection"), Some("close"));
    assert_eq!(headers.get("Content-Type"), Some("text/plain"));
}

#[tokio::test]
async fn test_status_line_per_code() {
    for (status, line) in [
        (StatusCode::Ok, "HTTP/1.1 200 OK\r\n"),
        (StatusCode::BadRequest, "HTTP/1.1 400 Bad Request\r\n"),
        (StatusCode::InternalServerError, "HTTP/1.1 500 Internal Server Error\r\n"),
    ] {
        let mut w = ResponseWriter::new(Vec::new());
        w.write_status_line(status).await.unwrap();
        assert_eq!(written(&w), line);
        assert_eq!(w.stage(), WriterStage::Headers);
    }
}

#[tokio::test]
async fn test_full_response_in_order() {
    let mut w = ResponseWriter::new(Vec::new());

    w.write_status_line(StatusCode::Ok).await.unwrap();
    w.write_headers(&default_headers(5)).await.unwrap();
    assert_eq!(w.write_body(b"he").await.unwrap(), 2);
    assert_eq!(w.write_body(b"llo").await.unwrap(), 3);
    assert_eq!(w.stage(), WriterStage::Body);

    let out = written(&w);
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("content-length: 5\r\n"));
    assert!(out.contains("connection: close\r\n"));
    assert!(out.contains("content-type: text/plain\r\n"));
    assert!(out.ends_with("\r\n\r\nhello"));
    assert_eq!(out.matches("\r\n").count(), 5);
}

#[tokio::test]
async fn test_body_before_headers_writes_nothing() {
    let mut w = ResponseWriter::new(Vec::new());

    let err = w.write_body(b"hello").await.unwrap_err();
    assert!(matches!(
        err,
        WriteError::Stage { call: "write_body", stage: WriterStage::StatusLine }
    ));
    assert!(w.get_ref().is_empty());
    assert_eq!(w.stage(), WriterStage::StatusLine);

    w.write_status_line(StatusCode::Ok).await.unwrap();
    let before = w.get_ref().len();
    assert!(w.write_body(b"hello").await.is_err());
    assert_eq!(w.get_ref().len(), before);
    assert_eq!(w.stage(), WriterStage::Headers);
}

#[tokio::test]
async fn test_out_of_stage_calls_are_rejected() {
    let mut w = ResponseWriter::new(Vec::new());
    let headers = HeaderBlock::new();

    assert!(w.write_headers(&headers).await.is_err());
    assert!(w.write_chunked_body(b"x").await.is_err());
    assert!(w.write_chunked_body_done().await.is_err());
    assert!(w.write_trailers(&headers).await.is_err());
    assert!(w.get_ref().is_empty());

    w.write_status_line(StatusCode::Ok).await.unwrap();
    let err = w.write_status_line(StatusCode::Ok).await.unwrap_err();
    assert!(matches!(
        err,
        WriteError::Stage { call: "write_status_line", stage: WriterStage::Headers }
    ));

    w.write_headers(&headers).await.unwrap();
    assert!(w.write_headers(&headers).await.is_err());
    assert!(w.write_trailers(&headers).await.is_err());
    assert_eq!(w.stage(), WriterStage::Body);

    w.write_chunked_body_done().await.unwrap();
    assert!(w.write_body(b"x").await.is_err());
    assert!(w.write_chunked_body(b"x").await.is_err());
    assert!(w.write_chunked_body_done().await.is_err());
    assert_eq!(w.stage(), WriterStage::Trailers);
}

#[tokio::test]
async fn test_stage_error_message_names_call_and_stage() {
    let mut w = ResponseWriter::new(Vec::new());
    let err = w.write_chunked_body_done().await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("write_chunked_body_done"));
    assert!(msg.contains("StatusLine"));
}

#[tokio::test]
async fn test_chunk_framing() {
    let mut w = ResponseWriter::new(Vec::new());
    w.write_status_line(StatusCode::Ok).await.unwrap();
    w.write_headers(&HeaderBlock::new()).await.unwrap();
    let start = w.get_ref().len();

    let n = w.write_chunked_body(&[b'a'; 26]).await.unwrap();
    assert_eq!(n, 2 + 2 + 26 + 2);
    w.write_chunked_body(b"").await.unwrap();
    w.write_chunked_body_done().await.unwrap();

    let out = String::from_utf8(w.get_ref()[start..].to_vec()).unwrap();
    assert_eq!(out, format!("1a\r\n{}\r\n0\r\n\r\n0\r\n", "a".repeat(26)));
}

#[tokio::test]
async fn test_empty_trailers_still_terminate() {
    let mut w = ResponseWriter::new(Vec::new());
    w.write_status_line(StatusCode::Ok).await.unwrap();
    w.write_headers(&HeaderBlock::new()).await.unwrap();
    w.write_chunked_body(b"hi").await.unwrap();
    w.write_chunked_body_done().await.unwrap();
    w.write_trailers(&HeaderBlock::new()).await.unwrap();

    assert!(written(&w).ends_with("\r\n\r\n2\r\nhi\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn test_trailers_return_writer_to_body_stage() {
    let mut w = ResponseWriter::new(Vec::new());
    w.write_status_line(StatusCode::Ok).await.unwrap();
    w.write_headers(&HeaderBlock::new()).await.unwrap();
    w.write_chunked_body_done().await.unwrap();

    let mut trailers = HeaderBlock::new();
    trailers.set("X-Content-Length", "0");
    w.write_trailers(&trailers).await.unwrap();

    // The response is complete here; nothing else has to be written
    assert_eq!(w.stage(), WriterStage::Body);
    assert!(written(&w).ends_with("0\r\nx-content-length: 0\r\n\r\n"));
    assert!(w.write_trailers(&trailers).await.is_err());
}
