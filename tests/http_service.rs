//! `HttpService` against a throwaway HTTP server on a local port.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

use detect_client::detect::{DetectionService, HttpService, UploadRequest};
use detect_client::error::{ServiceError, NETWORK_ERROR_MESSAGE, PROCESSING_FAILED_MESSAGE};

struct Captured {
    request_line: String,
    headers: Vec<String>,
    body: Vec<u8>,
}

/// Serve one canned response per accepted connection, in order.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let captured = handle(stream, status, body);
            let _ = tx.send(captured);
        }
    });
    (format!("http://{}", addr), rx)
}

fn handle(stream: TcpStream, status: u16, body: &str) -> Captured {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("request line");
    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header");
        let line = line.trim_end().to_string();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        headers.push(line);
    }
    let mut request_body = vec![0u8; content_length];
    reader.read_exact(&mut request_body).expect("body");

    let mut stream = stream;
    let response = format!(
        "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).expect("write response");
    Captured {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: request_body,
    }
}

fn request(bytes: &[u8]) -> UploadRequest<'_> {
    UploadRequest {
        file_name: "scene.png",
        mime_type: "image/png",
        bytes,
        confidence: 0.5,
    }
}

const SUCCESS: &str = r#"{
    "success": true,
    "detections": [
        {"class": "FirstAidBox", "confidence": 0.81, "bbox": [1, 2, 30, 40], "center": [15, 21]}
    ],
    "image_base64": "data:image/png;base64,aGVsbG8=",
    "stats": {
        "total_detections": 1,
        "class_counts": {"FirstAidBox": 1},
        "average_confidence": 0.81,
        "processing_time": 12.5
    },
    "timestamp": "2024-05-01 12:00:00"
}"#;

#[test]
fn upload_sends_multipart_and_parses_result() {
    let (base, captured) = serve(vec![(200, SUCCESS)]);
    let service = HttpService::new(&base).unwrap();

    let result = service.upload(&request(b"PNGDATA")).unwrap();
    assert_eq!(result.stats.total_detections, 1);
    assert_eq!(result.stats.processing_time_ms, 12.5);
    assert_eq!(result.detections[0].class_name, "FirstAidBox");
    assert_eq!(result.class_counts[0].count, 1);
    assert_eq!(result.annotated_image.unwrap().decode().unwrap(), b"hello");

    let captured = captured.recv().unwrap();
    assert_eq!(captured.request_line, "POST /upload HTTP/1.1");
    assert!(captured
        .headers
        .iter()
        .any(|h| h.to_ascii_lowercase().starts_with("content-type: multipart/form-data; boundary=")));
    let body = String::from_utf8_lossy(&captured.body);
    assert!(body.contains("name=\"file\"; filename=\"scene.png\""));
    assert!(body.contains("PNGDATA"));
    assert!(body.contains("name=\"confidence\"\r\n\r\n0.5\r\n"));
}

#[test]
fn non_success_status_carries_server_message() {
    let (base, _captured) = serve(vec![
        (422, r#"{"error": "bad image"}"#),
        (500, "<html>oops</html>"),
    ]);
    let service = HttpService::new(&base).unwrap();

    let err = service.upload(&request(b"x")).unwrap_err();
    assert!(matches!(err, ServiceError::Request { status: 422, .. }));
    assert_eq!(err.user_message(), "bad image");

    let err = service.upload(&request(b"x")).unwrap_err();
    assert!(matches!(err, ServiceError::Request { status: 500, message: None }));
    assert_eq!(err.user_message(), PROCESSING_FAILED_MESSAGE);
}

#[test]
fn malformed_success_body_is_network_error() {
    let (base, _captured) = serve(vec![(200, "not json")]);
    let service = HttpService::new(&base).unwrap();
    let err = service.upload(&request(b"x")).unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)));
    assert_eq!(err.user_message(), NETWORK_ERROR_MESSAGE);
}

#[test]
fn health_reads_body_even_on_error_status() {
    let (base, captured) = serve(vec![
        (200, r#"{"status": "healthy", "model_loaded": true}"#),
        (503, r#"{"status": "unhealthy", "model_loaded": false}"#),
    ]);
    let service = HttpService::new(&format!("{}/", base)).unwrap();

    let report = service.health().unwrap();
    assert_eq!(report.status, "healthy");
    assert!(report.model_loaded);
    assert_eq!(captured.recv().unwrap().request_line, "GET /health HTTP/1.1");

    let report = service.health().unwrap();
    assert_eq!(report.status, "unhealthy");
    assert!(!report.model_loaded);
}

#[test]
fn unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = HttpService::new(&format!("http://{}", addr)).unwrap();
    let err = service.health().unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)));
    assert_eq!(err.user_message(), NETWORK_ERROR_MESSAGE);
}
