use shoptrack::api::{
    GeminiClient, MSG_BAD_IMAGE, MSG_QUOTA, ReceiptExtractor, ReceiptImage, StoreAdvisor,
    parse_receipt_items,
};
use shoptrack::config::ExtractionConfig;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

#[test]
fn numbers_as_strings_and_missing_quantity() {
    let text = r#"```json
{"items": [
  {"name": "Jasmine Rice 5kg", "quantity": "2", "price": "12.90"},
  {"name": "Kopi-O Sachets", "price": 4.5},
  {"name": "GST 9%", "quantity": 1, "price": null}
]}
```"#;
    let items = parse_receipt_items(text).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].quantity, 2.0);
    assert_eq!(items[0].price, 12.9);
    assert_eq!(items[1].name, "Kopi-O Sachets");
    assert_eq!(items[1].quantity, 1.0);
}

#[test]
fn image_from_path_uses_extension() {
    let dir = tempfile::tempdir().unwrap();
    let jpg = dir.path().join("receipt.JPG");
    std::fs::write(&jpg, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
    let img = ReceiptImage::from_path(&jpg).unwrap();
    assert_eq!(img.mime_type, "image/jpeg");
    assert!(img.to_data_url().starts_with("data:image/jpeg;base64,"));

    let txt = dir.path().join("receipt.txt");
    std::fs::write(&txt, "hello").unwrap();
    assert!(ReceiptImage::from_path(&txt).unwrap_err().is_validation());

    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").unwrap();
    assert_eq!(ReceiptImage::from_path(&empty).unwrap_err().to_string(), MSG_BAD_IMAGE);
}

/// Serve exactly one HTTP response on a local port; returns the base URL.
fn serve_once(status: &'static str, body: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
            head.push_str(&line);
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut req_body = vec![0; content_length];
        reader.read_exact(&mut req_body).unwrap();
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        head + &String::from_utf8_lossy(&req_body)
    });
    (format!("http://{addr}/v1beta"), handle)
}

fn config(base_url: String) -> ExtractionConfig {
    ExtractionConfig {
        base_url,
        api_key: Some("test-key".into()),
        timeout_secs: 5,
        ..ExtractionConfig::default()
    }
}

fn candidate(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

#[test]
fn client_extracts_items_from_local_server() {
    let (base, server) = serve_once(
        "200 OK",
        candidate(r#"{"items":[{"name":"Milo","quantity":1,"price":9.95}]}"#),
    );
    let client = GeminiClient::new(&config(base)).unwrap();
    let img = ReceiptImage {
        mime_type: "image/png".into(),
        bytes: vec![1, 2, 3],
    };
    let items = client.extract_items(&img).unwrap();
    assert_eq!(items[0].name, "Milo");

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent"));
    assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains("\"inlineData\"") || request.contains("\"inline_data\""));
}

#[test]
fn quota_errors_get_a_friendly_message() {
    let (base, server) = serve_once("429 Too Many Requests", "{}".into());
    let client = GeminiClient::new(&config(base)).unwrap();
    let err = client.suggest_store("Milo", &[]).unwrap_err();
    assert_eq!(err.to_string(), MSG_QUOTA);
    server.join().unwrap();
}
