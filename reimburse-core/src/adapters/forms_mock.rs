//! Mock form-response API for adapter tests
//!
//! Serves `GET /{campaign}/responses?...&page=N` with the same
//! `{data, meta.pagination}` envelope as the real service. Requests are
//! recorded so tests can assert on query strings.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone)]
pub struct MockFormsConfig {
    pub pages: u64,
    pub records_per_page: usize,
    /// Answer this page with HTTP 500
    pub fail_page: Option<u64>,
    /// Answer with a bare JSON array instead of the envelope
    pub bare_array: bool,
}

impl Default for MockFormsConfig {
    fn default() -> Self {
        Self {
            pages: 1,
            records_per_page: 1,
            fail_page: None,
            bare_array: false,
        }
    }
}

pub struct MockFormsServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<String>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockFormsServer {
    /// Start on a random free port
    pub fn start(config: MockFormsConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));

        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => handle_connection(stream, &config, &requests_clone),
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Request targets (path and query) in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockFormsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockFormsConfig, requests: &Mutex<Vec<String>>) {
    let _ = stream.set_nonblocking(false);
    let mut buffer = [0; 8192];
    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]);

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 || parts[0] != "GET" {
        send_response(&mut stream, 405, "Method Not Allowed", r#"{"error": "GET only"}"#);
        return;
    }
    let target = parts[1];
    if let Ok(mut log) = requests.lock() {
        log.push(target.to_string());
    }

    let authorized = request
        .lines()
        .any(|line| line.to_ascii_lowercase().starts_with("x-authorization: valid_"));
    if !authorized {
        send_response(&mut stream, 401, "Unauthorized", r#"{"error": "Invalid API key"}"#);
        return;
    }

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let campaign = path.trim_start_matches('/').split('/').next().unwrap_or("");
    if !path.ends_with("/responses") || campaign.parse::<u64>().is_err() {
        send_response(&mut stream, 404, "Not Found", r#"{"error": "Endpoint not found"}"#);
        return;
    }

    let page: u64 = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1);

    if config.fail_page == Some(page) {
        send_response(&mut stream, 500, "Internal Server Error", r#"{"error": "boom"}"#);
        return;
    }

    let records: Vec<JsonValue> = (1..=config.records_per_page)
        .map(|i| mock_record(page, i))
        .collect();
    let body = if config.bare_array {
        JsonValue::Array(records)
    } else {
        json!({
            "data": records,
            "meta": {"pagination": {"currentPage": page, "totalPages": config.pages}}
        })
    };
    send_response(&mut stream, 200, "OK", &body.to_string());
}

fn mock_record(page: u64, index: usize) -> JsonValue {
    json!({
        "id": format!("{}-{}", page, index),
        "fields": [
            {"number": 4, "label": "Employee ID", "value": format!("{}", 100 + index)},
            {"number": 3, "label": "First Name", "value": "Test"},
            {"number": 2, "label": "Last Name", "value": format!("Page{}", page)}
        ]
    })
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
