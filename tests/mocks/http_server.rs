//! Minimal HTTP server for exercising the http and webhook runners.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A request as the server received it
#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    /// e.g. "POST /hook HTTP/1.1"
    pub request_line: String,
    /// Header names lowercased
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn method(&self) -> &str {
        self.request_line.split_whitespace().next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned response served to every connection
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn new(status: u16, body: &str) -> Self {
        MockResponse {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Serves `response` to the next `connections` clients.
///
/// Returns the base URL and a handle yielding the captured requests.
pub fn serve(response: MockResponse, connections: usize) -> (String, JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for stream in listener.incoming().take(connections) {
            let Ok(stream) = stream else { break };
            if let Some(request) = handle_connection(stream, &response) {
                captured.push(request);
            }
        }
        captured
    });

    (url, handle)
}

fn handle_connection(mut stream: TcpStream, response: &MockResponse) -> Option<CapturedRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request = CapturedRequest::default();
    reader.read_line(&mut request.request_line).ok()?;
    request.request_line = request.request_line.trim_end().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            request.headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    request.body = String::from_utf8_lossy(&body).into_owned();

    if let Some(delay) = response.delay {
        thread::sleep(delay);
    }

    let reply = format!(
        "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    // The client may already have given up on a delayed response
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();

    Some(request)
}
