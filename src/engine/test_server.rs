//! A loopback HTTP server for exercising the remote paths in unit tests.
//!
//! Serves a fixed route table over plain `std::net`, one connection at a
//! time, and records every request line. Unknown paths answer 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

type RequestLog = Arc<Mutex<Vec<(String, String)>>>;

pub(crate) struct TestServer {
    base: String,
    requests: RequestLog,
}

impl TestServer {
    /// Serve `routes` (path, body) until the test binary exits.
    pub(crate) fn start(routes: Vec<(&str, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: HashMap<String, Vec<u8>> = routes
            .into_iter()
            .map(|(path, body)| (path.to_string(), body))
            .collect();
        let requests = RequestLog::default();
        let log = requests.clone();

        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                serve(stream, &routes, &log);
            }
        });

        Self { base, requests }
    }

    pub(crate) fn url(&self, path: &str) -> reqwest::Url {
        reqwest::Url::parse(&format!("{}{}", self.base, path)).unwrap()
    }

    /// `(method, path)` of every request received so far.
    pub(crate) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }
}

fn serve(mut stream: TcpStream, routes: &HashMap<String, Vec<u8>>, log: &RequestLog) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => head.push(byte[0]),
            _ => return,
        }
    }

    let head = String::from_utf8_lossy(&head);
    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    log.lock().unwrap().push((method.clone(), path.clone()));

    let (status, body) = match routes.get(&path) {
        Some(body) => ("200 OK", body.as_slice()),
        None => ("404 Not Found", &b"not found"[..]),
    };
    let _ = write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if method != "HEAD" {
        let _ = stream.write_all(body);
    }
    let _ = stream.flush();
}
