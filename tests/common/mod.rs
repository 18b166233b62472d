#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use address_standardizer_lib::Settings;

pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        StubResponse { status, headers: Vec::new(), body: body.into() }
    }

    pub fn labels(labels: &[&str]) -> Self {
        let features: Vec<String> = labels
            .iter()
            .map(|l| format!(r#"{{"type":"Feature","properties":{{"label":"{}"}}}}"#, l))
            .collect();
        Self::json(
            200,
            format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(",")),
        )
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Minimal one-request-per-connection HTTP server standing in for geosearch.
pub struct StubServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// `respond` gets the 0-based request number and the decoded `text` parameter.
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(usize, &str) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let queries = Arc::new(Mutex::new(Vec::new()));

        let hits_srv = hits.clone();
        let queries_srv = queries.clone();
        let respond = Arc::new(respond);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let hits_srv = hits_srv.clone();
                let queries_srv = queries_srv.clone();
                let respond = respond.clone();
                // One thread per connection so a slow response does not block the next one.
                thread::spawn(move || {
                    let Some(target) = read_request_target(&mut stream) else { return };
                    let text = text_param(&target);
                    queries_srv.lock().unwrap().push(text.clone());
                    let n = hits_srv.fetch_add(1, Ordering::SeqCst);
                    write_response(&mut stream, respond(n, &text));
                });
            }
        });

        StubServer { base_url, hits, queries }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v2/search", self.base_url)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn text_param(target: &str) -> String {
    url::Url::parse(&format!("http://stub{}", target))
        .ok()
        .and_then(|u| u.query_pairs().find(|(k, _)| k == "text").map(|(_, v)| v.into_owned()))
        .unwrap_or_default()
}

fn write_response(stream: &mut TcpStream, resp: StubResponse) {
    let mut out = format!(
        "HTTP/1.1 {} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        resp.status,
        resp.body.len()
    );
    for (name, value) in &resp.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    out.push_str(&resp.body);
    let _ = stream.write_all(out.as_bytes());
    let _ = stream.flush();
}

/// Settings for a scratch directory with no pacing and no backoff sleeps.
pub fn test_settings(dir: &Path, endpoint: &str) -> Settings {
    let mut settings = Settings::new(dir.join("input.csv"), dir.join("output.csv"));
    settings.endpoint = endpoint.parse().unwrap();
    settings.batch_size = 3;
    settings.rate_limit_delay = Duration::ZERO;
    settings.backoff_factor = 0.0;
    settings.connect_timeout = Duration::from_secs(1);
    settings.read_timeout = Duration::from_secs(5);
    settings
}

/// An endpoint nothing listens on.
pub fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v2/search", addr)
}

pub fn write_input(settings: &Settings, rows: &[(&str, &str)]) {
    let mut wtr = csv::Writer::from_path(&settings.input_path).unwrap();
    wtr.write_record(["property_id", "borough", "property_address"]).unwrap();
    for (id, address) in rows {
        wtr.write_record([*id, "Manhattan", *address]).unwrap();
    }
    wtr.flush().unwrap();
}

/// `property_id` column of the output, in file order.
pub fn output_ids(settings: &Settings) -> Vec<String> {
    let mut rdr = csv::Reader::from_path(&settings.output_path).unwrap();
    rdr.records().map(|r| r.unwrap()[0].to_string()).collect()
}
