//! Loopback HTTP server standing in for the EPI website in tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Status code and body returned for one request
pub type Reply = (u16, String);

/// A running mock server and the request targets it has received
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Starts a server answering every request with `handler(target)`, where
    /// `target` is the request path plus query string
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind loopback listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&buf);
                    let target = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    log.lock().unwrap().push(target.clone());

                    let (status, body) = handler(&target);
                    let response = format!(
                        "HTTP/1.1 {} Mock\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}/epi", addr),
            requests,
        }
    }

    /// Every request target received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose target starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|target| target.starts_with(prefix))
            .count()
    }
}

/// Value of a query-string parameter in a request target
pub fn query_param<'a>(target: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

pub const METADATA: &str = r#"{
    "data": {
        "model": {"1": {"name": "Diabetes mellitus", "model_id": 587}},
        "measure": {"5": {"name": "Prevalence", "measure_id": 5}},
        "year": {
            "a": {"name": 2015, "year_id": 2015},
            "b": {"name": 2019, "year_id": 2019}
        },
        "age": {"9": {"name": "20-24 years", "age_id": 9}},
        "sex": {
            "1": {"name": "Male", "sex_id": 1},
            "2": {"name": "Female", "sex_id": 2}
        }
    }
}"#;

pub const VERSIONS: &str = r#"{
    "data": {
        "1": {"version": 100, "measure": 5},
        "2": {"version": 90, "measure": null}
    }
}"#;

pub const WORKED_EXAMPLE: &str = r#"{
    "model": ["Diabetes mellitus"],
    "measure": ["Prevalence"],
    "year": ["2015", "2019"],
    "age": ["20-24 years"],
    "sex": ["Male", "Female"]
}"#;

/// Answers the metadata and versions endpoints; datasets echo their year,
/// sex and version so rows can be traced back to the request
pub fn epi_reply(target: &str) -> Reply {
    if target.starts_with("/epi/api/metadata") {
        (200, METADATA.to_string())
    } else if target.starts_with("/epi/api/model/versions") {
        (200, VERSIONS.to_string())
    } else if target.starts_with("/epi/api/model/results/download") {
        let year = query_param(target, "year").unwrap_or("?");
        let sex = query_param(target, "sex").unwrap_or("?");
        let version = query_param(target, "version").unwrap_or("?");
        (
            200,
            format!("location_name,year_id,sex_id,version,val\nGlobal,{},{},{},0.5\n", year, sex, version),
        )
    } else {
        (404, "not found".to_string())
    }
}
