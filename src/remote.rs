//! Client for an external approximate-nearest-neighbour index.
//!
//! Speaks the `POST {endpoint}/query` JSON protocol of hosted vector
//! databases: the request carries the query vector and `topK`, the response a
//! list of matches with id, score and optional track metadata.

use crate::config::RemoteIndexConfig;
use crate::error::BackendError;
use crate::features::FeatureVector;
use anyhow::Result;
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something that can answer nearest-neighbour queries over feature vectors.
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` matches for `vector`, best first.
    ///
    /// # Errors
    ///
    /// Any failure to obtain a usable answer, timeouts included.
    fn query(&self, vector: &FeatureVector, top_k: usize) -> Result<Vec<RemoteMatch>, BackendError>;
}

/// One hit returned by the index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Option<RemoteMetadata>,
}

/// Track fields stored next to each vector in the index.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteMetadata {
    pub track_name: Option<String>,
    pub artists: Option<String>,
    pub track_genre: Option<String>,
    pub popularity: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f64],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RemoteMatch>,
}

/// HTTP implementation of [`VectorIndex`] with a bounded request timeout.
pub struct HttpVectorIndex {
    client: Client,
    query_url: String,
    api_key: Option<String>,
    namespace: Option<String>,
    timeout: Duration,
}

impl HttpVectorIndex {
    pub fn new(config: &RemoteIndexConfig) -> Result<Self> {
        let timeout = config.timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            query_url: format!("{}/query", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            namespace: config.namespace.clone(),
            timeout,
        })
    }

    fn map_transport(&self, e: &reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

impl VectorIndex for HttpVectorIndex {
    fn query(&self, vector: &FeatureVector, top_k: usize) -> Result<Vec<RemoteMatch>, BackendError> {
        let body = QueryRequest {
            vector: vector.as_slice(),
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };

        let mut request = self.client.post(&self.query_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key);
        }

        debug!("Querying remote index at {} (topK={top_k})", self.query_url);
        let response = request.send().map_err(|e| self.map_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let text = response.text().map_err(|e| self.map_transport(&e))?;
        let parsed: QueryResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(parsed.matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response on a random local port.
    fn serve_once(status_line: &'static str, body: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Read headers plus the declared body before answering.
            loop {
                let Ok(n) = stream.read(&mut buf) else { return };
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let declared = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .and_then(|v| v.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + declared {
                        break;
                    }
                }
            }
            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        });

        format!("http://{addr}")
    }

    fn index(endpoint: String, timeout_ms: u64) -> HttpVectorIndex {
        HttpVectorIndex::new(&RemoteIndexConfig {
            endpoint,
            api_key: Some("secret".to_string()),
            namespace: None,
            timeout_ms,
        })
        .expect("client builds")
    }

    #[test]
    fn test_query_parses_matches() {
        let url = serve_once(
            "200 OK",
            r#"{"matches":[{"id":"a","score":0.98,"metadata":{"track_name":"A","popularity":55.0}},{"id":"b","score":0.5}]}"#,
            Duration::ZERO,
        );

        let matches = index(url, 2_000)
            .query(&FeatureVector::splat(0.5), 2)
            .expect("query succeeds");

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(
            matches[0].metadata.as_ref().and_then(|m| m.popularity),
            Some(55.0)
        );
        assert!(matches[1].metadata.is_none());
    }

    #[test]
    fn test_error_status_is_reported() {
        let url = serve_once("503 Service Unavailable", "{}", Duration::ZERO);
        let err = index(url, 2_000)
            .query(&FeatureVector::splat(0.5), 3)
            .expect_err("503 must fail");
        assert!(matches!(err, BackendError::Status(503)));
    }

    #[test]
    fn test_slow_index_times_out() {
        let url = serve_once("200 OK", r#"{"matches":[]}"#, Duration::from_millis(1_500));
        let err = index(url, 200)
            .query(&FeatureVector::splat(0.5), 3)
            .expect_err("slow index must time out");
        assert!(matches!(err, BackendError::Timeout(_)), "got {err:?}");
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        let url = serve_once("200 OK", "not json", Duration::ZERO);
        let err = index(url, 2_000)
            .query(&FeatureVector::splat(0.5), 3)
            .expect_err("garbage must fail");
        assert!(matches!(err, BackendError::Decode(_)));
    }
}
