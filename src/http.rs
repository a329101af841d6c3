//! Remote fetcher.
//!
//! All downloads go through the [`Transport`] trait so the parsing and
//! analysis layers never see `reqwest` types. [`HttpTransport`] is the real
//! blocking client; [`MemoryTransport`] serves canned payloads (saved files,
//! tests).

use reqwest::blocking::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::FundsConfig;
use crate::error::{FundsError, Result, TransportError};

/// A blocking GET returning the raw payload.
pub trait Transport {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Map a non-success HTTP status to the transport taxonomy.
///
/// Returns `None` for 2xx statuses.
pub fn classify_status(url: &str, status: u16) -> Option<TransportError> {
    match status {
        200..=299 => None,
        407 => Some(TransportError::ProxyAuthRequired {
            url: url.to_string(),
        }),
        404 => Some(TransportError::NotFound {
            url: url.to_string(),
        }),
        408 | 504 => Some(TransportError::Timeout {
            url: url.to_string(),
        }),
        other => Some(TransportError::Status {
            url: url.to_string(),
            status: other,
        }),
    }
}

/// Whether a connect failure was the proxy refusing credentials.
///
/// A 407 answer to an HTTPS `CONNECT` never reaches the response status; it
/// surfaces as a connect error whose source chain names the refusal.
fn is_proxy_auth_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().to_lowercase().contains("proxy authentication required") {
            return true;
        }
        current = e.source();
    }
    false
}

/// `reqwest` backed transport honouring the proxy and timeout settings.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FundsConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone());

        if let Some(proxy_cfg) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(&proxy_cfg.url).map_err(|e| {
                FundsError::InvalidParameter(format!("invalid proxy url '{}': {}", proxy_cfg.url, e))
            })?;
            if let Some(user) = &proxy_cfg.username {
                proxy = proxy.basic_auth(user, proxy_cfg.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
            if !proxy_cfg.verify_tls {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| FundsError::InvalidParameter(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        debug!("GET {}", url);

        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else if e.status().map(|s| s.as_u16()) == Some(407) || is_proxy_auth_failure(&e) {
                TransportError::ProxyAuthRequired {
                    url: url.to_string(),
                }
            } else {
                TransportError::Unknown(format!("{}: {}", url, e))
            }
        })?;

        if let Some(err) = classify_status(url, response.status().as_u16()) {
            return Err(err);
        }

        let bytes = response.bytes().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                }
            } else {
                TransportError::Unknown(format!("failed to read response body from {}: {}", url, e))
            }
        })?;

        info!(
            "Downloaded {} bytes from {} in {:.2}s",
            bytes.len(),
            url,
            started.elapsed().as_secs_f64()
        );
        Ok(bytes.to_vec())
    }
}

/// In-memory transport keyed by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryTransport {
    responses: HashMap<String, std::result::Result<Vec<u8>, TransportError>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), Ok(body.into()));
        self
    }

    /// Register a status answer (e.g. 407) for `url`.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        let answer = match classify_status(&url, status) {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        };
        self.responses.insert(url, answer);
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(url.to_string()),
            Err(poisoned) => poisoned.into_inner().push(url.to_string()),
        }
        match self.responses.get(url) {
            Some(answer) => answer.clone(),
            None => Err(TransportError::NotFound {
                url: url.to_string(),
            }),
        }
    }
}
