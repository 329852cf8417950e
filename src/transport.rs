//! HTTP boundary. [`Transport`] is the seam tests replace with a stub.

use crate::error::{CensusError, Result};
use crate::request::RequestDescriptor;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Unprocessed answer from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Originating URL with the credential masked.
    pub url: String,
}

/// Executes one request. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn send(&self, request: &RequestDescriptor, timeout: Option<Duration>) -> Result<RawResponse>;
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    /// Build a client with the given total and connect timeouts.
    ///
    /// ### Errors
    /// [`CensusError::Transport`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout) // total request timeout
            .connect_timeout(connect_timeout)
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("census_rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(String::new(), e))?;
        Ok(Self { http })
    }
}

// reqwest embeds the URL in its errors; strip it so the key cannot leak.
fn transport_error(url: String, e: reqwest::Error) -> CensusError {
    CensusError::Transport {
        url,
        timed_out: e.is_timeout(),
        source: Box::new(e.without_url()),
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RequestDescriptor, timeout: Option<Duration>) -> Result<RawResponse> {
        let shown = request.redacted_url();
        log::debug!("{request}");

        let mut rb = self.http.get(request.url());
        for (name, value) in &request.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(t) = timeout {
            rb = rb.timeout(t);
        }
        let resp = rb.send().map_err(|e| transport_error(shown.clone(), e))?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| transport_error(shown.clone(), e))?;
        log::debug!("HTTP {status} ({} bytes) from {shown}", body.len());
        Ok(RawResponse {
            status,
            body,
            url: shown,
        })
    }
}
