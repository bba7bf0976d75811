//! HTTP client for the ingestion endpoint
//!
//! A batch is posted as a form with two fields:
//!
//! ```text
//! POST <service_url>
//! Content-Type: application/x-www-form-urlencoded
//!
//! api_key=<credential>&requests=<JSON array of events>
//! ```
//!
//! The endpoint is used as configured; no path is appended. TLS is used
//! iff the scheme is `https`.

use std::future::Future;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Serialize;

use crate::config::{CollectorConfig, SslVerifyMode};
use crate::error::{DeliveryError, Error, Result};

/// A fully encoded delivery, ready to be posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Target URL, unparsed
    pub endpoint: String,
    /// Form-encoded body
    pub body: String,
}

impl DeliveryRequest {
    /// Encode `events` for the configured endpoint and credential
    pub fn build<T: Serialize>(
        config: &CollectorConfig,
        events: &[T],
    ) -> std::result::Result<Self, DeliveryError> {
        Ok(Self {
            endpoint: config.endpoint().to_string(),
            body: form_body(config.credential(), events)?,
        })
    }
}

/// Build the `api_key=...&requests=...` form body
pub fn form_body<T: Serialize>(
    api_key: &str,
    events: &[T],
) -> std::result::Result<String, DeliveryError> {
    let requests = serde_json::to_string(events)?;
    Ok(format!(
        "api_key={}&requests={}",
        urlencoding::encode(api_key),
        urlencoding::encode(&requests)
    ))
}

/// Performs the network part of a delivery attempt
///
/// Returns the response status code. Any failure to obtain a response is a
/// [`DeliveryError`].
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: DeliveryRequest,
    ) -> impl Future<Output = std::result::Result<u16, DeliveryError>> + Send;
}

/// [`Transport`] over `reqwest`
///
/// Only a connect timeout is applied; a server that accepts the connection
/// and never answers holds the delivery open. Redirects are not followed,
/// so a 3xx is classified like any other unhandled status.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport honoring the configured timeout and TLS policy
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.ssl_verify_mode == SslVerifyMode::None)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: DeliveryRequest) -> std::result::Result<u16, DeliveryError> {
        let url = reqwest::Url::parse(&request.endpoint).map_err(|e| {
            DeliveryError::InvalidEndpoint {
                endpoint: request.endpoint.clone(),
                message: e.to_string(),
            }
        })?;

        let response = self
            .http_client
            .post(url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(request.body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(error_chain(&e)))?;

        Ok(response.status().as_u16())
    }
}

/// Render an error and its sources as `outer: inner: ...`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
