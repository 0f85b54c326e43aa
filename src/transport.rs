//! The HTTP transport boundary.
//!
//! The [`Client`](crate::Client) never talks to the network directly: each attempt is handed
//! to a [`Transport`] as a fully resolved [`TransportRequest`]. Any transport either returns
//! the received status, headers and body (whatever the status) or fails with a
//! [`TransportError`] when no response arrived. [`ReqwestTransport`] is the default.

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

use crate::error::BoxError;
use crate::{ConfigError, Error};

/// One physical request attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, query string included.
    pub url: Url,
    /// Every header to send, credential included.
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Abort the attempt after this long.
    pub timeout: Option<Duration>,
}

/// A received response, successful or not.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The attempt exceeded its timeout.
    Timeout,
    /// The connection could not be established (refused, DNS, TLS).
    Connect,
    /// Any other failure before a complete response arrived.
    Other,
}

impl TransportErrorKind {
    /// Short code carried by the resulting [`Error::Network`].
    pub fn code(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Other => "transport",
        }
    }
}

/// A transport-level failure: no response was received.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The attempt timed out.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// The connection could not be established.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Attaches the underlying error.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// What kind of failure this was.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<TransportError> for Error {
    /// Every transport failure is a network error; only timeouts are terminal.
    fn from(err: TransportError) -> Self {
        let kind = err.kind;
        Error::network(
            err.message.clone(),
            kind != TransportErrorKind::Timeout,
            Some(kind.code().to_string()),
        )
        .with_cause(err)
    }
}

/// Sends one physical request.
///
/// Implementations must return `Ok` for every received response, including non-2xx ones;
/// status classification belongs to the client.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use http::StatusCode;
/// use pmo_client::transport::{Transport, TransportError, TransportRequest, TransportResponse};
///
/// struct AlwaysDown;
///
/// #[async_trait]
/// impl Transport for AlwaysDown {
///     async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
///         Ok(TransportResponse::new(StatusCode::SERVICE_UNAVAILABLE, "maintenance"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the complete response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a freshly built `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
