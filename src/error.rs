//! Error types for API calls.
//!
//! Every request made through [`Client`](crate::Client) ends either in a value or in exactly
//! one [`Error`]. The enum is closed on purpose: a failure either never produced a response
//! ([`Error::Network`]), produced a non-2xx response ([`Error::Api`]), or produced a 2xx
//! response whose payload did not have the expected shape ([`Error::Validation`]).
//!
//! Misconfiguration detected while building or reconfiguring a client is reported separately
//! through [`ConfigError`] and never escapes a request.

use chrono::{DateTime, Utc};
use http::StatusCode;

use crate::validate::Violation;

/// A boxed underlying error, kept as the `source()` of an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Code attached to [`Error::Network`] when a request could not even be assembled.
pub const REQUEST_BUILD_CODE: &str = "request_build";

/// The terminal error of a logical request.
///
/// Every variant carries a human-readable `message`, the `timestamp` at which it was
/// constructed and an optional underlying `cause`, exposed through
/// [`std::error::Error::source`].
///
/// # Examples
///
/// ```no_run
/// use pmo_client::{Client, Error, RequestOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://pmo.example.com/api")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/projects", RequestOptions::new()).await {
///     Ok(response) => println!("Projects: {}", response.data),
///     Err(Error::Network { is_retryable, .. }) => {
///         eprintln!("Offline (transient: {})", is_retryable);
///     }
///     Err(Error::Api { status, detail, .. }) => {
///         eprintln!("Server answered {}: {:?}", status, detail);
///     }
///     Err(Error::Validation { details, .. }) => {
///         for violation in &details {
///             eprintln!("{}", violation);
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No response was received: connection failure, DNS failure or timeout.
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
        /// When the error was constructed.
        timestamp: DateTime<Utc>,
        /// Whether the failure is transient. Timeouts are not.
        is_retryable: bool,
        /// Short machine-readable failure code (`"timeout"`, `"connect"`, ...).
        code: Option<String>,
        /// The underlying transport error.
        #[source]
        cause: Option<BoxError>,
    },

    /// A response was received with a non-2xx status.
    #[error("API error {status}: {message}")]
    Api {
        /// Description of the failure, the server's `detail` when it sent one.
        message: String,
        /// When the error was constructed.
        timestamp: DateTime<Utc>,
        /// The HTTP status code.
        status: StatusCode,
        /// Server-supplied explanation extracted from the response body.
        detail: Option<String>,
        /// The raw response body.
        body: String,
        /// Optional underlying cause.
        #[source]
        cause: Option<BoxError>,
    },

    /// A 2xx response was received but the payload failed schema validation.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the failure.
        message: String,
        /// When the error was constructed.
        timestamp: DateTime<Utc>,
        /// Path of the first violated field, if any.
        field: Option<String>,
        /// Every violated sub-path.
        details: Vec<Violation>,
        /// Optional underlying cause, typically the `serde_json` error.
        #[source]
        cause: Option<BoxError>,
    },
}

impl Error {
    /// Creates a [`Error::Network`] stamped with the current time.
    pub fn network(message: impl Into<String>, is_retryable: bool, code: Option<String>) -> Self {
        Error::Network {
            message: message.into(),
            timestamp: Utc::now(),
            is_retryable,
            code,
            cause: None,
        }
    }

    /// Creates a [`Error::Api`] from a received status and raw body.
    ///
    /// The server-supplied explanation is the `detail` string of a JSON object body, otherwise
    /// the trimmed body text itself. An empty body carries no detail.
    ///
    /// ```
    /// use pmo_client::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::api(StatusCode::NOT_FOUND, r#"{"detail":"Project not found"}"#);
    /// match err {
    ///     Error::Api { status, detail, .. } => {
    ///         assert_eq!(status, StatusCode::NOT_FOUND);
    ///         assert_eq!(detail.as_deref(), Some("Project not found"));
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn api(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = extract_detail(&body);
        let message = detail
            .clone()
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
        Error::Api {
            message,
            timestamp: Utc::now(),
            status,
            detail,
            body,
            cause: None,
        }
    }

    /// Creates a [`Error::Validation`] listing every violated sub-path.
    pub fn validation(message: impl Into<String>, details: Vec<Violation>) -> Self {
        Error::Validation {
            message: message.into(),
            timestamp: Utc::now(),
            field: details.first().map(|v| v.path.clone()),
            details,
            cause: None,
        }
    }

    /// Attaches the underlying cause of this error.
    pub fn with_cause(mut self, err: impl Into<BoxError>) -> Self {
        match &mut self {
            Error::Network { cause, .. }
            | Error::Api { cause, .. }
            | Error::Validation { cause, .. } => *cause = Some(err.into()),
        }
        self
    }

    /// Returns `true` if no response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Returns `true` if the server answered with a non-2xx status.
    pub fn is_api(&self) -> bool {
        matches!(self, Error::Api { .. })
    }

    /// Returns `true` if a 2xx payload failed schema validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns `true` if another attempt may fix this failure.
    ///
    /// Network errors are eligible unless they were timeouts, API errors are eligible only
    /// for 5xx statuses, and validation errors never are.
    ///
    /// ```
    /// use pmo_client::Error;
    /// use http::StatusCode;
    ///
    /// assert!(Error::api(StatusCode::BAD_GATEWAY, "").is_retry_eligible());
    /// assert!(!Error::api(StatusCode::TOO_MANY_REQUESTS, "").is_retry_eligible());
    /// assert!(!Error::network("timed out", false, None).is_retry_eligible());
    /// ```
    pub fn is_retry_eligible(&self) -> bool {
        match self {
            Error::Network { is_retryable, .. } => *is_retryable,
            Error::Api { status, .. } => status.is_server_error(),
            Error::Validation { .. } => false,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Error::Network { message, .. }
            | Error::Api { message, .. }
            | Error::Validation { message, .. } => message,
        }
    }

    /// When the error was constructed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Error::Network { timestamp, .. }
            | Error::Api { timestamp, .. }
            | Error::Validation { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the HTTP status code for [`Error::Api`], `None` otherwise.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Network { .. } | Error::Validation { .. } => None,
        }
    }

    pub(crate) fn request_build(message: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Error::network(message, false, Some(REQUEST_BUILD_CODE.to_string())).with_cause(err)
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let detail = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| value.get("detail")?.as_str().map(str::to_owned));

    Some(detail.unwrap_or_else(|| trimmed.to_owned()))
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid client configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No base URL was provided.
    #[error("Base URL is required")]
    MissingBaseUrl,

    /// The base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL parsed but cannot have paths joined onto it (`mailto:`, `data:`...).
    #[error("URL cannot be used as a base: {0}")]
    UnsupportedBaseUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// An environment variable held an unusable value.
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnv {
        /// The variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
