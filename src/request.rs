//! Per-request options.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::ConfigError;

/// Options for an individual request: query parameters, header overrides and timeout.
///
/// Query parameters are kept sorted so that identical parameter sets always yield the same
/// [`RequestIdentity`](crate::RequestIdentity).
///
/// # Examples
///
/// ```
/// use pmo_client::RequestOptions;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), pmo_client::ConfigError> {
/// let options = RequestOptions::new()
///     .with_query_param("status", "open")
///     .with_query_param("page", "2")
///     .with_header("X-Request-Source", "raid-board")?
///     .with_timeout(Duration::from_secs(5));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters appended to the URL.
    pub query_params: BTreeMap<String, String>,

    /// Headers for this request. They override client defaults and the credential header.
    pub headers: HeaderMap,

    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, ConfigError> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Sets the timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub(crate) fn parse_header(
    name: &str,
    value: &str,
) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let name = HeaderName::try_from(name)
        .map_err(|e| ConfigError::InvalidHeader(format!("invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| ConfigError::InvalidHeader(format!("invalid header value: {}", e)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let options = RequestOptions::new()
            .with_query_param("page", "1")
            .with_query_params(vec![("limit".to_string(), "10".to_string())])
            .with_header("x-trace", "abc")
            .unwrap()
            .with_timeout(Duration::from_millis(250));

        assert_eq!(options.query_params.get("page").map(String::as_str), Some("1"));
        assert_eq!(options.query_params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(options.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        assert!(matches!(
            RequestOptions::new().with_header("bad header", "x"),
            Err(ConfigError::InvalidHeader(_))
        ));
        assert!(matches!(
            RequestOptions::new().with_header("x-ok", "line\nbreak"),
            Err(ConfigError::InvalidHeader(_))
        ));
    }
}
