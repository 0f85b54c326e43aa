//! Successful response wrapper.
//!
//! A [`Response`] carries the decoded (or schema-narrowed) payload together with what the
//! client observed while obtaining it: status, headers, raw body, total latency across all
//! attempts and the number of attempts made.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful response.
///
/// Retries are invisible apart from `attempts` and `latency`: a request that succeeded after
/// two 5xx answers looks exactly like one that succeeded immediately.
///
/// # Examples
///
/// ```no_run
/// use pmo_client::{Client, RequestOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Project {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://pmo.example.com/api")?
///     .build()?;
///
/// let response = client.get::<Project>("/projects/PRJ-7", RequestOptions::new()).await?;
///
/// println!("{} ({})", response.name, response.id);
/// if response.was_retried() {
///     println!("needed {} attempts, {:?} total", response.attempts, response.latency);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body.
    pub raw_body: String,

    /// The HTTP status code of the successful attempt.
    pub status: StatusCode,

    /// The headers of the successful attempt.
    pub headers: HeaderMap,

    /// Time from the first dispatch until the successful response, backoff included.
    pub latency: Duration,

    /// The number of dispatch attempts, `1` when no retry was needed.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data, keeping the metadata.
    ///
    /// ```
    /// # use pmo_client::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec!["PRJ-1", "PRJ-2"],
    ///     r#"["PRJ-1","PRJ-2"]"#.to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(40),
    ///     1,
    /// );
    ///
    /// let count = response.map(|ids| ids.len());
    /// assert_eq!(count.data, 2);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Discards the metadata.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Returns `true` if more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
