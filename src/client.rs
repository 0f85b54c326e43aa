//! HTTP client with bounded retries and a closed error taxonomy.
//!
//! The [`Client`] type is the main entry point for making requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    ledger::{RequestIdentity, RetryLedger},
    request::{parse_header, RequestOptions},
    retry::RetryPolicy,
    transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse},
    validate::{self, Schema},
    ConfigError, Error, Response, Result,
};
use http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the base URL, read by [`ClientBuilder::from_env`].
pub const ENV_BASE_URL: &str = "PMO_API_BASE_URL";
/// Environment variable holding the bearer token.
pub const ENV_TOKEN: &str = "PMO_API_TOKEN";
/// Environment variable holding the timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "PMO_API_TIMEOUT_MS";
/// Environment variable holding the maximum number of retries.
pub const ENV_MAX_RETRIES: &str = "PMO_API_MAX_RETRIES";
/// Environment variable holding the base retry delay in milliseconds.
pub const ENV_RETRY_DELAY_MS: &str = "PMO_API_RETRY_DELAY_MS";

/// An HTTP client for the project-governance API.
///
/// Every logical request runs the same state machine: attach the credential, dispatch,
/// and on failure ask the [`RetryPolicy`] whether to sleep and resend. Retryable failures are
/// recovered silently up to the retry budget; anything else ends the request with exactly one
/// [`Error`].
///
/// The client is cheap to clone. Clones share configuration, transport and retry ledger.
///
/// # Examples
///
/// ```no_run
/// use pmo_client::{Client, RequestOptions, Response};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewRisk {
///     title: String,
///     score: u8,
/// }
///
/// #[derive(Deserialize)]
/// struct Risk {
///     id: String,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://pmo.example.com/api")?
///     .credential("my-token")
///     .build()?;
///
/// let risks: Response<Vec<Risk>> = client
///     .get("/projects/PRJ-7/risks", RequestOptions::new().with_query_param("status", "open"))
///     .await?;
/// println!("{} open risks", risks.len());
///
/// let new_risk = NewRisk { title: "Vendor delay".to_string(), score: 12 };
/// let created: Response<Risk> = client
///     .post("/projects/PRJ-7/risks", &new_risk, RequestOptions::new())
///     .await?;
/// println!("Created {}: {}", created.id, created.title);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: RwLock<Url>,
    credential: RwLock<Option<String>>,
    default_headers: HeaderMap,
    timeout: Duration,
    retry_policy: RetryPolicy,
    ledger: RetryLedger,
    isolate_retry_accounting: bool,
    call_sequence: AtomicU64,
}

/// Snapshot of a client's settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Address every request path is joined onto.
    pub base_url: Url,
    /// Default per-attempt timeout.
    pub timeout: Duration,
    /// Bearer token attached to every request.
    pub credential: Option<String>,
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config())
            .field("isolate_retry_accounting", &self.inner.isolate_retry_accounting)
            .field("pending_retries", &self.inner.ledger.len())
            .finish()
    }
}

/// A successful 2xx exchange, before its body is decoded.
struct Exchange {
    response: TransportResponse,
    latency: Duration,
    attempts: usize,
}

impl Exchange {
    fn into_response<T>(self, data: T) -> Response<T> {
        Response::new(
            data,
            self.response.body,
            self.response.status,
            self.response.headers,
            self.latency,
            self.attempts,
        )
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns a snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.inner.base_url.read().clone(),
            timeout: self.inner.timeout,
            credential: self.inner.credential.read().clone(),
            max_retries: self.inner.retry_policy.max_retries,
            retry_base_delay: self.inner.retry_policy.base_delay,
        }
    }

    /// Replaces the bearer token, or removes it with `None`.
    ///
    /// Attempts dispatched afterwards use the new value; attempts already dispatched are
    /// unaffected.
    pub fn set_credential(&self, token: Option<String>) {
        *self.inner.credential.write() = token;
        tracing::debug!("Credential updated");
    }

    /// Replaces the base URL for subsequently dispatched attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid; the current base URL is kept.
    pub fn set_base_url(&self, url: impl AsRef<str>) -> std::result::Result<(), ConfigError> {
        let url = parse_base_url(url.as_ref())?;
        tracing::debug!(base_url = %url, "Base URL updated");
        *self.inner.base_url.write() = url;
        Ok(())
    }

    /// The retry ledger shared by every clone of this client.
    pub fn retry_ledger(&self) -> &RetryLedger {
        &self.inner.ledger
    }

    /// Makes a request and deserializes the response body into `Res`.
    ///
    /// This is the method every verb helper delegates to. A 2xx body that does not
    /// deserialize into `Res` yields [`Error::Validation`]; an empty body is read as `null`,
    /// so `()` and `Option<_>` accept `204 No Content`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pmo_client::{Client, RequestOptions};
    /// use http::Method;
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct Transition { to: String }
    ///
    /// #[derive(Deserialize)]
    /// struct Workflow { state: String }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder()
    ///     .base_url("https://pmo.example.com/api")?
    ///     .build()?;
    ///
    /// let transition = Transition { to: "approved".to_string() };
    /// let workflow = client
    ///     .call::<_, Workflow>(
    ///         Method::POST,
    ///         "/workflows/WF-3/transitions",
    ///         Some(&transition),
    ///         RequestOptions::new(),
    ///     )
    ///     .await?;
    /// println!("Now {}", workflow.state);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
        options: RequestOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let exchange = self.execute(&method, path, body, &options).await?;

        match validate::decode_body::<Res>(&exchange.response.body) {
            Ok(data) => Ok(exchange.into_response(data)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    method = %method,
                    path = %path,
                    raw_response = %exchange.response.body,
                    "Failed to deserialize response"
                );
                Err(e)
            }
        }
    }

    /// Makes a request and narrows the response body with `schema`.
    ///
    /// Schema violations yield [`Error::Validation`] listing every offending field. They
    /// are never retried.
    pub async fn call_validated<Req, S>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Req>,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        Req: Serialize + ?Sized,
        S: Schema + ?Sized,
    {
        let exchange = self.execute(&method, path, body, &options).await?;

        let validated = validate::parse_body(&exchange.response.body)
            .and_then(|payload| validate::validate(&payload, schema));

        match validated {
            Ok(data) => Ok(exchange.into_response(data)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    method = %method,
                    path = %path,
                    raw_response = %exchange.response.body,
                    "Response failed schema validation"
                );
                Err(e)
            }
        }
    }

    /// Runs one logical request to a terminal outcome.
    ///
    /// The ledger entry for the request identity is cleared on success and on terminal
    /// failure, and incremented before every retry.
    async fn execute<Req>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Req>,
        options: &RequestOptions,
    ) -> Result<Exchange>
    where
        Req: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::request_build("Failed to serialize request body", e))?;

        let identity = self.identity_for(method, path, options);
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self
                .dispatch(method, path, body.as_ref(), options, &identity, attempt)
                .await
            {
                Ok(response) => {
                    let latency = start_time.elapsed();
                    let status = response.status;

                    tracing::info!(
                        status = status.as_u16(),
                        latency_ms = latency.as_millis(),
                        attempts = attempt,
                        "Received HTTP response"
                    );

                    if status.is_success() {
                        self.inner.ledger.clear(&identity);
                        return Ok(Exchange {
                            response,
                            latency,
                            attempts: attempt,
                        });
                    }

                    if status.is_client_error() {
                        tracing::error!(
                            status = status.as_u16(),
                            response = %response.body,
                            "Client error (4xx)"
                        );
                    } else if status.is_server_error() {
                        tracing::warn!(
                            status = status.as_u16(),
                            response = %response.body,
                            "Server error (5xx)"
                        );
                    }

                    Error::api(status, response.body)
                }
                Err(e) => e,
            };

            tracing::warn!(
                error = %failure,
                attempt = attempt,
                method = %method,
                path = %path,
                "Request failed"
            );

            let retries_spent = self.inner.ledger.get(&identity).unwrap_or(0);
            let decision = self.inner.retry_policy.decide(&failure, retries_spent);

            if !decision.retry {
                self.inner.ledger.clear(&identity);
                return Err(failure);
            }

            self.inner.ledger.increment(&identity);

            tracing::info!(
                delay_ms = decision.delay.as_millis(),
                attempt = attempt,
                "Retrying request after delay"
            );

            tokio::time::sleep(decision.delay).await;
        }
    }

    /// Sends a single attempt. Non-2xx responses are `Ok` here.
    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
        identity: &RequestIdentity,
        attempt: usize,
    ) -> Result<TransportResponse> {
        let request = self.build_request(method, path, body, options)?;

        tracing::debug!(
            method = %method,
            url = %request.url,
            attempt = attempt,
            identity = %identity,
            "Executing HTTP request"
        );

        Ok(self.inner.transport.send(request).await?)
    }

    /// Assembles an attempt from the latest base URL and credential.
    fn build_request(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<TransportRequest> {
        let mut url = resolve_url(&self.inner.base_url.read(), path);
        for (key, value) in &options.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        let mut headers = self.inner.default_headers.clone();

        if let Some(token) = self.inner.credential.read().as_deref() {
            let mut value = HeaderValue::try_from(bearer_authorization(token))
                .map_err(|e| Error::request_build("Credential is not a valid header value", e))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        // Per-request headers replace defaults and the credential.
        headers.extend(options.headers.clone());

        Ok(TransportRequest {
            method: method.clone(),
            url,
            headers,
            body: body.cloned(),
            timeout: Some(options.timeout.unwrap_or(self.inner.timeout)),
        })
    }

    fn identity_for(
        &self,
        method: &Method,
        path: &str,
        options: &RequestOptions,
    ) -> RequestIdentity {
        let identity = RequestIdentity::new(method, path, &options.query_params);
        if self.inner.isolate_retry_accounting {
            identity.with_sequence(self.inner.call_sequence.fetch_add(1, Ordering::Relaxed))
        } else {
            identity
        }
    }

    /// Makes a GET request and deserializes the response body.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pmo_client::{Client, RequestOptions};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Project { name: String }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder()
    ///     .base_url("https://pmo.example.com/api")?
    ///     .build()?;
    ///
    /// let project: pmo_client::Response<Project> =
    ///     client.get("/projects/PRJ-7", RequestOptions::new()).await?;
    /// println!("Project: {}", project.data.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: &str, options: RequestOptions) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call::<(), Res>(Method::GET, path, None, options).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<Req, Res>(
        &self,
        path: &str,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::POST, path, Some(body), options).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<Req, Res>(
        &self,
        path: &str,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::PUT, path, Some(body), options).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: &str,
        body: &Req,
        options: RequestOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call(Method::PATCH, path, Some(body), options).await
    }

    /// Makes a DELETE request.
    pub async fn delete<Res>(&self, path: &str, options: RequestOptions) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call::<(), Res>(Method::DELETE, path, None, options).await
    }

    /// Makes a GET request and validates the response body against `schema`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pmo_client::{Client, RequestOptions};
    /// use pmo_client::validate::{FieldKind, ObjectSchema};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder()
    ///     .base_url("https://pmo.example.com/api")?
    ///     .build()?;
    ///
    /// let schema = FieldKind::array_of(
    ///     ObjectSchema::new()
    ///         .field("id", FieldKind::String)
    ///         .field("budget", FieldKind::Number),
    /// );
    ///
    /// let projects = client
    ///     .get_validated("/projects", &schema, RequestOptions::new())
    ///     .await?;
    /// println!("{}", projects.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_validated<S>(
        &self,
        path: &str,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        S: Schema + ?Sized,
    {
        self.call_validated::<(), S>(Method::GET, path, None, schema, options)
            .await
    }

    /// Makes a POST request and validates the response body against `schema`.
    pub async fn post_validated<Req, S>(
        &self,
        path: &str,
        body: &Req,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        Req: Serialize + ?Sized,
        S: Schema + ?Sized,
    {
        self.call_validated(Method::POST, path, Some(body), schema, options)
            .await
    }

    /// Makes a PUT request and validates the response body against `schema`.
    pub async fn put_validated<Req, S>(
        &self,
        path: &str,
        body: &Req,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        Req: Serialize + ?Sized,
        S: Schema + ?Sized,
    {
        self.call_validated(Method::PUT, path, Some(body), schema, options)
            .await
    }

    /// Makes a PATCH request and validates the response body against `schema`.
    pub async fn patch_validated<Req, S>(
        &self,
        path: &str,
        body: &Req,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        Req: Serialize + ?Sized,
        S: Schema + ?Sized,
    {
        self.call_validated(Method::PATCH, path, Some(body), schema, options)
            .await
    }

    /// Makes a DELETE request and validates the response body against `schema`.
    pub async fn delete_validated<S>(
        &self,
        path: &str,
        schema: &S,
        options: RequestOptions,
    ) -> Result<Response<S::Output>>
    where
        S: Schema + ?Sized,
    {
        self.call_validated::<(), S>(Method::DELETE, path, None, schema, options)
            .await
    }
}

/// Joins `path` onto the base URL, keeping the base path as a prefix.
///
/// A query on the base URL is kept and any inline `?query` of `path` is appended to it.
/// Absolute `http(s)` URLs are used as-is.
fn resolve_url(base: &Url, path: &str) -> Url {
    if let Ok(absolute) = Url::parse(path) {
        if matches!(absolute.scheme(), "http" | "https") {
            return absolute;
        }
    }

    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);

    let base_query = base.query().filter(|q| !q.is_empty());
    let query = query.filter(|q| !q.is_empty());
    let merged = match (base_query, query) {
        (Some(base_query), Some(query)) => Some(format!("{}&{}", base_query, query)),
        (base_query, query) => query.or(base_query).map(str::to_owned),
    };
    url.set_query(merged.as_deref());
    url.set_fragment(None);
    url
}

fn bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

fn parse_base_url(raw: &str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::UnsupportedBaseUrl(raw.to_string()));
    }
    Ok(url)
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use pmo_client::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), pmo_client::ConfigError> {
/// let client = ClientBuilder::new()
///     .base_url("https://pmo.example.com/api")?
///     .timeout(Duration::from_secs(10))
///     .max_retries(5)
///     .retry_base_delay(Duration::from_millis(250))
///     .default_header("User-Agent", "governance-dashboard/2.1")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    credential: Option<String>,
    timeout: Duration,
    retry_policy: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
    isolate_retry_accounting: bool,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    ///
    /// Defaults: 30 s timeout, 3 retries, 1 s base retry delay, no credential.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            credential: None,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            transport: None,
            isolate_retry_accounting: false,
        }
    }

    /// Creates a builder from `PMO_API_*` environment variables.
    ///
    /// Reads [`ENV_BASE_URL`] (required), [`ENV_TOKEN`], [`ENV_TIMEOUT_MS`],
    /// [`ENV_MAX_RETRIES`] and [`ENV_RETRY_DELAY_MS`]. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or any value cannot be parsed.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = read(ENV_BASE_URL).ok_or(ConfigError::MissingBaseUrl)?;
        let mut builder = Self::new().base_url(base_url)?;

        if let Some(token) = read(ENV_TOKEN) {
            builder = builder.credential(token);
        }
        if let Some(value) = read(ENV_TIMEOUT_MS) {
            builder = builder.timeout(Duration::from_millis(parse_env(ENV_TIMEOUT_MS, &value)?));
        }
        if let Some(value) = read(ENV_MAX_RETRIES) {
            builder = builder.max_retries(parse_env(ENV_MAX_RETRIES, &value)?);
        }
        if let Some(value) = read(ENV_RETRY_DELAY_MS) {
            builder = builder
                .retry_base_delay(Duration::from_millis(parse_env(ENV_RETRY_DELAY_MS, &value)?));
        }

        Ok(builder)
    }

    /// Sets the base URL every request path is joined onto.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> std::result::Result<Self, ConfigError> {
        self.base_url = Some(parse_base_url(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> std::result::Result<Self, ConfigError> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the bearer token sent as `Authorization` with every request.
    pub fn credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    /// Sets the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of retries after the initial attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry_policy.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_policy.base_delay = delay;
        self
    }

    /// Replaces the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Uses a custom transport instead of [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Gives every call its own retry accounting.
    ///
    /// By default concurrent requests with identical method, path and query parameters share
    /// one ledger entry, so one request's failures count against the other's retry budget.
    pub fn isolate_retry_accounting(mut self, isolate: bool) -> Self {
        self.isolate_retry_accounting = isolate;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default transport cannot be
    /// created.
    pub fn build(self) -> std::result::Result<Client, ConfigError> {
        let base_url = self.base_url.ok_or(ConfigError::MissingBaseUrl)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url: RwLock::new(base_url),
                credential: RwLock::new(self.credential),
                default_headers: self.default_headers,
                timeout: self.timeout,
                retry_policy: self.retry_policy,
                ledger: RetryLedger::new(),
                isolate_retry_accounting: self.isolate_retry_accounting,
                call_sequence: AtomicU64::new(0),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T>(name: &'static str, value: &str) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name,
        reason: format!("{:?}: {}", value, e),
    })
}
