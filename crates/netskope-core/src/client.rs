//! Shared HTTP transport for the Netskope API v2.
//!
//! This module provides the HTTP transport shared by every resource client:
//! header injection, timeouts, the retry policy for transient failures, and
//! optional cancellation. It returns raw status and body; classifying the
//! response is the job of [`crate::envelope`].

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::NetskopeClientConfig;
use crate::envelope::encode_body;
use crate::types::API_V2_PREFIX;
use crate::{Error, Result};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Pooling

/// Seconds an idle pooled connection is kept
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Idle connections kept per tenant host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Retry settings

/// Retries after the first attempt when retry mode is on
pub const DEFAULT_MAX_RETRIES: u32 = 100;

/// Lower bound of the backoff wait, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Upper bound of the backoff wait, in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 20_000;

// Headers

/// Header carrying the API v2 token
pub const API_TOKEN_HEADER: &str = "netskope-api-token";

/// Content type sent with every request
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Default user agent
pub const DEFAULT_USER_AGENT: &str = concat!("netskope-rs/", env!("CARGO_PKG_VERSION"));

/// Backoff settings for transient failures.
///
/// The wait before retry `n` is `initial_delay * multiplier^(n-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Wait before the first retry
    pub initial_delay: Duration,

    /// Ceiling for any single wait
    pub max_delay: Duration,

    /// Growth factor between consecutive waits
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// 100 retries, waiting 5s doubling up to 20s.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
        }
    }

    /// Single attempt, never retried.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
        }
    }

    /// Override the retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Override the first wait.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Override the wait ceiling.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Override the growth factor.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Wait before retry `attempt` (1-based); zero for attempt 0.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(attempt - 1);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(initial_ms.saturating_mul(u64::from(multiplier)));

        std::cmp::min(delay, self.max_delay)
    }

    /// Clamp a server-suggested delay (`Retry-After`) into the policy bounds.
    #[must_use]
    pub fn clamp_delay(&self, suggested: Duration) -> Duration {
        std::cmp::min(std::cmp::max(suggested, self.initial_delay), self.max_delay)
    }

    /// True unless this is a single-attempt policy.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.max_retries > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport settings for a [`ServiceClient`].
///
/// Retries are disabled by default; enable them with
/// [`ClientConfig::with_retry_policy`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry_policy: RetryPolicy,

    /// How long idle pooled connections live
    pub pool_idle_timeout: Duration,

    /// Idle pooled connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable per-request logging
    pub enable_logging: bool,

    /// Accept gzip-encoded responses
    pub enable_compression: bool,
}

impl ClientConfig {
    /// One-minute timeout, no retries, gzip and logging on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_policy: RetryPolicy::no_retry(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable retry mode with `policy`.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Back to a single attempt per call.
    #[must_use]
    pub const fn without_retries(mut self) -> Self {
        self.retry_policy = RetryPolicy::no_retry();
        self
    }

    /// Override the pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Override the per-host idle connection cap.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Toggle the transport's `tracing` events (attempts, retries, backoff).
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Toggle gzip decoding.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Builder for [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ServiceClientBuilder {
    base_url: String,
    http_config: ClientConfig,
    user_agent: String,
    api_token: Option<SecretString>,
}

impl ServiceClientBuilder {
    /// Create a builder for the specified tenant URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref();
        Url::parse(base_url)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid base URL `{base_url}`: {err}")))?;

        Ok(Self {
            base_url: base_url.to_string(),
            http_config: ClientConfig::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_token: None,
        })
    }

    /// Create a builder pre-populated from a [`NetskopeClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL cannot be parsed.
    pub fn from_config(config: &NetskopeClientConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url)?
            .with_http_config(config.http_config())
            .with_secret_token(config.api_token.clone()))
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry;
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.timeout = timeout;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Configure the API token.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_secret_token(SecretString::from(token.into()))
    }

    /// Configure the API token from an existing secret.
    #[must_use]
    pub fn with_secret_token(mut self, token: SecretString) -> Self {
        self.api_token = Some(token);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if no token was configured, the token is not a valid
    /// header value, or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ServiceClient> {
        let token = self
            .api_token
            .ok_or_else(|| Error::ConfigError("API token is required".to_string()))?;

        let mut token_value = HeaderValue::from_str(token.expose_secret())
            .map_err(|err| Error::ConfigError(format!("Invalid API token header value: {err}")))?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(HeaderName::from_static(API_TOKEN_HEADER), token_value);

        let http = ClientBuilder::new()
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .timeout(self.http_config.timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .gzip(self.http_config.enable_compression)
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(ServiceClient {
            http,
            base_url: self.base_url,
            retry_policy: self.http_config.retry_policy,
            enable_logging: self.http_config.enable_logging,
            cancel: None,
        })
    }
}

/// Shared HTTP transport for the Netskope API.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: String,
    retry_policy: RetryPolicy,
    enable_logging: bool,
    cancel: Option<CancellationToken>,
}

impl ServiceClient {
    /// Return the tenant URL exactly as configured.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return the active retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Return a copy of this client whose calls abort once `token` is
    /// cancelled, including calls waiting in a retry backoff.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut client = self.clone();
        client.cancel = Some(token);
        client
    }

    /// Build `{base}/api/v2/{path}` with form-encoded query pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL is invalid.
    pub fn endpoint_url(&self, path: &str, params: &[(&'static str, String)]) -> Result<Url> {
        let raw = format!("{}/{API_V2_PREFIX}/{path}", self.base_url);
        let mut url = Url::parse(&raw)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))?;

        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
        }

        Ok(url)
    }

    /// Serialize `body` as JSON and execute the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] before any network call when the body
    /// cannot be encoded, otherwise as [`ServiceClient::execute`].
    pub async fn execute_json<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        let payload = body.map(encode_body).transpose()?;

        self.execute(method, path, params, payload).await
    }

    /// Execute a request, retrying transient failures according to the
    /// retry policy.
    ///
    /// Retryable: transport failures, HTTP 429 and HTTP 5xx other than 501.
    /// When retries run out on a retryable status, that last response is
    /// returned so the caller can decode the server's message.
    ///
    /// # Errors
    ///
    /// Returns a transport error ([`Error::is_transport`]) when the request
    /// could not be completed, or [`Error::Cancelled`] when the bound
    /// cancellation token fires.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse> {
        let url = self.endpoint_url(path, params)?;
        let mut attempt: u32 = 0;

        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(payload) = &body {
                request = request.body(payload.clone());
            }

            if self.enable_logging {
                debug!(method = %method, path = %path, attempt, "Sending Netskope request");
            }

            let suggested_delay = match self.cancellable(request.send()).await? {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= self.retry_policy.max_retries {
                        let bytes = self.cancellable(response.bytes()).await??;
                        return Ok(RawResponse {
                            status,
                            body: bytes.to_vec(),
                        });
                    }

                    if self.enable_logging {
                        warn!(method = %method, path = %path, attempt, status = %status, "Retryable Netskope response");
                    }
                    retry_after(&response)
                }
                Err(err) => {
                    let error = Error::from(err);
                    if !error.is_transport() || attempt >= self.retry_policy.max_retries {
                        return Err(error);
                    }

                    if self.enable_logging {
                        warn!(method = %method, path = %path, attempt, error = %error, "Netskope request failed");
                    }
                    None
                }
            };

            attempt += 1;
            let delay = suggested_delay.map_or_else(
                || self.retry_policy.delay_for_attempt(attempt),
                |suggested| self.retry_policy.clamp_delay(suggested),
            );

            if delay > Duration::from_millis(0) {
                if self.enable_logging {
                    debug!("Retrying Netskope request after {:?}", delay);
                }
                self.cancellable(sleep(delay)).await?;
            }
        }
    }

    async fn cancellable<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future,
    {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(Error::Cancelled),
                output = future => Ok(output),
            },
            None => Ok(future.await),
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

fn retry_after(response: &Response) -> Option<Duration> {
    let status = response.status();
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }

    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(200))
    }

    fn test_client(server: &MockServer, retry: RetryPolicy) -> ServiceClient {
        ServiceClientBuilder::new(server.uri())
            .unwrap()
            .with_token("test-token")
            .with_retry_policy(retry)
            .build()
            .unwrap()
    }

    #[test]
    fn test_retry_constants() {
        assert_eq!(DEFAULT_MAX_RETRIES, 100);
        assert_eq!(DEFAULT_RETRY_DELAY_MS, 5_000);
        assert_eq!(DEFAULT_RETRY_MAX_DELAY_MS, 20_000);
        assert_eq!(DEFAULT_TIMEOUT_SECS, 60);
    }

    #[test]
    fn test_retry_policy_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_retries, 0);
        assert!(!policy.has_retries());
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::new();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(20));
        // capped at max_delay
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(90), Duration::from_secs(20));
    }

    #[test]
    fn test_retry_policy_delay_never_below_initial() {
        let policy = fast_retry(10);
        for attempt in 1..=10 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= policy.initial_delay);
            assert!(delay <= policy.max_delay);
        }
    }

    #[test]
    fn test_retry_policy_clamp_delay() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.clamp_delay(Duration::from_secs(1)), Duration::from_secs(5));
        assert_eq!(policy.clamp_delay(Duration::from_secs(7)), Duration::from_secs(7));
        assert_eq!(policy.clamp_delay(Duration::from_secs(600)), Duration::from_secs(20));
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.retry_policy.has_retries());
        assert!(config.enable_logging);
        assert!(config.enable_compression);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_retry_policy(RetryPolicy::new())
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_logging(false)
            .with_compression(false);

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_logging);
        assert!(!config.enable_compression);
        assert!(!config.without_retries().retry_policy.has_retries());
    }

    #[test]
    fn test_builder_requires_token() {
        let result = ServiceClientBuilder::new("https://tenant.goskope.com")
            .unwrap()
            .build();
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let result = ServiceClientBuilder::new("tenant without scheme");
        assert!(matches!(result, Err(Error::InvalidEndpoint(_))));
    }

    #[test]
    fn test_builder_from_config() {
        let config = NetskopeClientConfig::new("https://tenant.goskope.com", "tok")
            .unwrap()
            .with_retry(crate::config::RetryConfig::new().enabled().with_retry_max(7));
        let client = ServiceClientBuilder::from_config(&config)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "https://tenant.goskope.com");
        assert_eq!(client.retry_policy().max_retries, 7);
    }

    #[test]
    fn test_endpoint_url_escapes_query() {
        let client = ServiceClientBuilder::new("https://tenant.goskope.com")
            .unwrap()
            .with_token("t")
            .build()
            .unwrap();
        let url = client
            .endpoint_url(
                "infrastructure/publishers",
                &[("query", "publisher_name eq 'a&b'".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.goskope.com/api/v2/infrastructure/publishers?query=publisher_name+eq+%27a%26b%27"
        );
    }

    #[tokio::test]
    async fn attaches_required_headers_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/infrastructure/publishers"))
            .and(header("netskope-api-token", "test-token"))
            .and(header("content-type", JSON_CONTENT_TYPE))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .and(body_json(json!({"name": "edge"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, RetryPolicy::no_retry());
        let response = client
            .execute_json(
                Method::POST,
                "infrastructure/publishers",
                &[],
                Some(&json!({"name": "edge"})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        for name in ["netskope-api-token", "content-type", "user-agent"] {
            assert_eq!(headers.get_all(name).iter().count(), 1, "header {name}");
        }
    }

    #[tokio::test]
    async fn sends_filter_as_query_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/steering/apps/private"))
            .and(query_param("query", "app_name eq web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, RetryPolicy::no_retry());
        client
            .execute(
                Method::GET,
                "steering/apps/private",
                &[("query", "app_name eq web".to_string())],
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/infrastructure/publishers"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/infrastructure/publishers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let client = test_client(&server, fast_retry(3));
        let started = Instant::now();
        let response = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    /// Accepts and immediately closes `drops` connections, then answers the
    /// next request with a JSON success envelope.
    async fn flaky_listener(drops: usize) -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for _ in 0..drops {
                let (socket, _) = listener.accept().await.unwrap();
                drop(socket);
            }

            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    return;
                }
                request.extend_from_slice(&chunk[..read]);
            }

            let body = r#"{"status":"success"}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            while socket.read(&mut chunk).await.map_or(false, |read| read > 0) {}
        });

        addr
    }

    #[tokio::test]
    async fn retries_dropped_connections_then_succeeds() {
        let addr = flaky_listener(2).await;
        let client = ServiceClientBuilder::new(format!("http://{addr}"))
            .unwrap()
            .with_token("test-token")
            .with_retry_policy(fast_retry(3))
            .build()
            .unwrap();

        let started = Instant::now();
        let response = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, br#"{"status":"success"}"#.to_vec());
        // 50ms before the first retry, 100ms before the second
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    struct CountingSubscriber(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl tracing::Subscriber for CountingSubscriber {
        fn enabled(&self, metadata: &tracing::Metadata<'_>) -> bool {
            metadata.target().starts_with("netskope_core")
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, _: &tracing::Event<'_>) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    async fn retry_events(enable_logging: bool) -> usize {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let client = ServiceClientBuilder::new(server.uri())
            .unwrap()
            .with_token("test-token")
            .with_http_config(
                ClientConfig::new()
                    .with_retry_policy(fast_retry(2))
                    .with_logging(enable_logging),
            )
            .build()
            .unwrap();

        let events = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let _guard = tracing::subscriber::set_default(CountingSubscriber(events.clone()));
        client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap();
        events.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[tokio::test]
    async fn disabled_logging_silences_retry_events() {
        assert!(retry_events(true).await > 0);
        assert_eq!(retry_events(false).await, 0);
    }

    #[tokio::test]
    async fn returns_last_response_when_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"message": "rate limited"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server, fast_retry(2));
        let response = client
            .execute(Method::GET, "steering/ipsec/pops", &[], None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "gone"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, fast_retry(5));
        let response = client
            .execute(Method::DELETE, "infrastructure/publishers/987", &[], None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn does_not_retry_not_implemented() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(501))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, fast_retry(5));
        let response = client
            .execute(Method::GET, "steering/ipsec/tunnels", &[], None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, RetryPolicy::no_retry());
        let response = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn honours_retry_after_within_bounds() {
        let server = MockServer::start().await;
        // Retry-After of an hour is clamped down to the 200ms maximum.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server, fast_retry(1));
        let started = Instant::now();
        let response = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error_after_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ServiceClientBuilder::new(format!("http://{addr}"))
            .unwrap()
            .with_token("t")
            .with_retry_policy(
                RetryPolicy::new()
                    .with_max_retries(2)
                    .with_initial_delay(Duration::from_millis(10))
                    .with_max_delay(Duration::from_millis(20)),
            )
            .build()
            .unwrap();

        let started = Instant::now();
        let err = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap_err();

        assert!(err.is_transport(), "unexpected error: {err:?}");
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn cancellation_aborts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let client = test_client(
            &server,
            RetryPolicy::new()
                .with_max_retries(10)
                .with_initial_delay(Duration::from_secs(30))
                .with_max_delay(Duration::from_secs(30)),
        )
        .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = Instant::now();
        let err = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, Error::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn already_cancelled_token_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let client = test_client(&server, RetryPolicy::no_retry()).with_cancellation(token);

        let err = client
            .execute(Method::GET, "infrastructure/publishers", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }
}
