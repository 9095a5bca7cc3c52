//! Asynchronous private application client.

use crate::models::{PrivateApp, PrivateAppRequest};
use crate::Result;
use netskope_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use netskope_core::config::NetskopeClientConfig;
use netskope_core::envelope::{decode_envelope, decode_payload, Envelope, PayloadField};
use netskope_core::id::PrivateAppId;
use netskope_core::query::filter_query;
use netskope_core::types::NetskopeResource;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("netskope-private-apps/", env!("CARGO_PKG_VERSION"));

const RESOURCE: NetskopeResource = NetskopeResource::PrivateApps;

/// Builder for [`PrivateAppsClient`].
#[derive(Debug, Clone)]
pub struct PrivateAppsClientBuilder {
    inner: ServiceClientBuilder,
}

impl PrivateAppsClientBuilder {
    /// Create a builder for the specified tenant URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let builder = ServiceClientBuilder::new(base_url)?.with_user_agent(USER_AGENT);
        Ok(Self { inner: builder })
    }

    /// Create a builder from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL cannot be parsed.
    pub fn from_config(config: &NetskopeClientConfig) -> Result<Self> {
        let builder = ServiceClientBuilder::from_config(config)?.with_user_agent(USER_AGENT);
        Ok(Self { inner: builder })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.inner = self.inner.with_retry_policy(retry);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Configure the `Netskope-Api-Token` header.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_token(token);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if no token was configured or the HTTP client cannot
    /// be constructed.
    pub fn build(self) -> Result<PrivateAppsClient> {
        let inner = self.inner.build()?;
        Ok(PrivateAppsClient { inner })
    }
}

/// Asynchronous private application client.
#[derive(Debug, Clone)]
pub struct PrivateAppsClient {
    inner: ServiceClient,
}

impl PrivateAppsClient {
    /// Construct a client from a tenant URL and API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the token is not a
    /// valid header value.
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        PrivateAppsClientBuilder::new(base_url)?
            .with_token(token)
            .build()
    }

    /// Construct a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &NetskopeClientConfig) -> Result<Self> {
        PrivateAppsClientBuilder::from_config(config)?.build()
    }

    /// Return the tenant URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    /// Return a client whose calls abort when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: self.inner.with_cancellation(token),
        }
    }

    /// List all private applications as the raw `data` payload.
    pub async fn list_private_apps(&self) -> Result<Value> {
        self.fetch_payload(&[], "list private apps").await
    }

    /// List private applications matching a server-side filter such as
    /// `app_name eq 'wiki'`.
    pub async fn list_private_apps_with_filter(&self, filter: &str) -> Result<Value> {
        self.fetch_payload(&filter_query(filter), "list private apps with filter")
            .await
    }

    /// Fetch a single private application.
    pub async fn get_private_app(&self, id: PrivateAppId) -> Result<PrivateApp> {
        self.send_json::<(), _>(Method::GET, &RESOURCE.item_path(id), None, "get private app")
            .await
    }

    /// Create a private application.
    pub async fn create_private_app(&self, request: &PrivateAppRequest) -> Result<PrivateApp> {
        self.send_json(
            Method::POST,
            RESOURCE.collection_path(),
            Some(request),
            "create private app",
        )
        .await
    }

    /// Partially update a private application (PATCH).
    pub async fn update_private_app(
        &self,
        id: PrivateAppId,
        request: &PrivateAppRequest,
    ) -> Result<PrivateApp> {
        self.send_json(
            Method::PATCH,
            &RESOURCE.item_path(id),
            Some(request),
            "update private app",
        )
        .await
    }

    /// Replace a private application (PUT).
    pub async fn replace_private_app(
        &self,
        id: PrivateAppId,
        request: &PrivateAppRequest,
    ) -> Result<PrivateApp> {
        self.send_json(
            Method::PUT,
            &RESOURCE.item_path(id),
            Some(request),
            "replace private app",
        )
        .await
    }

    /// Delete a private application and return the decoded envelope.
    pub async fn delete_private_app(&self, id: PrivateAppId) -> Result<Envelope> {
        debug!(app_id = %id, "Deleting private app");
        let raw = self
            .inner
            .execute(Method::DELETE, &RESOURCE.item_path(id), &[], None)
            .await?;
        decode_envelope(&raw, "delete private app")
    }

    async fn fetch_payload(
        &self,
        params: &[(&'static str, String)],
        operation: &str,
    ) -> Result<Value> {
        let raw = self
            .inner
            .execute(Method::GET, RESOURCE.collection_path(), params, None)
            .await?;
        Ok(decode_envelope(&raw, operation)?.into_payload(PayloadField::Data))
    }

    async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        operation: &str,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let raw = self.inner.execute_json(method, path, &[], body).await?;
        let envelope = decode_envelope(&raw, operation)?;
        decode_payload(envelope.into_payload(PayloadField::Data), operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppProtocol, AppTag, PrivateAppList, PublisherRef};
    use netskope_core::Error;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> PrivateAppsClient {
        PrivateAppsClient::new(server.uri(), "test-token").unwrap()
    }

    fn success(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"status": "success", "data": data}))
    }

    fn wiki_request() -> PrivateAppRequest {
        PrivateAppRequest {
            app_name: Some("wiki".into()),
            host: Some("wiki.corp.internal".into()),
            protocols: Some(vec![AppProtocol::tcp("443")]),
            publishers: Some(vec![PublisherRef::new(101, "edge-1")]),
            tags: Some(vec![AppTag::new("docs")]),
            use_publisher_dns: Some(true),
            ..PrivateAppRequest::default()
        }
    }

    #[tokio::test]
    async fn create_private_app_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/steering/apps/private"))
            .and(body_json(json!({
                "app_name": "wiki",
                "host": "wiki.corp.internal",
                "protocols": [{"type": "tcp", "port": "443"}],
                "publishers": [{"publisher_id": "101", "publisher_name": "edge-1"}],
                "tags": [{"tag_name": "docs"}],
                "use_publisher_dns": true
            })))
            .respond_with(success(json!({
                "id": 55,
                "app_name": "wiki",
                "host": "wiki.corp.internal",
                "protocols": [{"type": "tcp", "port": "443"}],
                "publishers": [{"publisher_id": "101", "publisher_name": "edge-1"}],
                "tags": [{"tag_name": "docs"}],
                "use_publisher_dns": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let request = wiki_request();
        let app = client.create_private_app(&request).await.unwrap();

        assert_eq!(app.id, PrivateAppId::new(55));
        assert_eq!(Some(app.app_name), request.app_name);
        assert_eq!(app.host, request.host);
        assert_eq!(Some(app.protocols), request.protocols);
        assert_eq!(Some(app.publishers), request.publishers);
        assert_eq!(Some(app.tags), request.tags);
        assert_eq!(app.use_publisher_dns, Some(true));
    }

    #[tokio::test]
    async fn list_with_filter_escapes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/steering/apps/private"))
            .and(query_param("query", "app_name eq 'wiki & docs'"))
            .respond_with(success(json!({
                "private_apps": [{"app_id": 55, "app_name": "wiki & docs"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let payload = client
            .list_private_apps_with_filter("app_name eq 'wiki & docs'")
            .await
            .unwrap();
        let list = PrivateAppList::from_payload(payload).unwrap();
        assert_eq!(list.private_apps[0].app_id, PrivateAppId::new(55));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some("query=app_name+eq+%27wiki+%26+docs%27")
        );
    }

    #[tokio::test]
    async fn list_without_filter_has_no_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/steering/apps/private"))
            .respond_with(success(json!({"private_apps": []})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.list_private_apps().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test]
    async fn get_private_app_twice_is_identical() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/steering/apps/private/55"))
            .respond_with(success(json!({"id": 55, "app_name": "wiki"})))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let first = client.get_private_app(PrivateAppId::new(55)).await.unwrap();
        let second = client.get_private_app(PrivateAppId::new(55)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn get_private_app_accepts_both_id_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/steering/apps/private/5"))
            .respond_with(success(json!({"id": 5, "app_id": 5, "app_name": "a"})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let app = client.get_private_app(PrivateAppId::new(5)).await.unwrap();
        assert_eq!(app.id, PrivateAppId::new(5));
        assert_eq!(app.app_name, "a");
    }

    #[tokio::test]
    async fn update_uses_patch_and_replace_uses_put() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/steering/apps/private/55"))
            .and(body_json(json!({"trust_self_signed_certs": true})))
            .respond_with(success(
                json!({"id": 55, "app_name": "wiki", "trust_self_signed_certs": true}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/steering/apps/private/55"))
            .respond_with(success(json!({"id": 55, "app_name": "wiki"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let patch = PrivateAppRequest {
            trust_self_signed_certs: Some(true),
            ..PrivateAppRequest::default()
        };
        let updated = client
            .update_private_app(PrivateAppId::new(55), &patch)
            .await
            .unwrap();
        assert_eq!(updated.trust_self_signed_certs, Some(true));

        client
            .replace_private_app(PrivateAppId::new(55), &wiki_request())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_already_deleted_app_is_business_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/steering/apps/private/987"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "private app not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .delete_private_app("987".parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.server_message(), Some("private app not found"));
        assert!(matches!(err, Error::Api(_)));
    }

    #[tokio::test]
    async fn cancelled_client_does_not_send() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(success(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let client = test_client(&server).with_cancellation(token);
        let err = client.list_private_apps().await.unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }
}
