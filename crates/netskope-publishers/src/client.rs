//! Asynchronous publisher and upgrade profile client.

use crate::models::{
    Publisher, PublisherRequest, RegistrationToken, UpgradeProfile, UpgradeProfileRequest,
};
use crate::Result;
use netskope_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use netskope_core::config::NetskopeClientConfig;
use netskope_core::envelope::{decode_envelope, decode_payload, Envelope, PayloadField};
use netskope_core::id::{PublisherId, UpgradeProfileExternalId, UpgradeProfileId};
use netskope_core::query::filter_query;
use netskope_core::types::NetskopeResource;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("netskope-publishers/", env!("CARGO_PKG_VERSION"));

/// Builder for [`PublishersClient`].
#[derive(Debug, Clone)]
pub struct PublishersClientBuilder {
    inner: ServiceClientBuilder,
}

impl PublishersClientBuilder {
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
    pub fn build(self) -> Result<PublishersClient> {
        let inner = self.inner.build()?;
        Ok(PublishersClient { inner })
    }
}

/// Asynchronous client for publishers and publisher upgrade profiles.
#[derive(Debug, Clone)]
pub struct PublishersClient {
    inner: ServiceClient,
}

impl PublishersClient {
    /// Construct a client from a tenant URL and API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the token is not a
    /// valid header value.
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        PublishersClientBuilder::new(base_url)?
            .with_token(token)
            .build()
    }

    /// Construct a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &NetskopeClientConfig) -> Result<Self> {
        PublishersClientBuilder::from_config(config)?.build()
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

    /// List all publishers. Returns the raw `data` payload; see
    /// [`crate::PublisherList::from_payload`] for a typed view.
    pub async fn list_publishers(&self) -> Result<Value> {
        self.fetch_payload(
            Method::GET,
            NetskopeResource::Publishers.collection_path(),
            &[],
            "list publishers",
        )
        .await
    }

    /// List publishers matching a server-side filter such as
    /// `publisher_name eq 'edge-1'`.
    pub async fn list_publishers_with_filter(&self, filter: &str) -> Result<Value> {
        self.fetch_payload(
            Method::GET,
            NetskopeResource::Publishers.collection_path(),
            &filter_query(filter),
            "list publishers with filter",
        )
        .await
    }

    /// Fetch a single publisher.
    pub async fn get_publisher(&self, id: PublisherId) -> Result<Publisher> {
        let path = NetskopeResource::Publishers.item_path(id);
        self.send_json::<(), _>(Method::GET, &path, None, "get publisher")
            .await
    }

    /// Create a publisher.
    pub async fn create_publisher(&self, request: &PublisherRequest) -> Result<Publisher> {
        self.send_json(
            Method::POST,
            NetskopeResource::Publishers.collection_path(),
            Some(request),
            "create publisher",
        )
        .await
    }

    /// Partially update a publisher (PATCH).
    pub async fn update_publisher(
        &self,
        id: PublisherId,
        request: &PublisherRequest,
    ) -> Result<Publisher> {
        let path = NetskopeResource::Publishers.item_path(id);
        self.send_json(Method::PATCH, &path, Some(request), "update publisher")
            .await
    }

    /// Replace a publisher (PUT).
    pub async fn replace_publisher(
        &self,
        id: PublisherId,
        request: &PublisherRequest,
    ) -> Result<Publisher> {
        let path = NetskopeResource::Publishers.item_path(id);
        self.send_json(Method::PUT, &path, Some(request), "replace publisher")
            .await
    }

    /// Delete a publisher and return the decoded envelope.
    pub async fn delete_publisher(&self, id: PublisherId) -> Result<Envelope> {
        let path = NetskopeResource::Publishers.item_path(id);
        debug!(publisher_id = %id, "Deleting publisher");
        self.send_envelope::<()>(Method::DELETE, &path, None, "delete publisher")
            .await
    }

    /// Issue a registration token used to enrol the publisher host.
    pub async fn create_registration_token(&self, id: PublisherId) -> Result<RegistrationToken> {
        let path = format!(
            "{}/registration_token",
            NetskopeResource::Publishers.item_path(id)
        );
        self.send_json::<(), _>(Method::POST, &path, None, "create registration token")
            .await
    }

    /// List all upgrade profiles. Returns the raw `data` payload; see
    /// [`crate::UpgradeProfileList::from_payload`] for a typed view.
    pub async fn list_upgrade_profiles(&self) -> Result<Value> {
        self.fetch_payload(
            Method::GET,
            NetskopeResource::UpgradeProfiles.collection_path(),
            &[],
            "list upgrade profiles",
        )
        .await
    }

    /// Fetch an upgrade profile by its external ID.
    pub async fn get_upgrade_profile(
        &self,
        external_id: UpgradeProfileExternalId,
    ) -> Result<UpgradeProfile> {
        let path = NetskopeResource::UpgradeProfiles.item_path(external_id);
        self.send_json::<(), _>(Method::GET, &path, None, "get upgrade profile")
            .await
    }

    /// Create an upgrade profile.
    pub async fn create_upgrade_profile(
        &self,
        request: &UpgradeProfileRequest,
    ) -> Result<UpgradeProfile> {
        self.send_json(
            Method::POST,
            NetskopeResource::UpgradeProfiles.collection_path(),
            Some(request),
            "create upgrade profile",
        )
        .await
    }

    /// Replace an upgrade profile (PUT). Addressed by profile ID, not
    /// external ID.
    pub async fn replace_upgrade_profile(
        &self,
        id: UpgradeProfileId,
        request: &UpgradeProfileRequest,
    ) -> Result<UpgradeProfile> {
        let path = NetskopeResource::UpgradeProfiles.item_path(id);
        self.send_json(Method::PUT, &path, Some(request), "replace upgrade profile")
            .await
    }

    /// Delete an upgrade profile by its external ID.
    pub async fn delete_upgrade_profile(
        &self,
        external_id: UpgradeProfileExternalId,
    ) -> Result<Envelope> {
        let path = NetskopeResource::UpgradeProfiles.item_path(external_id);
        debug!(external_id = %external_id, "Deleting upgrade profile");
        self.send_envelope::<()>(Method::DELETE, &path, None, "delete upgrade profile")
            .await
    }

    async fn send_envelope<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        operation: &str,
    ) -> Result<Envelope>
    where
        B: Serialize + ?Sized,
    {
        let raw = self.inner.execute_json(method, path, &[], body).await?;
        decode_envelope(&raw, operation)
    }

    async fn fetch_payload(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        operation: &str,
    ) -> Result<Value> {
        let raw = self.inner.execute(method, path, params, None).await?;
        let envelope = decode_envelope(&raw, operation)?;
        Ok(envelope.into_payload(PayloadField::Data))
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
        let envelope = self.send_envelope(method, path, body, operation).await?;
        decode_payload(envelope.into_payload(PayloadField::Data), operation)
    }
}
