//! Asynchronous IPSec client.
//!
//! IPSec endpoints answer with an integer-status envelope whose payload sits
//! under `result`. Creates must report `201`; everything else `200`.

use crate::models::{IpsecPop, IpsecTunnel, IpsecTunnelRequest, PopListParams};
use crate::Result;
use netskope_core::client::{ClientConfig, RetryPolicy, ServiceClient, ServiceClientBuilder};
use netskope_core::config::NetskopeClientConfig;
use netskope_core::envelope::{
    decode_numeric_envelope, decode_payload, decode_single, ExpectedStatus, NumericEnvelope,
};
use netskope_core::id::{IpsecPopId, IpsecTunnelId};
use netskope_core::types::NetskopeResource;
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use validator::Validate;

const USER_AGENT: &str = concat!("netskope-ipsec/", env!("CARGO_PKG_VERSION"));

const POPS: NetskopeResource = NetskopeResource::IpsecPops;
const TUNNELS: NetskopeResource = NetskopeResource::IpsecTunnels;

/// Builder for [`IpsecClient`].
#[derive(Debug, Clone)]
pub struct IpsecClientBuilder {
    inner: ServiceClientBuilder,
}

impl IpsecClientBuilder {
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
    pub fn build(self) -> Result<IpsecClient> {
        let inner = self.inner.build()?;
        Ok(IpsecClient { inner })
    }
}

/// Asynchronous IPSec PoP and tunnel client.
#[derive(Debug, Clone)]
pub struct IpsecClient {
    inner: ServiceClient,
}

impl IpsecClient {
    /// Construct a client from a tenant URL and API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the token is not a
    /// valid header value.
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        IpsecClientBuilder::new(base_url)?.with_token(token).build()
    }

    /// Construct a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &NetskopeClientConfig) -> Result<Self> {
        IpsecClientBuilder::from_config(config)?.build()
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

    /// List all PoPs.
    pub async fn list_pops(&self) -> Result<Vec<IpsecPop>> {
        let envelope = self
            .send_numeric::<()>(
                Method::GET,
                POPS.collection_path(),
                &[],
                None,
                ExpectedStatus::Ok,
                "list ipsec pops",
            )
            .await?;
        decode_payload(envelope.into_result(), "list ipsec pops")
    }

    /// List PoPs matching the given filters.
    ///
    /// # Errors
    ///
    /// Returns [`netskope_core::Error::ValidationError`] without sending a
    /// request if more than one selector is set or `lat`/`long` is
    /// incomplete.
    pub async fn list_pops_with_params(&self, params: &PopListParams) -> Result<Vec<IpsecPop>> {
        params.validate()?;

        let envelope = self
            .send_numeric::<()>(
                Method::GET,
                POPS.collection_path(),
                &params.to_pairs(),
                None,
                ExpectedStatus::Ok,
                "list ipsec pops with params",
            )
            .await?;
        decode_payload(envelope.into_result(), "list ipsec pops with params")
    }

    /// Fetch a single PoP.
    pub async fn get_pop(&self, id: IpsecPopId) -> Result<IpsecPop> {
        let envelope = self
            .send_numeric::<()>(
                Method::GET,
                &POPS.item_path(id),
                &[],
                None,
                ExpectedStatus::Ok,
                "get ipsec pop",
            )
            .await?;
        decode_single(envelope.into_result(), "get ipsec pop")
    }

    /// List all tunnels.
    pub async fn list_tunnels(&self) -> Result<Vec<IpsecTunnel>> {
        let envelope = self
            .send_numeric::<()>(
                Method::GET,
                TUNNELS.collection_path(),
                &[],
                None,
                ExpectedStatus::Ok,
                "list ipsec tunnels",
            )
            .await?;
        decode_payload(envelope.into_result(), "list ipsec tunnels")
    }

    /// Fetch a single tunnel.
    pub async fn get_tunnel(&self, id: IpsecTunnelId) -> Result<IpsecTunnel> {
        let envelope = self
            .send_numeric::<()>(
                Method::GET,
                &TUNNELS.item_path(id),
                &[],
                None,
                ExpectedStatus::Ok,
                "get ipsec tunnel",
            )
            .await?;
        decode_single(envelope.into_result(), "get ipsec tunnel")
    }

    /// Create a tunnel. The server must answer with status `201`.
    pub async fn create_tunnel(&self, request: &IpsecTunnelRequest) -> Result<IpsecTunnel> {
        let envelope = self
            .send_numeric(
                Method::POST,
                TUNNELS.collection_path(),
                &[],
                Some(request),
                ExpectedStatus::Created,
                "create ipsec tunnel",
            )
            .await?;
        decode_single(envelope.into_result(), "create ipsec tunnel")
    }

    /// Partially update a tunnel (PATCH).
    pub async fn update_tunnel(
        &self,
        id: IpsecTunnelId,
        request: &IpsecTunnelRequest,
    ) -> Result<IpsecTunnel> {
        let envelope = self
            .send_numeric(
                Method::PATCH,
                &TUNNELS.item_path(id),
                &[],
                Some(request),
                ExpectedStatus::Ok,
                "update ipsec tunnel",
            )
            .await?;
        decode_single(envelope.into_result(), "update ipsec tunnel")
    }

    /// Delete a tunnel and return the decoded envelope.
    pub async fn delete_tunnel(&self, id: IpsecTunnelId) -> Result<NumericEnvelope> {
        debug!(tunnel_id = %id, "Deleting IPSec tunnel");
        self.send_numeric::<()>(
            Method::DELETE,
            &TUNNELS.item_path(id),
            &[],
            None,
            ExpectedStatus::Ok,
            "delete ipsec tunnel",
        )
        .await
    }

    async fn send_numeric<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&'static str, String)],
        body: Option<&B>,
        expected: ExpectedStatus,
        operation: &str,
    ) -> Result<NumericEnvelope>
    where
        B: Serialize + ?Sized,
    {
        let raw = self.inner.execute_json(method, path, params, body).await?;
        decode_numeric_envelope(&raw, expected, operation)
    }
}
