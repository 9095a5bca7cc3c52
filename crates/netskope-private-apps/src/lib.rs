//! Private application client for the Netskope REST API v2.
//!
//! Private applications are internally hosted services exposed through
//! zero-trust access and brokered by one or more publishers.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{PrivateAppsClient, PrivateAppsClientBuilder};
pub use models::{
    AppProtocol, AppTag, PrivateApp, PrivateAppList, PrivateAppRequest, PrivateAppSummary,
    PublisherRef, Reachability,
};

/// Convenient result alias that reuses the shared Netskope error type.
pub type Result<T> = netskope_core::Result<T>;
