//! Publisher and publisher upgrade profile client for the Netskope REST API v2.
//!
//! Publishers are the connectors that broker private application traffic.
//! Upgrade profiles control when those publishers update themselves.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{PublishersClient, PublishersClientBuilder};
pub use models::{
    Assessment, Publisher, PublisherList, PublisherRequest, PublisherSummary, RegistrationToken,
    UpgradeProfile, UpgradeProfileList, UpgradeProfileRequest,
};

/// Convenient result alias that reuses the shared Netskope error type.
pub type Result<T> = netskope_core::Result<T>;
