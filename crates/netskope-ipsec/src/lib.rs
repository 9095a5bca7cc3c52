//! IPSec client for the Netskope REST API v2.
//!
//! Covers points of presence (PoPs) usable as tunnel endpoints and the
//! tunnels themselves. These endpoints use the integer-status envelope.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{IpsecClient, IpsecClientBuilder};
pub use models::{
    Bandwidth, IpsecPop, IpsecTunnel, IpsecTunnelRequest, Phase1Options, Phase2Options,
    PopListParams, PopOptions, SourceType, TunnelPop, TunnelStatus,
};

/// Convenient result alias that reuses the shared Netskope error type.
pub type Result<T> = netskope_core::Result<T>;
