//! # netskope-core
//!
//! Core types and utilities for working with the Netskope REST API v2.
//!
//! This crate provides the shared transport, response envelope decoding, error
//! handling and configuration used by the resource-specific client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and their classification
//! - [`id`] - Strongly-typed identifiers for Netskope resources
//! - [`types`] - Resource families and their API paths
//! - [`config`] - Configuration structures for Netskope clients
//! - [`client`] - HTTP transport, retry policy and headers
//! - [`envelope`] - Decoding of the two response envelope shapes
//! - [`query`] - Query parameter helpers
//! - [`lenient`] - Tolerant deserializers for inconsistently typed fields

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod id;
pub mod lenient;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use client::{ClientConfig, RawResponse, RetryPolicy, ServiceClient, ServiceClientBuilder};
pub use config::{NetskopeClientConfig, RetryConfig};
pub use envelope::{Envelope, ExpectedStatus, NumericEnvelope, PayloadField};
pub use error::{Error, Result};
