//! Core Netskope domain types.
//!
//! This module enumerates the resource families exposed by the management API
//! together with the path each one lives under.

/// Path prefix shared by every management endpoint.
pub const API_V2_PREFIX: &str = "api/v2";

/// Supported Netskope resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetskopeResource {
    /// Network publishers
    Publishers,
    /// Publisher upgrade profiles
    UpgradeProfiles,
    /// Private applications
    PrivateApps,
    /// IPSec points of presence
    IpsecPops,
    /// IPSec tunnels
    IpsecTunnels,
}

impl NetskopeResource {
    /// Collection path relative to `{base}/api/v2/`.
    #[must_use]
    pub const fn collection_path(&self) -> &'static str {
        match self {
            Self::Publishers => "infrastructure/publishers",
            Self::UpgradeProfiles => "infrastructure/publisherupgradeprofiles",
            Self::PrivateApps => "steering/apps/private",
            Self::IpsecPops => "steering/ipsec/pops",
            Self::IpsecTunnels => "steering/ipsec/tunnels",
        }
    }

    /// Path of a single item in the collection.
    #[must_use]
    pub fn item_path(&self, id: impl std::fmt::Display) -> String {
        format!("{}/{id}", self.collection_path())
    }
}
