//! IPSec point of presence and tunnel models.

use chrono::{DateTime, Utc};
use netskope_core::id::{IpsecPopId, IpsecTunnelId};
use netskope_core::lenient::{self, parse_rfc3339};
use netskope_core::query::QueryParams;
use netskope_core::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// IKE phase 1 proposal offered by a PoP.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase1Options {
    /// Diffie-Hellman group.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub dhgroup: Option<String>,
    /// Dead peer detection.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub dpd: Option<bool>,
    /// Encryption algorithm.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub encryptionalgo: Option<String>,
    /// IKE version.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub ikeversion: Option<String>,
    /// Integrity algorithm.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub integrityalgo: Option<String>,
    /// SA lifetime.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub salifetime: Option<String>,
}

/// IPSec phase 2 proposal offered by a PoP.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase2Options {
    /// Diffie-Hellman group.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub dhgroup: Option<String>,
    /// Encryption algorithm.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub encryptionalgo: Option<String>,
    /// Integrity algorithm.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub integrityalgo: Option<String>,
    /// Perfect forward secrecy.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub pfs: Option<bool>,
    /// SA lifetime.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub salifetime: Option<String>,
}

/// Tunnel options supported by a PoP.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopOptions {
    /// Phase 1 proposal.
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub phase1: Option<Phase1Options>,
    /// Phase 2 proposal.
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub phase2: Option<Phase2Options>,
}

/// Netskope point of presence usable as an IPSec tunnel endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpsecPop {
    /// PoP ID.
    pub id: IpsecPopId,
    /// PoP name, e.g. `US-SJC1`.
    #[serde(default)]
    pub name: String,
    /// Whether this is the PoP closest to the caller.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub closestpop: Option<bool>,
    /// IKE gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Address probed for tunnel health.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probeip: Option<String>,
    /// Location description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Region code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Supported tunnel options.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_object"
    )]
    pub options: Option<PopOptions>,
}

impl IpsecPop {
    /// Dead peer detection setting from the phase 1 options.
    #[must_use]
    pub fn dpd(&self) -> Option<bool> {
        self.options.as_ref()?.phase1.as_ref()?.dpd
    }

    /// Perfect forward secrecy setting from the phase 2 options.
    #[must_use]
    pub fn pfs(&self) -> Option<bool> {
        self.options.as_ref()?.phase2.as_ref()?.pfs
    }
}

/// PoP a tunnel terminates on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelPop {
    /// PoP name.
    #[serde(default)]
    pub name: String,
    /// Gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Probe address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probeip: Option<String>,
    /// Whether this is the primary PoP.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub primary: Option<bool>,
}

/// Tunnel operational status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelStatus {
    /// Status, e.g. `up` or `down`.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    /// Time of the last status change.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub since: Option<String>,
    /// Current throughput.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub throughput: Option<String>,
}

impl TunnelStatus {
    /// Time of the last status change, when it is an RFC 3339 timestamp.
    #[must_use]
    pub fn since_utc(&self) -> Option<DateTime<Utc>> {
        self.since.as_deref().and_then(parse_rfc3339)
    }

    /// True when the tunnel reports `up`.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case("up"))
    }
}

/// IPSec tunnel.
///
/// Enumerated settings (`sourcetype`, `bandwidth`) are kept as plain values
/// so a server-side extension does not break decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpsecTunnel {
    /// Tunnel ID.
    pub id: IpsecTunnelId,
    /// Site name.
    #[serde(default)]
    pub site: String,
    /// Whether the tunnel is enabled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub enabled: Option<bool>,
    /// PoPs the tunnel terminates on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pops: Vec<TunnelPop>,
    /// Operational status.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_object"
    )]
    pub status: Option<TunnelStatus>,
    /// Configuration template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Traffic source type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcetype: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Encryption cipher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    /// IKE source identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcidentity: Option<String>,
    /// Source IP identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srcipidentity: Option<String>,
    /// Bandwidth in Mbps.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub bandwidth: Option<i64>,
}

impl IpsecTunnel {
    /// Primary PoP, if one is marked.
    #[must_use]
    pub fn primary_pop(&self) -> Option<&TunnelPop> {
        self.pops.iter().find(|pop| pop.primary == Some(true))
    }

    /// Source type parsed into the closed set, when recognised.
    #[must_use]
    pub fn source_type(&self) -> Option<SourceType> {
        self.sourcetype.as_deref()?.parse().ok()
    }

    /// Bandwidth parsed into the closed set, when recognised.
    #[must_use]
    pub fn bandwidth_tier(&self) -> Option<Bandwidth> {
        self.bandwidth
            .and_then(|mbps| u32::try_from(mbps).ok())
            .and_then(|mbps| Bandwidth::try_from(mbps).ok())
    }
}

/// Traffic source type of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// End-user traffic
    User,
    /// Server traffic
    Server,
    /// IoT devices
    #[serde(rename = "IoT")]
    Iot,
    /// Guest Wi-Fi
    #[serde(rename = "Guest wifi")]
    GuestWifi,
    /// Mixed sources
    Mixed,
}

impl SourceType {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Server => "Server",
            Self::Iot => "IoT",
            Self::GuestWifi => "Guest wifi",
            Self::Mixed => "Mixed",
        }
    }

    /// All source types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::User,
            Self::Server,
            Self::Iot,
            Self::GuestWifi,
            Self::Mixed,
        ]
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ValidationError(format!("Unknown source type: {s}")))
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunnel bandwidth tier in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bandwidth {
    /// 50 Mbps
    Mbps50,
    /// 100 Mbps
    Mbps100,
    /// 150 Mbps
    Mbps150,
    /// 250 Mbps
    Mbps250,
}

impl Bandwidth {
    /// Tier in Mbps.
    #[must_use]
    pub const fn mbps(self) -> u32 {
        match self {
            Self::Mbps50 => 50,
            Self::Mbps100 => 100,
            Self::Mbps150 => 150,
            Self::Mbps250 => 250,
        }
    }
}

impl TryFrom<u32> for Bandwidth {
    type Error = Error;

    fn try_from(mbps: u32) -> Result<Self, Self::Error> {
        match mbps {
            50 => Ok(Self::Mbps50),
            100 => Ok(Self::Mbps100),
            150 => Ok(Self::Mbps150),
            250 => Ok(Self::Mbps250),
            other => Err(Error::ValidationError(format!(
                "Unsupported bandwidth {other} Mbps (expected 50, 100, 150 or 250)"
            ))),
        }
    }
}

impl Serialize for Bandwidth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.mbps())
    }
}

impl<'de> Deserialize<'de> for Bandwidth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mbps = u32::deserialize(deserializer)?;
        Self::try_from(mbps).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Mbps", self.mbps())
    }
}

fn serialize_psk<S>(psk: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match psk {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Request body for creating or updating an IPSec tunnel.
///
/// The pre-shared key is held as a secret and redacted from `Debug`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IpsecTunnelRequest {
    /// Site name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Encryption cipher, e.g. `AES256-CBC`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    /// IKE source identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcidentity: Option<String>,
    /// Source IP identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcipidentity: Option<String>,
    /// Pre-shared key.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_psk")]
    pub psk: Option<SecretString>,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Traffic source type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcetype: Option<SourceType>,
    /// PoP names, primary first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pops: Option<Vec<String>>,
    /// Bandwidth tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<Bandwidth>,
    /// Enable or disable the tunnel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl IpsecTunnelRequest {
    /// Set the pre-shared key.
    #[must_use]
    pub fn with_psk(mut self, psk: impl Into<String>) -> Self {
        self.psk = Some(SecretString::from(psk.into()));
        self
    }
}

fn validate_pop_filters(params: &PopListParams) -> Result<(), ValidationError> {
    let selectors = [
        params.name.is_some(),
        params.region.is_some(),
        params.country.is_some(),
        params.lat.is_some() || params.long.is_some(),
        params.ip.is_some(),
        params.fields.is_some(),
    ];

    if selectors.iter().filter(|set| **set).count() > 1 {
        let mut error = ValidationError::new("exclusive_filters");
        error.message = Some(Cow::Borrowed(
            "name, region, country, lat/long, ip and fields are mutually exclusive",
        ));
        return Err(error);
    }

    if params.lat.is_some() != params.long.is_some() {
        let mut error = ValidationError::new("lat_long_pair");
        error.message = Some(Cow::Borrowed("lat and long must be given together"));
        return Err(error);
    }

    Ok(())
}

/// Query parameters for listing PoPs.
///
/// At most one of `name`, `region`, `country`, `lat`+`long`, `ip` and
/// `fields` may be set.
#[derive(Debug, Default, Clone, PartialEq, Validate)]
#[validate(schema(function = "validate_pop_filters"))]
pub struct PopListParams {
    /// Filter by PoP name.
    pub name: Option<String>,
    /// Filter by region.
    pub region: Option<String>,
    /// Filter by country.
    pub country: Option<String>,
    /// Latitude of the point to search near.
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    /// Longitude of the point to search near.
    #[validate(range(min = -180.0, max = 180.0))]
    pub long: Option<f64>,
    /// Find PoPs closest to this address.
    pub ip: Option<IpAddr>,
    /// Restrict the returned fields.
    pub fields: Option<String>,
    /// Offset.
    pub offset: Option<u32>,
    /// Limit.
    pub limit: Option<u32>,
}

impl PopListParams {
    /// Convert to URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_ref());
        params.push_opt("region", self.region.as_ref());
        params.push_opt("country", self.country.as_ref());
        params.push_opt("lat", self.lat);
        params.push_opt("long", self.long);
        params.push_opt("ip", self.ip);
        params.push_opt("fields", self.fields.as_ref());
        params.push_opt("offset", self.offset);
        params.push_opt("limit", self.limit);
        params.into_pairs()
    }
}
