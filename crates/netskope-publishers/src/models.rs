//! Publisher and upgrade profile models.

use chrono::{DateTime, Utc};
use netskope_core::envelope::decode_payload;
use netskope_core::id::{PublisherId, UpgradeProfileExternalId, UpgradeProfileId};
use netskope_core::lenient::{self, parse_rfc3339, scalar_to_string, value_to_bool};
use netskope_core::Result;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Publisher health assessment.
///
/// The API is inconsistent about the types inside this object (for example
/// `eee_support` is a boolean on one endpoint and a string on another), so it
/// is kept as a raw map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Assessment(pub Map<String, Value>);

impl<'de> Deserialize<'de> for Assessment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Ok(Self::default()),
        }
    }
}

impl Assessment {
    fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar_to_string)
    }

    /// Energy-efficient Ethernet support.
    #[must_use]
    pub fn eee_support(&self) -> Option<bool> {
        self.0.get("eee_support").and_then(value_to_bool)
    }

    /// Free disk space as reported.
    #[must_use]
    pub fn hdd_free(&self) -> Option<String> {
        self.text("hdd_free")
    }

    /// Total disk space as reported.
    #[must_use]
    pub fn hdd_total(&self) -> Option<String> {
        self.text("hdd_total")
    }

    /// Publisher IP address.
    #[must_use]
    pub fn ip_address(&self) -> Option<String> {
        self.text("ip_address")
    }

    /// Latency to the Netskope cloud.
    #[must_use]
    pub fn latency(&self) -> Option<String> {
        self.text("latency")
    }

    /// Publisher software version.
    #[must_use]
    pub fn version(&self) -> Option<String> {
        self.text("version")
    }

    /// Raw access to any other field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// A single publisher as returned by get, create and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publisher {
    /// Publisher ID.
    pub id: PublisherId,
    /// Publisher name.
    #[serde(default)]
    pub name: String,
    /// Certificate common name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    /// Whether the publisher has been registered.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub registered: Option<bool>,
    /// Connection status, e.g. `connected`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Stitcher the publisher is attached to.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub stitcher_id: Option<i64>,
    /// Health assessment.
    #[serde(default)]
    pub assessment: Assessment,
}

/// Reason for the last failed upgrade.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeFailedReason {
    /// Failure detail.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub detail: Option<String>,
    /// Error code.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub error_code: Option<String>,
    /// Failure time.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub timestamp: Option<String>,
    /// Version being upgraded to.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
}

/// Current upgrade status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeStatus {
    /// Failure code, when the upgrade failed.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status_failure_code: Option<String>,
    /// Upgrade state.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub upstat: Option<String>,
}

/// A publisher entry in the list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherSummary {
    /// Publisher ID.
    pub publisher_id: PublisherId,
    /// Publisher name.
    #[serde(default)]
    pub publisher_name: String,
    /// Certificate common name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    /// Whether local broker connections are enabled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub lbrokerconnect: Option<bool>,
    /// Upgrade profile the publisher follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_upgrade_profiles_external_id: Option<UpgradeProfileExternalId>,
    /// Whether the publisher has been registered.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub registered: Option<bool>,
    /// Connection status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Stitcher ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub stitcher_id: Option<i64>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Value>,
    /// Health assessment.
    #[serde(default)]
    pub assessment: Assessment,
    /// Reason for the last failed upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_failed_reason: Option<UpgradeFailedReason>,
    /// Whether an upgrade has been requested.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub upgrade_request: Option<bool>,
    /// Current upgrade status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_status: Option<UpgradeStatus>,
}

/// Typed view over the publisher list payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublisherList {
    /// Publishers.
    #[serde(default)]
    pub publishers: Vec<PublisherSummary>,
}

impl PublisherList {
    /// Decode the raw payload returned by
    /// [`crate::PublishersClient::list_publishers`].
    ///
    /// # Errors
    ///
    /// Returns a parse error if the payload does not have the list shape.
    pub fn from_payload(payload: Value) -> Result<Self> {
        decode_payload(payload, "list publishers")
    }

    /// Find a publisher by exact name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&PublisherSummary> {
        self.publishers
            .iter()
            .find(|publisher| publisher.publisher_name == name)
    }
}

/// Request body for creating, updating or replacing a publisher.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublisherRequest {
    /// Publisher name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Enable local broker connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lbrokerconnect: Option<bool>,
}

impl PublisherRequest {
    /// Request carrying only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Registration token issued for a publisher.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationToken {
    /// One-time token used when enrolling the publisher host.
    #[serde(deserialize_with = "lenient::secret_string")]
    pub token: SecretString,
}

/// Publisher upgrade profile.
///
/// The list response adds `external_id` and `num_associated_publisher`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeProfile {
    /// Profile ID, used by replace.
    pub id: UpgradeProfileId,
    /// External ID, used by get and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<UpgradeProfileExternalId>,
    /// Profile name.
    #[serde(default)]
    pub name: String,
    /// Whether scheduled upgrades are enabled.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub enabled: Option<bool>,
    /// Publisher image tag to upgrade to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_tag: Option<String>,
    /// Cron-style schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// Release channel, e.g. `Latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,
    /// IANA timezone of the schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Creation time as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update time as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Next scheduled run, Unix seconds.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub next_update_time: Option<i64>,
    /// Upgrade stage indicator.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub upgrading_stage: Option<i64>,
    /// Whether the next run will start.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub will_start: Option<bool>,
    /// Number of publishers following this profile.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub num_associated_publisher: Option<i64>,
}

impl UpgradeProfile {
    /// Creation time, when it is an RFC 3339 timestamp.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_rfc3339)
    }

    /// Last update time, when it is an RFC 3339 timestamp.
    #[must_use]
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_rfc3339)
    }

    /// Next scheduled run.
    #[must_use]
    pub fn next_update_at(&self) -> Option<DateTime<Utc>> {
        self.next_update_time
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Typed view over the upgrade profile list payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeProfileList {
    /// Upgrade profiles.
    #[serde(default)]
    pub upgrade_profiles: Vec<UpgradeProfile>,
}

impl UpgradeProfileList {
    /// Decode the raw payload returned by
    /// [`crate::PublishersClient::list_upgrade_profiles`].
    ///
    /// # Errors
    ///
    /// Returns a parse error if the payload does not have the list shape.
    pub fn from_payload(payload: Value) -> Result<Self> {
        decode_payload(payload, "list upgrade profiles")
    }
}

/// Request body for creating or replacing an upgrade profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpgradeProfileRequest {
    /// Profile name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// IANA timezone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Release channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,
    /// Image tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_tag: Option<String>,
    /// Cron-style schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// Enable scheduled upgrades.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
