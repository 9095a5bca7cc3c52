//! Private application models.

use chrono::{DateTime, Utc};
use netskope_core::envelope::decode_payload;
use netskope_core::id::PrivateAppId;
use netskope_core::lenient::{self, scalar_to_string, value_to_bool};
use netskope_core::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Transport and port(s) an application listens on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppProtocol {
    /// `tcp` or `udp`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub protocol_type: Option<String>,
    /// Port, list or range, e.g. `443`, `80,443` or `8000-8080`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub port: Option<String>,
}

impl AppProtocol {
    /// TCP on the given port(s).
    #[must_use]
    pub fn tcp(port: impl Into<String>) -> Self {
        Self {
            protocol_type: Some("tcp".to_string()),
            port: Some(port.into()),
        }
    }

    /// UDP on the given port(s).
    #[must_use]
    pub fn udp(port: impl Into<String>) -> Self {
        Self {
            protocol_type: Some("udp".to_string()),
            port: Some(port.into()),
        }
    }
}

/// Publisher serving an application. The ID is an opaque foreign key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublisherRef {
    /// Publisher ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub publisher_id: Option<String>,
    /// Publisher name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_name: Option<String>,
}

impl PublisherRef {
    /// Reference a publisher by ID and name.
    #[must_use]
    pub fn new(publisher_id: impl ToString, publisher_name: impl Into<String>) -> Self {
        Self {
            publisher_id: Some(publisher_id.to_string()),
            publisher_name: Some(publisher_name.into()),
        }
    }
}

/// Application tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppTag {
    /// Tag name.
    #[serde(default)]
    pub tag_name: String,
}

impl AppTag {
    /// Create a tag.
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
        }
    }
}

/// A private application as returned by get, create and update.
///
/// The ID is read from `id`, falling back to `app_id`; responses may carry
/// either key or both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "PrivateAppRecord")]
pub struct PrivateApp {
    /// Application ID.
    pub id: PrivateAppId,
    /// Application name.
    #[serde(default)]
    pub app_name: String,
    /// Host names or addresses, comma separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Listening protocols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<AppProtocol>,
    /// Publishers serving the application.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishers: Vec<PublisherRef>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<AppTag>,
    /// Resolve the host through the publisher's DNS.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub use_publisher_dns: Option<bool>,
    /// Browser access without the client.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub clientless_access: Option<bool>,
    /// Accept self-signed certificates from the application.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub trust_self_signed_certs: Option<bool>,
}

/// Wire shape of [`PrivateApp`] with both ID keys kept apart.
#[derive(Deserialize)]
struct PrivateAppRecord {
    #[serde(default)]
    id: Option<PrivateAppId>,
    #[serde(default)]
    app_id: Option<PrivateAppId>,
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    protocols: Vec<AppProtocol>,
    #[serde(default)]
    publishers: Vec<PublisherRef>,
    #[serde(default)]
    tags: Vec<AppTag>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    use_publisher_dns: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    clientless_access: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    trust_self_signed_certs: Option<bool>,
}

impl TryFrom<PrivateAppRecord> for PrivateApp {
    type Error = String;

    fn try_from(record: PrivateAppRecord) -> std::result::Result<Self, Self::Error> {
        let id = record
            .id
            .or(record.app_id)
            .ok_or_else(|| "missing field `id`".to_string())?;

        Ok(Self {
            id,
            app_name: record.app_name,
            host: record.host,
            protocols: record.protocols,
            publishers: record.publishers,
            tags: record.tags,
            use_publisher_dns: record.use_publisher_dns,
            clientless_access: record.clientless_access,
            trust_self_signed_certs: record.trust_self_signed_certs,
        })
    }
}

/// Request body for creating, updating or replacing a private application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivateAppRequest {
    /// Application name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Host names or addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Listening protocols.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<AppProtocol>>,
    /// Publishers serving the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishers: Option<Vec<PublisherRef>>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<AppTag>>,
    /// Resolve the host through the publisher's DNS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_publisher_dns: Option<bool>,
    /// Browser access without the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clientless_access: Option<bool>,
    /// Accept self-signed certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_self_signed_certs: Option<bool>,
}

/// Reachability of an application or of one publisher assignment.
///
/// The error fields change type between tenants, so every field is decoded
/// leniently and a non-object value decodes to the default.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Reachability {
    /// Whether the application was reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    /// Error code for the last failed probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    /// Error text for the last failed probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_string: Option<String>,
}

impl<'de> Deserialize<'de> for Reachability {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self {
            reachable: value.get("reachable").and_then(value_to_bool),
            error_code: value
                .get("error_code")
                .and_then(scalar_to_string)
                .and_then(|code| code.trim().parse().ok()),
            error_string: value
                .get("error_string")
                .and_then(scalar_to_string)
                .filter(|text| !text.is_empty()),
        })
    }
}

impl Reachability {
    /// True when a probe reported a failure.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.reachable == Some(false) || self.error_code.is_some_and(|code| code != 0)
    }
}

/// Service protocol entry in the list response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceProtocol {
    /// Protocol entry ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub id: Option<i64>,
    /// Owning service ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub service_id: Option<i64>,
    /// Port, list or range.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub port: Option<String>,
    /// `tcp` or `udp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Creation time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_datetime"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_datetime"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Publisher assignment in the list response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServicePublisherAssignment {
    /// Assigned publisher. An opaque foreign key, whatever its wire type.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub publisher_id: Option<String>,
    /// Whether this is the primary publisher.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub primary: Option<bool>,
    /// Owning service ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub service_id: Option<i64>,
    /// Reachability through this publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachability: Option<Reachability>,
}

/// A private application entry in the list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateAppSummary {
    /// Application ID.
    pub app_id: PrivateAppId,
    /// Application name.
    #[serde(default)]
    pub app_name: String,
    /// Host names or addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Browser access without the client.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub clientless_access: Option<bool>,
    /// Application protocol for clientless access, e.g. `https`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_app_protocol: Option<String>,
    /// Service protocols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<ServiceProtocol>,
    /// Overall reachability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachability: Option<Reachability>,
    /// Publisher assignments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_publisher_assignments: Vec<ServicePublisherAssignment>,
    /// Accept self-signed certificates.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub trust_self_signed_certs: Option<bool>,
    /// Resolve the host through the publisher's DNS.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub use_publisher_dns: Option<bool>,
}

impl PrivateAppSummary {
    /// ID of the publisher marked as primary, if any.
    #[must_use]
    pub fn primary_publisher(&self) -> Option<&str> {
        self.service_publisher_assignments
            .iter()
            .find(|assignment| assignment.primary == Some(true))
            .and_then(|assignment| assignment.publisher_id.as_deref())
    }
}

/// Typed view over the private application list payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivateAppList {
    /// Applications.
    #[serde(default)]
    pub private_apps: Vec<PrivateAppSummary>,
}

impl PrivateAppList {
    /// Decode the raw payload returned by
    /// [`crate::PrivateAppsClient::list_private_apps`].
    ///
    /// # Errors
    ///
    /// Returns a parse error if the payload does not have the list shape.
    pub fn from_payload(payload: Value) -> Result<Self> {
        decode_payload(payload, "list private apps")
    }

    /// Find an application by exact name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&PrivateAppSummary> {
        self.private_apps.iter().find(|app| app.app_name == name)
    }
}
