use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol::GROUP_SEPARATOR;

/// One service type from the catalog.
/// Field names follow the catalog document: `type`, `test_url`, `fallback`, `instances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique key, also the first path segment clients request, e.g. "search"
    #[serde(rename = "type")]
    pub service_type: String,

    /// Path appended to each instance base URL to form a probe target
    #[serde(rename = "test_url")]
    pub test_path: String,

    /// Informational only, never used for routing
    #[serde(rename = "fallback", default)]
    pub fallback_url: String,

    /// Ordered instance groups
    #[serde(rename = "instances")]
    pub instance_groups: Vec<InstanceGroup>,
}

/// Alternate endpoints for a single logical instance.
/// Written in the catalog as one string with members joined by `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceGroup {
    members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyGroupError(pub String);

impl fmt::Display for EmptyGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance group {:?} contains no URL", self.0)
    }
}

impl std::error::Error for EmptyGroupError {}

impl InstanceGroup {
    /// Split a catalog entry into its members, dropping blanks
    pub fn parse(raw: &str) -> Result<Self, EmptyGroupError> {
        let members: Vec<String> = raw
            .split(GROUP_SEPARATOR)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        if members.is_empty() {
            return Err(EmptyGroupError(raw.to_string()));
        }

        Ok(Self { members })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Canonical string form, used as the availability record identifier
    pub fn identifier(&self) -> String {
        self.members.join(GROUP_SEPARATOR.to_string().as_str())
    }
}

impl TryFrom<String> for InstanceGroup {
    type Error = EmptyGroupError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<InstanceGroup> for String {
    fn from(group: InstanceGroup) -> Self {
        group.identifier()
    }
}

impl fmt::Display for InstanceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Probe outcome for one instance group.
/// This is the canonical record shared by the prober, the state store and the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    /// Canonical form of the probed group
    pub identifier: String,

    /// Whether every member of the group answered
    pub available: bool,

    /// When the group was probed
    pub checked_at: DateTime<Utc>,
}

impl AvailabilityRecord {
    /// URL clients get redirected to: the group's first member
    pub fn base_url(&self) -> &str {
        self.identifier
            .split(GROUP_SEPARATOR)
            .next()
            .unwrap_or_default()
    }
}
