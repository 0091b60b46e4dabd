use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability reported by a backend's probe.
///
/// Hosts may return tiers this layer does not know about; those are kept
/// verbatim in [`AvailabilityTier::Other`] and treated as usable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AvailabilityTier {
    Unavailable,
    Downloadable,
    Downloading,
    Available,
    Other(String),
}

impl AvailabilityTier {
    pub fn parse(value: &str) -> Self {
        match value {
            "unavailable" => AvailabilityTier::Unavailable,
            "downloadable" => AvailabilityTier::Downloadable,
            "downloading" => AvailabilityTier::Downloading,
            "available" => AvailabilityTier::Available,
            other => AvailabilityTier::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AvailabilityTier::Unavailable => "unavailable",
            AvailabilityTier::Downloadable => "downloadable",
            AvailabilityTier::Downloading => "downloading",
            AvailabilityTier::Available => "available",
            AvailabilityTier::Other(s) => s,
        }
    }

    /// Only an explicit `unavailable` blocks instance creation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AvailabilityTier::Unavailable)
    }

    /// Creating an instance at this tier will trigger a model download.
    pub fn needs_download(&self) -> bool {
        matches!(
            self,
            AvailabilityTier::Downloadable | AvailabilityTier::Downloading
        )
    }
}

impl From<String> for AvailabilityTier {
    fn from(value: String) -> Self {
        AvailabilityTier::parse(&value)
    }
}

impl From<AvailabilityTier> for String {
    fn from(tier: AvailabilityTier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for AvailabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
