//! Stream descriptors produced by the channel list

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitrate variant of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Low,
    High,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Low => "low",
            Profile::High => "high",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which profiles a run measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSelection {
    #[default]
    Low,
    High,
    All,
}

impl ProfileSelection {
    pub fn includes(&self, profile: Profile) -> bool {
        match self {
            ProfileSelection::Low => profile == Profile::Low,
            ProfileSelection::High => profile == Profile::High,
            ProfileSelection::All => true,
        }
    }

    /// Concurrency used when none is configured
    ///
    /// High-bitrate streams cost more to decode, so fewer run at once.
    pub fn default_group_size(&self) -> usize {
        match self {
            ProfileSelection::Low => 10,
            ProfileSelection::High | ProfileSelection::All => 5,
        }
    }
}

/// One measurable stream
///
/// `endpoint_url` is sent to the collector as `mcast_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Channel name
    pub name: String,
    /// Headend node identifier
    pub node: String,
    pub profile: Profile,
    #[serde(rename = "mcast_url")]
    pub endpoint_url: String,
}

impl StreamDescriptor {
    pub fn new(
        name: impl Into<String>,
        node: impl Into<String>,
        profile: Profile,
        endpoint_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            profile,
            endpoint_url: endpoint_url.into(),
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) - {}", self.name, self.profile, self.endpoint_url)
    }
}
