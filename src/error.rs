//! Error type for the one fallible surface in this crate: building a
//! [`RuleSet`](crate::ruleset::RuleSet) or local-prefix list from
//! user-facing strings. The packet-decision path itself never fails — see
//! the crate-level docs.

/// Error constructing filter configuration from user-facing values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A prefix string did not parse as a valid IPv4/IPv6 CIDR.
    #[error("invalid prefix {0:?}: {1}")]
    InvalidPrefix(String, String),

    /// A port range had `first > last`, or either endpoint was out of range.
    #[error("invalid port range {0}-{1}")]
    InvalidPortRange(u32, u32),
}

impl ConfigError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::InvalidPrefix(..) => "InvalidPrefix",
            ConfigError::InvalidPortRange(..) => "InvalidPortRange",
        }
    }
}
