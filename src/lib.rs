//! Stateful packet filter for overlay-network peer traffic.
//!
//! A [`Filter`] decides, per packet, whether to accept or drop IPv4/IPv6
//! datagrams flowing between the local host and its overlay peers. It is
//! consulted once per direction: [`Filter::run_in`] for inbound (peer →
//! local) and [`Filter::run_out`] for outbound (local → peer). Inbound
//! traffic must land inside a configured local prefix and either match a
//! rule or ride on connection-tracking state created by a locally
//! originated outbound UDP flow.
//!
//! This crate owns the decision engine only: rule matching, connection
//! tracking, pre-check sanity filtering, and rate-limited decision
//! logging. Packet parsing ([`packet`]) and address/prefix primitives
//! ([`netaddr`]) ship as thin stand-ins for the external collaborators a
//! real deployment would supply.

mod config;
mod conntrack;
mod decisionlog;
mod engine;
mod error;
mod filter;
mod flags;
mod netaddr;
mod packet;
mod precheck;
mod ruleset;
mod verdict;

pub use error::ConfigError;
pub use filter::Filter;
pub use flags::RunFlags;
pub use netaddr::{parse_prefix_v4, parse_prefix_v6, Ipv4Net, Ipv6Net};
pub use packet::{decode, IpProto, Parsed};
pub use ruleset::{compile, DestTermV4, DestTermV6, IpNetLiteral, MatchRule, PortRange};
pub use verdict::Verdict;
