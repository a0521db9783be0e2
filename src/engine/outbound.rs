//! Outbound (local → peer) decision engine.
//!
//! The overlay network's own routing has already decided this packet
//! belongs on the wire; the filter's only remaining job is to let UDP
//! flows open a return path for the inbound engine to recognize. Every
//! outbound packet is accepted.

use crate::conntrack::{ConnKeyV4, ConnKeyV6, ConnTrackerV4, ConnTrackerV6};
use crate::packet::{IpProto, Parsed};
use crate::verdict::Verdict;

/// Evaluates an outbound IPv4 packet, recording a reversed conntrack
/// tuple for UDP so the matching inbound reply is recognized without a
/// rule. Always accepts.
pub fn run_v4(p: &Parsed, conntrack: &ConnTrackerV4) -> (Verdict, &'static str) {
    if p.protocol == IpProto::Udp {
        if let (Some(src), Some(dst)) = (p.src_v4, p.dst_v4) {
            let key = ConnKeyV4::new(src, dst, p.src_port, p.dst_port);
            conntrack.record(key.reversed());
        }
    }
    (Verdict::Accept, "ok out")
}

/// Evaluates an outbound IPv6 packet. Mirror of [`run_v4`].
pub fn run_v6(p: &Parsed, conntrack: &ConnTrackerV6) -> (Verdict, &'static str) {
    if p.protocol == IpProto::Udp {
        if let (Some(src), Some(dst)) = (p.src_v6, p.dst_v6) {
            let key = ConnKeyV6::new(src, dst, p.src_port, p.dst_port);
            conntrack.record(key.reversed());
        }
    }
    (Verdict::Accept, "ok out")
}
