//! Inbound (peer → local) decision engine: local-prefix gate, then a
//! protocol-specific branch, then rule match, then fall-through drop.

use crate::conntrack::{ConnKeyV4, ConnKeyV6, ConnTrackerV4, ConnTrackerV6};
use crate::netaddr::{self, Ipv4Net, Ipv6Net};
use crate::packet::{IpProto, Parsed};
use crate::ruleset::{RuleSetV4, RuleSetV6};
use crate::verdict::Verdict;

/// Evaluates an inbound IPv4 packet. `p` must have `dst_v4`/`src_v4` set
/// (i.e. `p.version == 4`); callers dispatch on `p.version` beforehand.
pub fn run_v4(
    p: &Parsed,
    local_prefixes: &[Ipv4Net],
    rules: &RuleSetV4,
    conntrack: &ConnTrackerV4,
) -> (Verdict, &'static str) {
    let Some(dst) = p.dst_v4 else {
        return (Verdict::Drop, "destination not allowed");
    };
    if !local_prefixes.iter().any(|net| netaddr::contains_v4(net, dst)) {
        return (Verdict::Drop, "destination not allowed");
    }

    match p.protocol {
        IpProto::Icmpv4 => {
            if p.is_echo_response() || p.is_error() {
                return (Verdict::Accept, "icmp response ok");
            }
            if rules.match_ips_only(p) {
                return (Verdict::Accept, "icmp ok");
            }
        }
        IpProto::Tcp => {
            if !p.is_tcp_syn() {
                return (Verdict::Accept, "tcp non-syn");
            }
            if rules.match_packet(p) {
                return (Verdict::Accept, "tcp ok");
            }
        }
        IpProto::Udp => {
            if let Some(src) = p.src_v4 {
                let key = ConnKeyV4::new(src, dst, p.src_port, p.dst_port);
                if conntrack.contains(&key) {
                    return (Verdict::Accept, "udp cached");
                }
            }
            if rules.match_packet(p) {
                return (Verdict::Accept, "udp ok");
            }
        }
        _ => return (Verdict::Drop, "Unknown proto"),
    }

    (Verdict::Drop, "no rules matched")
}

/// Evaluates an inbound IPv6 packet. Mirror of [`run_v4`] for the other
/// family.
pub fn run_v6(
    p: &Parsed,
    local_prefixes: &[Ipv6Net],
    rules: &RuleSetV6,
    conntrack: &ConnTrackerV6,
) -> (Verdict, &'static str) {
    let Some(dst) = p.dst_v6 else {
        return (Verdict::Drop, "destination not allowed");
    };
    if !local_prefixes.iter().any(|net| netaddr::contains_v6(net, dst)) {
        return (Verdict::Drop, "destination not allowed");
    }

    match p.protocol {
        IpProto::Icmpv6 => {
            if p.is_echo_response() || p.is_error() {
                return (Verdict::Accept, "icmp response ok");
            }
            if rules.match_ips_only(p) {
                return (Verdict::Accept, "icmp ok");
            }
        }
        IpProto::Tcp => {
            if !p.is_tcp_syn() {
                return (Verdict::Accept, "tcp non-syn");
            }
            if rules.match_packet(p) {
                return (Verdict::Accept, "tcp ok");
            }
        }
        IpProto::Udp => {
            if let Some(src) = p.src_v6 {
                let key = ConnKeyV6::new(src, dst, p.src_port, p.dst_port);
                if conntrack.contains(&key) {
                    return (Verdict::Accept, "udp cached");
                }
            }
            if rules.match_packet(p) {
                return (Verdict::Accept, "udp ok");
            }
        }
        _ => return (Verdict::Drop, "Unknown proto"),
    }

    (Verdict::Drop, "no rules matched")
}
