//! Family- and protocol-agnostic sanity filter run before per-family
//! dispatch. Pure function of the packet: no conntrack reads or writes,
//! so it is safe to run twice on the same packet (idempotent).

use crate::netaddr::{Ipv4AddrExt, Ipv6AddrExt};
use crate::packet::{IpProto, Parsed};

/// Tri-state result. `NoVerdict` hands off to the per-family inbound or
/// outbound engine; the other two are final and already logged by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCheckVerdict {
    Accept(&'static str),
    Drop(&'static str),
    NoVerdict,
}

/// Runs the ordered pre-check rules: length floor, multicast/link-local
/// suppression, unknown-protocol drop, then fragment pass-through.
pub fn run(p: &Parsed) -> PreCheckVerdict {
    if p.buf.is_empty() {
        return PreCheckVerdict::Accept("keepalive");
    }
    if p.buf.len() < crate::config::MIN_PACKET_LEN {
        return PreCheckVerdict::Drop("too short");
    }

    match p.version {
        4 => {
            if let Some(dst) = p.dst_v4 {
                if dst.is_multicast() {
                    return PreCheckVerdict::Drop("multicast");
                }
                if dst.is_most_link_local_unicast() {
                    return PreCheckVerdict::Drop("link-local-unicast");
                }
            }
        }
        6 => {
            if let Some(dst) = p.dst_v6 {
                if dst.is_multicast() {
                    return PreCheckVerdict::Drop("multicast");
                }
                if dst.is_link_local_unicast() {
                    return PreCheckVerdict::Drop("link-local-unicast");
                }
            }
        }
        _ => {}
    }

    if p.protocol == IpProto::Unknown {
        return PreCheckVerdict::Drop("unknown");
    }

    if p.is_fragment() {
        return PreCheckVerdict::Accept("fragment");
    }

    PreCheckVerdict::NoVerdict
}
