//! Minimal packet decoder.
//!
//! Real deployments sit this filter behind a dedicated decoder owned by
//! the surrounding transport; this module is the concrete stand-in needed
//! for the crate to compile and for its properties to be testable
//! standalone. Byte
//! parsing follows the manual version/IHL/total-length extraction already
//! used elsewhere for raw IP headers, generalized here to the additional
//! fields pre-check and the engines need: ICMP type/code, TCP flags, and
//! the IPv6 fragment extension header.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Classified IP protocol, including the pseudo-protocols the filter
/// treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProto {
    Tcp,
    Udp,
    Icmpv4,
    Icmpv6,
    Igmp,
    /// A non-initial fragment: no transport header is present.
    Fragment,
    /// Anything the decoder could not classify, including fragments too
    /// small to carry a transport header.
    Unknown,
}

const PROTO_ICMPV4: u8 = 1;
const PROTO_IGMP: u8 = 2;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const PROTO_ICMPV6: u8 = 58;
const PROTO_V6_FRAGMENT: u8 = 44;

const ICMPV4_ECHO_REPLY: u8 = 0;
const ICMPV4_DEST_UNREACHABLE: u8 = 3;
const ICMPV4_SOURCE_QUENCH: u8 = 4;
const ICMPV4_REDIRECT: u8 = 5;
const ICMPV4_ECHO_REQUEST: u8 = 8;
const ICMPV4_TIME_EXCEEDED: u8 = 11;
const ICMPV4_PARAM_PROBLEM: u8 = 12;

const ICMPV6_DEST_UNREACHABLE: u8 = 1;
const ICMPV6_PACKET_TOO_BIG: u8 = 2;
const ICMPV6_TIME_EXCEEDED: u8 = 3;
const ICMPV6_PARAM_PROBLEM: u8 = 4;
const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;

const TCP_FLAG_SYN: u8 = 0x02;

/// A decoded view over a raw packet buffer.
///
/// Only the family-appropriate address fields are meaningful: `src_v4`/
/// `dst_v4` for `version == 4`, `src_v6`/`dst_v6` for `version == 6`.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub buf: Vec<u8>,
    pub version: u8,
    pub protocol: IpProto,
    pub src_v4: Option<Ipv4Addr>,
    pub dst_v4: Option<Ipv4Addr>,
    pub src_v6: Option<Ipv6Addr>,
    pub dst_v6: Option<Ipv6Addr>,
    pub src_port: u16,
    pub dst_port: u16,
    tcp_flags: u8,
    icmp_type: u8,
    fragment_offset: u16,
}

impl Parsed {
    pub fn is_tcp_syn(&self) -> bool {
        self.protocol == IpProto::Tcp && (self.tcp_flags & TCP_FLAG_SYN) != 0
    }

    /// True for an ICMP echo-response (v4 echo-reply or v6 echo-reply).
    pub fn is_echo_response(&self) -> bool {
        match self.protocol {
            IpProto::Icmpv4 => self.icmp_type == ICMPV4_ECHO_REPLY,
            IpProto::Icmpv6 => self.icmp_type == ICMPV6_ECHO_REPLY,
            _ => false,
        }
    }

    /// True for an ICMP error message (not echo-request/response).
    pub fn is_error(&self) -> bool {
        match self.protocol {
            IpProto::Icmpv4 => matches!(
                self.icmp_type,
                ICMPV4_DEST_UNREACHABLE
                    | ICMPV4_SOURCE_QUENCH
                    | ICMPV4_REDIRECT
                    | ICMPV4_TIME_EXCEEDED
                    | ICMPV4_PARAM_PROBLEM
            ),
            IpProto::Icmpv6 => matches!(
                self.icmp_type,
                ICMPV6_DEST_UNREACHABLE
                    | ICMPV6_PACKET_TOO_BIG
                    | ICMPV6_TIME_EXCEEDED
                    | ICMPV6_PARAM_PROBLEM
            ),
            _ => false,
        }
    }

    /// True for a non-initial IP fragment (no transport header present).
    pub fn is_fragment(&self) -> bool {
        self.protocol == IpProto::Fragment
    }

    /// A short allocating summary used only for logging.
    pub fn summary(&self) -> String {
        match self.version {
            4 => format!(
                "{:?} {}:{} -> {}:{}",
                self.protocol,
                self.src_v4.unwrap_or(Ipv4Addr::UNSPECIFIED),
                self.src_port,
                self.dst_v4.unwrap_or(Ipv4Addr::UNSPECIFIED),
                self.dst_port
            ),
            6 => format!(
                "{:?} [{}]:{} -> [{}]:{}",
                self.protocol,
                self.src_v6.unwrap_or(Ipv6Addr::UNSPECIFIED),
                self.src_port,
                self.dst_v6.unwrap_or(Ipv6Addr::UNSPECIFIED),
                self.dst_port
            ),
            v => format!("v{v} {:?}", self.protocol),
        }
    }
}

/// Renders `buf` as a hex dump, one space-separated byte per column,
/// wrapped every 16 bytes. Allocating — callers must defer this until
/// after a rate-limiter token has been consumed.
pub fn hexdump(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len() * 3);
    for (i, byte) in buf.iter().enumerate() {
        if i > 0 && i % 16 == 0 {
            out.push('\n');
        } else if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Decodes a raw IPv4/IPv6 datagram. Never fails: anything that does not
/// parse cleanly is classified [`IpProto::Unknown`].
pub fn decode(raw: &[u8]) -> Parsed {
    let mut p = Parsed {
        buf: raw.to_vec(),
        version: 0,
        protocol: IpProto::Unknown,
        src_v4: None,
        dst_v4: None,
        src_v6: None,
        dst_v6: None,
        src_port: 0,
        dst_port: 0,
        tcp_flags: 0,
        icmp_type: 0,
        fragment_offset: 0,
    };

    if raw.is_empty() {
        return p;
    }

    let version = raw[0] >> 4;
    match version {
        4 => decode_v4(raw, &mut p),
        6 => decode_v6(raw, &mut p),
        _ => {}
    }
    p
}

fn decode_v4(raw: &[u8], p: &mut Parsed) {
    if raw.len() < 20 {
        return;
    }
    p.version = 4;
    let ihl = ((raw[0] & 0x0f) as usize) * 4;
    if ihl < 20 || raw.len() < ihl {
        return;
    }

    let flags_and_frag = u16::from_be_bytes([raw[6], raw[7]]);
    let frag_offset_words = flags_and_frag & 0x1fff;
    p.fragment_offset = frag_offset_words * 8;

    let proto_byte = raw[9];
    p.src_v4 = Some(Ipv4Addr::new(raw[12], raw[13], raw[14], raw[15]));
    p.dst_v4 = Some(Ipv4Addr::new(raw[16], raw[17], raw[18], raw[19]));

    if p.fragment_offset != 0 {
        p.protocol = IpProto::Fragment;
        return;
    }

    let payload = &raw[ihl..];
    match proto_byte {
        PROTO_TCP => decode_tcp(payload, p),
        PROTO_UDP => decode_udp(payload, p),
        PROTO_ICMPV4 => decode_icmp(payload, p, IpProto::Icmpv4),
        PROTO_IGMP => p.protocol = IpProto::Igmp,
        _ => p.protocol = IpProto::Unknown,
    }
}

fn decode_v6(raw: &[u8], p: &mut Parsed) {
    if raw.len() < 40 {
        return;
    }
    p.version = 6;
    p.src_v6 = Some(v6_addr(&raw[8..24]));
    p.dst_v6 = Some(v6_addr(&raw[24..40]));

    let mut next_header = raw[6];
    let mut offset = 40usize;

    if next_header == PROTO_V6_FRAGMENT {
        if raw.len() < offset + 8 {
            return;
        }
        let frag_hdr = &raw[offset..offset + 8];
        next_header = frag_hdr[0];
        let offset_and_flags = u16::from_be_bytes([frag_hdr[2], frag_hdr[3]]);
        p.fragment_offset = (offset_and_flags >> 3) * 8;
        offset += 8;

        if p.fragment_offset != 0 {
            p.protocol = IpProto::Fragment;
            return;
        }
    }

    if raw.len() < offset {
        return;
    }
    let payload = &raw[offset..];
    match next_header {
        PROTO_TCP => decode_tcp(payload, p),
        PROTO_UDP => decode_udp(payload, p),
        PROTO_ICMPV6 => decode_icmp(payload, p, IpProto::Icmpv6),
        _ => p.protocol = IpProto::Unknown,
    }
}

fn v6_addr(bytes: &[u8]) -> Ipv6Addr {
    let mut a = [0u8; 16];
    a.copy_from_slice(bytes);
    Ipv6Addr::from(a)
}

fn decode_tcp(payload: &[u8], p: &mut Parsed) {
    if payload.len() < 14 {
        p.protocol = IpProto::Unknown;
        return;
    }
    p.protocol = IpProto::Tcp;
    p.src_port = u16::from_be_bytes([payload[0], payload[1]]);
    p.dst_port = u16::from_be_bytes([payload[2], payload[3]]);
    p.tcp_flags = payload[13];
}

fn decode_udp(payload: &[u8], p: &mut Parsed) {
    if payload.len() < 8 {
        p.protocol = IpProto::Unknown;
        return;
    }
    p.protocol = IpProto::Udp;
    p.src_port = u16::from_be_bytes([payload[0], payload[1]]);
    p.dst_port = u16::from_be_bytes([payload[2], payload[3]]);
}

fn decode_icmp(payload: &[u8], p: &mut Parsed, proto: IpProto) {
    if payload.len() < 4 {
        p.protocol = IpProto::Unknown;
        return;
    }
    p.protocol = proto;
    p.icmp_type = payload[0];
}

/// Helpers for synthesizing a `Parsed` directly from semantic fields,
/// bypassing `decode`. This is a privileged test/admin path — see
/// `Filter::check_tcp` — not a general "parse from fields" API.
pub mod test_support {
    use super::*;

    /// Builds a minimal inbound TCP SYN with the given addresses/port and
    /// zero source port, long enough to pass the 20-byte pre-check floor.
    pub fn synth_tcp_syn_v4(src: Ipv4Addr, dst: Ipv4Addr, dst_port: u16) -> Parsed {
        let mut p = decode(&dummy_buf(34));
        p.version = 4;
        p.protocol = IpProto::Tcp;
        p.src_v4 = Some(src);
        p.dst_v4 = Some(dst);
        p.src_port = 0;
        p.dst_port = dst_port;
        p.tcp_flags = TCP_FLAG_SYN;
        p
    }

    pub fn synth_tcp_syn_v6(src: Ipv6Addr, dst: Ipv6Addr, dst_port: u16) -> Parsed {
        let mut p = decode(&dummy_buf(54));
        p.version = 6;
        p.protocol = IpProto::Tcp;
        p.src_v6 = Some(src);
        p.dst_v6 = Some(dst);
        p.src_port = 0;
        p.dst_port = dst_port;
        p.tcp_flags = TCP_FLAG_SYN;
        p
    }

    fn dummy_buf(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }
}

#[cfg(test)]
impl Parsed {
    pub(crate) fn tcp_flags_for_test_clear_syn(&mut self) {
        self.tcp_flags &= !TCP_FLAG_SYN;
    }

    pub(crate) fn set_udp_for_test(&mut self, src_port: u16, dst_port: u16) {
        self.protocol = IpProto::Udp;
        self.src_port = src_port;
        self.dst_port = dst_port;
    }

    pub(crate) fn set_icmp_echo_request_for_test(&mut self) {
        self.protocol = if self.version == 6 { IpProto::Icmpv6 } else { IpProto::Icmpv4 };
        self.icmp_type = if self.version == 6 { ICMPV6_ECHO_REQUEST } else { ICMPV4_ECHO_REQUEST };
    }

    pub(crate) fn set_icmp_echo_reply_for_test(&mut self) {
        self.protocol = if self.version == 6 { IpProto::Icmpv6 } else { IpProto::Icmpv4 };
        self.icmp_type = if self.version == 6 { ICMPV6_ECHO_REPLY } else { ICMPV4_ECHO_REPLY };
    }

    pub(crate) fn set_protocol_for_test(&mut self, proto: IpProto) {
        self.protocol = proto;
    }
}
