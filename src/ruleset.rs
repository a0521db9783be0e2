//! Compiled match rules: the ACL the inbound engine consults once the
//! local-prefix gate and the ICMP/TCP-non-SYN/UDP-conntrack shortcuts have
//! all fallen through.
//!
//! A [`RuleSet`] is built once from a list of [`MatchRule`]s and never
//! mutated afterwards — reloading rules means constructing a new `RuleSet`
//! (and, via [`crate::Filter`], a new `Filter`).

use crate::error::ConfigError;
use crate::netaddr::{self, Ipv4Net, Ipv6Net};
use crate::packet::Parsed;

/// An inclusive port range. `(0, 65535)` means "any port".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl PortRange {
    pub fn any() -> Self {
        Self { first: 0, last: 65535 }
    }

    pub fn new(first: u16, last: u16) -> Result<Self, ConfigError> {
        if first > last {
            return Err(ConfigError::InvalidPortRange(first as u32, last as u32));
        }
        Ok(Self { first, last })
    }

    pub fn contains(&self, port: u16) -> bool {
        self.first <= port && port <= self.last
    }
}

/// A destination term: "address in `prefix` AND port in `ports`".
#[derive(Debug, Clone)]
pub struct DestTermV4 {
    pub prefix: Ipv4Net,
    pub ports: PortRange,
}

#[derive(Debug, Clone)]
pub struct DestTermV6 {
    pub prefix: Ipv6Net,
    pub ports: PortRange,
}

/// A single ACL entry: one or more source prefixes, one or more
/// destination terms. Matches iff the source is covered by some `srcs`
/// entry AND the destination by some `dsts` entry (port range included
/// for ported protocols, ignored for [`RuleSet::match_ips_only`]).
#[derive(Debug, Clone)]
pub struct MatchRuleV4 {
    pub srcs: Vec<Ipv4Net>,
    pub dsts: Vec<DestTermV4>,
}

#[derive(Debug, Clone)]
pub struct MatchRuleV6 {
    pub srcs: Vec<Ipv6Net>,
    pub dsts: Vec<DestTermV6>,
}

/// Compiled IPv4 rule set. Query time is O(rules × terms) with early exit
/// on the first matching rule; construction never fails and the query
/// path never allocates.
#[derive(Debug, Clone, Default)]
pub struct RuleSetV4 {
    rules: Vec<MatchRuleV4>,
}

impl RuleSetV4 {
    /// Compiles a rule set, keeping insertion order (first match wins,
    /// though since only "accept" is expressible, order only affects which
    /// rule is credited, never the accept/drop outcome).
    pub fn new(rules: Vec<MatchRuleV4>) -> Self {
        Self { rules }
    }

    pub fn match_packet(&self, p: &Parsed) -> bool {
        self.eval(p, true)
    }

    pub fn match_ips_only(&self, p: &Parsed) -> bool {
        self.eval(p, false)
    }

    fn eval(&self, p: &Parsed, check_port: bool) -> bool {
        let (Some(src), Some(dst)) = (p.src_v4, p.dst_v4) else {
            return false;
        };
        for rule in &self.rules {
            if !rule.srcs.iter().any(|net| netaddr::contains_v4(net, src)) {
                continue;
            }
            let hit = rule.dsts.iter().any(|term| {
                netaddr::contains_v4(&term.prefix, dst)
                    && (!check_port || term.ports.contains(p.dst_port))
            });
            if hit {
                return true;
            }
        }
        false
    }
}

/// Compiled IPv6 rule set. Same semantics as [`RuleSetV4`].
#[derive(Debug, Clone, Default)]
pub struct RuleSetV6 {
    rules: Vec<MatchRuleV6>,
}

impl RuleSetV6 {
    pub fn new(rules: Vec<MatchRuleV6>) -> Self {
        Self { rules }
    }

    pub fn match_packet(&self, p: &Parsed) -> bool {
        self.eval(p, true)
    }

    pub fn match_ips_only(&self, p: &Parsed) -> bool {
        self.eval(p, false)
    }

    fn eval(&self, p: &Parsed, check_port: bool) -> bool {
        let (Some(src), Some(dst)) = (p.src_v6, p.dst_v6) else {
            return false;
        };
        for rule in &self.rules {
            if !rule.srcs.iter().any(|net| netaddr::contains_v6(net, src)) {
                continue;
            }
            let hit = rule.dsts.iter().any(|term| {
                netaddr::contains_v6(&term.prefix, dst)
                    && (!check_port || term.ports.contains(p.dst_port))
            });
            if hit {
                return true;
            }
        }
        false
    }
}

/// A family-agnostic match rule as supplied by a caller (e.g. parsed from
/// config); [`compile`] splits these into the per-family compiled sets,
/// discarding entries whose prefixes belong to the other family.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub srcs: Vec<IpNetLiteral>,
    pub dsts: Vec<(IpNetLiteral, PortRange)>,
}

/// A prefix literal tagged by family, as accepted from user-facing config
/// before compilation splits it into the per-family rule sets.
#[derive(Debug, Clone)]
pub enum IpNetLiteral {
    V4(Ipv4Net),
    V6(Ipv6Net),
}

/// Compiles a mixed list of family-agnostic [`MatchRule`]s into the two
/// per-family compiled [`RuleSetV4`]/[`RuleSetV6`]. A rule contributes to
/// a family's compiled set only through the source/destination prefixes
/// that belong to that family; prefixes of the other family within the
/// same rule are simply dropped rather than discarding the whole rule,
/// since the remaining entries may still be meaningful.
pub fn compile(rules: &[MatchRule]) -> (RuleSetV4, RuleSetV6) {
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();

    for rule in rules {
        let srcs_v4: Vec<Ipv4Net> = rule
            .srcs
            .iter()
            .filter_map(|n| match n {
                IpNetLiteral::V4(net) => Some(net.clone()),
                IpNetLiteral::V6(_) => None,
            })
            .collect();
        let srcs_v6: Vec<Ipv6Net> = rule
            .srcs
            .iter()
            .filter_map(|n| match n {
                IpNetLiteral::V6(net) => Some(net.clone()),
                IpNetLiteral::V4(_) => None,
            })
            .collect();

        let dsts_v4: Vec<DestTermV4> = rule
            .dsts
            .iter()
            .filter_map(|(n, ports)| match n {
                IpNetLiteral::V4(net) => Some(DestTermV4 { prefix: net.clone(), ports: *ports }),
                IpNetLiteral::V6(_) => None,
            })
            .collect();
        let dsts_v6: Vec<DestTermV6> = rule
            .dsts
            .iter()
            .filter_map(|(n, ports)| match n {
                IpNetLiteral::V6(net) => Some(DestTermV6 { prefix: net.clone(), ports: *ports }),
                IpNetLiteral::V4(_) => None,
            })
            .collect();

        if !srcs_v4.is_empty() && !dsts_v4.is_empty() {
            v4.push(MatchRuleV4 { srcs: srcs_v4, dsts: dsts_v4 });
        }
        if !srcs_v6.is_empty() && !dsts_v6.is_empty() {
            v6.push(MatchRuleV6 { srcs: srcs_v6, dsts: dsts_v6 });
        }
    }

    (RuleSetV4::new(v4), RuleSetV6::new(v6))
}

/// An any-source, any-destination, any-port rule set for each family, for
/// tests that need rule matching to always succeed.
pub fn allow_all() -> (RuleSetV4, RuleSetV6) {
    let v4 = RuleSetV4::new(vec![MatchRuleV4 {
        srcs: vec!["0.0.0.0/0".parse().unwrap()],
        dsts: vec![DestTermV4 {
            prefix: "0.0.0.0/0".parse().unwrap(),
            ports: PortRange::any(),
        }],
    }]);
    let v6 = RuleSetV6::new(vec![MatchRuleV6 {
        srcs: vec!["::/0".parse().unwrap()],
        dsts: vec![DestTermV6 {
            prefix: "::/0".parse().unwrap(),
            ports: PortRange::any(),
        }],
    }]);
    (v4, v6)
}
