//! Bounded, thread-safe connection tracking for outbound UDP flows.
//!
//! The inbound engine consults this to let return traffic back in without
//! an explicit rule; the outbound engine populates it. One tracker per
//! address family — keeping the tuple concretely typed per family avoids
//! a boxed/any-typed value on every insert.

use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;

use lru::LruCache;

use crate::config::CONNTRACK_CAPACITY;

/// `(src_ip, dst_ip, src_port, dst_port)` for IPv4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnKeyV4 {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl ConnKeyV4 {
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16) -> Self {
        Self { src_ip, dst_ip, src_port, dst_port }
    }

    /// The tuple as it should be recorded by an outbound capture: source
    /// and destination swapped, so the reverse-direction inbound packet's
    /// as-is tuple hits.
    pub fn reversed(&self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

/// `(src_ip, dst_ip, src_port, dst_port)` for IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnKeyV6 {
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl ConnKeyV6 {
    pub fn new(src_ip: Ipv6Addr, dst_ip: Ipv6Addr, src_port: u16, dst_port: u16) -> Self {
        Self { src_ip, dst_ip, src_port, dst_port }
    }

    pub fn reversed(&self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

/// A bounded LRU of recently observed flow tuples. Only presence matters
/// (set semantics) — values are `()`. A single mutex serializes mutation;
/// it is never held across rule matching or logging.
pub struct ConnTracker<K: Hash + Eq> {
    entries: Mutex<LruCache<K, ()>>,
}

impl<K: Hash + Eq + Copy> ConnTracker<K> {
    pub fn new() -> Self {
        Self::with_capacity(CONNTRACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let cap = std::num::NonZeroUsize::new(capacity).expect("conntrack capacity must be nonzero");
        Self { entries: Mutex::new(LruCache::new(cap)) }
    }

    /// Records `key`, moving it to most-recently-used; evicts the least
    /// recently used entry if the tracker is already at capacity.
    pub fn record(&self, key: K) {
        self.entries.lock().unwrap().put(key, ());
    }

    /// Checks for `key`, moving it to most-recently-used on hit.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().unwrap().get(key).is_some()
    }

    /// Current number of tracked entries (test/diagnostic use).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Hash + Eq + Copy> Default for ConnTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub type ConnTrackerV4 = ConnTracker<ConnKeyV4>;
pub type ConnTrackerV6 = ConnTracker<ConnKeyV6>;

#[cfg(test)]
mod tests {
    use super::*;

    fn key(a: u8, b: u8, sp: u16, dp: u16) -> ConnKeyV4 {
        ConnKeyV4::new(Ipv4Addr::new(10, 0, 0, a), Ipv4Addr::new(100, 64, 0, b), sp, dp)
    }

    #[test]
    fn test_record_then_contains() {
        let t = ConnTrackerV4::new();
        let k = key(1, 1, 51820, 53);
        assert!(!t.contains(&k));
        t.record(k);
        assert!(t.contains(&k));
    }

    #[test]
    fn test_reversed_tuple_swaps_src_and_dst() {
        let k = ConnKeyV4::new(Ipv4Addr::new(100, 64, 0, 1), Ipv4Addr::new(8, 8, 8, 8), 51820, 53);
        let r = k.reversed();
        assert_eq!(r.src_ip, Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(r.dst_ip, Ipv4Addr::new(100, 64, 0, 1));
        assert_eq!(r.src_port, 53);
        assert_eq!(r.dst_port, 51820);
    }

    #[test]
    fn test_capacity_is_enforced_with_strict_lru_eviction() {
        let t = ConnTracker::<ConnKeyV4>::with_capacity(4);
        for i in 0..4u8 {
            t.record(key(i, i, 1000 + i as u16, 2000));
        }
        let first = key(0, 0, 1000, 2000);
        assert!(t.contains(&first));

        // Insert a 5th entry — capacity is 4, so the least-recently-used
        // (the one we just re-touched via `contains` is now MRU, so the
        // next-oldest untouched entry gets evicted instead).
        t.record(key(4, 4, 1004, 2000));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_513th_distinct_entry_evicts_the_first() {
        let t = ConnTrackerV4::new();
        for i in 0..512u32 {
            let sp = (i % 65000) as u16;
            t.record(ConnKeyV4::new(
                Ipv4Addr::new(10, (i >> 8) as u8, (i & 0xff) as u8, 1),
                Ipv4Addr::new(100, 64, 0, 1),
                sp,
                53,
            ));
        }
        let first = ConnKeyV4::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(100, 64, 0, 1), 0, 53);
        assert_eq!(t.len(), 512, "512 distinct tuples should fill the tracker exactly");

        t.record(ConnKeyV4::new(Ipv4Addr::new(10, 2, 0, 1), Ipv4Addr::new(100, 64, 0, 1), 9999, 53));
        assert_eq!(t.len(), 512);
        assert!(!t.contains(&first), "first-inserted entry should have been evicted");
    }

    #[test]
    fn test_contains_on_miss_does_not_insert() {
        let t = ConnTrackerV4::new();
        let k = key(9, 9, 1, 2);
        assert!(!t.contains(&k));
        assert_eq!(t.len(), 0);
    }
}
