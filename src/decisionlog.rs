//! Rate-limited decision logging.
//!
//! Two process-wide token buckets (one for accepts, one for drops) guard
//! against a busy flow flooding the log; a silence list additionally
//! drops routine-but-scary outbound noise unconditionally. Formatting the
//! packet summary and hex dump is deferred until after a token has
//! actually been taken — the single most common hot-path allocation
//! mistake in a logging envelope like this one.

use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::config::{
    ACCEPT_BUCKET_BURST, ACCEPT_BUCKET_PERIOD_SECS, DROP_BUCKET_BURST, DROP_BUCKET_PERIOD_SECS,
};
use crate::flags::RunFlags;
use crate::netaddr::{Ipv4AddrExt, Ipv6AddrExt};
use crate::packet::{hexdump, IpProto, Parsed};
use crate::verdict::Verdict;

/// Which side of the data path produced the decision being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket: one token added every `period`, capped at
/// `burst`. `try_take` is the only operation the decision log needs.
struct TokenBucket {
    period: Duration,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    fn new(period_secs: u64, burst: u32) -> Self {
        Self {
            period: Duration::from_secs(period_secs),
            burst: burst as f64,
            state: Mutex::new(BucketState { tokens: burst as f64, last_refill: Instant::now() }),
        }
    }

    fn try_take(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;

        let rate_per_sec = 1.0 / self.period.as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate_per_sec).min(self.burst);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

fn accept_bucket() -> &'static TokenBucket {
    static BUCKET: OnceLock<TokenBucket> = OnceLock::new();
    BUCKET.get_or_init(|| TokenBucket::new(ACCEPT_BUCKET_PERIOD_SECS, ACCEPT_BUCKET_BURST))
}

fn drop_bucket() -> &'static TokenBucket {
    static BUCKET: OnceLock<TokenBucket> = OnceLock::new();
    BUCKET.get_or_init(|| TokenBucket::new(DROP_BUCKET_PERIOD_SECS, DROP_BUCKET_BURST))
}

/// True for outbound drops whose packet shape is routine noise that would
/// otherwise flood the log: multicast/link-local destinations, and IGMP.
fn is_silenced(direction: Direction, p: &Parsed) -> bool {
    if direction != Direction::Out {
        return false;
    }
    match p.version {
        4 => {
            let Some(dst) = p.dst_v4 else { return false };
            dst.is_multicast() || dst.is_most_link_local_unicast() || p.protocol == IpProto::Igmp
        }
        6 => {
            let Some(dst) = p.dst_v6 else { return false };
            dst.is_multicast() || dst.is_link_local_unicast()
        }
        _ => false,
    }
}

/// Logs a decision subject to `flags`, the rate limiters, and the silence
/// list. Formatting work only happens once a token has been confirmed.
pub fn log(direction: Direction, verdict: Verdict, reason: &str, p: &Parsed, flags: RunFlags) {
    let wants_log = match verdict {
        Verdict::Accept => flags.contains(RunFlags::LOG_ACCEPTS),
        Verdict::Drop => flags.contains(RunFlags::LOG_DROPS),
    };
    if !wants_log {
        return;
    }

    if verdict == Verdict::Drop && is_silenced(direction, p) {
        return;
    }

    let bucket = match verdict {
        Verdict::Accept => accept_bucket(),
        Verdict::Drop => drop_bucket(),
    };
    if !bucket.try_take() {
        return;
    }

    let want_hexdump = match verdict {
        Verdict::Accept => flags.contains(RunFlags::HEXDUMP_ACCEPTS),
        Verdict::Drop => flags.contains(RunFlags::HEXDUMP_DROPS),
    };

    let verdict_str = match verdict {
        Verdict::Accept => "Accept",
        Verdict::Drop => "Drop",
    };
    let dump = if want_hexdump { hexdump(&p.buf) } else { String::new() };
    let line = format!("{verdict_str}: {} {} {reason}\n{dump}", p.summary(), p.buf.len());

    match verdict {
        Verdict::Accept => tracing::info!("{line}"),
        Verdict::Drop => tracing::warn!("{line}"),
    }
}
