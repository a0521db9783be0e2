//! `RunFlags`: the caller-supplied bitset controlling decision logging.

bitflags::bitflags! {
    /// Controls whether, and how verbosely, a call to
    /// [`Filter::run_in`](crate::Filter::run_in) or
    /// [`Filter::run_out`](crate::Filter::run_out) logs its decision.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RunFlags: u8 {
        /// Emit a log entry for drops (subject to rate limiting).
        const LOG_DROPS = 0x1;
        /// Emit a log entry for accepts (subject to rate limiting).
        const LOG_ACCEPTS = 0x2;
        /// Attach a hex dump of the raw packet to drop logs.
        const HEXDUMP_DROPS = 0x4;
        /// Attach a hex dump of the raw packet to accept logs.
        const HEXDUMP_ACCEPTS = 0x8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values_match_spec() {
        assert_eq!(RunFlags::LOG_DROPS.bits(), 0x1);
        assert_eq!(RunFlags::LOG_ACCEPTS.bits(), 0x2);
        assert_eq!(RunFlags::HEXDUMP_DROPS.bits(), 0x4);
        assert_eq!(RunFlags::HEXDUMP_ACCEPTS.bits(), 0x8);
    }

    #[test]
    fn test_flags_compose() {
        let f = RunFlags::LOG_DROPS | RunFlags::HEXDUMP_DROPS;
        assert!(f.contains(RunFlags::LOG_DROPS));
        assert!(f.contains(RunFlags::HEXDUMP_DROPS));
        assert!(!f.contains(RunFlags::LOG_ACCEPTS));
    }

    #[test]
    fn test_empty_flags_logs_nothing() {
        assert!(RunFlags::empty().is_empty());
    }
}
