//! Timing and retry limits for the transport state machine.

/// General state timeout (ms): parent search, ID acquisition, ping waits.
pub const STATE_TIMEOUT_MS: u64 = 2_000;

/// Time spent in FAILURE before attempting re-initialization (ms).
pub const TIMEOUT_FAILURE_STATE_MS: u64 = 10_000;

/// Minimum interval between gateway pings (flood control, ms).
pub const CHKUPL_INTERVAL_MS: u64 = 10_000;

/// Interval between radio sanity probes while READY (ms).
pub const SANITY_CHECK_INTERVAL_MS: u64 = 900_000;

/// State re-entries tolerated before giving up and entering FAILURE.
pub const STATE_RETRIES: u8 = 3;

/// Upper bound on frames drained per `process` call. Keeps a flooding
/// radio FIFO from starving the state machine.
pub const MAX_SUBSEQ_MSGS: usize = 5;

/// Failed uplink transmissions tolerated before leaving READY.
pub const TRANSMISSION_FAILURES: u8 = 5;

/// Higher tolerance for repeaters, which also carry third-party traffic.
pub const TRANSMISSION_FAILURES_REPEATER: u8 = 10;
