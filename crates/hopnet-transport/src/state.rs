//! Transport lifecycle states and status variables.

use core::fmt;

use hopnet_core::constants::INVALID_HOPS;
use hopnet_core::Command;

/// The transport lifecycle state.
///
/// Startup walks INIT → FIND_PARENT → ACQUIRE_ID → UPLINK → READY; any
/// exhausted retry budget drops into FAILURE, which powers the radio down
/// and re-initializes after a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Init,
    FindParent,
    AcquireId,
    Uplink,
    Ready,
    Failure,
}

impl TransportState {
    /// A short uppercase name for logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TransportState::Init => "INIT",
            TransportState::FindParent => "FIND_PARENT",
            TransportState::AcquireId => "ACQUIRE_ID",
            TransportState::Uplink => "UPLINK",
            TransportState::Ready => "READY",
            TransportState::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status variables backing the state machine.
///
/// One instance lives for the process lifetime. The packed-bitfield layout
/// used on 8-bit targets is flattened into plain fields here.
#[derive(Debug, Clone)]
pub struct StateVars {
    pub state: TransportState,
    /// When the current state was entered.
    pub state_enter_ms: u64,
    /// Last gateway ping, for flood control.
    pub last_uplink_check_ms: u64,
    pub last_sanity_check_ms: u64,

    /// A find-parent cycle is in flight. Excludes concurrent searches and
    /// refuses unicast routing until it clears.
    pub finding_parent: bool,
    /// The current search already found a candidate good enough to stop
    /// waiting for.
    pub preferred_parent_found: bool,
    pub uplink_ok: bool,
    pub ping_active: bool,
    /// Transport reached READY at least once since (re-)initialization.
    pub transport_active: bool,

    /// Re-entries into the current state.
    pub retries: u8,
    pub failed_uplink_transmissions: u8,
    /// Hop count from the most recent pong, or `INVALID_HOPS`.
    pub ping_response: u8,

    /// Command/type of the most recently dispatched inbound frame. The
    /// bounded wait loop polls this to detect its awaited reply.
    pub last_dispatched: Option<(Command, u8)>,
}

impl StateVars {
    /// Fresh variables, entering INIT at time `now_ms`.
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            state: TransportState::Init,
            state_enter_ms: now_ms,
            last_uplink_check_ms: 0,
            last_sanity_check_ms: now_ms,
            finding_parent: false,
            preferred_parent_found: false,
            uplink_ok: false,
            ping_active: false,
            transport_active: false,
            retries: 0,
            failed_uplink_transmissions: 0,
            ping_response: INVALID_HOPS,
            last_dispatched: None,
        }
    }
}
