//! The transport context and its public API.

use hopnet_core::constants::DISTANCE_INVALID;
use hopnet_core::{Command, Message, NodeId};

use crate::config::TransportConfig;
use crate::error::SendError;
use crate::routing::RoutingTable;
use crate::state::{StateVars, TransportState};
use crate::traits::{Clock, MessageHandler, PersistentStore, RadioDriver, Signer};

/// The transport core, generic over its hardware and host-service ports.
///
/// One instance per node, owning the radio, the store, the clock, the
/// signer, and the application handler. All execution happens inside
/// calls to [`Transport::process`] and [`Transport::send`], so the type
/// is single-threaded by construction.
pub struct Transport<R, S, C, G, H> {
    pub(crate) config: TransportConfig,
    pub(crate) radio: R,
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) signer: G,
    pub(crate) handler: H,

    pub(crate) routes: RoutingTable,
    pub(crate) vars: StateVars,
    pub(crate) node_id: NodeId,
    pub(crate) parent: NodeId,
    pub(crate) distance: u8,
}

impl<R, S, C, G, H> Transport<R, S, C, G, H>
where
    R: RadioDriver,
    S: PersistentStore,
    C: Clock,
    G: Signer,
    H: MessageHandler,
{
    /// Build a transport around its ports. Call [`initialize`] before use.
    ///
    /// [`initialize`]: Transport::initialize
    pub fn new(
        config: TransportConfig,
        radio: R,
        store: S,
        clock: C,
        signer: G,
        handler: H,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            radio,
            store,
            clock,
            signer,
            handler,
            routes: RoutingTable::new(),
            vars: StateVars::new(now),
            node_id: NodeId::AUTO,
            parent: NodeId::AUTO,
            distance: DISTANCE_INVALID,
        }
    }

    /// Reset all status variables and enter INIT. Idempotent.
    pub fn initialize(&mut self) {
        let now = self.clock.now_ms();
        self.vars = StateVars::new(now);
        self.run_transition();
    }

    /// One cooperative tick: drain the radio FIFO (bounded), then run the
    /// current state's update action.
    pub fn process(&mut self) {
        self.process_fifo();
        self.run_update();
    }

    /// Whether application messages can be sent.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.vars.state == TransportState::Ready
    }

    /// Whether a find-parent cycle is in flight.
    #[must_use]
    pub fn searching_parent(&self) -> bool {
        self.vars.finding_parent
    }

    /// Route an application message. Refused unless the transport is READY.
    pub fn send(&mut self, message: Message) -> Result<(), SendError> {
        self.send_route(message)
    }

    /// Drop all learned routes, in memory and in the store.
    pub fn clear_routing_table(&mut self) {
        tracing::info!("clearing routing table");
        self.routes.clear(&mut self.store);
    }

    /// Milliseconds spent in the current state.
    #[must_use]
    pub fn heartbeat(&self) -> u64 {
        self.time_in_state()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransportState {
        self.vars.state
    }

    /// This node's address.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The current parent (next hop toward the gateway).
    #[must_use]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Hop count to the gateway, or `DISTANCE_INVALID`.
    #[must_use]
    pub fn distance(&self) -> u8 {
        self.distance
    }

    /// Shared access to the radio port.
    #[must_use]
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable access to the radio port.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Shared access to the store port.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // -- internals shared by the state machine and the support functions --

    /// Switch the state machine, running the new state's transition action.
    ///
    /// Switching to the state already current counts as a re-entry and
    /// increments the retry counter; switching to a different state resets
    /// it.
    pub(crate) fn switch_state(&mut self, next: TransportState) {
        if self.vars.state == next {
            self.vars.retries = self.vars.retries.saturating_add(1);
        } else {
            self.vars.retries = 0;
        }
        tracing::debug!(state = %next, retries = self.vars.retries, "switching transport state");
        self.vars.state = next;
        self.vars.state_enter_ms = self.clock.now_ms();
        self.run_transition();
    }

    pub(crate) fn time_in_state(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.vars.state_enter_ms)
    }

    /// Poll the FIFO for up to `ms` milliseconds, until a frame with the
    /// given command and type has been dispatched.
    ///
    /// This is the transport's only suspension point besides the radio's
    /// own send: a bounded cooperative loop that keeps draining unrelated
    /// traffic while it waits. It never blocks on I/O.
    pub(crate) fn transport_wait(&mut self, ms: u64, command: Command, msg_type: u8) -> bool {
        let enter = self.clock.now_ms();
        self.vars.last_dispatched = None;
        loop {
            self.process_fifo();
            if self.vars.last_dispatched == Some((command, msg_type)) {
                return true;
            }
            if self.clock.now_ms().saturating_sub(enter) >= ms {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MemoryStore, SimRadio};
    use crate::traits::{DropHandler, NoSigning};
    use hopnet_core::InternalType;

    type TestTransport = Transport<SimRadio, MemoryStore, ManualClock, NoSigning, DropHandler>;

    fn leaf() -> (TestTransport, ManualClock) {
        let clock = ManualClock::new();
        let transport = Transport::new(
            TransportConfig::leaf(),
            SimRadio::new(),
            MemoryStore::new(),
            clock.clone(),
            NoSigning,
            DropHandler,
        );
        (transport, clock)
    }

    #[test]
    fn re_entering_a_state_counts_retries() {
        let (mut transport, _clock) = leaf();
        transport.initialize();
        assert_eq!(transport.vars.state, TransportState::FindParent);
        assert_eq!(transport.vars.retries, 0);

        transport.switch_state(TransportState::FindParent);
        assert_eq!(transport.vars.retries, 1);
        transport.switch_state(TransportState::FindParent);
        assert_eq!(transport.vars.retries, 2);

        transport.switch_state(TransportState::Failure);
        assert_eq!(transport.vars.retries, 0, "state change resets retries");
    }

    #[test]
    fn wait_times_out_at_the_deadline() {
        let (mut transport, clock) = leaf();
        transport.initialize();

        let before = clock.now_ms();
        let matched = transport.transport_wait(50, Command::Internal, InternalType::Pong.byte());
        assert!(!matched);
        assert!(clock.now_ms() - before >= 50);
    }

    #[test]
    fn wait_ends_early_on_the_awaited_frame() {
        let (mut transport, clock) = leaf();
        transport.initialize();

        let pong = Message::internal(NodeId::new(3), NodeId::BROADCAST, InternalType::Pong)
            .with_byte(2);
        transport.radio_mut().inject(&pong);

        let before = clock.now_ms();
        let matched =
            transport.transport_wait(5_000, Command::Internal, InternalType::Pong.byte());
        assert!(matched);
        assert!(clock.now_ms() - before < 100, "wait must not run to the deadline");
    }

    #[test]
    fn initialize_is_idempotent() {
        let (mut transport, _clock) = leaf();
        transport.initialize();
        let first_state = transport.state();
        transport.initialize();
        assert_eq!(transport.state(), first_state);
        assert_eq!(transport.vars.retries, 0);
        assert_eq!(transport.radio().init_count, 2);
    }
}
