//! Transport support functions: routing decisions, inbound dispatch,
//! uplink health, ping, and the radio sanity probe.

use hopnet_core::constants::{DISTANCE_INVALID, INVALID_HOPS, MAX_FRAME_SIZE, MAX_HOPS};
use hopnet_core::{wire, Command, InternalType, Message, NodeId};

use crate::constants::{CHKUPL_INTERVAL_MS, MAX_SUBSEQ_MSGS, STATE_TIMEOUT_MS};
use crate::error::SendError;
use crate::state::TransportState;
use crate::traits::{Clock, MessageHandler, PersistentStore, RadioDriver, Signer};
use crate::transport::Transport;

/// Outcome of a gateway uplink check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum UplinkCheck {
    /// The gateway answered the ping.
    Ok,
    /// Skipped: the last check was too recent. Counts as healthy.
    FloodControlled,
    /// No reply within the ping timeout.
    Failed,
}

impl UplinkCheck {
    #[must_use]
    pub fn is_ok(self) -> bool {
        !matches!(self, UplinkCheck::Failed)
    }
}

impl<R, S, C, G, H> Transport<R, S, C, G, H>
where
    R: RadioDriver,
    S: PersistentStore,
    C: Clock,
    G: Signer,
    H: MessageHandler,
{
    /// Route `message` toward its destination.
    ///
    /// Local destinations are delivered to the application handler.
    /// Broadcasts go out on the broadcast address. Everything else is
    /// handed to the next hop from the routing table, falling back to the
    /// parent for unknown destinations. While a parent search is active,
    /// unicast routing is refused (the search's own broadcast is exempt).
    pub(crate) fn route(&mut self, message: Message) -> Result<(), SendError> {
        let destination = message.destination;

        if destination == self.node_id && !destination.is_broadcast() {
            self.handler.handle(&message);
            return Ok(());
        }

        if self.vars.finding_parent && !destination.is_broadcast() {
            tracing::warn!(%destination, "parent search active, message not sent");
            return Err(SendError::ParentSearchActive);
        }

        let next = if destination.is_broadcast() {
            NodeId::BROADCAST
        } else if destination.is_gateway() {
            self.parent
        } else {
            match self.routes.stored(&mut self.store, destination) {
                Some(hop) => hop,
                None => {
                    tracing::debug!(%destination, "destination unknown, routing via parent");
                    self.parent
                }
            }
        };

        self.send_write(next, message)
    }

    /// Route with the transport-ready check. This is the public send path.
    pub(crate) fn send_route(&mut self, message: Message) -> Result<(), SendError> {
        if !self.ready() {
            tracing::warn!("transport not ready, message not sent");
            return Err(SendError::NotReady);
        }
        self.route(message)
    }

    /// Stamp the envelope, sign if required, and hand one frame to the
    /// radio. Bookkeeps the failed-uplink counter when the link target is
    /// the parent.
    fn send_write(&mut self, next: NodeId, mut message: Message) -> Result<(), SendError> {
        message.last = self.node_id;
        message.next = next;

        if !message.destination.is_broadcast() && self.signer.required(message.destination) {
            if !self.signer.sign(&mut message) {
                tracing::warn!(destination = %message.destination, "message signing failed");
                return Err(SendError::SigningFailed);
            }
        }

        let frame = wire::encode(&message)?;
        let ok = self.radio.send(next, &frame);

        let to_parent = next == self.parent && !next.is_broadcast();
        if ok {
            if to_parent {
                self.vars.failed_uplink_transmissions = 0;
            }
            tracing::debug!(
                sender = %message.sender,
                %next,
                destination = %message.destination,
                msg_type = message.msg_type,
                ft = self.vars.failed_uplink_transmissions,
                "frame sent"
            );
            Ok(())
        } else {
            if to_parent {
                self.vars.failed_uplink_transmissions =
                    self.vars.failed_uplink_transmissions.saturating_add(1);
            }
            tracing::warn!(
                %next,
                ft = self.vars.failed_uplink_transmissions,
                "link-layer send failed"
            );
            Err(SendError::LinkFailed(next))
        }
    }

    /// Drain up to [`MAX_SUBSEQ_MSGS`] pending frames.
    ///
    /// The bound keeps a flooding FIFO (e.g. a wedged radio) from starving
    /// the state machine.
    pub(crate) fn process_fifo(&mut self) {
        for _ in 0..MAX_SUBSEQ_MSGS {
            if !self.radio.available() {
                break;
            }
            self.process_message();
        }
    }

    /// Receive and dispatch a single frame.
    fn process_message(&mut self) {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = self.radio.receive(&mut buf);
        if len == 0 {
            return;
        }

        let message = match wire::parse(&buf[..len]) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        tracing::trace!(
            sender = %message.sender,
            last = %message.last,
            destination = %message.destination,
            msg_type = message.msg_type,
            len = message.payload.len(),
            "frame received"
        );

        if message.signed && !self.signer.verify(&message) {
            tracing::warn!(sender = %message.sender, "signature verification failed, dropped");
            return;
        }

        // ACK frames are not processed further; the application correlates them.
        if message.is_ack {
            tracing::debug!(sender = %message.sender, "ack received");
            self.handler.handle(&message);
            return;
        }

        // Opportunistic route learning from everything the gateway did not send.
        if !message.sender.is_gateway() {
            self.routes
                .learn(&mut self.store, message.sender, message.last, self.node_id);
        }

        if message.destination == self.node_id {
            self.handle_addressed(message);
        } else if message.destination.is_broadcast() {
            self.handle_broadcast(message);
        } else {
            self.handle_relay(message);
        }
    }

    /// Dispatch a frame addressed to this node.
    fn handle_addressed(&mut self, message: Message) {
        self.vars.last_dispatched = Some((message.command, message.msg_type));

        match message.internal_type() {
            Some(InternalType::FindParentResponse) => self.handle_parent_response(&message),
            Some(InternalType::IdResponse) => self.handle_id_response(&message),
            Some(InternalType::Ping) => {
                let hops = message.byte_payload().unwrap_or(0);
                tracing::debug!(sender = %message.sender, hops, "pinged");
                let pong = Message::internal(self.node_id, message.sender, InternalType::Pong)
                    .with_byte(1);
                if let Err(e) = self.route(pong) {
                    tracing::debug!(error = %e, "pong not sent");
                }
            }
            Some(InternalType::Pong) => {
                if self.vars.ping_active {
                    self.vars.ping_response = message.byte_payload().unwrap_or(INVALID_HOPS);
                    self.vars.ping_active = false;
                    tracing::debug!(hops = self.vars.ping_response, "pong received");
                }
            }
            _ => self.handler.handle(&message),
        }
    }

    /// Dispatch a broadcast frame.
    fn handle_broadcast(&mut self, message: Message) {
        self.vars.last_dispatched = Some((message.command, message.msg_type));

        match message.internal_type() {
            Some(InternalType::FindParentRequest) => {
                // Only answer when this node can actually carry traffic.
                if self.vars.transport_active
                    && !self.vars.finding_parent
                    && message.sender != self.node_id
                {
                    tracing::debug!(requester = %message.sender, "find-parent request");
                    let response = Message::internal(
                        self.node_id,
                        message.sender,
                        InternalType::FindParentResponse,
                    )
                    .with_byte(self.distance);
                    if let Err(e) = self.route(response) {
                        tracing::debug!(error = %e, "find-parent response not sent");
                    }
                }
            }
            // A searching node with no ID yet listens on the broadcast
            // address, so these replies can arrive as broadcasts too.
            Some(InternalType::FindParentResponse) => self.handle_parent_response(&message),
            Some(InternalType::IdResponse) => self.handle_id_response(&message),
            Some(InternalType::Discover) => {
                self.handler.handle(&message);
                if self.config.repeater && message.sender != self.node_id {
                    let budget = message.byte_payload().unwrap_or(0);
                    if budget > 0 {
                        tracing::debug!(remaining = budget - 1, "re-broadcasting controlled flood");
                        let mut relay = message;
                        relay.payload = vec![budget - 1];
                        if let Err(e) = self.route(relay) {
                            tracing::debug!(error = %e, "flood relay not sent");
                        }
                    }
                }
            }
            _ => {
                tracing::debug!(sender = %message.sender, "broadcast message");
                self.handler.handle(&message);
            }
        }
    }

    /// Forward a frame addressed to another node.
    fn handle_relay(&mut self, mut message: Message) {
        if !self.config.repeater {
            tracing::warn!(
                destination = %message.destination,
                "relay traffic on a non-repeater node, dropped"
            );
            return;
        }
        if !self.vars.transport_active {
            tracing::debug!("transport not active, relay dropped");
            return;
        }

        if matches!(
            message.internal_type(),
            Some(InternalType::Ping) | Some(InternalType::Pong)
        ) {
            let hops = message.byte_payload().unwrap_or(0);
            if hops >= MAX_HOPS {
                tracing::warn!(hops, "hop budget exhausted, relay dropped");
                return;
            }
            message.payload = vec![hops + 1];
            tracing::debug!(hops = hops + 1, "relaying ping/pong");
        } else {
            tracing::debug!(destination = %message.destination, "relaying message");
        }

        if let Err(e) = self.route(message) {
            tracing::debug!(error = %e, "relay failed");
        }
    }

    /// Accept or replace the tentative parent from a find-parent response.
    fn handle_parent_response(&mut self, message: &Message) {
        if !self.vars.finding_parent {
            tracing::debug!(
                sender = %message.sender,
                "find-parent response with no search active, ignored"
            );
            return;
        }

        let reported = message.byte_payload().unwrap_or(DISTANCE_INVALID);
        if reported == DISTANCE_INVALID {
            tracing::debug!(sender = %message.sender, "candidate has no gateway route, ignored");
            return;
        }

        tracing::debug!(candidate = %message.sender, distance = reported, "find-parent response");
        let candidate_distance = reported.saturating_add(1);

        if self.parent == NodeId::AUTO {
            // First usable response becomes the tentative parent.
            self.parent = message.sender;
            self.distance = candidate_distance;
            tracing::info!(parent = %self.parent, distance = self.distance, "tentative parent");
            if reported == 0 {
                self.vars.preferred_parent_found = true;
                tracing::info!("preferred parent found");
            }
        } else if reported == 0 || candidate_distance < self.distance {
            // The gateway itself, or a strictly closer node, wins; ties
            // keep the first observed candidate.
            self.parent = message.sender;
            self.distance = candidate_distance;
            self.vars.preferred_parent_found = true;
            tracing::info!(parent = %self.parent, distance = self.distance, "preferred parent");
        }
    }

    /// Apply a controller-assigned node ID.
    fn handle_id_response(&mut self, message: &Message) {
        if self.vars.state != TransportState::AcquireId || self.node_id != NodeId::AUTO {
            tracing::debug!("unsolicited id response, ignored");
            return;
        }
        let assigned = NodeId::new(message.byte_payload().unwrap_or(NodeId::AUTO.raw()));
        self.assign_node_id(assigned);
    }

    /// Validate, persist, and apply a node ID. Invalid assignments force
    /// FAILURE.
    pub(crate) fn assign_node_id(&mut self, id: NodeId) -> bool {
        // An ID colliding with the configured parent would make the node
        // its own uplink.
        if !id.is_assignable() || self.config.parent == Some(id) {
            tracing::error!(%id, "assigned node id is invalid");
            self.switch_state(TransportState::Failure);
            return false;
        }
        self.node_id = id;
        self.radio.set_address(id);
        if let Err(e) = self.store.store_node_id(id) {
            tracing::warn!(error = %e, "node id store failed");
        }
        tracing::info!(node_id = %id, "node id assigned");
        true
    }

    /// Verify the uplink by pinging the gateway, with flood control.
    ///
    /// A reply that reports a different hop count than the stored distance
    /// means the topology changed; the new distance is adopted and
    /// persisted.
    pub(crate) fn check_uplink(&mut self, force: bool) -> UplinkCheck {
        if self.config.gateway {
            return UplinkCheck::Ok;
        }

        let now = self.clock.now_ms();
        if !force && now.saturating_sub(self.vars.last_uplink_check_ms) < CHKUPL_INTERVAL_MS {
            tracing::debug!("uplink check suppressed by flood control");
            return UplinkCheck::FloodControlled;
        }

        let hops = self.ping_node(NodeId::GATEWAY);
        self.vars.last_uplink_check_ms = self.clock.now_ms();

        if hops == INVALID_HOPS {
            tracing::warn!("uplink check failed, gateway did not reply");
            return UplinkCheck::Failed;
        }

        if hops != self.distance {
            tracing::info!(old = self.distance, new = hops, "gateway distance changed");
            self.distance = hops;
            if let Err(e) = self.store.store_parent(self.parent, self.distance) {
                tracing::warn!(error = %e, "parent store failed");
            }
        }
        tracing::debug!("uplink ok");
        UplinkCheck::Ok
    }

    /// Ping `target` and wait for the pong.
    ///
    /// Returns the hop count from the reply, or `INVALID_HOPS` on timeout.
    /// `ping_active` is always cleared before returning.
    pub(crate) fn ping_node(&mut self, target: NodeId) -> u8 {
        self.vars.ping_active = true;
        self.vars.ping_response = INVALID_HOPS;

        tracing::debug!(%target, "pinging");
        let ping = Message::internal(self.node_id, target, InternalType::Ping).with_byte(1);
        if self.route(ping).is_err() {
            self.vars.ping_active = false;
            return INVALID_HOPS;
        }

        self.transport_wait(
            STATE_TIMEOUT_MS,
            Command::Internal,
            InternalType::Pong.byte(),
        );
        self.vars.ping_active = false;
        self.vars.ping_response
    }

    /// Probe the radio hardware; a failed probe forces FAILURE.
    pub(crate) fn invoke_sanity_check(&mut self) {
        if self.radio.sanity_check() {
            tracing::debug!("radio sanity check passed");
        } else {
            tracing::error!("radio sanity check failed");
            self.switch_state(TransportState::Failure);
        }
    }
}
