//! In-memory test doubles for the port traits.
//!
//! `SimRadio` plays the rest of the mesh: tests script it with responder
//! closures that answer outbound frames (a gateway that replies to pings,
//! a neighbor that answers find-parent requests) and with per-target send
//! failures. `ManualClock` makes the busy-wait loops terminate without
//! wall time by advancing a configurable tick on every read.

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use hopnet_core::constants::DISTANCE_INVALID;
use hopnet_core::{wire, Message, NodeId};

use crate::traits::{Clock, PersistentStore, RadioDriver};

type Responder = Box<dyn FnMut(NodeId, &Message) -> Vec<Message>>;

/// Scripted in-memory radio.
pub struct SimRadio {
    address: NodeId,
    rx: VecDeque<Vec<u8>>,
    /// Every frame handed to `send`, with its link target.
    pub sent: Vec<(NodeId, Vec<u8>)>,
    responders: Vec<Responder>,
    failing: HashSet<NodeId>,
    /// Result the next `init` call reports.
    pub init_result: bool,
    /// Result `sanity_check` reports.
    pub sane: bool,
    /// Number of `init` calls observed.
    pub init_count: usize,
    /// Whether `power_down` was called since the last `init`.
    pub powered_down: bool,
}

impl SimRadio {
    pub fn new() -> Self {
        Self {
            address: NodeId::AUTO,
            rx: VecDeque::new(),
            sent: Vec::new(),
            responders: Vec::new(),
            failing: HashSet::new(),
            init_result: true,
            sane: true,
            init_count: 0,
            powered_down: false,
        }
    }

    /// Queue a message for the node to receive.
    pub fn inject(&mut self, message: &Message) {
        let frame = wire::encode(message).expect("test message encodes");
        self.rx.push_back(frame);
    }

    /// Queue a raw frame, bypassing the codec.
    pub fn inject_raw(&mut self, frame: Vec<u8>) {
        self.rx.push_back(frame);
    }

    /// Script a responder run against every successfully sent frame.
    /// Whatever it returns is queued for reception.
    pub fn respond_with<F>(&mut self, responder: F)
    where
        F: FnMut(NodeId, &Message) -> Vec<Message> + 'static,
    {
        self.responders.push(Box::new(responder));
    }

    /// Make link-layer sends to `to` fail.
    pub fn fail_sends_to(&mut self, to: NodeId) {
        self.failing.insert(to);
    }

    /// Undo [`fail_sends_to`].
    ///
    /// [`fail_sends_to`]: SimRadio::fail_sends_to
    pub fn restore_sends_to(&mut self, to: NodeId) {
        self.failing.remove(&to);
    }

    /// Frames still waiting in the receive FIFO.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// All successfully parsed sent messages, in order.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent
            .iter()
            .filter_map(|(_, frame)| wire::parse(frame).ok())
            .collect()
    }
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDriver for SimRadio {
    fn init(&mut self) -> bool {
        self.init_count += 1;
        self.powered_down = false;
        self.init_result
    }

    fn set_address(&mut self, address: NodeId) {
        self.address = address;
    }

    fn address(&self) -> NodeId {
        self.address
    }

    fn send(&mut self, to: NodeId, frame: &[u8]) -> bool {
        self.sent.push((to, frame.to_vec()));
        if self.failing.contains(&to) {
            return false;
        }
        if let Ok(message) = wire::parse(frame) {
            let mut replies = Vec::new();
            for responder in &mut self.responders {
                replies.extend(responder(to, &message));
            }
            for reply in &replies {
                self.inject(reply);
            }
        }
        true
    }

    fn available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive(&mut self, buf: &mut [u8]) -> usize {
        match self.rx.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                len
            }
            None => 0,
        }
    }

    fn sanity_check(&mut self) -> bool {
        self.sane
    }

    fn power_down(&mut self) {
        self.powered_down = true;
    }
}

/// Infallible in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub node_id: Option<NodeId>,
    pub parent: Option<(NodeId, u8)>,
    pub routes: HashMap<NodeId, NodeId>,
    /// Number of `store_route` calls, for write-through assertions.
    pub route_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    type Error = Infallible;

    fn load_node_id(&mut self) -> Result<NodeId, Infallible> {
        Ok(self.node_id.unwrap_or(NodeId::AUTO))
    }

    fn store_node_id(&mut self, id: NodeId) -> Result<(), Infallible> {
        self.node_id = Some(id);
        Ok(())
    }

    fn load_parent(&mut self) -> Result<(NodeId, u8), Infallible> {
        Ok(self.parent.unwrap_or((NodeId::AUTO, DISTANCE_INVALID)))
    }

    fn store_parent(&mut self, parent: NodeId, distance: u8) -> Result<(), Infallible> {
        self.parent = Some((parent, distance));
        Ok(())
    }

    fn load_route(&mut self, destination: NodeId) -> Result<Option<NodeId>, Infallible> {
        Ok(self.routes.get(&destination).copied())
    }

    fn store_route(&mut self, destination: NodeId, next_hop: NodeId) -> Result<(), Infallible> {
        self.route_writes += 1;
        self.routes.insert(destination, next_hop);
        Ok(())
    }

    fn clear_routes(&mut self) -> Result<(), Infallible> {
        self.routes.clear();
        Ok(())
    }
}

/// Shared manual clock.
///
/// Clones share the same time source, so a test can hold one handle while
/// the transport owns another. Every `now_ms` read advances the clock by
/// `auto_tick` milliseconds (default 1), which models the cost of one poll
/// iteration and guarantees that busy-wait loops reach their deadlines.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    auto_tick: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            auto_tick: Rc::new(Cell::new(1)),
        }
    }

    /// Jump the clock forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    /// Milliseconds added per `now_ms` read.
    pub fn set_auto_tick(&self, ms: u64) {
        self.auto_tick.set(ms);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get() + self.auto_tick.get();
        self.now.set(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopnet_core::InternalType;

    #[test]
    fn test_sim_radio_failure_injection() {
        let mut radio = SimRadio::new();
        let target = NodeId::new(3);
        radio.fail_sends_to(target);
        assert!(!radio.send(target, &[0u8; 8]));
        radio.restore_sends_to(target);
        assert!(radio.send(target, &[0u8; 8]));
        assert_eq!(radio.sent.len(), 2);
    }

    #[test]
    fn test_sim_radio_responder_round_trip() {
        let mut radio = SimRadio::new();
        radio.respond_with(|_to, msg| {
            if msg.internal_type() == Some(InternalType::Ping) {
                vec![Message::internal(msg.destination, msg.sender, InternalType::Pong)
                    .with_byte(1)]
            } else {
                vec![]
            }
        });

        let ping = Message::internal(NodeId::new(7), NodeId::GATEWAY, InternalType::Ping)
            .with_byte(1);
        let frame = wire::encode(&ping).unwrap();
        assert!(radio.send(NodeId::GATEWAY, &frame));
        assert!(radio.available());

        let mut buf = [0u8; 64];
        let len = radio.receive(&mut buf);
        let pong = wire::parse(&buf[..len]).unwrap();
        assert_eq!(pong.internal_type(), Some(InternalType::Pong));
    }

    #[test]
    fn test_manual_clock_auto_tick() {
        let clock = ManualClock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert_eq!(second, first + 1);

        clock.set_auto_tick(0);
        clock.advance(500);
        let third = clock.now_ms();
        assert_eq!(third, second + 500);
    }

    #[test]
    fn test_memory_store_defaults() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load_node_id().unwrap(), NodeId::AUTO);
        assert_eq!(
            store.load_parent().unwrap(),
            (NodeId::AUTO, DISTANCE_INVALID)
        );
        assert_eq!(store.load_route(NodeId::new(5)).unwrap(), None);
    }
}
