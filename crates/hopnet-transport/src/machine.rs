//! State transition and update actions.
//!
//! Each state has a transition action, run once on entry, and an update
//! action, run on every `process` tick until the state changes. The
//! dispatch lives here; the heavy lifting (routing, pings, FIFO handling)
//! is in the support functions.

use hopnet_core::constants::{DISTANCE_INVALID, INVALID_HOPS};
use hopnet_core::{InternalType, Message, NodeId};

use crate::constants::{
    CHKUPL_INTERVAL_MS, SANITY_CHECK_INTERVAL_MS, STATE_RETRIES, STATE_TIMEOUT_MS,
    TIMEOUT_FAILURE_STATE_MS,
};
use crate::state::TransportState;
use crate::support::UplinkCheck;
use crate::traits::{Clock, MessageHandler, PersistentStore, RadioDriver, Signer};
use crate::transport::Transport;

impl<R, S, C, G, H> Transport<R, S, C, G, H>
where
    R: RadioDriver,
    S: PersistentStore,
    C: Clock,
    G: Signer,
    H: MessageHandler,
{
    /// Run the current state's transition action.
    pub(crate) fn run_transition(&mut self) {
        match self.vars.state {
            TransportState::Init => self.init_transition(),
            TransportState::FindParent => self.find_parent_transition(),
            TransportState::AcquireId => self.acquire_id_transition(),
            TransportState::Uplink => self.uplink_transition(),
            TransportState::Ready => self.ready_transition(),
            TransportState::Failure => self.failure_transition(),
        }
    }

    /// Run the current state's update action.
    pub(crate) fn run_update(&mut self) {
        match self.vars.state {
            // INIT's transition always decides the next state itself.
            TransportState::Init => {}
            TransportState::FindParent => self.find_parent_update(),
            TransportState::AcquireId => self.acquire_id_update(),
            TransportState::Uplink => self.uplink_update(),
            TransportState::Ready => self.ready_update(),
            TransportState::Failure => self.failure_update(),
        }
    }

    // -----------------------------------------------------------------------
    // INIT
    // -----------------------------------------------------------------------

    fn init_transition(&mut self) {
        tracing::info!("initializing transport");
        self.vars.finding_parent = false;
        self.vars.preferred_parent_found = false;
        self.vars.uplink_ok = false;
        self.vars.ping_active = false;
        self.vars.transport_active = false;
        self.vars.failed_uplink_transmissions = 0;
        self.vars.ping_response = INVALID_HOPS;

        if !self.radio.init() {
            tracing::error!("radio initialization failed");
            self.switch_state(TransportState::Failure);
            return;
        }

        if self.config.gateway {
            self.node_id = NodeId::GATEWAY;
            self.parent = NodeId::GATEWAY;
            self.distance = 0;
            self.radio.set_address(NodeId::GATEWAY);
            tracing::info!("gateway mode");
            self.switch_state(TransportState::Ready);
            return;
        }

        // Remembered identity and topology from the last run.
        match self.store.load_parent() {
            Ok((parent, distance)) => {
                self.parent = parent;
                self.distance = distance;
            }
            Err(e) => tracing::warn!(error = %e, "parent load failed"),
        }

        self.node_id = match self.config.node_id {
            Some(id) => {
                tracing::info!(node_id = %id, "static node id");
                if let Err(e) = self.store.store_node_id(id) {
                    tracing::warn!(error = %e, "node id store failed");
                }
                id
            }
            None => match self.store.load_node_id() {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(error = %e, "node id load failed");
                    NodeId::AUTO
                }
            },
        };

        self.radio.set_address(self.node_id);
        self.switch_state(TransportState::FindParent);
    }

    // -----------------------------------------------------------------------
    // FIND_PARENT
    // -----------------------------------------------------------------------

    fn find_parent_transition(&mut self) {
        self.vars.uplink_ok = false;
        self.vars.preferred_parent_found = false;
        self.vars.failed_uplink_transmissions = 0;

        if let Some(parent) = self.config.parent {
            tracing::info!(%parent, "static parent configured, skipping search");
            if self.parent != parent {
                self.distance = DISTANCE_INVALID;
            }
            self.parent = parent;
            self.vars.finding_parent = false;
            self.switch_state(TransportState::AcquireId);
            return;
        }

        self.parent = NodeId::AUTO;
        self.distance = DISTANCE_INVALID;
        self.vars.finding_parent = true;

        tracing::debug!("broadcasting find-parent request");
        let request =
            Message::internal(self.node_id, NodeId::BROADCAST, InternalType::FindParentRequest);
        if let Err(e) = self.route(request) {
            tracing::warn!(error = %e, "find-parent broadcast failed");
        }
    }

    fn find_parent_update(&mut self) {
        if self.time_in_state() < STATE_TIMEOUT_MS && !self.vars.preferred_parent_found {
            return;
        }
        self.vars.finding_parent = false;

        if self.parent != NodeId::AUTO {
            tracing::info!(parent = %self.parent, distance = self.distance, "parent selected");
            if let Err(e) = self.store.store_parent(self.parent, self.distance) {
                tracing::warn!(error = %e, "parent store failed");
            }
            self.switch_state(TransportState::AcquireId);
        } else if self.vars.retries < STATE_RETRIES {
            tracing::warn!("no parent replied, retrying");
            self.switch_state(TransportState::FindParent);
        } else {
            tracing::error!("parent search exhausted");
            self.switch_state(TransportState::Failure);
        }
    }

    // -----------------------------------------------------------------------
    // ACQUIRE_ID
    // -----------------------------------------------------------------------

    fn acquire_id_transition(&mut self) {
        if self.node_id != NodeId::AUTO {
            tracing::info!(node_id = %self.node_id, "node id valid");
            self.switch_state(TransportState::Uplink);
            return;
        }
        tracing::debug!("requesting node id from controller");
        let request = Message::internal(NodeId::AUTO, NodeId::GATEWAY, InternalType::IdRequest);
        if let Err(e) = self.route(request) {
            tracing::warn!(error = %e, "id request not sent");
        }
    }

    fn acquire_id_update(&mut self) {
        if self.node_id != NodeId::AUTO {
            self.switch_state(TransportState::Uplink);
            return;
        }
        if self.time_in_state() < STATE_TIMEOUT_MS {
            return;
        }
        if self.vars.retries < STATE_RETRIES {
            tracing::warn!("no id response, retrying");
            self.switch_state(TransportState::AcquireId);
        } else {
            tracing::error!("id acquisition exhausted");
            self.switch_state(TransportState::Failure);
        }
    }

    // -----------------------------------------------------------------------
    // UPLINK
    // -----------------------------------------------------------------------

    fn uplink_transition(&mut self) {
        self.vars.uplink_ok = self.check_uplink(true).is_ok();
    }

    fn uplink_update(&mut self) {
        if self.vars.uplink_ok {
            tracing::info!("uplink verified");
            self.switch_state(TransportState::Ready);
        } else if self.vars.retries < STATE_RETRIES {
            tracing::warn!("uplink check failed, retrying");
            self.switch_state(TransportState::Uplink);
        } else {
            tracing::error!("uplink verification exhausted");
            self.switch_state(TransportState::Failure);
        }
    }

    // -----------------------------------------------------------------------
    // READY
    // -----------------------------------------------------------------------

    fn ready_transition(&mut self) {
        tracing::info!(node_id = %self.node_id, parent = %self.parent, "transport ready");
        self.vars.transport_active = true;
        self.vars.uplink_ok = true;
        self.vars.failed_uplink_transmissions = 0;
    }

    fn ready_update(&mut self) {
        if self.vars.failed_uplink_transmissions >= self.config.transmission_failures() {
            if self.config.auto_find_parent() {
                tracing::warn!("too many failed uplink transmissions, searching new parent");
                self.switch_state(TransportState::FindParent);
            } else {
                tracing::warn!("too many failed uplink transmissions, static parent enforced");
                self.vars.failed_uplink_transmissions = 0;
            }
            return;
        }

        let now = self.clock.now_ms();

        if !self.config.gateway
            && now.saturating_sub(self.vars.last_uplink_check_ms) >= CHKUPL_INTERVAL_MS
        {
            if self.check_uplink(false) == UplinkCheck::Failed {
                self.vars.failed_uplink_transmissions =
                    self.vars.failed_uplink_transmissions.saturating_add(1);
            }
        }

        if now.saturating_sub(self.vars.last_sanity_check_ms) >= SANITY_CHECK_INTERVAL_MS {
            self.vars.last_sanity_check_ms = now;
            self.invoke_sanity_check();
        }
    }

    // -----------------------------------------------------------------------
    // FAILURE
    // -----------------------------------------------------------------------

    fn failure_transition(&mut self) {
        tracing::warn!("transport failure");
        self.vars.uplink_ok = false;
        self.vars.transport_active = false;
        self.vars.finding_parent = false;
        self.vars.ping_active = false;
        tracing::debug!("powering down radio");
        self.radio.power_down();
    }

    fn failure_update(&mut self) {
        if self.time_in_state() >= TIMEOUT_FAILURE_STATE_MS {
            tracing::info!("re-initializing transport");
            self.switch_state(TransportState::Init);
        }
    }
}
