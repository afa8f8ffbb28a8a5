//! Transport core of the hopnet sensor mesh.
//!
//! Brings a node from power-on to a state in which application messages
//! can be exchanged with the gateway, and keeps it there across lost
//! parents, changing topology, and radio faults. The hardware and host
//! services it depends on (radio, persistent store, clock, signer) are
//! ports defined in [`traits`].
//!
//! Execution is single-threaded and cooperative: the host calls
//! [`Transport::process`] in its main loop; each call drains the radio
//! FIFO (bounded) and then runs one state-machine update. There are no
//! background tasks.

pub mod config;
pub mod constants;
pub mod error;
pub mod routing;
pub mod state;
pub mod testing;
pub mod traits;

mod machine;
mod support;
mod transport;

pub use config::TransportConfig;
pub use error::SendError;
pub use routing::RoutingTable;
pub use state::{StateVars, TransportState};
pub use support::UplinkCheck;
pub use traits::{
    Clock, DropHandler, MessageHandler, NoSigning, PersistentStore, RadioDriver, Signer,
};
pub use transport::Transport;
