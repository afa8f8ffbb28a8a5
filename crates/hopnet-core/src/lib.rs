//! Core types, constants, and the wire codec for the hopnet sensor mesh.
//!
//! This crate defines the addressing model, the message envelope the
//! transport routes, and the packed radio frame format. It carries no
//! policy: routing, state handling, and persistence live in
//! `hopnet-transport`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod message;
pub mod types;
pub mod wire;

pub use error::WireError;
pub use message::{Command, InternalType, Message, PayloadType};
pub use types::NodeId;
