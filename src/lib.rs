//! Desktop client for the Nexus chat backend.
//!
//! Rooms are created and joined over REST; live messages flow over a STOMP
//! subscription carried on a WebSocket.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod ui;

pub use error::{ChatError, Result};
