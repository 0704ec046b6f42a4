pub mod client;
pub mod rest;
pub mod stomp;
pub mod transport;

pub use client::{BrokerConnection, BrokerEvent};
pub use rest::RoomService;
