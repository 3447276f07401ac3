//! Library crate for bridge-poll: discovery, long-poll transport and session control
//! for a local event bridge.
pub mod config;
pub mod cursor;
pub mod error;
pub mod ports;
pub mod probe;
pub mod recovery;
pub mod resolver;
pub mod server;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;
