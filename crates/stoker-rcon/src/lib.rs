//! # Stoker RCON
//!
//! Source-compatible RCON endpoint for every managed instance behind a
//! single listener. Sessions authenticate with `password#instanceID`
//! to bind themselves to one instance, then issue commands that are
//! written straight to that instance's console.
//!
//! Command output is not captured into the reply; it flows to console
//! subscribers through the fan-out layer instead, so RCON replies to
//! successful commands carry an empty body.

pub mod packet;
pub mod server;

pub use packet::{
    encode, read_packet, write_packet, Packet, MAX_PACKET_SIZE, MIN_PACKET_SIZE, SERVERDATA_AUTH,
    SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};
pub use server::{InstanceDirectory, PasswordVerifier, RconServer};
