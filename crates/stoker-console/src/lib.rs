//! # Stoker Console
//!
//! Fan-out broadcasting of console output and resource samples to any
//! number of heterogeneous clients (WebSocket, Telnet, RCON sessions,
//! in-process observers).
//!
//! Each hub serializes all mutation through a single control task, so
//! buffer updates and multi-client delivery never race: two concurrent
//! publishers can never interleave their lines at a single sink. A
//! sink that fails a delivery is dropped without retry; releasing its
//! transport resources is the registrant's business.

pub mod hub;
pub mod sink;
pub mod stats;

pub use hub::{ConsoleHub, SinkId, CONSOLE_BUFFER_LINES};
pub use sink::{ConsoleSink, StatsSink, WriterSink};
pub use stats::{ProcessStats, StatsHub};
