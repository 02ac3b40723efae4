//! Background worker that provisions an embedded Python, runs one program
//! producing a Panel/Bokeh document, and keeps that document in sync with a
//! host over an NDJSON message protocol.

pub mod bridge;
pub mod config;
pub mod error;
pub mod execution;
pub mod process;
pub mod program;
pub mod protocol;
pub mod provision;
pub mod router;

pub use error::{EnvError, WorkerError};
pub use protocol::{InboundMessage, OutboundMessage, Outbox};
pub use router::{MessageRouter, Phase};
