//! # poly-comm
//!
//! A polymorphic multi-transport messaging core. One `Endpoint` type fronts
//! several interchangeable transports (an in-process channel, POSIX message
//! queues, ZeroMQ, and newline-delimited ascii/table files) behind a single
//! multipart-framed send/recv protocol, with client/server RPC overlays atop
//! any of them.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod framing;
pub mod header;
pub mod logging;
pub mod registry;
pub mod rpc;
pub mod serializer;
pub mod transport;
pub mod variadic;

pub use config::Config;
pub use endpoint::{CommKind, Direction, Endpoint};
pub use error::{CommError, CommResult, RecvOutcome};
pub use registry::Runtime;
pub use serializer::Serializer;
pub use transport::TransportKind;
pub use variadic::Value;

/// The current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
