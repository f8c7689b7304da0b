//! kvault - an in-memory, multi-datatype key-value server
//!
//! A streaming, recursive, line-oriented wire protocol in the Redis family
//! (`+ - : $ ^ @ * % &` tags) fronting a keyspace of scalars, hashes,
//! queues, and sets, with lazy expiry and a delayed-delivery schedule.
//!
//! # Features
//! - **Recursive framing**: self-describing, backtracking decoder that
//!   never consumes a partial frame from the connection buffer
//! - **Multiple datatypes**: bare scalars, hashes, queues (lists), and sets,
//!   inferred from the shape of the request payload
//! - **Lazy expiry**: keys carry an optional deadline, swept on access and
//!   opportunistically in the background
//! - **Delayed delivery**: a schedule of `(timestamp, payload)` entries,
//!   drained in due order via `READ`
//! - **Snapshots**: `SAVE`/`RESTORE`/`MERGE` persist and reload the whole
//!   keyspace and schedule to a file using the same wire codec
//!
//! # Quick Start
//! ```rust,no_run
//! use kvault::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:31337".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let server = Server::new(config);
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod store;

pub use config::Cli;
pub use dispatch::{Dispatcher, Engine, Outcome, Stats};
pub use error::CommandError;
pub use protocol::{Frame, FrameCodec, FrameError, ProtocolError};
pub use server::{Server, ServerConfig};
pub use store::{Scalar, Store, Tag, Value};

/// Crate version, as reported by the `INFO` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
