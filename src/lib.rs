//! # Mirror - live two-way directory mirroring
//!
//! Mirror keeps two directory trees on two machines identical while both are
//! in use. A client connects to a server, both exchange full snapshots and
//! reconcile them (newer modification time wins), then every local change is
//! streamed to the peer until the connection ends.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mirror::{client, config::MirrorConfig, utils::shutdown_channel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (_tx, shutdown) = shutdown_channel();
//!     let config = Arc::new(MirrorConfig::default());
//!     let stats = client::connect("./dir".as_ref(), "server:7878", config, shutdown).await?;
//!     println!("Sent {} updates", stats.sent);
//!     Ok(())
//! }
//! ```
//!
//! ## In-process peers
//!
//! ```rust,ignore
//! use mirror::protocol::channel_pair;
//! use mirror::session::{client_handshake, server_handshake};
//!
//! let (mut a, mut b) = channel_pair(64);
//! // run server_handshake on `a` and client_handshake on `b` concurrently,
//! // then Session::run on each
//! ```

pub mod apply;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod queue;
pub mod reconcile;
pub mod scanner;
pub mod server;
pub mod session;
pub mod state;
pub mod symlink;
pub mod types;
pub mod util;
pub mod utils;
pub mod validation;
pub mod watcher;

// Re-export commonly used types
pub use config::{MirrorConfig, SessionPolicy};
pub use error::{ApplyError, HandshakeError, MirrorError, ScanError, WatchError};
pub use session::{Session, SessionStats};
pub use state::Snapshot;
pub use types::{EntryKind, PathEntry, Update};

// vim: ts=4
