//! Line protocol between two peers
//!
//! The session engine depends only on the [`MessageSource`] and
//! [`MessageSink`] traits. Two transports implement them:
//! [`JsonLineSource`]/[`JsonLineSink`] over any async byte stream (TCP in
//! production) and [`internal::channel_pair`] for in-process peers.
//!
//! # Example Usage
//!
//! ```ignore
//! use mirror::protocol::{JsonLineSink, JsonLineSource, Message, MessageSink};
//!
//! let (read, write) = stream.into_split();
//! let mut sink = JsonLineSink::new(write);
//! sink.send(&Message::Quit).await?;
//! ```

pub mod error;
pub mod internal;
pub mod json_lines;
pub mod messages;
pub mod traits;

// Re-export public API
pub use error::ProtocolError;
pub use internal::{channel_pair, ChannelEnd, ChannelSink, ChannelSource};
pub use json_lines::{JsonLineSink, JsonLineSource};
pub use messages::{snapshot_from_wire, Message, WireEntry};
pub use traits::{MessageSink, MessageSource, ProtocolResult};

// vim: ts=4
