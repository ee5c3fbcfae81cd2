//! Channel abstraction between two peers
//!
//! A session only ever talks to a [`MessageSource`] and a [`MessageSink`],
//! so the same engine runs over TCP and over in-process channels.

use async_trait::async_trait;

use super::error::ProtocolError;
use super::messages::Message;

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Inbound half of a channel
#[async_trait]
pub trait MessageSource: Send {
	/// Next message, or None at end of stream
	async fn recv(&mut self) -> ProtocolResult<Option<Message>>;
}

/// Outbound half of a channel
#[async_trait]
pub trait MessageSink: Send {
	async fn send(&mut self, msg: &Message) -> ProtocolResult<()>;

	/// Flush and close; further sends fail
	async fn close(&mut self) -> ProtocolResult<()>;
}

// vim: ts=4
