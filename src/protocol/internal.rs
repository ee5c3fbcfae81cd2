//! In-process channel using tokio mpsc
//!
//! Messages are passed as values, so both ends see exactly what the other
//! side sent without a serialization step.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ProtocolError;
use super::messages::Message;
use super::traits::{MessageSink, MessageSource, ProtocolResult};

/// Receiving end of an in-process channel
pub struct ChannelSource {
	rx: mpsc::Receiver<Message>,
}

/// Sending end of an in-process channel
pub struct ChannelSink {
	tx: Option<mpsc::Sender<Message>>,
}

/// Both halves of one side of an in-process connection
pub struct ChannelEnd {
	pub source: ChannelSource,
	pub sink: ChannelSink,
}

/// Two connected ends; what one sends the other receives
pub fn channel_pair(buffer: usize) -> (ChannelEnd, ChannelEnd) {
	let (a_tx, a_rx) = mpsc::channel(buffer);
	let (b_tx, b_rx) = mpsc::channel(buffer);
	(
		ChannelEnd { source: ChannelSource { rx: b_rx }, sink: ChannelSink { tx: Some(a_tx) } },
		ChannelEnd { source: ChannelSource { rx: a_rx }, sink: ChannelSink { tx: Some(b_tx) } },
	)
}

#[async_trait]
impl MessageSource for ChannelSource {
	async fn recv(&mut self) -> ProtocolResult<Option<Message>> {
		Ok(self.rx.recv().await)
	}
}

#[async_trait]
impl MessageSink for ChannelSink {
	async fn send(&mut self, msg: &Message) -> ProtocolResult<()> {
		let tx = self.tx.as_ref().ok_or(ProtocolError::Closed)?;
		tx.send(msg.clone()).await.map_err(|_| ProtocolError::Closed)
	}

	async fn close(&mut self) -> ProtocolResult<()> {
		self.tx = None;
		Ok(())
	}
}


// vim: ts=4
