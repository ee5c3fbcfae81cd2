//! Newline-delimited JSON over any async byte stream

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::error::ProtocolError;
use super::messages::Message;
use super::traits::{MessageSink, MessageSource, ProtocolResult};

/// Reads one message per line
pub struct JsonLineSource<R> {
	reader: R,
	buf: String,
}

impl<R> JsonLineSource<R>
where
	R: AsyncBufRead + Unpin + Send,
{
	pub fn new(reader: R) -> Self {
		JsonLineSource { reader, buf: String::new() }
	}
}

#[async_trait]
impl<R> MessageSource for JsonLineSource<R>
where
	R: AsyncBufRead + Unpin + Send,
{
	async fn recv(&mut self) -> ProtocolResult<Option<Message>> {
		loop {
			self.buf.clear();
			let n = self.reader.read_line(&mut self.buf).await?;
			if n == 0 {
				return Ok(None);
			}

			let trimmed = self.buf.trim();
			if trimmed.is_empty() {
				continue;
			}
			return Message::decode(trimmed).map(Some);
		}
	}
}

/// Writes one message per line, flushing after each
pub struct JsonLineSink<W> {
	writer: W,
	closed: bool,
}

impl<W> JsonLineSink<W>
where
	W: AsyncWrite + Unpin + Send,
{
	pub fn new(writer: W) -> Self {
		JsonLineSink { writer, closed: false }
	}
}

#[async_trait]
impl<W> MessageSink for JsonLineSink<W>
where
	W: AsyncWrite + Unpin + Send,
{
	async fn send(&mut self, msg: &Message) -> ProtocolResult<()> {
		if self.closed {
			return Err(ProtocolError::Closed);
		}
		let mut line = msg.encode()?;
		line.push('\n');
		self.writer.write_all(line.as_bytes()).await?;
		self.writer.flush().await?;
		Ok(())
	}

	async fn close(&mut self) -> ProtocolResult<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.writer.flush().await?;
		self.writer.shutdown().await?;
		Ok(())
	}
}


// vim: ts=4
