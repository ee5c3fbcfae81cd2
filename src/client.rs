//! TCP client side of a mirror

use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::logging::*;
use crate::protocol::{JsonLineSink, JsonLineSource, MessageSink};
use crate::session::{client_handshake, SessionStats};

/// Connect to `addr`, handshake, and mirror `root` until the channel closes
/// or `shutdown` fires
pub async fn connect(
	root: &Path,
	addr: &str,
	config: Arc<MirrorConfig>,
	shutdown: watch::Receiver<bool>,
) -> Result<SessionStats, MirrorError> {
	debug!("Connecting to {}", addr);
	let stream = match tokio::time::timeout(config.connect_timeout(), TcpStream::connect(addr)).await
	{
		Ok(Ok(stream)) => stream,
		Ok(Err(e)) => {
			return Err(MirrorError::ConnectionFailed { address: addr.to_string(), source: e })
		}
		Err(_) => {
			return Err(MirrorError::ConnectionFailed {
				address: addr.to_string(),
				source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
			})
		}
	};
	stream.set_nodelay(true)?;

	let (read, write) = stream.into_split();
	let mut source = JsonLineSource::new(BufReader::new(read));
	let mut sink = JsonLineSink::new(write);

	let session = match client_handshake(root, config, &mut source, &mut sink).await {
		Ok(session) => session,
		Err(e) => {
			let _ = sink.close().await;
			return Err(e.into());
		}
	};
	info!("Session {} established with {}", session.id(), addr);
	session.run(source, sink, shutdown).await
}

// vim: ts=4
