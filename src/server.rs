//! TCP server side of a mirror
//!
//! Accepts peers on a listener and runs at most one session at a time. A
//! peer arriving while a session is active is handled by the configured
//! [`SessionPolicy`]: `replace` stops the running session and waits for it
//! before the newcomer's handshake starts, `reject` answers with `ERR`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{MirrorConfig, SessionPolicy};
use crate::error::MirrorError;
use crate::logging::*;
use crate::protocol::{JsonLineSink, JsonLineSource, Message, MessageSink, MessageSource};
use crate::session::{server_handshake, SessionStats};
use crate::utils::{shutdown_channel, shutdown_requested};

const REJECT_LINGER: Duration = Duration::from_secs(5);

/// The session currently holding the root
struct ActiveSession {
	peer: SocketAddr,
	stop: watch::Sender<bool>,
	handle: JoinHandle<Result<SessionStats, MirrorError>>,
}

impl ActiveSession {
	async fn stop(self) {
		let _ = self.stop.send(true);
		match self.handle.await {
			Ok(Ok(_)) => {}
			Ok(Err(e)) => debug!("Session with {} ended with error: {}", self.peer, e),
			Err(e) => warn!("Session task with {} failed: {}", self.peer, e),
		}
	}
}

pub struct Server {
	root: PathBuf,
	config: Arc<MirrorConfig>,
	listener: TcpListener,
	active: Option<ActiveSession>,
}

impl Server {
	/// Bind to `addr` and create server
	pub async fn bind(
		root: impl Into<PathBuf>,
		config: Arc<MirrorConfig>,
		addr: &str,
	) -> Result<Self, MirrorError> {
		let root = root.into();
		if !root.is_dir() {
			return Err(MirrorError::InvalidConfig {
				message: format!("{} is not a directory", root.display()),
			});
		}

		let listener = TcpListener::bind(addr).await?;
		info!("Serving {} on {}", root.display(), listener.local_addr()?);
		Ok(Server { root, config, listener, active: None })
	}

	pub fn local_addr(&self) -> Result<SocketAddr, MirrorError> {
		Ok(self.listener.local_addr()?)
	}

	/// Accept peers until `shutdown` fires, then stop the active session
	pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), MirrorError> {
		loop {
			tokio::select! {
				_ = shutdown_requested(&mut shutdown) => break,
				accepted = self.listener.accept() => match accepted {
					Ok((stream, peer)) => self.admit(stream, peer).await,
					Err(e) => warn!("Accept failed: {}", e),
				},
			}
		}

		if let Some(active) = self.active.take() {
			info!("Stopping session with {}", active.peer);
			active.stop().await;
		}
		info!("Server stopped");
		Ok(())
	}

	async fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
		debug!("Incoming connection from {}", peer);
		if self.active.as_ref().map_or(false, |a| a.handle.is_finished()) {
			self.active = None;
		}

		if let Some(active) = self.active.take() {
			match self.config.session_policy {
				SessionPolicy::Reject => {
					warn!("Rejecting {}: session with {} is active", peer, active.peer);
					self.active = Some(active);
					tokio::spawn(reject(stream, peer));
					return;
				}
				SessionPolicy::Replace => {
					info!("Replacing session with {} by {}", active.peer, peer);
					active.stop().await;
				}
			}
		}

		let (stop, stop_rx) = shutdown_channel();
		let handle = tokio::spawn(serve_connection(
			stream,
			peer,
			self.root.clone(),
			self.config.clone(),
			stop_rx,
		));
		self.active = Some(ActiveSession { peer, stop, handle });
	}
}

/// Bind on all interfaces at the configured port and serve until shutdown
pub async fn serve(
	root: &Path,
	config: Arc<MirrorConfig>,
	shutdown: watch::Receiver<bool>,
) -> Result<(), MirrorError> {
	let addr = format!("0.0.0.0:{}", config.port);
	Server::bind(root, config, &addr).await?.run(shutdown).await
}

async fn serve_connection(
	stream: TcpStream,
	peer: SocketAddr,
	root: PathBuf,
	config: Arc<MirrorConfig>,
	stop: watch::Receiver<bool>,
) -> Result<SessionStats, MirrorError> {
	let (read, write) = stream.into_split();
	let mut source = JsonLineSource::new(BufReader::new(read));
	let mut sink = JsonLineSink::new(write);

	let session = match server_handshake(&root, config, &mut source, &mut sink).await {
		Ok(session) => session,
		Err(e) => {
			warn!("Handshake with {} failed: {}", peer, e);
			let _ = sink.close().await;
			return Err(e.into());
		}
	};
	info!("Session {} started with {}", session.id(), peer);
	session.run(source, sink, stop).await
}

async fn reject(stream: TcpStream, peer: SocketAddr) {
	let (read, write) = stream.into_split();
	let mut sink = JsonLineSink::new(write);
	if let Err(e) = sink.send(&Message::error("another session is active")).await {
		debug!("Cannot send rejection to {}: {}", peer, e);
	}
	let _ = sink.close().await;

	// wait for the peer to hang up so unread input does not reset the
	// connection before the error is read
	let mut source = JsonLineSource::new(BufReader::new(read));
	let drain = async { while let Ok(Some(_)) = source.recv().await {} };
	let _ = tokio::time::timeout(REJECT_LINGER, drain).await;
}

// vim: ts=4
