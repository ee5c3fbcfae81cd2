//! Shutdown signalling
//!
//! Shutdown is a `watch` channel of `bool`: the process shell flips it on
//! SIGINT/SIGTERM, and the server, the client and every session wait on
//! their own receiver.

use tokio::sync::watch;
use tracing::{debug, warn};

/// Sender and receiver of a fresh shutdown flag
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
	watch::channel(false)
}

/// Resolve once the flag is set
///
/// A dropped sender never requests shutdown.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
	while !*rx.borrow_and_update() {
		if rx.changed().await.is_err() {
			std::future::pending::<()>().await;
		}
	}
}

/// Set the flag on the first SIGINT or SIGTERM
pub fn forward_signals(tx: watch::Sender<bool>) {
	tokio::spawn(async move {
		use tokio::signal;

		let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
				return;
			}
		};

		let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
				return;
			}
		};

		tokio::select! {
			_ = sigterm.recv() => debug!("Received SIGTERM, shutting down..."),
			_ = sigint.recv() => debug!("Received SIGINT, shutting down..."),
		}
		let _ = tx.send(true);
	});
}


// vim: ts=4
