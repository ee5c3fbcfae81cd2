//! Initial exchange of snapshots
//!
//! The client sends `INIT` with its snapshot, the server answers `STATE`
//! with its own, and both sides reconcile the pair independently. Any
//! failure here ends the connection attempt before a session exists; where
//! the channel still works the peer is told why with an `ERR`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Session;
use crate::config::MirrorConfig;
use crate::error::{HandshakeError, ScanError};
use crate::logging::*;
use crate::protocol::{snapshot_from_wire, Message, MessageSink, MessageSource, WireEntry};
use crate::scanner;
use crate::state::Snapshot;

/// Serve one handshake: wait for `INIT`, reply with `STATE`
pub async fn server_handshake<S, K>(
	root: &Path,
	config: Arc<MirrorConfig>,
	source: &mut S,
	sink: &mut K,
) -> Result<Session, HandshakeError>
where
	S: MessageSource + ?Sized,
	K: MessageSink + ?Sized,
{
	let result = async {
		let state = expect_state(&mut *source, "INIT").await?;
		let remote = parse_state(&state)?;
		let local = scan_root(root).await?;
		Ok::<_, HandshakeError>((local, remote))
	}
	.await;

	let (local, remote) = match result {
		Ok(pair) => pair,
		Err(e) => return Err(report(sink, e).await),
	};

	sink.send(&Message::state(&local)).await?;
	Ok(Session::establish(root, config, local, &remote))
}

/// Open a session: send `INIT`, wait for `STATE`
pub async fn client_handshake<S, K>(
	root: &Path,
	config: Arc<MirrorConfig>,
	source: &mut S,
	sink: &mut K,
) -> Result<Session, HandshakeError>
where
	S: MessageSource + ?Sized,
	K: MessageSink + ?Sized,
{
	let local = scan_root(root).await?;
	sink.send(&Message::init(&local)).await?;

	let remote = match expect_state(source, "STATE").await {
		Ok(state) => parse_state(&state),
		Err(e) => Err(e),
	};
	let remote = match remote {
		Ok(remote) => remote,
		Err(e) => return Err(report(sink, e).await),
	};

	Ok(Session::establish(root, config, local, &remote))
}

/// Receive the snapshot-carrying message the handshake expects next
async fn expect_state<S>(source: &mut S, expected: &'static str) -> Result<Vec<WireEntry>, HandshakeError>
where
	S: MessageSource + ?Sized,
{
	match source.recv().await? {
		Some(Message::Init { state }) if expected == "INIT" => Ok(state),
		Some(Message::State { state }) if expected == "STATE" => Ok(state),
		Some(Message::Err { msg }) => Err(HandshakeError::Rejected { message: msg }),
		Some(other) => {
			Err(HandshakeError::UnexpectedMessage { expected, got: other.name().to_string() })
		}
		None => Err(HandshakeError::Disconnected),
	}
}

fn parse_state(state: &[WireEntry]) -> Result<Snapshot, HandshakeError> {
	let snapshot = snapshot_from_wire(state)
		.map_err(|e| HandshakeError::MalformedState { message: e.to_string() })?;
	snapshot.validate()?;
	Ok(snapshot)
}

async fn scan_root(root: &Path) -> Result<Snapshot, HandshakeError> {
	let owned: PathBuf = root.to_path_buf();
	let report = tokio::task::spawn_blocking(move || scanner::scan(&owned))
		.await
		.map_err(|e| ScanError::RootUnreadable {
			path: root.display().to_string(),
			source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
		})??;

	for warning in &report.warnings {
		warn!("{}", warning);
	}
	debug!("Scanned {} paths under {}", report.snapshot.len(), root.display());
	Ok(report.snapshot)
}

/// Tell the peer why the handshake failed, unless it already knows
async fn report<K>(sink: &mut K, err: HandshakeError) -> HandshakeError
where
	K: MessageSink + ?Sized,
{
	let notify = !matches!(
		err,
		HandshakeError::Rejected { .. } | HandshakeError::Disconnected | HandshakeError::Protocol(_)
	);
	if notify {
		if let Err(e) = sink.send(&Message::error(err.to_string())).await {
			debug!("Cannot report handshake failure: {}", e);
		}
	}
	err
}


// vim: ts=4
