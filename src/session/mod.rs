//! One live mirror between the local tree and one peer
//!
//! A [`Session`] is created by a successful handshake and owns everything
//! mutable about the pairing: the local snapshot, the remembered peer
//! fingerprints and the outbound queue. [`Session::run`] drives four
//! concurrent paths until the channel closes, a fatal error occurs or
//! shutdown is requested:
//!
//! - the watcher rescans the root and enqueues local changes
//! - the reader decodes inbound updates into a bounded channel
//! - the applier judges and applies them one at a time
//! - the writer drains the queue onto the outbound channel
//!
//! All of them share one lock over [`SessionState`]; it is held for a single
//! path-level operation and never across a network send.

pub mod handshake;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs as afs;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::apply::Applier;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, WatchError};
use crate::logging::*;
use crate::protocol::{Message, MessageSink, MessageSource, ProtocolError, WireEntry};
use crate::queue::SyncQueue;
use crate::reconcile::{directory_mtime, judge_incoming, reconcile, Reconciliation, Verdict};
use crate::state::Snapshot;
use crate::types::{EntryKind, PathEntry, Update};
use crate::util;
use crate::utils::shutdown_requested;
use crate::watcher::Watcher;

pub use handshake::{client_handshake, server_handshake};
pub use state::{SessionState, SessionStats};

/// How long a stopping session waits for the update in flight
const WRITER_DRAIN: Duration = Duration::from_secs(10);

pub struct Session {
	id: Uuid,
	root: PathBuf,
	config: Arc<MirrorConfig>,
	state: Arc<Mutex<SessionState>>,
	queue: Arc<SyncQueue>,
}

/// Why the steady-state loop stopped
enum End {
	Watcher(Result<Result<(), WatchError>, tokio::task::JoinError>),
	Reader(Result<Result<(), ProtocolError>, tokio::task::JoinError>),
	Writer(Result<(), ProtocolError>),
	Shutdown,
}

impl Session {
	/// Build a session from the two handshake snapshots
	///
	/// Only the paths this side wins are queued; the peer computes the
	/// mirror image and sends the rest.
	pub fn establish(
		root: impl Into<PathBuf>,
		config: Arc<MirrorConfig>,
		local: Snapshot,
		remote: &Snapshot,
	) -> Self {
		let id = Uuid::new_v4();
		let plan = reconcile(&local, remote);
		info!(
			"Session {}: sending {}, receiving {}, {} in sync",
			id,
			plan.to_send.len(),
			plan.to_receive.len(),
			plan.in_sync.len()
		);

		let mut state = SessionState::new(local);
		let queue = SyncQueue::new();
		seed(&mut state, &queue, plan);

		Session {
			id,
			root: root.into(),
			config,
			state: Arc::new(Mutex::new(state)),
			queue: Arc::new(queue),
		}
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Entries queued for the peer
	pub fn pending(&self) -> usize {
		self.queue.len()
	}

	/// Run until the peer leaves, a fatal error occurs or `shutdown` fires
	pub async fn run<S, K>(
		self,
		source: S,
		sink: K,
		shutdown: watch::Receiver<bool>,
	) -> Result<SessionStats, MirrorError>
	where
		S: MessageSource + 'static,
		K: MessageSink,
	{
		let span = tracing::info_span!("session", id = %self.id);
		self.run_inner(source, sink, shutdown).instrument(span).await
	}

	async fn run_inner<S, K>(
		self,
		source: S,
		mut sink: K,
		mut shutdown: watch::Receiver<bool>,
	) -> Result<SessionStats, MirrorError>
	where
		S: MessageSource + 'static,
		K: MessageSink,
	{
		let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_buffer);
		let (stop_tx, stop_rx) = watch::channel(false);

		let watcher = Watcher::new(
			self.root.clone(),
			self.config.poll_interval(),
			self.state.clone(),
			self.queue.clone(),
		);
		let mut watch_task = tokio::spawn(watcher.run().in_current_span());
		let mut read_task = tokio::spawn(read_loop(source, inbound_tx).in_current_span());
		let apply_task: JoinHandle<()> = tokio::spawn(
			apply_loop(
				inbound_rx,
				stop_rx,
				Applier::new(self.root.clone()),
				self.state.clone(),
				self.queue.clone(),
			)
			.in_current_span(),
		);

		let (writer_stop_tx, writer_stop_rx) = watch::channel(false);
		let (end, sink_clean) = {
			let writer = write_loop(&mut sink, &self.root, &self.state, &self.queue, writer_stop_rx);
			tokio::pin!(writer);
			let end = tokio::select! {
				r = &mut watch_task => End::Watcher(r),
				r = &mut read_task => End::Reader(r),
				r = &mut writer => End::Writer(r),
				_ = shutdown_requested(&mut shutdown) => End::Shutdown,
			};

			// let an update already on the wire finish before anything else
			// is written to the sink
			let sink_clean = match end {
				End::Writer(_) => false,
				_ => {
					let _ = writer_stop_tx.send(true);
					match tokio::time::timeout(WRITER_DRAIN, &mut writer).await {
						Ok(Ok(())) => true,
						Ok(Err(e)) => {
							debug!("Writer failed while stopping: {}", e);
							false
						}
						Err(_) => {
							warn!("Peer stopped reading; dropping the update in flight");
							false
						}
					}
				}
			};
			(end, sink_clean)
		};

		watch_task.abort();
		read_task.abort();
		self.queue.close();

		let result = match end {
			End::Reader(Ok(Ok(()))) => {
				// peer is done; apply what it already sent
				let _ = apply_task.await;
				Ok(())
			}
			other => {
				let _ = stop_tx.send(true);
				let _ = apply_task.await;
				match other {
					End::Shutdown => {
						debug!("Shutdown requested");
						if sink_clean {
							let _ = sink.send(&Message::Quit).await;
						}
						Ok(())
					}
					End::Watcher(Ok(Err(e))) => {
						if sink_clean {
							let _ = sink.send(&Message::error(e.to_string())).await;
						}
						Err(MirrorError::Watch(e))
					}
					End::Reader(Ok(Err(e))) | End::Writer(Err(e)) => Err(MirrorError::Protocol(e)),
					End::Watcher(Err(e)) | End::Reader(Err(e)) => {
						Err(MirrorError::Task { message: e.to_string() })
					}
					End::Watcher(Ok(Ok(()))) | End::Writer(Ok(())) | End::Reader(Ok(Ok(()))) => {
						Ok(())
					}
				}
			}
		};
		let _ = sink.close().await;

		let stats = self.state.lock().await.stats;
		match &result {
			Ok(()) => info!("Session ended: {}", stats),
			Err(e) => warn!("Session failed: {} ({})", e, stats),
		}
		result.map(|()| stats)
	}
}

/// Queue what this side wins and remember what both sides already agree on
fn seed(state: &mut SessionState, queue: &SyncQueue, plan: Reconciliation) {
	for path in &plan.in_sync {
		if let Some(entry) = state.snapshot.get(path).cloned() {
			state.remember(&entry);
		}
	}
	for entry in plan.to_send {
		state.remember(&entry);
		queue.push(entry);
	}
}

async fn read_loop<S>(mut source: S, inbound: mpsc::Sender<Update>) -> Result<(), ProtocolError>
where
	S: MessageSource,
{
	loop {
		match source.recv().await? {
			None => {
				debug!("Peer closed the stream");
				return Ok(());
			}
			Some(Message::Quit) => {
				debug!("Peer quit");
				return Ok(());
			}
			Some(Message::Upd(wire)) => {
				let update = wire.into_update()?;
				if inbound.send(update).await.is_err() {
					return Ok(());
				}
			}
			Some(Message::Err { msg }) => return Err(ProtocolError::Remote(msg)),
			Some(other) => {
				return Err(ProtocolError::ProtocolViolation(format!(
					"Unexpected {} message after handshake",
					other.name()
				)))
			}
		}
	}
}

async fn apply_loop(
	mut inbound: mpsc::Receiver<Update>,
	mut stop: watch::Receiver<bool>,
	applier: Applier,
	state: Arc<Mutex<SessionState>>,
	queue: Arc<SyncQueue>,
) {
	loop {
		let update = tokio::select! {
			biased;
			_ = stop.changed() => break,
			update = inbound.recv() => match update {
				Some(update) => update,
				None => break,
			},
		};
		apply_inbound(&applier, &state, &queue, update).await;
	}
}

/// Judge one inbound update against the local value and apply it if it wins
pub(crate) async fn apply_inbound(
	applier: &Applier,
	state: &Mutex<SessionState>,
	queue: &SyncQueue,
	update: Update,
) {
	let mut state = state.lock().await;
	state.stats.received += 1;
	let local = state.local_value(update.path());
	let verdict = judge_incoming(local.as_ref(), &update.entry);

	match verdict {
		Verdict::Unchanged => state.remember(&update.entry),
		Verdict::Stale => {
			state.stats.stale += 1;
			debug!("Keeping newer local {}", update.path());
			// make sure the peer ends up with the local value
			if let Some(local) = local {
				if !queue.contains(update.path()) {
					state.remember(&local);
					queue.push(local);
				}
			}
		}
		Verdict::Apply => match applier.apply(&mut state.snapshot, &update).await {
			Ok(changed) => {
				debug!("Applied {} ({} paths)", update.path(), changed.len());
				state.record_applied(&changed);
				state.stats.applied += 1;
			}
			Err(e) => {
				warn!("{}", e);
				state.stats.failed += 1;
			}
		},
	}
}

/// Send queued entries until the queue closes or `stop` fires; `stop` is
/// only observed between messages
async fn write_loop<K>(
	sink: &mut K,
	root: &Path,
	state: &Mutex<SessionState>,
	queue: &SyncQueue,
	mut stop: watch::Receiver<bool>,
) -> Result<(), ProtocolError>
where
	K: MessageSink,
{
	loop {
		let entry = tokio::select! {
			biased;
			_ = shutdown_requested(&mut stop) => return Ok(()),
			entry = queue.pop() => match entry {
				Some(entry) => entry,
				None => return Ok(()),
			},
		};
		let Some(update) = load_update(root, state, entry).await else {
			continue;
		};
		sink.send(&Message::Upd(WireEntry::from(&update))).await?;
		state.lock().await.stats.sent += 1;
	}
}

/// Turn a queued entry into an Update, or None if it no longer describes
/// the local tree
async fn load_update(
	root: &Path,
	state: &Mutex<SessionState>,
	mut entry: PathEntry,
) -> Option<Update> {
	{
		let mut state = state.lock().await;
		if !state.is_current(&entry) {
			debug!("Dropping superseded {}", entry.path);
			state.stats.stale += 1;
			return None;
		}
		if entry.is_dir() && !entry.deleted {
			// the peer judges a directory by its content
			entry.mtime = directory_mtime(&state.snapshot, &entry.path);
		}
	}

	if entry.kind != EntryKind::File || entry.deleted {
		return Some(Update::metadata(entry));
	}

	// read outside the lock; the digest proves the bytes match the entry
	let data = match afs::read(root.join(&entry.path)).await {
		Ok(data) => data,
		Err(e) => {
			debug!("Cannot read {}: {}", entry.path, e);
			state.lock().await.stats.stale += 1;
			return None;
		}
	};
	if entry.digest.as_deref() != Some(util::hash(&data).as_str()) {
		debug!("{} changed while queued", entry.path);
		state.lock().await.stats.stale += 1;
		return None;
	}
	Some(Update::new(entry, Some(data)))
}


// vim: ts=4
