//! Polling change watcher
//!
//! Rescans the root on a fixed interval and turns the difference between the
//! session snapshot and the fresh scan into outbound entries. Values the peer
//! already holds are suppressed, and paths applied while the scan was running
//! are left for the next poll.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::error::WatchError;
use crate::logging::*;
use crate::queue::SyncQueue;
use crate::scanner;
use crate::session::SessionState;
use crate::state::Snapshot;
use crate::types::PathEntry;
use crate::util;

/// Entries that turn `old` into `new`
///
/// Deletions come first, deepest paths first, as tombstones stamped `now`.
/// Creations and modifications follow in path order so parents precede
/// children. Directories compare by kind and symlinks by target, so a
/// directory whose mtime moved is not a change.
pub fn diff(old: &Snapshot, new: &Snapshot, now: i64) -> Vec<PathEntry> {
	let mut changes: Vec<PathEntry> = old
		.iter()
		.rev()
		.filter(|entry| !new.contains(&entry.path))
		.map(|entry| entry.to_tombstone(now))
		.collect();

	changes.extend(
		new.iter()
			.filter(|entry| {
				old.get(&entry.path).map_or(true, |prev| prev.fingerprint() != entry.fingerprint())
			})
			.cloned(),
	);
	changes
}

pub struct Watcher {
	root: PathBuf,
	interval: Duration,
	state: Arc<Mutex<SessionState>>,
	queue: Arc<SyncQueue>,
}

impl Watcher {
	pub fn new(
		root: PathBuf,
		interval: Duration,
		state: Arc<Mutex<SessionState>>,
		queue: Arc<SyncQueue>,
	) -> Self {
		Watcher { root, interval, state, queue }
	}

	/// Poll until the root can no longer be scanned
	pub async fn run(self) -> Result<(), WatchError> {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		// the first tick completes immediately
		ticker.tick().await;

		loop {
			ticker.tick().await;
			self.poll_once().await?;
		}
	}

	/// Scan once and enqueue what changed; returns the number queued
	pub async fn poll_once(&self) -> Result<usize, WatchError> {
		let (hint, since) = {
			let state = self.state.lock().await;
			(state.snapshot.clone(), state.generation())
		};

		let root = self.root.clone();
		let report = tokio::task::spawn_blocking(move || scanner::scan_with_hint(&root, &hint))
			.await
			.map_err(|e| WatchError::ScanTask { message: e.to_string() })??;
		for warning in &report.warnings {
			debug!("Scan: {}", warning);
		}

		let mut state = self.state.lock().await;
		let changes = diff(&state.snapshot, &report.snapshot, util::now_millis());
		let mut merged = report.snapshot;
		let mut queued = 0;

		for change in changes {
			if state.applied_since(&change.path, since) {
				// observed mid-apply; keep the applied value
				match state.snapshot.get(&change.path) {
					Some(current) => merged.insert(current.clone()),
					None => merged.remove(&change.path),
				};
				continue;
			}

			if state.is_echo(&change) {
				state.stats.suppressed += 1;
				continue;
			}

			debug!(
				"Local {} {}",
				if change.deleted { "delete" } else { "change" },
				change.path
			);
			state.remember(&change);
			self.queue.push(change);
			queued += 1;
		}

		state.snapshot = merged;
		// the next scan starts after every apply recorded so far
		let generation = state.generation();
		state.forget_applied_through(generation);
		state.expire_tombstones(Instant::now());
		Ok(queued)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::EntryKind;
	use std::fs;
	use tempfile::TempDir;

	fn watcher_for(dir: &TempDir) -> (Watcher, Arc<Mutex<SessionState>>, Arc<SyncQueue>) {
		let snapshot = scanner::scan(dir.path()).unwrap().snapshot;
		let state = Arc::new(Mutex::new(SessionState::new(snapshot)));
		let queue = Arc::new(SyncQueue::new());
		let watcher = Watcher::new(
			dir.path().to_path_buf(),
			Duration::from_millis(10),
			state.clone(),
			queue.clone(),
		);
		(watcher, state, queue)
	}

	fn drain(queue: &SyncQueue) -> Vec<PathEntry> {
		std::iter::from_fn(|| queue.try_pop()).collect()
	}

	#[test]
	fn test_diff_orders_deletes_before_creates() {
		let old = Snapshot::from_entries(vec![
			PathEntry::directory("dir", 1),
			PathEntry::directory("dir/sub", 1),
			PathEntry::file("dir/sub/a.txt", 1, 1, "a"),
			PathEntry::file("keep.txt", 1, 1, "k"),
		]);
		let new = Snapshot::from_entries(vec![
			PathEntry::file("keep.txt", 2, 1, "k2"),
			PathEntry::directory("new", 2),
			PathEntry::file("new/b.txt", 2, 1, "b"),
		]);

		let changes = diff(&old, &new, 99);
		let summary: Vec<(&str, bool)> =
			changes.iter().map(|e| (e.path.as_str(), e.deleted)).collect();
		assert_eq!(
			summary,
			vec![
				("dir/sub/a.txt", true),
				("dir/sub", true),
				("dir", true),
				("keep.txt", false),
				("new", false),
				("new/b.txt", false),
			]
		);
		assert!(changes[..3].iter().all(|e| e.mtime == 99));
		assert_eq!(changes[2].kind, EntryKind::Directory);
	}

	#[test]
	fn test_diff_ignores_directory_mtime() {
		let old = Snapshot::from_entries(vec![PathEntry::directory("dir", 1)]);
		let new = Snapshot::from_entries(vec![PathEntry::directory("dir", 500)]);
		assert!(diff(&old, &new, 0).is_empty());
	}

	#[test]
	fn test_diff_reports_kind_change() {
		let old = Snapshot::from_entries(vec![PathEntry::file("x", 1, 1, "a")]);
		let new = Snapshot::from_entries(vec![PathEntry::symlink("x", 1, "y")]);
		let changes = diff(&old, &new, 0);
		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].kind, EntryKind::SymLink);
	}

	#[tokio::test]
	async fn test_poll_enqueues_new_file() {
		let dir = TempDir::new().unwrap();
		let (watcher, _, queue) = watcher_for(&dir);

		fs::write(dir.path().join("foo.txt"), "abc").unwrap();
		assert_eq!(watcher.poll_once().await.unwrap(), 1);
		assert_eq!(drain(&queue)[0].path, "foo.txt");

		// nothing changed since
		assert_eq!(watcher.poll_once().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_poll_cascades_directory_delete() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("dir/sub")).unwrap();
		fs::write(dir.path().join("dir/sub/a.txt"), "a").unwrap();
		let (watcher, _, queue) = watcher_for(&dir);

		fs::remove_dir_all(dir.path().join("dir")).unwrap();
		watcher.poll_once().await.unwrap();

		let paths: Vec<String> = drain(&queue).into_iter().map(|e| e.path).collect();
		assert_eq!(paths, vec!["dir/sub/a.txt", "dir/sub", "dir"]);
	}

	#[tokio::test]
	async fn test_remembered_value_is_suppressed() {
		let dir = TempDir::new().unwrap();
		let (watcher, state, queue) = watcher_for(&dir);

		fs::write(dir.path().join("foo.txt"), "abc").unwrap();
		let observed = scanner::scan(dir.path()).unwrap().snapshot;
		state.lock().await.remember(observed.get("foo.txt").unwrap());

		assert_eq!(watcher.poll_once().await.unwrap(), 0);
		assert!(queue.is_empty());
		let state = state.lock().await;
		assert_eq!(state.stats.suppressed, 1);
		assert!(state.snapshot.contains("foo.txt"));
	}

	#[tokio::test]
	async fn test_local_delete_keeps_tombstone() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("foo.txt"), "abc").unwrap();
		let (watcher, state, queue) = watcher_for(&dir);

		fs::remove_file(dir.path().join("foo.txt")).unwrap();
		watcher.poll_once().await.unwrap();

		let sent = drain(&queue);
		assert_eq!(sent.len(), 1);
		assert!(sent[0].deleted);
		assert_eq!(state.lock().await.local_value("foo.txt"), Some(sent[0].clone()));
	}

	#[tokio::test]
	async fn test_scan_of_missing_root_fails() {
		let dir = TempDir::new().unwrap();
		let root = dir.path().join("root");
		fs::create_dir(&root).unwrap();
		let state = Arc::new(Mutex::new(SessionState::default()));
		let watcher =
			Watcher::new(root.clone(), Duration::from_millis(10), state, Arc::new(SyncQueue::new()));

		fs::remove_dir(&root).unwrap();
		assert!(matches!(watcher.poll_once().await, Err(WatchError::RootLost(_))));
	}
}

// vim: ts=4
