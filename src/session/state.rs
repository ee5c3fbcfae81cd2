//! Mutable state shared by the tasks of one session

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::reconcile::directory_mtime;
use crate::state::Snapshot;
use crate::types::{Fingerprint, PathEntry};

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	/// Updates written to the peer
	pub sent: u64,
	/// Updates read from the peer
	pub received: u64,
	/// Inbound updates applied to the local tree
	pub applied: u64,
	/// Inbound updates older than the local value, and outbound entries
	/// superseded before they could be sent
	pub stale: u64,
	/// Local observations matching the value last exchanged with the peer
	pub suppressed: u64,
	/// Inbound updates that could not be applied
	pub failed: u64,
}

impl fmt::Display for SessionStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"sent {}, received {}, applied {}, stale {}, suppressed {}, failed {}",
			self.sent, self.received, self.applied, self.stale, self.suppressed, self.failed
		)
	}
}

/// How long the tombstone of a local delete keeps answering for its path
///
/// Long enough for updates the peer sent before it saw the delete to arrive
/// and be judged against it.
pub const TOMBSTONE_RETENTION: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Retained {
	entry: PathEntry,
	since: Instant,
}

/// Local snapshot plus what the peer is known to hold
///
/// `remembered` maps a path to the fingerprint last received from or sent
/// to the peer. Every apply bumps `generation` and stamps the touched paths
/// in `applied_at`, which lets the watcher discard observations made while
/// an apply was in flight. Paths deleted locally keep their tombstone in
/// `tombstones` for [`TOMBSTONE_RETENTION`].
#[derive(Debug, Default)]
pub struct SessionState {
	pub snapshot: Snapshot,
	remembered: HashMap<String, Fingerprint>,
	tombstones: HashMap<String, Retained>,
	generation: u64,
	applied_at: HashMap<String, u64>,
	pub stats: SessionStats,
}

impl SessionState {
	pub fn new(snapshot: Snapshot) -> Self {
		SessionState { snapshot, ..Default::default() }
	}

	/// Record `entry` as the value both sides now hold
	pub fn remember(&mut self, entry: &PathEntry) {
		self.remembered.insert(entry.path.clone(), entry.fingerprint());
		if entry.deleted {
			self.tombstones
				.insert(entry.path.clone(), Retained { entry: entry.clone(), since: Instant::now() });
		} else {
			self.tombstones.remove(&entry.path);
		}
	}

	/// Whether the peer already holds this exact value
	pub fn is_echo(&self, entry: &PathEntry) -> bool {
		self.remembered.get(&entry.path) == Some(&entry.fingerprint())
	}

	/// The local value of `path` as it competes with the peer's
	///
	/// Directories carry [`directory_mtime`] instead of their own mtime. A
	/// path deleted recently answers with its tombstone.
	pub fn local_value(&self, path: &str) -> Option<PathEntry> {
		match self.snapshot.get(path) {
			Some(entry) if entry.is_dir() => {
				let mut entry = entry.clone();
				entry.mtime = directory_mtime(&self.snapshot, path);
				Some(entry)
			}
			Some(entry) => Some(entry.clone()),
			None => self.tombstones.get(path).map(|t| t.entry.clone()),
		}
	}

	/// Record the entries an apply changed
	pub fn record_applied(&mut self, changed: &[PathEntry]) {
		self.generation += 1;
		for entry in changed {
			self.applied_at.insert(entry.path.clone(), self.generation);
			self.remember(entry);
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Whether `path` was applied after generation `since`
	pub fn applied_since(&self, path: &str, since: u64) -> bool {
		self.applied_at.get(path).map_or(false, |g| *g > since)
	}

	/// Drop apply stamps no scan starting from now can be older than
	pub fn forget_applied_through(&mut self, generation: u64) {
		self.applied_at.retain(|_, g| *g > generation);
	}

	/// Drop tombstones retained longer than [`TOMBSTONE_RETENTION`] at `now`
	/// together with the remembered deletes they answered for
	pub fn expire_tombstones(&mut self, now: Instant) {
		let remembered = &mut self.remembered;
		self.tombstones.retain(|path, retained| {
			let keep = now.saturating_duration_since(retained.since) < TOMBSTONE_RETENTION;
			if !keep && remembered.get(path) == Some(&Fingerprint::Deleted) {
				remembered.remove(path);
			}
			keep
		});
	}

	/// Whether `entry` still describes the local value of its path
	pub fn is_current(&self, entry: &PathEntry) -> bool {
		match self.snapshot.get(&entry.path) {
			Some(local) => !entry.deleted && local.fingerprint() == entry.fingerprint(),
			None => entry.deleted,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::EntryKind;

	#[test]
	fn test_echo_detection() {
		let mut state = SessionState::default();
		let entry = PathEntry::file("foo.txt", 1000, 3, "abc");
		assert!(!state.is_echo(&entry));
		state.remember(&entry);
		assert!(state.is_echo(&entry));
		assert!(!state.is_echo(&PathEntry::file("foo.txt", 1001, 3, "abc")));
	}

	#[test]
	fn test_applied_since_tracks_generations() {
		let mut state = SessionState::default();
		let before = state.generation();
		state.record_applied(&[PathEntry::directory("dir", 1)]);
		assert!(state.applied_since("dir", before));
		assert!(!state.applied_since("dir", state.generation()));
		assert!(!state.applied_since("other", before));
	}

	#[test]
	fn test_applied_stamps_are_forgotten() {
		let mut state = SessionState::default();
		state.record_applied(&[PathEntry::directory("dir", 1)]);
		state.forget_applied_through(state.generation());
		assert!(!state.applied_since("dir", 0));
	}

	#[test]
	fn test_local_delete_answers_with_tombstone() {
		let entry = PathEntry::file("foo.txt", 1000, 3, "abc");
		let mut state = SessionState::new(Snapshot::from_entries(vec![entry.clone()]));
		assert_eq!(state.local_value("foo.txt"), Some(entry.clone()));

		state.snapshot.remove("foo.txt");
		assert_eq!(state.local_value("foo.txt"), None);
		state.remember(&entry.to_tombstone(2000));
		assert_eq!(state.local_value("foo.txt"), Some(entry.to_tombstone(2000)));

		// a live value for the path replaces the tombstone
		state.remember(&entry);
		assert_eq!(state.local_value("foo.txt"), None);
	}

	#[test]
	fn test_tombstones_expire() {
		let mut state = SessionState::default();
		let tombstone = PathEntry::tombstone("foo.txt", EntryKind::File, 2000);
		state.remember(&tombstone);

		state.expire_tombstones(Instant::now());
		assert!(state.local_value("foo.txt").is_some());
		assert!(state.is_echo(&tombstone));

		state.expire_tombstones(Instant::now() + TOMBSTONE_RETENTION);
		assert!(state.local_value("foo.txt").is_none());
		assert!(!state.is_echo(&tombstone));
	}

	#[test]
	fn test_local_directory_competes_with_its_content() {
		let state = SessionState::new(Snapshot::from_entries(vec![
			PathEntry::directory("dir", 9000),
			PathEntry::file("dir/a.txt", 1500, 1, "a"),
		]));
		assert_eq!(state.local_value("dir").unwrap().mtime, 1500);
	}

	#[test]
	fn test_is_current() {
		let entry = PathEntry::file("foo.txt", 1000, 3, "abc");
		let mut state = SessionState::new(Snapshot::from_entries(vec![entry.clone()]));
		assert!(state.is_current(&entry));
		assert!(!state.is_current(&entry.to_tombstone(2000)));

		state.snapshot.remove("foo.txt");
		assert!(state.is_current(&entry.to_tombstone(2000)));
		assert!(!state.is_current(&entry));
	}
}

// vim: ts=4
