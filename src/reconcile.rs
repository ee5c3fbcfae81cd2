//! Reconciliation: deciding which side's value wins for each path
//!
//! Two entry points:
//! - [`reconcile`] compares two full snapshots during the initial handshake.
//!   Newer mtime wins and an absent path counts as older than anything, so a
//!   path present on one side only is always materialized on the other.
//! - [`judge_incoming`] compares one live update from the peer against the
//!   local entry for the same path.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::state::Snapshot;
use crate::types::{EntryKind, PathEntry};

/// Which side holds the winning version of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
	Local,
	Remote,
	/// Both sides already agree
	Neither,
}

/// Outcome of comparing the local snapshot with the peer's
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
	/// Local entries the peer is missing or holds an older version of
	pub to_send: Vec<PathEntry>,
	/// Paths the peer will send us
	pub to_receive: Vec<String>,
	/// Paths already consistent on both sides
	pub in_sync: Vec<String>,
}

impl Reconciliation {
	pub fn is_converged(&self) -> bool {
		self.to_send.is_empty() && self.to_receive.is_empty()
	}
}

/// Initial-handshake winner for one path
///
/// Only mtimes are compared: equal mtimes mean no action even if contents
/// differ. Directories present on both sides always agree since directory
/// mtimes only reflect child activity.
pub fn initial_winner(local: Option<&PathEntry>, remote: Option<&PathEntry>) -> Winner {
	match (local, remote) {
		(None, None) => Winner::Neither,
		(Some(_), None) => Winner::Local,
		(None, Some(_)) => Winner::Remote,
		(Some(l), Some(r)) => {
			if l.kind == EntryKind::Directory && r.kind == EntryKind::Directory {
				return Winner::Neither;
			}
			match l.mtime.cmp(&r.mtime) {
				Ordering::Greater => Winner::Local,
				Ordering::Less => Winner::Remote,
				Ordering::Equal => Winner::Neither,
			}
		}
	}
}

/// Compare two snapshots path by path
///
/// Both peers run this against the same pair of snapshots (each from its own
/// point of view), so the two `to_send` sets together resolve every
/// difference without a second round trip.
pub fn reconcile(local: &Snapshot, remote: &Snapshot) -> Reconciliation {
	let paths: BTreeSet<&String> = local.paths().chain(remote.paths()).collect();
	let mut result = Reconciliation::default();

	for path in paths {
		let l = local.get(path);
		let r = remote.get(path);
		match initial_winner(l, r) {
			Winner::Local => {
				if let Some(entry) = l {
					result.to_send.push(entry.clone());
				}
			}
			Winner::Remote => result.to_receive.push(path.clone()),
			Winner::Neither => result.in_sync.push(path.clone()),
		}
	}

	result
}

/// What to do with an update received from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	/// Incoming value wins; apply it
	Apply,
	/// Local value is newer; keep it (the watcher propagates it)
	Stale,
	/// Local value already matches
	Unchanged,
}

/// Single-sided reconciliation of a live update against the local value
///
/// `local` is the live entry, or the tombstone of a recent local delete.
/// Directories are expected with the mtime from [`directory_mtime`], never
/// their own. Newer mtime wins. Equal mtimes with different values fall
/// back to a deterministic ordering of the values themselves, so two peers
/// that exchanged concurrent same-millisecond edits settle on the same one.
pub fn judge_incoming(local: Option<&PathEntry>, incoming: &PathEntry) -> Verdict {
	let Some(local) = local else {
		return if incoming.deleted { Verdict::Unchanged } else { Verdict::Apply };
	};

	if local.fingerprint() == incoming.fingerprint() {
		return Verdict::Unchanged;
	}

	match incoming.mtime.cmp(&local.mtime) {
		Ordering::Greater => Verdict::Apply,
		Ordering::Less => Verdict::Stale,
		Ordering::Equal => match tie_key(incoming).cmp(&tie_key(local)) {
			Ordering::Greater => Verdict::Apply,
			Ordering::Less => Verdict::Stale,
			Ordering::Equal => Verdict::Unchanged,
		},
	}
}

/// Mtime a live directory competes with: that of its newest recorded
/// non-directory descendant, or `i64::MIN` when it holds none
///
/// A directory's own mtime moves whenever a child is added or removed,
/// including by the removals of a delete cascade, so it says nothing about
/// when the directory itself was last wanted.
pub fn directory_mtime(snapshot: &Snapshot, dir: &str) -> i64 {
	snapshot
		.descendants(dir)
		.filter(|entry| !entry.is_dir())
		.map(|entry| entry.mtime)
		.max()
		.unwrap_or(i64::MIN)
}

fn tie_key(entry: &PathEntry) -> (u8, &str) {
	if entry.deleted {
		return (0, "");
	}
	match entry.kind {
		EntryKind::Directory => (1, ""),
		EntryKind::SymLink => (2, entry.target.as_deref().unwrap_or("")),
		EntryKind::File => (3, entry.digest.as_deref().unwrap_or("")),
	}
}


// vim: ts=4
