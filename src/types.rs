//! Core data model shared by every component
//!
//! A [`PathEntry`] describes one filesystem object under the mirrored root,
//! keyed by its root-relative, `/`-separated path. An [`Update`] pairs an
//! entry with the bytes needed to materialize it on the other side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
	#[serde(rename = "F")]
	File,
	#[serde(rename = "D")]
	Directory,
	#[serde(rename = "S")]
	SymLink,
}

impl fmt::Display for EntryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EntryKind::File => write!(f, "file"),
			EntryKind::Directory => write!(f, "directory"),
			EntryKind::SymLink => write!(f, "symlink"),
		}
	}
}

/// Metadata for one path in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
	/// Root-relative path, `/`-separated
	pub path: String,
	pub kind: EntryKind,
	/// Modification time in milliseconds since the Unix epoch
	pub mtime: i64,
	/// Byte length (files only)
	pub size: u64,
	/// Base64 BLAKE3 digest of the content (files only)
	pub digest: Option<String>,
	/// Wire-canonical symlink target (symlinks only)
	pub target: Option<String>,
	/// Tombstone flag
	pub deleted: bool,
}

impl PathEntry {
	pub fn file(path: impl Into<String>, mtime: i64, size: u64, digest: impl Into<String>) -> Self {
		PathEntry {
			path: path.into(),
			kind: EntryKind::File,
			mtime,
			size,
			digest: Some(digest.into()),
			target: None,
			deleted: false,
		}
	}

	pub fn directory(path: impl Into<String>, mtime: i64) -> Self {
		PathEntry {
			path: path.into(),
			kind: EntryKind::Directory,
			mtime,
			size: 0,
			digest: None,
			target: None,
			deleted: false,
		}
	}

	pub fn symlink(path: impl Into<String>, mtime: i64, target: impl Into<String>) -> Self {
		PathEntry {
			path: path.into(),
			kind: EntryKind::SymLink,
			mtime,
			size: 0,
			digest: None,
			target: Some(target.into()),
			deleted: false,
		}
	}

	/// Tombstone for a path that no longer exists
	///
	/// The kind is kept so the receiver knows whether a cascade is needed.
	pub fn tombstone(path: impl Into<String>, kind: EntryKind, mtime: i64) -> Self {
		PathEntry {
			path: path.into(),
			kind,
			mtime,
			size: 0,
			digest: None,
			target: None,
			deleted: true,
		}
	}

	/// Tombstone replacing this entry
	pub fn to_tombstone(&self, mtime: i64) -> Self {
		PathEntry::tombstone(self.path.clone(), self.kind, mtime)
	}

	pub fn is_dir(&self) -> bool {
		self.kind == EntryKind::Directory
	}

	/// Parent path, or None for entries directly under the root
	pub fn parent(&self) -> Option<&str> {
		parent_path(&self.path)
	}

	/// Comparison key used for echo suppression and live reconciliation
	pub fn fingerprint(&self) -> Fingerprint {
		if self.deleted {
			return Fingerprint::Deleted;
		}
		match self.kind {
			EntryKind::File => {
				Fingerprint::File { mtime: self.mtime, digest: self.digest.clone() }
			}
			EntryKind::Directory => Fingerprint::Directory,
			EntryKind::SymLink => {
				Fingerprint::SymLink { target: self.target.clone().unwrap_or_default() }
			}
		}
	}
}

/// Parent of a `/`-separated relative path
pub fn parent_path(path: &str) -> Option<&str> {
	path.rfind('/').map(|pos| &path[..pos])
}

/// Identity of an observed value
///
/// Directory mtimes move whenever their children change, so directories
/// compare by kind alone. Symlinks compare by target: not every platform
/// can set a link's own mtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
	File { mtime: i64, digest: Option<String> },
	Directory,
	SymLink { target: String },
	Deleted,
}

/// Unit of transfer between peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
	pub entry: PathEntry,
	/// File bytes; None for directories, symlinks and tombstones
	pub data: Option<Vec<u8>>,
}

impl Update {
	pub fn new(entry: PathEntry, data: Option<Vec<u8>>) -> Self {
		Update { entry, data }
	}

	/// Update that carries no content (directory, symlink or tombstone)
	pub fn metadata(entry: PathEntry) -> Self {
		Update { entry, data: None }
	}

	pub fn path(&self) -> &str {
		&self.entry.path
	}
}


// vim: ts=4
