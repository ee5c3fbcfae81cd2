//! Path state: the ordered map of relative path to metadata
//!
//! Keys are root-relative `/`-separated paths held in a `BTreeMap`. A prefix
//! always sorts before its extensions, so iteration visits every directory
//! before its descendants and reverse iteration visits children first.

use std::collections::BTreeMap;

use crate::types::{EntryKind, PathEntry};
use crate::validation::{validate_relative_path, ValidationError};

/// One side's view of the tree at an instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
	entries: BTreeMap<String, PathEntry>,
}

impl Snapshot {
	pub fn new() -> Self {
		Snapshot { entries: BTreeMap::new() }
	}

	/// Build a snapshot from a sequence of entries (later duplicates win)
	pub fn from_entries<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = PathEntry>,
	{
		let mut snapshot = Snapshot::new();
		for entry in entries {
			snapshot.insert(entry);
		}
		snapshot
	}

	pub fn insert(&mut self, entry: PathEntry) -> Option<PathEntry> {
		self.entries.insert(entry.path.clone(), entry)
	}

	pub fn remove(&mut self, path: &str) -> Option<PathEntry> {
		self.entries.remove(path)
	}

	pub fn get(&self, path: &str) -> Option<&PathEntry> {
		self.entries.get(path)
	}

	pub fn contains(&self, path: &str) -> bool {
		self.entries.contains_key(path)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries in path order (ancestors first)
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PathEntry> {
		self.entries.values()
	}

	pub fn paths(&self) -> impl Iterator<Item = &String> {
		self.entries.keys()
	}

	/// All recorded descendants of `dir`, in path order
	pub fn descendants<'a>(&'a self, dir: &str) -> impl Iterator<Item = &'a PathEntry> + 'a {
		let prefix = format!("{}/", dir);
		self.entries
			.range(prefix.clone()..)
			.take_while(move |(path, _)| path.starts_with(&prefix))
			.map(|(_, entry)| entry)
	}

	/// Expand the deletion of `path` into tombstones for it and every
	/// recorded descendant, children before parents
	///
	/// Returns an empty list when the path is not recorded.
	pub fn cascade_delete(&self, path: &str, mtime: i64) -> Vec<PathEntry> {
		let Some(entry) = self.entries.get(path) else {
			return Vec::new();
		};

		let mut tombstones: Vec<PathEntry> = Vec::new();
		if entry.kind == EntryKind::Directory {
			let mut children: Vec<&PathEntry> = self.descendants(path).collect();
			children.reverse();
			tombstones.extend(children.into_iter().map(|child| child.to_tombstone(mtime)));
		}
		tombstones.push(entry.to_tombstone(mtime));
		tombstones
	}

	/// Check the structural invariants of a peer-submitted snapshot
	///
	/// Every path must be a valid relative path, no entry may be a tombstone,
	/// every parent must be recorded as a directory, and symlinks must carry
	/// a target.
	pub fn validate(&self) -> Result<(), ValidationError> {
		for entry in self.entries.values() {
			validate_relative_path(&entry.path)?;

			if entry.deleted {
				return Err(ValidationError::PathError(format!(
					"Snapshot contains tombstone for {}",
					entry.path
				)));
			}

			if entry.kind == EntryKind::SymLink && entry.target.is_none() {
				return Err(ValidationError::PathError(format!(
					"Symlink {} has no target",
					entry.path
				)));
			}

			if let Some(parent) = entry.parent() {
				match self.entries.get(parent) {
					Some(p) if p.kind == EntryKind::Directory => {}
					Some(p) => {
						return Err(ValidationError::PathError(format!(
							"Parent of {} is a {}, not a directory",
							entry.path, p.kind
						)))
					}
					None => {
						return Err(ValidationError::PathError(format!(
							"Parent of {} is missing from snapshot",
							entry.path
						)))
					}
				}
			}
		}
		Ok(())
	}
}

impl FromIterator<PathEntry> for Snapshot {
	fn from_iter<I: IntoIterator<Item = PathEntry>>(iter: I) -> Self {
		Snapshot::from_entries(iter)
	}
}


// vim: ts=4
