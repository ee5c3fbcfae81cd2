//! Applying inbound updates to the local tree
//!
//! Each update touches exactly one path (plus, for a directory delete, the
//! recorded descendants of that path). Files are written to a temporary
//! sibling, stamped with the origin's mtime, and renamed into place.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as afs;

use crate::error::ApplyError;
use crate::logging::*;
use crate::scanner::TEMP_SUFFIX;
use crate::state::Snapshot;
use crate::types::{EntryKind, PathEntry, Update};
use crate::util;
use crate::validation::validate_relative_path;

/// Filesystem side of update application for one root
#[derive(Debug, Clone)]
pub struct Applier {
	root: PathBuf,
}

impl Applier {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Applier { root: root.into() }
	}

	/// Apply `update` to disk and record the result in `snapshot`
	///
	/// Returns the entries whose local state changed: the applied entry, or
	/// for a delete the tombstones of every removed path, children first.
	pub async fn apply(
		&self,
		snapshot: &mut Snapshot,
		update: &Update,
	) -> Result<Vec<PathEntry>, ApplyError> {
		let entry = &update.entry;
		self.check_path(&entry.path)?;

		if entry.deleted {
			return self.apply_delete(snapshot, entry).await;
		}

		let applied = match entry.kind {
			EntryKind::File => {
				let data = update
					.data
					.as_deref()
					.ok_or_else(|| ApplyError::MissingData { path: entry.path.clone() })?;
				self.write_file(entry, data).await?
			}
			EntryKind::Directory => {
				self.create_dir(&entry.path).await?;
				entry.clone()
			}
			EntryKind::SymLink => {
				let target = entry
					.target
					.as_deref()
					.ok_or_else(|| ApplyError::MissingTarget { path: entry.path.clone() })?;
				self.create_symlink(entry, target).await?;
				entry.clone()
			}
		};

		// Anything recorded under a path that is no longer a directory is gone
		let mut changed = Vec::new();
		if applied.kind != EntryKind::Directory {
			let orphans: Vec<String> =
				snapshot.descendants(&applied.path).map(|e| e.path.clone()).collect();
			for path in orphans.into_iter().rev() {
				if let Some(old) = snapshot.remove(&path) {
					changed.push(old.to_tombstone(applied.mtime));
				}
			}
		}

		snapshot.insert(applied.clone());
		changed.push(applied);
		Ok(changed)
	}

	async fn apply_delete(
		&self,
		snapshot: &mut Snapshot,
		entry: &PathEntry,
	) -> Result<Vec<PathEntry>, ApplyError> {
		let mut tombstones = snapshot.cascade_delete(&entry.path, entry.mtime);
		if tombstones.is_empty() {
			// not recorded locally; still make sure nothing is left on disk
			tombstones.push(entry.clone());
		}

		for tombstone in &tombstones {
			self.remove(&tombstone.path).await?;
			snapshot.remove(&tombstone.path);
		}
		debug!("Deleted {} ({} paths)", entry.path, tombstones.len());
		Ok(tombstones)
	}

	/// Reject paths that could escape the root, including through a
	/// symlinked ancestor directory
	fn check_path(&self, path: &str) -> Result<(), ApplyError> {
		validate_relative_path(path).map_err(|e| ApplyError::InvalidPath {
			path: path.to_string(),
			message: e.to_string(),
		})?;

		let mut ancestor = self.root.clone();
		let segments: Vec<&str> = path.split('/').collect();
		for segment in &segments[..segments.len() - 1] {
			ancestor.push(segment);
			match std::fs::symlink_metadata(&ancestor) {
				Ok(meta) if meta.file_type().is_symlink() => {
					return Err(ApplyError::InvalidPath {
						path: path.to_string(),
						message: format!("ancestor {} is a symlink", ancestor.display()),
					});
				}
				Ok(_) => {}
				Err(e) if e.kind() == io::ErrorKind::NotFound => break,
				Err(e) => return Err(ApplyError::io(path, e)),
			}
		}
		Ok(())
	}

	fn full_path(&self, path: &str) -> PathBuf {
		self.root.join(path)
	}

	async fn ensure_parent(&self, path: &str, full: &Path) -> Result<(), ApplyError> {
		if let Some(parent) = full.parent() {
			afs::create_dir_all(parent).await.map_err(|e| ApplyError::io(path, e))?;
		}
		Ok(())
	}

	async fn write_file(&self, entry: &PathEntry, data: &[u8]) -> Result<PathEntry, ApplyError> {
		let full = self.full_path(&entry.path);

		let actual = util::hash(data);
		if let Some(expected) = &entry.digest {
			if expected != &actual {
				return Err(ApplyError::DigestMismatch {
					path: entry.path.clone(),
					expected: expected.clone(),
					actual,
				});
			}
		}

		self.ensure_parent(&entry.path, &full).await?;

		let mut tmp_name = full.file_name().unwrap_or_default().to_os_string();
		tmp_name.push(TEMP_SUFFIX);
		let tmp_path = full.with_file_name(tmp_name);

		let written = async {
			afs::write(&tmp_path, data).await?;
			filetime::set_file_mtime(&tmp_path, util::millis_to_file_time(entry.mtime))?;
			if is_real_dir(&full).await {
				afs::remove_dir_all(&full).await?;
			}
			afs::rename(&tmp_path, &full).await
		}
		.await;

		if let Err(e) = written {
			afs::remove_file(&tmp_path).await.ok();
			return Err(ApplyError::io(&entry.path, e));
		}

		debug!("Wrote {} ({} bytes)", entry.path, data.len());
		let mut applied = entry.clone();
		applied.size = data.len() as u64;
		applied.digest = Some(actual);
		Ok(applied)
	}

	async fn create_dir(&self, path: &str) -> Result<(), ApplyError> {
		let full = self.full_path(path);
		match afs::symlink_metadata(&full).await {
			Ok(meta) if meta.is_dir() => return Ok(()),
			Ok(_) => afs::remove_file(&full).await.map_err(|e| ApplyError::io(path, e))?,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => return Err(ApplyError::io(path, e)),
		}

		match afs::create_dir_all(&full).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
			Err(e) => Err(ApplyError::io(path, e)),
		}
	}

	async fn create_symlink(&self, entry: &PathEntry, target: &str) -> Result<(), ApplyError> {
		let full = self.full_path(&entry.path);
		self.ensure_parent(&entry.path, &full).await?;
		self.remove(&entry.path).await?;

		afs::symlink(target, &full).await.map_err(|e| ApplyError::io(&entry.path, e))?;

		let ft = util::millis_to_file_time(entry.mtime);
		if let Err(e) = filetime::set_symlink_file_times(&full, ft, ft) {
			debug!("Cannot set mtime of symlink {}: {}", entry.path, e);
		}
		Ok(())
	}

	/// Remove whatever is at `path`; a missing path is not an error
	async fn remove(&self, path: &str) -> Result<(), ApplyError> {
		let full = self.full_path(path);
		let result = match afs::symlink_metadata(&full).await {
			Ok(meta) if meta.is_dir() => afs::remove_dir_all(&full).await,
			Ok(_) => afs::remove_file(&full).await,
			Err(e) => Err(e),
		};
		match result {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(ApplyError::io(path, e)),
		}
	}
}

async fn is_real_dir(path: &Path) -> bool {
	matches!(afs::symlink_metadata(path).await, Ok(meta) if meta.is_dir())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scanner;
	use std::fs;
	use tempfile::TempDir;

	fn file_update(path: &str, mtime: i64, content: &str) -> Update {
		let entry = PathEntry::file(path, mtime, content.len() as u64, util::hash(content.as_bytes()));
		Update::new(entry, Some(content.as_bytes().to_vec()))
	}

	#[tokio::test]
	async fn test_write_file_sets_content_and_mtime() {
		let dir = TempDir::new().unwrap();
		let applier = Applier::new(dir.path());
		let mut snapshot = Snapshot::new();

		applier.apply(&mut snapshot, &file_update("sub/foo.txt", 2_000_000, "abc")).await.unwrap();

		let path = dir.path().join("sub/foo.txt");
		assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
		let meta = fs::metadata(&path).unwrap();
		assert_eq!(util::mtime_millis(&meta), 2_000_000);
		assert!(snapshot.contains("sub/foo.txt"));
		assert!(!dir.path().join("sub/foo.txt.mirror-tmp").exists());
	}

	#[tokio::test]
	async fn test_apply_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let applier = Applier::new(dir.path());
		let mut snapshot = Snapshot::new();
		let update = file_update("foo.txt", 1_000_000, "abc");

		applier.apply(&mut snapshot, &update).await.unwrap();
		let once = scanner::scan(dir.path()).unwrap().snapshot;
		applier.apply(&mut snapshot, &update).await.unwrap();
		let twice = scanner::scan(dir.path()).unwrap().snapshot;
		assert_eq!(once, twice);

		let delete = Update::metadata(update.entry.to_tombstone(3_000_000));
		applier.apply(&mut snapshot, &delete).await.unwrap();
		applier.apply(&mut snapshot, &delete).await.unwrap();
		assert!(!dir.path().join("foo.txt").exists());
	}

	#[tokio::test]
	async fn test_digest_mismatch_is_rejected() {
		let dir = TempDir::new().unwrap();
		let applier = Applier::new(dir.path());
		let mut update = file_update("foo.txt", 1000, "abc");
		update.data = Some(b"tampered".to_vec());

		let result = applier.apply(&mut Snapshot::new(), &update).await;
		assert!(matches!(result, Err(ApplyError::DigestMismatch { .. })));
		assert!(!dir.path().join("foo.txt").exists());
	}

	#[tokio::test]
	async fn test_create_directory_tolerates_existing() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("dir")).unwrap();
		let applier = Applier::new(dir.path());
		let update = Update::metadata(PathEntry::directory("dir", 1000));
		applier.apply(&mut Snapshot::new(), &update).await.unwrap();
		assert!(dir.path().join("dir").is_dir());
	}

	#[tokio::test]
	async fn test_symlink_replaces_existing_file() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("foo.txt"), "abc").unwrap();
		fs::write(dir.path().join("foo2"), "old").unwrap();
		let applier = Applier::new(dir.path());

		let update = Update::metadata(PathEntry::symlink("foo2", 1000, "foo.txt"));
		applier.apply(&mut Snapshot::new(), &update).await.unwrap();

		let link = dir.path().join("foo2");
		assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("foo.txt"));
		assert_eq!(fs::read_to_string(&link).unwrap(), "abc");
	}

	#[tokio::test]
	async fn test_directory_delete_cascades_children_first() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("dir/sub")).unwrap();
		fs::write(dir.path().join("dir/foo.txt"), "abc").unwrap();
		fs::write(dir.path().join("dir/sub/bar.txt"), "abc").unwrap();
		let mut snapshot = scanner::scan(dir.path()).unwrap().snapshot;
		let applier = Applier::new(dir.path());

		let tombstone = snapshot.get("dir").unwrap().to_tombstone(9_000_000);
		let removed = applier.apply(&mut snapshot, &Update::metadata(tombstone)).await.unwrap();

		let paths: Vec<&str> = removed.iter().map(|e| e.path.as_str()).collect();
		assert_eq!(paths, vec!["dir/sub/bar.txt", "dir/sub", "dir/foo.txt", "dir"]);
		assert!(!dir.path().join("dir").exists());
		assert!(snapshot.is_empty());
	}

	#[tokio::test]
	async fn test_delete_of_unrecorded_path_removes_from_disk() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("foo.txt"), "abc").unwrap();
		let applier = Applier::new(dir.path());
		let tombstone = PathEntry::tombstone("foo.txt", EntryKind::File, 1000);
		applier.apply(&mut Snapshot::new(), &Update::metadata(tombstone)).await.unwrap();
		assert!(!dir.path().join("foo.txt").exists());
	}

	#[tokio::test]
	async fn test_file_replaces_directory() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("x")).unwrap();
		fs::write(dir.path().join("x/inner.txt"), "abc").unwrap();
		let mut snapshot = scanner::scan(dir.path()).unwrap().snapshot;
		let applier = Applier::new(dir.path());

		let changed = applier.apply(&mut snapshot, &file_update("x", 5000, "now a file")).await.unwrap();
		assert_eq!(fs::read_to_string(dir.path().join("x")).unwrap(), "now a file");
		assert!(!snapshot.contains("x/inner.txt"));
		assert!(changed.iter().any(|e| e.path == "x/inner.txt" && e.deleted));
	}

	#[tokio::test]
	async fn test_invalid_paths_are_rejected() {
		let dir = TempDir::new().unwrap();
		let applier = Applier::new(dir.path());
		for bad in ["../escape.txt", "/etc/passwd", "a/../../b"] {
			let result = applier.apply(&mut Snapshot::new(), &file_update(bad, 1, "x")).await;
			assert!(matches!(result, Err(ApplyError::InvalidPath { .. })), "{}", bad);
		}
	}

	#[tokio::test]
	async fn test_writes_through_symlinked_directory_are_rejected() {
		let dir = TempDir::new().unwrap();
		let outside = TempDir::new().unwrap();
		std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();
		let applier = Applier::new(dir.path());

		let result = applier.apply(&mut Snapshot::new(), &file_update("out/evil.txt", 1, "x")).await;
		assert!(matches!(result, Err(ApplyError::InvalidPath { .. })));
		assert!(!outside.path().join("evil.txt").exists());
	}

	#[tokio::test]
	async fn test_missing_data_is_an_error() {
		let dir = TempDir::new().unwrap();
		let applier = Applier::new(dir.path());
		let update = Update::metadata(PathEntry::file("foo.txt", 1, 3, "x"));
		let result = applier.apply(&mut Snapshot::new(), &update).await;
		assert!(matches!(result, Err(ApplyError::MissingData { .. })));
	}
}

// vim: ts=4
