//! Snapshot scanner
//!
//! Walks a root directory synchronously and records every file, directory
//! and symlink as a [`PathEntry`]. Symlinks are leaves: the walk never
//! follows them, which also keeps it finite in the presence of link cycles.
//! Problems with individual entries are logged and returned as warnings;
//! only an unreadable root aborts the scan.

use std::fs;
use std::path::Path;

use crate::error::ScanError;
use crate::logging::*;
use crate::state::Snapshot;
use crate::symlink::normalize_target;
use crate::types::{EntryKind, PathEntry};
use crate::util;

/// Suffix of the temporary files the applier writes before renaming
pub const TEMP_SUFFIX: &str = ".mirror-tmp";

/// Result of a scan: the snapshot plus per-entry problems that were skipped
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
	pub snapshot: Snapshot,
	pub warnings: Vec<String>,
}

/// Scan `root` from scratch, hashing every file
pub fn scan(root: &Path) -> Result<ScanReport, ScanError> {
	Scanner { root, hint: None }.run()
}

/// Scan `root`, reusing digests from `previous` for files whose size and
/// mtime are unchanged
pub fn scan_with_hint(root: &Path, previous: &Snapshot) -> Result<ScanReport, ScanError> {
	Scanner { root, hint: Some(previous) }.run()
}

struct Scanner<'a> {
	root: &'a Path,
	hint: Option<&'a Snapshot>,
}

impl<'a> Scanner<'a> {
	fn run(&self) -> Result<ScanReport, ScanError> {
		let meta = fs::metadata(self.root).map_err(|e| ScanError::RootUnreadable {
			path: self.root.display().to_string(),
			source: e,
		})?;
		if !meta.is_dir() {
			return Err(ScanError::NotADirectory { path: self.root.display().to_string() });
		}

		let mut report = ScanReport::default();
		let entries = fs::read_dir(self.root).map_err(|e| ScanError::RootUnreadable {
			path: self.root.display().to_string(),
			source: e,
		})?;
		self.walk_entries(entries, None, &mut report);

		debug!(
			"Scanned {}: {} entries, {} warnings",
			self.root.display(),
			report.snapshot.len(),
			report.warnings.len()
		);
		Ok(report)
	}

	fn walk_dir(&self, rel: &str, report: &mut ScanReport) {
		let abs = self.root.join(rel);
		match fs::read_dir(&abs) {
			Ok(entries) => self.walk_entries(entries, Some(rel), report),
			Err(e) => warn_skip(report, format!("Cannot read directory {}: {}", rel, e)),
		}
	}

	fn walk_entries(&self, entries: fs::ReadDir, parent: Option<&str>, report: &mut ScanReport) {
		let mut names = Vec::new();
		for entry_result in entries {
			match entry_result {
				Ok(entry) => names.push(entry.file_name()),
				Err(e) => {
					warn_skip(report, format!("Error reading directory entry: {}", e));
				}
			}
		}
		names.sort();

		for name in names {
			let Some(name) = name.to_str() else {
				warn_skip(report, format!("Skipping non UTF-8 name {:?}", name));
				continue;
			};
			if name.ends_with(TEMP_SUFFIX) {
				continue;
			}

			let rel = match parent {
				Some(p) => format!("{}/{}", p, name),
				None => name.to_string(),
			};

			if let Some(kind) = self.record(&rel, report) {
				if kind == EntryKind::Directory {
					self.walk_dir(&rel, report);
				}
			}
		}
	}

	/// Record one object; returns its kind if it was added to the snapshot
	fn record(&self, rel: &str, report: &mut ScanReport) -> Option<EntryKind> {
		let abs = self.root.join(rel);
		let meta = match fs::symlink_metadata(&abs) {
			Ok(m) => m,
			Err(e) => {
				// Most often the entry was removed while we were walking
				warn_skip(report, format!("Cannot access {}: {}", rel, e));
				return None;
			}
		};
		let mtime = util::mtime_millis(&meta);
		let file_type = meta.file_type();

		if file_type.is_symlink() {
			let raw = match fs::read_link(&abs) {
				Ok(t) => t,
				Err(e) => {
					warn_skip(report, format!("Cannot read symlink {}: {}", rel, e));
					return None;
				}
			};
			let target = normalize_target(self.root, rel, &raw);
			report.snapshot.insert(PathEntry::symlink(rel, mtime, target));
			Some(EntryKind::SymLink)
		} else if file_type.is_dir() {
			report.snapshot.insert(PathEntry::directory(rel, mtime));
			Some(EntryKind::Directory)
		} else if file_type.is_file() {
			let size = meta.len();
			let digest = match self.reusable_digest(rel, mtime, size) {
				Some(d) => d,
				None => match util::hash_file(&abs) {
					Ok(d) => d,
					Err(e) => {
						warn_skip(report, format!("Cannot read file {}: {}", rel, e));
						return None;
					}
				},
			};
			report.snapshot.insert(PathEntry::file(rel, mtime, size, digest));
			Some(EntryKind::File)
		} else {
			debug!("Skipping special file {}", rel);
			None
		}
	}

	fn reusable_digest(&self, rel: &str, mtime: i64, size: u64) -> Option<String> {
		let previous = self.hint?.get(rel)?;
		if previous.kind == EntryKind::File
			&& !previous.deleted
			&& previous.mtime == mtime
			&& previous.size == size
		{
			previous.digest.clone()
		} else {
			None
		}
	}
}

fn warn_skip(report: &mut ScanReport, message: String) {
	warn!("{}", message);
	report.warnings.push(message);
}


// vim: ts=4
