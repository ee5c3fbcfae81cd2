//! Symlink target normalization
//!
//! On-disk targets are rewritten into the form sent on the wire. Relative
//! targets are already relative to the link's directory and stay verbatim.
//! An absolute target that exists inside the mirrored root becomes the
//! equivalent relative target so that it keeps working on a peer whose root
//! lives elsewhere. Anything else (outside the root, dangling) is kept as is.
//! Targets received from the peer are written back unchanged.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Wire-canonical target for a link at `link_rel` (root-relative) whose raw
/// on-disk target is `raw`
///
/// `root` should be absolute. It is compared both as given and in its
/// canonical form, so roots reached through symlinked directories still
/// recognize their own absolute paths.
pub fn normalize_target(root: &Path, link_rel: &str, raw: &Path) -> String {
	let raw_str = raw.to_string_lossy().into_owned();

	if !raw.is_absolute() {
		return raw_str;
	}

	let resolved = lexical_normalize(raw);
	if fs::metadata(&resolved).is_err() {
		// dangling
		return raw_str;
	}

	let target_rel = match root_relative(root, &resolved) {
		Some(rel) => rel,
		None => return raw_str,
	};

	let link_dir: Vec<&str> = match link_rel.rfind('/') {
		Some(pos) => link_rel[..pos].split('/').collect(),
		None => Vec::new(),
	};
	let target: Vec<&str> = target_rel.iter().map(String::as_str).collect();

	relative_between(&link_dir, &target)
}

/// Target components relative to the root, if `resolved` lies inside it
fn root_relative(root: &Path, resolved: &Path) -> Option<Vec<String>> {
	let root_plain = lexical_normalize(root);
	if let Ok(rest) = resolved.strip_prefix(&root_plain) {
		return Some(components_of(rest));
	}

	let root_canonical = fs::canonicalize(root).ok()?;
	let resolved_canonical = fs::canonicalize(resolved).ok()?;
	resolved_canonical.strip_prefix(&root_canonical).ok().map(components_of)
}

fn components_of(path: &Path) -> Vec<String> {
	path.components()
		.filter_map(|c| match c {
			Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
			_ => None,
		})
		.collect()
}

/// Relative `/`-separated path leading from directory `from` to `to`
pub fn relative_between(from: &[&str], to: &[&str]) -> String {
	let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();

	let mut parts: Vec<&str> = Vec::new();
	for _ in common..from.len() {
		parts.push("..");
	}
	parts.extend(&to[common..]);

	if parts.is_empty() {
		".".to_string()
	} else {
		parts.join("/")
	}
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn lexical_normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if !out.pop() {
					out.push(component.as_os_str());
				}
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}


// vim: ts=4
