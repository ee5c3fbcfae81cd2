//! Path validation functions

use std::path::Path;

use super::ValidationError;

/// Validate a root-relative wire path
///
/// Wire paths are `/`-separated, relative, and contain no empty, `.` or
/// `..` segments. Anything else could escape the root or alias another key.
pub fn validate_relative_path(path: &str) -> Result<(), ValidationError> {
	if path.is_empty() {
		return Err(ValidationError::PathError("Path is empty".to_string()));
	}
	if path.starts_with('/') || Path::new(path).is_absolute() {
		return Err(ValidationError::PathError(format!(
			"Path must be relative, got absolute path: {:?}",
			path
		)));
	}
	if path.contains('\0') {
		return Err(ValidationError::PathError(format!("Path contains NUL byte: {:?}", path)));
	}
	for segment in path.split('/') {
		match segment {
			"" => {
				return Err(ValidationError::PathError(format!(
					"Path contains an empty segment: {:?}",
					path
				)))
			}
			"." => {
				return Err(ValidationError::PathError(format!(
					"Path contains a current directory reference (.): {:?}",
					path
				)))
			}
			".." => {
				return Err(ValidationError::PathError(format!(
					"Path contains parent directory reference (..): {:?}",
					path
				)))
			}
			_ => {}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_relative_path_ok() {
		assert!(validate_relative_path("file.txt").is_ok());
		assert!(validate_relative_path("dir/sub/file.txt").is_ok());
		assert!(validate_relative_path(".hidden").is_ok());
	}

	#[test]
	fn test_validate_relative_path_err() {
		assert!(validate_relative_path("").is_err());
		assert!(validate_relative_path("/etc/passwd").is_err());
		assert!(validate_relative_path("a//b").is_err());
		assert!(validate_relative_path("a/./b").is_err());
		assert!(validate_relative_path("dir/").is_err());
		let err = validate_relative_path("../etc/passwd").unwrap_err();
		assert!(err.to_string().contains("parent directory"));
	}
}

// vim: ts=4
