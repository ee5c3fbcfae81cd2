use base64::{engine::general_purpose, Engine as _};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// BLAKE3 digest of a buffer, base64 encoded
pub fn hash(buf: &[u8]) -> String {
	hash_to_base64(blake3::hash(buf).as_bytes())
}

/// BLAKE3 digest of a file's content, streamed from disk
pub fn hash_file(path: &Path) -> io::Result<String> {
	let mut file = fs::File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(hash_to_base64(hasher.finalize().as_bytes()))
}

pub fn hash_to_base64(hash: &[u8; 32]) -> String {
	general_purpose::STANDARD.encode(hash)
}

pub fn encode_data(data: &[u8]) -> String {
	general_purpose::STANDARD.encode(data)
}

pub fn decode_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
	general_purpose::STANDARD.decode(data)
}

/// Modification time of a (possibly symlink) metadata record in milliseconds
pub fn mtime_millis(meta: &fs::Metadata) -> i64 {
	file_time_to_millis(FileTime::from_last_modification_time(meta))
}

pub fn file_time_to_millis(ft: FileTime) -> i64 {
	ft.unix_seconds() * 1000 + i64::from(ft.nanoseconds() / 1_000_000)
}

pub fn millis_to_file_time(ms: i64) -> FileTime {
	let secs = ms.div_euclid(1000);
	let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
	FileTime::from_unix_time(secs, nanos)
}

pub fn now_millis() -> i64 {
	match SystemTime::now().duration_since(UNIX_EPOCH) {
		Ok(d) => d.as_millis() as i64,
		Err(e) => -(e.duration().as_millis() as i64),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_is_stable() {
		assert_eq!(hash(b"abc"), hash(b"abc"));
		assert_ne!(hash(b"abc"), hash(b"abcd"));
	}

	#[test]
	fn test_hash_file_matches_buffer_hash() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("foo.txt");
		fs::write(&path, b"abc").unwrap();
		assert_eq!(hash_file(&path).unwrap(), hash(b"abc"));
	}

	#[test]
	fn test_millis_file_time_conversion() {
		for ms in [0i64, 1, 999, 1000, 2000, 1_700_000_000_123, -1, -1500] {
			assert_eq!(file_time_to_millis(millis_to_file_time(ms)), ms);
		}
	}

	#[test]
	fn test_data_encoding() {
		let encoded = encode_data(b"hello");
		assert_eq!(decode_data(&encoded).unwrap(), b"hello");
		assert!(decode_data("not base64!").is_err());
	}
}

// vim: ts=4
