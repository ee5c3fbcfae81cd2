//! Error types for Mirror operations
//!
//! Errors are split by blast radius: [`ApplyError`] affects one path and is
//! logged and skipped, [`HandshakeError`] aborts a connection attempt, and
//! [`WatchError`] / [`crate::protocol::ProtocolError`] end a running session.

use std::error::Error;
use std::fmt;
use std::io;

use crate::protocol::ProtocolError;
use crate::validation::ValidationError;

/// Main error type for mirror operations
#[derive(Debug)]
pub enum MirrorError {
	/// Initial handshake failed; no session was created
	Handshake(HandshakeError),

	/// Transport or decode failure; the session is over
	Protocol(ProtocolError),

	/// Local tree can no longer be observed
	Watch(WatchError),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Failed to reach the peer
	ConnectionFailed { address: String, source: io::Error },

	/// I/O error
	Io(io::Error),

	/// A session task panicked or was cancelled unexpectedly
	Task { message: String },
}

impl fmt::Display for MirrorError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MirrorError::Handshake(e) => write!(f, "Handshake failed: {}", e),
			MirrorError::Protocol(e) => write!(f, "Protocol error: {}", e),
			MirrorError::Watch(e) => write!(f, "Watcher failed: {}", e),
			MirrorError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			MirrorError::ConnectionFailed { address, source } => {
				write!(f, "Failed to connect to {}: {}", address, source)
			}
			MirrorError::Io(e) => write!(f, "I/O error: {}", e),
			MirrorError::Task { message } => write!(f, "Session task failed: {}", message),
		}
	}
}

impl Error for MirrorError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			MirrorError::Handshake(e) => Some(e),
			MirrorError::Protocol(e) => Some(e),
			MirrorError::Watch(e) => Some(e),
			MirrorError::ConnectionFailed { source, .. } => Some(source),
			MirrorError::Io(e) => Some(e),
			MirrorError::InvalidConfig { .. } | MirrorError::Task { .. } => None,
		}
	}
}

impl From<io::Error> for MirrorError {
	fn from(e: io::Error) -> Self {
		MirrorError::Io(e)
	}
}

impl From<HandshakeError> for MirrorError {
	fn from(e: HandshakeError) -> Self {
		MirrorError::Handshake(e)
	}
}

impl From<ProtocolError> for MirrorError {
	fn from(e: ProtocolError) -> Self {
		MirrorError::Protocol(e)
	}
}

impl From<WatchError> for MirrorError {
	fn from(e: WatchError) -> Self {
		MirrorError::Watch(e)
	}
}

impl From<ValidationError> for MirrorError {
	fn from(e: ValidationError) -> Self {
		MirrorError::InvalidConfig { message: e.to_string() }
	}
}

/// Failure to scan a root directory
#[derive(Debug)]
pub enum ScanError {
	/// Root directory missing or unreadable
	RootUnreadable { path: String, source: io::Error },

	/// Root exists but is not a directory
	NotADirectory { path: String },
}

impl fmt::Display for ScanError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScanError::RootUnreadable { path, source } => {
				write!(f, "Cannot read root directory {}: {}", path, source)
			}
			ScanError::NotADirectory { path } => write!(f, "{} is not a directory", path),
		}
	}
}

impl Error for ScanError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ScanError::RootUnreadable { source, .. } => Some(source),
			ScanError::NotADirectory { .. } => None,
		}
	}
}

/// Fatal errors during the initial handshake
#[derive(Debug)]
pub enum HandshakeError {
	/// Building the local snapshot failed
	Scan(ScanError),

	/// Peer submitted a snapshot that violates the path-state invariants
	MalformedState { message: String },

	/// Peer sent something other than the expected handshake message
	UnexpectedMessage { expected: &'static str, got: String },

	/// Peer refused the handshake
	Rejected { message: String },

	/// Peer closed the connection mid-handshake
	Disconnected,

	/// Transport failure during the handshake
	Protocol(ProtocolError),
}

impl fmt::Display for HandshakeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HandshakeError::Scan(e) => write!(f, "Initial scan failed: {}", e),
			HandshakeError::MalformedState { message } => {
				write!(f, "Malformed peer state: {}", message)
			}
			HandshakeError::UnexpectedMessage { expected, got } => {
				write!(f, "Expected {} message, got {}", expected, got)
			}
			HandshakeError::Rejected { message } => write!(f, "Rejected by peer: {}", message),
			HandshakeError::Disconnected => write!(f, "Peer disconnected during handshake"),
			HandshakeError::Protocol(e) => write!(f, "{}", e),
		}
	}
}

impl Error for HandshakeError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			HandshakeError::Scan(e) => Some(e),
			HandshakeError::Protocol(e) => Some(e),
			_ => None,
		}
	}
}

impl From<ScanError> for HandshakeError {
	fn from(e: ScanError) -> Self {
		HandshakeError::Scan(e)
	}
}

impl From<ProtocolError> for HandshakeError {
	fn from(e: ProtocolError) -> Self {
		HandshakeError::Protocol(e)
	}
}

impl From<ValidationError> for HandshakeError {
	fn from(e: ValidationError) -> Self {
		HandshakeError::MalformedState { message: e.to_string() }
	}
}

/// Failure applying one inbound update; never fatal to the session
#[derive(Debug)]
pub enum ApplyError {
	/// Path would escape the root or is not a valid key
	InvalidPath { path: String, message: String },

	/// File update arrived without content
	MissingData { path: String },

	/// Symlink update arrived without a target
	MissingTarget { path: String },

	/// Received bytes do not match the advertised digest
	DigestMismatch { path: String, expected: String, actual: String },

	/// Filesystem operation failed
	Io { path: String, source: io::Error },
}

impl ApplyError {
	pub fn io(path: &str, source: io::Error) -> Self {
		ApplyError::Io { path: path.to_string(), source }
	}

}

impl fmt::Display for ApplyError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApplyError::InvalidPath { path, message } => {
				write!(f, "Invalid path {:?}: {}", path, message)
			}
			ApplyError::MissingData { path } => write!(f, "File update for {} has no data", path),
			ApplyError::MissingTarget { path } => {
				write!(f, "Symlink update for {} has no target", path)
			}
			ApplyError::DigestMismatch { path, expected, actual } => {
				write!(f, "Digest mismatch for {}: expected {}, got {}", path, expected, actual)
			}
			ApplyError::Io { path, source } => write!(f, "Cannot apply {}: {}", path, source),
		}
	}
}

impl Error for ApplyError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			ApplyError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

/// The watcher can no longer observe the local tree
#[derive(Debug)]
pub enum WatchError {
	/// Root directory removed or unreadable
	RootLost(ScanError),

	/// Background scan task failed
	ScanTask { message: String },
}

impl fmt::Display for WatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WatchError::RootLost(e) => write!(f, "Lost access to root: {}", e),
			WatchError::ScanTask { message } => write!(f, "Scan task failed: {}", message),
		}
	}
}

impl Error for WatchError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			WatchError::RootLost(e) => Some(e),
			WatchError::ScanTask { .. } => None,
		}
	}
}

impl From<ScanError> for WatchError {
	fn from(e: ScanError) -> Self {
		WatchError::RootLost(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_apply_error_names_path_and_keeps_cause() {
		let err = ApplyError::io("dir/foo.txt", io::Error::from(io::ErrorKind::PermissionDenied));
		assert!(err.to_string().contains("dir/foo.txt"));
		let cause = err.source().and_then(|e| e.downcast_ref::<io::Error>()).unwrap();
		assert_eq!(cause.kind(), io::ErrorKind::PermissionDenied);
	}

	#[test]
	fn test_source_chain_reaches_io_error() {
		let scan = ScanError::RootUnreadable {
			path: "/tmp/x".to_string(),
			source: io::Error::from(io::ErrorKind::NotFound),
		};
		let err = MirrorError::Watch(WatchError::RootLost(scan));

		let mut chain = Vec::new();
		let mut next = err.source();
		while let Some(e) = next {
			chain.push(e.to_string());
			next = e.source();
		}
		assert_eq!(chain.len(), 3);
		assert!(chain[0].starts_with("Lost access to root"));
	}

	#[test]
	fn test_errors_without_cause_have_no_source() {
		let err = MirrorError::InvalidConfig { message: "bad".to_string() };
		assert!(err.source().is_none());
		assert!(HandshakeError::Disconnected.source().is_none());
	}

	#[test]
	fn test_handshake_error_wraps_scan_error() {
		let scan = ScanError::NotADirectory { path: "/tmp/x".to_string() };
		let err: MirrorError = HandshakeError::from(scan).into();
		assert!(err.to_string().contains("not a directory"));
	}

	#[test]
	fn test_validation_error_becomes_malformed_state() {
		let err: HandshakeError = ValidationError::PathError("bad".to_string()).into();
		assert!(matches!(err, HandshakeError::MalformedState { .. }));
	}
}

// vim: ts=4
