//! Configuration validation functions

use super::ValidationError;

/// Longest accepted polling interval
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Validate the watcher polling interval
pub fn validate_poll_interval_ms(interval_ms: u64) -> Result<(), ValidationError> {
	if interval_ms == 0 {
		return Err(ValidationError::ConfigError(
			"Poll interval must be greater than 0".to_string(),
		));
	}
	if interval_ms > MAX_POLL_INTERVAL_MS {
		return Err(ValidationError::ConfigError(format!(
			"Poll interval too large: {} ms (max {})",
			interval_ms, MAX_POLL_INTERVAL_MS
		)));
	}
	Ok(())
}

/// Validate the inbound update buffer size
pub fn validate_inbound_buffer(size: usize) -> Result<(), ValidationError> {
	if size == 0 {
		return Err(ValidationError::ConfigError(
			"Inbound buffer must hold at least one update".to_string(),
		));
	}
	Ok(())
}

/// Validate timeout in seconds
pub fn validate_timeout_secs(timeout_secs: u64) -> Result<(), ValidationError> {
	if timeout_secs == 0 {
		return Err(ValidationError::ConfigError("Timeout must be greater than 0".to_string()));
	}
	if timeout_secs > 3600 {
		return Err(ValidationError::ConfigError(format!(
			"Timeout too large: {} seconds (max 3600)",
			timeout_secs
		)));
	}
	Ok(())
}


// vim: ts=4
