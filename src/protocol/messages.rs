//! Wire messages
//!
//! Every message is one JSON object on one line, tagged by `cmd`. Entry
//! fields use the short names of the line protocol (`pth`, `typ`, `mt`...).

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use crate::state::Snapshot;
use crate::types::{EntryKind, PathEntry, Update};
use crate::util;

/// One entry as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
	pub pth: String,
	pub typ: EntryKind,
	pub mt: i64,
	#[serde(default, skip_serializing_if = "is_zero")]
	pub sz: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dig: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tgt: Option<String>,
	#[serde(default, skip_serializing_if = "is_false")]
	pub del: bool,
	/// Base64 file content, Updates only
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dat: Option<String>,
}

fn is_zero(n: &u64) -> bool {
	*n == 0
}

fn is_false(b: &bool) -> bool {
	!*b
}

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Message {
	/// Client's snapshot, opens the handshake
	Init { state: Vec<WireEntry> },
	/// Server's snapshot, answers `INIT`
	State { state: Vec<WireEntry> },
	/// One live update
	Upd(WireEntry),
	/// Error report; the sender closes afterwards
	Err { msg: String },
	/// Orderly close
	Quit,
}

impl Message {
	pub fn init(snapshot: &Snapshot) -> Self {
		Message::Init { state: snapshot.iter().map(WireEntry::from).collect() }
	}

	pub fn state(snapshot: &Snapshot) -> Self {
		Message::State { state: snapshot.iter().map(WireEntry::from).collect() }
	}

	pub fn error(msg: impl Into<String>) -> Self {
		Message::Err { msg: msg.into() }
	}

	/// Short name for logs and error reports
	pub fn name(&self) -> &'static str {
		match self {
			Message::Init { .. } => "INIT",
			Message::State { .. } => "STATE",
			Message::Upd(_) => "UPD",
			Message::Err { .. } => "ERR",
			Message::Quit => "QUIT",
		}
	}

	pub fn encode(&self) -> Result<String, ProtocolError> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn decode(line: &str) -> Result<Self, ProtocolError> {
		Ok(serde_json::from_str(line)?)
	}
}

impl From<&PathEntry> for WireEntry {
	fn from(entry: &PathEntry) -> Self {
		WireEntry {
			pth: entry.path.clone(),
			typ: entry.kind,
			mt: entry.mtime,
			sz: entry.size,
			dig: entry.digest.clone(),
			tgt: entry.target.clone(),
			del: entry.deleted,
			dat: None,
		}
	}
}

impl From<&Update> for WireEntry {
	fn from(update: &Update) -> Self {
		let mut wire = WireEntry::from(&update.entry);
		wire.dat = update.data.as_deref().map(util::encode_data);
		wire
	}
}

impl WireEntry {
	/// Metadata part; any content is ignored
	pub fn to_entry(&self) -> PathEntry {
		let deleted = self.del;
		PathEntry {
			path: self.pth.clone(),
			kind: self.typ,
			mtime: self.mt,
			size: if deleted { 0 } else { self.sz },
			digest: if deleted { None } else { self.dig.clone() },
			target: if deleted { None } else { self.tgt.clone() },
			deleted,
		}
	}

	/// Decode into an Update, checking that content is present exactly when
	/// the entry is a live file
	pub fn into_update(self) -> Result<Update, ProtocolError> {
		let entry = self.to_entry();
		let wants_data = entry.kind == EntryKind::File && !entry.deleted;
		let data = match (&self.dat, wants_data) {
			(Some(dat), true) => Some(util::decode_data(dat)?),
			(None, true) => {
				return Err(ProtocolError::ProtocolViolation(format!(
					"File update for {} carries no data",
					entry.path
				)))
			}
			(Some(_), false) => {
				return Err(ProtocolError::ProtocolViolation(format!(
					"Unexpected data for {} {}",
					entry.kind, entry.path
				)))
			}
			(None, false) => None,
		};
		Ok(Update::new(entry, data))
	}
}

/// Rebuild a snapshot from a received `state` array
///
/// Duplicate paths are a protocol violation; structural checks happen later
/// in [`Snapshot::validate`].
pub fn snapshot_from_wire(state: &[WireEntry]) -> Result<Snapshot, ProtocolError> {
	let mut snapshot = Snapshot::new();
	for wire in state {
		if wire.dat.is_some() {
			return Err(ProtocolError::ProtocolViolation(format!(
				"State entry {} carries data",
				wire.pth
			)));
		}
		if snapshot.insert(wire.to_entry()).is_some() {
			return Err(ProtocolError::ProtocolViolation(format!(
				"Duplicate path {} in state",
				wire.pth
			)));
		}
	}
	Ok(snapshot)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_update_wire_format() {
		let entry = PathEntry::file("dir/foo.txt", 1234, 3, "DIGEST");
		let update = Update::new(entry, Some(b"abc".to_vec()));
		let line = Message::Upd(WireEntry::from(&update)).encode().unwrap();

		let value: serde_json::Value = serde_json::from_str(&line).unwrap();
		assert_eq!(value["cmd"], "UPD");
		assert_eq!(value["pth"], "dir/foo.txt");
		assert_eq!(value["typ"], "F");
		assert_eq!(value["mt"], 1234);
		assert_eq!(value["sz"], 3);
		assert_eq!(value["dat"], "YWJj");
		assert!(value.get("del").is_none());
		assert!(value.get("tgt").is_none());
	}

	#[test]
	fn test_decode_tombstone() {
		let msg = Message::decode(r#"{"cmd":"UPD","pth":"dir","typ":"D","mt":5,"del":true}"#).unwrap();
		let Message::Upd(wire) = msg else { panic!("expected UPD") };
		let update = wire.into_update().unwrap();
		assert!(update.entry.deleted);
		assert!(update.entry.is_dir());
		assert!(update.data.is_none());
	}

	#[test]
	fn test_decode_quit_and_err() {
		assert_eq!(Message::decode(r#"{"cmd":"QUIT"}"#).unwrap(), Message::Quit);
		assert_eq!(
			Message::decode(r#"{"cmd":"ERR","msg":"busy"}"#).unwrap(),
			Message::error("busy")
		);
	}

	#[test]
	fn test_file_update_without_data_is_rejected() {
		let wire = WireEntry::from(&PathEntry::file("foo.txt", 1, 3, "x"));
		assert!(matches!(wire.into_update(), Err(ProtocolError::ProtocolViolation(_))));
	}

	#[test]
	fn test_unknown_command_fails_to_decode() {
		assert!(matches!(Message::decode(r#"{"cmd":"LIST"}"#), Err(ProtocolError::Decode(_))));
		assert!(Message::decode("not json").is_err());
	}

	#[test]
	fn test_duplicate_state_paths_are_rejected() {
		let wire = WireEntry::from(&PathEntry::directory("dir", 1));
		let result = snapshot_from_wire(&[wire.clone(), wire]);
		assert!(matches!(result, Err(ProtocolError::ProtocolViolation(_))));
	}

	#[test]
	fn test_state_round_trips_snapshot() {
		let snapshot = Snapshot::from_entries(vec![
			PathEntry::directory("a", 10),
			PathEntry::file("a/foo.txt", 20, 3, "d"),
			PathEntry::symlink("b", 30, "a/foo.txt"),
		]);
		let Message::State { state } = Message::state(&snapshot) else { unreachable!() };
		assert_eq!(snapshot_from_wire(&state).unwrap(), snapshot);
	}
}

// vim: ts=4
