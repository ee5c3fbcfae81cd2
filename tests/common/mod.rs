//! Shared helpers for end-to-end tests
//!
//! [`Pair`] runs a server session and a client session against two temporary
//! roots over an in-process channel, the way two processes would over TCP.
#![allow(dead_code)]

use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use mirror::protocol::channel_pair;
use mirror::session::{client_handshake, server_handshake};
use mirror::utils::shutdown_channel;
use mirror::{MirrorConfig, MirrorError, SessionStats};

pub type SessionTask = JoinHandle<Result<SessionStats, MirrorError>>;

pub fn test_config() -> Arc<MirrorConfig> {
	Arc::new(MirrorConfig { poll_interval_ms: 20, ..Default::default() })
}

pub struct Pair {
	pub server_dir: TempDir,
	pub client_dir: TempDir,
	shutdown: watch::Sender<bool>,
	server: SessionTask,
	client: SessionTask,
}

impl Pair {
	/// Two empty roots, mirrored
	pub async fn start() -> Pair {
		Pair::start_with(TempDir::new().unwrap(), TempDir::new().unwrap()).await
	}

	/// Mirror two prepared roots; returns once both handshakes are done
	pub async fn start_with(server_dir: TempDir, client_dir: TempDir) -> Pair {
		let (mut s, mut c) = channel_pair(64);
		let (shutdown, rx) = shutdown_channel();

		let server_root = server_dir.path().to_path_buf();
		let client_root = client_dir.path().to_path_buf();
		let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

		let server = {
			let rx = rx.clone();
			tokio::spawn(async move {
				let session =
					server_handshake(&server_root, test_config(), &mut s.source, &mut s.sink).await?;
				let _ = ready_tx.send(());
				session.run(s.source, s.sink, rx).await
			})
		};
		let client = tokio::spawn(async move {
			let session =
				client_handshake(&client_root, test_config(), &mut c.source, &mut c.sink).await?;
			session.run(c.source, c.sink, rx).await
		});
		ready_rx.await.expect("server handshake failed");

		Pair { server_dir, client_dir, shutdown, server, client }
	}

	pub fn server(&self) -> &Path {
		self.server_dir.path()
	}

	pub fn client(&self) -> &Path {
		self.client_dir.path()
	}

	/// Shut both sessions down; returns (server, client) stats
	pub async fn stop(self) -> (SessionStats, SessionStats) {
		self.shutdown.send(true).unwrap();
		let server = self.server.await.unwrap().expect("server session failed");
		let client = self.client.await.unwrap().expect("client session failed");
		(server, client)
	}
}

/// Poll `check` until it holds or a few seconds pass
pub async fn eventually<F>(mut check: F) -> bool
where
	F: FnMut() -> bool,
{
	for _ in 0..250 {
		if check() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	false
}

/// Let several poll intervals go by
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(200)).await;
}

pub fn write(root: &Path, name: &str, content: &str) {
	let path = root.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

/// Write a file and pin its mtime to `secs` after the epoch
pub fn write_at(root: &Path, name: &str, content: &str, secs: i64) {
	write(root, name, content);
	filetime::set_file_mtime(root.join(name), FileTime::from_unix_time(secs, 0)).unwrap();
}

pub fn read(root: &Path, name: &str) -> Option<String> {
	fs::read_to_string(root.join(name)).ok()
}

pub fn exists(root: &Path, name: &str) -> bool {
	fs::symlink_metadata(root.join(name)).is_ok()
}

pub fn link_target(root: &Path, name: &str) -> Option<String> {
	fs::read_link(root.join(name)).ok().map(|t| t.to_string_lossy().into_owned())
}

// vim: ts=4
