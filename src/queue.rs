//! De-duplicating outbound work queue
//!
//! Holds at most one pending entry per path. Pushing a path that is already
//! pending replaces the older entry and moves it to the back, so a burst of
//! edits collapses into a single transmission and a delete cascade pushed
//! children-first stays children-first even if some of those paths were
//! queued earlier.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::types::PathEntry;

#[derive(Debug, Default)]
struct QueueInner {
	order: VecDeque<String>,
	pending: HashMap<String, PathEntry>,
	closed: bool,
}

/// Pending outbound updates, keyed by path
#[derive(Debug, Default)]
pub struct SyncQueue {
	inner: Mutex<QueueInner>,
	notify: Notify,
}

impl SyncQueue {
	pub fn new() -> Self {
		SyncQueue::default()
	}

	/// Enqueue an entry; returns true if it replaced a pending one
	///
	/// Entries pushed after [`close`](Self::close) are dropped.
	pub fn push(&self, entry: PathEntry) -> bool {
		let replaced = {
			let mut inner = self.lock();
			if inner.closed {
				return false;
			}
			let replaced = inner.pending.insert(entry.path.clone(), entry.clone()).is_some();
			if replaced {
				inner.order.retain(|p| p != &entry.path);
			}
			inner.order.push_back(entry.path);
			replaced
		};
		self.notify.notify_one();
		replaced
	}

	/// Take the next entry without waiting
	pub fn try_pop(&self) -> Option<PathEntry> {
		let mut inner = self.lock();
		if inner.closed {
			return None;
		}
		while let Some(path) = inner.order.pop_front() {
			if let Some(entry) = inner.pending.remove(&path) {
				return Some(entry);
			}
		}
		None
	}

	/// Wait for the next entry; returns None once the queue is closed
	pub async fn pop(&self) -> Option<PathEntry> {
		loop {
			let notified = self.notify.notified();
			if self.is_closed() {
				return None;
			}
			if let Some(entry) = self.try_pop() {
				return Some(entry);
			}
			notified.await;
		}
	}

	/// Stop accepting and handing out entries; pending ones are discarded
	pub fn close(&self) {
		{
			let mut inner = self.lock();
			inner.closed = true;
			inner.order.clear();
			inner.pending.clear();
		}
		self.notify.notify_waiters();
	}

	pub fn is_closed(&self) -> bool {
		self.lock().closed
	}

	pub fn len(&self) -> usize {
		self.lock().pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, path: &str) -> bool {
		self.lock().pending.contains_key(path)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}


// vim: ts=4
