//! Request execution queue.
//!
//! Admission is bounded by a semaphore shared across documents. Within one
//! document, mutations take a write lock and queries a read lock on a fair
//! (FIFO) [`tokio::sync::RwLock`], so queries see either the whole prior
//! state or the whole new state, and requests are ordered by arrival.
//!
//! Every wait races the caller's [`CancellationToken`]. A request cancelled
//! before its closure runs has no side effects; closures themselves run to
//! completion without yielding.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tandem_primitives::DocumentKey;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// Per-document ordering plus global admission control for protocol requests.
#[derive(Debug)]
pub struct RequestQueue {
	permits: Semaphore,
	documents: Mutex<HashMap<DocumentKey, Arc<RwLock<()>>>>,
}

impl RequestQueue {
	/// Creates a queue admitting up to `capacity` requests at once.
	pub fn new(capacity: usize) -> Self {
		Self {
			permits: Semaphore::new(capacity.max(1)),
			documents: Mutex::new(HashMap::new()),
		}
	}

	fn document_lock(&self, key: &DocumentKey) -> Arc<RwLock<()>> {
		Arc::clone(self.documents.lock().entry(key.clone()).or_default())
	}

	/// Runs a read-only operation against a consistent view of `key`.
	pub async fn query<T>(&self, key: &DocumentKey, cancel: &CancellationToken, op: impl FnOnce() -> T) -> Result<T> {
		let _permit = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(cancelled(key, "admission")),
			permit = self.permits.acquire() => permit.map_err(|_| Error::Cancelled)?,
		};
		let lock = self.document_lock(key);
		let _guard = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(cancelled(key, "read_lock")),
			guard = lock.read() => guard,
		};
		if cancel.is_cancelled() {
			return Err(cancelled(key, "before_query"));
		}
		Ok(op())
	}

	/// Runs a state-changing operation on `key`, excluding concurrent queries on it.
	pub async fn mutate<T>(&self, key: &DocumentKey, cancel: &CancellationToken, op: impl FnOnce() -> T) -> Result<T> {
		let _permit = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(cancelled(key, "admission")),
			permit = self.permits.acquire() => permit.map_err(|_| Error::Cancelled)?,
		};
		let lock = self.document_lock(key);
		let _guard = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(cancelled(key, "write_lock")),
			guard = lock.write() => guard,
		};
		if cancel.is_cancelled() {
			return Err(cancelled(key, "before_mutate"));
		}
		Ok(op())
	}

	/// Drops the ordering state of a removed document.
	///
	/// The entry is kept while any request still holds or waits on the
	/// document's lock, so late requests keep excluding each other. Returns
	/// true if the entry was dropped.
	pub fn forget(&self, key: &DocumentKey) -> bool {
		let mut documents = self.documents.lock();
		// Clones are only handed out under this mutex, so the count is stable here.
		match documents.get(key) {
			Some(lock) if Arc::strong_count(lock) == 1 => documents.remove(key).is_some(),
			_ => false,
		}
	}

	/// Number of admission permits currently free.
	pub fn available(&self) -> usize {
		self.permits.available_permits()
	}
}

fn cancelled(key: &DocumentKey, stage: &'static str) -> Error {
	debug!(path = %key.path, stage, "queue.request.cancelled");
	Error::Cancelled
}
