//! Generated-artifact store with version-gated atomic publication.
//!
//! # Purpose
//!
//! Hold the current Code and Markup artifacts per (project, file) and notify
//! subscribers when either is replaced.
//!
//! # Mental model
//!
//! * Each document owns a [`Slot`] with one [`ArcSwapOption`] per artifact kind.
//! * Readers load an `Arc<GeneratedArtifact>` and never observe a partial write:
//!   artifacts are immutable once published.
//! * Writers serialize per slot on a narrow mutex that covers the version check,
//!   the swap, and the subscriber fan-out. Nothing awaits inside it.
//!
//! # Invariants
//!
//! * For a fixed (project, file, kind) the stored host version never decreases.
//! * A publish at the stored version is a no-op ([`PublishOutcome::Duplicate`]).
//! * A publish below the stored version is rejected and logged ([`PublishOutcome::Rejected`]).
//! * Each attached subscriber receives every applied artifact exactly once, in
//!   publish order. A subscriber whose buffer is full is detached rather than
//!   blocking the publisher; its receiver then observes closure.
//!
//! # Concurrency & ordering
//!
//! * `get` is a map read-lock plus a wait-free `ArcSwap` load.
//! * Publishes to different documents never contend beyond the map read-lock.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use tandem_primitives::{ArtifactKind, DocumentKey, FilePath, HostVersion, ProjectKey, Rope};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::mapping::ProjectionMap;

/// One generated buffer, stamped with the host version it was generated from.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
	pub project: ProjectKey,
	pub path: FilePath,
	pub kind: ArtifactKind,
	pub text: Rope,
	pub host_version: HostVersion,
	/// Projection side table shared with the sibling artifact of the same generation.
	pub map: Arc<ProjectionMap>,
}

impl GeneratedArtifact {
	pub fn key(&self) -> DocumentKey {
		DocumentKey::new(self.project.clone(), self.path.clone())
	}
}

/// Result of [`ArtifactStore::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
	/// Stored and fanned out; carries the version it replaced.
	Applied { previous: Option<HostVersion> },
	/// Same version already stored; nothing changed.
	Duplicate,
	/// Older than the stored version; nothing changed.
	Rejected { current: HostVersion },
}

impl PublishOutcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, Self::Applied { .. })
	}
}

/// Receiver of artifacts published for one document.
pub type ArtifactReceiver = mpsc::Receiver<Arc<GeneratedArtifact>>;

#[derive(Debug, Default)]
struct Slot {
	code: ArcSwapOption<GeneratedArtifact>,
	markup: ArcSwapOption<GeneratedArtifact>,
	/// Writer region: serializes publishes and owns the subscriber list.
	writer: Mutex<Vec<mpsc::Sender<Arc<GeneratedArtifact>>>>,
}

impl Slot {
	fn cell(&self, kind: ArtifactKind) -> &ArcSwapOption<GeneratedArtifact> {
		match kind {
			ArtifactKind::Code => &self.code,
			ArtifactKind::Markup => &self.markup,
		}
	}
}

/// Store of the current generated artifacts per document.
#[derive(Debug)]
pub struct ArtifactStore {
	slots: RwLock<HashMap<DocumentKey, Arc<Slot>>>,
	subscriber_buffer: usize,
}

impl ArtifactStore {
	/// Creates a store whose subscribers buffer up to `subscriber_buffer` notifications.
	pub fn new(subscriber_buffer: usize) -> Self {
		Self {
			slots: RwLock::new(HashMap::new()),
			subscriber_buffer: subscriber_buffer.max(1),
		}
	}

	fn slot(&self, key: &DocumentKey) -> Option<Arc<Slot>> {
		self.slots.read().get(key).cloned()
	}

	fn slot_or_insert(&self, key: &DocumentKey) -> Arc<Slot> {
		if let Some(slot) = self.slot(key) {
			return slot;
		}
		Arc::clone(self.slots.write().entry(key.clone()).or_default())
	}

	/// Replaces the stored artifact of its kind unless the store already holds a newer one.
	pub fn publish(&self, artifact: Arc<GeneratedArtifact>) -> PublishOutcome {
		let key = artifact.key();
		let slot = self.slot_or_insert(&key);
		let mut subscribers = slot.writer.lock();

		let cell = slot.cell(artifact.kind);
		let previous = cell.load_full().map(|current| current.host_version);
		match previous {
			Some(current) if artifact.host_version < current => {
				warn!(
					path = %artifact.path,
					kind = %artifact.kind,
					version = %artifact.host_version,
					%current,
					"store.publish.rejected_out_of_order"
				);
				return PublishOutcome::Rejected { current };
			}
			Some(current) if artifact.host_version == current => {
				debug!(path = %artifact.path, kind = %artifact.kind, version = %current, "store.publish.duplicate");
				return PublishOutcome::Duplicate;
			}
			_ => {}
		}

		cell.store(Some(Arc::clone(&artifact)));
		subscribers.retain(|tx| match tx.try_send(Arc::clone(&artifact)) {
			Ok(()) => true,
			Err(mpsc::error::TrySendError::Full(_)) => {
				warn!(path = %artifact.path, "store.subscriber.lagging_detached");
				false
			}
			Err(mpsc::error::TrySendError::Closed(_)) => false,
		});
		debug!(
			path = %artifact.path,
			kind = %artifact.kind,
			version = %artifact.host_version,
			previous = ?previous,
			subscribers = subscribers.len(),
			"store.publish.applied"
		);

		PublishOutcome::Applied { previous }
	}

	/// Returns the current artifact of `kind` for a document.
	pub fn get(&self, key: &DocumentKey, kind: ArtifactKind) -> Option<Arc<GeneratedArtifact>> {
		self.slot(key)?.cell(kind).load_full()
	}

	/// Registers for every artifact published for a document after this call.
	pub fn subscribe(&self, key: &DocumentKey) -> ArtifactReceiver {
		let (tx, rx) = mpsc::channel(self.subscriber_buffer);
		self.slot_or_insert(key).writer.lock().push(tx);
		rx
	}

	/// Drops both artifacts and all subscriptions of a document.
	///
	/// Subscribers observe channel closure once any buffered notifications are drained.
	pub fn remove_document(&self, key: &DocumentKey) -> bool {
		let removed = self.slots.write().remove(key);
		if let Some(slot) = &removed {
			slot.writer.lock().clear();
		}
		removed.is_some()
	}

	pub fn len(&self) -> usize {
		self.slots.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.read().is_empty()
	}
}
