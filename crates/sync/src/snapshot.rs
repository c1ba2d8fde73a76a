//! Logical document snapshots and the collaborators that supply them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tandem_primitives::{DocumentKey, FilePath, HostVersion, ProjectKey, Rope};

use crate::mapping::{Segment, SourceMapping};

/// Immutable view of a logical document at one host version.
///
/// Snapshots are shared as `Arc<DocumentSnapshot>`. Identity of the allocation
/// matters: the version ledger only answers for the exact snapshot it tracked.
#[derive(Debug)]
pub struct DocumentSnapshot {
	key: DocumentKey,
	version: HostVersion,
	text: Rope,
}

impl DocumentSnapshot {
	/// Creates a shared snapshot.
	pub fn new(project: impl Into<ProjectKey>, path: impl Into<FilePath>, version: HostVersion, text: impl Into<Rope>) -> Arc<Self> {
		Arc::new(Self {
			key: DocumentKey::new(project, path),
			version,
			text: text.into(),
		})
	}

	pub fn key(&self) -> &DocumentKey {
		&self.key
	}

	pub fn project(&self) -> &ProjectKey {
		&self.key.project
	}

	pub fn path(&self) -> &FilePath {
		&self.key.path
	}

	pub fn version(&self) -> HostVersion {
		self.version
	}

	pub fn text(&self) -> &Rope {
		&self.text
	}
}

/// Project-system view used to resolve protocol URIs to document snapshots.
pub trait DocumentResolver: Send + Sync {
	/// Resolves a path to its current snapshot.
	///
	/// When several projects contain the path, implementations pick one deterministically.
	fn resolve(&self, path: &FilePath) -> Option<Arc<DocumentSnapshot>>;
}

/// In-memory [`DocumentResolver`] holding the latest snapshot per document.
#[derive(Debug, Default)]
pub struct SnapshotSet {
	docs: RwLock<BTreeMap<DocumentKey, Arc<DocumentSnapshot>>>,
}

impl SnapshotSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `snapshot` as current for its document, returning the one it replaces.
	pub fn insert(&self, snapshot: Arc<DocumentSnapshot>) -> Option<Arc<DocumentSnapshot>> {
		self.docs.write().insert(snapshot.key().clone(), snapshot)
	}

	pub fn remove(&self, key: &DocumentKey) -> Option<Arc<DocumentSnapshot>> {
		self.docs.write().remove(key)
	}

	pub fn len(&self) -> usize {
		self.docs.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.docs.read().is_empty()
	}
}

impl DocumentResolver for SnapshotSet {
	fn resolve(&self, path: &FilePath) -> Option<Arc<DocumentSnapshot>> {
		// Keys order by project first, so the first hit is the lowest project key.
		self.docs.read().iter().find(|(key, _)| &key.path == path).map(|(_, snapshot)| Arc::clone(snapshot))
	}
}

/// Content produced by the generation pipeline for one snapshot.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
	/// Generated code buffer.
	pub code: Rope,
	/// Generated markup buffer, offset-aligned with the logical document.
	pub markup: Rope,
	/// Logical-to-code span correspondences.
	pub mappings: Vec<SourceMapping>,
	/// Structural segmentation of the logical document.
	pub segments: Vec<Segment>,
}

/// External code-generation pipeline.
#[async_trait]
pub trait GenerationPipeline: Send + Sync {
	/// Generates both artifacts for `snapshot`. Errors are reported as plain messages.
	async fn generate(&self, snapshot: &DocumentSnapshot) -> Result<GenerationOutput, String>;
}
