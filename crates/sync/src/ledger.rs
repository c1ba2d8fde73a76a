//! Version ledger: the last host version observed per document.
//!
//! # Invariants
//!
//! - The ledger never keeps a snapshot alive. Entries hold [`Weak`] references.
//! - [`VersionLedger::try_get_version`] answers only for the exact snapshot
//!   allocation that was tracked, so a removed-then-re-added document with the
//!   same identity never inherits the old entry's version.
//! - Dead entries are invisible to lookups; sweeping them only bounds memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tandem_primitives::{DocumentKey, FilePath, HostVersion};
use tracing::{debug, trace};

use crate::snapshot::DocumentSnapshot;

#[derive(Debug)]
struct Entry {
	snapshot: Weak<DocumentSnapshot>,
	version: HostVersion,
}

impl Entry {
	fn is_live(&self) -> bool {
		self.snapshot.strong_count() > 0
	}
}

/// Map from document identity to the most recently observed host version.
#[derive(Debug, Default)]
pub struct VersionLedger {
	entries: RwLock<HashMap<DocumentKey, Entry>>,
	writes: AtomicUsize,
	purge_interval: usize,
}

impl VersionLedger {
	/// Creates a ledger that sweeps dead entries every `purge_interval` writes (0 disables).
	pub fn new(purge_interval: usize) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			writes: AtomicUsize::new(0),
			purge_interval,
		}
	}

	/// Records the snapshot's version, replacing any prior entry for its identity.
	pub fn track_version(&self, snapshot: &Arc<DocumentSnapshot>) {
		let key = snapshot.key().clone();
		let version = snapshot.version();
		let previous = self.entries.write().insert(
			key,
			Entry {
				snapshot: Arc::downgrade(snapshot),
				version,
			},
		);
		trace!(path = %snapshot.path(), %version, previous = ?previous.map(|e| e.version), "ledger.track");

		if self.purge_interval > 0 {
			let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
			if writes % self.purge_interval == 0 {
				self.purge();
			}
		}
	}

	/// Returns the tracked version if the ledger's entry refers to this exact snapshot.
	pub fn try_get_version(&self, snapshot: &Arc<DocumentSnapshot>) -> Option<HostVersion> {
		let entries = self.entries.read();
		let entry = entries.get(snapshot.key())?;
		// The caller's Arc keeps the allocation alive, and our Weak pins its address,
		// so pointer equality implies the tracked snapshot is still live.
		std::ptr::eq(entry.snapshot.as_ptr(), Arc::as_ptr(snapshot)).then_some(entry.version)
	}

	/// Returns the tracked version for an identity while its snapshot is still alive.
	pub fn version_of(&self, key: &DocumentKey) -> Option<HostVersion> {
		let entries = self.entries.read();
		entries.get(key).filter(|entry| entry.is_live()).map(|entry| entry.version)
	}

	/// Best-effort lookup by path alone, across every project containing it.
	///
	/// Returns the highest live version. Prefer [`Self::try_get_version`]
	/// wherever a snapshot is at hand: the two can disagree while projects
	/// are being reloaded.
	pub fn latest_version(&self, path: &FilePath) -> Option<HostVersion> {
		let entries = self.entries.read();
		entries
			.iter()
			.filter(|(key, entry)| &key.path == path && entry.is_live())
			.map(|(_, entry)| entry.version)
			.max()
	}

	/// Drops the entry for an identity.
	pub fn remove(&self, key: &DocumentKey) -> Option<HostVersion> {
		self.entries.write().remove(key).map(|entry| entry.version)
	}

	/// Sweeps entries whose snapshots have been dropped. Returns how many were removed.
	pub fn purge(&self) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|_, entry| entry.is_live());
		let swept = before - entries.len();
		if swept > 0 {
			debug!(swept, remaining = entries.len(), "ledger.purge");
		}
		swept
	}

	/// Number of entries, including dead ones not yet swept.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn snapshot(project: &str, version: i32) -> Arc<DocumentSnapshot> {
		DocumentSnapshot::new(project, "/proj/Pages/Index.razor", HostVersion::new(version), "<p>hi</p>")
	}

	#[test]
	fn tracked_snapshot_reports_version() {
		let ledger = VersionLedger::new(0);
		let doc = snapshot("/proj/app.csproj", 3);
		ledger.track_version(&doc);
		assert_eq!(ledger.try_get_version(&doc), Some(HostVersion::new(3)));
	}

	#[test]
	fn dropped_snapshot_is_not_found() {
		let ledger = VersionLedger::new(0);
		let doc = snapshot("/proj/app.csproj", 3);
		let key = doc.key().clone();
		ledger.track_version(&doc);
		drop(doc);

		assert_eq!(ledger.version_of(&key), None);
		let readded = snapshot("/proj/app.csproj", 3);
		assert_eq!(ledger.try_get_version(&readded), None);
	}

	#[test]
	fn same_identity_different_instance_is_not_found() {
		let ledger = VersionLedger::new(0);
		let tracked = snapshot("/proj/app.csproj", 4);
		let impostor = snapshot("/proj/app.csproj", 4);
		ledger.track_version(&tracked);
		assert_eq!(ledger.try_get_version(&impostor), None);
		assert_eq!(ledger.try_get_version(&tracked), Some(HostVersion::new(4)));
	}

	#[test]
	fn track_replaces_prior_entry() {
		let ledger = VersionLedger::new(0);
		let v1 = snapshot("/proj/app.csproj", 1);
		let v2 = snapshot("/proj/app.csproj", 2);
		ledger.track_version(&v1);
		ledger.track_version(&v2);
		assert_eq!(ledger.try_get_version(&v1), None);
		assert_eq!(ledger.try_get_version(&v2), Some(HostVersion::new(2)));
		assert_eq!(ledger.len(), 1);
	}

	#[test]
	fn latest_version_spans_projects() {
		let ledger = VersionLedger::new(0);
		let a = snapshot("/a/a.csproj", 7);
		let b = snapshot("/b/b.csproj", 9);
		ledger.track_version(&a);
		ledger.track_version(&b);
		let path = FilePath::new("/proj/Pages/Index.razor");
		assert_eq!(ledger.latest_version(&path), Some(HostVersion::new(9)));

		drop(b);
		assert_eq!(ledger.latest_version(&path), Some(HostVersion::new(7)));
	}

	#[test]
	fn purge_sweeps_dead_entries() {
		let ledger = VersionLedger::new(0);
		let live = snapshot("/a/a.csproj", 1);
		let dead = snapshot("/b/b.csproj", 1);
		ledger.track_version(&live);
		ledger.track_version(&dead);
		drop(dead);

		assert_eq!(ledger.len(), 2);
		assert_eq!(ledger.purge(), 1);
		assert_eq!(ledger.len(), 1);
		assert_eq!(ledger.try_get_version(&live), Some(HostVersion::new(1)));
	}

	#[test]
	fn periodic_purge_runs_on_interval() {
		let ledger = VersionLedger::new(2);
		for project in ["/a.csproj", "/b.csproj", "/c.csproj"] {
			ledger.track_version(&snapshot(project, 1));
		}
		// The second write swept `a`; `b` died afterwards and `c` is not due yet.
		assert_eq!(ledger.len(), 2);

		ledger.track_version(&snapshot("/d.csproj", 1));
		assert_eq!(ledger.len(), 1);
	}

	#[test]
	fn remove_forgets_identity() {
		let ledger = VersionLedger::new(0);
		let doc = snapshot("/proj/app.csproj", 5);
		ledger.track_version(&doc);
		assert_eq!(ledger.remove(doc.key()), Some(HostVersion::new(5)));
		assert_eq!(ledger.try_get_version(&doc), None);
		assert!(ledger.is_empty());
	}
}
