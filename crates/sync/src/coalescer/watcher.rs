use std::fmt;
use std::sync::Weak;

use tandem_primitives::FilePath;

use super::{Inner, ProjectConfigurationChangeEvent};

/// Filesystem watcher collaborator for configuration files.
pub trait ConfigurationWatcher: Send + Sync {
	/// Starts reporting changes of `path` into `sink`.
	fn watch(&self, path: &FilePath, sink: ConfigEventSink);

	/// Stops reporting changes of `path`.
	fn unwatch(&self, path: &FilePath);
}

/// Watcher that never reports anything; events arrive through explicit notifications only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWatcher;

impl ConfigurationWatcher for NullWatcher {
	fn watch(&self, _path: &FilePath, _sink: ConfigEventSink) {}

	fn unwatch(&self, _path: &FilePath) {}
}

/// Entry point watchers push events into.
///
/// Holds the coalescer weakly so a watcher outliving it never keeps it alive.
#[derive(Clone)]
pub struct ConfigEventSink {
	inner: Weak<Inner>,
}

impl ConfigEventSink {
	pub(super) fn new(inner: Weak<Inner>) -> Self {
		Self { inner }
	}

	/// Delivers an event. Returns false if the coalescer is gone or the path is not monitored.
	pub fn notify(&self, event: ProjectConfigurationChangeEvent) -> bool {
		self.inner.upgrade().is_some_and(|inner| inner.notify(event))
	}
}

impl fmt::Debug for ConfigEventSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConfigEventSink").field("live", &(self.inner.strong_count() > 0)).finish()
	}
}
