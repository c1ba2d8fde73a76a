//! Debounced reconciliation of project configuration file changes.
//!
//! Each monitored configuration path gets one supervising task that owns its
//! debounce timer. Events reach it over a channel; nothing else can reset or
//! cancel a path's timer.
//!
//! Per path the supervisor cycles `Idle → Pending → Reconciling → Idle`:
//!
//! * `Added`/`Changed` while idle or pending (re)arm the timer and record the
//!   latest kind.
//! * When the timer fires, the reconciler runs once with that kind. Events that
//!   arrive meanwhile arm a fresh cycle that starts after it completes.
//! * `Removed` drops any armed timer, cancels an in-flight reconciliation, and
//!   runs a removal reconciliation once the in-flight one has returned.
//!
//! [`ConfigurationCoalescer::drained`] resolves once every delivered event has
//! been folded into a finished reconciliation, which lets tests drive the
//! debounce with paused time instead of wall-clock sleeps.

mod supervisor;
mod watcher;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tandem_primitives::{FilePath, ProjectKey};
use tandem_worker::{GenerationClock, IdleGuard, IdleTracker, TaskClass};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use self::supervisor::PathSupervisor;
pub use self::watcher::{ConfigEventSink, ConfigurationWatcher, NullWatcher};

/// Kind of filesystem change observed for a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigChangeKind {
	Added,
	Changed,
	Removed,
}

/// One filesystem notification for a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfigurationChangeEvent {
	pub path: FilePath,
	pub kind: ConfigChangeKind,
	pub arrived_at: Instant,
}

impl ProjectConfigurationChangeEvent {
	/// Creates an event stamped with the current time.
	pub fn new(path: impl Into<FilePath>, kind: ConfigChangeKind) -> Self {
		Self {
			path: path.into(),
			kind,
			arrived_at: Instant::now(),
		}
	}
}

/// One coalesced downstream action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
	pub project: ProjectKey,
	pub configuration_path: FilePath,
	pub kind: ConfigChangeKind,
}

/// External action run once per settled burst of configuration changes.
#[async_trait]
pub trait ConfigurationReconciler: Send + Sync {
	/// Applies a settled change. Long-running work should observe `cancel`.
	async fn reconcile(&self, change: Reconciliation, cancel: CancellationToken) -> Result<(), String>;
}

/// Reconciler that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReconciler;

#[async_trait]
impl ConfigurationReconciler for NullReconciler {
	async fn reconcile(&self, change: Reconciliation, _cancel: CancellationToken) -> Result<(), String> {
		info!(project = %change.project, path = %change.configuration_path, kind = ?change.kind, "coalescer.reconcile.null");
		Ok(())
	}
}

/// Message from the coalescer front to a path supervisor.
#[derive(Debug)]
struct PathMsg {
	kind: ConfigChangeKind,
	arrived_at: Instant,
	busy: IdleGuard,
}

#[derive(Debug)]
struct PathHandle {
	project: ProjectKey,
	tx: mpsc::UnboundedSender<PathMsg>,
}

#[derive(Debug, Default)]
struct Registry {
	supervisors: HashMap<FilePath, PathHandle>,
	projects: HashMap<ProjectKey, FilePath>,
}

struct Inner {
	debounce: Duration,
	reconciler: Arc<dyn ConfigurationReconciler>,
	watcher: Arc<dyn ConfigurationWatcher>,
	registry: Mutex<Registry>,
	idle: IdleTracker,
	clock: GenerationClock,
	shutdown: CancellationToken,
}

impl Inner {
	fn notify(&self, event: ProjectConfigurationChangeEvent) -> bool {
		let registry = self.registry.lock();
		let Some(handle) = registry.supervisors.get(&event.path) else {
			debug!(path = %event.path, kind = ?event.kind, "coalescer.event.unmonitored");
			return false;
		};
		let msg = PathMsg {
			kind: event.kind,
			arrived_at: event.arrived_at,
			busy: self.idle.begin(),
		};
		handle.tx.send(msg).is_ok()
	}

	/// Detaches a path's supervisor after queueing a removal for it.
	fn retire(&self, registry: &mut Registry, path: &FilePath) -> bool {
		let Some(handle) = registry.supervisors.remove(path) else {
			return false;
		};
		registry.projects.remove(&handle.project);
		let _ = handle.tx.send(PathMsg {
			kind: ConfigChangeKind::Removed,
			arrived_at: Instant::now(),
			busy: self.idle.begin(),
		});
		true
	}
}

/// Front handle of the configuration change coalescer. Cheap to clone.
#[derive(Clone)]
pub struct ConfigurationCoalescer {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for ConfigurationCoalescer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConfigurationCoalescer")
			.field("debounce", &self.inner.debounce)
			.field("monitored", &self.inner.registry.lock().supervisors.len())
			.field("in_flight", &self.inner.idle.in_flight())
			.finish()
	}
}

impl ConfigurationCoalescer {
	pub fn new(debounce: Duration, reconciler: Arc<dyn ConfigurationReconciler>, watcher: Arc<dyn ConfigurationWatcher>) -> Self {
		Self {
			inner: Arc::new(Inner {
				debounce,
				reconciler,
				watcher,
				registry: Mutex::new(Registry::default()),
				idle: IdleTracker::new(),
				clock: GenerationClock::new(),
				shutdown: CancellationToken::new(),
			}),
		}
	}

	/// Sets or clears the configuration file monitored for `project`.
	///
	/// Clearing, or switching to a different path, retires the previous path
	/// with a removal reconciliation. A configuration file that already exists
	/// on disk is reported as `Added`.
	///
	/// # Panics
	///
	/// Starting a supervisor requires a Tokio runtime context.
	pub fn monitor(&self, project: ProjectKey, configuration: Option<FilePath>) {
		let mut unwatch = Vec::new();
		let mut watch = None;
		{
			let mut registry = self.inner.registry.lock();
			let previous = registry.projects.get(&project).cloned();
			if previous.is_some() && previous == configuration {
				debug!(%project, "coalescer.monitor.unchanged");
				return;
			}

			if let Some(previous) = previous {
				if self.inner.retire(&mut registry, &previous) {
					info!(%project, path = %previous, "coalescer.monitor.retired");
					unwatch.push(previous);
				}
			}

			if let Some(path) = configuration {
				if let Some(other) = registry.supervisors.get(&path).map(|h| h.project.clone()) {
					debug!(path = %path, from = %other, to = %project, "coalescer.monitor.reassigned");
					self.inner.retire(&mut registry, &path);
				}

				let (tx, rx) = mpsc::unbounded_channel();
				let supervisor = PathSupervisor {
					project: project.clone(),
					path: path.clone(),
					debounce: self.inner.debounce,
					reconciler: Arc::clone(&self.inner.reconciler),
					rx,
					clock: self.inner.clock.clone(),
					shutdown: self.inner.shutdown.clone(),
				};
				tandem_worker::spawn(TaskClass::Background, supervisor.run());

				if path.to_path_buf().exists() {
					let _ = tx.send(PathMsg {
						kind: ConfigChangeKind::Added,
						arrived_at: Instant::now(),
						busy: self.inner.idle.begin(),
					});
				}
				registry.supervisors.insert(path.clone(), PathHandle { project: project.clone(), tx });
				registry.projects.insert(project.clone(), path.clone());
				info!(%project, path = %path, "coalescer.monitor.started");
				watch = Some(path);
			}
		}

		// Watchers may report synchronously, so they are called without the registry lock.
		for path in unwatch {
			self.inner.watcher.unwatch(&path);
		}
		if let Some(path) = watch {
			self.inner.watcher.watch(&path, self.sink());
		}
	}

	/// Delivers one change event. Returns false if the path is not monitored.
	pub fn notify(&self, event: ProjectConfigurationChangeEvent) -> bool {
		self.inner.notify(event)
	}

	/// Returns a sink that watchers push events into.
	pub fn sink(&self) -> ConfigEventSink {
		ConfigEventSink::new(Arc::downgrade(&self.inner))
	}

	/// Returns the configuration path monitored for `project`.
	pub fn monitored(&self, project: &ProjectKey) -> Option<FilePath> {
		self.inner.registry.lock().projects.get(project).cloned()
	}

	/// Resolves once every delivered event has been reconciled or superseded.
	pub async fn drained(&self) {
		self.inner.idle.wait_idle().await;
	}

	/// Cancels in-flight reconciliations and stops every supervisor.
	pub fn shutdown(&self) {
		self.inner.shutdown.cancel();
		let paths: Vec<_> = {
			let mut registry = self.inner.registry.lock();
			registry.projects.clear();
			registry.supervisors.drain().map(|(path, _)| path).collect()
		};
		for path in paths {
			self.inner.watcher.unwatch(&path);
		}
	}
}
