use std::sync::Arc;
use std::time::Duration;

use tandem_primitives::{FilePath, ProjectKey};
use tandem_worker::{GenerationClock, IdleGuard};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{ConfigChangeKind, ConfigurationReconciler, PathMsg, Reconciliation};

/// Armed debounce cycle.
#[derive(Debug)]
struct Pending {
	kind: ConfigChangeKind,
	deadline: Instant,
	_busy: IdleGuard,
}

impl Pending {
	/// Folds an event into the armed cycle: latest kind wins, the timer restarts.
	fn rearm(previous: Option<Self>, kind: ConfigChangeKind, deadline: Instant, busy: IdleGuard) -> Self {
		match previous {
			Some(previous) => Self {
				kind,
				deadline,
				_busy: previous._busy,
			},
			None => Self { kind, deadline, _busy: busy },
		}
	}
}

/// Owner of one configuration path's debounce timer and reconciliation cycle.
pub(super) struct PathSupervisor {
	pub(super) project: ProjectKey,
	pub(super) path: FilePath,
	pub(super) debounce: Duration,
	pub(super) reconciler: Arc<dyn ConfigurationReconciler>,
	pub(super) rx: mpsc::UnboundedReceiver<PathMsg>,
	pub(super) clock: GenerationClock,
	pub(super) shutdown: CancellationToken,
}

impl PathSupervisor {
	pub(super) async fn run(mut self) {
		let mut pending: Option<Pending> = None;
		loop {
			let deadline = pending.as_ref().map(|p| p.deadline);
			let msg = match deadline {
				None => self.rx.recv().await,
				Some(deadline) => tokio::select! {
					msg = self.rx.recv() => msg,
					() = time::sleep_until(deadline) => {
						if let Some(due) = pending.take() {
							pending = self.reconcile(due.kind, due._busy).await;
						}
						continue;
					}
				},
			};
			let Some(msg) = msg else {
				break;
			};
			pending = self.admit(pending, msg).await;
		}
		debug!(path = %self.path, "coalescer.supervisor.exit");
	}

	async fn admit(&mut self, pending: Option<Pending>, msg: PathMsg) -> Option<Pending> {
		if msg.kind == ConfigChangeKind::Removed {
			if let Some(superseded) = pending {
				debug!(path = %self.path, superseded = ?superseded.kind, "coalescer.pending.cancelled");
			}
			return self.reconcile(ConfigChangeKind::Removed, msg.busy).await;
		}
		debug!(path = %self.path, kind = ?msg.kind, rearm = pending.is_some(), "coalescer.pending.armed");
		Some(Pending::rearm(pending, msg.kind, msg.arrived_at + self.debounce, msg.busy))
	}

	/// Runs reconciliations until no removal is outstanding. Returns the cycle armed meanwhile.
	async fn reconcile(&mut self, kind: ConfigChangeKind, busy: IdleGuard) -> Option<Pending> {
		let mut next = None;
		let mut kind = kind;
		let mut _busy = busy;
		loop {
			match self.reconcile_once(kind, &mut next).await {
				Some(removal) => {
					kind = ConfigChangeKind::Removed;
					_busy = removal;
				}
				None => return next,
			}
		}
	}

	/// Runs one reconciliation while buffering incoming events.
	///
	/// Returns the guard of a removal that arrived during the run and still has to be applied.
	async fn reconcile_once(&mut self, kind: ConfigChangeKind, next: &mut Option<Pending>) -> Option<IdleGuard> {
		let token = self.clock.issue(&self.shutdown);
		let change = Reconciliation {
			project: self.project.clone(),
			configuration_path: self.path.clone(),
			kind,
		};
		debug!(path = %self.path, ?kind, generation = token.generation(), "coalescer.reconcile.start");

		let reconciler = Arc::clone(&self.reconciler);
		let run = reconciler.reconcile(change, token.token().clone());
		tokio::pin!(run);

		let mut removal: Option<IdleGuard> = None;
		let mut open = true;
		let outcome = loop {
			tokio::select! {
				biased;
				outcome = &mut run => break outcome,
				msg = self.rx.recv(), if open => match msg {
					Some(msg) if msg.kind == ConfigChangeKind::Removed => {
						*next = None;
						if kind != ConfigChangeKind::Removed {
							token.cancel();
						}
						removal.get_or_insert(msg.busy);
					}
					Some(msg) => {
						*next = Some(Pending::rearm(next.take(), msg.kind, msg.arrived_at + self.debounce, msg.busy));
					}
					None => {
						// A retired path queues its removal before closing; that removal still runs to completion.
						open = false;
						if kind != ConfigChangeKind::Removed {
							token.cancel();
						}
					}
				},
			}
		};

		match outcome {
			Ok(()) => debug!(path = %self.path, ?kind, generation = token.generation(), "coalescer.reconcile.done"),
			Err(message) if token.is_cancelled() => {
				debug!(path = %self.path, ?kind, generation = token.generation(), %message, "coalescer.reconcile.cancelled")
			}
			Err(message) => error!(path = %self.path, ?kind, generation = token.generation(), %message, "coalescer.reconcile.failed"),
		}

		// Repeated removals collapse into the one just applied.
		if kind == ConfigChangeKind::Removed {
			return None;
		}
		removal
	}
}
