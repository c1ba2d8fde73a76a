use std::sync::Arc;

use tokio::sync::watch;

/// Counts in-flight units of work so callers can wait for quiescence.
///
/// Each [`IdleGuard`] holds one unit. The tracker is idle when no guards are alive.
#[derive(Debug, Clone)]
pub struct IdleTracker {
	busy: Arc<watch::Sender<usize>>,
}

impl Default for IdleTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl IdleTracker {
	/// Creates an idle tracker.
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(0);
		Self { busy: Arc::new(tx) }
	}

	/// Marks one unit of work as started.
	pub fn begin(&self) -> IdleGuard {
		self.busy.send_modify(|n| *n += 1);
		IdleGuard { busy: Arc::clone(&self.busy) }
	}

	/// Returns the number of units still in flight.
	pub fn in_flight(&self) -> usize {
		*self.busy.borrow()
	}

	/// Resolves once no units are in flight.
	pub async fn wait_idle(&self) {
		let mut rx = self.busy.subscribe();
		// The sender lives in `self`, so the channel cannot close while we wait.
		let _ = rx.wait_for(|n| *n == 0).await;
	}
}

/// One in-flight unit of work; released on drop.
#[derive(Debug)]
#[must_use = "work is considered finished as soon as the guard is dropped"]
pub struct IdleGuard {
	busy: Arc<watch::Sender<usize>>,
}

impl Drop for IdleGuard {
	fn drop(&mut self) {
		self.busy.send_modify(|n| *n = n.saturating_sub(1));
	}
}
