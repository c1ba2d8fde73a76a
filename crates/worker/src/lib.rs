//! Worker primitives shared by the sync layer: classified task spawning,
//! generation-scoped cancellation, and idle tracking for drain hooks.

mod class;
mod idle;
mod spawn;
mod token;

pub use class::TaskClass;
pub use idle::{IdleGuard, IdleTracker};
pub use spawn::spawn;
pub use token::{GenerationClock, GenerationToken};
pub use tokio_util::sync::CancellationToken;
