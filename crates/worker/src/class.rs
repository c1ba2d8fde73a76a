/// Shared execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TaskClass {
	/// Supervisors and reconciliations that run behind the request path.
	Background,
}

impl TaskClass {
	/// Returns a stable name for structured logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Background => "background",
		}
	}
}
