use tandem_primitives::{ArtifactKind, FilePath, PositionError};
use thiserror::Error;

/// Result type for sync-layer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of one request or lifecycle operation.
///
/// Every variant is scoped to a single document or request. Staleness is not an
/// error: it is reported through the `host_document_version` of a response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// No snapshot is known for the document.
	#[error("document not found: {path}")]
	DocumentNotFound {
		/// Path that failed to resolve.
		path: FilePath,
	},

	/// The document exists but has no generated artifact of this kind yet.
	#[error("no {kind} artifact for {path}")]
	ArtifactNotFound {
		/// Logical document path.
		path: FilePath,
		/// Requested artifact kind.
		kind: ArtifactKind,
	},

	/// A position or range does not fit the text it was resolved against.
	#[error("position out of range: {0}")]
	PositionOutOfRange(#[from] PositionError),

	/// The caller cancelled the request.
	#[error("request cancelled")]
	Cancelled,

	/// The URI does not name a local file.
	#[error("not a file URI: {uri}")]
	InvalidUri {
		/// The offending URI.
		uri: String,
	},

	/// The external generation pipeline failed for one document.
	#[error("generation failed for {path}: {message}")]
	Generation {
		/// Logical document path.
		path: FilePath,
		/// Pipeline-provided failure message.
		message: String,
	},
}

impl Error {
	/// Returns true for the not-found family of faults.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::DocumentNotFound { .. } | Self::ArtifactNotFound { .. })
	}

	/// Returns true if the caller cancelled the request.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}
