//! Core types for versioned document projection: host versions, language kinds,
//! normalized paths, source spans, and LSP position conversion.

/// Language and artifact classification.
pub mod kind;
/// Normalized file paths and project identities.
pub mod path;
/// Rope-backed LSP position conversion.
pub mod position;
/// Character spans in logical and generated text.
pub mod span;
/// Host document version stamps.
pub mod version;

pub use kind::{ArtifactKind, LanguageKind, MappingBehavior, TextEditKind};
pub use path::{DocumentKey, FilePath, ProjectKey, path_from_uri, uri_from_path};
pub use position::{OffsetEncoding, PositionError, char_to_position, chars_to_range, position_to_char, range_to_chars};
pub use ropey::{Rope, RopeSlice};
pub use span::{CharIdx, Span};
pub use version::HostVersion;
