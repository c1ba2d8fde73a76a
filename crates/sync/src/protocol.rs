//! Wire shapes of the protocol operations exposed to the outer server.

use lsp_types::{FormattingOptions, Position, Range, TextEdit, Uri};
use serde::{Deserialize, Serialize};
use tandem_primitives::{HostVersion, LanguageKind, MappingBehavior, TextEditKind};

/// How the generation a response was computed from relates to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
	/// Computed against the document's current version.
	Current,
	/// Computed against an older generation; the document is at `current`.
	Stale { current: HostVersion },
	/// The ledger holds no version for this snapshot.
	#[default]
	Unknown,
}

impl Freshness {
	/// Compares a generation version with the ledger's version for the document.
	pub fn compare(generated: HostVersion, tracked: Option<HostVersion>) -> Self {
		match tracked {
			Some(current) if current == generated => Self::Current,
			Some(current) if current > generated => Self::Stale { current },
			_ => Self::Unknown,
		}
	}

	pub fn is_current(self) -> bool {
		self == Self::Current
	}
}

/// Responses tagged with the host version they were computed against.
pub trait Versioned {
	fn host_document_version(&self) -> HostVersion;

	fn freshness(&self) -> Freshness;

	/// Returns true if the caller's view of the document predates this response.
	fn is_ahead_of(&self, caller: HostVersion) -> bool {
		self.host_document_version() > caller
	}
}

macro_rules! versioned {
	($($ty:ty),+) => {
		$(impl Versioned for $ty {
			fn host_document_version(&self) -> HostVersion {
				self.host_document_version
			}

			fn freshness(&self) -> Freshness {
				self.freshness
			}
		})+
	};
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageQueryParams {
	pub uri: Uri,
	pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageQueryResponse {
	pub kind: LanguageKind,
	/// Character offset of `position` in the generated space.
	pub position_index: usize,
	/// Position in the generated space.
	pub position: Position,
	pub host_document_version: HostVersion,
	#[serde(skip)]
	pub freshness: Freshness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapToDocumentRangesParams {
	pub kind: LanguageKind,
	pub razor_document_uri: Uri,
	pub projected_ranges: Vec<Range>,
	#[serde(default)]
	pub mapping_behavior: MappingBehavior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapToDocumentRangesResponse {
	/// One entry per projected range; `None` where no logical counterpart exists.
	pub ranges: Vec<Option<Range>>,
	pub host_document_version: HostVersion,
	#[serde(skip)]
	pub freshness: Freshness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapToDocumentEditsParams {
	pub kind: LanguageKind,
	pub razor_document_uri: Uri,
	pub projected_edits: Vec<TextEdit>,
	#[serde(default)]
	pub text_edit_kind: TextEditKind,
	#[serde(default)]
	pub formatting_options: Option<FormattingOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapToDocumentEditsResponse {
	pub text_edits: Vec<TextEdit>,
	pub host_document_version: HostVersion,
	#[serde(skip)]
	pub freshness: Freshness,
}

versioned!(LanguageQueryResponse, MapToDocumentRangesResponse, MapToDocumentEditsResponse);

/// Notification registering the configuration file of a project.
///
/// A missing `configuration_file_path` stops monitoring for the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorProjectConfigurationFilePathParams {
	pub project_file_path: String,
	#[serde(default)]
	pub configuration_file_path: Option<String>,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn freshness_compares_versions() {
		let v5 = HostVersion::new(5);
		assert_eq!(Freshness::compare(v5, Some(v5)), Freshness::Current);
		assert_eq!(
			Freshness::compare(HostVersion::new(4), Some(v5)),
			Freshness::Stale { current: v5 }
		);
		assert_eq!(Freshness::compare(v5, None), Freshness::Unknown);
	}

	#[test]
	fn ranges_params_use_wire_names() {
		let params: MapToDocumentRangesParams = serde_json::from_value(json!({
			"kind": "code",
			"razorDocumentUri": "file:///proj/Pages/Index.razor",
			"projectedRanges": [{ "start": { "line": 0, "character": 1 }, "end": { "line": 0, "character": 4 } }],
		}))
		.unwrap();
		assert_eq!(params.kind, LanguageKind::Code);
		assert_eq!(params.mapping_behavior, MappingBehavior::Strict);
		assert_eq!(params.projected_ranges.len(), 1);
	}

	#[test]
	fn unmapped_ranges_serialize_as_null() {
		let response = MapToDocumentRangesResponse {
			ranges: vec![None],
			host_document_version: HostVersion::new(5),
			freshness: Freshness::Current,
		};
		let value = serde_json::to_value(&response).unwrap();
		assert_eq!(value, json!({ "ranges": [null], "hostDocumentVersion": 5 }));
		assert!(response.is_ahead_of(HostVersion::new(4)));
	}

	#[test]
	fn monitor_params_allow_missing_configuration() {
		let params: MonitorProjectConfigurationFilePathParams =
			serde_json::from_value(json!({ "projectFilePath": "/proj/app.csproj" })).unwrap();
		assert_eq!(params.configuration_file_path, None);
	}
}
