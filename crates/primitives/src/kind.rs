use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of buffer generated from a logical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
	/// Embedded code buffer consumed by the code-language backend.
	Code,
	/// Embedded markup buffer consumed by the markup-language backend.
	Markup,
}

impl ArtifactKind {
	/// Both artifact kinds, in publication order.
	pub const ALL: [Self; 2] = [Self::Code, Self::Markup];

	/// Returns a stable lowercase name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Code => "code",
			Self::Markup => "markup",
		}
	}
}

impl fmt::Display for ArtifactKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Coordinate space a logical-document position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
	/// Position lies in a mapped span of the code artifact.
	Code,
	/// Position lies in markup.
	Markup,
	/// Position lies in template syntax owned by the logical document itself.
	Razor,
}

impl LanguageKind {
	/// Returns the generated artifact backing this space, if any.
	pub const fn artifact(self) -> Option<ArtifactKind> {
		match self {
			Self::Code => Some(ArtifactKind::Code),
			Self::Markup => Some(ArtifactKind::Markup),
			Self::Razor => None,
		}
	}
}

impl From<ArtifactKind> for LanguageKind {
	fn from(kind: ArtifactKind) -> Self {
		match kind {
			ArtifactKind::Code => Self::Code,
			ArtifactKind::Markup => Self::Markup,
		}
	}
}

/// Policy for generated ranges that do not map exactly onto logical spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingBehavior {
	/// Both ends must land in mapped spans; anything else is unmapped.
	#[default]
	Strict,
	/// Clamp partial overlaps and expand to the enclosing mapped spans.
	Inclusive,
}

/// How the caller intends to apply translated edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextEditKind {
	/// Plain edits such as code actions.
	#[default]
	Default,
	/// Formatting edits produced while typing.
	FormatOnType,
	/// Edits whose new text carries snippet placeholders.
	Snippet,
}
