//! Classification and translation between a logical document and its generated artifacts.
//!
//! # Coordinate spaces
//!
//! - **Code**: offsets inside [`SourceMapping::original`] spans translate into the
//!   code artifact through the paired [`SourceMapping::generated`] span.
//! - **Markup**: the markup artifact is offset-aligned with the logical document,
//!   so translation is the identity, gated by the markup segmentation.
//! - **Razor**: template syntax owned by the logical document; identity.
//!
//! All offsets are character offsets. Conversion to and from LSP positions
//! happens at the [`Projection`] boundary with the configured encoding.

mod edits;

use lsp_types::{FormattingOptions, Range, TextEdit};
use tandem_primitives::{CharIdx, LanguageKind, MappingBehavior, OffsetEncoding, Rope, Span, TextEditKind, chars_to_range, range_to_chars};

use self::edits::normalize_indentation;
use crate::store::GeneratedArtifact;

/// One correspondence between a logical span and a code-artifact span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
	/// Span in the logical document.
	pub original: Span,
	/// Span in the generated code artifact.
	pub generated: Span,
}

impl SourceMapping {
	pub const fn new(original: Span, generated: Span) -> Self {
		Self { original, generated }
	}
}

/// Structural role of a logical-document region, as reported by the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
	/// Plain markup.
	Markup,
	/// Embedded code.
	Code,
	/// Template directives and transitions.
	Razor,
}

/// A classified region of the logical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
	pub span: Span,
	pub kind: SegmentKind,
}

impl Segment {
	pub const fn new(span: Span, kind: SegmentKind) -> Self {
		Self { span, kind }
	}
}

/// Finds the span containing `offset`, falling back to one that ends exactly at it.
fn lookup<T>(items: &[T], offset: CharIdx, span: impl Fn(&T) -> Span) -> Option<&T> {
	items
		.iter()
		.find(|item| span(item).contains(offset))
		.or_else(|| items.iter().find(|item| span(item).end() == offset))
}

/// Side table produced with one generation: source text, code mappings, and segmentation.
///
/// Shared by the Code and Markup artifacts of the same generation so both
/// always translate against the text they were generated from.
#[derive(Debug, Clone, Default)]
pub struct ProjectionMap {
	source: Rope,
	mappings: Vec<SourceMapping>,
	segments: Vec<Segment>,
}

impl ProjectionMap {
	pub fn new(source: Rope, mut mappings: Vec<SourceMapping>, mut segments: Vec<Segment>) -> Self {
		mappings.sort_by_key(|m| (m.original.start, m.generated.start));
		segments.sort_by_key(|s| s.span.start);
		Self { source, mappings, segments }
	}

	/// Logical document text this map was generated from.
	pub fn source(&self) -> &Rope {
		&self.source
	}

	pub fn mappings(&self) -> &[SourceMapping] {
		&self.mappings
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	fn mapping_at_original(&self, offset: CharIdx) -> Option<&SourceMapping> {
		lookup(&self.mappings, offset, |m| m.original)
	}

	fn mapping_at_generated(&self, offset: CharIdx) -> Option<&SourceMapping> {
		lookup(&self.mappings, offset, |m| m.generated)
	}

	/// Determines which coordinate space a logical offset belongs to.
	pub fn classify(&self, offset: CharIdx) -> LanguageKind {
		if self.mapping_at_original(offset).is_some() {
			return LanguageKind::Code;
		}
		match lookup(&self.segments, offset, |s| s.span) {
			Some(segment) if segment.kind == SegmentKind::Markup => LanguageKind::Markup,
			_ => LanguageKind::Razor,
		}
	}

	fn markup_covers(&self, offset: CharIdx) -> bool {
		self.segments
			.iter()
			.any(|s| s.kind == SegmentKind::Markup && s.span.contains_inclusive(offset))
	}

	/// Translates a logical offset into the `target` space.
	///
	/// Code offsets outside every mapped span have no translation. Markup and
	/// Razor translate by identity within the source text.
	pub fn to_generated(&self, target: LanguageKind, offset: CharIdx) -> Option<CharIdx> {
		if offset > self.source.len_chars() {
			return None;
		}
		match target {
			LanguageKind::Code => {
				let mapping = self.mapping_at_original(offset)?;
				let delta = offset - mapping.original.start;
				Some(mapping.generated.start + delta.min(mapping.generated.length))
			}
			LanguageKind::Markup | LanguageKind::Razor => Some(offset),
		}
	}

	/// Translates a code-artifact offset back into the logical document.
	pub fn code_to_logical(&self, offset: CharIdx) -> Option<CharIdx> {
		let mapping = self.mapping_at_generated(offset)?;
		let delta = offset - mapping.generated.start;
		Some(mapping.original.start + delta.min(mapping.original.length))
	}

	/// Translates a span from the `kind` space into the logical document.
	pub fn span_to_logical(&self, kind: LanguageKind, span: Span, behavior: MappingBehavior) -> Option<Span> {
		let len = self.source.len_chars();
		match kind {
			LanguageKind::Code => self.code_span_to_logical(span, behavior),
			LanguageKind::Markup => match behavior {
				MappingBehavior::Strict => {
					(span.end() <= len && self.markup_covers(span.start) && self.markup_covers(span.end())).then_some(span)
				}
				MappingBehavior::Inclusive => (span.start <= len).then(|| span.clamp_to(len)),
			},
			LanguageKind::Razor => match behavior {
				MappingBehavior::Strict => (span.end() <= len).then_some(span),
				MappingBehavior::Inclusive => (span.start <= len).then(|| span.clamp_to(len)),
			},
		}
	}

	fn code_span_to_logical(&self, span: Span, behavior: MappingBehavior) -> Option<Span> {
		let start = self.code_to_logical(span.start);
		let end = self.code_to_logical(span.end());
		if let (Some(start), Some(end)) = (start, end) {
			if start <= end {
				return Some(Span::from_bounds(start, end));
			}
		}
		if behavior == MappingBehavior::Strict {
			return None;
		}

		let mut hits = self.mappings.iter().filter(|m| m.generated.intersects(&span)).peekable();
		hits.peek()?;
		let (lo, hi) = hits.fold((usize::MAX, 0), |(lo, hi), m| (lo.min(m.original.start), hi.max(m.original.end())));

		let start = start.unwrap_or(lo);
		let end = end.unwrap_or(hi);
		if start <= end { Some(Span::from_bounds(start, end)) } else { Some(Span::from_bounds(lo, hi)) }
	}
}

/// Translator from one generated coordinate space back onto the logical document.
///
/// Works in LSP positions. Ranges that do not fit the generated text, or that
/// the mapping behavior rejects, translate to `None`.
#[derive(Debug, Clone, Copy)]
pub struct Projection<'a> {
	kind: LanguageKind,
	map: Option<&'a ProjectionMap>,
	source: &'a Rope,
	generated: &'a Rope,
	encoding: OffsetEncoding,
}

impl<'a> Projection<'a> {
	/// Identity projection over the logical text itself.
	pub fn identity(text: &'a Rope, encoding: OffsetEncoding) -> Self {
		Self {
			kind: LanguageKind::Razor,
			map: None,
			source: text,
			generated: text,
			encoding,
		}
	}

	/// Projection from a generated artifact back onto the source it was generated from.
	pub fn artifact(artifact: &'a GeneratedArtifact, encoding: OffsetEncoding) -> Self {
		Self {
			kind: LanguageKind::from(artifact.kind),
			map: Some(artifact.map.as_ref()),
			source: artifact.map.source(),
			generated: &artifact.text,
			encoding,
		}
	}

	pub fn kind(&self) -> LanguageKind {
		self.kind
	}

	/// Logical text results are expressed against.
	pub fn source(&self) -> &'a Rope {
		self.source
	}

	/// Translates one generated-space range.
	pub fn map_range(&self, range: Range, behavior: MappingBehavior) -> Option<Range> {
		let span = range_to_chars(self.generated, range, self.encoding).ok()?;
		let logical = match self.map {
			Some(map) => map.span_to_logical(self.kind, span, behavior)?,
			None => match behavior {
				MappingBehavior::Strict => span,
				MappingBehavior::Inclusive => span.clamp_to(self.source.len_chars()),
			},
		};
		chars_to_range(self.source, logical, self.encoding).ok()
	}

	/// Translates one generated-space edit. Returns `None` for unmappable or no-op edits.
	pub fn map_edit(&self, edit: &TextEdit, edit_kind: TextEditKind, options: Option<&FormattingOptions>) -> Option<TextEdit> {
		let behavior = match edit_kind {
			TextEditKind::FormatOnType => MappingBehavior::Inclusive,
			TextEditKind::Default | TextEditKind::Snippet => MappingBehavior::Strict,
		};
		let range = self.map_range(edit.range, behavior)?;

		let new_text = match (edit_kind, options) {
			(TextEditKind::FormatOnType, Some(options)) => normalize_indentation(&edit.new_text, options, range.start.character == 0),
			_ => edit.new_text.clone(),
		};

		let span = range_to_chars(self.source, range, self.encoding).ok()?;
		if self.source.slice(span.start..span.end()) == new_text.as_str() {
			return None;
		}
		Some(TextEdit { range, new_text })
	}

	/// Translates a batch of edits, dropping the ones with no logical counterpart.
	pub fn map_edits(&self, edits: &[TextEdit], edit_kind: TextEditKind, options: Option<&FormattingOptions>) -> Vec<TextEdit> {
		edits.iter().filter_map(|edit| self.map_edit(edit, edit_kind, options)).collect()
	}
}
