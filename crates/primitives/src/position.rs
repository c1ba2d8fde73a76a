use lsp_types::{Position, PositionEncodingKind, Range};
use ropey::{Rope, RopeSlice};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::span::{CharIdx, Span};

/// Unit in which LSP `character` offsets are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OffsetEncoding {
	/// UTF-8 byte offsets.
	#[serde(rename = "utf-8")]
	Utf8,
	/// UTF-16 code unit offsets (LSP default).
	#[default]
	#[serde(rename = "utf-16")]
	Utf16,
	/// UTF-32 / Unicode codepoint offsets.
	#[serde(rename = "utf-32")]
	Utf32,
}

impl OffsetEncoding {
	/// Parse from LSP position encoding kind.
	pub fn from_lsp(kind: &PositionEncodingKind) -> Option<Self> {
		match kind.as_str() {
			"utf-8" => Some(Self::Utf8),
			"utf-16" => Some(Self::Utf16),
			"utf-32" => Some(Self::Utf32),
			_ => None,
		}
	}

	fn len(self, text: RopeSlice<'_>) -> usize {
		match self {
			Self::Utf8 => text.len_bytes(),
			Self::Utf16 => text.len_utf16_cu(),
			Self::Utf32 => text.len_chars(),
		}
	}

	fn to_char(self, text: RopeSlice<'_>, units: usize) -> usize {
		match self {
			Self::Utf8 => text.byte_to_char(units),
			Self::Utf16 => text.utf16_cu_to_char(units),
			Self::Utf32 => units,
		}
	}
}

/// Position conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
	/// The line does not exist in the text.
	#[error("line {line} out of range ({lines} lines)")]
	LineOutOfRange {
		/// Requested line.
		line: u32,
		/// Number of lines in the text.
		lines: usize,
	},
	/// The column lies past the end of the line content.
	#[error("character {character} out of range on line {line}")]
	CharacterOutOfRange {
		/// Requested line.
		line: u32,
		/// Requested column.
		character: u32,
	},
	/// The character offset lies past the end of the text.
	#[error("offset {offset} out of range (length {len})")]
	OffsetOutOfRange {
		/// Requested offset.
		offset: CharIdx,
		/// Length of the text in characters.
		len: usize,
	},
	/// The range ends before it starts.
	#[error("range end precedes start")]
	Inverted,
}

/// Returns the line without its trailing line break.
fn line_content(line: RopeSlice<'_>) -> RopeSlice<'_> {
	let mut end = line.len_chars();
	if end > 0 && line.char(end - 1) == '\n' {
		end -= 1;
	}
	if end > 0 && line.char(end - 1) == '\r' {
		end -= 1;
	}
	line.slice(..end)
}

/// Converts an LSP position to a character offset.
///
/// Columns past the end of the line content are rejected rather than clamped.
pub fn position_to_char(rope: &Rope, pos: Position, encoding: OffsetEncoding) -> Result<CharIdx, PositionError> {
	let line_idx = pos.line as usize;
	if line_idx >= rope.len_lines() {
		return Err(PositionError::LineOutOfRange {
			line: pos.line,
			lines: rope.len_lines(),
		});
	}

	let content = line_content(rope.line(line_idx));
	let character = pos.character as usize;
	if character > encoding.len(content) {
		return Err(PositionError::CharacterOutOfRange {
			line: pos.line,
			character: pos.character,
		});
	}

	Ok(rope.line_to_char(line_idx) + encoding.to_char(content, character))
}

/// Converts a character offset to an LSP position.
pub fn char_to_position(rope: &Rope, offset: CharIdx, encoding: OffsetEncoding) -> Result<Position, PositionError> {
	if offset > rope.len_chars() {
		return Err(PositionError::OffsetOutOfRange {
			offset,
			len: rope.len_chars(),
		});
	}

	let line_idx = rope.char_to_line(offset);
	let line_start = rope.line_to_char(line_idx);
	let prefix = rope.slice(line_start..offset);

	Ok(Position::new(line_idx as u32, encoding.len(prefix) as u32))
}

/// Converts an LSP range to a character span.
pub fn range_to_chars(rope: &Rope, range: Range, encoding: OffsetEncoding) -> Result<Span, PositionError> {
	let start = position_to_char(rope, range.start, encoding)?;
	let end = position_to_char(rope, range.end, encoding)?;
	if end < start {
		return Err(PositionError::Inverted);
	}
	Ok(Span::from_bounds(start, end))
}

/// Converts a character span to an LSP range.
pub fn chars_to_range(rope: &Rope, span: Span, encoding: OffsetEncoding) -> Result<Range, PositionError> {
	Ok(Range::new(
		char_to_position(rope, span.start, encoding)?,
		char_to_position(rope, span.end(), encoding)?,
	))
}
