/// A position in text, measured in characters (not bytes).
pub type CharIdx = usize;

/// A contiguous character span: `start` plus `length`.
///
/// Used both for logical-document spans and for generated-artifact spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
	/// First character of the span.
	pub start: CharIdx,
	/// Number of characters covered.
	pub length: usize,
}

impl Span {
	/// Creates a span from a start and a length.
	pub const fn new(start: CharIdx, length: usize) -> Self {
		Self { start, length }
	}

	/// Creates a span covering `[start, end)`. `end` below `start` yields an empty span.
	pub fn from_bounds(start: CharIdx, end: CharIdx) -> Self {
		Self::new(start, end.saturating_sub(start))
	}

	/// Creates a zero-width span at `pos`.
	pub const fn point(pos: CharIdx) -> Self {
		Self::new(pos, 0)
	}

	/// Returns the end of the span (exclusive).
	#[inline]
	pub const fn end(&self) -> CharIdx {
		self.start + self.length
	}

	/// Returns true if the span covers no characters.
	#[inline]
	pub const fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Returns true if `pos` is within `[start, end)`.
	#[inline]
	pub const fn contains(&self, pos: CharIdx) -> bool {
		pos >= self.start && pos < self.end()
	}

	/// Returns true if `pos` is within `[start, end]`.
	///
	/// A caret sitting right after the last character of a span still belongs to it.
	#[inline]
	pub const fn contains_inclusive(&self, pos: CharIdx) -> bool {
		pos >= self.start && pos <= self.end()
	}

	/// Returns true if `other` lies entirely within this span.
	pub const fn encloses(&self, other: &Span) -> bool {
		other.start >= self.start && other.end() <= self.end()
	}

	/// Returns true if the spans share a character, or touch when either is empty.
	pub fn intersects(&self, other: &Span) -> bool {
		if self.is_empty() {
			return other.contains_inclusive(self.start);
		}
		if other.is_empty() {
			return self.contains_inclusive(other.start);
		}

		self.start < other.end() && other.start < self.end()
	}

	/// Returns the smallest span covering both spans.
	pub fn merge(&self, other: &Span) -> Self {
		Self::from_bounds(self.start.min(other.start), self.end().max(other.end()))
	}

	/// Clamps the span to `[0, max_char]`.
	pub fn clamp_to(&self, max_char: CharIdx) -> Self {
		Self::from_bounds(self.start.min(max_char), self.end().min(max_char))
	}
}
