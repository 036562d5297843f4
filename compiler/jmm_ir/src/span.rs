//! Source location spans.

use std::fmt;

/// Source location span.
///
/// Byte offsets into the original source file: `start` inclusive,
/// `end` exclusive. Synthesized nodes use [`Span::DUMMY`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Dummy span for generated code.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Whether this is the dummy span (carries no location).
    #[inline]
    pub const fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// `Some(self)` unless this is the dummy span.
    #[inline]
    pub fn located(self) -> Option<Span> {
        if self.is_dummy() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_span_has_no_location() {
        assert!(Span::DUMMY.is_dummy());
        assert_eq!(Span::DUMMY.located(), None);
        assert_eq!(Span::new(3, 9).located(), Some(Span::new(3, 9)));
    }

    #[test]
    fn display_is_range() {
        assert_eq!(Span::new(10, 14).to_string(), "10..14");
    }
}
