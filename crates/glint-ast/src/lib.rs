#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

pub mod ast;
pub mod diag;
pub mod limits;

pub mod span {
    use serde::Serialize;

    /// Byte range into the original shader text.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            Span { start, end }
        }

        /// Smallest span covering both `self` and `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }

        pub fn len(&self) -> u32 {
            self.end.saturating_sub(self.start)
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    /// Human-facing position of a span: 1-based line and column plus length.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
    pub struct Location {
        pub line: u32,
        pub column: u32,
        pub length: u32,
    }

    /// Maps byte offsets to line/column pairs.
    ///
    /// Built once per source text; lookups are a binary search over the
    /// offsets of line starts.
    #[derive(Debug, Clone)]
    pub struct LineIndex {
        line_starts: Vec<u32>,
        len: u32,
    }

    impl LineIndex {
        pub fn new(text: &str) -> Self {
            let mut line_starts = vec![0];
            for (i, b) in text.bytes().enumerate() {
                if b == b'\n' {
                    line_starts.push(i as u32 + 1);
                }
            }
            LineIndex {
                line_starts,
                len: text.len() as u32,
            }
        }

        pub fn location(&self, span: Span) -> Location {
            let offset = span.start.min(self.len);
            let line = match self.line_starts.binary_search(&offset) {
                Ok(i) => i,
                Err(i) => i - 1,
            };
            Location {
                line: line as u32 + 1,
                column: offset - self.line_starts[line] + 1,
                length: span.len(),
            }
        }

        pub fn line_count(&self) -> usize {
            self.line_starts.len()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn locations_are_one_based() {
            let idx = LineIndex::new("ab\ncd\n\nef");
            assert_eq!(
                idx.location(Span::new(0, 2)),
                Location {
                    line: 1,
                    column: 1,
                    length: 2
                }
            );
            let loc = idx.location(Span::new(4, 5));
            assert_eq!((loc.line, loc.column), (2, 2));
            let loc = idx.location(Span::new(7, 9));
            assert_eq!((loc.line, loc.column), (4, 1));
        }

        #[test]
        fn offsets_past_the_end_clamp() {
            let idx = LineIndex::new("x\n");
            let loc = idx.location(Span::new(50, 50));
            assert_eq!(loc.line, 2);
            assert_eq!(loc.column, 1);
        }
    }
}
