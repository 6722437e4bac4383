//! Source location tracking

use serde::{Deserialize, Serialize};

/// A line/column region in the original source.
///
/// Lines are 1-based, columns 0-based, both ends inclusive-exclusive,
/// matching what the external front-end reports. Nodes carry
/// `Option<Span>`; synthesized nodes have no span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            line,
            col,
            end_line,
            end_col,
        }
    }

    /// Single-line span covering `col..end_col`
    pub fn on_line(line: u32, col: u32, end_col: u32) -> Self {
        Self::new(line, col, line, end_col)
    }

    pub fn merge(self, other: Span) -> Span {
        let (line, col) = if (self.line, self.col) <= (other.line, other.col) {
            (self.line, self.col)
        } else {
            (other.line, other.col)
        };
        let (end_line, end_col) = if (self.end_line, self.end_col) >= (other.end_line, other.end_col)
        {
            (self.end_line, self.end_col)
        } else {
            (other.end_line, other.end_col)
        };
        Span {
            line,
            col,
            end_line,
            end_col,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        assert_eq!(Span::on_line(3, 4, 9).to_string(), "3:4");
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(1, 4, 1, 10);
        let b = Span::new(2, 0, 3, 5);
        let merged = a.merge(b);
        assert_eq!(merged, Span::new(1, 4, 3, 5));
    }

    #[test]
    fn test_span_merge_reversed() {
        let a = Span::new(5, 0, 5, 2);
        let b = Span::new(1, 1, 1, 3);
        assert_eq!(a.merge(b), Span::new(1, 1, 5, 2));
    }
}
