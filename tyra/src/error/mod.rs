//! Structured diagnostics and reporting.
//!
//! The pipeline returns exactly one `Diagnostic` on the first failure;
//! formatting and exit-code mapping belong to the external driver. The
//! `report` helper here renders a diagnostic against the source text
//! for tooling that wants human output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::Span;

/// Result type alias
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// What went wrong, coarsely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A shape outside the supported input subset
    UnsupportedSyntax,
    /// No rule could assign a concrete type
    InferenceFailure,
    /// A rule's result contradicts already-known information
    SemanticConflict,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorKind::UnsupportedSyntax => "unsupported_syntax",
            ErrorKind::InferenceFailure => "inference_failure",
            ErrorKind::SemanticConflict => "semantic_conflict",
        };
        write!(f, "{text}")
    }
}

/// Structured error value, created at the point of failure and never
/// mutated afterward
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub source_span: Option<Span>,
    /// Human-actionable fix suggestion
    pub hint: String,
}

impl Diagnostic {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Option<Span>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source_span: span,
            hint: hint.into(),
        }
    }

    pub fn unsupported(
        message: impl Into<String>,
        span: Option<Span>,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::UnsupportedSyntax, message, span, hint)
    }

    pub fn inference(
        message: impl Into<String>,
        span: Option<Span>,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::InferenceFailure, message, span, hint)
    }

    pub fn conflict(
        message: impl Into<String>,
        span: Option<Span>,
        hint: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::SemanticConflict, message, span, hint)
    }
}

/// Report a diagnostic with ariadne
pub fn report(filename: &str, source: &str, diagnostic: &Diagnostic) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let range = diagnostic
        .source_span
        .and_then(|span| byte_range(source, span))
        .unwrap_or(0..0);

    let mut builder = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_message(format!("{} error", diagnostic.kind));
    if !range.is_empty() {
        builder = builder.with_label(
            Label::new((filename, range))
                .with_message(&diagnostic.message)
                .with_color(Color::Red),
        );
    } else {
        builder = builder.with_message(format!(
            "{} error: {}",
            diagnostic.kind, diagnostic.message
        ));
    }
    if !diagnostic.hint.is_empty() {
        builder = builder.with_help(&diagnostic.hint);
    }
    let _ = builder.finish().print((filename, Source::from(source)));
}

/// Convert a line/column span into a byte range over `source`
fn byte_range(source: &str, span: Span) -> Option<std::ops::Range<usize>> {
    let start = byte_offset(source, span.line, span.col)?;
    let end = byte_offset(source, span.end_line, span.end_col)?;
    (start <= end).then_some(start..end)
}

fn byte_offset(source: &str, line: u32, col: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0usize;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx as u32 + 1 == line {
            let col = col as usize;
            if col > text.len() {
                return None;
            }
            return Some(offset + col);
        }
        offset += text.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic::inference("type of name 'x' is unknown", None, "annotate x");
        assert_eq!(d.to_string(), "inference_failure: type of name 'x' is unknown");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SemanticConflict).unwrap();
        assert_eq!(json, "\"semantic_conflict\"");
    }

    #[test]
    fn test_byte_offset() {
        let src = "ab\ncdef\ng";
        assert_eq!(byte_offset(src, 1, 0), Some(0));
        assert_eq!(byte_offset(src, 2, 1), Some(4));
        assert_eq!(byte_offset(src, 3, 0), Some(8));
        assert_eq!(byte_offset(src, 9, 0), None);
    }

    #[test]
    fn test_byte_range_ordering() {
        let src = "abc\ndef\n";
        let span = Span::new(1, 1, 2, 2);
        assert_eq!(byte_range(src, span), Some(1..6));
    }
}
