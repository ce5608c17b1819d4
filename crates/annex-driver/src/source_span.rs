//! Spans in templates and metadata, and the map from generated text back
//! to them

use std::rc::Rc;

use annex_ast::{line_and_character_of, DiagnosticFile, LineMark};

/// A template or metadata file generated code was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSourceFile {
    pub url: String,
    pub content: String,
}

impl ParseSourceFile {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            url: url.into(),
            content: content.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLocation {
    pub file: Rc<ParseSourceFile>,
    pub offset: usize,
    /// Zero-based
    pub line: usize,
    /// Zero-based
    pub col: usize,
}

impl ParseLocation {
    pub fn new(file: Rc<ParseSourceFile>, offset: usize) -> Self {
        let (line, col) = line_and_character_of(&file.content, offset);
        Self {
            file,
            offset,
            line,
            col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSourceSpan {
    pub start: ParseLocation,
    pub end: ParseLocation,
}

impl ParseSourceSpan {
    pub fn new(file: Rc<ParseSourceFile>, start: usize, end: usize) -> Self {
        Self {
            start: ParseLocation::new(file.clone(), start),
            end: ParseLocation::new(file, end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic file standing in for the span's source.
    pub fn diagnostic_file(&self) -> DiagnosticFile {
        DiagnosticFile {
            file_name: self.start.file.url.clone(),
            text: self.start.file.content.clone(),
        }
    }
}

/// Position marks of a printed generated unit. A mark's `span.file_id`
/// indexes `sources`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitContext {
    marks: Vec<LineMark>,
    sources: Vec<Rc<ParseSourceFile>>,
}

impl EmitContext {
    pub fn new(marks: Vec<LineMark>, sources: Vec<Rc<ParseSourceFile>>) -> Self {
        Self { marks, sources }
    }

    /// Span of the node printed at `(line, column)`: the last mark on that
    /// line that starts at or before the column.
    pub fn span_of(&self, line: usize, column: usize) -> Option<ParseSourceSpan> {
        let mark = self
            .marks
            .iter()
            .filter(|m| m.line == line && m.column <= column)
            .max_by_key(|m| m.column)?;
        let file = self.sources.get(mark.span.file_id)?;
        Some(ParseSourceSpan::new(file.clone(), mark.span.start, mark.span.end))
    }
}
