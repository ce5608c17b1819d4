//! # Annex AST
//!
//! Syntax tree shared by the annex crates: the subset of TypeScript that
//! annotation lowering, resource inlining and generated units need to
//! express, plus the host diagnostic shape and a printer.

use std::fmt;

// =============================================================================
// Core Types (kept in lib.rs - used by all modules)
// =============================================================================

/// Source location information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub file_id: usize,
}

impl Span {
    /// File id used by nodes that were synthesized rather than parsed.
    pub const SYNTHETIC_FILE: usize = usize::MAX;

    pub fn new(start: usize, end: usize, file_id: usize) -> Self {
        Self { start, end, file_id }
    }

    pub fn synthetic() -> Self {
        Self::new(0, 0, Self::SYNTHETIC_FILE)
    }

    pub fn is_synthetic(&self) -> bool {
        self.file_id == Self::SYNTHETIC_FILE
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }
}

/// AST node wrapper that includes span information
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub span: Span,
    pub value: T,
}

impl<T> Node<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { span, value }
    }

    /// Wrap a value that has no source position.
    pub fn synthetic(value: T) -> Self {
        Self::new(value, Span::synthetic())
    }
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// =============================================================================
// Module Declarations
// =============================================================================

pub mod types;
pub mod expr;
pub mod decl;
pub mod module;
pub mod diagnostic;
pub mod print;
pub mod visit;

// =============================================================================
// Re-exports
// =============================================================================

pub use types::*;
pub use expr::*;
pub use decl::*;
pub use module::*;
pub use diagnostic::*;
pub use print::{print_source_file, print_items, LineMark, PrintedModule};
pub use visit::collect_external_references;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        Span::new(0, 0, 0)
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(4, 10, 2);
        let b = Span::new(1, 6, 2);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 1);
        assert_eq!(merged.end, 10);
        assert_eq!(merged.len(), 9);
    }

    #[test]
    fn test_synthetic_span() {
        let node = Node::synthetic(Ident::new("x"));
        assert!(node.span.is_synthetic());
        assert!(!dummy_span().is_synthetic());
    }

    #[test]
    fn test_expressions() {
        let literal = Expr::Literal(Literal::Number(42.0));
        assert!(matches!(literal, Expr::Literal(Literal::Number(n)) if n == 42.0));

        let ident = Expr::Ident(Ident::new("x"));
        assert!(matches!(ident, Expr::Ident(_)));
    }

    #[test]
    fn test_class_decl() {
        let class = ClassDecl {
            name: Node::new(Ident::new("MyClass"), dummy_span()),
            extends: None,
            members: vec![Node::new(
                ClassMember::Property(PropertyMember {
                    name: PropertyName::Ident(Ident::new("field")),
                    type_annotation: Some(Node::new(
                        Type::Keyword(KeywordType::String),
                        dummy_span(),
                    )),
                    init: None,
                    is_static: false,
                    decorators: vec![],
                    leading_comment: None,
                }),
                dummy_span(),
            )],
            decorators: vec![],
            is_declare: false,
        };

        assert_eq!(class.name.value.name, "MyClass");
        assert_eq!(class.members.len(), 1);
        assert_eq!(class.members[0].value.name().and_then(|n| n.as_ident()), Some("field"));
    }
}
