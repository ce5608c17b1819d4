//! Diagnostic translation and rendering
//!
//! Host-compiler diagnostics that point into generated units are mapped
//! back to the template or metadata span the generated code came from.
//! Structural errors from the analyzer become annex diagnostics. Both
//! kinds convert to the host shape for merged results, and can be rendered
//! for a terminal with ariadne.

use annex_ast::{line_and_character_of, Diagnostic, DiagnosticCategory, MessageChain, Position};
use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::analyzer::{MissingModuleMetadata, StructuralError};
use crate::compiler::Program;
use crate::paths;
use crate::source_span::ParseSourceSpan;

/// Code of every diagnostic the driver produces itself.
pub const DEFAULT_ERROR_CODE: i32 = 100;

/// `source` tag of driver diagnostics.
pub const SOURCE: &str = "annex";

/// "declared but never used": generated code is full of these
const UNUSED_DECLARATION_CODE: i32 = 6133;

/// Diagnostic located in a template or metadata file rather than in a
/// unit of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnexDiagnostic {
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: i32,
    pub span: Option<ParseSourceSpan>,
    pub chain: Option<MessageChain>,
    pub position: Option<Position>,
}

impl AnnexDiagnostic {
    pub fn error(message_text: impl Into<String>) -> Self {
        Self {
            message_text: message_text.into(),
            category: DiagnosticCategory::Error,
            code: DEFAULT_ERROR_CODE,
            span: None,
            chain: None,
            position: None,
        }
    }

    pub fn with_span(mut self, span: ParseSourceSpan) -> Self {
        self.span = Some(span);
        self
    }
}

/// Maps positions inside generated units back to their origin.
pub trait TypeCheckHost {
    fn parse_source_span_of(&self, file_name: &str, line: usize, column: usize) -> Option<ParseSourceSpan>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedDiagnostics {
    /// Diagnostics left in host form
    pub ts: Vec<Diagnostic>,
    /// Diagnostics moved onto template or metadata spans
    pub ng: Vec<AnnexDiagnostic>,
}

/// Split host diagnostics into those that stay as they are and those that
/// point into generated units. The latter are remapped through `host`; the
/// ones without a known origin stay in host form.
pub fn translate_diagnostics(
    host: &dyn TypeCheckHost,
    diagnostics: impl IntoIterator<Item = Diagnostic>,
) -> TranslatedDiagnostics {
    let mut translated = TranslatedDiagnostics::default();
    for diagnostic in diagnostics {
        // offset 0 counts as unpositioned
        let (Some(file), Some(start @ 1..)) = (&diagnostic.file, diagnostic.start) else {
            translated.ts.push(diagnostic);
            continue;
        };
        if !paths::is_generated(&file.file_name) {
            translated.ts.push(diagnostic);
            continue;
        }
        if diagnostic.code == UNUSED_DECLARATION_CODE {
            continue;
        }
        let (line, character) = line_and_character_of(&file.text, start);
        match host.parse_source_span_of(&file.file_name, line, character) {
            Some(span) => translated.ng.push(AnnexDiagnostic {
                message_text: diagnostic.flatten_message(),
                category: diagnostic.category,
                code: DEFAULT_ERROR_CODE,
                span: Some(span),
                chain: None,
                position: None,
            }),
            None => {
                tracing::trace!(file = %file.file_name, line, character, "no template span for diagnostic");
                translated.ts.push(diagnostic);
            }
        }
    }
    translated
}

/// Host-shaped copy of a driver diagnostic. A span becomes a synthetic
/// file reference holding the template text.
pub fn ng_to_host(diagnostic: &AnnexDiagnostic) -> Diagnostic {
    let mut host = Diagnostic::error(diagnostic.message_text.clone(), diagnostic.code);
    host.category = diagnostic.category;
    host.chain = diagnostic.chain.clone();
    host.position = diagnostic.position.clone();
    host.source = Some(SOURCE.to_string());
    match &diagnostic.span {
        Some(span) => host.with_location(span.diagnostic_file(), span.start.offset, span.len()),
        None => host,
    }
}

/// Diagnostics for an analyzer failure.
pub fn syntax_error_to_diagnostics(error: &StructuralError, program: Option<&dyn Program>) -> Vec<AnnexDiagnostic> {
    if !error.parse_errors.is_empty() {
        return error
            .parse_errors
            .iter()
            .map(|e| AnnexDiagnostic::error(e.contextual_message.clone()).with_span(e.span.clone()))
            .collect();
    }
    if error.is_formatted() {
        return vec![AnnexDiagnostic {
            chain: error.chain.clone(),
            position: error.position.clone(),
            ..AnnexDiagnostic::error(error.message.clone())
        }];
    }
    if let (Some(missing), Some(program)) = (&error.missing_module, program) {
        if declares_incompatible_module(program, missing) {
            return vec![AnnexDiagnostic::error(incompatible_module_message(missing))];
        }
    }
    vec![AnnexDiagnostic::error(error.message.clone())]
}

/// The module's declaration carries a `ɵmod` static, which only the newer
/// toolchain emits.
fn declares_incompatible_module(program: &dyn Program, missing: &MissingModuleMetadata) -> bool {
    let Some(file) = program.get_source_file(&missing.file_name) else {
        return false;
    };
    file.is_declaration_file
        && file
            .classes()
            .any(|class| class.name.value.name == missing.class_name && class.static_property("ɵmod").is_some())
}

fn incompatible_module_message(missing: &MissingModuleMetadata) -> String {
    format!(
        "The module '{}' in '{}' is imported by this compilation, but appears to be part of a \
         library compiled by a newer, incompatible annex toolchain. This may occur because:\n\n  \
         1) the library was post-processed for the newer toolchain. Removing and reinstalling \
         node_modules may fix this problem.\n\n  \
         2) the library was published for the newer toolchain only. Check its peer dependencies \
         carefully and ensure that you're using a compatible version of @annex/core.\n",
        missing.class_name, missing.file_name
    )
}

// ============================================================================
// Rendering
// ============================================================================

/// Render one diagnostic for a terminal. Located diagnostics become an
/// ariadne report over the file text; the rest print as message and chain.
pub fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    let (Some(file), Some(start)) = (&diagnostic.file, diagnostic.start) else {
        let mut out = format!("{} AX{}: {}", diagnostic.category, diagnostic.code, diagnostic.flatten_message());
        if let Some(position) = &diagnostic.position {
            out.push_str(&format!(
                "\n  at {}:{}:{}",
                position.file_name,
                position.line + 1,
                position.column + 1
            ));
        }
        return out;
    };

    let end = (start + diagnostic.length.unwrap_or(0).max(1)).min(file.text.len().max(start));
    let name = file.file_name.as_str();
    let kind = match diagnostic.category {
        DiagnosticCategory::Error => ReportKind::Error,
        DiagnosticCategory::Warning => ReportKind::Warning,
        _ => ReportKind::Advice,
    };

    let mut buf = Vec::new();
    let written = Report::build(kind, (name, start..end))
        .with_code(format!("AX{}", diagnostic.code))
        .with_message(&diagnostic.message_text)
        .with_label(
            Label::new((name, start..end))
                .with_message(diagnostic.flatten_message())
                .with_color(Color::Red),
        )
        .with_config(Config::default().with_color(false))
        .finish()
        .write((name, Source::from(file.text.as_str())), &mut buf);
    match written {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("{}: {}", name, diagnostic.flatten_message()),
    }
}

pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(render_diagnostic)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ParseError;
    use crate::source_span::ParseSourceFile;
    use annex_ast::DiagnosticFile;

    struct OneSpan(ParseSourceSpan);

    impl TypeCheckHost for OneSpan {
        fn parse_source_span_of(&self, file_name: &str, line: usize, _column: usize) -> Option<ParseSourceSpan> {
            (file_name == "/app/a.axfactory.ts" && line == 1).then(|| self.0.clone())
        }
    }

    fn located(file: &str, text: &str, start: usize, code: i32) -> Diagnostic {
        Diagnostic::error("Property 'nme' does not exist", code).with_location(
            DiagnosticFile {
                file_name: file.into(),
                text: text.into(),
            },
            start,
            3,
        )
    }

    #[test]
    fn test_translate_diagnostics() {
        let template = ParseSourceFile::new("/app/a.html", "{{ nme }}");
        let host = OneSpan(ParseSourceSpan::new(template, 3, 6));
        let gen_text = "import * as i0 from '@annex/core';\nctx.nme;\n";
        let diagnostics = vec![
            located("/app/a.ts", "let x = 1;", 4, 2339),
            located("/app/a.axfactory.ts", gen_text, 39, 2339),
            located("/app/a.axfactory.ts", gen_text, 39, UNUSED_DECLARATION_CODE),
            located("/app/a.axfactory.ts", gen_text, 2, 2339),
            located("/app/a.axfactory.ts", gen_text, 0, UNUSED_DECLARATION_CODE),
            Diagnostic::error("global", 5023),
        ];
        let translated = translate_diagnostics(&host, diagnostics);
        assert_eq!(translated.ng.len(), 1);
        // unmapped and offset-0 diagnostics stay in host form, unused ones at a real offset go
        let kept: Vec<(Option<usize>, i32)> = translated.ts.iter().map(|d| (d.start, d.code)).collect();
        assert_eq!(
            kept,
            vec![(Some(4), 2339), (Some(2), 2339), (Some(0), UNUSED_DECLARATION_CODE), (None, 5023)]
        );

        let ng = &translated.ng[0];
        assert_eq!(ng.code, DEFAULT_ERROR_CODE);
        let host_shape = ng_to_host(ng);
        assert_eq!(host_shape.file.as_ref().unwrap().file_name, "/app/a.html");
        assert_eq!(host_shape.start, Some(3));
        assert_eq!(host_shape.length, Some(3));
        assert_eq!(host_shape.source.as_deref(), Some(SOURCE));
    }

    #[test]
    fn test_parse_errors_become_one_diagnostic_each() {
        let template = ParseSourceFile::new("/app/a.html", "<p>\n<div");
        let error = StructuralError::new("Template parse errors").with_parse_errors(vec![
            ParseError {
                span: ParseSourceSpan::new(template.clone(), 0, 3),
                contextual_message: "Unexpected closing tag".into(),
            },
            ParseError {
                span: ParseSourceSpan::new(template, 4, 8),
                contextual_message: "Unterminated element".into(),
            },
        ]);
        let diagnostics = syntax_error_to_diagnostics(&error, None);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[1].span.as_ref().unwrap().start.line, 1);
    }

    #[test]
    fn test_formatted_and_generic_errors() {
        let chain = MessageChain {
            message_text: "while analyzing AppModule".into(),
            position: None,
            next: vec![],
        };
        let position = Position {
            file_name: "/app/app.module.ts".into(),
            line: 3,
            column: 1,
        };
        let formatted = StructuralError::new("Unexpected value").with_chain(chain, Some(position.clone()));
        let diagnostics = syntax_error_to_diagnostics(&formatted, None);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].position, Some(position));
        assert!(diagnostics[0].chain.is_some());

        let plain = StructuralError::new("boom").with_missing_module("LibModule", "/lib/index.d.ts");
        let diagnostics = syntax_error_to_diagnostics(&plain, None);
        assert_eq!(diagnostics[0].message_text, "boom");
    }

    #[test]
    fn test_render_located_and_plain() {
        let rendered = render_diagnostic(&located("/app/a.ts", "let nme = 1;", 4, 2339));
        assert!(rendered.contains("AX2339"));
        assert!(rendered.contains("/app/a.ts"));

        let mut plain = Diagnostic::error("Emitted no files.", 0);
        plain.category = DiagnosticCategory::Message;
        assert_eq!(render_diagnostic(&plain), "message AX0: Emitted no files.");
    }
}
