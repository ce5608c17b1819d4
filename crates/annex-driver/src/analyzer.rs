//! Interfaces of the metadata analyzer
//!
//! The analyzer turns framework decorators into a structural model and
//! produces the statements of generated companions. It is supplied by the
//! embedder; the orchestrator only sequences the calls and stores what comes
//! back.

use std::collections::BTreeSet;
use std::future::Future;
use std::rc::Rc;

use annex_ast::{collect_external_references, print_items, MessageChain, ModuleItem, Node, Position, SourceFile};
use serde_json::Value;
use thiserror::Error;

use crate::context::ResourceText;
use crate::error::Result;
use crate::source_span::{ParseSourceFile, ParseSourceSpan};

// ============================================================================
// Generated files
// ============================================================================

/// Output of the analyzer for one companion: either statements to be
/// printed as TypeScript, or a finished text (summary JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub src_file_url: String,
    pub gen_file_url: String,
    pub stmts: Option<Vec<Node<ModuleItem>>>,
    pub source: Option<String>,
    /// Templates and metadata files the statement spans refer to
    pub sources: Vec<Rc<ParseSourceFile>>,
}

impl GeneratedFile {
    pub fn with_statements(
        src_file_url: impl Into<String>,
        gen_file_url: impl Into<String>,
        stmts: Vec<Node<ModuleItem>>,
    ) -> Self {
        Self {
            src_file_url: src_file_url.into(),
            gen_file_url: gen_file_url.into(),
            stmts: Some(stmts),
            source: None,
            sources: Vec::new(),
        }
    }

    pub fn with_source(
        src_file_url: impl Into<String>,
        gen_file_url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            src_file_url: src_file_url.into(),
            gen_file_url: gen_file_url.into(),
            stmts: None,
            source: Some(source.into()),
            sources: Vec::new(),
        }
    }

    pub fn sourced_from(mut self, sources: Vec<Rc<ParseSourceFile>>) -> Self {
        self.sources = sources;
        self
    }

    /// Module names the statements import from.
    pub fn external_references(&self) -> BTreeSet<String> {
        self.stmts
            .as_deref()
            .map(collect_external_references)
            .unwrap_or_default()
    }

    pub fn has_statements(&self) -> bool {
        self.stmts.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Same target with the same content. Statements are compared by their
    /// printed form, so source positions do not matter.
    pub fn is_equivalent(&self, other: &GeneratedFile) -> bool {
        if self.gen_file_url != other.gen_file_url {
            return false;
        }
        if let Some(source) = &self.source {
            return other.source.as_ref() == Some(source);
        }
        match (&self.stmts, &other.stmts) {
            (Some(a), Some(b)) => print_items(a).text == print_items(b).text,
            _ => false,
        }
    }
}

// ============================================================================
// Structural errors
// ============================================================================

/// One template or metadata parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: ParseSourceSpan,
    pub contextual_message: String,
}

/// A class referenced as a module whose metadata could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingModuleMetadata {
    pub class_name: String,
    pub file_name: String,
}

/// Source the analyzer could not build a structural model from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StructuralError {
    pub message: String,
    pub parse_errors: Vec<ParseError>,
    pub chain: Option<MessageChain>,
    pub position: Option<Position>,
    pub missing_module: Option<MissingModuleMetadata>,
}

impl StructuralError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            parse_errors: Vec::new(),
            chain: None,
            position: None,
            missing_module: None,
        }
    }

    pub fn with_parse_errors(mut self, parse_errors: Vec<ParseError>) -> Self {
        self.parse_errors = parse_errors;
        self
    }

    /// A user-facing message chain, optionally anchored at a position.
    pub fn with_chain(mut self, chain: MessageChain, position: Option<Position>) -> Self {
        self.chain = Some(chain);
        self.position = position;
        self
    }

    pub fn with_missing_module(mut self, class_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.missing_module = Some(MissingModuleMetadata {
            class_name: class_name.into(),
            file_name: file_name.into(),
        });
        self
    }

    pub fn is_formatted(&self) -> bool {
        self.chain.is_some()
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// What the analyzer may ask of the host while it works.
pub trait AnalyzerHost {
    fn is_source_file(&self, file_name: &str) -> bool;

    /// Parsed original unit, without generated cross-references.
    fn original_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>>;

    fn get_metadata_for(&self, file_name: &str) -> Result<Option<Vec<Value>>>;

    fn load_summary(&self, file_name: &str) -> Option<String>;

    fn load_resource(&self, file_name: &str) -> Result<ResourceText>;

    fn file_name_to_module_name(&self, imported_file: &str, containing_file: &str) -> Result<String>;

    fn module_name_to_file_name(
        &self,
        module_name: &str,
        containing_file: Option<&str>,
    ) -> Result<Option<String>>;

    fn resource_name_to_file_name(&self, resource_name: &str, containing_file: &str) -> Option<String>;

    fn to_summary_file_name(&self, file_name: &str, referring_src_file_name: &str) -> Result<String>;

    fn from_summary_file_name(&self, file_name: &str, referring_lib_file_name: &str) -> Result<String>;

    fn get_output_name(&self, file_name: &str) -> String;
}

/// Produces companion content on demand while the host compiler pulls
/// units in.
pub trait CodeGenerator {
    /// Basic stub content for `gen_file_name`.
    fn generate_file(
        &self,
        host: &dyn AnalyzerHost,
        gen_file_name: &str,
        base_file_name: Option<&str>,
    ) -> Result<GeneratedFile>;

    /// Companion names a source file may have.
    fn find_generated_file_names(&self, file_name: &str) -> Vec<String>;
}

/// Extracts decorator metadata from a parsed unit.
pub trait MetadataCollector {
    /// Module metadata record (`{"__symbolic": "module", "metadata": {..}}`)
    /// or `None` when the unit has nothing to record.
    fn collect_metadata(&self, file: &SourceFile) -> Option<Value>;
}

/// The analysis engine proper.
pub trait MetadataAnalyzer: CodeGenerator + MetadataCollector {
    type Analysis: Default;

    fn analyze_sync(
        &self,
        host: &dyn AnalyzerHost,
        source_files: &[String],
        ts_files: &[String],
    ) -> Result<Self::Analysis>;

    /// Same as [`MetadataAnalyzer::analyze_sync`], but may await deferred
    /// resources.
    fn analyze_async(
        &self,
        host: &dyn AnalyzerHost,
        source_files: &[String],
        ts_files: &[String],
    ) -> impl Future<Output = Result<Self::Analysis>>;

    /// Stub with enough declarations to type-check the real implementation
    /// against, or `None` when the companion needs none.
    fn emit_type_check_stub(
        &self,
        host: &dyn AnalyzerHost,
        gen_file_name: &str,
        base_file_name: &str,
    ) -> Result<Option<GeneratedFile>>;

    fn emit_all_impls(&self, host: &dyn AnalyzerHost, analysis: &Self::Analysis) -> Result<Vec<GeneratedFile>>;
}
