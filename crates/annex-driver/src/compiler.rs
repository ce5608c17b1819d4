//! Interfaces of the host compiler
//!
//! The orchestrator never parses or type-checks TypeScript itself. It drives
//! a host compiler through these traits: the compiler creates programs that
//! pull their units from a [`CompilerHost`], reports whether a new program
//! could reuse the structure of an old one, and emits with extra source
//! transforms.

use std::rc::Rc;

use annex_ast::{Diagnostic, SourceFile};
use annex_transform::{SymbolResolver, TransformPipeline};

use crate::error::Result;
use crate::module_resolution::ResolvedModule;
use crate::options::CompilerOptions;

/// How much of an old program a new one could reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StructureReuse {
    Not,
    SafeModules,
    Completely,
}

/// Everything a program may ask of its host while it is being created.
pub trait CompilerHost {
    fn get_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>>;

    fn file_exists(&self, file_name: &str) -> bool;

    fn read_file(&self, file_name: &str) -> Option<String>;

    fn resolve_module_name(&self, module_name: &str, containing_file: &str) -> Option<ResolvedModule>;

    fn current_directory(&self) -> String;
}

pub trait SourceParser {
    /// Parse `text` as a unit named `file_name`. Parse problems are reported
    /// through the program's syntactic diagnostics, never by failing.
    fn parse_source_file(&self, file_name: &str, text: &str) -> SourceFile;
}

pub trait CancellationToken {
    fn is_cancellation_requested(&self) -> bool;
}

/// One file produced by emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub file_name: String,
    pub text: String,
    /// Units the output was produced from
    pub source_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitResult {
    pub emit_skipped: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub emitted_files: Vec<String>,
}

pub struct EmitRequest<'a> {
    /// Emit only this unit; the whole program when `None`
    pub target: Option<&'a str>,
    pub emit_only_dts: bool,
    pub transforms: &'a TransformPipeline<'a>,
    pub cancellation: Option<&'a dyn CancellationToken>,
}

pub trait Program {
    fn root_names(&self) -> &[String];

    fn source_files(&self) -> Vec<Rc<SourceFile>>;

    fn get_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>>;

    /// Reuse verdict relative to the old program this one was created from.
    fn structure_reuse(&self) -> StructureReuse;

    fn symbols(&self) -> &dyn SymbolResolver;

    fn options_diagnostics(&self) -> Vec<Diagnostic>;

    fn syntactic_diagnostics(
        &self,
        file_name: Option<&str>,
        cancellation: Option<&dyn CancellationToken>,
    ) -> Vec<Diagnostic>;

    fn semantic_diagnostics(
        &self,
        file_name: &str,
        cancellation: Option<&dyn CancellationToken>,
    ) -> Vec<Diagnostic>;

    /// Run the transforms over the selected units and hand each output to
    /// `write_file`.
    fn emit(
        &self,
        request: EmitRequest<'_>,
        write_file: &mut dyn FnMut(OutputFile) -> Result<()>,
    ) -> Result<EmitResult>;
}

pub trait HostCompiler: SourceParser {
    type Program: Program;

    fn create_program(
        &self,
        root_names: &[String],
        options: &CompilerOptions,
        host: &dyn CompilerHost,
        old_program: Option<&Self::Program>,
    ) -> Self::Program;
}
