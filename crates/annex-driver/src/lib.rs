//! Annex Compiler Driver Library
//!
//! Incremental meta-compilation on top of a host TypeScript compiler:
//! module-name resolution for generated imports, the host adapter that
//! interleaves original units, generated companions and library summaries,
//! the two-pass program build and its emit pipeline, and diagnostic
//! translation.
//!
//! The host compiler and the metadata analyzer are supplied by the embedder
//! through the traits in [`compiler`] and [`analyzer`].

pub mod analyzer;
pub mod compiler;
pub mod context;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod generation;
pub mod host_adapter;
pub mod metadata_cache;
pub mod module_resolution;
pub mod options;
pub mod package_json;
pub mod paths;
pub mod program;
pub mod source_span;

pub use analyzer::{
    AnalyzerHost, CodeGenerator, GeneratedFile, MetadataAnalyzer, MetadataCollector, ParseError, StructuralError,
};
pub use compiler::{
    CancellationToken, CompilerHost, EmitRequest, EmitResult, HostCompiler, OutputFile, Program, SourceParser,
    StructureReuse,
};
pub use context::{FsHost, HostCapabilities, HostContext, MemoryHost, ResourceText};
pub use diagnostics::{AnnexDiagnostic, TranslatedDiagnostics, DEFAULT_ERROR_CODE, SOURCE};
pub use emit::{Batching, EmitFlags, EmitOptions};
pub use error::{CompileError, Result};
pub use generation::{BuildGeneration, GeneratedUnit, LibrarySummary};
pub use host_adapter::{HostAdapter, ShouldGenerate};
pub use module_resolution::{ModuleResolver, ResolvedModule};
pub use options::{AnnotationsAs, CompilerOptions, ModuleKind, Project};
pub use program::{BuildState, MetaProgram, PreviousBuild};
