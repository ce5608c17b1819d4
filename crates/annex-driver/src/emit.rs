//! Emit building blocks
//!
//! Flags, the source-to-output path mapper, the transform that substitutes
//! generated statements into companion units, and the router every emitted
//! file passes through. [`crate::program::MetaProgram::emit`] puts them
//! together.

use std::collections::HashMap;
use std::ops::BitOr;
use std::rc::Rc;

use annex_ast::{ModuleItem, Node, SourceFile};
use annex_transform::{
    DecoratorLowering, ExpressionLowering, InlineResources, LowerMetadataTransform, ResourceHost, SourceTransform,
    TransformContext, TransformError, TransformPipeline,
};

use crate::analyzer::GeneratedFile;
use crate::compiler::{CancellationToken, EmitResult, OutputFile, Program};
use crate::context::HostContext;
use crate::error::{CompileError, Result};
use crate::generation::LibrarySummary;
use crate::options::CompilerOptions;
use crate::paths;

/// Below this many files, units are emitted one at a time.
pub const BATCH_THRESHOLD: usize = 20;

const CORE_SYMBOLS_FILE: &str = "core/src/core_symbols.ts";

const CLOSURE_FILE_OVERVIEW: &str = "*\n * @fileoverview This file was generated by the annex template compiler. Do not edit.\n *\n * @suppress {suspiciousCode,uselessCode,missingProperties,missingOverride,checkTypes,extraRequire}\n * tslint:disable\n ";

// ============================================================================
// Flags and options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmitFlags(u32);

impl EmitFlags {
    pub const NONE: EmitFlags = EmitFlags(0);
    pub const DTS: EmitFlags = EmitFlags(1);
    pub const JS: EmitFlags = EmitFlags(1 << 1);
    pub const METADATA: EmitFlags = EmitFlags(1 << 2);
    pub const I18N_BUNDLE: EmitFlags = EmitFlags(1 << 3);
    pub const CODEGEN: EmitFlags = EmitFlags(1 << 4);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: EmitFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: EmitFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for EmitFlags {
    fn default() -> Self {
        EmitFlags::DTS | EmitFlags::JS | EmitFlags::CODEGEN
    }
}

impl BitOr for EmitFlags {
    type Output = EmitFlags;

    fn bitor(self, rhs: EmitFlags) -> EmitFlags {
        EmitFlags(self.0 | rhs.0)
    }
}

/// How units are handed to the host compiler's emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Batching {
    /// Per file below [`BATCH_THRESHOLD`], whole program otherwise
    #[default]
    Auto,
    PerFile,
    WholeProgram,
}

#[derive(Default)]
pub struct EmitOptions<'a> {
    pub flags: EmitFlags,
    pub cancellation: Option<&'a dyn CancellationToken>,
    /// Run after the built-in transforms and before annotation lowering
    pub before: Vec<Box<dyn SourceTransform + 'a>>,
    pub after: Vec<Box<dyn SourceTransform + 'a>>,
    pub batching: Batching,
}

impl<'a> EmitOptions<'a> {
    pub fn new(flags: EmitFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    pub fn with_batching(mut self, batching: Batching) -> Self {
        self.batching = batching;
        self
    }
}

/// Concatenate the results of several emit calls.
pub fn merge_emit_results(results: impl IntoIterator<Item = EmitResult>) -> EmitResult {
    let mut merged = EmitResult::default();
    for result in results {
        merged.emit_skipped |= result.emit_skipped;
        merged.diagnostics.extend(result.diagnostics);
        merged.emitted_files.extend(result.emitted_files);
    }
    merged
}

// ============================================================================
// Source to output paths
// ============================================================================

/// Maps a source path to the path of its output. Derived once per emit
/// from one observed source/output pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrcToOutPathMapper {
    /// No `outDir`: outputs sit next to their sources
    Normalize,
    /// The sample output landed in its source directory
    Identity,
    Rooted { out_dir: String, root_dir: String },
}

impl SrcToOutPathMapper {
    pub fn new(out_dir: Option<&str>, sample: Option<(&str, &str)>) -> Result<Self> {
        let Some(out_dir) = out_dir else {
            return Ok(Self::Normalize);
        };
        let Some((sample_src, sample_out)) = sample else {
            return Err(CompileError::Consistency(
                "Can't calculate the rootDir without a sample srcFileName / outFileName. ".into(),
            ));
        };
        let src_dir = paths::dirname(&sample_src.replace('\\', "/"));
        let out_file_dir = paths::dirname(&sample_out.replace('\\', "/"));
        if src_dir == out_file_dir {
            return Ok(Self::Identity);
        }
        let src_parts: Vec<&str> = src_dir.split('/').collect();
        let relative_out = paths::relative(out_dir, &out_file_dir);
        let out_parts: Vec<&str> = relative_out.split('/').collect();
        let common = src_parts
            .iter()
            .rev()
            .zip(out_parts.iter().rev())
            .take_while(|(s, o)| s == o)
            .count();
        let root_dir = src_parts[..src_parts.len() - common].join("/");
        tracing::debug!(out_dir, root_dir = %root_dir, "derived output root");
        Ok(Self::Rooted {
            out_dir: out_dir.to_string(),
            root_dir,
        })
    }

    pub fn map(&self, src_file_name: &str) -> String {
        match self {
            Self::Normalize => paths::normalize(src_file_name),
            Self::Identity => src_file_name.to_string(),
            Self::Rooted { out_dir, root_dir } => {
                paths::resolve(out_dir, &paths::relative(root_dir, src_file_name))
            }
        }
    }
}

// ============================================================================
// Transforms
// ============================================================================

/// Substitutes the statements of generated companions into their units.
pub struct GeneratedFileEmitter {
    files: HashMap<String, Vec<Node<ModuleItem>>>,
    header_comment: Option<String>,
}

impl GeneratedFileEmitter {
    pub fn new<'g>(gen_files: impl IntoIterator<Item = &'g GeneratedFile>, annotate_for_closure_compiler: bool) -> Self {
        let files = gen_files
            .into_iter()
            .filter_map(|gen| Some((gen.gen_file_url.clone(), gen.stmts.clone()?)))
            .collect();
        Self {
            files,
            header_comment: annotate_for_closure_compiler.then(|| CLOSURE_FILE_OVERVIEW.to_string()),
        }
    }
}

impl SourceTransform for GeneratedFileEmitter {
    fn name(&self) -> &'static str {
        "emit-generated-files"
    }

    fn transform(&self, mut file: SourceFile, _ctx: &mut TransformContext<'_>) -> std::result::Result<SourceFile, TransformError> {
        if let Some(stmts) = self.files.get(&file.file_name) {
            file.items = stmts.clone();
            file.header_comment = self.header_comment.clone();
        }
        Ok(file)
    }
}

/// Hands the host compiler each unit with the references it was written
/// with. Companions attached for type checking must not leak into outputs.
pub struct OriginalReferences;

impl SourceTransform for OriginalReferences {
    fn name(&self) -> &'static str {
        "original-references"
    }

    fn transform(&self, mut file: SourceFile, _ctx: &mut TransformContext<'_>) -> std::result::Result<SourceFile, TransformError> {
        if let Some(original) = file.original_referenced_files.take() {
            file.referenced_files = original;
        }
        Ok(file)
    }
}

/// Whether the program is the framework core itself.
pub fn is_compiling_core(options: &CompilerOptions, program: &dyn Program) -> bool {
    options.compiling_core
        || program
            .source_files()
            .iter()
            .any(|sf| sf.file_name.ends_with(CORE_SYMBOLS_FILE))
}

/// Transforms in the order they run: original references, resource
/// inlining, expression lowering, generated content, custom `before`,
/// annotation lowering, then custom `after`.
pub fn build_transforms<'a>(
    options: &CompilerOptions,
    resource_host: &'a dyn ResourceHost,
    lowering: &'a LowerMetadataTransform,
    generated: GeneratedFileEmitter,
    is_core: bool,
    custom_before: Vec<Box<dyn SourceTransform + 'a>>,
    custom_after: Vec<Box<dyn SourceTransform + 'a>>,
) -> TransformPipeline<'a> {
    let mut pipeline = TransformPipeline::new();
    pipeline.before.push(Box::new(OriginalReferences));
    if options.enable_resource_inlining {
        pipeline.before.push(Box::new(InlineResources::new(resource_host)));
    }
    if !options.disable_expression_lowering {
        pipeline.before.push(Box::new(ExpressionLowering::new(lowering)));
    }
    pipeline.before.push(Box::new(generated));
    pipeline.before.extend(custom_before);
    // last, so custom transforms still see decorators rather than statics
    if options.lowers_annotations() {
        pipeline.before.push(Box::new(DecoratorLowering {
            is_core,
            closure_annotations: options.annotate_for_closure_compiler,
            skip_class_decorators: false,
        }));
    }
    pipeline.after.extend(custom_after);
    tracing::debug!(transforms = ?pipeline.names(), "emit transforms");
    pipeline
}

// ============================================================================
// Output routing
// ============================================================================

/// Receives every file the emit produces. Records library summaries and
/// drops generated outputs without content before writing the rest.
pub struct OutputRouter<'a> {
    options: &'a CompilerOptions,
    context: &'a dyn HostContext,
    program: &'a dyn Program,
    gen_files: &'a HashMap<String, GeneratedFile>,
    pub library_summaries: Vec<LibrarySummary>,
    /// `(output, source)` for outputs produced from exactly one unit
    pub out_src_mapping: Vec<(String, String)>,
    pub emitted_source_files: Vec<Rc<SourceFile>>,
    pub written: Vec<String>,
}

impl<'a> OutputRouter<'a> {
    pub fn new(
        options: &'a CompilerOptions,
        context: &'a dyn HostContext,
        program: &'a dyn Program,
        gen_files: &'a HashMap<String, GeneratedFile>,
    ) -> Self {
        Self {
            options,
            context,
            program,
            gen_files,
            library_summaries: Vec::new(),
            out_src_mapping: Vec::new(),
            emitted_source_files: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Sink for the host compiler's emit.
    pub fn write_ts_output(&mut self, output: OutputFile) -> Result<()> {
        let gen_files = self.gen_files;
        let mut gen_file = None;
        if let [source] = output.source_files.as_slice() {
            self.out_src_mapping.push((output.file_name.clone(), source.clone()));
            gen_file = gen_files.get(source);
            if let Some(original) = self.program.get_source_file(source) {
                if !original.is_declaration_file && !paths::is_generated(source) {
                    self.emitted_source_files.push(original);
                }
            }
        }
        self.write_file(&output.file_name, &output.text, gen_file, &output.source_files)
    }

    pub fn write_file(
        &mut self,
        file_name: &str,
        data: &str,
        gen_file: Option<&GeneratedFile>,
        source_files: &[String],
    ) -> Result<()> {
        let base_file = gen_file.and_then(|gen| self.program.get_source_file(&gen.src_file_url));
        if let (Some(gen), Some(base)) = (gen_file, base_file) {
            self.record_library_output(file_name, data, gen, base);
        }

        let has_content = gen_file.is_some_and(GeneratedFile::has_statements);
        if paths::is_generated(file_name) && !self.options.allow_empty_codegen_files && !has_content {
            tracing::debug!(file = file_name, "skipping generated output without content");
            return Ok(());
        }

        self.context
            .write_file(file_name, data, source_files)
            .map_err(|source| CompileError::Io {
                path: file_name.to_string(),
                source,
            })?;
        tracing::trace!(file = file_name, "wrote output");
        self.written.push(file_name.to_string());
        Ok(())
    }

    /// Outputs for declaration-only bases are kept as summaries so later
    /// builds that depend on this one can resolve them next to the source.
    fn record_library_output(&mut self, file_name: &str, data: &str, gen: &GeneratedFile, base: Rc<SourceFile>) {
        if !base.is_declaration_file {
            return;
        }
        if let Some(stem) = gen.gen_file_url.strip_suffix(paths::SUMMARY_JSON_SUFFIX) {
            self.library_summaries.push(LibrarySummary::with_source_file(
                base.file_name.clone(),
                base.text.clone(),
                base.clone(),
            ));
            self.library_summaries
                .push(LibrarySummary::new(gen.gen_file_url.clone(), data));
            if !self.options.declaration {
                // the module name must still resolve without declaration output
                self.library_summaries
                    .push(LibrarySummary::new(format!("{}.axfactory.d.ts", stem), ""));
            }
        } else if file_name.ends_with(".d.ts") {
            let dts = match gen.gen_file_url.strip_suffix(".ts") {
                Some(stem) => format!("{}.d.ts", stem),
                None => gen.gen_file_url.clone(),
            };
            self.library_summaries.push(LibrarySummary::new(dts, data));
        }
    }
}
