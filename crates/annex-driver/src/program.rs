//! The two-pass build
//!
//! [`MetaProgram`] drives a build through
//!
//! ```text
//! Uninitialized -> StubBuilt -> Analyzed -> FinalBuilt -> Emitted
//! ```
//!
//! 1. **Stub pass**: create a host program over the roots. Every companion a
//!    source references is materialized with basic stub content.
//! 2. **Analysis**: hand the project sources to the metadata analyzer.
//! 3. **Typed pass**: replace `.axfactory.ts` stubs with type-check stubs and
//!    create the program again from the stub program. The host compiler must
//!    report complete structure reuse.
//! 4. **Emit**: generate the full companions and emit through the host
//!    compiler with the annex transforms installed.
//!
//! A structural error in any phase leaves a degraded fallback program and
//! records structural diagnostics (state `Errored`). Other errors propagate
//! once the fallback exists.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use annex_ast::{Diagnostic, SourceFile};

use crate::analyzer::{GeneratedFile, MetadataAnalyzer};
use crate::compiler::{
    CancellationToken, EmitRequest, EmitResult, HostCompiler, OutputFile, Program, StructureReuse,
};
use crate::context::{HostCapabilities, HostContext};
use crate::diagnostics::{
    ng_to_host, syntax_error_to_diagnostics, translate_diagnostics, AnnexDiagnostic, DEFAULT_ERROR_CODE, SOURCE,
};
use crate::emit::{
    build_transforms, is_compiling_core, merge_emit_results, Batching, EmitFlags, EmitOptions, GeneratedFileEmitter,
    OutputRouter, SrcToOutPathMapper, BATCH_THRESHOLD,
};
use crate::error::{CompileError, Result};
use crate::generation::{BuildGeneration, LibrarySummary};
use crate::host_adapter::HostAdapter;
use crate::options::CompilerOptions;
use crate::paths;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Uninitialized,
    StubBuilt,
    Analyzed,
    FinalBuilt,
    Emitted,
    /// A phase failed; a fallback program without companions is in place
    Errored,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Uninitialized => "uninitialized",
            BuildState::StubBuilt => "stub-built",
            BuildState::Analyzed => "analyzed",
            BuildState::FinalBuilt => "final-built",
            BuildState::Emitted => "emitted",
            BuildState::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisMode {
    Sync,
    Async,
}

/// Records of a finished build that the next build may consult.
pub struct PreviousBuild<P> {
    /// Reuse baseline for the next stub pass
    pub program: Option<P>,
    pub library_summaries: Vec<LibrarySummary>,
    pub emitted_generated_files: BTreeMap<String, GeneratedFile>,
    pub emitted_source_files: BTreeMap<String, Rc<SourceFile>>,
}

impl<P> Default for PreviousBuild<P> {
    fn default() -> Self {
        Self {
            program: None,
            library_summaries: Vec::new(),
            emitted_generated_files: BTreeMap::new(),
            emitted_source_files: BTreeMap::new(),
        }
    }
}

struct StubProgram<P> {
    program: P,
    root_names: Vec<String>,
    /// Units the analyzer works on
    source_files: Vec<String>,
    /// Units that can be type-checked
    ts_files: Vec<String>,
}

// ============================================================================
// MetaProgram
// ============================================================================

pub struct MetaProgram<C: HostCompiler, A: MetadataAnalyzer> {
    root_names: Vec<String>,
    options: CompilerOptions,
    context: Rc<dyn HostContext>,
    capabilities: HostCapabilities,
    compiler: C,
    analyzer: A,
    generation: BuildGeneration,
    old_program: Option<C::Program>,
    previous_library_summaries: Vec<LibrarySummary>,
    previous_emitted_generated_files: BTreeMap<String, GeneratedFile>,
    previous_emitted_source_files: BTreeMap<String, Rc<SourceFile>>,
    state: BuildState,
    analysis_mode: Option<AnalysisMode>,
    stub: Option<StubProgram<C::Program>>,
    program: Option<C::Program>,
    analysis: Option<A::Analysis>,
    structural_diagnostics: Vec<AnnexDiagnostic>,
    emitted_library_summaries: Vec<LibrarySummary>,
    emitted_generated_files: Vec<GeneratedFile>,
    emitted_source_files: Vec<Rc<SourceFile>>,
}

impl<C: HostCompiler, A: MetadataAnalyzer> MetaProgram<C, A> {
    pub fn new(
        root_names: Vec<String>,
        options: CompilerOptions,
        context: Rc<dyn HostContext>,
        compiler: C,
        analyzer: A,
        previous: Option<PreviousBuild<C::Program>>,
    ) -> Self {
        let previous = previous.unwrap_or_default();
        let generation = BuildGeneration::new(previous.library_summaries.iter().cloned());
        Self {
            root_names,
            options,
            context,
            capabilities: HostCapabilities::default(),
            compiler,
            analyzer,
            generation,
            old_program: previous.program,
            previous_library_summaries: previous.library_summaries,
            previous_emitted_generated_files: previous.emitted_generated_files,
            previous_emitted_source_files: previous.emitted_source_files,
            state: BuildState::Uninitialized,
            analysis_mode: None,
            stub: None,
            program: None,
            analysis: None,
            structural_diagnostics: Vec::new(),
            emitted_library_summaries: Vec::new(),
            emitted_generated_files: Vec::new(),
            emitted_source_files: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn generation(&self) -> &BuildGeneration {
        &self.generation
    }

    /// Host view over this build's caches.
    pub fn host_adapter(&self) -> HostAdapter<'_> {
        HostAdapter::new(
            &self.options,
            self.context.as_ref(),
            &self.generation,
            &self.compiler,
            &self.analyzer,
            &self.analyzer,
        )
        .with_root_files(&self.root_names)
        .with_capabilities(&self.capabilities)
    }

    /// The final program, or the fallback after a structural error.
    pub fn program(&self) -> Result<&C::Program> {
        match (&self.program, self.state) {
            (Some(program), _) => Ok(program),
            (None, state) => Err(CompileError::Usage(format!(
                "The typed program is not available while the build is {}",
                state
            ))),
        }
    }

    pub fn analysis(&self) -> Option<&A::Analysis> {
        self.analysis.as_ref()
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Stub pass, analysis and typed pass in one go.
    pub fn load_structure(&mut self) -> Result<()> {
        self.build_stub_program()?;
        if self.state == BuildState::StubBuilt {
            self.analyze()?;
        }
        if self.state == BuildState::Analyzed {
            self.build_typed_program()?;
        }
        Ok(())
    }

    /// Same as [`MetaProgram::load_structure`] with asynchronous analysis.
    pub async fn load_structure_async(&mut self) -> Result<()> {
        self.build_stub_program()?;
        if self.state == BuildState::StubBuilt {
            self.analyze_async().await?;
        }
        if self.state == BuildState::Analyzed {
            self.build_typed_program()?;
        }
        Ok(())
    }

    pub fn build_stub_program(&mut self) -> Result<()> {
        self.expect_state(BuildState::Uninitialized, "build the stub program")?;
        let started = Instant::now();
        match self.create_stub_program() {
            Ok(stub) => {
                tracing::debug!(
                    roots = stub.root_names.len(),
                    sources = stub.source_files.len(),
                    ts_files = stub.ts_files.len(),
                    generated = self.generation.generated.borrow().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stub program built"
                );
                self.stub = Some(stub);
                self.state = BuildState::StubBuilt;
                Ok(())
            }
            Err(error) => self.create_program_on_error(error),
        }
    }

    fn create_stub_program(&self) -> Result<StubProgram<C::Program>> {
        let host = self.host_adapter();
        let mut root_names: Vec<String> = if self.options.generate_code_for_libraries != Some(false) {
            // a generated root would be overwritten by its own output
            self.root_names
                .iter()
                .filter(|name| !paths::is_generated(name))
                .cloned()
                .collect()
        } else {
            self.root_names.clone()
        };
        if self.options.no_resolve {
            for root in &self.root_names {
                if host.should_generate_files_for(root) {
                    root_names.extend(self.analyzer.find_generated_file_names(root));
                }
            }
        }

        let program = self
            .compiler
            .create_program(&root_names, &self.options, &host, self.old_program.as_ref());
        self.generation.take_deferred_error()?;

        let mut source_files = Vec::new();
        let mut ts_files = Vec::new();
        for sf in program.source_files() {
            if host.is_source_file(&sf.file_name) {
                source_files.push(sf.file_name.clone());
            }
            if paths::is_ts(&sf.file_name) && !paths::is_dts(&sf.file_name) {
                ts_files.push(sf.file_name.clone());
            }
        }
        Ok(StubProgram {
            program,
            root_names,
            source_files,
            ts_files,
        })
    }

    fn begin_analysis(&mut self, mode: AnalysisMode) -> Result<()> {
        match self.analysis_mode {
            Some(previous) if previous != mode => {
                return Err(CompileError::Usage(
                    "annex structure loaded both synchronously and asynchronously".into(),
                ))
            }
            Some(_) => return Err(CompileError::Usage("annex structure already loaded".into())),
            None => {}
        }
        self.expect_state(BuildState::StubBuilt, "analyze")?;
        self.analysis_mode = Some(mode);
        Ok(())
    }

    pub fn analyze(&mut self) -> Result<()> {
        self.begin_analysis(AnalysisMode::Sync)?;
        let result = match &self.stub {
            Some(stub) => self
                .analyzer
                .analyze_sync(&self.host_adapter(), &stub.source_files, &stub.ts_files),
            None => Err(missing_stub()),
        };
        self.finish_analysis(result)
    }

    pub async fn analyze_async(&mut self) -> Result<()> {
        self.begin_analysis(AnalysisMode::Async)?;
        let result = match &self.stub {
            Some(stub) => {
                let host = self.host_adapter();
                self.analyzer
                    .analyze_async(&host, &stub.source_files, &stub.ts_files)
                    .await
            }
            None => Err(missing_stub()),
        };
        self.finish_analysis(result)
    }

    fn finish_analysis(&mut self, result: Result<A::Analysis>) -> Result<()> {
        match result.and_then(|analysis| self.generation.take_deferred_error().map(|()| analysis)) {
            Ok(analysis) => {
                tracing::debug!(mode = ?self.analysis_mode, "analysis finished");
                self.analysis = Some(analysis);
                self.state = BuildState::Analyzed;
                Ok(())
            }
            Err(error) => self.create_program_on_error(error),
        }
    }

    pub fn build_typed_program(&mut self) -> Result<()> {
        self.expect_state(BuildState::Analyzed, "build the typed program")?;
        let Some(stub) = self.stub.take() else {
            return Err(missing_stub());
        };
        let result = self.create_typed_program(&stub);
        // the old program must not outlive the stub pass
        self.old_program = None;
        drop(stub);
        match result {
            Ok(program) => {
                tracing::debug!(files = program.source_files().len(), "typed program built");
                self.program = Some(program);
                self.state = BuildState::FinalBuilt;
                Ok(())
            }
            Err(error) => self.create_program_on_error(error),
        }
    }

    fn create_typed_program(&self, stub: &StubProgram<C::Program>) -> Result<C::Program> {
        let host = self.host_adapter();
        for sf in stub.program.source_files() {
            if !sf.file_name.ends_with(paths::FACTORY_TS_SUFFIX) {
                continue;
            }
            let verdict = host.should_generate_file(&sf.file_name);
            let (true, Some(base)) = (verdict.generate, verdict.base_file_name) else {
                continue;
            };
            if let Some(gen) = self.analyzer.emit_type_check_stub(&host, &sf.file_name, &base)? {
                host.update_generated_file(&gen)?;
            }
        }

        let program = self
            .compiler
            .create_program(&stub.root_names, &self.options, &host, Some(&stub.program));
        self.generation.take_deferred_error()?;
        // every unit is cached and the stubs import exactly what they did
        // before, so nothing may have been re-resolved
        if program.structure_reuse() != StructureReuse::Completely {
            return Err(CompileError::Consistency(
                "Internal Error: The structure of the program changed during codegen.".into(),
            ));
        }
        Ok(program)
    }

    /// Install a fallback program that sees no project sources. Structural
    /// errors become diagnostics; anything else propagates afterwards.
    fn create_program_on_error(&mut self, error: CompileError) -> Result<()> {
        tracing::warn!(error = %error, state = %self.state, "build failed, continuing with a fallback program");
        self.analysis = Some(A::Analysis::default());
        self.old_program = None;
        self.stub = None;
        self.generation.set_degraded();
        let program = {
            let host = self.host_adapter();
            self.compiler.create_program(&self.root_names, &self.options, &host, None)
        };
        if let Err(parked) = self.generation.take_deferred_error() {
            tracing::debug!(error = %parked, "dropping error raised while creating the fallback program");
        }
        self.program = Some(program);
        self.state = BuildState::Errored;

        match error {
            CompileError::Structural(structural) => {
                let program = self.program.as_ref().map(|p| p as &dyn Program);
                let diagnostics = syntax_error_to_diagnostics(&structural, program);
                self.structural_diagnostics.extend(diagnostics);
                Ok(())
            }
            other => Err(other),
        }
    }

    fn expect_state(&self, expected: BuildState, action: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(CompileError::Usage(format!(
            "Cannot {} while the build is {} (expected {})",
            action, self.state, expected
        )))
    }

    fn final_program(&self, action: &str) -> Result<&C::Program> {
        match (self.state, &self.program) {
            (BuildState::FinalBuilt | BuildState::Emitted | BuildState::Errored, Some(program)) => Ok(program),
            (state, _) => Err(CompileError::Usage(format!(
                "Cannot {} while the build is {}; load the structure first",
                action, state
            ))),
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Host option diagnostics followed by the annex option checks.
    pub fn options_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = match (&self.program, &self.stub) {
            (Some(program), _) => program.options_diagnostics(),
            (None, Some(stub)) => stub.program.options_diagnostics(),
            (None, None) => Vec::new(),
        };
        diagnostics.extend(self.options.validate());
        diagnostics
    }

    pub fn syntactic_diagnostics(
        &self,
        file_name: Option<&str>,
        cancellation: Option<&dyn CancellationToken>,
    ) -> Result<Vec<Diagnostic>> {
        Ok(self
            .final_program("query syntactic diagnostics")?
            .syntactic_diagnostics(file_name, cancellation))
    }

    pub fn structural_diagnostics(&self) -> Result<Vec<Diagnostic>> {
        self.final_program("query structural diagnostics")?;
        Ok(self.structural_diagnostics.iter().map(ng_to_host).collect())
    }

    /// Semantic diagnostics of user units; generated units are left to
    /// [`MetaProgram::annex_semantic_diagnostics`].
    pub fn host_semantic_diagnostics(
        &self,
        file_name: Option<&str>,
        cancellation: Option<&dyn CancellationToken>,
    ) -> Result<Vec<Diagnostic>> {
        let program = self.final_program("query semantic diagnostics")?;
        let names: Vec<String> = match file_name {
            Some(name) => vec![name.to_string()],
            None => program
                .source_files()
                .iter()
                .filter(|sf| !paths::is_generated(&sf.file_name))
                .map(|sf| sf.file_name.clone())
                .collect(),
        };
        Ok(names
            .iter()
            .flat_map(|name| program.semantic_diagnostics(name, cancellation))
            .collect())
    }

    /// Semantic diagnostics of generated units, moved onto the templates
    /// they came from.
    pub fn annex_semantic_diagnostics(
        &self,
        cancellation: Option<&dyn CancellationToken>,
    ) -> Result<Vec<AnnexDiagnostic>> {
        let program = self.final_program("query annex semantic diagnostics")?;
        let diagnostics: Vec<Diagnostic> = program
            .source_files()
            .iter()
            .filter(|sf| paths::is_generated(&sf.file_name) && !sf.is_declaration_file)
            .flat_map(|sf| program.semantic_diagnostics(&sf.file_name, cancellation))
            .collect();
        Ok(translate_diagnostics(&self.host_adapter(), diagnostics).ng)
    }

    // ========================================================================
    // Emit
    // ========================================================================

    pub fn emit(&mut self, options: EmitOptions<'_>) -> Result<EmitResult> {
        self.final_program("emit")?;
        let started = Instant::now();
        let flags = options.flags;
        if flags.contains(EmitFlags::I18N_BUNDLE) {
            tracing::debug!("message bundles are not produced by this driver");
        }
        if !flags.intersects(EmitFlags::DTS | EmitFlags::JS | EmitFlags::METADATA | EmitFlags::CODEGEN) {
            return Ok(EmitResult {
                emit_skipped: true,
                ..Default::default()
            });
        }

        let gen_files = match self.generate_files_for_emit(flags)? {
            Ok(gen_files) => gen_files,
            Err(diagnostics) => {
                return Ok(EmitResult {
                    emit_skipped: true,
                    diagnostics,
                    emitted_files: Vec::new(),
                })
            }
        };

        let outcome = self.emit_files(&gen_files, options, started)?;
        self.emitted_generated_files = gen_files;
        self.emitted_library_summaries = outcome.library_summaries;
        self.emitted_source_files = outcome.emitted_source_files;
        self.state = match self.state {
            BuildState::Errored => BuildState::Errored,
            _ => BuildState::Emitted,
        };
        Ok(outcome.result)
    }

    /// Full companion content, minus companions the previous build already
    /// emitted unchanged. A structural error becomes the diagnostics of a
    /// skipped emit.
    fn generate_files_for_emit(&self, flags: EmitFlags) -> Result<std::result::Result<Vec<GeneratedFile>, Vec<Diagnostic>>> {
        if !flags.contains(EmitFlags::CODEGEN) {
            return Ok(Ok(Vec::new()));
        }
        let Some(analysis) = &self.analysis else {
            return Err(CompileError::Usage("Cannot generate files before the structure is loaded".into()));
        };
        let host = self.host_adapter();
        match self.analyzer.emit_all_impls(&host, analysis) {
            Ok(gen_files) => Ok(Ok(gen_files
                .into_iter()
                .filter(|gen| self.options.is_in_root_dir(&gen.gen_file_url))
                .filter(|gen| {
                    self.previous_emitted_generated_files
                        .get(&gen.gen_file_url)
                        .map_or(true, |old| !gen.is_equivalent(old))
                })
                .collect())),
            Err(CompileError::Structural(error)) => {
                let mut diagnostic = Diagnostic::error(error.message, DEFAULT_ERROR_CODE);
                diagnostic.source = Some(SOURCE.to_string());
                Ok(Err(vec![diagnostic]))
            }
            Err(other) => Err(other),
        }
    }

    /// Units to hand to the host compiler: user units not emitted unchanged
    /// by the previous build.
    fn source_files_for_emit(&self, program: &C::Program) -> Vec<Rc<SourceFile>> {
        program
            .source_files()
            .into_iter()
            .filter(|sf| !sf.is_declaration_file && !paths::is_generated(&sf.file_name))
            .filter(|sf| {
                self.previous_emitted_source_files
                    .get(&sf.file_name)
                    .map_or(true, |old| !(Rc::ptr_eq(old, sf) || old.text == sf.text))
            })
            .collect()
    }

    fn emit_files(&self, gen_files: &[GeneratedFile], options: EmitOptions<'_>, started: Instant) -> Result<EmitOutcome> {
        let program = self.final_program("emit")?;
        let host = self.host_adapter();
        let flags = options.flags;
        let gen_by_name: HashMap<String, GeneratedFile> = gen_files
            .iter()
            .map(|gen| (gen.gen_file_url.clone(), gen.clone()))
            .collect();
        let gen_ts_files: Vec<&GeneratedFile> = gen_files.iter().filter(|gen| gen.stmts.is_some()).collect();
        let gen_json_files: Vec<&GeneratedFile> = gen_files.iter().filter(|gen| gen.source.is_some()).collect();

        let pipeline = build_transforms(
            &self.options,
            &host,
            &self.generation.lowering,
            GeneratedFileEmitter::new(gen_files, self.options.annotate_for_closure_compiler),
            is_compiling_core(&self.options, program),
            options.before,
            options.after,
        );
        let emit_only_dts = flags.contains(EmitFlags::DTS) && !flags.contains(EmitFlags::JS);
        let mut router = OutputRouter::new(&self.options, self.context.as_ref(), program, &gen_by_name);

        let source_files_to_emit = self.source_files_for_emit(program);
        let batching = match options.batching {
            Batching::Auto if source_files_to_emit.len() + gen_ts_files.len() < BATCH_THRESHOLD => Batching::PerFile,
            Batching::Auto => Batching::WholeProgram,
            explicit => explicit,
        };
        tracing::debug!(
            ?batching,
            user_files = source_files_to_emit.len(),
            generated_ts = gen_ts_files.len(),
            generated_json = gen_json_files.len(),
            "emitting"
        );

        let (mut result, emitted_user_ts_count) = match batching {
            Batching::PerFile => {
                let targets = source_files_to_emit
                    .iter()
                    .map(|sf| sf.file_name.as_str())
                    .chain(gen_ts_files.iter().map(|gen| gen.gen_file_url.as_str()));
                let mut results = Vec::new();
                for target in targets {
                    let request = EmitRequest {
                        target: Some(target),
                        emit_only_dts,
                        transforms: &pipeline,
                        cancellation: options.cancellation,
                    };
                    results.push(program.emit(request, &mut |output: OutputFile| router.write_ts_output(output))?);
                }
                (merge_emit_results(results), source_files_to_emit.len())
            }
            Batching::WholeProgram | Batching::Auto => {
                let request = EmitRequest {
                    target: None,
                    emit_only_dts,
                    transforms: &pipeline,
                    cancellation: options.cancellation,
                };
                let result = program.emit(request, &mut |output: OutputFile| router.write_ts_output(output))?;
                let count = program.source_files().len().saturating_sub(gen_ts_files.len());
                (result, count)
            }
        };

        // emit diagnostics only matter when they block emit
        if self.options.no_emit_on_error {
            let translated = translate_diagnostics(&host, std::mem::take(&mut result.diagnostics));
            result.diagnostics = translated.ts;
            result.diagnostics.extend(
                self.structural_diagnostics
                    .iter()
                    .chain(translated.ng.iter())
                    .map(ng_to_host),
            );
        }

        if router.out_src_mapping.is_empty() {
            // nothing was emitted, so no json companions either
            result.diagnostics.push(Diagnostic::message("Emitted no files.", SOURCE));
            return Ok(EmitOutcome::from_router(result, router));
        }

        let sample = router
            .out_src_mapping
            .first()
            .map(|(out, src)| (src.clone(), out.clone()));
        let mapper = SrcToOutPathMapper::new(
            self.options.out_dir.as_deref(),
            sample.as_ref().map(|(src, out)| (src.as_str(), out.as_str())),
        )?;

        if flags.contains(EmitFlags::CODEGEN) {
            for gen in &gen_json_files {
                let out_file = mapper.map(&gen.gen_file_url);
                router.write_file(&out_file, gen.source.as_deref().unwrap_or_default(), Some(*gen), &[])?;
            }
        }

        let mut metadata_json_count = 0;
        if flags.contains(EmitFlags::METADATA) {
            for sf in program.source_files() {
                if sf.is_declaration_file || paths::is_generated(&sf.file_name) {
                    continue;
                }
                metadata_json_count += 1;
                if let Some(metadata) = host.metadata_for_source(&sf)? {
                    let text = serde_json::to_string(&[metadata]).map_err(|e| {
                        CompileError::Consistency(format!("metadata of {} is not serializable: {}", sf.file_name, e))
                    })?;
                    let out_file = mapper.map(&paths::TS.replace(&sf.file_name, ".metadata.json"));
                    router.write_file(&out_file, &text, None, std::slice::from_ref(&sf.file_name))?;
                }
            }
        }

        if self.options.diagnostics {
            let message = [
                format!("Emitted in {}ms", started.elapsed().as_millis()),
                format!("- {} user ts files", emitted_user_ts_count),
                format!("- {} generated ts files", gen_ts_files.len()),
                format!("- {} generated json files", gen_json_files.len() + metadata_json_count),
            ]
            .join("\n");
            result.diagnostics.push(Diagnostic::message(message, SOURCE));
        }
        Ok(EmitOutcome::from_router(result, router))
    }

    // ========================================================================
    // Records for the next build
    // ========================================================================

    pub fn library_summaries(&self) -> Vec<LibrarySummary> {
        let mut merged: BTreeMap<String, LibrarySummary> = BTreeMap::new();
        for summary in self
            .previous_library_summaries
            .iter()
            .chain(self.emitted_library_summaries.iter())
        {
            merged.insert(summary.file_name.clone(), summary.clone());
        }
        merged.into_values().collect()
    }

    pub fn emitted_generated_files(&self) -> BTreeMap<String, GeneratedFile> {
        let mut merged = self.previous_emitted_generated_files.clone();
        for gen in &self.emitted_generated_files {
            merged.insert(gen.gen_file_url.clone(), gen.clone());
        }
        merged
    }

    pub fn emitted_source_files(&self) -> BTreeMap<String, Rc<SourceFile>> {
        let mut merged = self.previous_emitted_source_files.clone();
        for sf in &self.emitted_source_files {
            merged.insert(sf.file_name.clone(), sf.clone());
        }
        merged
    }

    /// Hand this build's program and records to the next build.
    pub fn into_previous_build(self) -> PreviousBuild<C::Program> {
        let library_summaries = self.library_summaries();
        let emitted_generated_files = self.emitted_generated_files();
        let emitted_source_files = self.emitted_source_files();
        PreviousBuild {
            program: self.program,
            library_summaries,
            emitted_generated_files,
            emitted_source_files,
        }
    }
}

struct EmitOutcome {
    result: EmitResult,
    library_summaries: Vec<LibrarySummary>,
    emitted_source_files: Vec<Rc<SourceFile>>,
}

impl EmitOutcome {
    fn from_router(result: EmitResult, router: OutputRouter<'_>) -> Self {
        Self {
            result,
            library_summaries: router.library_summaries,
            emitted_source_files: router.emitted_source_files,
        }
    }
}

fn missing_stub() -> CompileError {
    CompileError::Consistency("Internal Error: the stub program is missing".into())
}
