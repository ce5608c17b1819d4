//! Fakes for driving a [`MetaProgram`] without a real host compiler.
//!
//! The fake compiler understands just enough TypeScript to build a module
//! graph: `import ... from '...'` / `export * from '...'` lines and
//! `/// <reference path="..." />` directives. Everything else in a unit is
//! opaque text that is emitted unchanged, after directives for any
//! references the unit carries beyond its own.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use annex_ast::{
    Diagnostic, DiagnosticFile, ExportDecl, Expr, Ident, ImportDecl, ImportSpecifier, ModuleItem, Node, SourceFile,
    Stmt, VarDecl, VarKind,
};
use annex_driver::analyzer::StructuralError;
use annex_driver::{
    paths, AnalyzerHost, CancellationToken, CodeGenerator, CompileError, CompilerHost, CompilerOptions, EmitRequest,
    EmitResult, GeneratedFile, HostCompiler, MetaProgram, MetadataAnalyzer, MetadataCollector, OutputFile, Program,
    Result, SourceParser, StructureReuse,
};
use annex_transform::{LocalSymbolTable, SymbolResolver, TransformContext};
use serde_json::{json, Value};

pub const CORE: &str = "@annex/core";

pub type TestProgram = MetaProgram<FakeCompiler, FakeAnalyzer>;

// ============================================================================
// Parser
// ============================================================================

/// Line-based parse of the module structure of a unit.
pub fn parse_unit(file_name: &str, text: &str) -> SourceFile {
    let mut unit = SourceFile::new(file_name, text);
    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("/// <reference path=") {
            if let Some(target) = quoted(rest) {
                unit.referenced_files
                    .push(paths::resolve(&paths::dirname(file_name), &target));
            }
        } else if line.starts_with("import ") {
            if let Some(source) = line.rsplit(" from ").next().and_then(quoted) {
                let specifiers = namespace_alias(line)
                    .map(|alias| vec![ImportSpecifier::Namespace(Ident::new(alias))])
                    .unwrap_or_default();
                unit.items.push(Node::synthetic(ModuleItem::Import(ImportDecl {
                    specifiers,
                    source,
                    type_only: false,
                })));
            }
        } else if line.starts_with("export * from ") {
            if let Some(source) = line.strip_prefix("export * from ").and_then(quoted) {
                unit.items
                    .push(Node::synthetic(ModuleItem::Export(ExportDecl::All { source })));
            }
        }
    }
    unit
}

fn quoted(s: &str) -> Option<String> {
    let s = s.trim();
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &s[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn namespace_alias(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("import * as ")?;
    rest.split_whitespace().next()
}

// ============================================================================
// Compiler and program
// ============================================================================

#[derive(Default)]
pub struct FakeCompiler {
    /// Number of programs created
    pub created: Cell<usize>,
    /// Report partial reuse for every program created from an old one
    pub break_reuse: bool,
}

impl SourceParser for FakeCompiler {
    fn parse_source_file(&self, file_name: &str, text: &str) -> SourceFile {
        parse_unit(file_name, text)
    }
}

impl HostCompiler for FakeCompiler {
    type Program = FakeProgram;

    fn create_program(
        &self,
        root_names: &[String],
        options: &CompilerOptions,
        host: &dyn CompilerHost,
        old_program: Option<&FakeProgram>,
    ) -> FakeProgram {
        self.created.set(self.created.get() + 1);
        let mut files: Vec<Rc<SourceFile>> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<String> = root_names.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(unit) = host.get_source_file(&name) else {
                continue;
            };
            queue.extend(unit.referenced_files.iter().cloned());
            if !options.no_resolve {
                for specifier in unit.module_specifiers() {
                    if let Some(resolved) = host.resolve_module_name(specifier, &name) {
                        queue.push_back(resolved.resolved_file_name);
                    }
                }
            }
            files.push(unit);
        }

        let reuse = match old_program {
            None => StructureReuse::Not,
            Some(_) if self.break_reuse => StructureReuse::SafeModules,
            Some(old) if same_structure(old, &files) => StructureReuse::Completely,
            Some(_) => StructureReuse::Not,
        };
        FakeProgram {
            root_names: root_names.to_vec(),
            files,
            reuse,
            options: options.clone(),
            symbols: LocalSymbolTable,
            emit_calls: Cell::new(0),
        }
    }
}

/// Same units, each importing and referencing exactly what it did before.
fn same_structure(old: &FakeProgram, files: &[Rc<SourceFile>]) -> bool {
    old.files.len() == files.len()
        && files.iter().all(|sf| {
            old.files.iter().any(|prev| {
                prev.file_name == sf.file_name
                    && prev.referenced_files == sf.referenced_files
                    && prev.module_specifiers() == sf.module_specifiers()
            })
        })
}

pub struct FakeProgram {
    root_names: Vec<String>,
    files: Vec<Rc<SourceFile>>,
    reuse: StructureReuse,
    options: CompilerOptions,
    symbols: LocalSymbolTable,
    /// Number of emit calls made on this program
    pub emit_calls: Cell<usize>,
}

impl FakeProgram {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|sf| sf.file_name.clone()).collect()
    }

    fn output_base(&self, file_name: &str) -> String {
        let stem = paths::strip_ext(file_name);
        match &self.options.out_dir {
            Some(out_dir) => paths::resolve(out_dir, &paths::relative(self.options.base_path(), &stem)),
            None => stem,
        }
    }

    /// `// error: <message>` lines become diagnostics at the comment.
    fn marked(&self, file_name: &str, marker: &str, code: i32) -> Vec<Diagnostic> {
        let Some(file) = self.get_source_file(file_name) else {
            return Vec::new();
        };
        let mut diagnostics = Vec::new();
        let mut offset = 0;
        for line in file.text.split_inclusive('\n') {
            if let Some(at) = line.find(marker) {
                let message = line[at + marker.len()..].trim().to_string();
                diagnostics.push(Diagnostic::error(message, code).with_location(
                    DiagnosticFile {
                        file_name: file.file_name.clone(),
                        text: file.text.clone(),
                    },
                    offset + at,
                    marker.len(),
                ));
            }
            offset += line.len();
        }
        diagnostics
    }
}

impl Program for FakeProgram {
    fn root_names(&self) -> &[String] {
        &self.root_names
    }

    fn source_files(&self) -> Vec<Rc<SourceFile>> {
        self.files.clone()
    }

    fn get_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>> {
        self.files.iter().find(|sf| sf.file_name == file_name).cloned()
    }

    fn structure_reuse(&self) -> StructureReuse {
        self.reuse
    }

    fn symbols(&self) -> &dyn SymbolResolver {
        &self.symbols
    }

    fn options_diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn syntactic_diagnostics(
        &self,
        file_name: Option<&str>,
        _cancellation: Option<&dyn CancellationToken>,
    ) -> Vec<Diagnostic> {
        match file_name {
            Some(name) => self.marked(name, "// syntax:", 1005),
            None => self
                .files
                .iter()
                .flat_map(|sf| self.marked(&sf.file_name, "// syntax:", 1005))
                .collect(),
        }
    }

    fn semantic_diagnostics(
        &self,
        file_name: &str,
        _cancellation: Option<&dyn CancellationToken>,
    ) -> Vec<Diagnostic> {
        self.marked(file_name, "// error:", 2339)
    }

    fn emit(
        &self,
        request: EmitRequest<'_>,
        write_file: &mut dyn FnMut(OutputFile) -> Result<()>,
    ) -> Result<EmitResult> {
        self.emit_calls.set(self.emit_calls.get() + 1);
        let targets: Vec<Rc<SourceFile>> = match request.target {
            Some(target) => self.get_source_file(target).into_iter().collect(),
            None => self.files.clone(),
        };
        let mut result = EmitResult::default();
        for unit in targets.iter().filter(|sf| !sf.is_declaration_file) {
            let mut ctx = TransformContext::new(&self.symbols);
            let transformed = request.transforms.apply_before((**unit).clone(), &mut ctx)?;
            let transformed = request.transforms.apply_after(transformed, &mut ctx)?;
            let text = if paths::is_generated(&unit.file_name) {
                annex_ast::print_source_file(&transformed).text
            } else {
                with_reference_directives(&transformed)
            };
            result.diagnostics.extend(ctx.diagnostics);

            let base = self.output_base(&unit.file_name);
            let mut outputs = Vec::new();
            if !request.emit_only_dts {
                outputs.push((format!("{}.js", base), text));
            }
            if self.options.declaration {
                outputs.push((format!("{}.d.ts", base), String::new()));
            }
            for (file_name, text) in outputs {
                result.emitted_files.push(file_name.clone());
                write_file(OutputFile {
                    file_name,
                    text,
                    source_files: vec![unit.file_name.clone()],
                })?;
            }
        }
        Ok(result)
    }
}

/// The unit's text, preceded by directives for references it does not
/// spell out itself.
fn with_reference_directives(unit: &SourceFile) -> String {
    let written = parse_unit(&unit.file_name, &unit.text).referenced_files;
    let mut text = String::new();
    for reference in unit.referenced_files.iter().filter(|r| !written.contains(r)) {
        let relative = paths::relative(&paths::dirname(&unit.file_name), reference);
        text.push_str(&format!("/// <reference path=\"{}\" />\n", relative));
    }
    text.push_str(&unit.text);
    text
}

// ============================================================================
// Analyzer
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeAnalysis {
    pub source_files: Vec<String>,
    pub ts_files: Vec<String>,
    pub asynchronous: bool,
}

/// Every TypeScript source gets a `.axfactory.ts` companion that references
/// the core package. Knobs change what the phases produce.
#[derive(Default)]
pub struct FakeAnalyzer {
    /// Analysis fails with a structural error carrying this message
    pub analysis_error: Option<String>,
    /// Bases whose full factories have no statements
    pub empty_factories: BTreeSet<String>,
    /// Module the type-check stub imports in addition to the core package
    pub stub_extra_import: Option<String>,
    /// Also produce an `.axsummary.json` per source
    pub summaries: bool,
    /// Bumps the content of every full factory; changes between builds
    pub revision: Cell<usize>,
    pub calls: RefCell<Vec<String>>,
}

fn factory_stmt(name: &str, module: &str, symbol: &str) -> Node<ModuleItem> {
    Node::synthetic(ModuleItem::Stmt(Stmt::Var(VarDecl {
        kind: VarKind::Const,
        name: Node::synthetic(Ident::new(name)),
        type_annotation: None,
        init: Some(Node::synthetic(Expr::External {
            module: module.to_string(),
            name: symbol.to_string(),
        })),
        is_declare: false,
    })))
}

fn class_name_of(base: &str) -> String {
    let stem = paths::strip_ext(paths::basename(base));
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl FakeAnalyzer {
    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }

    fn analysis(&self, source_files: &[String], ts_files: &[String], asynchronous: bool) -> Result<FakeAnalysis> {
        if let Some(message) = &self.analysis_error {
            return Err(StructuralError::new(message.clone()).into());
        }
        Ok(FakeAnalysis {
            source_files: source_files.to_vec(),
            ts_files: ts_files.to_vec(),
            asynchronous,
        })
    }
}

impl CodeGenerator for FakeAnalyzer {
    fn generate_file(
        &self,
        _host: &dyn AnalyzerHost,
        gen_file_name: &str,
        base_file_name: Option<&str>,
    ) -> Result<GeneratedFile> {
        self.record(&format!("generate {}", gen_file_name));
        let base = base_file_name.unwrap_or_default();
        let stmt = factory_stmt(&format!("{}NgFactory", class_name_of(base)), CORE, "ɵstub");
        Ok(GeneratedFile::with_statements(base, gen_file_name, vec![stmt]))
    }

    fn find_generated_file_names(&self, file_name: &str) -> Vec<String> {
        if !paths::is_ts(file_name) || paths::is_generated(file_name) {
            return Vec::new();
        }
        vec![format!("{}.axfactory.ts", paths::strip_ext(file_name))]
    }
}

impl MetadataCollector for FakeAnalyzer {
    fn collect_metadata(&self, file: &SourceFile) -> Option<Value> {
        if !file.text.contains("export class") {
            return None;
        }
        Some(json!({
            "__symbolic": "module",
            "version": 4,
            "metadata": { class_name_of(&file.file_name): { "__symbolic": "class" } },
        }))
    }
}

impl MetadataAnalyzer for FakeAnalyzer {
    type Analysis = FakeAnalysis;

    fn analyze_sync(
        &self,
        _host: &dyn AnalyzerHost,
        source_files: &[String],
        ts_files: &[String],
    ) -> Result<FakeAnalysis> {
        self.record("analyze sync");
        self.analysis(source_files, ts_files, false)
    }

    async fn analyze_async(
        &self,
        _host: &dyn AnalyzerHost,
        source_files: &[String],
        ts_files: &[String],
    ) -> Result<FakeAnalysis> {
        self.record("analyze async");
        self.analysis(source_files, ts_files, true)
    }

    fn emit_type_check_stub(
        &self,
        _host: &dyn AnalyzerHost,
        gen_file_name: &str,
        base_file_name: &str,
    ) -> Result<Option<GeneratedFile>> {
        self.record(&format!("type-check stub {}", gen_file_name));
        let mut stmts = vec![factory_stmt("_typeCheck", CORE, "ɵtypeCheck")];
        if let Some(extra) = &self.stub_extra_import {
            stmts.push(factory_stmt("_extra", extra, "x"));
        }
        Ok(Some(GeneratedFile::with_statements(base_file_name, gen_file_name, stmts)))
    }

    fn emit_all_impls(&self, host: &dyn AnalyzerHost, analysis: &FakeAnalysis) -> Result<Vec<GeneratedFile>> {
        self.record("emit all");
        let mut files = Vec::new();
        for base in &analysis.source_files {
            if self.summaries {
                let module = host.file_name_to_module_name(base, base)?;
                files.push(GeneratedFile::with_source(
                    base.clone(),
                    format!("{}.axsummary.json", paths::strip_ext(base)),
                    json!({ "moduleName": module }).to_string(),
                ));
            }
            if paths::is_dts(base) {
                continue;
            }
            let gen_file_name = format!("{}.axfactory.ts", paths::strip_ext(base));
            let stmts = if self.empty_factories.contains(base) {
                vec![]
            } else {
                vec![factory_stmt(
                    &format!("{}NgFactory", class_name_of(base)),
                    CORE,
                    &format!("ɵcreate{}", self.revision.get()),
                )]
            };
            files.push(GeneratedFile::with_statements(base.clone(), gen_file_name, stmts));
        }
        Ok(files)
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn options() -> CompilerOptions {
    CompilerOptions {
        base_path: Some("/app".into()),
        ..Default::default()
    }
}

pub fn is_usage(error: &CompileError) -> bool {
    matches!(error, CompileError::Usage(_))
}

pub fn is_consistency(error: &CompileError) -> bool {
    matches!(error, CompileError::Consistency(_))
}
