//! Phase machine, diagnostics and emit of a two-pass build.

mod support;

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use annex_ast::{Diagnostic, DiagnosticCategory, SourceFile};
use annex_driver::{
    AnnotationsAs, Batching, BuildState, CompileError, CompilerOptions, EmitFlags, EmitOptions, EmitResult,
    MemoryHost, MetaProgram, PreviousBuild, Program, SOURCE,
};
use annex_transform::{SourceTransform, TransformContext, TransformError};
use support::*;

fn app() -> Rc<MemoryHost> {
    Rc::new(MemoryHost::with_files(
        "/app",
        [
            ("/app/main.ts", "import { A } from './a';\nexport class Main {}\n"),
            ("/app/a.ts", "export class A {}\n"),
        ],
    ))
}

fn build_with(
    host: &Rc<MemoryHost>,
    compiler: FakeCompiler,
    analyzer: FakeAnalyzer,
    previous: Option<PreviousBuild<FakeProgram>>,
) -> TestProgram {
    MetaProgram::new(vec!["/app/main.ts".into()], options(), host.clone(), compiler, analyzer, previous)
}

fn build(host: &Rc<MemoryHost>, analyzer: FakeAnalyzer) -> TestProgram {
    build_with(host, FakeCompiler::default(), analyzer, None)
}

fn written_names(host: &MemoryHost) -> Vec<String> {
    host.written().into_keys().collect()
}

// ============================================================================
// Phases
// ============================================================================

#[test]
fn test_two_pass_build() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    assert_eq!(build.state(), BuildState::Uninitialized);
    assert!(matches!(build.program(), Err(CompileError::Usage(_))));

    build.build_stub_program().unwrap();
    assert_eq!(build.state(), BuildState::StubBuilt);
    assert_eq!(
        build.generation().generated_file_names(),
        vec!["/app/a.axfactory.ts", "/app/main.axfactory.ts"]
    );

    build.analyze().unwrap();
    assert_eq!(build.state(), BuildState::Analyzed);
    let analysis = build.analysis().unwrap();
    assert!(!analysis.asynchronous);
    let sources: BTreeSet<&str> = analysis.source_files.iter().map(String::as_str).collect();
    assert_eq!(sources, BTreeSet::from(["/app/main.ts", "/app/a.ts"]));
    assert_eq!(analysis.ts_files.len(), 4);

    build.build_typed_program().unwrap();
    assert_eq!(build.state(), BuildState::FinalBuilt);
    let files: BTreeSet<String> = build.program().ok().unwrap().file_names().into_iter().collect();
    assert!(files.contains("/app/main.axfactory.ts"));
    assert!(files.contains("/app/a.axfactory.ts"));

    let factory = build.generation().generated_unit("/app/a.axfactory.ts").unwrap();
    assert!(factory.source_file.text.contains("ɵtypeCheck"));
    assert_eq!(factory.base_file_name, "/app/a.ts");
}

#[test]
fn test_original_units_are_read_once() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    assert_eq!(host.read_count("/app/main.ts"), 1);
    assert_eq!(host.read_count("/app/a.ts"), 1);
}

#[test]
fn test_phase_order_is_enforced() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    assert!(is_usage(&build.analyze().unwrap_err()));
    assert!(is_usage(&build.build_typed_program().unwrap_err()));
    assert!(is_usage(&build.emit(EmitOptions::default()).err().unwrap()));
    assert!(is_usage(&build.syntactic_diagnostics(None, None).unwrap_err()));
    assert!(is_usage(&build.structural_diagnostics().unwrap_err()));

    build.load_structure().unwrap();
    assert_eq!(build.state(), BuildState::FinalBuilt);
    assert!(is_usage(&build.build_stub_program().unwrap_err()));
    assert!(build.syntactic_diagnostics(None, None).unwrap().is_empty());
}

#[test]
fn test_analysis_runs_once() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.build_stub_program().unwrap();
    build.analyze().unwrap();
    let err = build.analyze().unwrap_err();
    assert!(is_usage(&err));
    assert_eq!(err.to_string(), "annex structure already loaded");
}

#[tokio::test]
async fn test_sync_then_async_analysis_is_rejected() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.build_stub_program().unwrap();
    build.analyze().unwrap();
    let err = build.analyze_async().await.unwrap_err();
    assert!(is_usage(&err));
    assert_eq!(
        err.to_string(),
        "annex structure loaded both synchronously and asynchronously"
    );
}

#[tokio::test]
async fn test_async_load() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure_async().await.unwrap();
    assert_eq!(build.state(), BuildState::FinalBuilt);
    assert!(build.analysis().unwrap().asynchronous);

    // another instance may load synchronously
    let mut other = self::build(&host, FakeAnalyzer::default());
    other.load_structure().unwrap();
    assert_eq!(other.state(), BuildState::FinalBuilt);
}

#[test]
fn test_structural_error_degrades_the_build() {
    let host = app();
    let analyzer = FakeAnalyzer {
        analysis_error: Some("Unexpected value 'Foo' declared by the module 'AppModule'".into()),
        ..Default::default()
    };
    let mut build = build(&host, analyzer);
    build.load_structure().unwrap();
    assert_eq!(build.state(), BuildState::Errored);

    let diagnostics = build.structural_diagnostics().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, 100);
    assert_eq!(diagnostics[0].source.as_deref(), Some(SOURCE));
    assert!(diagnostics[0].message_text.starts_with("Unexpected value 'Foo'"));

    let files = build.program().ok().unwrap().file_names();
    assert!(files.contains(&"/app/main.ts".to_string()));
    assert!(files.iter().all(|f| !f.contains(".axfactory.")));
    let main = build.program().ok().unwrap().source_files().into_iter().find(|sf| sf.file_name == "/app/main.ts");
    assert!(main.unwrap().referenced_files.is_empty());

    let adapter = build.host_adapter();
    assert!(!adapter.is_source_file("/app/a.ts"));
}

#[test]
fn test_structure_change_is_a_consistency_error() {
    let host = app();
    let compiler = FakeCompiler {
        break_reuse: true,
        ..Default::default()
    };
    let mut build = build_with(&host, compiler, FakeAnalyzer::default(), None);
    let err = build.load_structure().unwrap_err();
    assert!(is_consistency(&err));
    assert_eq!(
        err.to_string(),
        "Internal Error: The structure of the program changed during codegen."
    );
    // a fallback program is still in place
    assert_eq!(build.state(), BuildState::Errored);
    assert!(build.program().is_ok());
}

#[test]
fn test_type_check_stub_must_keep_imports() {
    let host = app();
    let analyzer = FakeAnalyzer {
        stub_extra_import: Some("./extra".into()),
        ..Default::default()
    };
    let mut build = build(&host, analyzer);
    let err = build.load_structure().unwrap_err();
    assert!(is_consistency(&err));
    let message = err.to_string();
    assert!(message.starts_with("Illegal State: external references changed in /app/"));
    assert!(message.contains("Old: @annex/core."));
    assert!(message.contains("New: ./extra,@annex/core"));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_diagnostic_queries() {
    let host = app();
    host.add_file("/app/a.ts", "export class A {}\nthis.nme; // error: Property 'nme' does not exist\n");
    let mut options = options();
    options.annotations_as = Some(AnnotationsAs::Unsupported);
    let mut build = MetaProgram::new(
        vec!["/app/main.ts".into()],
        options,
        host.clone(),
        FakeCompiler::default(),
        FakeAnalyzer::default(),
        None,
    );
    build.load_structure().unwrap();

    let semantic = build.host_semantic_diagnostics(None, None).unwrap();
    assert_eq!(semantic.len(), 1);
    assert_eq!(semantic[0].file.as_ref().unwrap().file_name, "/app/a.ts");
    assert_eq!(semantic[0].message_text, "Property 'nme' does not exist");
    assert!(build.host_semantic_diagnostics(Some("/app/main.ts"), None).unwrap().is_empty());
    assert!(build.annex_semantic_diagnostics(None).unwrap().is_empty());

    let options_diagnostics = build.options_diagnostics();
    assert_eq!(options_diagnostics.len(), 1);
    assert!(options_diagnostics[0].message_text.contains("annotationsAs"));
}

// ============================================================================
// Emit
// ============================================================================

#[test]
fn test_emit_writes_user_and_generated_outputs() {
    let host = app();
    let analyzer = FakeAnalyzer {
        empty_factories: BTreeSet::from(["/app/a.ts".to_string()]),
        ..Default::default()
    };
    let mut build = build(&host, analyzer);
    build.load_structure().unwrap();
    let result = build.emit(EmitOptions::default()).unwrap();
    assert!(!result.emit_skipped);
    assert_eq!(build.state(), BuildState::Emitted);

    // the factory of a.ts has no content and is dropped
    assert_eq!(
        written_names(&host),
        vec!["/app/a.js", "/app/main.axfactory.js", "/app/main.js"]
    );
    let factory = &host.written()["/app/main.axfactory.js"];
    assert!(factory.contains("import * as i0 from"));
    assert!(factory.contains("ɵcreate0"));
    assert!(!factory.contains("ɵtypeCheck"));
    assert_eq!(host.written()["/app/a.js"], "export class A {}\n");
}

#[test]
fn test_allow_empty_codegen_files() {
    let host = app();
    let analyzer = FakeAnalyzer {
        empty_factories: BTreeSet::from(["/app/a.ts".to_string()]),
        ..Default::default()
    };
    let mut options = options();
    options.allow_empty_codegen_files = true;
    let mut build = MetaProgram::new(
        vec!["/app/main.ts".into()],
        options,
        host.clone(),
        FakeCompiler::default(),
        analyzer,
        None,
    );
    build.load_structure().unwrap();
    build.emit(EmitOptions::default()).unwrap();
    assert!(host.written().contains_key("/app/a.axfactory.js"));
}

#[test]
fn test_batching_modes_write_the_same_files() {
    let per_file_host = app();
    let mut per_file = build(&per_file_host, FakeAnalyzer::default());
    per_file.load_structure().unwrap();
    per_file
        .emit(EmitOptions::default().with_batching(Batching::PerFile))
        .unwrap();

    let whole_host = app();
    let mut whole = build(&whole_host, FakeAnalyzer::default());
    whole.load_structure().unwrap();
    whole
        .emit(EmitOptions::default().with_batching(Batching::WholeProgram))
        .unwrap();

    assert_eq!(per_file_host.written(), whole_host.written());
    assert_eq!(per_file.program().ok().unwrap().emit_calls.get(), 4);
    assert_eq!(whole.program().ok().unwrap().emit_calls.get(), 1);
}

/// `in_root` components under the `src` root dir, each with a factory, plus
/// `outside` plain units whose companions are never emitted.
fn wide_build(in_root: usize, outside: usize) -> (Rc<MemoryHost>, TestProgram) {
    let host = Rc::new(MemoryHost::new("/app"));
    let mut roots = Vec::new();
    for i in 0..in_root {
        let name = format!("/app/src/c{}.ts", i);
        host.add_file(&name, &format!("export class C{} {{}}\n", i));
        roots.push(name);
    }
    for i in 0..outside {
        let name = format!("/app/lib/u{}.ts", i);
        host.add_file(&name, "export const u = 1;\n");
        roots.push(name);
    }
    let options = CompilerOptions {
        root_dir: Some("src".into()),
        ..options()
    };
    let build = MetaProgram::new(roots, options, host.clone(), FakeCompiler::default(), FakeAnalyzer::default(), None);
    (host, build)
}

/// Reports every unit it sees as a warning.
struct Visited;

impl SourceTransform for Visited {
    fn name(&self) -> &'static str {
        "visited"
    }

    fn transform(&self, file: SourceFile, ctx: &mut TransformContext<'_>) -> Result<SourceFile, TransformError> {
        let mut diagnostic = Diagnostic::error(format!("visited {}", file.file_name), 9000);
        diagnostic.category = DiagnosticCategory::Warning;
        ctx.diagnostics.push(diagnostic);
        Ok(file)
    }
}

fn emit_wide(in_root: usize, outside: usize, batching: Batching) -> (EmitResult, usize) {
    let (_host, mut build) = wide_build(in_root, outside);
    build.load_structure().unwrap();
    let mut options = EmitOptions::default().with_batching(batching);
    options.before.push(Box::new(Visited));
    let result = build.emit(options).unwrap();
    let calls = build.program().ok().unwrap().emit_calls.get();
    (result, calls)
}

#[test]
fn test_auto_batching_switches_at_threshold() {
    // 9 units and 9 factories under src, plus units outside it
    let (result, calls) = emit_wide(9, 1, Batching::Auto);
    assert_eq!(calls, 19);
    assert_eq!(result.emitted_files.len(), 19);

    let (result, calls) = emit_wide(9, 2, Batching::Auto);
    assert_eq!(calls, 1);
    assert_eq!(result.emitted_files.len(), 20);
}

#[test]
fn test_batching_paths_report_the_same_results() {
    let (per_file, per_file_calls) = emit_wide(9, 2, Batching::PerFile);
    let (whole, whole_calls) = emit_wide(9, 2, Batching::WholeProgram);
    assert_eq!(per_file_calls, 20);
    assert_eq!(whole_calls, 1);

    let messages = |result: &EmitResult| -> BTreeSet<String> {
        result.diagnostics.iter().map(|d| d.message_text.clone()).collect()
    };
    let emitted = |result: &EmitResult| -> BTreeSet<String> { result.emitted_files.iter().cloned().collect() };
    assert_eq!(messages(&per_file), messages(&whole));
    assert_eq!(messages(&per_file).len(), 20);
    assert!(messages(&whole).contains("visited /app/src/c0.axfactory.ts"));
    assert_eq!(emitted(&per_file), emitted(&whole));
    assert!(emitted(&whole).contains("/app/lib/u1.js"));
    assert!(!emitted(&whole).contains("/app/lib/u1.axfactory.js"));
}

#[test]
fn test_emit_leaves_out_companion_references() {
    let host = Rc::new(MemoryHost::with_files(
        "/app",
        [
            (
                "/app/main.ts",
                "/// <reference path=\"./globals.ts\" />\nimport { A } from './a';\nexport class Main {}\n",
            ),
            ("/app/a.ts", "export class A {}\n"),
            ("/app/globals.ts", "declare const VERSION: string;\n"),
        ],
    ));
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    build.emit(EmitOptions::default()).unwrap();

    let written = host.written();
    for name in ["/app/main.js", "/app/a.js", "/app/globals.js"] {
        assert!(!written[name].contains(".axfactory"), "{}: {}", name, written[name]);
    }
    assert!(written["/app/main.js"].starts_with("/// <reference path=\"./globals.ts\" />\nimport"));

    // the program still pulls the companions in
    let program = build.program().ok().unwrap();
    let main = program.get_source_file("/app/main.ts").unwrap();
    assert_eq!(main.referenced_files, vec!["/app/globals.ts", "/app/main.axfactory.ts"]);
    assert_eq!(main.own_referenced_files(), ["/app/globals.ts".to_string()]);
    assert!(program.get_source_file("/app/main.axfactory.ts").is_some());
}

#[test]
fn test_emitted_no_files() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    // declaration output is off, so a declaration-only emit produces nothing
    let result = build.emit(EmitOptions::new(EmitFlags::DTS | EmitFlags::CODEGEN)).unwrap();
    assert!(host.written().is_empty());
    let message = result
        .diagnostics
        .iter()
        .find(|d| d.message_text == "Emitted no files.")
        .unwrap();
    assert_eq!(message.category, DiagnosticCategory::Message);
}

#[test]
fn test_i18n_only_emit_is_skipped() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    let result = build.emit(EmitOptions::new(EmitFlags::I18N_BUNDLE)).unwrap();
    assert!(result.emit_skipped);
    assert!(host.written().is_empty());
}

#[test]
fn test_metadata_output() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    build
        .emit(EmitOptions::new(EmitFlags::JS | EmitFlags::METADATA))
        .unwrap();

    let written = host.written();
    assert_eq!(
        written.keys().cloned().collect::<Vec<_>>(),
        vec!["/app/a.js", "/app/a.metadata.json", "/app/main.js", "/app/main.metadata.json"]
    );
    let records: serde_json::Value = serde_json::from_str(&written["/app/main.metadata.json"]).unwrap();
    assert_eq!(records[0]["__symbolic"], "module");
    assert!(records[0]["metadata"]["Main"].is_object());
}

#[test]
fn test_emit_timing_report() {
    let host = app();
    let mut options = options();
    options.diagnostics = true;
    let mut build = MetaProgram::new(
        vec!["/app/main.ts".into()],
        options,
        host.clone(),
        FakeCompiler::default(),
        FakeAnalyzer::default(),
        None,
    );
    build.load_structure().unwrap();
    let result = build.emit(EmitOptions::default()).unwrap();
    let report = result.diagnostics.last().unwrap();
    assert!(report.message_text.starts_with("Emitted in "));
    assert!(report.message_text.contains("- 2 user ts files"));
    assert!(report.message_text.contains("- 2 generated ts files"));
}

struct CountingTransform<'c>(&'c Cell<usize>);

impl SourceTransform for CountingTransform<'_> {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn transform(&self, file: SourceFile, _ctx: &mut TransformContext<'_>) -> Result<SourceFile, TransformError> {
        self.0.set(self.0.get() + 1);
        Ok(file)
    }
}

#[test]
fn test_custom_transforms_run_for_every_unit() {
    let host = app();
    let mut build = build(&host, FakeAnalyzer::default());
    build.load_structure().unwrap();
    let before = Cell::new(0);
    let after = Cell::new(0);
    let mut options = EmitOptions::default();
    options.before.push(Box::new(CountingTransform(&before)));
    options.after.push(Box::new(CountingTransform(&after)));
    build.emit(options).unwrap();
    assert_eq!(before.get(), 4);
    assert_eq!(after.get(), 4);
}

#[test]
fn test_structural_diagnostics_block_emit_on_error() {
    let host = app();
    let mut options = options();
    options.no_emit_on_error = true;
    let analyzer = FakeAnalyzer {
        analysis_error: Some("Cannot determine the module for class Foo".into()),
        ..Default::default()
    };
    let mut build = MetaProgram::new(
        vec!["/app/main.ts".into()],
        options,
        host.clone(),
        FakeCompiler::default(),
        analyzer,
        None,
    );
    build.load_structure().unwrap();
    let result = build.emit(EmitOptions::default()).unwrap();
    assert_eq!(build.state(), BuildState::Errored);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message_text == "Cannot determine the module for class Foo" && d.code == 100));
    assert!(host.written().keys().all(|name| !name.contains(".axfactory.")));
}

// ============================================================================
// Incremental builds
// ============================================================================

#[test]
fn test_unchanged_outputs_are_not_emitted_again() {
    let host = app();
    let mut first = build(&host, FakeAnalyzer::default());
    first.load_structure().unwrap();
    first.emit(EmitOptions::default()).unwrap();
    assert_eq!(written_names(&host).len(), 4);
    let previous = first.into_previous_build();
    assert_eq!(previous.emitted_source_files.len(), 2);
    assert_eq!(previous.emitted_generated_files.len(), 2);

    host.clear_written();
    let mut second = build_with(&host, FakeCompiler::default(), FakeAnalyzer::default(), Some(previous));
    second.load_structure().unwrap();
    let result = second.emit(EmitOptions::default()).unwrap();
    assert!(host.written().is_empty());
    assert!(result.diagnostics.iter().any(|d| d.message_text == "Emitted no files."));

    let previous = second.into_previous_build();
    assert_eq!(previous.emitted_source_files.len(), 2);
    host.add_file("/app/a.ts", "export class A { x = 1; }\n");
    let analyzer = FakeAnalyzer {
        revision: Cell::new(1),
        ..Default::default()
    };
    let mut third = build_with(&host, FakeCompiler::default(), analyzer, Some(previous));
    third.load_structure().unwrap();
    third.emit(EmitOptions::default()).unwrap();
    assert_eq!(
        written_names(&host),
        vec!["/app/a.axfactory.js", "/app/a.js", "/app/main.axfactory.js"]
    );
}

#[test]
fn test_library_summaries_carry_over() {
    let host = Rc::new(MemoryHost::with_files(
        "/app",
        [
            ("/app/main.ts", "import { L } from './lib';\nexport class Main {}\n"),
            ("/app/lib.d.ts", "export declare class L {}\n"),
        ],
    ));
    let analyzer = FakeAnalyzer {
        summaries: true,
        ..Default::default()
    };
    let mut first = build(&host, analyzer);
    first.load_structure().unwrap();
    assert!(first
        .analysis()
        .unwrap()
        .source_files
        .contains(&"/app/lib.d.ts".to_string()));
    first.emit(EmitOptions::default()).unwrap();

    let written = host.written();
    assert!(written.contains_key("/app/main.axsummary.json"));
    assert_eq!(written["/app/lib.axsummary.json"], r#"{"moduleName":"./lib"}"#);

    let summaries = first.library_summaries();
    let names: Vec<&str> = summaries.iter().map(|s| s.file_name.as_str()).collect();
    assert_eq!(names, vec!["/app/lib.axfactory.d.ts", "/app/lib.axsummary.json", "/app/lib.d.ts"]);
    assert!(summaries[2].source_file().is_some());
    assert_eq!(summaries[0].text, "");
    assert_eq!(host.read_count("/app/lib.d.ts"), 1);

    let previous = first.into_previous_build();
    let mut second = build_with(&host, FakeCompiler::default(), FakeAnalyzer::default(), Some(previous));
    second.load_structure().unwrap();
    assert_eq!(second.analysis().unwrap().source_files, vec!["/app/main.ts"]);
    assert!(second
        .program()
        .ok()
        .unwrap()
        .file_names()
        .contains(&"/app/lib.d.ts".to_string()));
    // the summary shadows the file on disk
    assert_eq!(host.read_count("/app/lib.d.ts"), 1);
    assert_eq!(second.library_summaries().len(), 3);
}
