use annex_ast::{Diagnostic, SourceFile};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use annex_driver::diagnostics::format_diagnostics;
use annex_driver::{
    paths, AnalyzerHost, BuildGeneration, CodeGenerator, CompileError, CompilerOptions, FsHost, GeneratedFile,
    HostAdapter, MetadataCollector, Project, SourceParser,
};

#[derive(Parser)]
#[command(
    name = "annex",
    version = "0.1.0",
    about = "Annex meta-compilation driver",
    long_about = "Inspect how the annex driver names, resolves and classifies files\nfor a project, without running a host compiler."
)]
struct Cli {
    /// Project file (`files`, `compilerOptions`, `annexCompilerOptions`)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Module name generated code in CONTAINING uses to import IMPORTED
    ModuleId {
        imported: String,
        containing: String,
    },

    /// File a module name resolves to
    Resolve {
        module: String,

        /// Containing file; the first root file when omitted
        #[arg(long)]
        from: Option<String>,
    },

    /// File a templateUrl or styleUrls entry refers to
    ResolveResource {
        resource: String,
        containing: String,
    },

    /// Show whether files are project sources and which companions they get
    Classify {
        files: Vec<String>,
    },

    /// Print the merged compiler options and their diagnostics
    Options,
}

/// Units and companion names derived from file names alone.
struct FileNameOnly;

impl SourceParser for FileNameOnly {
    fn parse_source_file(&self, file_name: &str, text: &str) -> SourceFile {
        SourceFile::new(file_name, text)
    }
}

impl CodeGenerator for FileNameOnly {
    fn generate_file(
        &self,
        _host: &dyn AnalyzerHost,
        gen_file_name: &str,
        base_file_name: Option<&str>,
    ) -> annex_driver::Result<GeneratedFile> {
        Ok(GeneratedFile::with_statements(base_file_name.unwrap_or_default(), gen_file_name, vec![]))
    }

    fn find_generated_file_names(&self, file_name: &str) -> Vec<String> {
        if !paths::is_ts(file_name) && !paths::is_dts(file_name) {
            return Vec::new();
        }
        let stem = paths::strip_ext(file_name);
        vec![format!("{}.axfactory.ts", stem), format!("{}.axsummary.ts", stem)]
    }
}

impl MetadataCollector for FileNameOnly {
    fn collect_metadata(&self, _file: &SourceFile) -> Option<Value> {
        None
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.to_string_lossy().replace('\\', "/"),
        Err(e) => {
            eprintln!("Error reading current directory: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let project = match load_project(cli.project.as_ref(), &cwd) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = FsHost::new(cwd.clone());
    let generation = BuildGeneration::default();
    let adapter = HostAdapter::new(
        &project.options,
        &host,
        &generation,
        &FileNameOnly,
        &FileNameOnly,
        &FileNameOnly,
    )
    .with_root_files(&project.root_names);
    let absolute = |p: &str| paths::resolve(&cwd, p);

    match cli.command {
        Commands::ModuleId { imported, containing } => {
            module_id_command(&adapter, &absolute(&imported), &absolute(&containing))
        }
        Commands::Resolve { module, from } => {
            resolve_command(&adapter, &module, from.as_deref().map(absolute).as_deref())
        }
        Commands::ResolveResource { resource, containing } => {
            resolve_resource_command(&adapter, &resource, &absolute(&containing))
        }
        Commands::Classify { files } => {
            let files: Vec<String> = files.iter().map(|f| absolute(f)).collect();
            classify_command(&adapter, &files)
        }
        Commands::Options => options_command(&project.options),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "annex_driver=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_project(path: Option<&PathBuf>, cwd: &str) -> Result<Project, CompileError> {
    let Some(path) = path else {
        return Ok(Project {
            root_names: Vec::new(),
            options: CompilerOptions {
                base_path: Some(cwd.to_string()),
                ..Default::default()
            },
        });
    };
    let text = fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file = paths::resolve(cwd, &path.to_string_lossy().replace('\\', "/"));
    let project = Project::from_json(&text, &paths::dirname(&file))?;
    tracing::debug!(
        project = %file,
        roots = project.root_names.len(),
        "loaded project"
    );
    Ok(project)
}

fn module_id_command(adapter: &HostAdapter<'_>, imported: &str, containing: &str) -> ExitCode {
    match adapter.file_name_to_module_name(imported, containing) {
        Ok(module_name) => {
            println!("{}", module_name);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_command(adapter: &HostAdapter<'_>, module: &str, from: Option<&str>) -> ExitCode {
    match adapter.module_name_to_file_name(module, from) {
        Ok(Some(file_name)) => {
            println!("{}", file_name);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("Cannot find module '{}'", module);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_resource_command(adapter: &HostAdapter<'_>, resource: &str, containing: &str) -> ExitCode {
    match adapter.resource_name_to_file_name(resource, containing) {
        Some(file_name) => {
            println!("{}", file_name);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Resource '{}' not found from {}", resource, containing);
            ExitCode::FAILURE
        }
    }
}

fn classify_command(adapter: &HostAdapter<'_>, files: &[String]) -> ExitCode {
    for file in files {
        if paths::is_generated(file) {
            let verdict = adapter.should_generate_file(file);
            match (verdict.generate, verdict.base_file_name) {
                (true, Some(base)) => println!("{}: generated from {}", file, base),
                (true, None) => println!("{}: generated", file),
                (false, _) => println!("{}: not generatable", file),
            }
            continue;
        }
        let source = adapter.is_source_file(file);
        println!("{}: {}", file, if source { "source" } else { "not a source" });
        if adapter.should_generate_files_for(file) {
            for companion in FileNameOnly.find_generated_file_names(file) {
                if adapter.should_generate_file(&companion).generate {
                    println!("  {}", companion);
                }
            }
        }
    }
    ExitCode::SUCCESS
}

fn options_command(options: &CompilerOptions) -> ExitCode {
    match serde_json::to_string_pretty(options) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }
    let diagnostics: Vec<Diagnostic> = options.validate();
    if diagnostics.is_empty() {
        return ExitCode::SUCCESS;
    }
    eprintln!("{}", format_diagnostics(&diagnostics));
    ExitCode::FAILURE
}
