//! The host the host compiler sees
//!
//! [`HostAdapter`] answers the host compiler's file queries with a merged
//! view of three kinds of units:
//!
//! 1. generated companions, materialized on first request
//! 2. library summaries from earlier builds, which shadow disk files
//! 3. original files read through the [`HostContext`]
//!
//! Original units are handed out with `referenced_files` extended by the
//! names of their companions, so the host compiler pulls the companions
//! into the program on its own. The references as written stay in
//! `original_referenced_files`; emit puts them back. The adapter is a view:
//! all state lives in the [`BuildGeneration`] it borrows.

use std::collections::BTreeSet;
use std::io;
use std::rc::Rc;

use annex_ast::{print_source_file, SourceFile};
use annex_transform::{
    InlineResourcesMetadataTransformer, LoadedResource, MetadataTransformer, ResourceHost,
    TransformError,
};
use serde_json::Value;

use crate::analyzer::{AnalyzerHost, CodeGenerator, GeneratedFile, MetadataCollector, StructuralError};
use crate::compiler::{CompilerHost, SourceParser};
use crate::context::{HostCapabilities, HostContext, ResourceText};
use crate::diagnostics::TypeCheckHost;
use crate::error::{CompileError, Result};
use crate::generation::{BuildGeneration, GeneratedUnit};
use crate::module_resolution::{ModuleResolver, ResolutionHost, ResolvedModule};
use crate::options::{CompilerOptions, ModuleKind};
use crate::package_json::{BundleMetadata, PackageJson};
use crate::paths;
use crate::source_span::{EmitContext, ParseSourceSpan};

/// Verdict of [`HostAdapter::should_generate_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShouldGenerate {
    pub generate: bool,
    /// Unit the companion is generated from; `None` for style companions
    pub base_file_name: Option<String>,
}

impl ShouldGenerate {
    fn no() -> Self {
        Self::default()
    }

    fn yes(base_file_name: Option<String>) -> Self {
        Self {
            generate: true,
            base_file_name,
        }
    }
}

pub struct HostAdapter<'a> {
    root_files: &'a [String],
    options: &'a CompilerOptions,
    context: &'a dyn HostContext,
    capabilities: Option<&'a HostCapabilities>,
    generation: &'a BuildGeneration,
    parser: &'a dyn SourceParser,
    code_generator: &'a dyn CodeGenerator,
    metadata_collector: &'a dyn MetadataCollector,
    root_dirs: Vec<String>,
}

impl<'a> HostAdapter<'a> {
    pub fn new(
        options: &'a CompilerOptions,
        context: &'a dyn HostContext,
        generation: &'a BuildGeneration,
        parser: &'a dyn SourceParser,
        code_generator: &'a dyn CodeGenerator,
        metadata_collector: &'a dyn MetadataCollector,
    ) -> Self {
        Self {
            root_files: &[],
            options,
            context,
            capabilities: None,
            generation,
            parser,
            code_generator,
            metadata_collector,
            root_dirs: options.resolved_root_dirs(),
        }
    }

    /// Root files of the build; the first one stands in as the containing
    /// file for absolute module names.
    pub fn with_root_files(mut self, root_files: &'a [String]) -> Self {
        self.root_files = root_files;
        self
    }

    pub fn with_capabilities(mut self, capabilities: &'a HostCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn generation(&self) -> &'a BuildGeneration {
        self.generation
    }

    pub fn options(&self) -> &'a CompilerOptions {
        self.options
    }

    // ========================================================================
    // Module names
    // ========================================================================

    /// Module name under which generated code in `containing_file` imports
    /// `imported_file`.
    pub fn file_name_to_module_name(&self, imported_file: &str, containing_file: &str) -> Result<String> {
        if let Some(f) = self.capabilities.and_then(|c| c.file_name_to_module_name.as_ref()) {
            return Ok(f(imported_file, containing_file));
        }
        let cache_key = format!("{}:{}", imported_file, containing_file);
        if let Some(cached) = self.generation.module_names.borrow().get(&cache_key) {
            return Ok(cached.clone());
        }
        tracing::trace!(imported_file, containing_file, "computing module name");

        let imported = paths::strip_ext(imported_file);
        let imported_package = paths::package_name_of(&imported);
        let containing_package = paths::package_name_of(containing_file);

        let module_name = if imported_package == containing_package || paths::is_generated(imported_file) {
            let rooted_containing = paths::relative_to_root_dirs(containing_file, &self.root_dirs);
            let rooted_imported = paths::relative_to_root_dirs(&imported, &self.root_dirs);
            let (containing, imported) = if rooted_containing != containing_file && rooted_imported != imported {
                (rooted_containing, rooted_imported)
            } else {
                (containing_file.to_string(), imported)
            };
            paths::dot_relative(&paths::dirname(&containing), &imported)
        } else if let Some(package) = imported_package {
            let deep_name = paths::strip_node_modules_prefix(&imported);
            if imported_file.ends_with(".d.ts") {
                self.package_typings_shortcut(&imported, &deep_name, &package, imported_file)
                    .unwrap_or(deep_name)
            } else {
                deep_name
            }
        } else {
            return Err(CompileError::Usage(format!(
                "Trying to import a source file from a node_modules package: import {} from {}",
                imported_file, containing_file
            )));
        };

        self.generation
            .module_names
            .borrow_mut()
            .insert(cache_key, module_name.clone());
        Ok(module_name)
    }

    /// The bare package name, when the package's typings entry is exactly
    /// the imported declaration file.
    fn package_typings_shortcut(
        &self,
        imported: &str,
        deep_name: &str,
        package: &str,
        imported_file: &str,
    ) -> Option<String> {
        let module_path = format!("{}{}", imported.strip_suffix(deep_name)?, package);
        let text = self.context.read_file(&paths::join(&module_path, "package.json"))?;
        let package_json = PackageJson::parse(&text).ok()?;
        let typings = paths::join(&module_path, package_json.typings_entry()?);
        (typings == imported_file).then(|| package.to_string())
    }

    pub fn module_name_to_file_name(&self, module_name: &str, containing_file: Option<&str>) -> Result<Option<String>> {
        let containing = match containing_file.filter(|c| !c.is_empty()) {
            Some(containing) => containing.to_string(),
            None => {
                if module_name.starts_with('.') {
                    return Err(CompileError::Usage(
                        "Resolution of relative paths requires a containing file.".into(),
                    ));
                }
                // any containing file gives the same result for absolute names
                match self.root_files.first() {
                    Some(root) => root.clone(),
                    None => paths::join(&self.context.current_directory(), "index.ts"),
                }
            }
        };
        if let Some(f) = self.capabilities.and_then(|c| c.module_name_to_file_name.as_ref()) {
            return Ok(f(module_name, &containing));
        }
        Ok(self
            .resolve_module_name(module_name, &containing)
            .map(|resolved| resolved.resolved_file_name))
    }

    pub fn resolve_module_name(&self, module_name: &str, containing_file: &str) -> Option<ResolvedModule> {
        let containing = containing_file.replace('\\', "/");
        let mut resolved = ModuleResolver::new(self).resolve(module_name, &containing)?;
        // a declaration file we generate code for is part of the program
        if paths::is_dts(&resolved.resolved_file_name) && self.is_source_file(&resolved.resolved_file_name) {
            resolved.is_external_library_import = false;
        }
        Some(resolved)
    }

    /// File a `templateUrl`/`styleUrls` entry refers to.
    pub fn resource_name_to_file_name(&self, resource_name: &str, containing_file: &str) -> Option<String> {
        if let Some(f) = self.capabilities.and_then(|c| c.resource_name_to_file_name.as_ref()) {
            return f(resource_name, containing_file);
        }
        let name = match resource_name.strip_prefix('/') {
            Some(package_path) => package_path.to_string(),
            None if !resource_name.starts_with('.') => format!("./{}", resource_name),
            None => resource_name.to_string(),
        };
        let mut result = self.resolve_resource(&name, containing_file);
        if result.is_none() {
            // the stylesheet may already have been compiled to css upstream
            if let Some(fallback) = paths::css_fallback(&name) {
                result = self.resolve_resource(&fallback, containing_file);
            }
        }
        if result.is_none() {
            tracing::debug!(resource = %name, containing_file, "resource not found");
            if let Some(report) = self.capabilities.and_then(|c| c.report_missing_resource.as_ref()) {
                report(&name);
            }
        }
        result
    }

    fn resolve_resource(&self, name: &str, containing_file: &str) -> Option<String> {
        if name.starts_with('.') {
            let candidate = paths::join(&paths::dirname(containing_file), name);
            return self.original_file_exists(&candidate).then_some(candidate);
        }
        let mut dir = paths::dirname(containing_file);
        loop {
            let candidate = paths::join(&dir, &format!("node_modules/{}", name));
            if self.original_file_exists(&candidate) {
                return Some(candidate);
            }
            let parent = paths::dirname(&dir);
            if parent == dir {
                return None;
            }
            dir = parent;
        }
    }

    pub fn to_summary_file_name(&self, file_name: &str, referring_src_file_name: &str) -> Result<String> {
        self.file_name_to_module_name(file_name, referring_src_file_name)
    }

    pub fn from_summary_file_name(&self, file_name: &str, referring_lib_file_name: &str) -> Result<String> {
        self.module_name_to_file_name(file_name, Some(referring_lib_file_name))?
            .ok_or_else(|| {
                CompileError::Usage(format!(
                    "Could not resolve {} from {}",
                    file_name, referring_lib_file_name
                ))
            })
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Whether `file_name` is analyzed and gets companions.
    pub fn is_source_file(&self, file_name: &str) -> bool {
        if self.generation.is_degraded() {
            return false;
        }
        // no codegen and no type-checking of templates at all
        if self.options.skip_template_codegen && !self.options.full_template_type_check {
            return false;
        }
        if self.generation.is_library_summary(file_name) || paths::is_generated(file_name) {
            return false;
        }
        if paths::is_dts(file_name) {
            if self.options.generate_code_for_libraries == Some(false) {
                return false;
            }
            if self.has_bundle_index(file_name) {
                let normalized = paths::normalize(file_name);
                return self.generation.flat_module_index_names.borrow().contains(&normalized)
                    || self
                        .generation
                        .flat_module_index_redirect_names
                        .borrow()
                        .contains(&normalized);
            }
        }
        true
    }

    /// Whether `file_name` names a companion that can be generated now.
    pub fn should_generate_file(&self, file_name: &str) -> ShouldGenerate {
        if !self.options.is_in_root_dir(file_name) {
            return ShouldGenerate::no();
        }
        let Some((base, kind, ext)) = paths::generated_parts(file_name) else {
            return ShouldGenerate::no();
        };
        if ext != "ts" && ext != "tsx" {
            return ShouldGenerate::no();
        }
        if kind.contains("axstyle") {
            // style companions are named after the stylesheet: `a.css.axstyle.ts`.
            // A degraded build has no analysis to generate them from.
            return if !self.generation.is_degraded() && self.original_file_exists(base) {
                ShouldGenerate::yes(None)
            } else {
                ShouldGenerate::no()
            };
        }
        [".ts", ".tsx", ".d.ts"]
            .iter()
            .map(|ext| format!("{}{}", base, ext))
            .find(|candidate| self.is_source_file(candidate) && self.original_file_exists(candidate))
            .map_or_else(ShouldGenerate::no, |base_file| ShouldGenerate::yes(Some(base_file)))
    }

    pub fn should_generate_files_for(&self, file_name: &str) -> bool {
        !paths::is_generated(file_name)
            && self.is_source_file(file_name)
            && self.options.is_in_root_dir(file_name)
    }

    fn has_bundle_index(&self, file_name: &str) -> bool {
        self.check_bundle_index(&paths::dirname(file_name))
    }

    /// A directory hosts a flat module index when the nearest package.json
    /// declares typings whose `.metadata.json` carries `importAs`.
    fn check_bundle_index(&self, directory: &str) -> bool {
        if let Some(cached) = self.generation.flat_module_index.borrow().get(directory) {
            return *cached;
        }
        let result = if paths::basename(directory) == "node_modules" {
            // never look outside the package
            false
        } else {
            self.read_bundle_index(directory).unwrap_or(false)
        };
        self.generation
            .flat_module_index
            .borrow_mut()
            .insert(directory.to_string(), result);
        result
    }

    /// `None` when a descriptor could not be read or parsed.
    fn read_bundle_index(&self, directory: &str) -> Option<bool> {
        let package_file = paths::join(directory, "package.json");
        if !self.original_file_exists(&package_file) {
            let parent = paths::dirname(directory);
            return Some(parent != directory && self.check_bundle_index(&parent));
        }
        let package = PackageJson::parse(&self.context.read_file(&package_file)?).ok()?;
        let Some(typings) = package.typings_entry() else {
            return Some(false);
        };
        let typings = paths::join(directory, typings);
        if !paths::is_dts(&typings) {
            return Some(false);
        }
        let metadata_file = paths::DTS.replace(&typings, ".metadata.json").into_owned();
        if !self.original_file_exists(&metadata_file) {
            return Some(false);
        }
        let metadata = BundleMetadata::parse(&self.context.read_file(&metadata_file)?).ok()?;
        if metadata.flat_module_index_redirect {
            // the redirect target decides; this directory is not an index yet
            self.generation
                .flat_module_index_redirect_names
                .borrow_mut()
                .insert(typings);
            Some(false)
        } else if metadata.import_as.is_some() {
            tracing::debug!(typings = %typings, "found flat module index");
            self.generation.flat_module_index_names.borrow_mut().insert(typings);
            Some(true)
        } else {
            Some(false)
        }
    }

    // ========================================================================
    // Units
    // ========================================================================

    pub fn original_file_exists(&self, file_name: &str) -> bool {
        if let Some(exists) = self.generation.original_file_exists.borrow().get(file_name) {
            return *exists;
        }
        let exists = self.context.file_exists(file_name);
        self.generation
            .original_file_exists
            .borrow_mut()
            .insert(file_name.to_string(), exists);
        exists
    }

    /// Parsed original unit, read at most once per build.
    pub fn original_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>> {
        if let Some(cached) = self.generation.original_source_files.borrow().get(file_name) {
            return cached.clone();
        }
        tracing::trace!(file = file_name, "parsing original unit");
        let parsed = self
            .context
            .read_file(file_name)
            .map(|text| Rc::new(self.parser.parse_source_file(file_name, &text)));
        self.generation
            .original_source_files
            .borrow_mut()
            .insert(file_name.to_string(), parsed.clone());
        parsed
    }

    /// Unit for `file_name`: a generated companion, a library summary, or
    /// the original file. Original units carry their companions' names as
    /// extra references. A degraded build sees no companions at all.
    pub fn source_file(&self, file_name: &str) -> Result<Option<Rc<SourceFile>>> {
        let degraded = self.generation.is_degraded();
        let mut companions = Vec::new();
        let mut unit = if degraded {
            None
        } else {
            self.generated_source_file(file_name)?
        };

        if unit.is_none() {
            if let Some(summary) = self.generation.library_summaries.borrow().get(file_name) {
                let parsed =
                    summary.source_file_or_parse(|| self.parser.parse_source_file(file_name, &summary.text));
                // hand out the file as read, not a redirect target
                unit = Some(match &parsed.redirect_info {
                    Some(redirect) => redirect.unredirected.clone(),
                    None => parsed,
                });
            }
        }

        if unit.is_none() && degraded {
            return Ok(self.original_source_file(file_name));
        }

        if unit.is_none() {
            unit = self.original_source_file(file_name);
            let cached = self.generation.generated_code_for.borrow().get(file_name).cloned();
            companions = match cached {
                Some(names) => names,
                None => {
                    let names: Vec<String> = if !self.options.no_resolve && self.should_generate_files_for(file_name) {
                        self.code_generator
                            .find_generated_file_names(file_name)
                            .into_iter()
                            .filter(|name| self.should_generate_file(name).generate)
                            .collect()
                    } else {
                        Vec::new()
                    };
                    self.generation
                        .generated_code_for
                        .borrow_mut()
                        .insert(file_name.to_string(), names.clone());
                    names
                }
            };
        }

        Ok(unit.map(|unit| self.with_companion_references(unit, &companions)))
    }

    fn with_companion_references(&self, unit: Rc<SourceFile>, companions: &[String]) -> Rc<SourceFile> {
        if companions.is_empty() {
            return unit;
        }
        let own = unit.own_referenced_files().to_vec();
        let wanted: Vec<String> = own.iter().chain(companions.iter()).cloned().collect();
        let mut attached = self.generation.attached_source_files.borrow_mut();
        if let Some(existing) = attached.get(&unit.file_name) {
            if existing.referenced_files == wanted && existing.text == unit.text {
                return existing.clone();
            }
        }
        let mut copy = (*unit).clone();
        copy.referenced_files = wanted;
        copy.original_referenced_files = Some(own);
        let copy = Rc::new(copy);
        attached.insert(unit.file_name.clone(), copy.clone());
        copy
    }

    fn generated_source_file(&self, file_name: &str) -> Result<Option<Rc<SourceFile>>> {
        if let Some(unit) = self.generation.generated_unit(file_name) {
            return Ok(Some(unit.source_file));
        }
        let verdict = self.should_generate_file(file_name);
        if !verdict.generate {
            return Ok(None);
        }
        let gen = self
            .code_generator
            .generate_file(self, file_name, verdict.base_file_name.as_deref())?;
        let references = gen.external_references();
        self.add_generated_file(&gen, references).map(Some)
    }

    /// Print `gen`'s statements, parse the text and store the unit.
    pub fn add_generated_file(&self, gen: &GeneratedFile, external_references: BTreeSet<String>) -> Result<Rc<SourceFile>> {
        let stmts = gen.stmts.as_ref().ok_or_else(|| {
            CompileError::Usage(format!(
                "Invalid Argument: Expected a GenerateFile with statements. {}",
                gen.gen_file_url
            ))
        })?;
        let mut printable = SourceFile::new(gen.gen_file_url.clone(), "");
        printable.items = stmts.clone();
        let printed = print_source_file(&printable);
        let mut source_file = self.parser.parse_source_file(&gen.gen_file_url, &printed.text);
        source_file.module_name = self.generated_module_name(&gen.gen_file_url);
        let source_file = Rc::new(source_file);

        tracing::debug!(
            file = %gen.gen_file_url,
            base = %gen.src_file_url,
            statements = stmts.len(),
            references = external_references.len(),
            "materialized generated unit"
        );
        self.generation.generated.borrow_mut().insert(
            gen.gen_file_url.clone(),
            GeneratedUnit {
                base_file_name: gen.src_file_url.clone(),
                source_file: source_file.clone(),
                emit_context: EmitContext::new(printed.marks, gen.sources.clone()),
                external_references,
            },
        );
        Ok(source_file)
    }

    /// Module name of a generated unit under AMD or UMD. Companions of
    /// package files are named after their path inside node_modules.
    fn generated_module_name(&self, gen_file_name: &str) -> Option<String> {
        if !self.options.module.is_some_and(ModuleKind::is_named) {
            return None;
        }
        if let Some(name) = self.capabilities.and_then(|c| c.amd_module_name.as_ref()) {
            return name(gen_file_name);
        }
        gen_file_name
            .contains("node_modules")
            .then(|| paths::strip_node_modules_prefix(&paths::strip_ext(gen_file_name)))
    }

    /// Replace a materialized unit. The new content must import from
    /// exactly the same modules as the old one.
    pub fn update_generated_file(&self, gen: &GeneratedFile) -> Result<Rc<SourceFile>> {
        if gen.stmts.is_none() {
            return Err(CompileError::Usage(format!(
                "Invalid Argument: Expected a GenerateFile with statements. {}",
                gen.gen_file_url
            )));
        }
        let old = self.generation.generated_unit(&gen.gen_file_url).ok_or_else(|| {
            CompileError::Consistency(format!(
                "Illegal State: previous GeneratedFile not found for {}.",
                gen.gen_file_url
            ))
        })?;
        let new_references = gen.external_references();
        if new_references != old.external_references {
            return Err(CompileError::Consistency(format!(
                "Illegal State: external references changed in {}.\nOld: {}.\nNew: {}",
                gen.gen_file_url,
                join_names(&old.external_references),
                join_names(&new_references)
            )));
        }
        self.add_generated_file(gen, new_references)
    }

    // ========================================================================
    // Files and resources
    // ========================================================================

    pub fn file_exists(&self, file_name: &str) -> bool {
        self.generation.is_library_summary(file_name)
            || self.generation.generated.borrow().contains_key(file_name)
            || self.should_generate_file(file_name).generate
            || self.original_file_exists(file_name)
    }

    pub fn read_file(&self, file_name: &str) -> Option<String> {
        if let Some(summary) = self.generation.library_summaries.borrow().get(file_name) {
            return Some(summary.text.clone());
        }
        self.context.read_file(file_name)
    }

    pub fn load_summary(&self, file_name: &str) -> Option<String> {
        if let Some(summary) = self.generation.library_summaries.borrow().get(file_name) {
            return Some(summary.text.clone());
        }
        if self.original_file_exists(file_name) {
            return self.context.read_file(file_name);
        }
        None
    }

    pub fn load_resource(&self, file_name: &str) -> Result<ResourceText> {
        if let Some(read) = self.capabilities.and_then(|c| c.read_resource.as_ref()) {
            return Ok(read(file_name));
        }
        if !self.original_file_exists(file_name) {
            return Err(StructuralError::new(format!("Resource file not found: {}", file_name)).into());
        }
        self.context
            .read_file(file_name)
            .map(ResourceText::Ready)
            .ok_or_else(|| CompileError::Io {
                path: file_name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "file vanished while reading"),
            })
    }

    /// Metadata records for a unit. Declaration files use the `.metadata.json`
    /// next to them; other units are collected from source.
    pub fn get_metadata_for(&self, file_name: &str) -> Result<Option<Vec<Value>>> {
        if let Some(cached) = self.generation.metadata_reader.borrow().get(file_name) {
            return Ok(cached.clone());
        }
        let records = if paths::is_dts(file_name) {
            let metadata_file = paths::DTS.replace(file_name, ".metadata.json").into_owned();
            if self.original_file_exists(&metadata_file) {
                let text = self.context.read_file(&metadata_file).unwrap_or_default();
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    CompileError::Config(format!("Failed to read JSON file {}: {}", metadata_file, e))
                })?;
                Some(match value {
                    Value::Array(records) => records,
                    record => vec![record],
                })
            } else {
                None
            }
        } else {
            match self.original_source_file(file_name) {
                Some(unit) => self.metadata_for_source(&unit)?.map(|record| vec![record]),
                None => None,
            }
        };
        self.generation
            .metadata_reader
            .borrow_mut()
            .insert(file_name.to_string(), records.clone());
        Ok(records)
    }

    /// Collected metadata of a parsed unit. Resources are inlined into
    /// component metadata when inlining is on, then lowered expressions
    /// are replaced by references to their bindings.
    pub fn metadata_for_source(&self, unit: &SourceFile) -> Result<Option<Value>> {
        let inline = InlineResourcesMetadataTransformer::new(self);
        let mut transformers: Vec<&dyn MetadataTransformer> = Vec::new();
        if self.options.enable_resource_inlining {
            transformers.push(&inline);
        }
        if !self.options.disable_expression_lowering {
            transformers.push(&self.generation.lowering);
        }
        Ok(self
            .generation
            .metadata
            .get_metadata(self.metadata_collector, &transformers, unit)?)
    }

    /// Template or metadata span a position in a generated unit came from.
    pub fn parse_source_span_of(&self, file_name: &str, line: usize, column: usize) -> Option<ParseSourceSpan> {
        self.generation
            .generated
            .borrow()
            .get(file_name)
            .and_then(|unit| unit.emit_context.span_of(line, column))
    }

    pub fn get_output_name(&self, file_name: &str) -> String {
        paths::relative(&self.context.current_directory(), file_name)
    }
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

// ============================================================================
// Trait views
// ============================================================================

impl CompilerHost for HostAdapter<'_> {
    fn get_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>> {
        match self.source_file(file_name) {
            Ok(unit) => unit,
            Err(error) => {
                self.generation.park_error(error);
                None
            }
        }
    }

    fn file_exists(&self, file_name: &str) -> bool {
        HostAdapter::file_exists(self, file_name)
    }

    fn read_file(&self, file_name: &str) -> Option<String> {
        HostAdapter::read_file(self, file_name)
    }

    fn resolve_module_name(&self, module_name: &str, containing_file: &str) -> Option<ResolvedModule> {
        HostAdapter::resolve_module_name(self, module_name, containing_file)
    }

    fn current_directory(&self) -> String {
        self.context.current_directory()
    }
}

impl ResolutionHost for HostAdapter<'_> {
    fn file_exists(&self, file_name: &str) -> bool {
        HostAdapter::file_exists(self, file_name)
    }

    fn directory_exists(&self, dir_name: &str) -> bool {
        self.context.directory_exists(dir_name)
    }

    fn read_file(&self, file_name: &str) -> Option<String> {
        HostAdapter::read_file(self, file_name)
    }
}

impl AnalyzerHost for HostAdapter<'_> {
    fn is_source_file(&self, file_name: &str) -> bool {
        HostAdapter::is_source_file(self, file_name)
    }

    fn original_source_file(&self, file_name: &str) -> Option<Rc<SourceFile>> {
        HostAdapter::original_source_file(self, file_name)
    }

    fn get_metadata_for(&self, file_name: &str) -> Result<Option<Vec<Value>>> {
        HostAdapter::get_metadata_for(self, file_name)
    }

    fn load_summary(&self, file_name: &str) -> Option<String> {
        HostAdapter::load_summary(self, file_name)
    }

    fn load_resource(&self, file_name: &str) -> Result<ResourceText> {
        HostAdapter::load_resource(self, file_name)
    }

    fn file_name_to_module_name(&self, imported_file: &str, containing_file: &str) -> Result<String> {
        HostAdapter::file_name_to_module_name(self, imported_file, containing_file)
    }

    fn module_name_to_file_name(&self, module_name: &str, containing_file: Option<&str>) -> Result<Option<String>> {
        HostAdapter::module_name_to_file_name(self, module_name, containing_file)
    }

    fn resource_name_to_file_name(&self, resource_name: &str, containing_file: &str) -> Option<String> {
        HostAdapter::resource_name_to_file_name(self, resource_name, containing_file)
    }

    fn to_summary_file_name(&self, file_name: &str, referring_src_file_name: &str) -> Result<String> {
        HostAdapter::to_summary_file_name(self, file_name, referring_src_file_name)
    }

    fn from_summary_file_name(&self, file_name: &str, referring_lib_file_name: &str) -> Result<String> {
        HostAdapter::from_summary_file_name(self, file_name, referring_lib_file_name)
    }

    fn get_output_name(&self, file_name: &str) -> String {
        HostAdapter::get_output_name(self, file_name)
    }
}

impl ResourceHost for HostAdapter<'_> {
    fn resource_name_to_file_name(&self, resource_name: &str, containing_file: &str) -> Option<String> {
        HostAdapter::resource_name_to_file_name(self, resource_name, containing_file)
    }

    fn load_resource(&self, file_name: &str) -> std::result::Result<LoadedResource, TransformError> {
        match HostAdapter::load_resource(self, file_name) {
            Ok(ResourceText::Ready(text)) => Ok(LoadedResource::Text(text)),
            Ok(ResourceText::Deferred(_)) => Ok(LoadedResource::Deferred),
            Err(error) => Err(TransformError::Resource(error.to_string())),
        }
    }
}

impl TypeCheckHost for HostAdapter<'_> {
    fn parse_source_span_of(&self, file_name: &str, line: usize, column: usize) -> Option<ParseSourceSpan> {
        HostAdapter::parse_source_span_of(self, file_name, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryHost;

    struct Plain;

    impl SourceParser for Plain {
        fn parse_source_file(&self, file_name: &str, text: &str) -> SourceFile {
            SourceFile::new(file_name, text)
        }
    }

    impl CodeGenerator for Plain {
        fn generate_file(&self, _host: &dyn AnalyzerHost, gen: &str, base: Option<&str>) -> Result<GeneratedFile> {
            Ok(GeneratedFile::with_statements(base.unwrap_or(""), gen, vec![]))
        }

        fn find_generated_file_names(&self, file_name: &str) -> Vec<String> {
            vec![format!("{}.axfactory.ts", paths::strip_ext(file_name))]
        }
    }

    impl MetadataCollector for Plain {
        fn collect_metadata(&self, _file: &SourceFile) -> Option<Value> {
            None
        }
    }

    fn adapter<'a>(options: &'a CompilerOptions, host: &'a MemoryHost, generation: &'a BuildGeneration) -> HostAdapter<'a> {
        HostAdapter::new(options, host, generation, &Plain, &Plain, &Plain)
    }

    #[test]
    fn test_should_generate_file() {
        let host = MemoryHost::with_files("/app", [("/app/a.ts", ""), ("/app/s.css", ""), ("/app/d.d.ts", "")]);
        let options = CompilerOptions::default();
        let generation = BuildGeneration::default();
        let adapter = adapter(&options, &host, &generation);

        assert_eq!(
            adapter.should_generate_file("/app/a.axfactory.ts"),
            ShouldGenerate::yes(Some("/app/a.ts".into()))
        );
        assert_eq!(
            adapter.should_generate_file("/app/d.axsummary.ts").base_file_name.as_deref(),
            Some("/app/d.d.ts")
        );
        assert_eq!(adapter.should_generate_file("/app/s.css.shim.axstyle.ts"), ShouldGenerate::yes(None));
        assert!(!adapter.should_generate_file("/app/x.css.axstyle.ts").generate);
        assert!(!adapter.should_generate_file("/app/a.axfactory.js").generate);
        assert!(!adapter.should_generate_file("/app/missing.axfactory.ts").generate);
        assert!(!adapter.should_generate_file("/app/a.ts").generate);
    }

    #[test]
    fn test_root_dir_and_skip_codegen() {
        let host = MemoryHost::with_files("/app", [("/app/src/a.ts", ""), ("/app/other/b.ts", "")]);
        let options = CompilerOptions {
            root_dir: Some("/app/src".into()),
            ..Default::default()
        };
        let generation = BuildGeneration::default();
        let adapter = adapter(&options, &host, &generation);
        assert!(adapter.should_generate_file("/app/src/a.axfactory.ts").generate);
        assert!(!adapter.should_generate_file("/app/other/b.axfactory.ts").generate);
        assert!(!adapter.should_generate_files_for("/app/other/b.ts"));

        let options = CompilerOptions {
            skip_template_codegen: true,
            ..Default::default()
        };
        let adapter = HostAdapter::new(&options, &host, &generation, &Plain, &Plain, &Plain);
        assert!(!adapter.is_source_file("/app/src/a.ts"));
    }

    #[test]
    fn test_companion_references_are_stable() {
        let host = MemoryHost::with_files("/app", [("/app/a.ts", "export class A {}")]);
        let options = CompilerOptions::default();
        let generation = BuildGeneration::default();
        let adapter = adapter(&options, &host, &generation);

        let first = adapter.source_file("/app/a.ts").unwrap().unwrap();
        assert_eq!(first.referenced_files, vec!["/app/a.axfactory.ts"]);
        assert!(first.own_referenced_files().is_empty());
        let second = adapter.source_file("/app/a.ts").unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(host.read_count("/app/a.ts"), 1);

        let companion = adapter.source_file("/app/a.axfactory.ts").unwrap().unwrap();
        assert!(companion.referenced_files.is_empty());
        assert_eq!(
            adapter.generation().generated_unit("/app/a.axfactory.ts").unwrap().base_file_name,
            "/app/a.ts"
        );
    }

    #[test]
    fn test_degraded_mode() {
        let host = MemoryHost::with_files("/app", [("/app/a.ts", ""), ("/app/a.css", "p {}")]);
        let options = CompilerOptions::default();
        let generation = BuildGeneration::default();
        let adapter = adapter(&options, &host, &generation);
        assert!(adapter.is_source_file("/app/a.ts"));
        assert!(adapter.should_generate_file("/app/a.css.axstyle.ts").generate);
        assert_eq!(adapter.source_file("/app/a.ts").unwrap().unwrap().referenced_files.len(), 1);
        assert!(adapter.source_file("/app/a.axfactory.ts").unwrap().is_some());

        generation.set_degraded();
        assert!(!adapter.is_source_file("/app/a.ts"));
        assert!(!adapter.should_generate_file("/app/a.axfactory.ts").generate);
        assert!(!adapter.should_generate_file("/app/a.css.axstyle.ts").generate);
        assert!(!adapter.should_generate_file("/app/a.css.shim.axstyle.ts").generate);
        assert!(adapter.source_file("/app/a.ts").unwrap().unwrap().referenced_files.is_empty());
        assert!(adapter.source_file("/app/a.axfactory.ts").unwrap().is_none());
    }
}
