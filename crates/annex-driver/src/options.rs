//! Compiler options and project files
//!
//! A project file looks like
//!
//! ```json
//! {
//!   "files": ["src/main.ts"],
//!   "compilerOptions": { "outDir": "dist", "declaration": true },
//!   "annexCompilerOptions": { "enableResourceInlining": true }
//! }
//! ```
//!
//! Both option objects deserialize into one [`CompilerOptions`]; keys in
//! `annexCompilerOptions` win over `compilerOptions`.

use annex_ast::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnostics::{DEFAULT_ERROR_CODE, SOURCE};
use crate::error::CompileError;
use crate::paths;

/// How framework decorators survive emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationsAs {
    #[serde(rename = "decorators")]
    Decorators,
    #[serde(rename = "static fields")]
    StaticFields,
    /// Any other value; reported by [`CompilerOptions::validate`]
    #[serde(other)]
    Unsupported,
}

/// Module format the host compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    None,
    CommonJs,
    Amd,
    Umd,
    System,
    Es2015,
    EsNext,
    #[serde(other)]
    Other,
}

impl ModuleKind {
    /// Formats whose modules carry an explicit name.
    pub fn is_named(self) -> bool {
        matches!(self, ModuleKind::Amd | ModuleKind::Umd)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub base_path: Option<String>,
    /// Only files below this directory get companions
    pub root_dir: Option<String>,
    pub root_dirs: Option<Vec<String>>,
    pub out_dir: Option<String>,
    pub module: Option<ModuleKind>,
    pub declaration: bool,
    pub no_resolve: bool,
    pub no_emit_on_error: bool,
    /// Append emit timing to the emit diagnostics
    pub diagnostics: bool,
    pub trace_resolution: bool,

    pub skip_template_codegen: bool,
    pub full_template_type_check: bool,
    pub generate_code_for_libraries: Option<bool>,
    pub allow_empty_codegen_files: bool,
    pub enable_resource_inlining: bool,
    pub annotations_as: Option<AnnotationsAs>,
    pub annotate_for_closure_compiler: bool,
    /// Keep function-valued metadata in place instead of hoisting it into
    /// exported `ɵN` bindings
    pub disable_expression_lowering: bool,
    /// The program being built is the framework core itself
    pub compiling_core: bool,
}

impl CompilerOptions {
    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or(".")
    }

    /// `rootDirs` (or the base path) resolved against the base path.
    pub fn resolved_root_dirs(&self) -> Vec<String> {
        let base = self.base_path();
        match &self.root_dirs {
            Some(dirs) => dirs.iter().map(|d| paths::resolve(base, d)).collect(),
            None => vec![paths::normalize(base)],
        }
    }

    pub fn is_in_root_dir(&self, file_name: &str) -> bool {
        match &self.root_dir {
            None => true,
            Some(root) => {
                paths::path_starts_with_prefix(&paths::resolve(self.base_path(), root), file_name).is_some()
            }
        }
    }

    /// Framework decorators are lowered unless they are kept as decorators.
    pub fn lowers_annotations(&self) -> bool {
        self.annotations_as != Some(AnnotationsAs::Decorators)
    }

    /// Diagnostics about option values only this driver understands.
    pub fn validate(&self) -> Vec<Diagnostic> {
        match self.annotations_as {
            Some(AnnotationsAs::Unsupported) => {
                let mut diag = Diagnostic::error(
                    "annex compiler options \"annotationsAs\" only supports \"static fields\" and \"decorators\"",
                    DEFAULT_ERROR_CODE,
                );
                diag.source = Some(SOURCE.to_string());
                vec![diag]
            }
            _ => Vec::new(),
        }
    }
}

/// Root files plus options read from a project file.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub root_names: Vec<String>,
    pub options: CompilerOptions,
}

impl Project {
    /// Parse a project file located in `dir`. Root names and a missing
    /// `basePath` are resolved against `dir`.
    pub fn from_json(text: &str, dir: &str) -> Result<Self, CompileError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CompileError::Config(format!("invalid project file: {}", e)))?;
        let Value::Object(root) = value else {
            return Err(CompileError::Config("project file must be a JSON object".into()));
        };

        let mut merged = Map::new();
        for key in ["compilerOptions", "annexCompilerOptions"] {
            match root.get(key) {
                Some(Value::Object(options)) => {
                    merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
                Some(_) => {
                    return Err(CompileError::Config(format!("\"{}\" must be an object", key)))
                }
                None => {}
            }
        }
        let mut options: CompilerOptions = serde_json::from_value(Value::Object(merged))
            .map_err(|e| CompileError::Config(format!("invalid compiler options: {}", e)))?;
        let base = paths::resolve(dir, options.base_path());
        options.base_path = Some(base.clone());

        let root_names = match root.get("files") {
            Some(Value::Array(files)) => files
                .iter()
                .map(|f| {
                    f.as_str()
                        .map(|f| paths::resolve(&base, f))
                        .ok_or_else(|| CompileError::Config("\"files\" must hold strings".into()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(CompileError::Config("\"files\" must be an array".into())),
            None => Vec::new(),
        };

        Ok(Self {
            root_names,
            options,
        })
    }
}
