//! File-system primitives the orchestrator is built on
//!
//! [`HostContext`] is the minimal I/O surface: existence, reads and writes
//! of whole files. [`HostCapabilities`] carries the optional overrides an
//! embedding build tool may supply; each one that is absent falls back to the
//! driver's own implementation.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use crate::error::CompileError;
use crate::paths;

pub trait HostContext {
    fn file_exists(&self, file_name: &str) -> bool;

    fn directory_exists(&self, dir_name: &str) -> bool;

    fn read_file(&self, file_name: &str) -> Option<String>;

    /// Write an output. `source_files` are the units the output was produced
    /// from, if known.
    fn write_file(&self, file_name: &str, data: &str, source_files: &[String]) -> io::Result<()>;

    fn current_directory(&self) -> String;
}

// ============================================================================
// Capabilities
// ============================================================================

/// Text of a resource, possibly still being produced by an upstream step.
pub enum ResourceText {
    Ready(String),
    Deferred(Pin<Box<dyn Future<Output = Result<String, CompileError>>>>),
}

impl fmt::Debug for ResourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceText::Ready(text) => f.debug_tuple("Ready").field(text).finish(),
            ResourceText::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// `(module_name, containing_file) -> file_name`
pub type ModuleNameToFileName = dyn Fn(&str, &str) -> Option<String>;
/// `(imported_file, containing_file) -> module_name`
pub type FileNameToModuleName = dyn Fn(&str, &str) -> String;
/// `(resource_name, containing_file) -> file_name`
pub type ResourceNameToFileName = dyn Fn(&str, &str) -> Option<String>;
/// `generated_file -> module name` for AMD and UMD output
pub type AmdModuleName = dyn Fn(&str) -> Option<String>;

/// Optional host overrides, resolved once when the adapter is built.
#[derive(Default)]
pub struct HostCapabilities {
    pub module_name_to_file_name: Option<Box<ModuleNameToFileName>>,
    pub file_name_to_module_name: Option<Box<FileNameToModuleName>>,
    pub resource_name_to_file_name: Option<Box<ResourceNameToFileName>>,
    pub read_resource: Option<Box<dyn Fn(&str) -> ResourceText>>,
    /// Called with the resource name when a resource cannot be resolved
    pub report_missing_resource: Option<Box<dyn Fn(&str)>>,
    pub amd_module_name: Option<Box<AmdModuleName>>,
}

impl HostCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_name_to_file_name(
        mut self,
        f: impl Fn(&str, &str) -> Option<String> + 'static,
    ) -> Self {
        self.module_name_to_file_name = Some(Box::new(f));
        self
    }

    pub fn with_file_name_to_module_name(mut self, f: impl Fn(&str, &str) -> String + 'static) -> Self {
        self.file_name_to_module_name = Some(Box::new(f));
        self
    }

    pub fn with_resource_name_to_file_name(
        mut self,
        f: impl Fn(&str, &str) -> Option<String> + 'static,
    ) -> Self {
        self.resource_name_to_file_name = Some(Box::new(f));
        self
    }

    pub fn with_read_resource(mut self, f: impl Fn(&str) -> ResourceText + 'static) -> Self {
        self.read_resource = Some(Box::new(f));
        self
    }

    pub fn with_report_missing_resource(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.report_missing_resource = Some(Box::new(f));
        self
    }

    pub fn with_amd_module_name(mut self, f: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.amd_module_name = Some(Box::new(f));
        self
    }
}

// ============================================================================
// In-memory host
// ============================================================================

/// Host backed by a map of file contents. Counts reads and existence
/// checks per file so callers can observe caching.
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: RefCell<BTreeMap<String, String>>,
    written: RefCell<BTreeMap<String, String>>,
    reads: RefCell<HashMap<String, usize>>,
    exists_checks: RefCell<HashMap<String, usize>>,
    current_dir: String,
}

impl MemoryHost {
    pub fn new(current_dir: impl Into<String>) -> Self {
        Self {
            current_dir: current_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_files<'a>(
        current_dir: impl Into<String>,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let host = Self::new(current_dir);
        for (name, text) in files {
            host.add_file(name, text);
        }
        host
    }

    pub fn add_file(&self, file_name: &str, text: &str) {
        self.files
            .borrow_mut()
            .insert(paths::normalize(file_name), text.to_string());
    }

    pub fn remove_file(&self, file_name: &str) {
        self.files.borrow_mut().remove(&paths::normalize(file_name));
    }

    /// Outputs passed to `write_file`, by name.
    pub fn written(&self) -> BTreeMap<String, String> {
        self.written.borrow().clone()
    }

    pub fn clear_written(&self) {
        self.written.borrow_mut().clear();
    }

    pub fn read_count(&self, file_name: &str) -> usize {
        self.reads.borrow().get(file_name).copied().unwrap_or(0)
    }

    pub fn exists_count(&self, file_name: &str) -> usize {
        self.exists_checks.borrow().get(file_name).copied().unwrap_or(0)
    }
}

impl HostContext for MemoryHost {
    fn file_exists(&self, file_name: &str) -> bool {
        *self
            .exists_checks
            .borrow_mut()
            .entry(file_name.to_string())
            .or_insert(0) += 1;
        self.files.borrow().contains_key(&paths::normalize(file_name))
    }

    fn directory_exists(&self, dir_name: &str) -> bool {
        let prefix = format!("{}/", paths::normalize(dir_name).trim_end_matches('/'));
        self.files.borrow().keys().any(|name| name.starts_with(&prefix))
    }

    fn read_file(&self, file_name: &str) -> Option<String> {
        *self.reads.borrow_mut().entry(file_name.to_string()).or_insert(0) += 1;
        self.files.borrow().get(&paths::normalize(file_name)).cloned()
    }

    fn write_file(&self, file_name: &str, data: &str, _source_files: &[String]) -> io::Result<()> {
        self.written
            .borrow_mut()
            .insert(file_name.to_string(), data.to_string());
        Ok(())
    }

    fn current_directory(&self) -> String {
        self.current_dir.clone()
    }
}

// ============================================================================
// Disk host
// ============================================================================

/// Host reading and writing the real file system.
#[derive(Debug, Clone)]
pub struct FsHost {
    current_dir: String,
}

impl FsHost {
    pub fn new(current_dir: impl Into<String>) -> Self {
        Self {
            current_dir: current_dir.into(),
        }
    }
}

impl HostContext for FsHost {
    fn file_exists(&self, file_name: &str) -> bool {
        Path::new(file_name).is_file()
    }

    fn directory_exists(&self, dir_name: &str) -> bool {
        Path::new(dir_name).is_dir()
    }

    fn read_file(&self, file_name: &str) -> Option<String> {
        fs::read_to_string(file_name).ok()
    }

    fn write_file(&self, file_name: &str, data: &str, _source_files: &[String]) -> io::Result<()> {
        if let Some(parent) = Path::new(file_name).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file_name, data)
    }

    fn current_directory(&self) -> String {
        self.current_dir.clone()
    }
}
