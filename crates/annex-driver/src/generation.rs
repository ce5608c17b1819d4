//! State of one build
//!
//! A [`BuildGeneration`] owns every cache the host adapter fills while the
//! host compiler pulls units in. A new build gets a new generation; nothing
//! is reset in place. The caches use interior mutability because the host
//! compiler only ever holds a shared reference to its host.

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use annex_ast::SourceFile;
use annex_transform::LowerMetadataTransform;
use serde_json::Value;

use crate::error::CompileError;
use crate::metadata_cache::MetadataCache;
use crate::source_span::EmitContext;

/// Precompiled record for a dependency unit. Shadows the unit of the same
/// name on disk for the rest of the build.
#[derive(Debug, Clone)]
pub struct LibrarySummary {
    pub file_name: String,
    pub text: String,
    source_file: OnceCell<Rc<SourceFile>>,
}

impl LibrarySummary {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
            source_file: OnceCell::new(),
        }
    }

    /// A summary whose unit has already been parsed.
    pub fn with_source_file(file_name: impl Into<String>, text: impl Into<String>, source_file: Rc<SourceFile>) -> Self {
        let summary = Self::new(file_name, text);
        let _ = summary.source_file.set(source_file);
        summary
    }

    pub fn source_file(&self) -> Option<&Rc<SourceFile>> {
        self.source_file.get()
    }

    pub(crate) fn source_file_or_parse(&self, parse: impl FnOnce() -> SourceFile) -> Rc<SourceFile> {
        self.source_file.get_or_init(|| Rc::new(parse())).clone()
    }
}

/// A materialized companion unit.
#[derive(Debug, Clone)]
pub struct GeneratedUnit {
    /// Unit the companion was generated from; looked up by name, never owned
    pub base_file_name: String,
    pub source_file: Rc<SourceFile>,
    pub emit_context: EmitContext,
    pub external_references: BTreeSet<String>,
}

#[derive(Default)]
pub struct BuildGeneration {
    pub(crate) original_source_files: RefCell<HashMap<String, Option<Rc<SourceFile>>>>,
    /// Last handed-out copy of each original unit with companion references
    pub(crate) attached_source_files: RefCell<HashMap<String, Rc<SourceFile>>>,
    pub(crate) original_file_exists: RefCell<HashMap<String, bool>>,
    pub(crate) generated: RefCell<HashMap<String, GeneratedUnit>>,
    pub(crate) generated_code_for: RefCell<HashMap<String, Vec<String>>>,
    pub(crate) library_summaries: RefCell<HashMap<String, LibrarySummary>>,
    pub(crate) module_names: RefCell<HashMap<String, String>>,
    pub(crate) flat_module_index: RefCell<HashMap<String, bool>>,
    pub(crate) flat_module_index_names: RefCell<HashSet<String>>,
    pub(crate) flat_module_index_redirect_names: RefCell<HashSet<String>>,
    pub(crate) metadata: MetadataCache,
    /// Expressions hoisted out of metadata, shared by emit and collection
    pub(crate) lowering: LowerMetadataTransform,
    pub(crate) metadata_reader: RefCell<HashMap<String, Option<Vec<Value>>>>,
    degraded: Cell<bool>,
    deferred_error: RefCell<Option<CompileError>>,
}

impl BuildGeneration {
    /// Start a build that already knows the given summaries.
    pub fn new(library_summaries: impl IntoIterator<Item = LibrarySummary>) -> Self {
        let generation = Self::default();
        generation.library_summaries.replace(
            library_summaries
                .into_iter()
                .map(|s| (s.file_name.clone(), s))
                .collect(),
        );
        generation
    }

    pub fn generated_unit(&self, file_name: &str) -> Option<GeneratedUnit> {
        self.generated.borrow().get(file_name).cloned()
    }

    pub fn generated_file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generated.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_library_summary(&self, file_name: &str) -> bool {
        self.library_summaries.borrow().contains_key(file_name)
    }

    /// Every `isSourceFile` query answers false from now on.
    pub fn set_degraded(&self) {
        self.degraded.set(true);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    /// Keep an error raised while the host compiler was pulling units; the
    /// first one wins.
    pub(crate) fn park_error(&self, error: CompileError) {
        let mut slot = self.deferred_error.borrow_mut();
        if slot.is_none() {
            tracing::debug!(error = %error, "parking error raised inside host compiler callback");
            *slot = Some(error);
        }
    }

    pub(crate) fn take_deferred_error(&self) -> Result<(), CompileError> {
        match self.deferred_error.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
