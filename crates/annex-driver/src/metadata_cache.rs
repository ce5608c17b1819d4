//! Per-build memo of collected module metadata

use std::cell::RefCell;
use std::collections::HashMap;

use annex_ast::SourceFile;
use annex_transform::{MetadataTransformer, TransformError};
use serde_json::Value;

use crate::analyzer::MetadataCollector;

#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RefCell<HashMap<String, Option<Value>>>,
}

impl MetadataCache {
    /// Metadata of `file`, collected on first request. Transformers only
    /// run on units that are not declaration files.
    pub fn get_metadata(
        &self,
        collector: &dyn MetadataCollector,
        transformers: &[&dyn MetadataTransformer],
        file: &SourceFile,
    ) -> Result<Option<Value>, TransformError> {
        if let Some(cached) = self.entries.borrow().get(&file.file_name) {
            return Ok(cached.clone());
        }
        tracing::trace!(file = %file.file_name, "collecting metadata");
        let mut metadata = collector.collect_metadata(file);
        if let Some(module) = metadata.as_mut().filter(|_| !file.is_declaration_file) {
            for transformer in transformers {
                transform_members(file, module, *transformer)?;
            }
        }
        self.entries
            .borrow_mut()
            .insert(file.file_name.clone(), metadata.clone());
        Ok(metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `transformer` over every member record of a module metadata object.
fn transform_members(
    file: &SourceFile,
    module: &mut Value,
    transformer: &dyn MetadataTransformer,
) -> Result<(), TransformError> {
    let Some(members) = module.get_mut("metadata").and_then(Value::as_object_mut) else {
        return Ok(());
    };
    for (name, value) in members.iter_mut() {
        transformer.transform_member(file, name, value)?;
    }
    Ok(())
}
