//! # Annex Transforms
//!
//! Source transforms that run inside the host compiler's emit:
//!
//! - [`lower_decorators::DecoratorLowering`] turns framework decorators into
//!   static `decorators` / `ctorParameters` / `propDecorators` members
//! - [`inline_resources::InlineResources`] replaces `templateUrl` and
//!   `styleUrls` with the loaded text
//! - [`lower_expressions::ExpressionLowering`] hoists function-valued
//!   metadata into exported `ɵN` bindings
//!
//! plus [`MetadataTransformer`] counterparts of inlining and lowering that
//! keep collected metadata in step with the emitted code. Symbol queries
//! go through [`reflection::SymbolResolver`] so the transforms never depend
//! on a concrete type checker.

use std::collections::BTreeSet;

use annex_ast::{Diagnostic, SourceFile};
use serde_json::Value;

mod error;
pub mod inline_resources;
pub mod lower_decorators;
pub mod lower_expressions;
pub mod reflection;

pub use error::TransformError;
pub use inline_resources::{
    InlineResources, InlineResourcesMetadataTransformer, LoadedResource, ResourceHost, ResourceLoader,
};
pub use lower_decorators::DecoratorLowering;
pub use lower_expressions::{ExpressionLowering, LowerMetadataTransform, LOWER_FIELDS};
pub use reflection::{LocalSymbolTable, SymbolResolver};

/// Module name of the framework core package.
pub const CORE_MODULE: &str = "@annex/core";

/// State shared by every transform applied to one file.
pub struct TransformContext<'a> {
    pub symbols: &'a dyn SymbolResolver,
    /// Non-fatal diagnostics recorded by the transforms
    pub diagnostics: Vec<Diagnostic>,
    /// Local import names that are referenced as values by generated code
    /// and must survive import elision
    pub retained_imports: BTreeSet<String>,
}

impl<'a> TransformContext<'a> {
    pub fn new(symbols: &'a dyn SymbolResolver) -> Self {
        Self {
            symbols,
            diagnostics: Vec::new(),
            retained_imports: BTreeSet::new(),
        }
    }
}

/// A rewrite of one source file applied during emit.
pub trait SourceTransform {
    fn name(&self) -> &'static str;

    fn transform(
        &self,
        file: SourceFile,
        ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError>;
}

impl<T: SourceTransform + ?Sized> SourceTransform for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn transform(
        &self,
        file: SourceFile,
        ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        (**self).transform(file, ctx)
    }
}

/// Rewrites module metadata as it is collected.
pub trait MetadataTransformer {
    /// Rewrite the metadata recorded for the top-level member `name` of
    /// `file`.
    fn transform_member(&self, file: &SourceFile, name: &str, metadata: &mut Value) -> Result<(), TransformError>;
}

/// Ordered transforms handed to the host compiler's emit.
#[derive(Default)]
pub struct TransformPipeline<'a> {
    pub before: Vec<Box<dyn SourceTransform + 'a>>,
    pub after: Vec<Box<dyn SourceTransform + 'a>>,
}

impl<'a> TransformPipeline<'a> {
    pub fn new() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Names of the transforms, `before` first.
    pub fn names(&self) -> Vec<&'static str> {
        self.before.iter().chain(self.after.iter()).map(|t| t.name()).collect()
    }

    pub fn apply_before(
        &self,
        file: SourceFile,
        ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        apply_all(&self.before, file, ctx)
    }

    pub fn apply_after(
        &self,
        file: SourceFile,
        ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        apply_all(&self.after, file, ctx)
    }
}

fn apply_all(
    transforms: &[Box<dyn SourceTransform + '_>],
    mut file: SourceFile,
    ctx: &mut TransformContext<'_>,
) -> Result<SourceFile, TransformError> {
    for transform in transforms {
        tracing::trace!(transform = transform.name(), file = %file.file_name, "applying transform");
        file = transform.transform(file, ctx)?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rename(&'static str);

    impl SourceTransform for Rename {
        fn name(&self) -> &'static str {
            self.0
        }

        fn transform(
            &self,
            mut file: SourceFile,
            _ctx: &mut TransformContext<'_>,
        ) -> Result<SourceFile, TransformError> {
            file.file_name.push_str(self.0);
            Ok(file)
        }
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let mut pipeline = TransformPipeline::new();
        pipeline.before.push(Box::new(Rename("-a")));
        pipeline.before.push(Box::new(Rename("-b")));
        pipeline.after.push(Box::new(Rename("-c")));

        let symbols = LocalSymbolTable;
        let mut ctx = TransformContext::new(&symbols);
        let file = pipeline.apply_before(SourceFile::new("x", ""), &mut ctx).unwrap();
        let file = pipeline.apply_after(file, &mut ctx).unwrap();
        assert_eq!(file.file_name, "x-a-b-c");
        assert_eq!(pipeline.names(), vec!["-a", "-b", "-c"]);
    }
}
