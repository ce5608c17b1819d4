//! Resource inlining
//!
//! Replaces `templateUrl` with `template` and merges `styleUrls` into
//! `styles` on `@Component` arguments, both on the decorator itself and on
//! an already lowered `static decorators` array. The same rewrite is
//! available for collected JSON metadata.

use annex_ast::*;
use serde_json::{Map, Value};

use crate::reflection::import_of_identifier;
use crate::{MetadataTransformer, SourceTransform, TransformContext, TransformError, CORE_MODULE};

const PRECONDITIONS_TEXT: &str =
    "annexCompilerOptions.enableResourceInlining requires all resources to be statically resolvable.";

const COMPONENT: &str = "Component";

/// Result of loading a resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedResource {
    Text(String),
    /// The host only offers the content asynchronously
    Deferred,
}

/// Host operations needed to inline resources.
pub trait ResourceHost {
    fn resource_name_to_file_name(&self, resource_name: &str, containing_file: &str)
        -> Option<String>;

    fn load_resource(&self, file_name: &str) -> Result<LoadedResource, TransformError>;
}

/// Loads resources referenced from one containing file.
pub struct ResourceLoader<'h> {
    host: &'h dyn ResourceHost,
    containing_file: String,
}

impl<'h> ResourceLoader<'h> {
    pub fn new(host: &'h dyn ResourceHost, containing_file: impl Into<String>) -> Self {
        Self {
            host,
            containing_file: containing_file.into(),
        }
    }

    pub fn get(&self, url: &str) -> Result<String, TransformError> {
        let Some(file_name) = self.host.resource_name_to_file_name(url, &self.containing_file)
        else {
            return Err(TransformError::Resource(format!(
                "Failed to resolve {} from {}. {}",
                url, self.containing_file, PRECONDITIONS_TEXT
            )));
        };
        match self.host.load_resource(&file_name)? {
            LoadedResource::Text(text) => Ok(text),
            LoadedResource::Deferred => Err(TransformError::Resource(format!(
                "Cannot handle async resource. {}",
                PRECONDITIONS_TEXT
            ))),
        }
    }

    /// Load a URL that arrived as an untyped metadata value.
    fn get_value(&self, url: &Value) -> Result<String, TransformError> {
        match url.as_str() {
            Some(url) => self.get(url),
            None => Err(TransformError::Resource(format!(
                "templateUrl and stylesUrl must be string literals. {}",
                PRECONDITIONS_TEXT
            ))),
        }
    }
}

// ============================================================================
// AST form
// ============================================================================

/// Source transform that inlines component resources.
pub struct InlineResources<'h> {
    host: &'h dyn ResourceHost,
}

impl<'h> InlineResources<'h> {
    pub fn new(host: &'h dyn ResourceHost) -> Self {
        Self { host }
    }
}

impl SourceTransform for InlineResources<'_> {
    fn name(&self) -> &'static str {
        "inline-resources"
    }

    fn transform(
        &self,
        mut file: SourceFile,
        _ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let loader = ResourceLoader::new(self.host, file.file_name.clone());
        for idx in 0..file.items.len() {
            let Some(class) = file.items[idx].value.class() else {
                continue;
            };
            let updated = update_class(&file, class, &loader)?;
            if let Some(slot) = file.items[idx].value.class_mut() {
                *slot = updated;
            }
        }
        Ok(file)
    }
}

fn update_class(
    file: &SourceFile,
    class: &ClassDecl,
    loader: &ResourceLoader<'_>,
) -> Result<ClassDecl, TransformError> {
    let mut class = class.clone();

    // @Component({..})
    for decorator in &mut class.decorators {
        if let Expr::Call { callee, args } = &mut decorator.value {
            if is_component_reference(file, &callee.value) {
                *args = update_component_properties(args, loader)?;
            }
        }
    }

    // static decorators = [{ type: Component, args: [{..}] }]
    for member in &mut class.members {
        let ClassMember::Property(prop) = &mut member.value else {
            continue;
        };
        if prop.name.as_ident() != Some("decorators") {
            continue;
        }
        let Some(Node {
            value: Expr::Array(annotations),
            ..
        }) = &mut prop.init
        else {
            continue;
        };
        for annotation in annotations.iter_mut() {
            let Expr::Object(props) = &mut annotation.value else {
                continue;
            };
            let is_component = props.iter().any(|p| match p {
                ObjectProperty::KeyValue { key, value } => {
                    key.as_ident() == Some("type") && is_component_reference(file, &value.value)
                }
                _ => false,
            });
            if !is_component {
                continue;
            }
            for prop in props.iter_mut() {
                if let ObjectProperty::KeyValue { key, value } = prop {
                    if key.as_ident() != Some("args") {
                        continue;
                    }
                    if let Expr::Array(elements) = &mut value.value {
                        *elements = update_component_properties(elements, loader)?;
                    }
                }
            }
        }
    }

    Ok(class)
}

/// Identifier bound by `import { Component } from "@annex/core"`.
fn is_component_reference(file: &SourceFile, expr: &Expr) -> bool {
    let Expr::Ident(id) = expr else {
        return false;
    };
    import_of_identifier(file, &id.name)
        .is_some_and(|import| import.from == CORE_MODULE && import.name == COMPONENT)
}

fn update_component_properties(
    args: &[Node<Expr>],
    loader: &ResourceLoader<'_>,
) -> Result<Vec<Node<Expr>>, TransformError> {
    // Anything but a single object literal is reported by the type checker.
    let [component_arg] = args else {
        return Ok(args.to_vec());
    };
    let Expr::Object(props) = &component_arg.value else {
        return Ok(args.to_vec());
    };

    let mut new_props = Vec::with_capacity(props.len());
    let mut new_styles = Vec::new();
    for prop in props {
        let (name, value) = match prop {
            ObjectProperty::KeyValue { key, value } if !matches!(key, PropertyName::Computed(_)) => {
                (key.text().unwrap_or_default(), value)
            }
            _ => {
                new_props.push(prop.clone());
                continue;
            }
        };
        match name.as_str() {
            "styles" => {
                let Expr::Array(elements) = &value.value else {
                    return Err(TransformError::InvalidArgument(
                        "styles takes an array argument".into(),
                    ));
                };
                new_styles.extend(elements.iter().cloned());
            }
            "styleUrls" => {
                let Expr::Array(elements) = &value.value else {
                    return Err(TransformError::InvalidArgument(
                        "styleUrls takes an array argument".into(),
                    ));
                };
                for element in elements {
                    let Some(url) = element.value.as_string_literal() else {
                        return Err(TransformError::Resource(format!(
                            "Can only accept string literal arguments to styleUrls. {}",
                            PRECONDITIONS_TEXT
                        )));
                    };
                    new_styles.push(Node::synthetic(Expr::string(loader.get(url)?)));
                }
            }
            "templateUrl" => {
                let Some(url) = value.value.as_string_literal() else {
                    return Err(TransformError::Resource(format!(
                        "Can only accept a string literal argument to templateUrl. {}",
                        PRECONDITIONS_TEXT
                    )));
                };
                let template = loader.get(url)?;
                new_props.push(ObjectProperty::key_value(
                    "template",
                    Node::new(Expr::string(template), value.span),
                ));
            }
            _ => new_props.push(prop.clone()),
        }
    }

    if !new_styles.is_empty() {
        new_props.push(ObjectProperty::key_value(
            "styles",
            Node::synthetic(Expr::Array(new_styles)),
        ));
    }
    Ok(vec![Node::new(Expr::Object(new_props), component_arg.span)])
}

// ============================================================================
// Metadata form
// ============================================================================

/// Inlines resources into `@Component` call metadata.
pub struct InlineResourcesMetadataTransformer<'h> {
    host: &'h dyn ResourceHost,
}

impl<'h> InlineResourcesMetadataTransformer<'h> {
    pub fn new(host: &'h dyn ResourceHost) -> Self {
        Self { host }
    }
}

impl MetadataTransformer for InlineResourcesMetadataTransformer<'_> {
    fn transform_member(&self, file: &SourceFile, _name: &str, metadata: &mut Value) -> Result<(), TransformError> {
        if metadata.get("__symbolic").and_then(Value::as_str) != Some("class") {
            return Ok(());
        }
        let Some(decorators) = metadata.get_mut("decorators").and_then(Value::as_array_mut) else {
            return Ok(());
        };
        let loader = ResourceLoader::new(self.host, &file.file_name);
        for decorator in decorators {
            if !is_component_call(decorator) {
                continue;
            }
            if let Some(args) = decorator.get_mut("arguments").and_then(Value::as_array_mut) {
                for arg in args {
                    if let Some(obj) = arg.as_object_mut() {
                        update_decorator_metadata(&loader, obj)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_component_call(decorator: &Value) -> bool {
    if decorator.get("__symbolic").and_then(Value::as_str) != Some("call") {
        return false;
    }
    let Some(expr) = decorator.get("expression") else {
        return false;
    };
    expr.get("__symbolic").and_then(Value::as_str) == Some("reference")
        && expr.get("module").and_then(Value::as_str) == Some(CORE_MODULE)
        && expr.get("name").and_then(Value::as_str) == Some(COMPONENT)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}

fn update_decorator_metadata(
    loader: &ResourceLoader<'_>,
    arg: &mut Map<String, Value>,
) -> Result<(), TransformError> {
    if let Some(url) = arg.get("templateUrl").filter(|v| is_truthy(v)) {
        let template = loader.get_value(url)?;
        arg.insert("template".into(), Value::String(template));
        arg.remove("templateUrl");
    }

    let mut styles = match arg.get("styles") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(styles)) => styles.clone(),
        Some(_) => {
            return Err(TransformError::InvalidArgument("styles should be an array".into()))
        }
    };
    let style_urls = match arg.get("styleUrls") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(urls)) => urls.clone(),
        Some(_) => {
            return Err(TransformError::InvalidArgument(
                "styleUrls should be an array".into(),
            ))
        }
    };
    for url in &style_urls {
        styles.push(Value::String(loader.get_value(url)?));
    }
    if !styles.is_empty() {
        arg.insert("styles".into(), Value::Array(styles));
        arg.remove("styleUrls");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalSymbolTable;
    use serde_json::json;
    use std::collections::HashMap;

    struct MapHost {
        files: HashMap<String, LoadedResource>,
    }

    impl MapHost {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), LoadedResource::Text(v.to_string())))
                    .collect(),
            }
        }
    }

    impl ResourceHost for MapHost {
        fn resource_name_to_file_name(&self, name: &str, _containing: &str) -> Option<String> {
            let file = format!("/app/{}", name.trim_start_matches("./"));
            self.files.contains_key(&file).then_some(file)
        }

        fn load_resource(&self, file_name: &str) -> Result<LoadedResource, TransformError> {
            self.files
                .get(file_name)
                .cloned()
                .ok_or_else(|| TransformError::Resource(format!("Resource file not found: {}", file_name)))
        }
    }

    fn string(s: &str) -> Node<Expr> {
        Node::synthetic(Expr::string(s))
    }

    fn component_args() -> Node<Expr> {
        Node::synthetic(Expr::Object(vec![
            ObjectProperty::key_value("selector", string("app")),
            ObjectProperty::key_value("templateUrl", string("a.html")),
            ObjectProperty::key_value("styleUrls", Node::synthetic(Expr::Array(vec![string("a.css")]))),
        ]))
    }

    fn expected_args() -> Node<Expr> {
        Node::synthetic(Expr::Object(vec![
            ObjectProperty::key_value("selector", string("app")),
            ObjectProperty::key_value("template", string("<p></p>")),
            ObjectProperty::key_value("styles", Node::synthetic(Expr::Array(vec![string("p{color:red}")]))),
        ]))
    }

    fn component_file(class: ClassDecl) -> SourceFile {
        let mut file = SourceFile::new("/app/a.ts", "");
        file.items = vec![
            Node::synthetic(ModuleItem::Import(ImportDecl {
                specifiers: vec![ImportSpecifier::Named {
                    imported: Ident::new("Component"),
                    local: None,
                    type_only: false,
                }],
                source: CORE_MODULE.into(),
                type_only: false,
            })),
            Node::synthetic(ModuleItem::Decl(Decl::Class(class))),
        ];
        file
    }

    fn empty_class() -> ClassDecl {
        ClassDecl {
            name: Node::synthetic(Ident::new("App")),
            extends: None,
            members: vec![],
            decorators: vec![],
            is_declare: false,
        }
    }

    fn run(host: &MapHost, file: SourceFile) -> Result<SourceFile, TransformError> {
        let symbols = LocalSymbolTable;
        let mut ctx = TransformContext::new(&symbols);
        InlineResources::new(host).transform(file, &mut ctx)
    }

    #[test]
    fn test_inlines_decorator_form() {
        let host = MapHost::new(&[("/app/a.html", "<p></p>"), ("/app/a.css", "p{color:red}")]);
        let mut class = empty_class();
        class.decorators.push(Node::synthetic(Expr::Call {
            callee: Box::new(Node::synthetic(Expr::ident("Component"))),
            args: vec![component_args()],
        }));
        let out = run(&host, component_file(class)).unwrap();
        let class = out.classes().next().unwrap();
        let Expr::Call { args, .. } = &class.decorators[0].value else {
            panic!("decorator is no longer a call");
        };
        assert_eq!(args, &vec![expected_args()]);
    }

    #[test]
    fn test_inlines_lowered_form() {
        let host = MapHost::new(&[("/app/a.html", "<p></p>"), ("/app/a.css", "p{color:red}")]);
        let annotation = |args: Node<Expr>| {
            Node::synthetic(Expr::Array(vec![Node::synthetic(Expr::Object(vec![
                ObjectProperty::key_value("type", Node::synthetic(Expr::ident("Component"))),
                ObjectProperty::key_value("args", Node::synthetic(Expr::Array(vec![args]))),
            ]))]))
        };
        let mut class = empty_class();
        class.members.push(Node::synthetic(ClassMember::Property(PropertyMember {
            name: PropertyName::ident("decorators"),
            type_annotation: None,
            init: Some(annotation(component_args())),
            is_static: true,
            decorators: vec![],
            leading_comment: None,
        })));
        let out = run(&host, component_file(class)).unwrap();
        let prop = out.classes().next().unwrap().static_property("decorators").unwrap();
        assert_eq!(prop.init, Some(annotation(expected_args())));
    }

    #[test]
    fn test_unresolvable_resource_is_fatal() {
        let host = MapHost::new(&[]);
        let mut class = empty_class();
        class.decorators.push(Node::synthetic(Expr::Call {
            callee: Box::new(Node::synthetic(Expr::ident("Component"))),
            args: vec![component_args()],
        }));
        let err = run(&host, component_file(class)).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to resolve a.html from /app/a.ts. {}", PRECONDITIONS_TEXT)
        );
    }

    #[test]
    fn test_deferred_resource_is_rejected() {
        let mut host = MapHost::new(&[]);
        host.files.insert("/app/a.html".into(), LoadedResource::Deferred);
        let loader = ResourceLoader::new(&host, "/app/a.ts");
        let err = loader.get("./a.html").unwrap_err();
        assert!(err.to_string().starts_with("Cannot handle async resource."));
    }

    #[test]
    fn test_non_literal_template_url() {
        let host = MapHost::new(&[]);
        let loader = ResourceLoader::new(&host, "/app/a.ts");
        let args = vec![Node::synthetic(Expr::Object(vec![ObjectProperty::key_value(
            "templateUrl",
            Node::synthetic(Expr::ident("url")),
        )]))];
        let err = update_component_properties(&args, &loader).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Can only accept a string literal argument to templateUrl."));
    }

    #[test]
    fn test_metadata_form() {
        let host = MapHost::new(&[("/app/a.html", "<p></p>"), ("/app/a.css", "p{color:red}")]);
        let mut metadata = json!({
            "__symbolic": "class",
            "decorators": [{
                "__symbolic": "call",
                "expression": {"__symbolic": "reference", "module": "@annex/core", "name": "Component"},
                "arguments": [{"templateUrl": "a.html", "styleUrls": ["a.css"], "styles": ["b{}"]}]
            }]
        });
        InlineResourcesMetadataTransformer::new(&host)
            .transform_member(&SourceFile::new("/app/a.ts", ""), "A", &mut metadata)
            .unwrap();
        assert_eq!(
            metadata["decorators"][0]["arguments"][0],
            json!({"template": "<p></p>", "styles": ["b{}", "p{color:red}"]})
        );
    }

    #[test]
    fn test_metadata_rejects_non_array_styles() {
        let host = MapHost::new(&[]);
        let mut metadata = json!({
            "__symbolic": "class",
            "decorators": [{
                "__symbolic": "call",
                "expression": {"__symbolic": "reference", "module": "@annex/core", "name": "Component"},
                "arguments": [{"styles": "p{}"}]
            }]
        });
        let err = InlineResourcesMetadataTransformer::new(&host)
            .transform_member(&SourceFile::new("/app/a.ts", ""), "A", &mut metadata)
            .unwrap_err();
        assert_eq!(err, TransformError::InvalidArgument("styles should be an array".into()));
    }
}
