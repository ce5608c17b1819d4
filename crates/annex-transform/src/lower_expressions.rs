//! Expression lowering
//!
//! Metadata can only point at code by name. Values the metadata cannot
//! express, such as arrow functions anywhere in decorator arguments and
//! non-literal values of fields like `useFactory`, are hoisted into
//! module-level `ɵN` bindings and exported:
//!
//! ```text
//! @NgModule({                                  const ɵ0 = () => new Logger();
//!   providers: [{                              @NgModule({ providers: [{ provide: Logger, useFactory: ɵ0 }] })
//!     provide: Logger,                 =>      export class AppModule {}
//!     useFactory: () => new Logger(),          export { ɵ0 };
//!   }],
//! })
//! export class AppModule {}
//! ```
//!
//! The same requests drive [`LowerMetadataTransform`], which replaces the
//! lowered values in collected metadata by references to the bindings.
//! Requests are keyed by the position of the node in the parsed unit, so
//! synthesized nodes are never lowered.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use annex_ast::*;
use serde_json::{json, Value};

use crate::{MetadataTransformer, SourceTransform, TransformContext, TransformError};

/// Object fields whose values are lowered unless they are literals.
pub const LOWER_FIELDS: &[&str] = &["useValue", "useFactory", "data", "id", "loadChildren"];

const LOWERED_PREFIX: &str = "ɵ";

/// Name of the `index`th binding of a file.
pub fn lowered_symbol(index: usize) -> String {
    format!("{}{}", LOWERED_PREFIX, index)
}

fn is_lowered_symbol(name: &str) -> bool {
    name.strip_prefix(LOWERED_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// One expression to hoist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringRequest {
    pub name: String,
    /// Kind of the node, checked together with its position
    pub kind: &'static str,
    /// The node is the whole initializer of this variable. The binding then
    /// aliases the variable and the initializer stays where it is.
    pub initializer_of: Option<String>,
}

/// Requests of one file, keyed by the `(start, end)` of their node.
pub type RequestMap = BTreeMap<(usize, usize), LoweringRequest>;

fn lookup<'r>(requests: &'r RequestMap, expr: &Node<Expr>) -> Option<&'r LoweringRequest> {
    if expr.span.is_synthetic() {
        return None;
    }
    requests
        .get(&(expr.span.start, expr.span.end))
        .filter(|request| request.kind == expr.value.kind_name())
}

// ============================================================================
// Requests
// ============================================================================

/// Find what to lower in `file`. Decorators and module-level code qualify;
/// nothing inside functions or class bodies does. An exported variable
/// qualifies only when it is initialized with an object, an array or a
/// call.
pub fn lowering_requests(file: &SourceFile, fields: &BTreeSet<String>) -> RequestMap {
    let mut collector = RequestCollector {
        fields,
        exported: exported_names(file),
        requests: RequestMap::new(),
    };
    if file.is_declaration_file {
        return collector.requests;
    }
    for item in &file.items {
        match &item.value {
            ModuleItem::Decl(decl) => collector.decl(decl, false),
            ModuleItem::Export(ExportDecl::Decl(decl)) => collector.decl(decl, true),
            ModuleItem::Stmt(Stmt::Var(var)) => collector.var(var, false),
            ModuleItem::Stmt(Stmt::Expr(expr)) => collector.visit(expr, false, None),
            _ => {}
        }
    }
    collector.requests
}

fn exported_names(file: &SourceFile) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for item in &file.items {
        match &item.value {
            ModuleItem::Export(ExportDecl::Decl(decl)) => {
                names.insert(decl.name().to_string());
            }
            ModuleItem::Export(ExportDecl::Named { specifiers, source: None }) => {
                names.extend(specifiers.iter().map(|s| s.local.name.clone()));
            }
            _ => {}
        }
    }
    names
}

struct RequestCollector<'f> {
    fields: &'f BTreeSet<String>,
    exported: BTreeSet<String>,
    requests: RequestMap,
}

impl RequestCollector<'_> {
    fn decl(&mut self, decl: &Decl, exported: bool) {
        match decl {
            Decl::Class(class) => {
                for decorator in decorators(class) {
                    self.visit(decorator, false, None);
                }
            }
            Decl::Var(var) => self.var(var, exported),
            _ => {}
        }
    }

    fn var(&mut self, var: &VarDecl, exported: bool) {
        let Some(init) = &var.init else {
            return;
        };
        if exported {
            if matches!(init.value, Expr::Object(_) | Expr::Array(_) | Expr::Call { .. }) {
                self.visit(init, false, None);
            }
        } else {
            self.visit(init, false, Some(var.name.value.name.as_str()));
        }
    }

    fn visit(&mut self, expr: &Node<Expr>, in_field: bool, initializer_of: Option<&str>) {
        let candidate = in_field || matches!(expr.value, Expr::Arrow { .. });
        if candidate && self.should_lower(expr) {
            let name = lowered_symbol(self.requests.len());
            self.requests.insert(
                (expr.span.start, expr.span.end),
                LoweringRequest {
                    name,
                    kind: expr.value.kind_name(),
                    initializer_of: initializer_of.map(str::to_string),
                },
            );
            return;
        }
        match &expr.value {
            Expr::Call { callee, args } | Expr::New { callee, args } => {
                self.visit(callee, false, None);
                for arg in args {
                    self.visit(arg, false, None);
                }
            }
            Expr::Member { object, .. } => self.visit(object, false, None),
            Expr::Array(elements) => {
                for element in elements {
                    self.visit(element, false, None);
                }
            }
            Expr::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectProperty::KeyValue { key, value } => {
                            let field = key.text().is_some_and(|k| self.fields.contains(&k));
                            self.visit(value, field, None);
                        }
                        ObjectProperty::Spread(value) => self.visit(value, false, None),
                        ObjectProperty::Shorthand(_) => {}
                    }
                }
            }
            Expr::Paren(inner) | Expr::Spread(inner) => self.visit(inner, false, None),
            Expr::Literal(_) | Expr::Ident(_) | Expr::Arrow { .. } | Expr::External { .. } => {}
        }
    }

    /// Exported symbols, members of exported symbols and literals are
    /// already expressible in metadata.
    fn should_lower(&self, expr: &Node<Expr>) -> bool {
        if expr.span.is_synthetic() || is_primitive(expr) {
            return false;
        }
        match &expr.value {
            Expr::Ident(id) => !self.exported.contains(&id.name) && !is_lowered_symbol(&id.name),
            Expr::Member { object, .. } => {
                !matches!(&object.value, Expr::Ident(id) if self.exported.contains(&id.name))
            }
            _ => true,
        }
    }
}

fn is_primitive(expr: &Node<Expr>) -> bool {
    match &expr.value {
        Expr::Literal(_) => true,
        Expr::Paren(inner) => is_primitive(inner),
        _ => false,
    }
}

/// Decorators of a class and of its members and parameters, in source
/// order.
fn decorators(class: &ClassDecl) -> Vec<&Node<Expr>> {
    let mut out: Vec<&Node<Expr>> = class.decorators.iter().collect();
    for member in &class.members {
        match &member.value {
            ClassMember::Constructor(ctor) => out.extend(ctor.params.iter().flat_map(|p| p.decorators.iter())),
            ClassMember::Method(method) => {
                out.extend(method.decorators.iter());
                out.extend(method.params.iter().flat_map(|p| p.decorators.iter()));
            }
            ClassMember::Property(prop) => out.extend(prop.decorators.iter()),
            ClassMember::Accessor(acc) => {
                out.extend(acc.decorators.iter());
                out.extend(acc.params.iter().flat_map(|p| p.decorators.iter()));
            }
        }
    }
    out
}

fn decorators_mut(class: &mut ClassDecl) -> Vec<&mut Node<Expr>> {
    let mut out: Vec<&mut Node<Expr>> = class.decorators.iter_mut().collect();
    for member in &mut class.members {
        match &mut member.value {
            ClassMember::Constructor(ctor) => {
                out.extend(ctor.params.iter_mut().flat_map(|p| p.decorators.iter_mut()))
            }
            ClassMember::Method(method) => {
                out.extend(method.decorators.iter_mut());
                out.extend(method.params.iter_mut().flat_map(|p| p.decorators.iter_mut()));
            }
            ClassMember::Property(prop) => out.extend(prop.decorators.iter_mut()),
            ClassMember::Accessor(acc) => {
                out.extend(acc.decorators.iter_mut());
                out.extend(acc.params.iter_mut().flat_map(|p| p.decorators.iter_mut()));
            }
        }
    }
    out
}

// ============================================================================
// Shared state
// ============================================================================

/// Lowering requests of every unit in a build, computed once per file and
/// shared by the source transform and the metadata transformer.
#[derive(Debug)]
pub struct LowerMetadataTransform {
    fields: BTreeSet<String>,
    requests: RefCell<HashMap<String, Rc<RequestMap>>>,
}

impl Default for LowerMetadataTransform {
    fn default() -> Self {
        Self::new(LOWER_FIELDS.iter().copied())
    }
}

impl LowerMetadataTransform {
    pub fn new<'f>(fields: impl IntoIterator<Item = &'f str>) -> Self {
        Self {
            fields: fields.into_iter().map(str::to_string).collect(),
            requests: RefCell::new(HashMap::new()),
        }
    }

    pub fn requests_for(&self, file: &SourceFile) -> Rc<RequestMap> {
        if let Some(requests) = self.requests.borrow().get(&file.file_name) {
            return requests.clone();
        }
        let requests = Rc::new(lowering_requests(file, &self.fields));
        if !requests.is_empty() {
            tracing::trace!(file = %file.file_name, count = requests.len(), "expressions to lower");
        }
        self.requests
            .borrow_mut()
            .insert(file.file_name.clone(), requests.clone());
        requests
    }
}

impl MetadataTransformer for LowerMetadataTransform {
    fn transform_member(&self, file: &SourceFile, name: &str, metadata: &mut Value) -> Result<(), TransformError> {
        let requests = self.requests_for(file);
        if requests.is_empty() {
            return Ok(());
        }
        match declaration_named(file, name) {
            Some(Declared::Class(class)) => {
                if let Some(entries) = metadata.get_mut("decorators").and_then(Value::as_array_mut) {
                    for (decorator, entry) in class.decorators.iter().zip(entries.iter_mut()) {
                        substitute(decorator, entry, &requests);
                    }
                }
            }
            Some(Declared::Var(var)) => {
                if let Some(init) = &var.init {
                    substitute(init, metadata, &requests);
                }
            }
            None => {}
        }
        Ok(())
    }
}

enum Declared<'f> {
    Class(&'f ClassDecl),
    Var(&'f VarDecl),
}

fn declaration_named<'f>(file: &'f SourceFile, name: &str) -> Option<Declared<'f>> {
    file.items.iter().find_map(|item| match &item.value {
        ModuleItem::Decl(Decl::Class(class)) | ModuleItem::Export(ExportDecl::Decl(Decl::Class(class)))
            if class.name.value.name == name =>
        {
            Some(Declared::Class(class))
        }
        ModuleItem::Decl(Decl::Var(var))
        | ModuleItem::Export(ExportDecl::Decl(Decl::Var(var)))
        | ModuleItem::Stmt(Stmt::Var(var))
            if var.name.value.name == name =>
        {
            Some(Declared::Var(var))
        }
        _ => None,
    })
}

/// Walk `expr` and its metadata `value` side by side, replacing the values
/// of lowered nodes with references to their bindings.
fn substitute(expr: &Node<Expr>, value: &mut Value, requests: &RequestMap) {
    if let Some(request) = lookup(requests, expr) {
        if value.is_object() || value.is_array() {
            *value = json!({ "__symbolic": "reference", "name": request.name });
        }
        return;
    }
    match &expr.value {
        Expr::Call { callee, args } | Expr::New { callee, args } => {
            if let Some(target) = value.get_mut("expression") {
                substitute(callee, target, requests);
            }
            if let Some(values) = value.get_mut("arguments").and_then(Value::as_array_mut) {
                substitute_elements(args, values, requests);
            }
        }
        Expr::Member { object, .. } => {
            if let Some(target) = value.get_mut("expression") {
                substitute(object, target, requests);
            }
        }
        Expr::Array(elements) => {
            if let Some(values) = value.as_array_mut() {
                substitute_elements(elements, values, requests);
            }
        }
        Expr::Object(props) => {
            let Some(entries) = value.as_object_mut() else {
                return;
            };
            for prop in props {
                if let ObjectProperty::KeyValue { key, value: prop_value } = prop {
                    if let Some(entry) = key.text().and_then(|k| entries.get_mut(&k)) {
                        substitute(prop_value, entry, requests);
                    }
                }
            }
        }
        Expr::Paren(inner) => substitute(inner, value, requests),
        _ => {}
    }
}

fn substitute_elements(exprs: &[Node<Expr>], values: &mut [Value], requests: &RequestMap) {
    for (expr, value) in exprs.iter().zip(values.iter_mut()) {
        // a spread shifts every later element
        if matches!(expr.value, Expr::Spread(_)) {
            break;
        }
        substitute(expr, value, requests);
    }
}

// ============================================================================
// Source transform
// ============================================================================

/// Hoists requested expressions into `const ɵN = ...;` bindings and exports
/// them at the end of the unit.
pub struct ExpressionLowering<'a> {
    lowering: &'a LowerMetadataTransform,
}

impl<'a> ExpressionLowering<'a> {
    pub fn new(lowering: &'a LowerMetadataTransform) -> Self {
        Self { lowering }
    }
}

impl SourceTransform for ExpressionLowering<'_> {
    fn name(&self) -> &'static str {
        "lower-expressions"
    }

    fn transform(
        &self,
        mut file: SourceFile,
        _ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        let requests = self.lowering.requests_for(&file);
        if requests.is_empty() {
            return Ok(file);
        }
        let mut rewriter = Rewriter {
            requests: &requests,
            hoisted: Vec::new(),
            aliases: Vec::new(),
            names: Vec::new(),
        };
        let mut items = Vec::with_capacity(file.items.len() + requests.len() + 1);
        for mut item in std::mem::take(&mut file.items) {
            rewriter.item(&mut item.value);
            items.extend(rewriter.hoisted.drain(..).map(|(name, value)| binding(name, value)));
            items.push(item);
            items.extend(rewriter.aliases.drain(..).map(|(name, value)| binding(name, value)));
        }
        if !rewriter.names.is_empty() {
            let specifiers = rewriter
                .names
                .iter()
                .map(|name| ExportSpecifier {
                    local: Ident::new(name.as_str()),
                    exported: None,
                })
                .collect();
            items.push(Node::synthetic(ModuleItem::Export(ExportDecl::Named {
                specifiers,
                source: None,
            })));
        }
        file.items = items;
        Ok(file)
    }
}

fn binding(name: String, value: Node<Expr>) -> Node<ModuleItem> {
    Node::synthetic(ModuleItem::Decl(Decl::Var(VarDecl {
        kind: VarKind::Const,
        name: Node::synthetic(Ident::new(name)),
        type_annotation: None,
        init: Some(value),
        is_declare: false,
    })))
}

struct Rewriter<'r> {
    requests: &'r RequestMap,
    /// Bindings that go before the current item
    hoisted: Vec<(String, Node<Expr>)>,
    /// Bindings that go after it
    aliases: Vec<(String, Node<Expr>)>,
    names: Vec<String>,
}

impl Rewriter<'_> {
    fn item(&mut self, item: &mut ModuleItem) {
        match item {
            ModuleItem::Decl(decl) | ModuleItem::Export(ExportDecl::Decl(decl)) => match decl {
                Decl::Class(class) => {
                    for decorator in decorators_mut(class) {
                        self.visit(decorator);
                    }
                }
                Decl::Var(var) => self.var(var),
                _ => {}
            },
            ModuleItem::Stmt(Stmt::Var(var)) => self.var(var),
            ModuleItem::Stmt(Stmt::Expr(expr)) => self.visit(expr),
            _ => {}
        }
    }

    fn var(&mut self, var: &mut VarDecl) {
        if let Some(init) = &mut var.init {
            self.visit(init);
        }
    }

    fn visit(&mut self, expr: &mut Node<Expr>) {
        if let Some(request) = lookup(self.requests, expr) {
            let name = request.name.clone();
            match &request.initializer_of {
                Some(var) => self.aliases.push((name.clone(), Node::synthetic(Expr::ident(var.as_str())))),
                None => {
                    let value = std::mem::replace(expr, Node::synthetic(Expr::ident(name.as_str())));
                    self.hoisted.push((name.clone(), value));
                }
            }
            self.names.push(name);
            return;
        }
        match &mut expr.value {
            Expr::Call { callee, args } | Expr::New { callee, args } => {
                self.visit(callee);
                args.iter_mut().for_each(|arg| self.visit(arg));
            }
            Expr::Member { object, .. } => self.visit(object),
            Expr::Array(elements) => elements.iter_mut().for_each(|e| self.visit(e)),
            Expr::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectProperty::KeyValue { value, .. } | ObjectProperty::Spread(value) => self.visit(value),
                        ObjectProperty::Shorthand(_) => {}
                    }
                }
            }
            Expr::Paren(inner) | Expr::Spread(inner) => self.visit(inner),
            Expr::Literal(_) | Expr::Ident(_) | Expr::Arrow { .. } | Expr::External { .. } => {}
        }
    }
}
