//! Decorator lowering
//!
//! Rewrites classes so that framework decorators become static data:
//!
//! ```text
//! @Component({..})                    class Cmp {
//! class Cmp {                           constructor(dep: Dep) {}
//!   constructor(@Inject(T) dep: Dep)    static decorators = [{ type: Component, args: [{..}] }];
//!   @Input() name: string;      =>      static ctorParameters = () => [{ type: Dep, decorators: [..] }];
//! }                                     static propDecorators = { name: [{ type: Input }] };
//!                                     }
//! ```
//!
//! Decorators that do not come from the framework core are left in place.

use annex_ast::*;

use crate::reflection::{decorator_import, SymbolDeclaration};
use crate::{SourceTransform, TransformContext, TransformError, CORE_MODULE};

/// Lowers framework decorators into `decorators`, `ctorParameters` and
/// `propDecorators` static members.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoratorLowering {
    /// The program is the framework core; every decorator qualifies
    pub is_core: bool,
    /// Mark `ctorParameters` with `@nocollapse`
    pub closure_annotations: bool,
    /// Keep class decorators as written (constructor metadata is still
    /// captured)
    pub skip_class_decorators: bool,
}

/// Constructor parameter as seen by the lowering.
struct ParamInfo {
    decorators: Vec<Node<Expr>>,
    ty: Option<Node<Type>>,
}

impl SourceTransform for DecoratorLowering {
    fn name(&self) -> &'static str {
        "lower-decorators"
    }

    fn transform(
        &self,
        mut file: SourceFile,
        ctx: &mut TransformContext<'_>,
    ) -> Result<SourceFile, TransformError> {
        for idx in 0..file.items.len() {
            let Some(class) = file.items[idx].value.class() else {
                continue;
            };
            let lowered = self.lower_class(&file, class, ctx);
            if let Some(slot) = file.items[idx].value.class_mut() {
                *slot = lowered;
            }
        }
        Ok(file)
    }
}

impl DecoratorLowering {
    fn is_framework_decorator(&self, file: &SourceFile, decorator: &Node<Expr>) -> bool {
        self.is_core
            || decorator_import(file, &decorator.value).is_some_and(|import| import.from == CORE_MODULE)
    }

    fn lower_class(
        &self,
        file: &SourceFile,
        class: &ClassDecl,
        ctx: &mut TransformContext<'_>,
    ) -> ClassDecl {
        let mut members = Vec::with_capacity(class.members.len() + 3);
        let mut decorated_members: Vec<(String, Vec<Node<Expr>>)> = Vec::new();
        let mut ctor_params: Option<Vec<ParamInfo>> = None;

        for member in &class.members {
            match &member.value {
                ClassMember::Constructor(ctor) => {
                    if ctor.body.is_none() {
                        members.push(member.clone());
                        continue;
                    }
                    let (ctor, params) = self.lower_constructor(file, ctor);
                    ctor_params = Some(params);
                    members.push(Node::new(ClassMember::Constructor(ctor), member.span));
                }
                _ => {
                    let (keep, lower): (Vec<_>, Vec<_>) = member
                        .value
                        .decorators()
                        .iter()
                        .cloned()
                        .partition(|d| !self.is_framework_decorator(file, d));
                    if lower.is_empty() {
                        members.push(member.clone());
                        continue;
                    }
                    let Some(name) = member.value.name().and_then(|n| n.as_ident()) else {
                        ctx.diagnostics.push(located_error(
                            file,
                            member.span,
                            "Cannot process decorators for class element with non-analyzable name.",
                        ));
                        members.push(member.clone());
                        continue;
                    };
                    let name = name.to_string();
                    let mut stripped = member.clone();
                    if let Some(decorators) = stripped.value.decorators_mut() {
                        *decorators = keep;
                    }
                    members.push(stripped);
                    // Accessor pairs share one entry; the later one wins.
                    match decorated_members.iter_mut().find(|(n, _)| *n == name) {
                        Some(entry) => entry.1 = lower,
                        None => decorated_members.push((name, lower)),
                    }
                }
            }
        }

        let mut kept_class_decorators = Vec::new();
        let mut lowered_class_decorators = Vec::new();
        let mut has_framework_decorator = false;
        for decorator in &class.decorators {
            if self.is_framework_decorator(file, decorator) {
                has_framework_decorator = true;
                if !self.skip_class_decorators {
                    lowered_class_decorators.push(extract_metadata(file, decorator, ctx));
                    continue;
                }
            }
            kept_class_decorators.push(decorator.clone());
        }

        if !lowered_class_decorators.is_empty() {
            members.push(static_property(
                "decorators",
                decorator_invocation_type(),
                Expr::Array(lowered_class_decorators),
                None,
            ));
        }

        if let Some(params) = ctor_params {
            if has_framework_decorator || params.iter().any(|p| !p.decorators.is_empty()) {
                members.push(self.ctor_parameters_property(file, params, ctx));
            }
        }

        if !decorated_members.is_empty() {
            members.push(prop_decorators_property(file, decorated_members, ctx));
        }

        tracing::trace!(class = %class.name.value, members = members.len(), "lowered class decorators");

        ClassDecl {
            name: class.name.clone(),
            extends: class.extends.clone(),
            members,
            decorators: kept_class_decorators,
            is_declare: class.is_declare,
        }
    }

    fn lower_constructor(
        &self,
        file: &SourceFile,
        ctor: &ConstructorMember,
    ) -> (ConstructorMember, Vec<ParamInfo>) {
        let mut params = Vec::with_capacity(ctor.params.len());
        let mut infos = Vec::with_capacity(ctor.params.len());
        for param in &ctor.params {
            let (keep, lower): (Vec<_>, Vec<_>) = param
                .decorators
                .iter()
                .cloned()
                .partition(|d| !self.is_framework_decorator(file, d));
            infos.push(ParamInfo {
                decorators: lower,
                ty: param.type_annotation.clone(),
            });
            params.push(Param {
                decorators: keep,
                ..param.clone()
            });
        }
        (
            ConstructorMember {
                params,
                body: ctor.body.clone(),
            },
            infos,
        )
    }

    fn ctor_parameters_property(
        &self,
        file: &SourceFile,
        params: Vec<ParamInfo>,
        ctx: &mut TransformContext<'_>,
    ) -> Node<ClassMember> {
        let mut entries = Vec::with_capacity(params.len());
        for param in params {
            if param.ty.is_none() && param.decorators.is_empty() {
                entries.push(Node::synthetic(Expr::Literal(Literal::Null)));
                continue;
            }
            let ty = param
                .ty
                .as_ref()
                .and_then(|ty| type_to_value(file, ty, ctx))
                .unwrap_or_else(|| Node::synthetic(Expr::ident("undefined")));
            let mut props = vec![ObjectProperty::key_value("type", ty)];
            if !param.decorators.is_empty() {
                let decorators = param
                    .decorators
                    .iter()
                    .map(|d| extract_metadata(file, d, ctx))
                    .collect();
                props.push(ObjectProperty::key_value(
                    "decorators",
                    Node::synthetic(Expr::Array(decorators)),
                ));
            }
            entries.push(Node::synthetic(Expr::Object(props)));
        }

        let initializer = Expr::Arrow {
            params: Vec::new(),
            body: Box::new(Node::synthetic(Expr::Array(entries))),
        };
        let comment = self.closure_annotations.then(|| "* @nocollapse ".to_string());
        static_property("ctorParameters", ctor_parameters_type(), initializer, comment)
    }
}

fn prop_decorators_property(
    file: &SourceFile,
    decorated: Vec<(String, Vec<Node<Expr>>)>,
    ctx: &mut TransformContext<'_>,
) -> Node<ClassMember> {
    let entries = decorated
        .into_iter()
        .map(|(name, decorators)| {
            let records = decorators.iter().map(|d| extract_metadata(file, d, ctx)).collect();
            ObjectProperty::key_value(name, Node::synthetic(Expr::Array(records)))
        })
        .collect();
    let ty = Type::Object(vec![TypeMember::IndexSignature {
        key_name: Ident::new("key"),
        key_type: Node::synthetic(Type::Keyword(KeywordType::String)),
        value_type: Node::synthetic(decorator_invocation_type()),
    }]);
    static_property("propDecorators", ty, Expr::Object(entries), None)
}

/// `{ type: <callee>, args?: [..] }` for one decorator.
fn extract_metadata(
    file: &SourceFile,
    decorator: &Node<Expr>,
    ctx: &mut TransformContext<'_>,
) -> Node<Expr> {
    let mut props = Vec::new();
    match &decorator.value {
        Expr::Ident(_) => props.push(ObjectProperty::key_value("type", decorator.clone())),
        Expr::Call { callee, args } => {
            props.push(ObjectProperty::key_value("type", (**callee).clone()));
            if !args.is_empty() {
                props.push(ObjectProperty::key_value(
                    "args",
                    Node::synthetic(Expr::Array(args.clone())),
                ));
            }
        }
        other => {
            let message = format!(
                "{} not implemented in gathering decorator metadata.",
                other.kind_name()
            );
            ctx.diagnostics.push(located_error(file, decorator.span, &message));
        }
    }
    Node::synthetic(Expr::Object(props))
}

/// Runtime value expression for a parameter type, if the type has one.
fn type_to_value(
    file: &SourceFile,
    ty: &Node<Type>,
    ctx: &mut TransformContext<'_>,
) -> Option<Node<Expr>> {
    let ident = |name: &str| Some(Node::synthetic(Expr::ident(name)));
    match &ty.value {
        Type::Function(_) | Type::Constructor(_) => ident("Function"),
        Type::Array(_) | Type::Tuple(_) => ident("Array"),
        Type::Predicate { .. }
        | Type::Keyword(KeywordType::Boolean)
        | Type::Literal(LiteralType::Boolean(_)) => ident("Boolean"),
        Type::Keyword(KeywordType::String) | Type::Literal(LiteralType::String(_)) => {
            ident("String")
        }
        Type::Keyword(KeywordType::Object) => ident("Object"),
        Type::Keyword(KeywordType::Number) | Type::Literal(LiteralType::Number(_)) => {
            ident("Number")
        }
        Type::TypeRef { name, .. } => entity_name_to_value(file, name, ctx),
        Type::Union(members) => {
            let mut concrete = members.iter().filter(|t| !is_nullish(t));
            match (concrete.next(), concrete.next()) {
                (Some(only), None) => type_to_value(file, only, ctx),
                _ => None,
            }
        }
        Type::Paren(inner) => type_to_value(file, inner, ctx),
        _ => None,
    }
}

fn is_nullish(ty: &Node<Type>) -> bool {
    matches!(
        ty.value,
        Type::Literal(LiteralType::Null) | Type::Keyword(KeywordType::Undefined)
    )
}

fn entity_name_to_value(
    file: &SourceFile,
    name: &EntityName,
    ctx: &mut TransformContext<'_>,
) -> Option<Node<Expr>> {
    let symbol = ctx.symbols.resolve_entity(file, name)?;
    if !symbol.is_runtime_value() {
        return None;
    }
    match name {
        EntityName::Qualified { left, right } => {
            let container = entity_name_to_value(file, left, ctx)?;
            Some(Node::synthetic(Expr::Member {
                object: Box::new(container),
                property: right.clone(),
            }))
        }
        EntityName::Ident(id) => {
            if let Some(SymbolDeclaration::AliasImport { local_name, .. }) = symbol.declarations.first()
            {
                ctx.retained_imports.insert(local_name.clone());
                return Some(Node::synthetic(Expr::ident(local_name.clone())));
            }
            Some(Node::synthetic(Expr::Ident(id.clone())))
        }
    }
}

// ============================================================================
// Synthesized members and types
// ============================================================================

fn static_property(
    name: &str,
    ty: Type,
    init: Expr,
    leading_comment: Option<String>,
) -> Node<ClassMember> {
    Node::synthetic(ClassMember::Property(PropertyMember {
        name: PropertyName::ident(name),
        type_annotation: Some(Node::synthetic(ty)),
        init: Some(Node::synthetic(init)),
        is_static: true,
        decorators: Vec::new(),
        leading_comment,
    }))
}

fn optional_prop(name: &str, ty: Type) -> TypeMember {
    TypeMember::Property {
        name: PropertyName::ident(name),
        ty: Node::synthetic(ty),
        optional: true,
    }
}

fn required_prop(name: &str, ty: Type) -> TypeMember {
    TypeMember::Property {
        name: PropertyName::ident(name),
        ty: Node::synthetic(ty),
        optional: false,
    }
}

/// `{ type: Function, args?: any[] }[]`
fn decorator_invocation_type() -> Type {
    Type::Array(Box::new(Node::synthetic(Type::Object(vec![
        required_prop("type", Type::type_ref("Function")),
        optional_prop(
            "args",
            Type::Array(Box::new(Node::synthetic(Type::Keyword(KeywordType::Any)))),
        ),
    ]))))
}

/// `() => ({ type: any, decorators?: { type: Function, args?: any[] }[] } | null)[]`
fn ctor_parameters_type() -> Type {
    let entry = Type::Union(vec![
        Node::synthetic(Type::Object(vec![
            required_prop("type", Type::Keyword(KeywordType::Any)),
            optional_prop("decorators", decorator_invocation_type()),
        ])),
        Node::synthetic(Type::Literal(LiteralType::Null)),
    ]);
    Type::Function(FunctionType {
        params: Vec::new(),
        return_type: Box::new(Node::synthetic(Type::Array(Box::new(Node::synthetic(entry))))),
    })
}

fn located_error(file: &SourceFile, span: Span, message: &str) -> Diagnostic {
    Diagnostic::error(message, 0).with_location(
        DiagnosticFile {
            file_name: file.file_name.clone(),
            text: file.text.clone(),
        },
        span.start,
        span.len(),
    )
}
