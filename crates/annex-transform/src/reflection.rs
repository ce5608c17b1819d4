//! Symbol and import reflection used by the transforms

use annex_ast::*;

/// Import a decorator (or any identifier) was bound through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorImport {
    /// Exported name in the source module
    pub name: String,
    /// Module specifier of the import
    pub from: String,
}

/// Resolve the import behind a decorator expression: `@Foo`, `@Foo(..)`,
/// `@ns.Foo` or `@ns.Foo(..)`.
pub fn decorator_import(file: &SourceFile, decorator: &Expr) -> Option<DecoratorImport> {
    let target = match decorator {
        Expr::Call { callee, .. } => &callee.value,
        other => other,
    };
    match target {
        Expr::Ident(id) => import_of_identifier(file, &id.name),
        Expr::Member { object, property } => match &object.value {
            Expr::Ident(ns) => file.imports().find_map(|import| {
                import.specifiers.iter().find_map(|spec| match spec {
                    ImportSpecifier::Namespace(local) if local.name == ns.name => {
                        Some(DecoratorImport {
                            name: property.name.clone(),
                            from: import.source.clone(),
                        })
                    }
                    _ => None,
                })
            }),
            _ => None,
        },
        _ => None,
    }
}

/// Named import that binds `local` in `file`.
pub fn import_of_identifier(file: &SourceFile, local: &str) -> Option<DecoratorImport> {
    file.imports().find_map(|import| {
        import.specifiers.iter().find_map(|spec| match spec {
            ImportSpecifier::Named { imported, .. } if spec.local_name() == local => {
                Some(DecoratorImport {
                    name: imported.name.clone(),
                    from: import.source.clone(),
                })
            }
            _ => None,
        })
    })
}

// ============================================================================
// Symbols
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolFlags {
    /// The symbol has a value meaning
    pub value: bool,
    /// The value is a `const enum`, which does not exist at runtime
    pub const_enum: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolDeclaration {
    /// Binding introduced by an import clause
    AliasImport {
        local_name: String,
        module: String,
    },
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub flags: SymbolFlags,
    /// Flags of the target when the symbol is an import alias
    pub aliased: Option<SymbolFlags>,
    pub declarations: Vec<SymbolDeclaration>,
}

impl SymbolInfo {
    /// Whether an expression naming this symbol evaluates to something at
    /// runtime.
    pub fn is_runtime_value(&self) -> bool {
        let flags = self.aliased.unwrap_or(self.flags);
        flags.value && !flags.const_enum && !self.declarations.is_empty()
    }
}

/// Type-checker query used by annotation lowering.
pub trait SymbolResolver {
    fn resolve_entity(&self, file: &SourceFile, name: &EntityName) -> Option<SymbolInfo>;
}

/// Resolver that only looks at the declarations and imports of the file
/// itself. Imported symbols are assumed to be values unless the import is
/// type-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSymbolTable;

impl SymbolResolver for LocalSymbolTable {
    fn resolve_entity(&self, file: &SourceFile, name: &EntityName) -> Option<SymbolInfo> {
        match name {
            EntityName::Ident(id) => resolve_local(file, &id.name),
            EntityName::Qualified { left, .. } => {
                // Members of a namespace are only reachable through the
                // namespace itself.
                let container = self.resolve_entity(file, left)?;
                container.is_runtime_value().then(|| SymbolInfo {
                    flags: SymbolFlags {
                        value: true,
                        const_enum: false,
                    },
                    aliased: None,
                    declarations: vec![SymbolDeclaration::Local],
                })
            }
        }
    }
}

fn resolve_local(file: &SourceFile, name: &str) -> Option<SymbolInfo> {
    for import in file.imports() {
        for spec in &import.specifiers {
            if spec.local_name() != name {
                continue;
            }
            let type_only = import.type_only
                || matches!(spec, ImportSpecifier::Named { type_only: true, .. });
            let target = SymbolFlags {
                value: !type_only,
                const_enum: false,
            };
            return Some(SymbolInfo {
                flags: SymbolFlags::default(),
                aliased: Some(target),
                declarations: vec![SymbolDeclaration::AliasImport {
                    local_name: name.to_string(),
                    module: import.source.clone(),
                }],
            });
        }
    }

    let decl = file
        .items
        .iter()
        .filter_map(|item| item.value.decl())
        .find(|decl| decl.name() == name)?;
    let flags = match decl {
        Decl::Class(_) | Decl::Function(_) | Decl::Var(_) => SymbolFlags {
            value: true,
            const_enum: false,
        },
        Decl::Enum(e) => SymbolFlags {
            value: true,
            const_enum: e.is_const,
        },
        Decl::Interface(_) | Decl::TypeAlias(_) => SymbolFlags::default(),
    };
    Some(SymbolInfo {
        flags,
        aliased: None,
        declarations: vec![SymbolDeclaration::Local],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(items: Vec<ModuleItem>) -> SourceFile {
        let mut file = SourceFile::new("/app/a.ts", "");
        file.items = items.into_iter().map(Node::synthetic).collect();
        file
    }

    fn named_import(name: &str, from: &str) -> ModuleItem {
        ModuleItem::Import(ImportDecl {
            specifiers: vec![ImportSpecifier::Named {
                imported: Ident::new(name),
                local: None,
                type_only: false,
            }],
            source: from.into(),
            type_only: false,
        })
    }

    #[test]
    fn test_decorator_import_named_and_namespace() {
        let file = file_with(vec![
            named_import("Component", "@annex/core"),
            ModuleItem::Import(ImportDecl {
                specifiers: vec![ImportSpecifier::Namespace(Ident::new("core"))],
                source: "@annex/core".into(),
                type_only: false,
            }),
        ]);
        let call = Expr::Call {
            callee: Box::new(Node::synthetic(Expr::ident("Component"))),
            args: vec![],
        };
        assert_eq!(
            decorator_import(&file, &call),
            Some(DecoratorImport {
                name: "Component".into(),
                from: "@annex/core".into()
            })
        );
        let member = Expr::Member {
            object: Box::new(Node::synthetic(Expr::ident("core"))),
            property: Ident::new("Input"),
        };
        assert_eq!(decorator_import(&file, &member).map(|i| i.name), Some("Input".into()));
        assert_eq!(decorator_import(&file, &Expr::ident("Unknown")), None);
    }

    #[test]
    fn test_local_symbols() {
        let file = file_with(vec![
            named_import("Dep", "./dep"),
            ModuleItem::Decl(Decl::Interface(InterfaceDecl {
                name: Node::synthetic(Ident::new("Shape")),
                members: vec![],
                is_declare: false,
            })),
            ModuleItem::Decl(Decl::Enum(EnumDecl {
                name: Node::synthetic(Ident::new("Mode")),
                members: vec![],
                is_const: true,
                is_declare: false,
            })),
        ]);
        let table = LocalSymbolTable;
        let dep = table.resolve_entity(&file, &EntityName::ident("Dep")).unwrap();
        assert!(dep.is_runtime_value());
        assert!(matches!(dep.declarations[0], SymbolDeclaration::AliasImport { .. }));
        let shape = table.resolve_entity(&file, &EntityName::ident("Shape")).unwrap();
        assert!(!shape.is_runtime_value());
        let mode = table.resolve_entity(&file, &EntityName::ident("Mode")).unwrap();
        assert!(!mode.is_runtime_value());
        assert!(table.resolve_entity(&file, &EntityName::ident("Nope")).is_none());
    }
}
