//! Read-only traversal over module items

use std::collections::BTreeSet;

use crate::*;

/// Module names referenced through `Expr::External` anywhere in `items`.
pub fn collect_external_references(items: &[Node<ModuleItem>]) -> BTreeSet<String> {
    external_modules_in_order(items).into_iter().collect()
}

/// Same as [`collect_external_references`], deduplicated in first-use order.
pub fn external_modules_in_order(items: &[Node<ModuleItem>]) -> Vec<String> {
    let mut seen = Vec::new();
    walk_items(items, &mut |expr| {
        if let Expr::External { module, .. } = expr {
            if !seen.contains(module) {
                seen.push(module.clone());
            }
        }
    });
    seen
}

/// Call `f` on every expression in `items`, parents before children.
pub fn walk_items(items: &[Node<ModuleItem>], f: &mut dyn FnMut(&Expr)) {
    for item in items {
        match &item.value {
            ModuleItem::Import(_) => {}
            ModuleItem::Export(ExportDecl::Decl(decl)) | ModuleItem::Decl(decl) => walk_decl(decl, f),
            ModuleItem::Export(_) => {}
            ModuleItem::Stmt(stmt) => walk_stmt(stmt, f),
        }
    }
}

fn walk_decl(decl: &Decl, f: &mut dyn FnMut(&Expr)) {
    match decl {
        Decl::Function(func) => {
            walk_params(&func.params, f);
            if let Some(body) = &func.body {
                walk_block(body, f);
            }
        }
        Decl::Class(class) => {
            walk_exprs(&class.decorators, f);
            if let Some(base) = &class.extends {
                walk_expr(base, f);
            }
            for member in &class.members {
                walk_member(&member.value, f);
            }
        }
        Decl::Var(var) => walk_var(var, f),
        Decl::Enum(e) => {
            for member in &e.members {
                if let Some(init) = &member.init {
                    walk_expr(init, f);
                }
            }
        }
        Decl::Interface(_) | Decl::TypeAlias(_) => {}
    }
}

fn walk_member(member: &ClassMember, f: &mut dyn FnMut(&Expr)) {
    walk_exprs(member.decorators(), f);
    if let Some(PropertyName::Computed(key)) = member.name() {
        walk_expr(key, f);
    }
    match member {
        ClassMember::Constructor(ctor) => {
            walk_params(&ctor.params, f);
            if let Some(body) = &ctor.body {
                walk_block(body, f);
            }
        }
        ClassMember::Method(method) => {
            walk_params(&method.params, f);
            if let Some(body) = &method.body {
                walk_block(body, f);
            }
        }
        ClassMember::Property(prop) => {
            if let Some(init) = &prop.init {
                walk_expr(init, f);
            }
        }
        ClassMember::Accessor(acc) => {
            walk_params(&acc.params, f);
            if let Some(body) = &acc.body {
                walk_block(body, f);
            }
        }
    }
}

fn walk_params(params: &[Param], f: &mut dyn FnMut(&Expr)) {
    for param in params {
        walk_exprs(&param.decorators, f);
    }
}

fn walk_block(block: &BlockStmt, f: &mut dyn FnMut(&Expr)) {
    for stmt in &block.stmts {
        walk_stmt(&stmt.value, f);
    }
}

fn walk_stmt(stmt: &Stmt, f: &mut dyn FnMut(&Expr)) {
    match stmt {
        Stmt::Expr(e) => walk_expr(e, f),
        Stmt::Return(Some(e)) => walk_expr(e, f),
        Stmt::Return(None) => {}
        Stmt::Var(var) => walk_var(var, f),
    }
}

fn walk_var(var: &VarDecl, f: &mut dyn FnMut(&Expr)) {
    if let Some(init) = &var.init {
        walk_expr(init, f);
    }
}

fn walk_exprs(exprs: &[Node<Expr>], f: &mut dyn FnMut(&Expr)) {
    for e in exprs {
        walk_expr(e, f);
    }
}

pub fn walk_expr(expr: &Node<Expr>, f: &mut dyn FnMut(&Expr)) {
    f(&expr.value);
    match &expr.value {
        Expr::Literal(_) | Expr::Ident(_) | Expr::External { .. } => {}
        Expr::Call { callee, args } | Expr::New { callee, args } => {
            walk_expr(callee, f);
            walk_exprs(args, f);
        }
        Expr::Member { object, .. } => walk_expr(object, f),
        Expr::Array(elements) => walk_exprs(elements, f),
        Expr::Object(props) => {
            for prop in props {
                match prop {
                    ObjectProperty::KeyValue { key, value } => {
                        if let PropertyName::Computed(k) = key {
                            walk_expr(k, f);
                        }
                        walk_expr(value, f);
                    }
                    ObjectProperty::Shorthand(_) => {}
                    ObjectProperty::Spread(e) => walk_expr(e, f),
                }
            }
        }
        Expr::Arrow { body, .. } => walk_expr(body, f),
        Expr::Paren(inner) | Expr::Spread(inner) => walk_expr(inner, f),
    }
}
