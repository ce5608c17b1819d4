//! TypeScript printer.
//!
//! Renders a list of module items back to source text. Every node that
//! carries a real span leaves a [`LineMark`] at the position where its text
//! starts, so positions in the printed output can be mapped back to the
//! template or metadata the node was generated from.
//!
//! `Expr::External` references are printed as `iN.name`, with one
//! `import * as iN from "module";` line per module hoisted to the top.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::*;

/// Start of a spanned node in printed output (zero-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMark {
    pub line: usize,
    pub column: usize,
    pub span: Span,
}

/// Printed text together with the position marks of spanned nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrintedModule {
    pub text: String,
    pub marks: Vec<LineMark>,
}

/// Print a whole source file, including its header comment.
pub fn print_source_file(file: &SourceFile) -> PrintedModule {
    let mut printer = Printer::new(&file.items);
    if let Some(comment) = &file.header_comment {
        printer.comment(comment);
        printer.newline();
    }
    printer.finish(&file.items)
}

/// Print module items.
pub fn print_items(items: &[Node<ModuleItem>]) -> PrintedModule {
    Printer::new(items).finish(items)
}

// ============================================================================
// Printer state
// ============================================================================

struct Printer {
    out: String,
    line: usize,
    column: usize,
    indent: usize,
    marks: Vec<LineMark>,
    /// Hoisted namespace imports in first-use order: (module, alias)
    hoisted: Vec<(String, String)>,
    aliases: BTreeMap<String, String>,
}

impl Printer {
    fn new(items: &[Node<ModuleItem>]) -> Self {
        let hoisted: Vec<(String, String)> = crate::visit::external_modules_in_order(items)
            .into_iter()
            .enumerate()
            .map(|(i, module)| (module, format!("i{}", i)))
            .collect();
        let aliases = hoisted.iter().cloned().collect();
        Self {
            out: String::new(),
            line: 0,
            column: 0,
            indent: 0,
            marks: Vec::new(),
            hoisted,
            aliases,
        }
    }

    fn finish(mut self, items: &[Node<ModuleItem>]) -> PrintedModule {
        for (module, alias) in std::mem::take(&mut self.hoisted) {
            self.write(&format!("import * as {} from {};", alias, quote(&module)));
            self.newline();
        }
        for item in items {
            self.item(item);
            self.newline();
        }
        PrintedModule {
            text: self.out,
            marks: self.marks,
        }
    }

    fn write(&mut self, s: &str) {
        if self.column == 0 && !s.is_empty() && self.indent > 0 {
            let pad = "    ".repeat(self.indent);
            self.out.push_str(&pad);
            self.column = pad.len();
        }
        for ch in s.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf8();
            }
        }
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.line += 1;
        self.column = 0;
    }

    fn mark(&mut self, span: Span) {
        if span.is_synthetic() {
            return;
        }
        let column = if self.column == 0 { self.indent * 4 } else { self.column };
        self.marks.push(LineMark {
            line: self.line,
            column,
            span,
        });
    }

    fn comment(&mut self, text: &str) {
        self.write(&format!("/*{}*/", text));
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    fn item(&mut self, item: &Node<ModuleItem>) {
        self.mark(item.span);
        match &item.value {
            ModuleItem::Import(import) => self.import(import),
            ModuleItem::Export(export) => self.export(export),
            ModuleItem::Decl(decl) => self.decl(decl),
            ModuleItem::Stmt(stmt) => self.stmt(stmt),
        }
    }

    fn import(&mut self, import: &ImportDecl) {
        let mut s = String::from("import ");
        if import.type_only {
            s.push_str("type ");
        }
        let mut clauses = Vec::new();
        let mut named = Vec::new();
        for spec in &import.specifiers {
            match spec {
                ImportSpecifier::Default(id) => clauses.push(id.name.clone()),
                ImportSpecifier::Namespace(id) => clauses.push(format!("* as {}", id)),
                ImportSpecifier::Named { imported, local, type_only } => {
                    let mut n = String::new();
                    if *type_only {
                        n.push_str("type ");
                    }
                    n.push_str(&imported.name);
                    if let Some(local) = local {
                        let _ = write!(n, " as {}", local);
                    }
                    named.push(n);
                }
            }
        }
        if !named.is_empty() {
            clauses.push(format!("{{ {} }}", named.join(", ")));
        }
        if clauses.is_empty() {
            let _ = write!(s, "{};", quote(&import.source));
        } else {
            let _ = write!(s, "{} from {};", clauses.join(", "), quote(&import.source));
        }
        self.write(&s);
    }

    fn export(&mut self, export: &ExportDecl) {
        match export {
            ExportDecl::Named { specifiers, source } => {
                let specs: Vec<String> = specifiers
                    .iter()
                    .map(|s| match &s.exported {
                        Some(exported) => format!("{} as {}", s.local, exported),
                        None => s.local.name.clone(),
                    })
                    .collect();
                let mut s = format!("export {{ {} }}", specs.join(", "));
                if let Some(source) = source {
                    let _ = write!(s, " from {}", quote(source));
                }
                s.push(';');
                self.write(&s);
            }
            ExportDecl::All { source } => {
                self.write(&format!("export * from {};", quote(source)));
            }
            ExportDecl::Decl(decl) => {
                if let Decl::Class(class) = decl {
                    self.decorators_on_lines(&class.decorators);
                    self.write("export ");
                    self.class_body(class);
                } else {
                    self.write("export ");
                    self.decl(decl);
                }
            }
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Class(class) => {
                self.decorators_on_lines(&class.decorators);
                self.class_body(class);
            }
            Decl::Function(func) => {
                if func.is_declare {
                    self.write("declare ");
                }
                self.write(&format!("function {}(", func.name.value));
                self.params(&func.params);
                self.write(")");
                self.return_annotation(func.return_type.as_ref());
                self.body_or_semicolon(func.body.as_ref());
            }
            Decl::Var(var) => {
                self.var(var);
            }
            Decl::Interface(iface) => {
                if iface.is_declare {
                    self.write("declare ");
                }
                self.write(&format!("interface {} ", iface.name.value));
                self.type_members(&iface.members);
            }
            Decl::TypeAlias(alias) => {
                if alias.is_declare {
                    self.write("declare ");
                }
                self.write(&format!("type {} = ", alias.name.value));
                self.ty(&alias.ty);
                self.write(";");
            }
            Decl::Enum(e) => {
                if e.is_declare {
                    self.write("declare ");
                }
                if e.is_const {
                    self.write("const ");
                }
                self.write(&format!("enum {} {{", e.name.value));
                for (i, member) in e.members.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                    }
                    self.write(&format!(" {}", member.name.value));
                    if let Some(init) = &member.init {
                        self.write(" = ");
                        self.expr(init);
                    }
                }
                self.write(" }");
            }
        }
    }

    fn var(&mut self, var: &VarDecl) {
        if var.is_declare {
            self.write("declare ");
        }
        self.write(&format!("{} {}", var.kind, var.name.value));
        if let Some(ty) = &var.type_annotation {
            self.write(": ");
            self.ty(ty);
        }
        if let Some(init) = &var.init {
            self.write(" = ");
            self.expr(init);
        }
        self.write(";");
    }

    fn decorators_on_lines(&mut self, decorators: &[Node<Expr>]) {
        for decorator in decorators {
            self.write("@");
            self.expr(decorator);
            self.newline();
        }
    }

    fn class_body(&mut self, class: &ClassDecl) {
        if class.is_declare {
            self.write("declare ");
        }
        self.write(&format!("class {}", class.name.value));
        if let Some(base) = &class.extends {
            self.write(" extends ");
            self.expr(base);
        }
        self.write(" {");
        self.indent += 1;
        for member in &class.members {
            self.newline();
            self.mark(member.span);
            self.member(&member.value);
        }
        self.indent -= 1;
        if !class.members.is_empty() {
            self.newline();
        }
        self.write("}");
    }

    fn member(&mut self, member: &ClassMember) {
        match member {
            ClassMember::Constructor(ctor) => {
                self.write("constructor(");
                self.params(&ctor.params);
                self.write(")");
                self.body_or_semicolon(ctor.body.as_ref());
            }
            ClassMember::Method(method) => {
                self.decorators_on_lines(&method.decorators);
                if method.is_static {
                    self.write("static ");
                }
                self.property_name(&method.name);
                self.write("(");
                self.params(&method.params);
                self.write(")");
                self.return_annotation(method.return_type.as_ref());
                self.body_or_semicolon(method.body.as_ref());
            }
            ClassMember::Property(prop) => {
                if let Some(comment) = &prop.leading_comment {
                    self.comment(comment);
                    self.newline();
                }
                self.decorators_on_lines(&prop.decorators);
                if prop.is_static {
                    self.write("static ");
                }
                self.property_name(&prop.name);
                if let Some(ty) = &prop.type_annotation {
                    self.write(": ");
                    self.ty(ty);
                }
                if let Some(init) = &prop.init {
                    self.write(" = ");
                    self.expr(init);
                }
                self.write(";");
            }
            ClassMember::Accessor(acc) => {
                self.decorators_on_lines(&acc.decorators);
                if acc.is_static {
                    self.write("static ");
                }
                self.write(match acc.kind {
                    AccessorKind::Get => "get ",
                    AccessorKind::Set => "set ",
                });
                self.property_name(&acc.name);
                self.write("(");
                self.params(&acc.params);
                self.write(")");
                self.return_annotation(acc.type_annotation.as_ref());
                self.body_or_semicolon(acc.body.as_ref());
            }
        }
    }

    fn params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            for decorator in &param.decorators {
                self.write("@");
                self.expr(decorator);
                self.write(" ");
            }
            if let Some(access) = param.access {
                self.write(&format!("{} ", access));
            }
            if param.is_readonly {
                self.write("readonly ");
            }
            self.mark(param.name.span);
            self.write(&param.name.value.name);
            if param.optional {
                self.write("?");
            }
            if let Some(ty) = &param.type_annotation {
                self.write(": ");
                self.ty(ty);
            }
        }
    }

    fn return_annotation(&mut self, ty: Option<&Node<Type>>) {
        if let Some(ty) = ty {
            self.write(": ");
            self.ty(ty);
        }
    }

    fn body_or_semicolon(&mut self, body: Option<&BlockStmt>) {
        match body {
            None => self.write(";"),
            Some(block) if block.stmts.is_empty() => self.write(" { }"),
            Some(block) => {
                self.write(" {");
                self.indent += 1;
                for stmt in &block.stmts {
                    self.newline();
                    self.mark(stmt.span);
                    self.stmt(&stmt.value);
                }
                self.indent -= 1;
                self.newline();
                self.write("}");
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.expr(expr);
                self.write(";");
            }
            Stmt::Return(value) => {
                self.write("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.expr(value);
                }
                self.write(";");
            }
            Stmt::Var(var) => self.var(var),
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr(&mut self, expr: &Node<Expr>) {
        self.mark(expr.span);
        match &expr.value {
            Expr::Literal(lit) => self.literal(lit),
            Expr::Ident(id) => self.write(&id.name),
            Expr::Call { callee, args } => {
                self.expr(callee);
                self.write("(");
                self.expr_list(args);
                self.write(")");
            }
            Expr::New { callee, args } => {
                self.write("new ");
                self.expr(callee);
                self.write("(");
                self.expr_list(args);
                self.write(")");
            }
            Expr::Member { object, property } => {
                self.expr(object);
                self.write(&format!(".{}", property));
            }
            Expr::Array(elements) => {
                self.write("[");
                self.expr_list(elements);
                self.write("]");
            }
            Expr::Object(props) => self.object(props),
            Expr::Arrow { params, body } => {
                let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                self.write(&format!("({}) => ", names.join(", ")));
                if matches!(body.value, Expr::Object(_)) {
                    self.write("(");
                    self.expr(body);
                    self.write(")");
                } else {
                    self.expr(body);
                }
            }
            Expr::Paren(inner) => {
                self.write("(");
                self.expr(inner);
                self.write(")");
            }
            Expr::Spread(inner) => {
                self.write("...");
                self.expr(inner);
            }
            Expr::External { module, name } => {
                let alias = self.aliases.get(module).cloned().unwrap_or_default();
                self.write(&format!("{}.{}", alias, name));
            }
        }
    }

    fn expr_list(&mut self, exprs: &[Node<Expr>]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(e);
        }
    }

    fn object(&mut self, props: &[ObjectProperty]) {
        if props.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{ ");
        for (i, prop) in props.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            match prop {
                ObjectProperty::KeyValue { key, value } => {
                    self.property_name(key);
                    self.write(": ");
                    self.expr(value);
                }
                ObjectProperty::Shorthand(id) => self.write(&id.name),
                ObjectProperty::Spread(e) => {
                    self.write("...");
                    self.expr(e);
                }
            }
        }
        self.write(" }");
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Number(n) => self.write(&format_number(*n)),
            Literal::String(s) => self.write(&quote(s)),
            Literal::Template(s) => {
                let escaped = s.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${");
                self.write(&format!("`{}`", escaped));
            }
            Literal::Boolean(b) => self.write(if *b { "true" } else { "false" }),
            Literal::Null => self.write("null"),
        }
    }

    fn property_name(&mut self, name: &PropertyName) {
        match name {
            PropertyName::Ident(id) => self.write(&id.name),
            PropertyName::String(s) => self.write(&quote(s)),
            PropertyName::Number(n) => self.write(&format_number(*n)),
            PropertyName::Computed(e) => {
                self.write("[");
                self.expr(e);
                self.write("]");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn ty(&mut self, ty: &Node<Type>) {
        match &ty.value {
            Type::Keyword(k) => self.write(&k.to_string()),
            Type::Array(elem) => {
                let wrap = matches!(
                    elem.value,
                    Type::Union(_) | Type::Function(_) | Type::Constructor(_)
                );
                if wrap {
                    self.write("(");
                }
                self.ty(elem);
                if wrap {
                    self.write(")");
                }
                self.write("[]");
            }
            Type::Tuple(elems) => {
                self.write("[");
                self.type_list(elems, ", ");
                self.write("]");
            }
            Type::Union(members) => self.type_list(members, " | "),
            Type::Function(sig) => self.signature(sig),
            Type::Constructor(sig) => {
                self.write("new ");
                self.signature(sig);
            }
            Type::TypeRef { name, type_args } => {
                self.write(&name.to_string());
                if let Some(args) = type_args {
                    self.write("<");
                    self.type_list(args, ", ");
                    self.write(">");
                }
            }
            Type::Object(members) => self.type_members(members),
            Type::Literal(lit) => match lit {
                LiteralType::String(s) => self.write(&quote(s)),
                LiteralType::Number(n) => self.write(&format_number(*n)),
                LiteralType::Boolean(b) => self.write(if *b { "true" } else { "false" }),
                LiteralType::Null => self.write("null"),
            },
            Type::Predicate { param, ty } => {
                self.write(&format!("{} is ", param));
                self.ty(ty);
            }
            Type::Paren(inner) => {
                self.write("(");
                self.ty(inner);
                self.write(")");
            }
        }
    }

    fn type_list(&mut self, types: &[Node<Type>], sep: &str) {
        for (i, t) in types.iter().enumerate() {
            if i > 0 {
                self.write(sep);
            }
            self.ty(t);
        }
    }

    fn signature(&mut self, sig: &FunctionType) {
        self.write("(");
        for (i, p) in sig.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&p.name.name);
            if p.optional {
                self.write("?");
            }
            if let Some(ty) = &p.ty {
                self.write(": ");
                self.ty(ty);
            }
        }
        self.write(") => ");
        self.ty(&sig.return_type);
    }

    fn type_members(&mut self, members: &[TypeMember]) {
        if members.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{ ");
        for member in members {
            match member {
                TypeMember::Property { name, ty, optional } => {
                    self.property_name(name);
                    if *optional {
                        self.write("?");
                    }
                    self.write(": ");
                    self.ty(ty);
                }
                TypeMember::IndexSignature { key_name, key_type, value_type } => {
                    self.write(&format!("[{}: ", key_name));
                    self.ty(key_type);
                    self.write("]: ");
                    self.ty(value_type);
                }
            }
            self.write("; ");
        }
        self.write("}");
    }
}

/// Double-quoted JavaScript string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
