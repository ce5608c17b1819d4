//! Declaration and statement definitions for the AST

use super::*;
use std::fmt;

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// Function declaration
    Function(FunctionDecl),

    /// Class declaration
    Class(ClassDecl),

    /// Interface declaration
    Interface(InterfaceDecl),

    /// Type alias declaration
    TypeAlias(TypeAliasDecl),

    /// Enum declaration
    Enum(EnumDecl),

    /// Variable declaration
    Var(VarDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Function(f) => &f.name.value.name,
            Decl::Class(c) => &c.name.value.name,
            Decl::Interface(i) => &i.name.value.name,
            Decl::TypeAlias(t) => &t.name.value.name,
            Decl::Enum(e) => &e.name.value.name,
            Decl::Var(v) => &v.name.value.name,
        }
    }
}

/// Function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Node<Ident>,
    pub params: Vec<Param>,
    pub return_type: Option<Node<Type>>,
    pub body: Option<BlockStmt>,
    pub is_declare: bool,
}

/// Function or constructor parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Node<Ident>,
    pub type_annotation: Option<Node<Type>>,
    pub optional: bool,
    /// Parameter property modifier (`constructor(private x: X)`)
    pub access: Option<AccessModifier>,
    pub is_readonly: bool,
    pub decorators: Vec<Node<Expr>>,
}

impl Param {
    pub fn new(name: impl Into<String>, type_annotation: Option<Node<Type>>) -> Self {
        Self {
            name: Node::synthetic(Ident::new(name)),
            type_annotation,
            optional: false,
            access: None,
            is_readonly: false,
            decorators: Vec::new(),
        }
    }
}

/// Class declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Node<Ident>,
    pub extends: Option<Node<Expr>>,
    pub members: Vec<Node<ClassMember>>,
    pub decorators: Vec<Node<Expr>>,
    pub is_declare: bool,
}

/// Class member
#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Constructor(ConstructorMember),
    Method(MethodMember),
    Property(PropertyMember),
    Accessor(AccessorMember),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorMember {
    pub params: Vec<Param>,
    /// `None` for overload signatures and ambient classes
    pub body: Option<BlockStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodMember {
    pub name: PropertyName,
    pub params: Vec<Param>,
    pub return_type: Option<Node<Type>>,
    pub body: Option<BlockStmt>,
    pub is_static: bool,
    pub decorators: Vec<Node<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMember {
    pub name: PropertyName,
    pub type_annotation: Option<Node<Type>>,
    pub init: Option<Node<Expr>>,
    pub is_static: bool,
    pub decorators: Vec<Node<Expr>>,
    /// Block comment emitted right before the member
    pub leading_comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessorMember {
    pub kind: AccessorKind,
    pub name: PropertyName,
    pub params: Vec<Param>,
    pub type_annotation: Option<Node<Type>>,
    pub body: Option<BlockStmt>,
    pub is_static: bool,
    pub decorators: Vec<Node<Expr>>,
}

impl ClassMember {
    /// Name of the member; constructors have none.
    pub fn name(&self) -> Option<&PropertyName> {
        match self {
            ClassMember::Constructor(_) => None,
            ClassMember::Method(m) => Some(&m.name),
            ClassMember::Property(p) => Some(&p.name),
            ClassMember::Accessor(a) => Some(&a.name),
        }
    }

    pub fn decorators(&self) -> &[Node<Expr>] {
        match self {
            ClassMember::Constructor(_) => &[],
            ClassMember::Method(m) => &m.decorators,
            ClassMember::Property(p) => &p.decorators,
            ClassMember::Accessor(a) => &a.decorators,
        }
    }

    pub fn decorators_mut(&mut self) -> Option<&mut Vec<Node<Expr>>> {
        match self {
            ClassMember::Constructor(_) => None,
            ClassMember::Method(m) => Some(&mut m.decorators),
            ClassMember::Property(p) => Some(&mut p.decorators),
            ClassMember::Accessor(a) => Some(&mut a.decorators),
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            ClassMember::Constructor(_) => false,
            ClassMember::Method(m) => m.is_static,
            ClassMember::Property(p) => p.is_static,
            ClassMember::Accessor(a) => a.is_static,
        }
    }
}

impl ClassDecl {
    /// Static property with the given identifier name.
    pub fn static_property(&self, name: &str) -> Option<&PropertyMember> {
        self.members.iter().find_map(|m| match &m.value {
            ClassMember::Property(p) if p.is_static && p.name.as_ident() == Some(name) => Some(p),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessModifier {
    Public,
    Private,
    Protected,
}

/// Interface declaration
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Node<Ident>,
    pub members: Vec<TypeMember>,
    pub is_declare: bool,
}

/// Type alias declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Node<Ident>,
    pub ty: Node<Type>,
    pub is_declare: bool,
}

/// Enum declaration
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Node<Ident>,
    pub members: Vec<EnumMember>,
    pub is_const: bool,
    pub is_declare: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: Node<Ident>,
    pub init: Option<Node<Expr>>,
}

/// Variable declaration (single binding)
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub name: Node<Ident>,
    pub type_annotation: Option<Node<Type>>,
    pub init: Option<Node<Expr>>,
    pub is_declare: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

// =============================================================================
// Statements
// =============================================================================

/// Statement inside a function or constructor body
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Node<Expr>),
    Return(Option<Node<Expr>>),
    Var(VarDecl),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStmt {
    pub stmts: Vec<Node<Stmt>>,
}

// Display implementations

impl fmt::Display for AccessModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessModifier::Public => write!(f, "public"),
            AccessModifier::Private => write!(f, "private"),
            AccessModifier::Protected => write!(f, "protected"),
        }
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::Var => write!(f, "var"),
            VarKind::Let => write!(f, "let"),
            VarKind::Const => write!(f, "const"),
        }
    }
}
