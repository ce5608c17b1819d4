//! Type definitions for the AST

use super::*;
use std::fmt;

/// Type expression
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Keyword types: number, string, boolean, object, any, ...
    Keyword(KeywordType),

    /// Array type: T[]
    Array(Box<Node<Type>>),

    /// Tuple type: [T1, T2, ...]
    Tuple(Vec<Node<Type>>),

    /// Union type: T1 | T2 | ...
    Union(Vec<Node<Type>>),

    /// Function type: (args) => ReturnType
    Function(FunctionType),

    /// Constructor type: new (args) => ReturnType
    Constructor(FunctionType),

    /// Type reference: SomeType, ns.SomeType<T>
    TypeRef {
        name: EntityName,
        type_args: Option<Vec<Node<Type>>>,
    },

    /// Object type literal: { prop: Type; [key: string]: Type }
    Object(Vec<TypeMember>),

    /// Literal type: "hello" | 42 | true | null
    Literal(LiteralType),

    /// Type predicate: x is T
    Predicate {
        param: Ident,
        ty: Box<Node<Type>>,
    },

    /// Parenthesized type
    Paren(Box<Node<Type>>),
}

/// Keyword types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordType {
    Any,
    Unknown,
    Number,
    String,
    Boolean,
    Object,
    Symbol,
    BigInt,
    Void,
    Undefined,
    Never,
}

/// Literal types
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

/// Function or constructor type signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<FunctionTypeParam>,
    pub return_type: Box<Node<Type>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTypeParam {
    pub name: Ident,
    pub ty: Option<Node<Type>>,
    pub optional: bool,
}

/// Member of an object type literal
#[derive(Debug, Clone, PartialEq)]
pub enum TypeMember {
    Property {
        name: PropertyName,
        ty: Node<Type>,
        optional: bool,
    },
    IndexSignature {
        key_name: Ident,
        key_type: Node<Type>,
        value_type: Node<Type>,
    },
}

/// Dotted name appearing in type position: `a`, `a.b.C`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityName {
    Ident(Ident),
    Qualified {
        left: Box<EntityName>,
        right: Ident,
    },
}

impl EntityName {
    pub fn ident(name: impl Into<String>) -> Self {
        EntityName::Ident(Ident::new(name))
    }

    /// Leftmost identifier of a qualified name.
    pub fn root(&self) -> &Ident {
        match self {
            EntityName::Ident(id) => id,
            EntityName::Qualified { left, .. } => left.root(),
        }
    }
}

impl Type {
    pub fn type_ref(name: impl Into<String>) -> Self {
        Type::TypeRef {
            name: EntityName::ident(name),
            type_args: None,
        }
    }
}

// Display implementations

impl fmt::Display for KeywordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeywordType::Any => "any",
            KeywordType::Unknown => "unknown",
            KeywordType::Number => "number",
            KeywordType::String => "string",
            KeywordType::Boolean => "boolean",
            KeywordType::Object => "object",
            KeywordType::Symbol => "symbol",
            KeywordType::BigInt => "bigint",
            KeywordType::Void => "void",
            KeywordType::Undefined => "undefined",
            KeywordType::Never => "never",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityName::Ident(id) => write!(f, "{}", id),
            EntityName::Qualified { left, right } => write!(f, "{}.{}", left, right),
        }
    }
}
