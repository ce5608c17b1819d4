//! Expression definitions for the AST

use super::*;

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal values
    Literal(Literal),

    /// Identifier
    Ident(Ident),

    /// Function call: callee(args)
    Call {
        callee: Box<Node<Expr>>,
        args: Vec<Node<Expr>>,
    },

    /// New expression: new Constructor(args)
    New {
        callee: Box<Node<Expr>>,
        args: Vec<Node<Expr>>,
    },

    /// Member access: object.property
    Member {
        object: Box<Node<Expr>>,
        property: Ident,
    },

    /// Array literal: [elem1, elem2, ...]
    Array(Vec<Node<Expr>>),

    /// Object literal: { key1: value1, key2: value2 }
    Object(Vec<ObjectProperty>),

    /// Arrow function with an expression body: (a, b) => body
    Arrow {
        params: Vec<Ident>,
        body: Box<Node<Expr>>,
    },

    /// Parenthesized expression
    Paren(Box<Node<Expr>>),

    /// Spread element: ...expr
    Spread(Box<Node<Expr>>),

    /// Reference to a symbol exported by another module. Printed through a
    /// namespace import hoisted to the top of the unit.
    External { module: String, name: String },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    /// Template literal without substitutions: `text`
    Template(String),
    Boolean(bool),
    Null,
}

/// Object literal property
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    /// key: value
    KeyValue {
        key: PropertyName,
        value: Node<Expr>,
    },
    /// { name }
    Shorthand(Ident),
    /// { ...expr }
    Spread(Node<Expr>),
}

/// Property name
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyName {
    Ident(Ident),
    String(String),
    Number(f64),
    Computed(Box<Node<Expr>>),
}

impl PropertyName {
    pub fn ident(name: impl Into<String>) -> Self {
        PropertyName::Ident(Ident::new(name))
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            PropertyName::Ident(id) => Some(&id.name),
            _ => None,
        }
    }

    /// Static text of the name, if it has one.
    pub fn text(&self) -> Option<String> {
        match self {
            PropertyName::Ident(id) => Some(id.name.clone()),
            PropertyName::String(s) => Some(s.clone()),
            PropertyName::Number(n) => Some(format_number(*n)),
            PropertyName::Computed(_) => None,
        }
    }
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(Ident::new(name))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// Text of a string or substitution-free template literal.
    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(Literal::String(s)) | Expr::Literal(Literal::Template(s)) => Some(s),
            _ => None,
        }
    }

    /// Name used when reporting unsupported syntax.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal(Literal::Number(_)) => "NumericLiteral",
            Expr::Literal(Literal::String(_)) => "StringLiteral",
            Expr::Literal(Literal::Template(_)) => "NoSubstitutionTemplateLiteral",
            Expr::Literal(Literal::Boolean(_)) => "BooleanLiteral",
            Expr::Literal(Literal::Null) => "NullKeyword",
            Expr::Ident(_) => "Identifier",
            Expr::Call { .. } => "CallExpression",
            Expr::New { .. } => "NewExpression",
            Expr::Member { .. } => "PropertyAccessExpression",
            Expr::Array(_) => "ArrayLiteralExpression",
            Expr::Object(_) => "ObjectLiteralExpression",
            Expr::Arrow { .. } => "ArrowFunction",
            Expr::Paren(_) => "ParenthesizedExpression",
            Expr::Spread(_) => "SpreadElement",
            Expr::External { .. } => "ExternalReference",
        }
    }
}

impl ObjectProperty {
    pub fn key_value(key: impl Into<String>, value: Node<Expr>) -> Self {
        ObjectProperty::KeyValue {
            key: PropertyName::ident(key),
            value,
        }
    }
}

/// Render a number the way JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
