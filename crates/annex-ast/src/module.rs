//! Module system definitions for the AST

use super::*;
use std::rc::Rc;

/// Module item (top-level in a module)
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleItem {
    /// Import declaration
    Import(ImportDecl),

    /// Export declaration
    Export(ExportDecl),

    /// Declaration
    Decl(Decl),

    /// Statement
    Stmt(Stmt),
}

impl ModuleItem {
    /// Class declared by this item, exported or not.
    pub fn class(&self) -> Option<&ClassDecl> {
        match self {
            ModuleItem::Decl(Decl::Class(c)) => Some(c),
            ModuleItem::Export(ExportDecl::Decl(Decl::Class(c))) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self) -> Option<&mut ClassDecl> {
        match self {
            ModuleItem::Decl(Decl::Class(c)) => Some(c),
            ModuleItem::Export(ExportDecl::Decl(Decl::Class(c))) => Some(c),
            _ => None,
        }
    }

    /// Declaration carried by this item, exported or not.
    pub fn decl(&self) -> Option<&Decl> {
        match self {
            ModuleItem::Decl(d) | ModuleItem::Export(ExportDecl::Decl(d)) => Some(d),
            _ => None,
        }
    }
}

/// Import declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// import name from "module"
    Default(Ident),

    /// import * as name from "module"
    Namespace(Ident),

    /// import { name } from "module" or import { name as alias } from "module"
    Named {
        imported: Ident,
        local: Option<Ident>,
        type_only: bool,
    },
}

impl ImportSpecifier {
    /// Name bound in the importing module.
    pub fn local_name(&self) -> &str {
        match self {
            ImportSpecifier::Default(id) | ImportSpecifier::Namespace(id) => &id.name,
            ImportSpecifier::Named { imported, local, .. } => {
                &local.as_ref().unwrap_or(imported).name
            }
        }
    }
}

/// Export declaration
#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    /// export { name } / export { name } from "module"
    Named {
        specifiers: Vec<ExportSpecifier>,
        source: Option<String>,
    },

    /// export * from "module"
    All { source: String },

    /// export declaration
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: Ident,
    pub exported: Option<Ident>,
}

/// Root AST node - a complete source unit as the host compiler sees it
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub file_name: String,
    pub text: String,
    pub items: Vec<Node<ModuleItem>>,
    /// `/// <reference path>` targets; may include companions the driver
    /// attached for the host compiler
    pub referenced_files: Vec<String>,
    /// References as written, kept while `referenced_files` is augmented
    pub original_referenced_files: Option<Vec<String>>,
    pub is_declaration_file: bool,
    /// Explicit module name (`/// <amd-module>`), if any
    pub module_name: Option<String>,
    /// Block comment printed before the first item
    pub header_comment: Option<String>,
    pub redirect_info: Option<RedirectInfo>,
}

/// Set when the host compiler deduplicated a declaration file that exists
/// under several paths; `unredirected` is the file as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectInfo {
    pub redirect_target: Rc<SourceFile>,
    pub unredirected: Rc<SourceFile>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let is_declaration_file = file_name.ends_with(".d.ts");
        Self {
            file_name,
            text: text.into(),
            items: Vec::new(),
            referenced_files: Vec::new(),
            original_referenced_files: None,
            is_declaration_file,
            module_name: None,
            header_comment: None,
            redirect_info: None,
        }
    }

    /// References written in the file itself.
    pub fn own_referenced_files(&self) -> &[String] {
        self.original_referenced_files.as_deref().unwrap_or(&self.referenced_files)
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.items.iter().filter_map(|item| match &item.value {
            ModuleItem::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.items.iter().filter_map(|item| item.value.class())
    }

    /// Module specifiers this file depends on (imports and re-exports).
    pub fn module_specifiers(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match &item.value {
                ModuleItem::Import(import) => Some(import.source.as_str()),
                ModuleItem::Export(ExportDecl::All { source }) => Some(source.as_str()),
                ModuleItem::Export(ExportDecl::Named { source: Some(source), .. }) => {
                    Some(source.as_str())
                }
                _ => None,
            })
            .collect()
    }
}
