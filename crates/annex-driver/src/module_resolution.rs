//! Module resolution for import specifiers
//!
//! Mirrors the host compiler's node-style lookup closely enough for the
//! orchestrator's purposes:
//!
//! 1. `./x`, `../x` and `/x` probe `x.ts`, `x.tsx`, `x.d.ts`, then the same
//!    names under `x/index`
//! 2. bare names walk up from the importing file looking for
//!    `node_modules/<package>`, then use the package's `typings`/`types`
//!    entry (or `main` with its extension swapped), or `index.*`

use crate::package_json::{parse_package_specifier, PackageJson};
use crate::paths;

/// File queries resolution needs. The host adapter answers them with its
/// merged view of original, generated and summary files.
pub trait ResolutionHost {
    fn file_exists(&self, file_name: &str) -> bool;
    fn directory_exists(&self, dir_name: &str) -> bool;
    fn read_file(&self, file_name: &str) -> Option<String>;
}

/// A successfully resolved import
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedModule {
    pub resolved_file_name: String,
    /// The file lives in a dependency rather than the project
    pub is_external_library_import: bool,
}

impl ResolvedModule {
    fn new(resolved_file_name: String) -> Self {
        let is_external_library_import = resolved_file_name.contains("/node_modules/");
        Self {
            resolved_file_name,
            is_external_library_import,
        }
    }
}

const EXTENSIONS: [&str; 3] = [".ts", ".tsx", ".d.ts"];

pub struct ModuleResolver<'h> {
    host: &'h dyn ResolutionHost,
}

impl<'h> ModuleResolver<'h> {
    pub fn new(host: &'h dyn ResolutionHost) -> Self {
        Self { host }
    }

    /// Resolve `specifier` as imported from `containing_file`.
    pub fn resolve(&self, specifier: &str, containing_file: &str) -> Option<ResolvedModule> {
        let resolved = if is_relative(specifier) {
            let target = paths::join(&paths::dirname(containing_file), specifier);
            self.try_resolve_file(&target)
        } else if paths::is_absolute(specifier) {
            self.try_resolve_file(&paths::normalize(specifier))
        } else {
            self.resolve_package(specifier, containing_file)
        };
        tracing::trace!(
            specifier,
            containing_file,
            resolved = resolved.as_deref().unwrap_or("<none>"),
            "resolved module"
        );
        resolved.map(ResolvedModule::new)
    }

    /// Try a path as given, with each source extension, then as a directory
    /// with an index file.
    fn try_resolve_file(&self, target: &str) -> Option<String> {
        if paths::is_ts(target) && self.host.file_exists(target) {
            return Some(target.to_string());
        }
        for ext in EXTENSIONS {
            let candidate = format!("{}{}", target, ext);
            if self.host.file_exists(&candidate) {
                return Some(candidate);
            }
        }
        for ext in EXTENSIONS {
            let candidate = format!("{}/index{}", target, ext);
            if self.host.file_exists(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn resolve_package(&self, specifier: &str, containing_file: &str) -> Option<String> {
        let (package_name, subpath) = parse_package_specifier(specifier);
        let mut current = paths::dirname(containing_file);
        loop {
            if paths::basename(&current) != "node_modules" {
                let package_dir = paths::join(&current, &format!("node_modules/{}", package_name));
                if self.host.directory_exists(&package_dir) {
                    if let Some(found) = self.resolve_package_entry(&package_dir, subpath) {
                        return Some(found);
                    }
                }
            }
            let parent = paths::dirname(&current);
            if parent == current {
                return None;
            }
            current = parent;
        }
    }

    fn resolve_package_entry(&self, package_dir: &str, subpath: Option<&str>) -> Option<String> {
        if let Some(sub) = subpath {
            return self.try_resolve_file(&paths::join(package_dir, sub));
        }

        let package_json = paths::join(package_dir, "package.json");
        let package = self
            .host
            .read_file(&package_json)
            .and_then(|text| PackageJson::parse(&text).ok());
        if let Some(package) = package {
            for entry in [package.typings_entry(), package.main.as_deref()].into_iter().flatten() {
                let entry_path = paths::join(package_dir, entry);
                if paths::is_ts(&entry_path) && self.host.file_exists(&entry_path) {
                    return Some(entry_path);
                }
                let without_ext = entry_path
                    .strip_suffix(".js")
                    .map(str::to_string)
                    .unwrap_or_else(|| paths::strip_ext(&entry_path));
                if let Some(found) = self.try_resolve_file(&without_ext) {
                    return Some(found);
                }
            }
        }
        self.try_resolve_file(&paths::join(package_dir, "index"))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}
