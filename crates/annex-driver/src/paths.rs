//! POSIX path helpers and the file naming patterns shared by the driver.
//!
//! Paths handled by the orchestrator are plain `/`-separated strings: they
//! are compared, cached and embedded in generated imports, so they never go
//! through `std::path` (which would make the results platform dependent).

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `<base>.<kind>.<ext>` names of generated companions.
    pub static ref GENERATED_FILES: Regex =
        Regex::new(r"^(.*?)\.(axfactory|shim\.axstyle|axstyle|axsummary)\.(js|d\.ts|tsx|ts)$").unwrap();
    pub static ref EXT: Regex = Regex::new(r"(\.ts|\.d\.ts|\.js|\.jsx|\.tsx)$").unwrap();
    pub static ref DTS: Regex = Regex::new(r"\.d\.ts$").unwrap();
    pub static ref TS: Regex = Regex::new(r"\.tsx?$").unwrap();
    static ref CSS_PREPROCESSOR_EXT: Regex = Regex::new(r"(\.scss|\.sass|\.less|\.styl)$").unwrap();
    static ref NODE_MODULES_PACKAGE_NAME: Regex =
        Regex::new(r"node_modules/((\w|-|\.)+|(@(\w|-|\.)+/(\w|-|\.)+))").unwrap();
    static ref NODE_MODULES_PREFIX: Regex = Regex::new(r".*node_modules/").unwrap();
}

/// Suffix of summary JSON artifacts.
pub const SUMMARY_JSON_SUFFIX: &str = ".axsummary.json";

/// Suffix of the factory companion, the only kind that gets a type-check stub.
pub const FACTORY_TS_SUFFIX: &str = ".axfactory.ts";

/// Parts of a generated file name: `(base, kind, extension)`.
pub fn generated_parts(file_name: &str) -> Option<(&str, &str, &str)> {
    let caps = GENERATED_FILES.captures(file_name)?;
    Some((
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str(),
    ))
}

pub fn is_generated(file_name: &str) -> bool {
    GENERATED_FILES.is_match(file_name)
}

pub fn is_dts(file_name: &str) -> bool {
    DTS.is_match(file_name)
}

pub fn is_ts(file_name: &str) -> bool {
    TS.is_match(file_name)
}

/// Drop a source extension (`.ts`, `.d.ts`, `.js`, `.jsx`, `.tsx`).
pub fn strip_ext(file_name: &str) -> String {
    EXT.replace(file_name, "").into_owned()
}

/// Package a file belongs to: the name following its first `node_modules/`.
pub fn package_name_of(file_name: &str) -> Option<String> {
    NODE_MODULES_PACKAGE_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn strip_node_modules_prefix(file_name: &str) -> String {
    NODE_MODULES_PREFIX.replace(file_name, "").into_owned()
}

/// Name of the `.css` file a preprocessor stylesheet compiles to, if the
/// name has a preprocessor extension.
pub fn css_fallback(file_name: &str) -> Option<String> {
    CSS_PREPROCESSOR_EXT
        .is_match(file_name)
        .then(|| CSS_PREPROCESSOR_EXT.replace(file_name, ".css").into_owned())
}

// ============================================================================
// Path arithmetic
// ============================================================================

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Collapse `.`/`..` segments and duplicate separators.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = is_absolute(&path);
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

pub fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None if is_absolute(path) => "/".to_string(),
        None => ".".to_string(),
    }
}

pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        return normalize(path);
    }
    normalize(&format!("{}/{}", base, path))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &str, path: &str) -> String {
    if is_absolute(path) {
        normalize(path)
    } else {
        join(base, path)
    }
}

/// Relative path from directory `from` to `to`; empty when they are equal.
pub fn relative(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts: Vec<&str> = from.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; from_parts.len() - common];
    out.extend_from_slice(&to_parts[common..]);
    out.join("/")
}

/// `relative(from, to)` prefixed with `./` unless it already starts with a dot.
pub fn dot_relative(from: &str, to: &str) -> String {
    let rel = relative(from, to);
    if rel.starts_with('.') {
        rel
    } else {
        format!("./{}", rel)
    }
}

/// Path of `full_path` relative to `prefix`, or `None` when it lies outside.
pub fn path_starts_with_prefix(prefix: &str, full_path: &str) -> Option<String> {
    let rel = relative(prefix, full_path);
    (!rel.starts_with("..")).then_some(rel)
}

/// Strip the first root dir that contains `file_name`; unchanged otherwise.
pub fn relative_to_root_dirs(file_name: &str, root_dirs: &[String]) -> String {
    root_dirs
        .iter()
        .filter_map(|dir| path_starts_with_prefix(dir, file_name))
        .find(|rel| !rel.is_empty())
        .unwrap_or_else(|| file_name.to_string())
}
