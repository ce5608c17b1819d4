//! Package descriptors and bundle metadata
//!
//! Only the fields module resolution and flat-module detection look at are
//! deserialized; everything else in `package.json` is ignored.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub typings: Option<String>,
    pub types: Option<String>,
}

impl PackageJson {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Declared public typings entry, `typings` taking precedence.
    pub fn typings_entry(&self) -> Option<&str> {
        self.typings.as_deref().or(self.types.as_deref())
    }
}

/// Flat-module fields of a `.metadata.json` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    /// The typings file only re-exports the real flat module index
    pub flat_module_index_redirect: bool,
    /// Canonical module name the bundle is imported as
    pub import_as: Option<String>,
}

impl BundleMetadata {
    /// Read the first metadata record of a `.metadata.json` file. The file
    /// holds either one record or an array of records (one per version).
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let record = match &value {
            Value::Array(records) => records.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        Ok(Self {
            flat_module_index_redirect: record
                .get("flatModuleIndexRedirect")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            import_as: record
                .get("importAs")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Split `@scope/pkg/sub/path` into the package name and the subpath.
pub fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut slashes = specifier.match_indices('/').map(|(i, _)| i);
    match slashes.nth(name_segments - 1) {
        Some(pos) => (&specifier[..pos], Some(&specifier[pos + 1..])),
        None => (specifier, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_json() {
        let pkg = PackageJson::parse(
            r#"{"name": "lib-a", "version": "1.0.0", "types": "index.d.ts", "dependencies": {"x": "1"}}"#,
        )
        .unwrap();
        assert_eq!(pkg.name.as_deref(), Some("lib-a"));
        assert_eq!(pkg.typings_entry(), Some("index.d.ts"));

        let pkg = PackageJson::parse(r#"{"typings": "a.d.ts", "types": "b.d.ts"}"#).unwrap();
        assert_eq!(pkg.typings_entry(), Some("a.d.ts"));
    }

    #[test]
    fn test_bundle_metadata() {
        let meta = BundleMetadata::parse(r#"{"__symbolic": "module", "importAs": "lib-a"}"#).unwrap();
        assert_eq!(meta.import_as.as_deref(), Some("lib-a"));
        assert!(!meta.flat_module_index_redirect);

        let meta = BundleMetadata::parse(
            r#"[{"__symbolic": "module", "flatModuleIndexRedirect": true}]"#,
        )
        .unwrap();
        assert!(meta.flat_module_index_redirect);
        assert!(BundleMetadata::parse("{").is_err());
    }

    #[test]
    fn test_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/fp"), ("lodash", Some("fp")));
        assert_eq!(parse_package_specifier("@annex/core"), ("@annex/core", None));
        assert_eq!(
            parse_package_specifier("@annex/core/testing/x"),
            ("@annex/core", Some("testing/x"))
        );
    }
}
