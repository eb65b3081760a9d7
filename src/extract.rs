#![forbid(unsafe_code)]

//! Rule extraction from Rust sources
//!
//! The extractor reads struct declarations and turns their annotations into
//! rule sets keyed by qualified type name:
//!
//! - doc lines starting with `@cel:` become type rules,
//! - `#[validate("...")]` field tags are expanded through the shorthand and
//!   directive tree into field rules,
//! - fields marked `#[validate(flatten)]` or `#[serde(flatten)]` lift the
//!   rules of a struct declared in the same module.
//!
//! A crate is extracted by walking its source root with [`FileWalker`] and
//! parsing files in parallel.

pub mod file_walker;
mod resolve;
mod source;

pub use file_walker::{FileEntry, FileWalker, FileWalkerError, SkipReason, WalkResult};

use crate::error::ExtractError;
use crate::rules::compile_tag;
use crate::types::{FieldDescriptor, GlobPattern, RuleSet, RuleSets, TypeDescriptor};
use rayon::prelude::*;
use resolve::Scope;
use source::{SourceModule, SourceStruct, parse_source};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, warn};

/// Output of an extraction run
#[derive(Debug, Default)]
pub struct Extraction {
    /// Rule sets keyed by qualified type name
    pub rule_sets: RuleSets,
    /// Every type that produced rules, sorted by qualified name
    pub descriptors: Vec<TypeDescriptor>,
    /// Field tags that could not be translated; those fields have no rules
    pub tag_errors: Vec<ExtractError>,
}

impl Extraction {
    /// Folds `other` into `self`; later rule sets replace earlier ones
    pub fn merge(&mut self, other: Extraction) {
        for (key, rule_set) in other.rule_sets {
            if self.rule_sets.insert(key.clone(), rule_set).is_some() {
                warn!(key = %key, "duplicate rule set, keeping the last one");
            }
        }
        self.descriptors.extend(other.descriptors);
        self.descriptors
            .sort_by_key(TypeDescriptor::qualified_name);
        self.descriptors
            .dedup_by_key(|d| d.qualified_name());
        self.tag_errors.extend(other.tag_errors);
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    /// Qualified names of every discovered type
    pub fn known_types(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .map(TypeDescriptor::qualified_name)
            .collect()
    }
}

/// Extracts rules from a single source text.
///
/// # Arguments
/// * `path` - File the source was read from, used in error messages
/// * `source` - Rust source text
/// * `module_path` - Module path of the file, e.g. `my_crate::models`
///
/// # Errors
///
/// Returns `ExtractError::Parse` if the source does not parse. Tag errors
/// do not fail extraction; they are collected in
/// [`Extraction::tag_errors`].
pub fn extract_source(path: &Path, source: &str, module_path: &str) -> Result<Extraction, ExtractError> {
    let modules = parse_source(source, module_path).map_err(|message| ExtractError::Parse {
        file: path.to_path_buf(),
        message,
    })?;

    let mut extraction = Extraction::default();
    for module in &modules {
        extraction.merge(extract_module(module));
    }
    Ok(extraction)
}

fn extract_module(module: &SourceModule) -> Extraction {
    let mut extraction = Extraction::default();
    let module_name = module
        .path
        .rsplit("::")
        .next()
        .unwrap_or(module.path.as_str())
        .to_string();

    for item in &module.structs {
        let key = crate::types::qualified_name(&module.path, &item.name, &item.type_params);
        let mut collector = Collector {
            module,
            key: &key,
            rule_set: RuleSet::new(),
            fields: Vec::new(),
            tag_errors: Vec::new(),
        };
        collector.rule_set.type_rules = item.doc_rules.clone();
        collector.collect(item, &mut vec![item.name.as_str()]);

        extraction.tag_errors.append(&mut collector.tag_errors);
        if collector.rule_set.is_empty() {
            continue;
        }

        debug!(
            key = %key,
            type_rules = collector.rule_set.type_rules.len(),
            fields = collector.rule_set.field_rules.len(),
            "extracted rule set"
        );
        extraction.descriptors.push(TypeDescriptor {
            module_path: module.path.clone(),
            module_name: module_name.clone(),
            type_name: item.name.clone(),
            type_params: item.type_params.clone(),
            fields: collector.fields,
        });
        extraction.rule_sets.insert(key.clone(), collector.rule_set);
    }
    extraction
}

/// Gathers field rules for one struct, following flattened fields
struct Collector<'m> {
    module: &'m SourceModule,
    key: &'m str,
    rule_set: RuleSet,
    fields: Vec<FieldDescriptor>,
    tag_errors: Vec<ExtractError>,
}

impl<'m> Collector<'m> {
    fn collect(&mut self, item: &'m SourceStruct, visiting: &mut Vec<&'m str>) {
        let module = self.module;
        let scope = Scope {
            aliases: &module.aliases,
            type_params: &item.type_params,
        };

        for field in &item.fields {
            if field.flatten {
                self.flatten(field, visiting);
                continue;
            }

            let ty = scope.resolve(&field.ty);
            if let Some(tag) = &field.tag {
                match compile_tag(tag, &ty) {
                    Ok(rules) if rules.is_empty() => {}
                    // Flattened and direct fields share one namespace; the
                    // field declared last wins.
                    Ok(rules) => {
                        self.rule_set.field_rules.insert(field.name.clone(), rules);
                    }
                    Err(e) => {
                        error!(key = %self.key, field = %field.name, error = %e, "invalid validate tag");
                        self.tag_errors.push(ExtractError::Tag {
                            type_name: self.key.to_string(),
                            field: field.name.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            self.fields.retain(|f| f.name != field.name);
            self.fields.push(FieldDescriptor {
                name: field.name.clone(),
                ty,
                tag: field.tag.clone(),
            });
        }
    }

    fn flatten(&mut self, field: &'m source::SourceField, visiting: &mut Vec<&'m str>) {
        let name = match &field.ty.kind {
            source::TypeKind::Path { name, .. } => name.as_str(),
            _ => {
                warn!(key = %self.key, field = %field.name, ty = %field.ty.text, "cannot flatten non-path type");
                return;
            }
        };
        let Some(inner) = self.module.find_struct(name) else {
            warn!(key = %self.key, field = %field.name, ty = %name, "flattened type not found in module, skipping");
            return;
        };
        if visiting.contains(&name) {
            warn!(key = %self.key, ty = %name, "recursive flatten, skipping");
            return;
        }
        visiting.push(name);
        self.collect(inner, visiting);
        visiting.pop();
    }
}

/// Module path of a source file relative to the crate's source root.
///
/// `lib.rs` and `main.rs` are the crate root; `a.rs` and `a/mod.rs` are
/// `crate::a`. Dashes in the crate name become underscores.
pub fn module_path(crate_name: &str, relative: &Path) -> String {
    let mut segments = vec![crate_name.replace('-', "_")];
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let last = parts.len().saturating_sub(1);
    for (i, part) in parts.iter().enumerate() {
        if i < last {
            segments.push(part.clone());
            continue;
        }
        let stem = part.strip_suffix(".rs").unwrap_or(part);
        let is_root = i == 0 && matches!(stem, "lib" | "main");
        if !is_root && stem != "mod" {
            segments.push(stem.to_string());
        }
    }
    segments.join("::")
}

/// Extracts rules from every matching file under a source root
#[derive(Debug, Clone)]
pub struct Extractor {
    crate_name: String,
    root: PathBuf,
    include: Vec<GlobPattern>,
    exclude: Vec<GlobPattern>,
}

impl Extractor {
    /// Creates an extractor for `crate_name` with sources under `root`
    pub fn new(crate_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            crate_name: crate_name.into(),
            root: root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn include(mut self, patterns: Vec<GlobPattern>) -> Self {
        self.include = patterns;
        self
    }

    pub fn exclude(mut self, patterns: Vec<GlobPattern>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extracts from the whole source root
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Walk` if the globs are invalid or the walk fails.
    pub fn extract(&self) -> Result<Extraction, ExtractError> {
        let files = self.discover(&self.root)?;
        Ok(self.extract_files(files))
    }

    /// Extracts from specific files or directories below the source root
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Walk` if a directory cannot be walked.
    pub fn extract_paths(&self, paths: &[PathBuf]) -> Result<Extraction, ExtractError> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                files.extend(self.discover(path)?);
            } else {
                files.push(FileEntry {
                    path: path.clone(),
                    relative: self.relative(path),
                });
            }
        }
        Ok(self.extract_files(files))
    }

    fn discover(&self, dir: &Path) -> Result<Vec<FileEntry>, ExtractError> {
        let verbose = tracing::enabled!(tracing::Level::DEBUG);
        let walker = FileWalker::with_verbose(dir, &self.include, &self.exclude, verbose)?;
        let mut files = Vec::new();
        for result in walker.walk_with_skip_info() {
            match result? {
                WalkResult::File(mut file) => {
                    file.relative = self.relative(&file.path);
                    files.push(file);
                }
                WalkResult::Skipped { path, reason } => {
                    if reason != SkipReason::NotAFile {
                        debug!(path = %path.display(), reason = ?reason, "skipping file");
                    }
                }
            }
        }
        Ok(files)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    fn extract_files(&self, mut files: Vec<FileEntry>) -> Extraction {
        files.sort();
        files.dedup();
        debug!(files = files.len(), root = %self.root.display(), "extracting rules");

        let results: Vec<Extraction> = files
            .par_iter()
            .filter_map(|file| match self.extract_file(file) {
                Ok(extraction) => Some(extraction),
                Err(e) => {
                    warn!(file = %file.path.display(), error = %e, "failed to extract file, skipping");
                    None
                }
            })
            .collect();

        results.into_iter().fold(Extraction::default(), |mut acc, next| {
            acc.merge(next);
            acc
        })
    }

    /// Extracts from one discovered file
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Io` if the file cannot be read and
    /// `ExtractError::Parse` if it does not parse.
    pub fn extract_file(&self, file: &FileEntry) -> Result<Extraction, ExtractError> {
        let source = fs::read_to_string(&file.path)?;
        let module = module_path(&self.crate_name, &file.relative);
        extract_source(&file.path, &source, &module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Extraction {
        extract_source(Path::new("lib.rs"), source, "app").unwrap()
    }

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("my-app", Path::new("lib.rs")), "my_app");
        assert_eq!(module_path("app", Path::new("main.rs")), "app");
        assert_eq!(module_path("app", Path::new("models.rs")), "app::models");
        assert_eq!(module_path("app", Path::new("models/mod.rs")), "app::models");
        assert_eq!(module_path("app", Path::new("models/user.rs")), "app::models::user");
        assert_eq!(module_path("app", Path::new("models/lib.rs")), "app::models::lib");
    }

    #[test]
    fn test_type_and_field_rules() {
        let extraction = extract(
            r#"
/// @cel: self.name != ""
pub struct User {
    #[validate("nonzero")]
    pub name: String,
    #[validate("nonzero,email")]
    pub email: String,
    pub age: u32,
}
"#,
        );
        let rules = &extraction.rule_sets["app.User"];
        assert_eq!(rules.type_rules, vec![r#"self.name != """#]);
        assert_eq!(rules.rules_for("name"), [r#"self != """#]);
        assert_eq!(rules.rules_for("email").len(), 1);
        assert!(rules.rules_for("age").is_empty());

        let descriptor = &extraction.descriptors[0];
        assert_eq!(descriptor.qualified_name(), "app.User");
        assert_eq!(descriptor.module_name, "app");
        assert_eq!(descriptor.fields.len(), 3);
    }

    #[test]
    fn test_types_without_rules_are_omitted() {
        let extraction = extract("pub struct Plain { pub id: u64 }");
        assert!(extraction.is_empty());
        assert!(extraction.descriptors.is_empty());
    }

    #[test]
    fn test_generic_keys() {
        let extraction = extract(
            r#"
/// @cel: self.value != null
pub struct Wrapper<T> {
    #[validate("required")]
    pub value: T,
}

pub struct Pair<K, V> {
    #[validate("nonzero")]
    pub key: K,
    pub value: V,
}
"#,
        );
        assert!(extraction.rule_sets.contains_key("app.Wrapper[T]"));
        assert_eq!(
            extraction.rule_sets["app.Wrapper[T]"].rules_for("value"),
            ["self != null"]
        );
        assert!(extraction.rule_sets.contains_key("app.Pair[K, V]"));
    }

    #[test]
    fn test_flattened_fields_last_writer_wins() {
        let extraction = extract(
            r#"
pub struct Base {
    #[validate("nonzero")]
    pub id: String,
    #[validate("nonzero")]
    pub name: String,
}

pub struct Account {
    #[validate(flatten)]
    pub base: Base,
    #[validate("cel:self.size() > 3")]
    pub name: String,
}
"#,
        );
        let account = &extraction.rule_sets["app.Account"];
        assert_eq!(account.rules_for("id"), [r#"self != """#]);
        assert_eq!(account.rules_for("name"), ["self.size() > 3"]);

        let descriptor = extraction
            .descriptors
            .iter()
            .find(|d| d.type_name == "Account")
            .unwrap();
        let names: Vec<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_recursive_flatten_is_skipped() {
        let extraction = extract(
            r#"
pub struct Node {
    #[serde(flatten)]
    pub next: Node,
    #[validate("nonzero")]
    pub id: u64,
}
"#,
        );
        assert_eq!(extraction.rule_sets["app.Node"].rules_for("id"), ["self != 0"]);
    }

    #[test]
    fn test_tag_errors_are_collected() {
        let extraction = extract(
            r#"
pub struct Bad {
    #[validate("dive,nonzero")]
    pub count: i64,
    #[validate("nonzero")]
    pub name: String,
}
"#,
        );
        assert_eq!(extraction.tag_errors.len(), 1);
        let message = extraction.tag_errors[0].to_string();
        assert!(message.contains("app.Bad.count"), "{message}");
        assert!(message.contains("'dive' on non-slice type: i64"), "{message}");
        let bad = &extraction.rule_sets["app.Bad"];
        assert!(bad.rules_for("count").is_empty());
        assert_eq!(bad.rules_for("name").len(), 1);
    }

    #[test]
    fn test_inline_module_keys() {
        let extraction = extract(
            r#"
pub mod inner {
    pub struct Item {
        #[validate("nonzero")]
        pub sku: String,
    }
}
"#,
        );
        assert!(extraction.rule_sets.contains_key("app::inner.Item"));
        assert_eq!(extraction.descriptors[0].module_name, "inner");
    }

    #[test]
    fn test_parse_error() {
        let err = extract_source(Path::new("broken.rs"), "pub struct {", "app").unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }
}
