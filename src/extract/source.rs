//! Syntax layer of the extractor
//!
//! Parses a Rust source file with tree-sitter and collects, per module, the
//! named-field structs (doc comments, generic parameters, fields with their
//! `validate`/`serde` attributes) and the `type` aliases declared next to
//! them. Nothing here knows about rules; see `extract` for that.

use std::collections::HashMap;
use tree_sitter::{Node, Parser};

/// A type as written in a field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeExpr {
    /// Source text with whitespace collapsed
    pub text: String,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeKind {
    /// `a::b::Name<Args>`; only the last path segment is kept
    Path { name: String, args: Vec<TypeExpr> },
    /// `&T` and `&mut T`
    Reference(Box<TypeExpr>),
    /// `[T; N]` and `[T]`
    Array(Box<TypeExpr>),
    /// Tuples, function pointers, trait objects, raw pointers
    Other,
}

#[derive(Debug, Clone)]
pub(crate) struct SourceField {
    pub name: String,
    pub ty: TypeExpr,
    /// Concatenated `validate` tags
    pub tag: Option<String>,
    /// `#[validate(flatten)]` or `#[serde(flatten)]`
    pub flatten: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SourceStruct {
    pub name: String,
    pub type_params: Vec<String>,
    /// Expressions from `@cel:` doc lines, in order
    pub doc_rules: Vec<String>,
    pub fields: Vec<SourceField>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SourceModule {
    /// Full module path, e.g. `my_crate::models::inner`
    pub path: String,
    pub structs: Vec<SourceStruct>,
    pub aliases: HashMap<String, TypeExpr>,
}

impl SourceModule {
    pub fn find_struct(&self, name: &str) -> Option<&SourceStruct> {
        self.structs.iter().find(|s| s.name == name)
    }
}

const CEL_MARKER: &str = "@cel:";

/// Parses `source`, returning the file's module and every inline module in
/// it.
///
/// # Errors
///
/// Returns a message if the grammar cannot be loaded or the source has
/// syntax errors.
pub(crate) fn parse_source(source: &str, module_path: &str) -> Result<Vec<SourceModule>, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_rust::language())
        .map_err(|e| format!("failed to load Rust grammar: {}", e))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser returned no tree".to_string())?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(0, |n| n.start_position().row + 1);
        return Err(format!("syntax error at line {}", line));
    }

    let mut modules = Vec::new();
    collect_module(root, module_path.to_string(), source.as_bytes(), &mut modules);
    Ok(modules)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn text<'s>(node: Node<'_>, src: &'s [u8]) -> &'s str {
    node.utf8_text(src).unwrap_or_default()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_module(node: Node<'_>, path: String, src: &[u8], out: &mut Vec<SourceModule>) {
    let mut module = SourceModule {
        path,
        ..SourceModule::default()
    };

    let mut cursor = node.walk();
    let items: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for item in items {
        match item.kind() {
            "struct_item" => {
                if let Some(parsed) = parse_struct(item, src) {
                    module.structs.push(parsed);
                }
            }
            "type_item" => {
                if let (Some(name), Some(target)) = (
                    item.child_by_field_name("name"),
                    item.child_by_field_name("type"),
                ) {
                    module
                        .aliases
                        .insert(text(name, src).to_string(), type_expr(target, src));
                }
            }
            "mod_item" => {
                if let (Some(name), Some(body)) = (
                    item.child_by_field_name("name"),
                    item.child_by_field_name("body"),
                ) {
                    let path = format!("{}::{}", module.path, text(name, src));
                    collect_module(body, path, src, out);
                }
            }
            _ => {}
        }
    }

    out.push(module);
}

fn parse_struct(item: Node<'_>, src: &[u8]) -> Option<SourceStruct> {
    let name = text(item.child_by_field_name("name")?, src).to_string();

    let type_params = item
        .child_by_field_name("type_parameters")
        .map(|params| type_params(params, src))
        .unwrap_or_default();

    let doc_rules = doc_lines(item, src)
        .into_iter()
        .filter_map(|line| {
            line.trim()
                .strip_prefix(CEL_MARKER)
                .map(|rule| rule.trim().to_string())
        })
        .filter(|rule| !rule.is_empty())
        .collect();

    let fields = match item.child_by_field_name("body") {
        Some(body) if body.kind() == "field_declaration_list" => fields(body, src),
        _ => Vec::new(),
    };

    Some(SourceStruct {
        name,
        type_params,
        doc_rules,
        fields,
    })
}

fn type_params(params: Node<'_>, src: &[u8]) -> Vec<String> {
    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter_map(|param| match param.kind() {
            "type_identifier" => Some(text(param, src).to_string()),
            "constrained_type_parameter" => param
                .child_by_field_name("left")
                .filter(|left| left.kind() == "type_identifier")
                .map(|left| text(left, src).to_string()),
            "optional_type_parameter" => param
                .child_by_field_name("name")
                .filter(|name| name.kind() == "type_identifier")
                .map(|name| text(name, src).to_string()),
            _ => None,
        })
        .collect()
}

/// Outer doc text attached to an item: `///` lines and `#[doc = "..."]`
fn doc_lines(item: Node<'_>, src: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut prev = item.prev_named_sibling();
    while let Some(node) = prev {
        match node.kind() {
            "line_comment" => {
                let comment = text(node, src);
                if let Some(doc) = comment.strip_prefix("///")
                    && !doc.starts_with('/')
                {
                    lines.push(doc.trim_end_matches(['\r', '\n']).to_string());
                }
            }
            "attribute_item" => {
                for attr in Attribute::parse(node, src) {
                    if attr.path == "doc"
                        && let Some(value) = attr.value
                    {
                        lines.extend(value.lines().rev().map(str::to_string));
                    }
                }
            }
            "block_comment" => {}
            _ => break,
        }
        prev = node.prev_named_sibling();
    }
    lines.reverse();
    lines
}

fn fields(body: Node<'_>, src: &[u8]) -> Vec<SourceField> {
    let mut fields = Vec::new();
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut cursor = body.walk();
    let children: Vec<Node<'_>> = body.named_children(&mut cursor).collect();

    for child in children {
        match child.kind() {
            "attribute_item" => attributes.extend(Attribute::parse(child, src)),
            "field_declaration" => {
                let attrs = std::mem::take(&mut attributes);
                let (Some(name), Some(ty)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("type"),
                ) else {
                    continue;
                };

                let mut tags = Vec::new();
                let mut flatten = false;
                for attr in &attrs {
                    match attr.path.as_str() {
                        "validate" => {
                            tags.extend(attr.value.clone());
                            tags.extend(attr.strings.iter().cloned());
                            flatten |= attr.idents.iter().any(|i| i == "flatten");
                        }
                        "serde" => flatten |= attr.idents.iter().any(|i| i == "flatten"),
                        _ => {}
                    }
                }

                fields.push(SourceField {
                    name: text(name, src).to_string(),
                    ty: type_expr(ty, src),
                    tag: (!tags.is_empty()).then(|| tags.join(",")),
                    flatten,
                });
            }
            _ => {}
        }
    }
    fields
}

/// The parts of an attribute the extractor cares about
#[derive(Debug, Default)]
struct Attribute {
    path: String,
    /// `#[path = "value"]`
    value: Option<String>,
    /// String literals inside `#[path(...)]`
    strings: Vec<String>,
    /// Bare identifiers inside `#[path(...)]`
    idents: Vec<String>,
}

impl Attribute {
    /// Parses an attribute item. `#[cfg_attr(pred, validate(...), ...)]`
    /// yields the `validate` and `serde` attributes it wraps.
    fn parse(item: Node<'_>, src: &[u8]) -> Vec<Self> {
        let mut cursor = item.walk();
        let Some(attr) = item
            .named_children(&mut cursor)
            .find(|n| n.kind() == "attribute")
        else {
            return Vec::new();
        };
        let Some(path) = attr.named_child(0) else {
            return Vec::new();
        };
        let path = text(path, src);

        if path == "cfg_attr" {
            return attr
                .child_by_field_name("arguments")
                .map(|arguments| Self::wrapped(arguments, src))
                .unwrap_or_default();
        }

        let mut parsed = Attribute {
            path: path.to_string(),
            ..Attribute::default()
        };
        if let Some(value) = attr.child_by_field_name("value") {
            parsed.value = literal_value(text(value, src));
        }
        if let Some(arguments) = attr.child_by_field_name("arguments") {
            parsed.read_arguments(arguments, src);
        }
        vec![parsed]
    }

    /// `validate(...)` and `serde(...)` groups inside a `cfg_attr` token tree
    fn wrapped(arguments: Node<'_>, src: &[u8]) -> Vec<Self> {
        let mut cursor = arguments.walk();
        let tokens: Vec<Node<'_>> = arguments.named_children(&mut cursor).collect();
        tokens
            .windows(2)
            .filter_map(|pair| {
                let (name, group) = (pair[0], pair[1]);
                let path = text(name, src);
                if name.kind() != "identifier"
                    || group.kind() != "token_tree"
                    || !matches!(path, "validate" | "serde")
                {
                    return None;
                }
                let mut parsed = Attribute {
                    path: path.to_string(),
                    ..Attribute::default()
                };
                parsed.read_arguments(group, src);
                Some(parsed)
            })
            .collect()
    }

    fn read_arguments(&mut self, arguments: Node<'_>, src: &[u8]) {
        let mut cursor = arguments.walk();
        for token in arguments.named_children(&mut cursor) {
            match token.kind() {
                "string_literal" | "raw_string_literal" => {
                    self.strings.extend(literal_value(text(token, src)));
                }
                "identifier" => self.idents.push(text(token, src).to_string()),
                _ => {}
            }
        }
    }
}

/// Decodes a string or raw string literal
fn literal_value(literal: &str) -> Option<String> {
    if let Some(raw) = literal.strip_prefix('r') {
        let hashes = raw.len() - raw.trim_start_matches('#').len();
        let fence = "#".repeat(hashes);
        return raw
            .strip_prefix(&fence)?
            .strip_prefix('"')?
            .strip_suffix(&fence)?
            .strip_suffix('"')
            .map(str::to_string);
    }

    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            // Line continuation
            Some('\n') => {
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

fn type_expr(node: Node<'_>, src: &[u8]) -> TypeExpr {
    let kind = match node.kind() {
        "primitive_type" | "type_identifier" => TypeKind::Path {
            name: text(node, src).to_string(),
            args: Vec::new(),
        },
        "scoped_type_identifier" => TypeKind::Path {
            name: node
                .child_by_field_name("name")
                .map(|n| text(n, src).to_string())
                .unwrap_or_default(),
            args: Vec::new(),
        },
        "generic_type" => generic_type(node, src),
        "reference_type" => match node.child_by_field_name("type") {
            Some(inner) => TypeKind::Reference(Box::new(type_expr(inner, src))),
            None => TypeKind::Other,
        },
        "array_type" => match node.child_by_field_name("element") {
            Some(elem) => TypeKind::Array(Box::new(type_expr(elem, src))),
            None => TypeKind::Other,
        },
        _ => TypeKind::Other,
    };
    TypeExpr {
        text: collapse(text(node, src)),
        kind,
    }
}

fn generic_type(node: Node<'_>, src: &[u8]) -> TypeKind {
    let Some(base) = node.child_by_field_name("type") else {
        return TypeKind::Other;
    };
    let TypeKind::Path { name, .. } = type_expr(base, src).kind else {
        return TypeKind::Other;
    };

    let args = match node.child_by_field_name("type_arguments") {
        Some(arguments) => {
            let mut cursor = arguments.walk();
            arguments
                .named_children(&mut cursor)
                .filter(|arg| !matches!(arg.kind(), "lifetime" | "type_binding" | "block"))
                .map(|arg| type_expr(arg, src))
                .collect()
        }
        None => Vec::new(),
    };
    TypeKind::Path { name, args }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> SourceModule {
        let mut modules = parse_source(source, "app").unwrap();
        assert_eq!(modules.len(), 1);
        modules.remove(0)
    }

    #[test]
    fn test_struct_with_doc_rules_and_tags() {
        let module = parse_one(
            r#"
/// A user account.
/// @cel: self.name != self.email
#[derive(Debug)]
pub struct User {
    #[validate("nonzero")]
    pub name: String,
    /// not a rule
    #[validate = "email"]
    pub email: String,
    age: u8,
}
"#,
        );
        let user = module.find_struct("User").unwrap();
        assert_eq!(user.doc_rules, vec!["self.name != self.email"]);
        let tags: Vec<Option<&str>> = user.fields.iter().map(|f| f.tag.as_deref()).collect();
        assert_eq!(tags, vec![Some("nonzero"), Some("email"), None]);
        assert_eq!(user.fields[2].ty.text, "u8");
    }

    #[test]
    fn test_doc_attribute_rules() {
        let module = parse_one(
            r#"
#[doc = "@cel: self.min <= self.max"]
struct Range { min: i64, max: i64 }
"#,
        );
        assert_eq!(
            module.find_struct("Range").unwrap().doc_rules,
            vec!["self.min <= self.max"]
        );
    }

    #[test]
    fn test_generic_params_and_types() {
        let module = parse_one(
            r#"
pub struct Pair<'a, K: Ord, V = ()> {
    #[validate("keys,nonzero")]
    pub items: std::collections::HashMap<K, Vec<&'a V>>,
}
"#,
        );
        let pair = module.find_struct("Pair").unwrap();
        assert_eq!(pair.type_params, vec!["K", "V"]);
        let TypeKind::Path { name, args } = &pair.fields[0].ty.kind else {
            panic!("expected path type");
        };
        assert_eq!(name, "HashMap");
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].text, "Vec<&'a V>");
    }

    #[test]
    fn test_flatten_and_raw_tags() {
        let module = parse_one(
            r##"
struct Outer {
    #[serde(flatten)]
    base: Base,
    #[validate(flatten)]
    other: Other,
    #[validate(r#"cel:self.startsWith("a")"#)]
    code: String,
}
"##,
        );
        let outer = module.find_struct("Outer").unwrap();
        assert!(outer.fields[0].flatten);
        assert!(outer.fields[1].flatten);
        assert_eq!(outer.fields[2].tag.as_deref(), Some(r#"cel:self.startsWith("a")"#));
    }

    #[test]
    fn test_cfg_attr_wrapped_tags() {
        let module = parse_one(
            r#"
struct Order {
    #[cfg_attr(any(), validate("nonzero"))]
    id: String,
    #[cfg_attr(any(), serde(flatten))]
    base: Base,
    #[cfg_attr(feature = "x", derive(Debug))]
    note: String,
}
"#,
        );
        let order = module.find_struct("Order").unwrap();
        assert_eq!(order.fields[0].tag.as_deref(), Some("nonzero"));
        assert!(order.fields[1].flatten);
        assert_eq!(order.fields[2].tag, None);
    }

    #[test]
    fn test_inline_modules_and_aliases() {
        let modules = parse_source(
            r#"
type Ids = Vec<u64>;
mod inner {
    pub struct Item { pub id: u64 }
}
"#,
            "app",
        )
        .unwrap();
        let paths: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["app::inner", "app"]);
        assert!(modules[1].aliases.contains_key("Ids"));
        assert!(modules[0].find_struct("Item").is_some());
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_source("struct {", "app").unwrap_err();
        assert!(err.contains("syntax error"));
    }

    #[test]
    fn test_literal_value() {
        assert_eq!(literal_value(r#""a\"b""#).as_deref(), Some("a\"b"));
        assert_eq!(literal_value(r##"r#"x"y"#"##).as_deref(), Some("x\"y"));
        assert_eq!(literal_value(r#""\s+""#).as_deref(), Some("\\s+"));
        assert_eq!(literal_value("plain"), None);
    }
}
