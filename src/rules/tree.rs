//! Field tag parsing and rule emission
//!
//! A `validate` tag is a comma separated token list. Tokens are directives
//! (`dive`, `keys`, `values`), raw expressions (`cel:<expr>`) or shorthand
//! names. The list is parsed into a tree of [`RuleNode`]s, then each node is
//! rendered into an expression:
//!
//! - `dive` takes every remaining token as its body, scoped over the slice
//!   element as `x`.
//! - `keys` and `values` take the next node only, scoped over the map key
//!   (`k`) or value (`v`).
//! - consecutive leaves are joined with `&&`; every directive at the top of
//!   the tag becomes its own rule.

use super::shorthand::{self, rebind_self};
use crate::types::{FieldCategory, FieldType};
use std::fmt;
use tracing::warn;

/// Errors raised while translating a tag into rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A directive was applied to a field of the wrong category
    #[error("'{directive}' on non-{expected} type: {ty}")]
    DirectiveMismatch {
        directive: Directive,
        expected: FieldCategory,
        ty: String,
    },

    /// A directive has no tokens after it
    #[error("'{0}' must be followed by a rule")]
    MissingOperand(Directive),

    /// A shorthand does not support the field category
    #[error("shorthand '{shorthand}' is not applicable to {category} type: {ty}")]
    NotApplicable {
        shorthand: String,
        category: FieldCategory,
        ty: String,
    },
}

/// A scope-opening tag token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Dive,
    Keys,
    Values,
}

impl Directive {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "dive" => Some(Directive::Dive),
            "keys" => Some(Directive::Keys),
            "values" => Some(Directive::Values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Dive => "dive",
            Directive::Keys => "keys",
            Directive::Values => "values",
        }
    }

    /// Variable bound inside the directive's scope
    pub fn variable(&self) -> &'static str {
        match self {
            Directive::Dive => "x",
            Directive::Keys => "k",
            Directive::Values => "v",
        }
    }

    fn expected_category(&self) -> FieldCategory {
        match self {
            Directive::Dive => FieldCategory::Slice,
            Directive::Keys | Directive::Values => FieldCategory::Map,
        }
    }

    /// Type of the values the directive ranges over
    fn operand<'a>(&self, ty: &'a FieldType) -> Result<&'a FieldType, TagError> {
        let expected = self.expected_category();
        let operand = if ty.category == expected {
            match self {
                Directive::Dive | Directive::Values => ty.elem.as_deref(),
                Directive::Keys => ty.key.as_deref(),
            }
        } else {
            None
        };
        operand.ok_or_else(|| TagError::DirectiveMismatch {
            directive: *self,
            expected,
            ty: ty.display.clone(),
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single condition inside a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A shorthand name such as `nonzero`
    Shorthand(String),
    /// A raw expression written over `self`
    Expr(String),
}

/// One node of a parsed tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleNode {
    Leaf {
        ty: FieldType,
        conditions: Vec<Condition>,
    },
    Directive {
        directive: Directive,
        children: Vec<RuleNode>,
    },
}

impl RuleNode {
    /// Renders this node over the scope variable `scope`.
    ///
    /// Returns `Ok(None)` when nothing remains after unknown shorthands are
    /// dropped.
    pub fn to_cel(&self, scope: &str) -> Result<Option<String>, TagError> {
        match self {
            RuleNode::Leaf { ty, conditions } => {
                let mut parts = Vec::with_capacity(conditions.len());
                for condition in conditions {
                    if let Some(expr) = render_condition(condition, ty, scope)? {
                        parts.push(expr);
                    }
                }
                Ok((!parts.is_empty()).then(|| parts.join(" && ")))
            }
            RuleNode::Directive {
                directive,
                children,
            } => {
                let var = directive.variable();
                let mut body = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(expr) = child.to_cel(var)? {
                        body.push(expr);
                    }
                }
                if body.is_empty() {
                    warn!(directive = %directive, "directive has no applicable rules");
                    return Ok(None);
                }
                Ok(Some(format!("{}.all({}, {})", scope, var, body.join(" && "))))
            }
        }
    }

    fn is_directive(&self) -> bool {
        matches!(self, RuleNode::Directive { .. })
    }
}

fn render_condition(
    condition: &Condition,
    ty: &FieldType,
    scope: &str,
) -> Result<Option<String>, TagError> {
    match condition {
        Condition::Expr(expr) => Ok(Some(rebind_self(expr, scope))),
        Condition::Shorthand(name) => {
            let Some(shorthand) = shorthand::lookup(name) else {
                warn!(shorthand = %name, "unsupported validation shorthand");
                return Ok(None);
            };
            let template =
                shorthand
                    .template_for(ty.category)
                    .ok_or_else(|| TagError::NotApplicable {
                        shorthand: name.clone(),
                        category: ty.category,
                        ty: ty.display.clone(),
                    })?;
            Ok(Some(rebind_self(template, scope)))
        }
    }
}

/// Parses a tag value into rule nodes for a field of type `ty`
///
/// # Errors
///
/// Returns `TagError` when a directive does not fit the field type or is
/// missing its operand.
pub fn parse_tag(tag: &str, ty: &FieldType) -> Result<Vec<RuleNode>, TagError> {
    let tokens: Vec<&str> = tag.split(',').collect();
    parse_sequence(&tokens, ty)
}

fn parse_sequence(mut tokens: &[&str], ty: &FieldType) -> Result<Vec<RuleNode>, TagError> {
    let mut nodes = Vec::new();
    while !tokens.is_empty() {
        let (node, rest) = parse_node(tokens, ty)?;
        if let Some(node) = node {
            nodes.push(node);
        }
        tokens = rest;
    }
    Ok(nodes)
}

fn is_boundary(token: &str) -> bool {
    let token = token.trim();
    Directive::from_token(token).is_some() || token.starts_with("cel:")
}

fn parse_node<'t, 's>(
    tokens: &'t [&'s str],
    ty: &FieldType,
) -> Result<(Option<RuleNode>, &'t [&'s str]), TagError> {
    let Some((first, rest)) = tokens.split_first() else {
        return Ok((None, tokens));
    };
    let token = first.trim();

    if let Some(directive) = Directive::from_token(token) {
        let operand = directive.operand(ty)?;
        return match directive {
            Directive::Dive => {
                let children = parse_sequence(rest, operand)?;
                Ok((Some(RuleNode::Directive { directive, children }), &[]))
            }
            Directive::Keys | Directive::Values => {
                if rest.is_empty() {
                    return Err(TagError::MissingOperand(directive));
                }
                let (child, remaining) = parse_node(rest, operand)?;
                let node = RuleNode::Directive {
                    directive,
                    children: child.into_iter().collect(),
                };
                Ok((Some(node), remaining))
            }
        };
    }

    if let Some(expr) = token.strip_prefix("cel:") {
        // Commas inside the expression split it across tokens; rejoin up to
        // the next directive.
        let mut source = expr.to_string();
        let end = rest
            .iter()
            .position(|t| Directive::from_token(t.trim()).is_some())
            .unwrap_or(rest.len());
        for part in &rest[..end] {
            source.push(',');
            source.push_str(part);
        }
        let node = RuleNode::Leaf {
            ty: ty.clone(),
            conditions: vec![Condition::Expr(source.trim().to_string())],
        };
        return Ok((Some(node), &rest[end..]));
    }

    let end = tokens
        .iter()
        .position(|t| is_boundary(t))
        .unwrap_or(tokens.len());
    let conditions: Vec<Condition> = tokens[..end]
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| Condition::Shorthand(t.to_string()))
        .collect();
    let node = (!conditions.is_empty()).then(|| RuleNode::Leaf {
        ty: ty.clone(),
        conditions,
    });
    Ok((node, &tokens[end..]))
}

/// Translates a tag into the ordered rule strings for one field.
///
/// Leaves are accumulated and joined with `&&`; a top-level directive
/// flushes the pending leaves and is emitted as its own rule.
///
/// # Errors
///
/// Returns `TagError` for directive/category mismatches, missing operands
/// and shorthands that do not apply to the field category.
pub fn compile_tag(tag: &str, ty: &FieldType) -> Result<Vec<String>, TagError> {
    let nodes = parse_tag(tag, ty)?;
    let mut rules = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for node in &nodes {
        let Some(expr) = node.to_cel("self")? else {
            continue;
        };
        if node.is_directive() {
            if !pending.is_empty() {
                rules.push(pending.join(" && "));
                pending.clear();
            }
            rules.push(expr);
        } else {
            pending.push(expr);
        }
    }
    if !pending.is_empty() {
        rules.push(pending.join(" && "));
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::shorthand::EMAIL_RULE;

    fn string() -> FieldType {
        FieldType::leaf(FieldCategory::String, "String")
    }

    fn int() -> FieldType {
        FieldType::leaf(FieldCategory::Int, "i64")
    }

    fn option_int() -> FieldType {
        FieldType::leaf(FieldCategory::Ptr, "Option<i64>")
    }

    fn email_over(var: &str) -> String {
        rebind_self(EMAIL_RULE, var)
    }

    #[test]
    fn test_shorthands_join_with_and() {
        let rules = compile_tag("nonzero,email", &string()).unwrap();
        assert_eq!(rules, vec![format!(r#"self != "" && {}"#, EMAIL_RULE)]);
    }

    #[test]
    fn test_required_on_option() {
        assert_eq!(compile_tag("required", &option_int()).unwrap(), vec!["self != null"]);
    }

    #[test]
    fn test_required_on_string_is_not_applicable() {
        let err = compile_tag("required", &string()).unwrap_err();
        assert!(matches!(err, TagError::NotApplicable { .. }));
    }

    #[test]
    fn test_unknown_shorthand_is_skipped() {
        assert_eq!(compile_tag("uuid,nonzero", &int()).unwrap(), vec!["self != 0"]);
        assert!(compile_tag("uuid", &int()).unwrap().is_empty());
    }

    #[test]
    fn test_nested_dive() {
        let matrix = FieldType::slice("Vec<Vec<i64>>", FieldType::slice("Vec<i64>", int()));
        assert_eq!(
            compile_tag("dive,dive,nonzero", &matrix).unwrap(),
            vec!["self.all(x, x.all(x, x != 0))"]
        );
    }

    #[test]
    fn test_keys_and_values_emit_separate_rules() {
        let map = FieldType::map("HashMap<String, Option<i64>>", string(), option_int());
        assert_eq!(
            compile_tag("keys,cel:self.startsWith('id_'),values,required", &map).unwrap(),
            vec![
                "self.all(k, k.startsWith('id_'))".to_string(),
                "self.all(v, v != null)".to_string(),
            ]
        );
    }

    #[test]
    fn test_dive_body_joins_nested_directives() {
        let inner = FieldType::map("HashMap<String, String>", string(), string());
        let list = FieldType::slice("Vec<HashMap<String, String>>", inner);
        assert_eq!(
            compile_tag("dive,nonzero,keys,email,values,nonzero", &list).unwrap(),
            vec![format!(
                r#"self.all(x, x.size() > 0 && x.all(k, {}) && x.all(v, v != ""))"#,
                email_over("k")
            )]
        );
    }

    #[test]
    fn test_values_with_nested_dive() {
        let map = FieldType::map(
            "HashMap<String, Vec<String>>",
            string(),
            FieldType::slice("Vec<String>", string()),
        );
        assert_eq!(
            compile_tag("keys,nonzero,values,dive,nonzero", &map).unwrap(),
            vec![
                r#"self.all(k, k != "")"#.to_string(),
                r#"self.all(v, v.all(x, x != ""))"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_cel_expression_keeps_commas() {
        let rules = compile_tag("cel:self in ['a', 'b']", &string()).unwrap();
        assert_eq!(rules, vec!["self in ['a', 'b']"]);
    }

    #[test]
    fn test_shorthand_then_cel() {
        let rules = compile_tag("nonzero,cel:self.size() > 1", &string()).unwrap();
        assert_eq!(rules, vec![r#"self != "" && self.size() > 1"#]);
    }

    #[test]
    fn test_leaves_before_directive_are_flushed() {
        let list = FieldType::slice("Vec<i64>", int());
        assert_eq!(
            compile_tag("nonzero,dive,cel:self >= 0", &list).unwrap(),
            vec!["self.size() > 0".to_string(), "self.all(x, x >= 0)".to_string()]
        );
    }

    #[test]
    fn test_dive_on_non_slice() {
        let err = compile_tag("dive,nonzero", &int()).unwrap_err();
        assert_eq!(err.to_string(), "'dive' on non-slice type: i64");
    }

    #[test]
    fn test_keys_without_operand() {
        let map = FieldType::map("HashMap<String, i64>", string(), int());
        assert_eq!(
            compile_tag("keys", &map).unwrap_err(),
            TagError::MissingOperand(Directive::Keys)
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let map = FieldType::map("HashMap<String, Option<i64>>", string(), option_int());
        let tag = "keys,email,values,nonzero";
        assert_eq!(compile_tag(tag, &map).unwrap(), compile_tag(tag, &map).unwrap());
    }
}
