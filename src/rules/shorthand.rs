//! Shorthand validation tokens
//!
//! A shorthand is a short tag token such as `nonzero` that expands into a
//! full expression. Some expansions depend on the category of the field
//! they are applied to.

use crate::cel::lexer::Lexer;
use crate::cel::token::TokenKind;
use crate::types::FieldCategory;

/// Expansion templates of a shorthand; every template is written over `self`
#[derive(Debug, Clone, Copy)]
pub enum Templates {
    /// The same expression for every category
    Any(&'static str),
    /// One expression per supported category
    ByCategory(&'static [(FieldCategory, &'static str)]),
}

/// A predefined shorthand token
#[derive(Debug, Clone, Copy)]
pub struct Shorthand {
    pub name: &'static str,
    pub templates: Templates,
}

impl Shorthand {
    /// Returns the template for a field category, if the shorthand supports it
    pub fn template_for(&self, category: FieldCategory) -> Option<&'static str> {
        match self.templates {
            Templates::Any(template) => Some(template),
            Templates::ByCategory(table) => table
                .iter()
                .find(|(c, _)| *c == category)
                .map(|(_, template)| *template),
        }
    }
}

/// Pattern used by the `email` shorthand
pub const EMAIL_RULE: &str = r"self.matches('^[^\\s@]+@[^\\s@]+\\.[^\\s@]+$')";

/// All predefined shorthands
pub const SHORTHANDS: &[Shorthand] = &[
    Shorthand {
        name: "required",
        templates: Templates::ByCategory(&[(FieldCategory::Ptr, "self != null")]),
    },
    Shorthand {
        name: "nonzero",
        templates: Templates::ByCategory(&[
            (FieldCategory::String, r#"self != """#),
            (FieldCategory::Int, "self != 0"),
            (FieldCategory::Uint, "self != 0"),
            (FieldCategory::Float, "self != 0.0"),
            (FieldCategory::Ptr, "self != null"),
            (FieldCategory::Slice, "self.size() > 0"),
            (FieldCategory::Map, "self.size() > 0"),
            (FieldCategory::Bool, "self"),
        ]),
    },
    Shorthand {
        name: "email",
        templates: Templates::Any(EMAIL_RULE),
    },
];

/// Looks up a shorthand by name
pub fn lookup(name: &str) -> Option<&'static Shorthand> {
    SHORTHANDS.iter().find(|s| s.name == name)
}

/// Rewrites every `self` identifier in `expr` to `var`.
///
/// Only identifier tokens are rewritten, so string literals and longer
/// identifiers such as `myself` are left alone. Text that does not lex is
/// returned unchanged.
pub fn rebind_self(expr: &str, var: &str) -> String {
    if var == "self" {
        return expr.to_string();
    }
    let Ok(tokens) = Lexer::new(expr).tokenize() else {
        return expr.to_string();
    };

    let mut out = String::with_capacity(expr.len());
    let mut last = 0;
    for token in tokens {
        if let TokenKind::Identifier(name) = &token.kind
            && name == "self"
        {
            out.push_str(&expr[last..token.span.start]);
            out.push_str(var);
            last = token.span.end;
        }
    }
    out.push_str(&expr[last..]);
    out
}
