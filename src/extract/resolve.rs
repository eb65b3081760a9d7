//! Field category resolution

use super::source::{TypeExpr, TypeKind};
use crate::types::{FieldCategory, FieldType};
use std::collections::HashMap;

/// Alias chains longer than this are treated as unresolvable
const MAX_ALIAS_DEPTH: usize = 16;

/// Names visible while resolving the fields of one struct
pub(crate) struct Scope<'a> {
    pub aliases: &'a HashMap<String, TypeExpr>,
    pub type_params: &'a [String],
}

impl Scope<'_> {
    /// Resolves a written type into its category and element types
    pub fn resolve(&self, ty: &TypeExpr) -> FieldType {
        self.resolve_at(ty, 0)
    }

    fn resolve_at(&self, ty: &TypeExpr, depth: usize) -> FieldType {
        let other = || FieldType::leaf(FieldCategory::Other, ty.text.as_str());
        match &ty.kind {
            TypeKind::Reference(inner) => self.transparent(ty, inner, depth),
            TypeKind::Array(elem) => FieldType::slice(ty.text.as_str(), self.resolve_at(elem, depth)),
            TypeKind::Other => other(),
            TypeKind::Path { name, args } => {
                if args.is_empty() && self.type_params.iter().any(|p| p == name) {
                    return FieldType::leaf(FieldCategory::Ptr, ty.text.as_str());
                }
                if let Some(category) = scalar_category(name) {
                    return FieldType::leaf(category, ty.text.as_str());
                }
                match (name.as_str(), args.as_slice()) {
                    ("Option", _) => FieldType::leaf(FieldCategory::Ptr, ty.text.as_str()),
                    ("Cow", [.., inner]) => {
                        let resolved = self.resolve_at(inner, depth);
                        FieldType {
                            display: ty.text.clone(),
                            ..resolved
                        }
                    }
                    ("Box" | "Arc" | "Rc", [inner]) => self.transparent(ty, inner, depth),
                    ("Vec" | "VecDeque" | "HashSet" | "BTreeSet", [elem]) => {
                        FieldType::slice(ty.text.as_str(), self.resolve_at(elem, depth))
                    }
                    ("HashMap" | "BTreeMap" | "IndexMap", [key, value, ..]) => FieldType::map(
                        ty.text.as_str(),
                        self.resolve_at(key, depth),
                        self.resolve_at(value, depth),
                    ),
                    _ => match self.aliases.get(name) {
                        Some(target) if depth < MAX_ALIAS_DEPTH => FieldType {
                            display: ty.text.clone(),
                            ..self.resolve_at(target, depth + 1)
                        },
                        _ => other(),
                    },
                }
            }
        }
    }

    fn transparent(&self, outer: &TypeExpr, inner: &TypeExpr, depth: usize) -> FieldType {
        FieldType {
            display: outer.text.clone(),
            ..self.resolve_at(inner, depth)
        }
    }
}

fn scalar_category(name: &str) -> Option<FieldCategory> {
    let category = match name {
        "String" | "str" => FieldCategory::String,
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" => FieldCategory::Int,
        "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => FieldCategory::Uint,
        "f32" | "f64" => FieldCategory::Float,
        "bool" => FieldCategory::Bool,
        _ => return None,
    };
    Some(category)
}
