//! Static types used by the checker

use std::fmt;

/// Static type of an expression or declared variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Unknown until runtime; compatible with everything
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// A registered record type, by qualified name
    Record(String),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Uint | Type::Double)
    }

    /// Returns true if values of the two types may be compared with `==`.
    ///
    /// `null` only compares with `null`, records and dynamic values, so a
    /// non-nullable `string` compared with `null` has no matching overload.
    pub fn is_equatable_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::Null, Type::Null) => true,
            (Type::Null, Type::Record(_)) | (Type::Record(_), Type::Null) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Type::List(a), Type::List(b)) => a.is_equatable_with(b),
            (Type::Map(ka, va), Type::Map(kb, vb)) => {
                ka.is_equatable_with(kb) && va.is_equatable_with(vb)
            }
            (a, b) => a == b,
        }
    }

    /// Returns true if values of the two types may be ordered with `<` and friends
    pub fn is_orderable_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, b) => b.is_dyn() || b.is_numeric() || matches!(b, Type::String | Type::Bool),
            (a, Type::Dyn) => a.is_numeric() || matches!(a, Type::String | Type::Bool),
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Type::String, Type::String) | (Type::Bool, Type::Bool) => true,
            _ => false,
        }
    }

    /// Returns true if a value of type `actual` may be passed where `self` is expected
    pub fn accepts(&self, actual: &Type) -> bool {
        match (self, actual) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::List(a), Type::List(b)) => a.accepts(b),
            (Type::Map(ka, va), Type::Map(kb, vb)) => ka.accepts(kb) && va.accepts(vb),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Dyn => f.write_str("dyn"),
            Type::Null => f.write_str("null_type"),
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::Uint => f.write_str("uint"),
            Type::Double => f.write_str("double"),
            Type::String => f.write_str("string"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(k, v) => write!(f, "map({}, {})", k, v),
            Type::Record(name) => f.write_str(name),
        }
    }
}

/// Field layout of a record type declared in an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_equality_rules() {
        assert!(!Type::String.is_equatable_with(&Type::Null));
        assert!(Type::Dyn.is_equatable_with(&Type::Null));
        assert!(Type::Record("a.B".into()).is_equatable_with(&Type::Null));
        assert!(Type::Int.is_equatable_with(&Type::Double));
    }

    #[test]
    fn test_ordering_rules() {
        assert!(Type::Int.is_orderable_with(&Type::Uint));
        assert!(!Type::String.is_orderable_with(&Type::Int));
        assert!(!Type::list(Type::Int).is_orderable_with(&Type::Dyn));
    }
}
