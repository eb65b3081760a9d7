//! Runtime reflection for validation
//!
//! The validator walks object graphs through two traits. [`Reflect`]
//! describes the shape of any value (scalar, optional, record, list or map)
//! and converts it into an expression value. [`Record`] exposes a struct's
//! qualified type path and its fields in declaration order.
//!
//! Structs opt in with [`impl_record!`](crate::impl_record):
//!
//! ```
//! use veritas::impl_record;
//!
//! pub struct Item {
//!     pub name: String,
//! }
//!
//! pub struct Pair<K, V> {
//!     pub key: K,
//!     pub value: V,
//! }
//!
//! impl_record!(Item { name });
//! impl_record!(Pair<K, V> { key, value });
//! ```

mod impls;

pub use impls::MapKey;

use crate::cel::{Key, RecordType, RecordValue, Type, Value};
use std::any::Any;
use std::collections::BTreeMap;

/// How a value is laid out, as far as the validator is concerned
pub enum Shape<'a> {
    /// A leaf value with no nested records
    Scalar,
    /// An optional value; `None` is the null pointer
    Pointer(Option<&'a dyn Reflect>),
    /// A struct with fields
    Record(&'a dyn Record),
    /// Ordered elements
    List(Vec<&'a dyn Reflect>),
    /// Map values; keys are never walked
    Map(Vec<&'a dyn Reflect>),
}

/// A value the validator can inspect
pub trait Reflect: Any + Send + Sync {
    /// The value's layout
    fn shape(&self) -> Shape<'_>;

    /// Converts the value into an expression value
    fn to_value(&self) -> Value;

    fn as_any(&self) -> &dyn Any;

    /// Type declared for this value when it appears as a record field in a
    /// native environment. Nullable and record types are dynamic.
    fn static_type() -> Type
    where
        Self: Sized,
    {
        Type::Dyn
    }
}

/// Where a record type is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypePath {
    /// `module_path!()` of the declaring module
    pub module_path: &'static str,
    /// Type name without generic arguments
    pub name: &'static str,
    /// Declared generic parameter names
    pub params: &'static [&'static str],
}

impl TypePath {
    /// `<module_path>.<Name>`, without generic parameters
    pub fn base_name(&self) -> String {
        format!("{}.{}", self.module_path, self.name)
    }

    /// The key the extractor emits for this type, e.g. `app.Pair[K, V]`
    pub fn rule_key(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        crate::types::qualified_name(self.module_path, self.name, &params)
    }

    pub fn is_generic(&self) -> bool {
        !self.params.is_empty()
    }
}

/// A named field of a record
pub struct Field<'a> {
    pub name: &'static str,
    pub value: &'a dyn Reflect,
}

impl<'a> Field<'a> {
    pub fn new<T: Reflect>(name: &'static str, value: &'a T) -> Self {
        Self { name, value }
    }
}

/// A struct whose fields the validator can visit
pub trait Record: Reflect {
    fn type_path(&self) -> TypePath;

    /// Fields in declaration order; flattened fields are expanded in place
    fn fields(&self) -> Vec<Field<'_>>;

    /// Static field types, in the same order as `fields`
    fn field_types(&self) -> Vec<(&'static str, Type)>;
}

/// Static type of a value, for use from macros
pub fn static_type_of<T: Reflect>(_value: &T) -> Type {
    T::static_type()
}

/// Builds the expression value of a record
pub fn record_value(record: &dyn Record) -> Value {
    let fields: BTreeMap<String, Value> = record
        .fields()
        .into_iter()
        .map(|field| (field.name.to_string(), field.value.to_value()))
        .collect();
    Value::record(RecordValue {
        type_name: record.type_path().base_name(),
        fields,
    })
}

/// Declares the record type of an instance for a native environment
pub fn record_type(record: &dyn Record) -> RecordType {
    record
        .field_types()
        .into_iter()
        .fold(RecordType::new(record.type_path().base_name()), |ty, (name, field)| {
            ty.with_field(name, field)
        })
}

/// Follows optional values down to a record, if there is one
pub fn as_record(value: &dyn Reflect) -> Option<&dyn Record> {
    match value.shape() {
        Shape::Record(record) => Some(record),
        Shape::Pointer(Some(inner)) => as_record(inner),
        _ => None,
    }
}

/// Converts map entries into expression map entries
pub(crate) fn map_value<'a, K, V, I>(entries: I) -> Value
where
    K: MapKey + 'a,
    V: Reflect,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let map: BTreeMap<Key, Value> = entries.map(|(k, v)| (k.to_key(), v.to_value())).collect();
    Value::map(map)
}

/// Implements [`Reflect`] and [`Record`] for a struct.
///
/// Fields are listed in declaration order. A field prefixed with
/// `#[flatten]` must itself be a record; its fields are promoted into the
/// enclosing record. Generic parameters must implement [`Reflect`].
///
/// ```
/// use veritas::impl_record;
///
/// pub struct Base {
///     pub id: String,
/// }
///
/// pub struct Account {
///     pub base: Base,
///     pub email: String,
/// }
///
/// impl_record!(Base { id });
/// impl_record!(Account { #[flatten] base, email });
/// ```
#[macro_export]
macro_rules! impl_record {
    (@fields $self:ident, $out:ident,) => {};
    (@fields $self:ident, $out:ident, #[flatten] $field:ident $(, $($rest:tt)*)?) => {
        $out.extend($crate::Record::fields(&$self.$field));
        $crate::impl_record!(@fields $self, $out, $($($rest)*)?);
    };
    (@fields $self:ident, $out:ident, $field:ident $(, $($rest:tt)*)?) => {
        $out.push($crate::reflect::Field::new(::std::stringify!($field), &$self.$field));
        $crate::impl_record!(@fields $self, $out, $($($rest)*)?);
    };

    (@types $self:ident, $out:ident,) => {};
    (@types $self:ident, $out:ident, #[flatten] $field:ident $(, $($rest:tt)*)?) => {
        $out.extend($crate::Record::field_types(&$self.$field));
        $crate::impl_record!(@types $self, $out, $($($rest)*)?);
    };
    (@types $self:ident, $out:ident, $field:ident $(, $($rest:tt)*)?) => {
        $out.push((
            ::std::stringify!($field),
            $crate::reflect::static_type_of(&$self.$field),
        ));
        $crate::impl_record!(@types $self, $out, $($($rest)*)?);
    };

    ($name:ident $(< $($param:ident),+ $(,)? >)? { $($fields:tt)* }) => {
        impl $(< $($param: $crate::Reflect),+ >)? $crate::Reflect for $name $(< $($param),+ >)? {
            fn shape(&self) -> $crate::reflect::Shape<'_> {
                $crate::reflect::Shape::Record(self)
            }

            fn to_value(&self) -> $crate::cel::Value {
                $crate::reflect::record_value(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl $(< $($param: $crate::Reflect),+ >)? $crate::Record for $name $(< $($param),+ >)? {
            fn type_path(&self) -> $crate::reflect::TypePath {
                $crate::reflect::TypePath {
                    module_path: ::std::module_path!(),
                    name: ::std::stringify!($name),
                    params: &[$($(::std::stringify!($param)),+)?],
                }
            }

            fn fields(&self) -> ::std::vec::Vec<$crate::reflect::Field<'_>> {
                let mut fields = ::std::vec::Vec::new();
                $crate::impl_record!(@fields self, fields, $($fields)*);
                fields
            }

            fn field_types(&self) -> ::std::vec::Vec<(&'static str, $crate::cel::Type)> {
                let mut types = ::std::vec::Vec::new();
                $crate::impl_record!(@types self, types, $($fields)*);
                types
            }
        }
    };
}
