//! Type adapters
//!
//! In adapter mode a record is shown to its rules as a map. The adapter
//! decides which entries the map has; entries are either ready-made values
//! or borrowed fields that the validator prepares itself (null for empty
//! options, nested maps for records that have their own adapter).

use crate::cel::Value;
use crate::error::AdapterError;
use crate::reflect::{Record, Reflect};
use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// One entry of an adapted record
pub enum AdaptedField<'a> {
    /// A value computed by the adapter
    Value(Value),
    /// A borrowed field, converted by the validator
    Field(&'a dyn Reflect),
}

/// The map view of a record produced by an adapter
#[derive(Default)]
pub struct AdaptedRecord<'a> {
    fields: BTreeMap<String, AdaptedField<'a>>,
}

impl<'a> AdaptedRecord<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field of `record`, under its declared name
    pub fn from_record(record: &'a dyn Record) -> Self {
        let fields = record
            .fields()
            .into_iter()
            .map(|field| (field.name.to_string(), AdaptedField::Field(field.value)))
            .collect();
        Self { fields }
    }

    /// Adds a computed entry
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(name.into(), AdaptedField::Value(value.into()));
        self
    }

    /// Adds a borrowed field
    pub fn with_field<T: Reflect>(mut self, name: impl Into<String>, value: &'a T) -> Self {
        self.fields.insert(name.into(), AdaptedField::Field(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AdaptedField<'a>> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AdaptedField<'a>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Type-erased adapter stored by the validator
pub(crate) trait ErasedAdapter: Send + Sync {
    fn adapt<'a>(&self, value: &'a dyn Any) -> Result<AdaptedRecord<'a>, AdapterError>;
}

pub(crate) struct TypedAdapter<T, F> {
    adapt: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> TypedAdapter<T, F> {
    pub(crate) fn new(adapt: F) -> Self {
        Self {
            adapt,
            _marker: PhantomData,
        }
    }
}

impl<T, F> ErasedAdapter for TypedAdapter<T, F>
where
    T: Record,
    F: for<'a> Fn(&'a T) -> Result<AdaptedRecord<'a>, AdapterError> + Send + Sync,
{
    fn adapt<'a>(&self, value: &'a dyn Any) -> Result<AdaptedRecord<'a>, AdapterError> {
        match value.downcast_ref::<T>() {
            Some(record) => (self.adapt)(record),
            None => Err(AdapterError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            }),
        }
    }
}

/// An adapter together with the rule set it feeds
pub(crate) struct AdapterTarget {
    pub(crate) target: String,
    pub(crate) adapter: Box<dyn ErasedAdapter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_record;

    struct User {
        name: String,
        age: i64,
    }

    impl_record!(User { name, age });

    fn user_adapter(user: &User) -> Result<AdaptedRecord<'_>, AdapterError> {
        Ok(AdaptedRecord::new()
            .with_field("Name", &user.name)
            .with_value("Age", user.age))
    }

    #[test]
    fn test_typed_adapter_downcasts() {
        let adapter = TypedAdapter::<User, _>::new(user_adapter);
        let user = User {
            name: "Gopher".into(),
            age: 20,
        };
        let adapted = adapter.adapt(&user).unwrap();
        assert_eq!(adapted.len(), 2);
        assert!(matches!(adapted.get("Age"), Some(AdaptedField::Value(Value::Int(20)))));
    }

    #[test]
    fn test_typed_adapter_rejects_other_types() {
        let adapter = TypedAdapter::<User, _>::new(user_adapter);
        let err = adapter.adapt(&5i64).err().unwrap();
        assert!(matches!(err, AdapterError::TypeMismatch { .. }));
    }

    #[test]
    fn test_from_record() {
        let user = User {
            name: "a".into(),
            age: 1,
        };
        let adapted = AdaptedRecord::from_record(&user);
        let names: Vec<&str> = adapted.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["age", "name"]);
    }
}
