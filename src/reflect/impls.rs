//! `Reflect` for primitives and standard containers

use super::{Reflect, Shape, map_value};
use crate::cel::{Key, Type, Value};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Types usable as map keys in expression values
pub trait MapKey {
    fn to_key(&self) -> Key;

    fn key_type() -> Type
    where
        Self: Sized;
}

macro_rules! scalar {
    ($($ty:ty => $static:expr, |$v:ident| $convert:expr;)*) => {
        $(
            impl Reflect for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Scalar
                }

                fn to_value(&self) -> Value {
                    let $v = self;
                    $convert
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn static_type() -> Type {
                    $static
                }
            }
        )*
    };
}

scalar! {
    bool => Type::Bool, |v| Value::Bool(*v);
    i8 => Type::Int, |v| Value::Int(i64::from(*v));
    i16 => Type::Int, |v| Value::Int(i64::from(*v));
    i32 => Type::Int, |v| Value::Int(i64::from(*v));
    i64 => Type::Int, |v| Value::Int(*v);
    isize => Type::Int, |v| i64::try_from(*v).map_or(Value::Double(*v as f64), Value::Int);
    i128 => Type::Int, |v| i64::try_from(*v).map_or(Value::Double(*v as f64), Value::Int);
    u8 => Type::Uint, |v| Value::Uint(u64::from(*v));
    u16 => Type::Uint, |v| Value::Uint(u64::from(*v));
    u32 => Type::Uint, |v| Value::Uint(u64::from(*v));
    u64 => Type::Uint, |v| Value::Uint(*v);
    usize => Type::Uint, |v| u64::try_from(*v).map_or(Value::Double(*v as f64), Value::Uint);
    u128 => Type::Uint, |v| u64::try_from(*v).map_or(Value::Double(*v as f64), Value::Uint);
    f32 => Type::Double, |v| Value::Double(f64::from(*v));
    f64 => Type::Double, |v| Value::Double(*v);
    char => Type::String, |v| Value::string(v.to_string());
    String => Type::String, |v| Value::string(v);
    &'static str => Type::String, |v| Value::string(v);
}

macro_rules! map_key {
    ($($ty:ty => $static:expr, |$v:ident| $convert:expr;)*) => {
        $(
            impl MapKey for $ty {
                fn to_key(&self) -> Key {
                    let $v = self;
                    $convert
                }

                fn key_type() -> Type {
                    $static
                }
            }
        )*
    };
}

map_key! {
    bool => Type::Bool, |v| Key::Bool(*v);
    i8 => Type::Int, |v| Key::Int(i64::from(*v));
    i16 => Type::Int, |v| Key::Int(i64::from(*v));
    i32 => Type::Int, |v| Key::Int(i64::from(*v));
    i64 => Type::Int, |v| Key::Int(*v);
    u8 => Type::Uint, |v| Key::Uint(u64::from(*v));
    u16 => Type::Uint, |v| Key::Uint(u64::from(*v));
    u32 => Type::Uint, |v| Key::Uint(u64::from(*v));
    u64 => Type::Uint, |v| Key::Uint(*v);
    String => Type::String, |v| Key::from(v.as_str());
    &'static str => Type::String, |v| Key::from(*v);
}

impl<T: Reflect> Reflect for Option<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(self.as_ref().map(|v| v as &dyn Reflect))
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Reflect::to_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Owning pointers are transparent: the walk and the expression value see
// the pointee.
macro_rules! transparent {
    ($($ptr:ident),*) => {
        $(
            impl<T: Reflect> Reflect for $ptr<T> {
                fn shape(&self) -> Shape<'_> {
                    (**self).shape()
                }

                fn to_value(&self) -> Value {
                    (**self).to_value()
                }

                fn as_any(&self) -> &dyn Any {
                    (**self).as_any()
                }

                fn static_type() -> Type {
                    T::static_type()
                }
            }
        )*
    };
}

transparent!(Box, Arc);

macro_rules! sequence {
    ($($container:ident),*) => {
        $(
            impl<T: Reflect> Reflect for $container<T> {
                fn shape(&self) -> Shape<'_> {
                    Shape::List(self.iter().map(|v| v as &dyn Reflect).collect())
                }

                fn to_value(&self) -> Value {
                    Value::list(self.iter().map(Reflect::to_value).collect())
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn static_type() -> Type {
                    Type::list(T::static_type())
                }
            }
        )*
    };
}

sequence!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape(&self) -> Shape<'_> {
        Shape::List(self.iter().map(|v| v as &dyn Reflect).collect())
    }

    fn to_value(&self) -> Value {
        Value::list(self.iter().map(Reflect::to_value).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn static_type() -> Type {
        Type::list(T::static_type())
    }
}

macro_rules! mapping {
    ($($container:ident),*) => {
        $(
            impl<K, V> Reflect for $container<K, V>
            where
                K: MapKey + Send + Sync + 'static,
                V: Reflect,
            {
                fn shape(&self) -> Shape<'_> {
                    Shape::Map(self.values().map(|v| v as &dyn Reflect).collect())
                }

                fn to_value(&self) -> Value {
                    map_value(self.iter())
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn static_type() -> Type {
                    Type::map(K::key_type(), V::static_type())
                }
            }
        )*
    };
}

mapping!(HashMap, BTreeMap);
