//! Function library: built-in overloads plus the custom string helpers
//!
//! Every function is a named set of overloads. An overload is either
//! global (`size(x)`) or receiver-style (`x.size()`); for receiver-style
//! overloads the receiver is the first parameter.

use super::error::EvalError;
use super::types::Type;
use super::value::Value;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Implementation of a single overload
pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Default number of compiled regexes kept by the `matches` functions
pub const DEFAULT_REGEX_CACHE_SIZE: u64 = 256;

/// A typed overload of a function
#[derive(Clone)]
pub struct Overload {
    pub receiver: bool,
    pub params: Vec<Type>,
    pub result: Type,
    imp: FunctionImpl,
}

impl Overload {
    fn matches_types(&self, receiver: bool, args: &[Type]) -> bool {
        self.receiver == receiver
            && self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| p.accepts(a))
    }

    fn matches_values(&self, receiver: bool, args: &[Value]) -> bool {
        self.receiver == receiver
            && self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(p, a)| p.accepts(&a.static_type()))
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("receiver", &self.receiver)
            .field("params", &self.params)
            .field("result", &self.result)
            .finish()
    }
}

/// Compiled regexes keyed by pattern, bounded LRU
#[derive(Clone)]
pub struct RegexCache {
    cache: moka::sync::Cache<String, Arc<Regex>>,
}

impl RegexCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: moka::sync::Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Returns the compiled pattern, compiling it on first use
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>, EvalError> {
        if let Some(regex) = self.cache.get(pattern) {
            return Ok(regex);
        }
        let regex = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let regex = Arc::new(regex);
        self.cache.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    pub fn is_match(&self, text: &str, pattern: &str) -> Result<bool, EvalError> {
        Ok(self.get(pattern)?.is_match(text))
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_SIZE)
    }
}

/// Named overload sets available to expressions
#[derive(Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Vec<Overload>>,
}

impl FunctionLibrary {
    /// Creates an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard library plus the default custom functions
    pub fn with_defaults(regexes: RegexCache) -> Self {
        let mut lib = Self::standard(regexes.clone());
        lib.register_default_custom(regexes);
        lib
    }

    /// Built-in functions: size, string predicates, conversions
    pub fn standard(regexes: RegexCache) -> Self {
        let mut lib = Self::new();

        for ty in [
            Type::String,
            Type::list(Type::Dyn),
            Type::map(Type::Dyn, Type::Dyn),
        ] {
            lib.add_global("size", vec![ty.clone()], Type::Int, size);
            lib.add_member("size", vec![ty], Type::Int, size);
        }

        let re = regexes.clone();
        lib.add_member(
            "matches",
            vec![Type::String, Type::String],
            Type::Bool,
            move |args| string_pair(args, |s, p| re.is_match(s, p).map(Value::Bool)),
        );
        let re = regexes;
        lib.add_global(
            "matches",
            vec![Type::String, Type::String],
            Type::Bool,
            move |args| string_pair(args, |s, p| re.is_match(s, p).map(Value::Bool)),
        );

        lib.add_member("startsWith", vec![Type::String, Type::String], Type::Bool, |args| {
            string_pair(args, |s, p| Ok(Value::Bool(s.starts_with(p))))
        });
        lib.add_member("endsWith", vec![Type::String, Type::String], Type::Bool, |args| {
            string_pair(args, |s, p| Ok(Value::Bool(s.ends_with(p))))
        });
        lib.add_member("contains", vec![Type::String, Type::String], Type::Bool, |args| {
            string_pair(args, |s, p| Ok(Value::Bool(s.contains(p))))
        });
        lib.add_member("lowerAscii", vec![Type::String], Type::String, |args| {
            string_unary(args, |s| Value::string(s.to_ascii_lowercase()))
        });
        lib.add_member("upperAscii", vec![Type::String], Type::String, |args| {
            string_unary(args, |s| Value::string(s.to_ascii_uppercase()))
        });
        lib.add_member("trim", vec![Type::String], Type::String, |args| {
            string_unary(args, |s| Value::string(s.trim()))
        });

        lib.add_global("int", vec![Type::Dyn], Type::Int, to_int);
        lib.add_global("uint", vec![Type::Dyn], Type::Uint, to_uint);
        lib.add_global("double", vec![Type::Dyn], Type::Double, to_double);
        lib.add_global("string", vec![Type::Dyn], Type::String, to_string);
        lib.add_global("bool", vec![Type::Dyn], Type::Bool, to_bool);

        lib
    }

    /// `strings.ToUpper`, `strings.ToLower` and `custom.matches`
    pub fn register_default_custom(&mut self, regexes: RegexCache) {
        self.add_global("strings.ToUpper", vec![Type::String], Type::String, |args| {
            string_unary(args, |s| Value::string(s.to_uppercase()))
        });
        self.add_global("strings.ToLower", vec![Type::String], Type::String, |args| {
            string_unary(args, |s| Value::string(s.to_lowercase()))
        });
        self.add_global(
            "custom.matches",
            vec![Type::String, Type::String],
            Type::Bool,
            move |args| string_pair(args, |s, p| regexes.is_match(s, p).map(Value::Bool)),
        );
    }

    /// Registers a global overload, e.g. `fmt.Title(s)`
    pub fn add_global<F>(&mut self, name: &str, params: Vec<Type>, result: Type, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.add(name, false, params, result, Arc::new(f));
    }

    /// Registers a receiver-style overload; the receiver is `params[0]`
    pub fn add_member<F>(&mut self, name: &str, params: Vec<Type>, result: Type, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.add(name, true, params, result, Arc::new(f));
    }

    fn add(&mut self, name: &str, receiver: bool, params: Vec<Type>, result: Type, imp: FunctionImpl) {
        self.functions
            .entry(name.to_string())
            .or_default()
            .push(Overload {
                receiver,
                params,
                result,
                imp,
            });
    }

    /// Returns true if any overload is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Finds an overload for static argument types
    pub fn resolve(&self, name: &str, receiver: bool, args: &[Type]) -> Option<&Overload> {
        self.functions
            .get(name)?
            .iter()
            .find(|o| o.matches_types(receiver, args))
    }

    /// Calls the first overload accepting the runtime argument values
    pub fn dispatch(&self, name: &str, receiver: bool, args: &[Value]) -> Result<Value, EvalError> {
        let overload = self
            .functions
            .get(name)
            .and_then(|overloads| overloads.iter().find(|o| o.matches_values(receiver, args)))
            .ok_or_else(|| EvalError::NoMatchingOverload {
                function: name.to_string(),
                args: args
                    .iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        (overload.imp)(args)
    }
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionLibrary")
            .field("functions", &names)
            .finish()
    }
}

fn overload_error(function: &str, args: &[Value]) -> EvalError {
    EvalError::NoMatchingOverload {
        function: function.to_string(),
        args: args
            .iter()
            .map(Value::type_name)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn string_unary(args: &[Value], f: impl FnOnce(&str) -> Value) -> Result<Value, EvalError> {
    match args {
        [Value::String(s)] => Ok(f(s)),
        _ => Err(overload_error("string function", args)),
    }
}

fn string_pair(
    args: &[Value],
    f: impl FnOnce(&str, &str) -> Result<Value, EvalError>,
) -> Result<Value, EvalError> {
    match args {
        [Value::String(s), Value::String(p)] => f(s, p),
        _ => Err(overload_error("string function", args)),
    }
}

fn size(args: &[Value]) -> Result<Value, EvalError> {
    let n = match args {
        [Value::String(s)] => s.chars().count(),
        [Value::List(items)] => items.len(),
        [Value::Map(entries)] => entries.len(),
        _ => return Err(overload_error("size", args)),
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| EvalError::Overflow("int"))
}

fn to_int(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Int(n)] => Ok(Value::Int(*n)),
        [Value::Uint(n)] => i64::try_from(*n)
            .map(Value::Int)
            .map_err(|_| EvalError::Overflow("int")),
        [Value::Double(n)] if n.is_finite() && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
            Ok(Value::Int(n.trunc() as i64))
        }
        [Value::Double(_)] => Err(EvalError::Overflow("int")),
        [Value::String(s)] => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| EvalError::Conversion(format!("string to int: {}", e))),
        _ => Err(overload_error("int", args)),
    }
}

fn to_uint(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Uint(n)] => Ok(Value::Uint(*n)),
        [Value::Int(n)] => u64::try_from(*n)
            .map(Value::Uint)
            .map_err(|_| EvalError::Overflow("uint")),
        [Value::Double(n)] if n.is_finite() && *n >= 0.0 && *n < u64::MAX as f64 => {
            Ok(Value::Uint(n.trunc() as u64))
        }
        [Value::Double(_)] => Err(EvalError::Overflow("uint")),
        [Value::String(s)] => s
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|e| EvalError::Conversion(format!("string to uint: {}", e))),
        _ => Err(overload_error("uint", args)),
    }
}

fn to_double(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Double(n)] => Ok(Value::Double(*n)),
        [Value::Int(n)] => Ok(Value::Double(*n as f64)),
        [Value::Uint(n)] => Ok(Value::Double(*n as f64)),
        [Value::String(s)] => s
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| EvalError::Conversion(format!("string to double: {}", e))),
        _ => Err(overload_error("double", args)),
    }
}

fn to_string(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::String(s)] => Ok(Value::String(s.clone())),
        [Value::Int(n)] => Ok(Value::string(n.to_string())),
        [Value::Uint(n)] => Ok(Value::string(n.to_string())),
        [Value::Double(n)] => Ok(Value::string(n.to_string())),
        [Value::Bool(b)] => Ok(Value::string(b.to_string())),
        _ => Err(overload_error("string", args)),
    }
}

fn to_bool(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(b)] => Ok(Value::Bool(*b)),
        [Value::String(s)] => match s.as_ref() {
            "true" | "TRUE" | "True" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "FALSE" | "False" | "f" | "0" => Ok(Value::Bool(false)),
            other => Err(EvalError::Conversion(format!("string to bool: {}", other))),
        },
        _ => Err(overload_error("bool", args)),
    }
}
