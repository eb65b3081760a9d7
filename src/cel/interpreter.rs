//! Tree-walking interpreter for checked expressions

use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};
use super::error::EvalError;
use super::functions::FunctionLibrary;
use super::value::{Key, Value};
use crate::context::Context;
use std::collections::{BTreeMap, HashMap};

/// Maximum recursion depth to prevent stack overflow
const MAX_RECURSION_DEPTH: usize = 256;

type EvalResult = Result<Value, EvalError>;

/// Variable bindings for one evaluation
#[derive(Debug, Clone, Default)]
pub struct Activation {
    bindings: HashMap<String, Value>,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` and returns the activation, builder style
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// Evaluates an expression against an activation
pub(crate) struct Interpreter<'a> {
    functions: &'a FunctionLibrary,
    activation: &'a Activation,
    ctx: &'a Context,
    scopes: Vec<(String, Value)>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        functions: &'a FunctionLibrary,
        activation: &'a Activation,
        ctx: &'a Context,
    ) -> Self {
        Self {
            functions,
            activation,
            ctx,
            scopes: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> EvalResult {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            self.depth -= 1;
            return Err(EvalError::MaxDepth(MAX_RECURSION_DEPTH));
        }
        let result = self.eval_inner(expr);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Uint(n) => Value::Uint(*n),
                Literal::Double(n) => Value::Double(*n),
                Literal::String(s) => Value::string(s),
            }),

            Expr::Ident { name, .. } => self.lookup(name),

            Expr::Select { operand, field, .. } => {
                let value = self.eval(operand)?;
                select(&value, field)
            }

            Expr::Has { operand, field, .. } => {
                let value = self.eval(operand)?;
                Ok(Value::Bool(match &value {
                    Value::Map(entries) => entries.contains_key(&Key::from(field.as_str())),
                    Value::Record(record) => record.fields.get(field).is_some_and(|v| !v.is_null()),
                    other => {
                        return Err(EvalError::NoMatchingOverload {
                            function: "has".to_string(),
                            args: other.type_name(),
                        });
                    }
                }))
            }

            Expr::Index { operand, index, .. } => {
                let container = self.eval(operand)?;
                let index = self.eval(index)?;
                self.index(&container, &index)
            }

            Expr::Call {
                target,
                function,
                args,
                ..
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(target) = target {
                    values.push(self.eval(target)?);
                }
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.functions.dispatch(function, target.is_some(), &values)
            }

            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Negate, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(EvalError::Overflow("int")),
                    (UnaryOp::Negate, Value::Double(n)) => Ok(Value::Double(-n)),
                    (op, other) => Err(EvalError::NoMatchingOverload {
                        function: match op {
                            UnaryOp::Not => "!_".to_string(),
                            UnaryOp::Negate => "-_".to_string(),
                        },
                        args: other.type_name(),
                    }),
                }
            }

            Expr::Binary {
                op, left, right, ..
            } => match op {
                BinaryOp::And => self.logical(left, right, false),
                BinaryOp::Or => self.logical(left, right, true),
                _ => {
                    let l = self.eval(left)?;
                    let r = self.eval(right)?;
                    binary(*op, &l, &r)
                }
            },

            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => match self.eval(condition)? {
                Value::Bool(true) => self.eval(then_expr),
                Value::Bool(false) => self.eval(else_expr),
                other => Err(EvalError::NoMatchingOverload {
                    function: "_?_:_".to_string(),
                    args: other.type_name(),
                }),
            },

            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }

            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    let key = Key::from_value(&self.eval(k)?)?;
                    let value = self.eval(v)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }

            Expr::Comprehension {
                kind,
                range,
                var,
                body,
                filter,
                ..
            } => {
                let range = self.eval(range)?;
                let items: Vec<Value> = match &range {
                    Value::List(items) => items.to_vec(),
                    Value::Map(entries) => entries.keys().map(Key::to_value).collect(),
                    other => {
                        return Err(EvalError::NoMatchingOverload {
                            function: kind.name().to_string(),
                            args: other.type_name(),
                        });
                    }
                };
                self.comprehension(*kind, var, items, body, filter.as_deref())
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult {
        if let Some((_, value)) = self.scopes.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        self.activation
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    /// `&&` / `||` with commutative error absorption: an error on one side
    /// is discarded when the other side alone decides the result.
    fn logical(&mut self, left: &Expr, right: &Expr, is_or: bool) -> EvalResult {
        let decisive = is_or;
        let l = self.eval(left);
        if let Ok(Value::Bool(b)) = l
            && b == decisive
        {
            return Ok(Value::Bool(decisive));
        }
        let r = self.eval(right);
        match (l, r) {
            (_, Ok(Value::Bool(b))) if b == decisive => Ok(Value::Bool(decisive)),
            (Ok(Value::Bool(_)), Ok(Value::Bool(_))) => Ok(Value::Bool(!decisive)),
            (Err(e), _) | (_, Err(e)) => Err(e),
            (Ok(l), Ok(r)) => Err(EvalError::NoMatchingOverload {
                function: if is_or { "_||_" } else { "_&&_" }.to_string(),
                args: format!("{}, {}", l.type_name(), r.type_name()),
            }),
        }
    }

    fn comprehension(
        &mut self,
        kind: MacroKind,
        var: &str,
        items: Vec<Value>,
        body: &Expr,
        filter: Option<&Expr>,
    ) -> EvalResult {
        let mut deferred: Option<EvalError> = None;
        let mut count = 0usize;
        let mut output = Vec::new();

        for item in items {
            if self.ctx.is_done() {
                return Err(EvalError::Canceled);
            }
            self.scopes.push((var.to_string(), item.clone()));
            let step = self.comprehension_step(kind, body, filter);
            self.scopes.pop();

            match (kind, step) {
                (_, Ok(None)) => {}
                (MacroKind::All, Ok(Some(Value::Bool(false)))) => return Ok(Value::Bool(false)),
                (MacroKind::Exists, Ok(Some(Value::Bool(true)))) => return Ok(Value::Bool(true)),
                (MacroKind::All | MacroKind::Exists, Ok(Some(Value::Bool(_)))) => {}
                (MacroKind::All | MacroKind::Exists, Ok(Some(other))) => {
                    deferred.get_or_insert(EvalError::NoMatchingOverload {
                        function: kind.name().to_string(),
                        args: other.type_name(),
                    });
                }
                (MacroKind::All | MacroKind::Exists, Err(e)) => {
                    deferred.get_or_insert(e);
                }
                (MacroKind::ExistsOne, Ok(Some(Value::Bool(b)))) => count += usize::from(b),
                (MacroKind::Filter, Ok(Some(Value::Bool(b)))) => {
                    if b {
                        output.push(item);
                    }
                }
                (MacroKind::Map, Ok(Some(value))) => output.push(value),
                (_, Err(e)) => return Err(e),
                (_, Ok(Some(other))) => {
                    return Err(EvalError::NoMatchingOverload {
                        function: kind.name().to_string(),
                        args: other.type_name(),
                    });
                }
            }
        }

        match kind {
            MacroKind::All | MacroKind::Exists => match deferred {
                Some(e) => Err(e),
                None => Ok(Value::Bool(kind == MacroKind::All)),
            },
            MacroKind::ExistsOne => Ok(Value::Bool(count == 1)),
            MacroKind::Map | MacroKind::Filter => Ok(Value::list(output)),
        }
    }

    /// One iteration; `None` when the element is skipped by a `map` filter
    fn comprehension_step(
        &mut self,
        kind: MacroKind,
        body: &Expr,
        filter: Option<&Expr>,
    ) -> Result<Option<Value>, EvalError> {
        if kind == MacroKind::Map
            && let Some(filter) = filter
        {
            match self.eval(filter)? {
                Value::Bool(true) => {}
                Value::Bool(false) => return Ok(None),
                other => {
                    return Err(EvalError::NoMatchingOverload {
                        function: "map".to_string(),
                        args: other.type_name(),
                    });
                }
            }
        }
        self.eval(body).map(Some)
    }

    fn index(&self, container: &Value, index: &Value) -> EvalResult {
        match (container, index) {
            (Value::List(items), Value::Int(_) | Value::Uint(_) | Value::Double(_)) => {
                let i = match index {
                    Value::Int(n) => *n,
                    Value::Uint(n) => i64::try_from(*n).map_err(|_| EvalError::Overflow("int"))?,
                    Value::Double(n) if n.fract() == 0.0 => *n as i64,
                    _ => {
                        return Err(EvalError::Conversion(format!(
                            "invalid list index {}",
                            index
                        )));
                    }
                };
                usize::try_from(i)
                    .ok()
                    .and_then(|u| items.get(u))
                    .cloned()
                    .ok_or(EvalError::IndexOutOfRange(i))
            }
            (Value::Map(entries), key) => {
                let key = Key::from_value(key)?;
                entries
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| EvalError::NoSuchKey(key.to_string()))
            }
            (other, index) => Err(EvalError::NoMatchingOverload {
                function: "_[_]".to_string(),
                args: format!("{}, {}", other.type_name(), index.type_name()),
            }),
        }
    }
}

fn select(value: &Value, field: &str) -> EvalResult {
    match value {
        Value::Map(entries) => entries
            .get(&Key::from(field))
            .cloned()
            .ok_or_else(|| EvalError::NoSuchKey(field.to_string())),
        Value::Record(record) => record
            .fields
            .get(field)
            .cloned()
            .ok_or_else(|| EvalError::NoSuchField(field.to_string())),
        other => Err(EvalError::Custom(format!(
            "type '{}' does not support field selection",
            other.type_name()
        ))),
    }
}

fn overload(op: BinaryOp, l: &Value, r: &Value) -> EvalError {
    EvalError::NoMatchingOverload {
        function: op.name().to_string(),
        args: format!("{}, {}", l.type_name(), r.type_name()),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> EvalResult {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(l.equals(r))),
        BinaryOp::NotEqual => Ok(Value::Bool(!l.equals(r))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = l.compare(r).ok_or_else(|| overload(op, l, r))?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => match r {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|item| item.equals(l)))),
            Value::Map(entries) => Ok(Value::Bool(
                Key::from_value(l).is_ok_and(|key| entries.contains_key(&key)),
            )),
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or(EvalError::Overflow("int"))
            }
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_add(*b).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.to_vec();
                items.extend(b.iter().cloned());
                Ok(Value::list(items))
            }
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::Subtract => match (l, r) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_sub(*b).map(Value::Int).ok_or(EvalError::Overflow("int"))
            }
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_sub(*b).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::Multiply => match (l, r) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_mul(*b).map(Value::Int).ok_or(EvalError::Overflow("int"))
            }
            (Value::Uint(a), Value::Uint(b)) => {
                a.checked_mul(*b).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
            }
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::Divide => match (l, r) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::DivisionByZero)
            }
            (Value::Int(a), Value::Int(b)) => {
                a.checked_div(*b).map(Value::Int).ok_or(EvalError::Overflow("int"))
            }
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a / b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::Modulo => match (l, r) {
            (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
                Err(EvalError::ModulusByZero)
            }
            (Value::Int(a), Value::Int(b)) => {
                a.checked_rem(*b).map(Value::Int).ok_or(EvalError::Overflow("int"))
            }
            (Value::Uint(a), Value::Uint(b)) => Ok(Value::Uint(a % b)),
            _ => Err(overload(op, l, r)),
        },
        BinaryOp::And | BinaryOp::Or => Err(overload(op, l, r)),
    }
}
