//! Type checker
//!
//! Resolves identifiers against the environment, infers a static type for
//! every node, and rewrites namespaced calls such as `strings.ToUpper(s)`
//! into global calls when the namespace is not a declared variable.

use super::ast::{BinaryOp, Expr, Literal, MacroKind, UnaryOp};
use super::env::Environment;
use super::error::CompileError;
use super::types::Type;

type CheckResult = Result<Type, CompileError>;

/// Checks an expression in place, returning its static type
pub fn check(env: &Environment, expr: &mut Expr) -> CheckResult {
    Checker {
        env,
        scopes: Vec::new(),
    }
    .check(expr)
}

struct Checker<'e> {
    env: &'e Environment,
    scopes: Vec<(String, Type)>,
}

fn no_overload(function: &str, args: &[&Type], position: usize) -> CompileError {
    let rendered: Vec<String> = args.iter().map(|t| t.to_string()).collect();
    CompileError::check(
        format!(
            "found no matching overload for '{}' applied to '({})'",
            function,
            rendered.join(", ")
        ),
        position,
    )
}

fn is_bool_like(ty: &Type) -> bool {
    matches!(ty, Type::Bool | Type::Dyn)
}

impl Checker<'_> {
    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
            .or_else(|| self.env.variable(name).cloned())
    }

    fn check(&mut self, expr: &mut Expr) -> CheckResult {
        if matches!(expr, Expr::Call { .. }) {
            return self.check_call(expr);
        }
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Null => Type::Null,
                Literal::Bool(_) => Type::Bool,
                Literal::Int(_) => Type::Int,
                Literal::Uint(_) => Type::Uint,
                Literal::Double(_) => Type::Double,
                Literal::String(_) => Type::String,
            }),

            Expr::Ident { name, position } => self.lookup(name).ok_or_else(|| {
                CompileError::check(format!("undeclared reference to '{}'", name), *position)
            }),

            Expr::Select {
                operand,
                field,
                position,
            } => {
                let operand_type = self.check(operand)?;
                self.select_type(&operand_type, field, *position)
            }

            Expr::Has {
                operand,
                field,
                position,
            } => {
                let operand_type = self.check(operand)?;
                self.select_type(&operand_type, field, *position)?;
                Ok(Type::Bool)
            }

            Expr::Index {
                operand,
                index,
                position,
            } => {
                let operand_type = self.check(operand)?;
                let index_type = self.check(index)?;
                match (&operand_type, &index_type) {
                    (Type::List(elem), Type::Int | Type::Uint | Type::Dyn) => Ok((**elem).clone()),
                    (Type::Map(key, value), idx) if key.is_equatable_with(idx) => {
                        Ok((**value).clone())
                    }
                    (Type::Dyn, _) => Ok(Type::Dyn),
                    _ => Err(no_overload("_[_]", &[&operand_type, &index_type], *position)),
                }
            }

            Expr::Call { .. } => Ok(Type::Dyn),

            Expr::Unary {
                op,
                operand,
                position,
            } => {
                let ty = self.check(operand)?;
                match op {
                    UnaryOp::Not if is_bool_like(&ty) => Ok(Type::Bool),
                    UnaryOp::Not => Err(no_overload("!_", &[&ty], *position)),
                    UnaryOp::Negate if matches!(ty, Type::Int | Type::Double | Type::Dyn) => Ok(ty),
                    UnaryOp::Negate => Err(no_overload("-_", &[&ty], *position)),
                }
            }

            Expr::Binary {
                op,
                left,
                right,
                position,
            } => {
                let lt = self.check(left)?;
                let rt = self.check(right)?;
                self.binary_type(*op, &lt, &rt, *position)
            }

            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
                position,
            } => {
                let ct = self.check(condition)?;
                if !is_bool_like(&ct) {
                    return Err(no_overload("_?_:_", &[&ct], *position));
                }
                let tt = self.check(then_expr)?;
                let et = self.check(else_expr)?;
                Ok(if tt == et { tt } else { Type::Dyn })
            }

            Expr::List(items) => {
                let mut elem: Option<Type> = None;
                for item in items.iter_mut() {
                    let ty = self.check(item)?;
                    elem = Some(match elem {
                        None => ty,
                        Some(prev) if prev == ty => prev,
                        Some(_) => Type::Dyn,
                    });
                }
                Ok(Type::list(elem.unwrap_or(Type::Dyn)))
            }

            Expr::Map(entries) => {
                let mut key_type: Option<Type> = None;
                let mut value_type: Option<Type> = None;
                for (k, v) in entries.iter_mut() {
                    let kt = self.check(k)?;
                    if !matches!(kt, Type::Bool | Type::Int | Type::Uint | Type::String | Type::Dyn) {
                        return Err(CompileError::check(
                            format!("unsupported map key type: {}", kt),
                            k.position(),
                        ));
                    }
                    let vt = self.check(v)?;
                    key_type = Some(match key_type {
                        None => kt,
                        Some(prev) if prev == kt => prev,
                        Some(_) => Type::Dyn,
                    });
                    value_type = Some(match value_type {
                        None => vt,
                        Some(prev) if prev == vt => prev,
                        Some(_) => Type::Dyn,
                    });
                }
                Ok(Type::map(
                    key_type.unwrap_or(Type::Dyn),
                    value_type.unwrap_or(Type::Dyn),
                ))
            }

            Expr::Comprehension {
                kind,
                range,
                var,
                body,
                filter,
                position,
            } => {
                let range_type = self.check(range)?;
                let var_type = match &range_type {
                    Type::List(elem) => (**elem).clone(),
                    Type::Map(key, _) => (**key).clone(),
                    Type::Dyn => Type::Dyn,
                    other => {
                        return Err(CompileError::check(
                            format!(
                                "expression of type '{}' cannot be the range of a comprehension",
                                other
                            ),
                            *position,
                        ));
                    }
                };

                self.scopes.push((var.clone(), var_type.clone()));
                let result = self.comprehension_type(*kind, &var_type, body, filter, *position);
                self.scopes.pop();
                result
            }
        }
    }

    fn comprehension_type(
        &mut self,
        kind: MacroKind,
        var_type: &Type,
        body: &mut Expr,
        filter: &mut Option<Box<Expr>>,
        position: usize,
    ) -> CheckResult {
        if let Some(filter) = filter {
            let ft = self.check(filter)?;
            if !is_bool_like(&ft) {
                return Err(no_overload(kind.name(), &[&ft], position));
            }
        }
        let bt = self.check(body)?;
        match kind {
            MacroKind::Map => Ok(Type::list(bt)),
            _ if !is_bool_like(&bt) => Err(CompileError::check(
                format!("macro '{}' requires a bool predicate, found '{}'", kind.name(), bt),
                position,
            )),
            MacroKind::Filter => Ok(Type::list(var_type.clone())),
            _ => Ok(Type::Bool),
        }
    }

    fn select_type(&self, operand: &Type, field: &str, position: usize) -> CheckResult {
        match operand {
            Type::Record(name) => match self.env.record_type(name) {
                Some(record) => record.field(field).cloned().ok_or_else(|| {
                    CompileError::check(format!("undefined field '{}'", field), position)
                }),
                None => Ok(Type::Dyn),
            },
            Type::Map(key, value) if key.accepts(&Type::String) => Ok((**value).clone()),
            Type::Dyn => Ok(Type::Dyn),
            other => Err(CompileError::check(
                format!("type '{}' does not support field selection", other),
                position,
            )),
        }
    }

    fn binary_type(&self, op: BinaryOp, lt: &Type, rt: &Type, position: usize) -> CheckResult {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                if is_bool_like(lt) && is_bool_like(rt) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload(op.name(), &[lt, rt], position))
                }
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                if lt.is_equatable_with(rt) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload(op.name(), &[lt, rt], position))
                }
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                if lt.is_orderable_with(rt) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload(op.name(), &[lt, rt], position))
                }
            }
            BinaryOp::In => match rt {
                Type::List(elem) if elem.is_equatable_with(lt) => Ok(Type::Bool),
                Type::Map(key, _) if key.is_equatable_with(lt) => Ok(Type::Bool),
                Type::Dyn => Ok(Type::Bool),
                _ => Err(no_overload(op.name(), &[lt, rt], position)),
            },
            BinaryOp::Add => match (lt, rt) {
                (Type::Dyn, other) | (other, Type::Dyn) => Ok(match other {
                    Type::List(_) => Type::list(Type::Dyn),
                    Type::Dyn | Type::Int | Type::Uint | Type::Double | Type::String => {
                        other.clone()
                    }
                    _ => return Err(no_overload(op.name(), &[lt, rt], position)),
                }),
                (Type::List(a), Type::List(b)) => {
                    Ok(Type::list(if a == b { (**a).clone() } else { Type::Dyn }))
                }
                (a, b) if a == b && (a.is_numeric() || *a == Type::String) => Ok(a.clone()),
                _ => Err(no_overload(op.name(), &[lt, rt], position)),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                let allowed = |t: &Type| match op {
                    BinaryOp::Modulo => matches!(t, Type::Int | Type::Uint),
                    _ => t.is_numeric(),
                };
                match (lt, rt) {
                    (Type::Dyn, Type::Dyn) => Ok(Type::Dyn),
                    (Type::Dyn, other) | (other, Type::Dyn) if allowed(other) => Ok(other.clone()),
                    (a, b) if a == b && allowed(a) => Ok(a.clone()),
                    _ => Err(no_overload(op.name(), &[lt, rt], position)),
                }
            }
        }
    }

    fn check_call(&mut self, expr: &mut Expr) -> CheckResult {
        let Expr::Call {
            target,
            function,
            args,
            position,
        } = expr
        else {
            return Ok(Type::Dyn);
        };

        // `ns.fn(args)` names a global function when `ns` is not a variable
        let qualified = target.as_deref().and_then(|t| {
            let root = t.root_ident()?;
            if self.lookup(root).is_some() {
                return None;
            }
            let name = format!("{}.{}", t.qualified_name()?, function);
            self.env.functions().contains(&name).then_some(name)
        });
        if let Some(name) = qualified {
            *function = name;
            *target = None;
        }

        let mut arg_types = Vec::with_capacity(args.len() + 1);
        let receiver = target.is_some();
        if let Some(t) = target {
            arg_types.push(self.check(t)?);
        }
        for arg in args.iter_mut() {
            arg_types.push(self.check(arg)?);
        }

        let functions = self.env.functions();
        if !functions.contains(function) {
            return Err(CompileError::check(
                format!("undeclared reference to '{}'", function),
                *position,
            ));
        }
        match functions.resolve(function, receiver, &arg_types) {
            Some(overload) => Ok(overload.result.clone()),
            None => {
                let refs: Vec<&Type> = arg_types.iter().collect();
                Err(no_overload(function, &refs, *position))
            }
        }
    }
}
