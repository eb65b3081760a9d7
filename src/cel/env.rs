//! Environments and compiled programs

use super::ast::Expr;
use super::checker;
use super::error::{CompileError, EvalError};
use super::functions::FunctionLibrary;
use super::interpreter::{Activation, Interpreter};
use super::parser;
use super::types::{RecordType, Type};
use super::value::Value;
use crate::context::Context;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised while building an environment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("variable '{name}' declared twice with different types ({first} and {second})")]
    ConflictingVariable {
        name: String,
        first: Type,
        second: Type,
    },

    #[error("record type '{0}' declared twice with different layouts")]
    ConflictingRecord(String),
}

/// Immutable set of declarations that expressions are compiled against
#[derive(Debug)]
pub struct Environment {
    id: u64,
    variables: HashMap<String, Type>,
    records: HashMap<String, RecordType>,
    functions: Arc<FunctionLibrary>,
}

impl Environment {
    /// Starts building an environment over a function library
    pub fn builder(functions: Arc<FunctionLibrary>) -> EnvironmentBuilder {
        EnvironmentBuilder {
            variables: Vec::new(),
            records: Vec::new(),
            functions,
        }
    }

    /// Process-unique identifier, used to key compiled programs
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }

    pub fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.records.get(name)
    }

    pub fn functions(&self) -> &Arc<FunctionLibrary> {
        &self.functions
    }

    /// Parses and type-checks `source`
    ///
    /// # Errors
    ///
    /// Returns `CompileError` for syntax errors, undeclared references,
    /// undefined fields and operand types without a matching overload.
    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        let mut expr = parser::parse(source)?;
        let result_type = checker::check(self, &mut expr)?;
        Ok(Program {
            source: source.to_string(),
            expr,
            result_type,
            functions: Arc::clone(&self.functions),
        })
    }
}

/// Builder for `Environment`
pub struct EnvironmentBuilder {
    variables: Vec<(String, Type)>,
    records: Vec<RecordType>,
    functions: Arc<FunctionLibrary>,
}

impl EnvironmentBuilder {
    /// Declares a typed variable
    pub fn variable(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.variables.push((name.into(), ty));
        self
    }

    /// Registers a record type so field selections on it can be checked
    pub fn record(mut self, record: RecordType) -> Self {
        self.records.push(record);
        self
    }

    /// Finishes the environment
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError` if a variable or record type is declared
    /// twice with different definitions.
    pub fn build(self) -> Result<Environment, EnvironmentError> {
        let mut variables: HashMap<String, Type> = HashMap::new();
        for (name, ty) in self.variables {
            if let Some(existing) = variables.get(&name)
                && *existing != ty
            {
                return Err(EnvironmentError::ConflictingVariable {
                    name,
                    first: existing.clone(),
                    second: ty,
                });
            }
            variables.insert(name, ty);
        }

        let mut records: HashMap<String, RecordType> = HashMap::new();
        for record in self.records {
            if let Some(existing) = records.get(&record.name) {
                if *existing != record {
                    return Err(EnvironmentError::ConflictingRecord(record.name));
                }
                continue;
            }
            records.insert(record.name.clone(), record);
        }

        Ok(Environment {
            id: NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed),
            variables,
            records,
            functions: self.functions,
        })
    }
}

/// A compiled, checked expression. Safe to evaluate from many threads.
#[derive(Debug)]
pub struct Program {
    source: String,
    expr: Expr,
    result_type: Type,
    functions: Arc<FunctionLibrary>,
}

impl Program {
    /// The expression text this program was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Static result type inferred by the checker
    pub fn result_type(&self) -> &Type {
        &self.result_type
    }

    /// Evaluates the program with the given bindings
    ///
    /// # Errors
    ///
    /// Returns `EvalError` on runtime failures such as missing map keys,
    /// invalid regular expressions, overflow, or cancellation of `ctx`.
    pub fn evaluate(&self, ctx: &Context, activation: &Activation) -> Result<Value, EvalError> {
        if ctx.is_done() {
            return Err(EvalError::Canceled);
        }
        Interpreter::new(&self.functions, activation, ctx).eval(&self.expr)
    }
}
