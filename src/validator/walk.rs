//! Object graph traversal
//!
//! Each record is checked against its own rules first (type rules, then
//! field rules in field declaration order), then its fields are visited in
//! declaration order: nested records, options of records, list elements
//! by index and map values. Map keys are not visited.

use super::Validator;
use super::adapter::AdaptedField;
use crate::cel::{Activation, CompileError, Environment, EvalError, Key, Program, Value};
use crate::context::Context;
use crate::error::{Cancelled, Error, FatalError, ValidationError};
use crate::reflect::{Record, Reflect, Shape, as_record};
use crate::types::RuleSet;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Walks `value` and returns every collected error
pub(super) fn run(validator: &Validator, ctx: &Context, value: &dyn Reflect) -> Vec<Error> {
    let mut walk = Walk {
        validator,
        ctx,
        errors: Vec::new(),
        stopped: false,
    };
    walk.visit(value);
    walk.errors
}

struct Walk<'v> {
    validator: &'v Validator,
    ctx: &'v Context,
    errors: Vec<Error>,
    stopped: bool,
}

/// Where a rule is attached
#[derive(Clone, Copy)]
enum Target<'a> {
    Type,
    Field(&'a str),
}

impl Target<'_> {
    fn field(&self) -> &str {
        match self {
            Target::Type => "",
            Target::Field(name) => name,
        }
    }
}

impl<'v> Walk<'v> {
    /// Records the cancellation reason once and reports whether to stop
    fn cancelled(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if let Some(reason) = self.ctx.err() {
            self.stop(reason);
        }
        self.stopped
    }

    fn stop(&mut self, reason: Cancelled) {
        if !self.stopped {
            debug!(reason = %reason, "validation cancelled");
            self.errors.push(Error::Cancelled(reason));
            self.stopped = true;
        }
    }

    /// Validates `value` if it is a record or an option holding one
    fn visit(&mut self, value: &dyn Reflect) {
        if let Some(record) = as_record(value) {
            self.validate_record(record);
        }
    }

    fn validate_record(&mut self, record: &dyn Record) {
        if self.cancelled() {
            return;
        }

        let type_id = Any::type_id(record.as_any());
        if self.validator.is_native(type_id) {
            self.validate_native(record);
        } else {
            self.validate_adapted(record);
        }

        for field in record.fields() {
            if self.stopped {
                return;
            }
            self.descend(field.value);
        }
    }

    fn descend(&mut self, value: &dyn Reflect) {
        match value.shape() {
            Shape::Record(record) => self.validate_record(record),
            Shape::Pointer(Some(inner)) => self.visit(inner),
            Shape::List(items) | Shape::Map(items) => {
                for item in items {
                    if self.stopped {
                        return;
                    }
                    self.visit(item);
                }
            }
            Shape::Pointer(None) | Shape::Scalar => {}
        }
    }

    fn validate_native(&mut self, record: &dyn Record) {
        let validator = self.validator;
        let path = record.type_path();
        let Some((type_name, rule_set)) = validator.lookup(&path) else {
            debug!(type_name = %path.base_name(), "no rules for native type");
            return;
        };

        let env = match validator.native_env(record) {
            Ok(env) => env,
            Err(e) => {
                error!(type_name = %type_name, error = %e, "failed to get native environment");
                self.errors.push(Error::Fatal(FatalError::new(format!(
                    "env creation error for {}: {}",
                    type_name, e.message
                ))));
                return;
            }
        };

        let this = record.to_value();
        for rule in &rule_set.type_rules {
            if self.cancelled() {
                return;
            }
            let program = match validator.engine.compile(&env, rule) {
                Ok(program) => program,
                // A type rule such as `self.value != null` does not check
                // when a generic field is instantiated with a non-nullable
                // type; the field rules carry the real constraint.
                Err(e) if e.is_no_matching_overload() => {
                    debug!(rule = %rule, type_name = %type_name, error = %e, "ignored type rule without matching overload");
                    continue;
                }
                Err(e) => {
                    self.compile_failed(type_name, Target::Type, rule, &e);
                    continue;
                }
            };
            self.evaluate(&program, this.clone(), type_name, Target::Type, true);
        }

        let fields = record.fields();
        for field in &fields {
            let rules = rule_set.rules_for(field.name);
            if rules.is_empty() {
                continue;
            }
            // Nested native records are validated when the walk reaches them
            if let Some(nested) = as_record(field.value)
                && validator.is_native(Any::type_id(nested.as_any()))
            {
                continue;
            }
            let value = field.value.to_value();
            self.check_field(type_name, field.name, rules, &value);
            if self.stopped {
                return;
            }
        }

        for name in rule_set.field_rules.keys() {
            if !fields.iter().any(|f| f.name == name.as_str()) {
                warn!(field = %name, type_name = %type_name, "field not found in native record");
            }
        }
    }

    fn validate_adapted(&mut self, record: &dyn Record) {
        let validator = self.validator;
        let Some(target) = validator.adapter_for(Any::type_id(record.as_any())) else {
            debug!(
                type_name = %record.type_path().base_name(),
                "no type adapter, continuing to recurse"
            );
            return;
        };
        let type_name = target.target.as_str();
        let Some(rule_set) = validator.rules.get(type_name) else {
            debug!(type_name = %type_name, "no rules for adapter target");
            return;
        };

        let adapted = match target.adapter.adapt(record.as_any()) {
            Ok(adapted) => adapted,
            Err(e) => {
                error!(type_name = %type_name, error = %e, "failed to adapt object");
                self.errors.push(Error::Fatal(FatalError::new(format!(
                    "type adapter error for {}: {}",
                    type_name, e
                ))));
                return;
            }
        };

        let prepared: BTreeMap<String, Value> = adapted
            .iter()
            .map(|(name, field)| (name.to_string(), self.prepare(field)))
            .collect();

        self.check_type_rules(type_name, rule_set, &validator.object_env, &prepared);
        if self.stopped {
            return;
        }

        for (field, rules) in &rule_set.field_rules {
            let Some(value) = prepared.get(field) else {
                warn!(field = %field, type_name = %type_name, "field not found in adapted map");
                continue;
            };
            self.check_field(type_name, field, rules, value);
            if self.stopped {
                return;
            }
        }
    }

    fn check_type_rules(
        &mut self,
        type_name: &str,
        rule_set: &RuleSet,
        env: &Arc<Environment>,
        prepared: &BTreeMap<String, Value>,
    ) {
        if rule_set.type_rules.is_empty() {
            return;
        }
        let object = Value::map(
            prepared
                .iter()
                .map(|(k, v)| (Key::from(k.as_str()), v.clone()))
                .collect(),
        );
        for rule in &rule_set.type_rules {
            if self.cancelled() {
                return;
            }
            match self.validator.engine.compile(env, rule) {
                Ok(program) => {
                    self.evaluate(&program, object.clone(), type_name, Target::Type, false)
                }
                Err(e) => self.compile_failed(type_name, Target::Type, rule, &e),
            }
        }
    }

    /// Evaluates field rules with the field value bound to `self`
    fn check_field(&mut self, type_name: &str, field: &str, rules: &[String], value: &Value) {
        let env = Arc::clone(&self.validator.field_env);
        for rule in rules {
            if self.cancelled() {
                return;
            }
            match self.validator.engine.compile(&env, rule) {
                Ok(program) => {
                    self.evaluate(&program, value.clone(), type_name, Target::Field(field), false)
                }
                Err(e) => self.compile_failed(type_name, Target::Field(field), rule, &e),
            }
        }
    }

    fn evaluate(
        &mut self,
        program: &Program,
        this: Value,
        type_name: &str,
        target: Target<'_>,
        ignore_no_overload: bool,
    ) {
        let activation = Activation::new().bind("self", this);
        match program.evaluate(self.ctx, &activation) {
            Ok(Value::Bool(true)) => {}
            Ok(_) => self.errors.push(Error::Validation(ValidationError::new(
                type_name,
                target.field(),
                program.source(),
            ))),
            Err(EvalError::Canceled) => {
                let reason = self.ctx.err().unwrap_or(Cancelled::Canceled);
                self.stop(reason);
            }
            Err(e) if ignore_no_overload && e.is_no_matching_overload() => {
                debug!(rule = %program.source(), type_name = %type_name, error = %e, "ignored type rule without matching overload");
            }
            Err(e) => {
                error!(
                    rule = %program.source(),
                    type_name = %type_name,
                    field = %target.field(),
                    error = %e,
                    "failed to evaluate rule"
                );
                self.errors.push(Error::Validation(ValidationError::new(
                    type_name,
                    target.field(),
                    format!("evaluation error: {}", e),
                )));
            }
        }
    }

    fn compile_failed(&mut self, type_name: &str, target: Target<'_>, rule: &str, e: &CompileError) {
        error!(rule = %rule, type_name = %type_name, field = %target.field(), error = %e, "failed to compile rule");
        let message = match target {
            Target::Type => format!("type rule compilation error for {}: {}", type_name, e),
            Target::Field(field) => format!(
                "field rule compilation error for {}.{}: {}",
                type_name, field, e
            ),
        };
        self.errors.push(Error::Fatal(FatalError::new(message)));
    }

    /// Converts an adapted entry into the value bound for its rules
    fn prepare(&self, field: &AdaptedField<'_>) -> Value {
        match field {
            AdaptedField::Value(value) => value.clone(),
            AdaptedField::Field(value) => self.prepare_reflect(*value),
        }
    }

    /// Empty options become null; records with their own adapter become
    /// maps; everything else converts directly
    fn prepare_reflect(&self, value: &dyn Reflect) -> Value {
        match value.shape() {
            Shape::Pointer(None) => Value::Null,
            Shape::Pointer(Some(inner)) => self.prepare_reflect(inner),
            Shape::Record(record) => {
                let Some(target) = self.validator.adapter_for(Any::type_id(record.as_any()))
                else {
                    return value.to_value();
                };
                match target.adapter.adapt(record.as_any()) {
                    Ok(adapted) => Value::map(
                        adapted
                            .iter()
                            .map(|(name, field)| (Key::from(name), self.prepare(field)))
                            .collect(),
                    ),
                    Err(e) => {
                        warn!(target = %target.target, error = %e, "type adapter failed for value");
                        value.to_value()
                    }
                }
            }
            _ => value.to_value(),
        }
    }
}
