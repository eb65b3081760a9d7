//! Expression engine and program cache tests

mod common;

use std::sync::Arc;
use veritas::cel::{Activation, RecordType, Type, Value};
use veritas::{Context, Engine, EngineConfig};

fn dyn_env(engine: &Engine) -> veritas::cel::Environment {
    assert_ok!(engine.new_environment([("self".to_string(), Type::Dyn)], []))
}

fn eval(engine: &Engine, rule: &str, this: Value) -> Value {
    let env = dyn_env(engine);
    let program = assert_ok!(engine.compile(&env, rule));
    assert_ok!(program.evaluate(&Context::background(), &Activation::new().bind("self", this)))
}

#[test]
fn test_concurrent_first_use_compiles_once() {
    let engine = Engine::new();
    let env = Arc::new(dyn_env(&engine));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let engine = engine.clone();
            let env = Arc::clone(&env);
            scope.spawn(move || {
                for _ in 0..50 {
                    assert_ok!(engine.compile(&env, "self.size() > 3 && self.startsWith('id_')"));
                }
            });
        }
    });

    assert_eq!(engine.cache().compilations(), 1);
}

#[test]
fn test_same_rule_in_different_environments() {
    let engine = Engine::new();
    let strings = assert_ok!(engine.new_environment([("self".to_string(), Type::String)], []));
    let dynamic = dyn_env(&engine);

    assert_ok!(engine.compile(&strings, "self != ''"));
    assert_ok!(engine.compile(&dynamic, "self != ''"));
    assert_eq!(engine.cache().compilations(), 2);
}

#[test]
fn test_purge_forces_recompilation() {
    let engine = Engine::new();
    let env = dyn_env(&engine);
    assert_ok!(engine.compile(&env, "self == 1"));
    engine.cache().purge();
    assert!(engine.cache().is_empty());
    assert_ok!(engine.compile(&env, "self == 1"));
    assert_eq!(engine.cache().compilations(), 2);
}

#[test]
fn test_failed_compilation_is_not_cached() {
    let engine = Engine::new();
    let env = dyn_env(&engine);
    assert!(engine.compile(&env, "self ==").is_err());
    assert!(engine.compile(&env, "self ==").is_err());
    assert_eq!(engine.cache().compilations(), 2);
    assert!(engine.cache().is_empty());
}

#[test]
fn test_bounded_capacity() {
    let engine = Engine::with_config(&EngineConfig {
        cache_capacity: 4,
        ..EngineConfig::default()
    });
    let env = dyn_env(&engine);
    for i in 0..32 {
        assert_ok!(engine.compile(&env, &format!("self == {}", i)));
    }
    assert_eq!(engine.cache().capacity(), 4);
    assert!(engine.cache().len() <= 4);
}

#[test]
fn test_standard_library() {
    let engine = Engine::new();
    assert_eq!(eval(&engine, "self.size() == 5", "hello".into()), Value::Bool(true));
    assert_eq!(
        eval(&engine, "self.matches('^[a-z]+$')", "hello".into()),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&engine, "self.endsWith('lo') && self.contains('ell')", "hello".into()),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&engine, "self.all(x, x > 0)", Value::list(vec![1i64.into(), 2i64.into()])),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&engine, "self.exists(x, x == 2)", Value::list(vec![1i64.into(), 2i64.into()])),
        Value::Bool(true)
    );
}

#[test]
fn test_custom_library() {
    let engine = Engine::new();
    assert_eq!(
        eval(&engine, "strings.ToUpper(self) == 'ABC'", "abc".into()),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&engine, "strings.ToLower(self) == 'abc'", "ABC".into()),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&engine, "custom.matches(self, '^a')", "abc".into()),
        Value::Bool(true)
    );
}

#[test]
fn test_typed_record_environment() {
    let engine = Engine::new();
    let user = RecordType::new("app.User")
        .with_field("name", Type::String)
        .with_field("age", Type::Int);
    let env = assert_ok!(engine.new_environment(
        [("self".to_string(), Type::Record("app.User".into()))],
        [user],
    ));

    assert_ok!(engine.compile(&env, "self.age >= 18"));
    assert!(engine.compile(&env, "self.missing == 1").is_err());
    let err = engine.compile(&env, "self.name != null").unwrap_err();
    assert!(err.is_no_matching_overload(), "{}", err);
}

#[test]
fn test_cancelled_evaluation() {
    let engine = Engine::new();
    let env = dyn_env(&engine);
    let program = assert_ok!(engine.compile(&env, "self.all(x, x > 0)"));
    let ctx = Context::background().with_cancel();
    ctx.cancel();
    let items: Vec<Value> = (1..100i64).map(Value::from).collect();
    let result = program.evaluate(&ctx, &Activation::new().bind("self", Value::list(items)));
    assert!(result.is_err());
}
