//! End-to-end validation tests
//!
//! Rules are extracted from `SOURCE`, which declares the same structs as this
//! file with their annotations, and then enforced by a native validator.

mod common;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use veritas::extract::extract_source;
use veritas::rules::shorthand::EMAIL_RULE;
use veritas::{
    AdaptedRecord, AdapterError, Cancelled, Context, Error, JoinedError, RuleSets, Validator,
    impl_record, to_error_map,
};

const SOURCE: &str = r#"
use std::collections::HashMap;

/// A user of the system.
/// @cel: self.age >= 18
pub struct MockUser {
    #[validate("nonzero")]
    pub name: String,
    #[validate("nonzero,email")]
    pub email: String,
    pub age: i64,
    #[validate("required")]
    pub id: Option<i64>,
}

pub struct MockComplexData {
    #[validate("dive,dive,nonzero")]
    pub matrix: Vec<Vec<i64>>,
    #[validate("keys,cel:self.startsWith('id_'),values,required")]
    pub resource_map: HashMap<String, Option<i64>>,
}

/// @cel: self.value != null
pub struct Box<T> {
    #[validate("required")]
    pub value: T,
}

pub struct Item {
    #[validate("nonzero")]
    pub name: String,
}

pub struct Audit {
    #[validate("nonzero")]
    pub created_by: String,
}

pub struct Document {
    #[validate(flatten)]
    pub audit: Audit,
    #[validate("nonzero")]
    pub title: String,
}
"#;

pub struct MockUser {
    pub name: String,
    pub email: String,
    pub age: i64,
    pub id: Option<i64>,
}

pub struct MockComplexData {
    pub matrix: Vec<Vec<i64>>,
    pub resource_map: HashMap<String, Option<i64>>,
}

pub struct Box<T> {
    pub value: T,
}

pub struct Item {
    pub name: String,
}

pub struct Audit {
    pub created_by: String,
}

pub struct Document {
    pub audit: Audit,
    pub title: String,
}

impl_record!(MockUser { name, email, age, id });
impl_record!(MockComplexData { matrix, resource_map });
impl_record!(Box<T> { value });
impl_record!(Item { name });
impl_record!(Audit { created_by });
impl_record!(Document { #[flatten] audit, title });

fn key(name: &str) -> String {
    format!("{}.{}", module_path!(), name)
}

fn extracted_rules() -> RuleSets {
    let extraction = assert_ok!(extract_source(Path::new("models.rs"), SOURCE, module_path!()));
    assert!(extraction.tag_errors.is_empty(), "{:?}", extraction.tag_errors);
    extraction.rule_sets
}

fn validator() -> Validator {
    assert_ok!(
        Validator::builder()
            .rule_sets(extracted_rules())
            .native_type::<MockUser>()
            .native_type::<MockComplexData>()
            .native_type::<Box<Option<i64>>>()
            .native_type::<Box<Option<Item>>>()
            .native_type::<Item>()
            .native_type::<Document>()
            .build()
    )
}

fn valid_user() -> MockUser {
    MockUser {
        name: "Gopher".into(),
        email: "gopher@go.org".into(),
        age: 20,
        id: Some(1),
    }
}

fn triples(err: &JoinedError) -> Vec<(String, String, String)> {
    err.violations()
        .map(|v| (v.type_name.clone(), v.field.clone(), v.rule.clone()))
        .collect()
}

#[test]
fn test_valid_user_passes() {
    assert_ok!(validator().validate(&Context::background(), &valid_user()));
}

#[test]
fn test_invalid_user_reports_each_field() {
    let user = MockUser {
        name: String::new(),
        email: "bad".into(),
        age: 20,
        id: None,
    };
    let err = validator()
        .validate(&Context::background(), &user)
        .unwrap_err();

    let user_key = key("MockUser");
    assert_eq!(
        triples(&err),
        vec![
            (user_key.clone(), "name".into(), r#"self != """#.into()),
            (
                user_key.clone(),
                "email".into(),
                format!(r#"self != "" && {}"#, EMAIL_RULE),
            ),
            (user_key, "id".into(), "self != null".into()),
        ]
    );
}

#[test]
fn test_type_rule_violation() {
    let user = MockUser {
        age: 17,
        ..valid_user()
    };
    let err = validator()
        .validate(&Context::background(), &user)
        .unwrap_err();
    assert_eq!(
        triples(&err),
        vec![(key("MockUser"), String::new(), "self.age >= 18".into())]
    );
    assert_eq!(
        err.to_string(),
        format!("{}: validation failed, rule: self.age >= 18", key("MockUser"))
    );
}

#[test]
fn test_nested_dive() {
    let data = MockComplexData {
        matrix: vec![vec![1, 2], vec![3, 0]],
        resource_map: HashMap::new(),
    };
    let err = validator()
        .validate(&Context::background(), &data)
        .unwrap_err();
    assert_eq!(
        triples(&err),
        vec![(
            key("MockComplexData"),
            "matrix".into(),
            "self.all(x, x.all(x, x != 0))".into()
        )]
    );
}

#[test]
fn test_map_keys_rule() {
    let data = MockComplexData {
        matrix: vec![vec![1]],
        resource_map: HashMap::from([("id_1".to_string(), Some(7)), ("x".to_string(), Some(8))]),
    };
    let err = validator()
        .validate(&Context::background(), &data)
        .unwrap_err();
    assert!(
        err.violations().any(|v| v.field == "resource_map"
            && v.rule == "self.all(k, k.startsWith('id_'))"),
        "{}",
        err
    );
}

#[test]
fn test_generic_type_with_null_value() {
    let err = validator()
        .validate(&Context::background(), &Box::<Option<i64>> { value: None })
        .unwrap_err();
    let boxed = key("Box[T]");
    assert_eq!(
        triples(&err),
        vec![
            (boxed.clone(), String::new(), "self.value != null".into()),
            (boxed, "value".into(), "self != null".into()),
        ]
    );
}

#[test]
fn test_generic_type_recurses_into_value() {
    let boxed = Box {
        value: Some(Item {
            name: String::new(),
        }),
    };
    let err = validator()
        .validate(&Context::background(), &boxed)
        .unwrap_err();
    assert_eq!(
        triples(&err),
        vec![(key("Item"), "name".into(), r#"self != """#.into())]
    );
}

#[test]
fn test_flattened_fields_use_enclosing_rule_set() {
    let doc = Document {
        audit: Audit {
            created_by: String::new(),
        },
        title: "Spec".into(),
    };
    let err = validator()
        .validate(&Context::background(), &doc)
        .unwrap_err();
    assert_eq!(
        triples(&err),
        vec![(key("Document"), "created_by".into(), r#"self != """#.into())]
    );
}

#[test]
fn test_cancelled_context() {
    let ctx = Context::background().with_cancel();
    ctx.cancel();
    let err = validator().validate(&ctx, &valid_user()).unwrap_err();
    assert_eq!(err.errors(), &[Error::Cancelled(Cancelled::Canceled)]);
    assert!(err.is_cancelled());
}

#[test]
fn test_expired_deadline() {
    let ctx = Context::background().with_timeout(Duration::ZERO);
    let user = MockUser {
        name: String::new(),
        ..valid_user()
    };
    let err = validator().validate(&ctx, &user).unwrap_err();
    assert_eq!(err.errors(), &[Error::Cancelled(Cancelled::DeadlineExceeded)]);
}

#[test]
fn test_nil_safety() {
    let validator = validator();
    assert_ok!(validator.validate(&Context::background(), &None::<MockUser>));
    assert_ok!(validator.validate(&Context::background(), &"not a record"));
}

#[test]
fn test_error_map() {
    let user = MockUser {
        name: String::new(),
        email: String::new(),
        age: 10,
        id: Some(3),
    };
    let err = validator()
        .validate(&Context::background(), &user)
        .unwrap_err();
    let map = to_error_map(&err);
    assert_eq!(map.len(), 3);
    assert_eq!(map[&key("MockUser")], "self.age >= 18");
    assert_eq!(map["name"], r#"self != """#);
    assert!(map["email"].starts_with(r#"self != "" && "#));
}

#[test]
fn test_concurrent_validation_is_deterministic() {
    let validator = validator();
    let user = MockUser {
        name: String::new(),
        email: "bad".into(),
        age: 3,
        id: None,
    };
    let expected = triples(
        &validator
            .validate(&Context::background(), &user)
            .unwrap_err(),
    );

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    triples(
                        &validator
                            .validate(&Context::background(), &user)
                            .unwrap_err(),
                    )
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_adapter_mode_uses_target_rule_set() {
    struct Account {
        login: String,
        age: i64,
    }
    impl_record!(Account { login, age });

    fn adapt(account: &Account) -> Result<AdaptedRecord<'_>, AdapterError> {
        Ok(AdaptedRecord::new()
            .with_field("name", &account.login)
            .with_value("age", account.age))
    }

    let mut rules = RuleSets::new();
    rules.insert(
        "accounts.User".into(),
        veritas::RuleSet::new()
            .with_type_rule("self.age >= 18")
            .with_field_rule("name", r#"self != """#),
    );
    let validator = assert_ok!(
        Validator::builder()
            .rule_sets(rules)
            .adapter::<Account, _>("accounts.User", adapt)
            .build()
    );

    let account = Account {
        login: String::new(),
        age: 12,
    };
    let err = validator
        .validate(&Context::background(), &account)
        .unwrap_err();
    assert_eq!(
        triples(&err),
        vec![
            ("accounts.User".into(), String::new(), "self.age >= 18".into()),
            ("accounts.User".into(), "name".into(), r#"self != """#.into()),
        ]
    );
}

#[test]
fn test_injected_logger_receives_events() {
    use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

    struct Counter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for Counter {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let events = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry()
        .with(Counter(Arc::clone(&events)))
        .with(tracing_subscriber::filter::LevelFilter::DEBUG);
    let validator = assert_ok!(
        Validator::builder()
            .rule_sets(extracted_rules())
            .native_type::<MockUser>()
            .logger(tracing::Dispatch::new(subscriber))
            .build()
    );

    assert_ok!(validator.validate(&Context::background(), &valid_user()));
    assert!(events.load(Ordering::SeqCst) > 0);
}
