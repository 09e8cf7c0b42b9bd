//! End-to-end evaluation through the public façade

use chrono::{Duration, Utc};
use dilemma::{evaluate, Context, Error, Value};
use serde_json::json;

fn ctx(json: serde_json::Value) -> Context {
    Context::from_json(json).unwrap()
}

#[test]
fn test_arithmetic_with_empty_context() {
    let context = Context::new();
    assert_eq!(evaluate("2 * (3 + 4)", &context).unwrap(), Value::Int(14));
}

#[test]
fn test_glob_match() {
    let context = Context::new();
    assert_eq!(
        evaluate("'Hello.TXT' like '*.txt'", &context).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_nested_path_comparison() {
    let context = ctx(json!({
        "user": {"profile": {"age": 32}},
        "settings": {"min_age": 18},
    }));
    assert_eq!(
        evaluate("user.profile.age >= settings.min_age", &context).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_role_membership() {
    let context = ctx(json!({"user": {"roles": ["user", "admin", "editor"]}}));
    assert_eq!(
        evaluate("'admin' in user.roles", &context).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        evaluate("'superadmin' in user.roles", &context).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn test_indexed_path() {
    let context = ctx(json!({"teams": [{"name": "Frontend"}, {"name": "Backend"}]}));
    assert_eq!(
        evaluate("teams[0].name == 'Frontend'", &context).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_emptiness_scenario() {
    let context = ctx(json!({
        "ghost_crew": [],
        "deserted_mansion": {},
        "treasure_chest": ["x"],
    }));
    assert_eq!(
        evaluate(
            "ghost_crew is $empty and deserted_mansion is $empty \
             and (treasure_chest is $empty) == false",
            &context
        )
        .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_older_than_a_week() {
    let mut context = Context::new();
    context.insert("old_event", Utc::now() - Duration::days(7) - Duration::hours(1));
    assert_eq!(
        evaluate("old_event older than 1 week", &context).unwrap(),
        Value::Bool(true)
    );

    let mut context = Context::new();
    context.insert("old_event", Utc::now() - Duration::days(6));
    assert_eq!(
        evaluate("old_event older than 1 week", &context).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn test_date_strings_parse_lazily() {
    let context = ctx(json!({
        "created": "2024-01-01",
        "updated": "2024-03-01 09:30:00 UTC",
    }));
    assert_eq!(
        evaluate("created before updated", &context).unwrap(),
        Value::Bool(true)
    );
    // The same strings stay plain strings under ==
    assert_eq!(
        evaluate("created == '2024-01-01'", &context).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_parse_error_reports_position() {
    let context = Context::new();
    let err = evaluate("1 + * 2", &context).unwrap_err();
    let Error::Parse { line, column, .. } = err else {
        panic!("expected parse error, got {:?}", err);
    };
    assert_eq!(line, 1);
    assert_eq!(column, 5);
}

#[test]
fn test_division_by_zero_error() {
    let context = Context::new();
    assert!(matches!(
        evaluate("1 / 0", &context),
        Err(Error::DivisionByZero { .. })
    ));
}

#[test]
fn test_unknown_sentinel_error() {
    let context = Context::new();
    assert!(matches!(
        evaluate("x is $sometime", &context),
        Err(Error::UnknownSentinel { .. })
    ));
}

#[test]
fn test_boolean_connectives_return_booleans() {
    let context = ctx(json!({"items": [1], "name": "x"}));
    // Non-boolean operands are coerced through truthiness
    assert_eq!(evaluate("items and name", &context).unwrap(), Value::Bool(true));
    assert_eq!(evaluate("items and ''", &context).unwrap(), Value::Bool(false));
}

#[test]
fn test_error_messages_render() {
    let context = Context::new();
    let err = evaluate("1 + 'x'", &context).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("type error"), "{}", message);
}
