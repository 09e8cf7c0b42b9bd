//! Tree-walking evaluator
//!
//! Walks an AST against a context and the active resolver. The `now` instant
//! is captured once when the evaluator is constructed, so every `$now` and
//! `$today` in one evaluation observes the same instant. `and`/`or`
//! short-circuit: the right operand is never evaluated (and can never raise)
//! once the left operand decides the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;

use crate::ast::{
    BinaryOp, Expr, ExprKind, IsTarget, Literal, Sentinel, Span, TimeUnit, UnaryOp,
    WindowDirection,
};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::resolver::{self, Resolver};
use crate::temporal;
use crate::value::Value;

/// Evaluates expressions against one context at one instant.
pub struct Evaluator<'a> {
    context: &'a Context,
    default_resolver: Arc<dyn Resolver>,
    now: DateTime<Utc>,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator that samples `now` from the wall clock.
    pub fn new(context: &'a Context) -> Self {
        Self::with_now(context, Utc::now())
    }

    /// Create an evaluator with an explicit `now` instant.
    ///
    /// The default resolver is captured here as well, so a concurrent
    /// default change cannot switch resolvers mid-evaluation.
    pub fn with_now(context: &'a Context, now: DateTime<Utc>) -> Self {
        Self {
            context,
            default_resolver: resolver::default_resolver(),
            now,
        }
    }

    /// Evaluate an expression tree to a value.
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(literal) => self.eval_literal(literal, span),
            ExprKind::Path(segments) => {
                let resolved = self
                    .default_resolver
                    .resolve(segments, self.context)
                    .map_err(|e| e.with_span(span))?;
                Ok(resolved.unwrap_or(Value::Null))
            }
            ExprKind::RawPath { text, resolver } => {
                let active = match resolver {
                    Some(name) => resolver::resolver_by_name(name).ok_or_else(|| {
                        Error::resolver_at(
                            span,
                            format!("no resolver named '{}' is registered", name),
                        )
                    })?,
                    None => self.default_resolver.clone(),
                };
                let resolved = active
                    .resolve_raw(text, self.context)
                    .map_err(|e| e.with_span(span))?;
                Ok(resolved.unwrap_or(Value::Null))
            }
            ExprKind::Unary { op, expr: operand } => match op {
                UnaryOp::Not => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
                UnaryOp::Neg => self.eval_negation(operand, span),
            },
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right, span),
            ExprKind::IsCheck { subject, target } => self.eval_is_check(subject, target),
            ExprKind::TimeWindow {
                subject,
                quantity,
                unit,
                direction,
            } => self.eval_time_window(subject, quantity, *unit, *direction),
        }
    }

    fn eval_literal(&self, literal: &Literal, span: Span) -> Result<Value> {
        match literal {
            Literal::Int(n) => Ok(Value::Int(*n)),
            Literal::Float(x) => Ok(Value::Float(*x)),
            Literal::String(s) => Ok(Value::String(s.clone())),
            Literal::Bool(b) => Ok(Value::Bool(*b)),
            Literal::Sentinel(Sentinel::Now) => Ok(Value::Instant(self.now)),
            Literal::Sentinel(Sentinel::Today) => Ok(Value::Instant(temporal::midnight(self.now))),
            Literal::Sentinel(s) => Err(Error::type_at(
                span,
                format!("${} is only valid as the target of 'is'", s.name()),
            )),
        }
    }

    fn eval_negation(&self, operand: &Expr, span: Span) -> Result<Value> {
        match self.eval(operand)? {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Error::type_at(span, "integer overflow in negation")),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(Error::type_at(
                span,
                format!("unary '-' requires a number, got {}", other.kind_name()),
            )),
        }
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOp, right: &Expr, span: Span) -> Result<Value> {
        // Short-circuit logic first: the right operand must not run (or
        // raise) once the left decides the outcome.
        match op {
            BinaryOp::And => {
                if !self.eval(left)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval(right)?.is_truthy()));
            }
            BinaryOp::Or => {
                if self.eval(left)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval(right)?.is_truthy()));
            }
            _ => {}
        }

        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.eval_arithmetic(op, &lhs, &rhs, span)
            }
            BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.eval_ordering(op, &lhs, &rhs, span)
            }
            BinaryOp::In => containment(&rhs, &lhs, "right", span),
            BinaryOp::Contains => containment(&lhs, &rhs, "left", span),
            BinaryOp::Like => eval_like(&lhs, &rhs, span),
            BinaryOp::Before => {
                let a = temporal::coerce_instant(&lhs, left.span)?;
                let b = temporal::coerce_instant(&rhs, right.span)?;
                Ok(Value::Bool(a < b))
            }
            BinaryOp::After => {
                let a = temporal::coerce_instant(&lhs, left.span)?;
                let b = temporal::coerce_instant(&rhs, right.span)?;
                Ok(Value::Bool(a > b))
            }
            BinaryOp::SameDayAs => {
                let a = temporal::coerce_instant(&lhs, left.span)?;
                let b = temporal::coerce_instant(&rhs, right.span)?;
                Ok(Value::Bool(a.date_naive() == b.date_naive()))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_arithmetic(
        &self,
        op: BinaryOp,
        lhs: &Value,
        rhs: &Value,
        span: Span,
    ) -> Result<Value> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let (a, b) = (*a, *b);
                match op {
                    BinaryOp::Add => a.checked_add(b).map(Value::Int),
                    BinaryOp::Sub => a.checked_sub(b).map(Value::Int),
                    BinaryOp::Mul => a.checked_mul(b).map(Value::Int),
                    BinaryOp::Div => {
                        if b == 0 {
                            return Err(Error::DivisionByZero { span });
                        }
                        // True division: stay integral only for exact results.
                        return Ok(match (a.checked_rem(b), a.checked_div(b)) {
                            (Some(0), Some(q)) => Value::Int(q),
                            _ => Value::Float(a as f64 / b as f64),
                        });
                    }
                    _ => unreachable!(),
                }
                .ok_or_else(|| Error::type_at(span, "integer overflow"))
            }
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = as_f64(lhs);
                let b = as_f64(rhs);
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(Error::DivisionByZero { span });
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                Ok(Value::Float(result))
            }
            (Value::String(_), _) | (_, Value::String(_)) => Err(Error::type_at(
                span,
                format!("'{}' operator not supported with string operands", op.symbol()),
            )),
            _ => Err(Error::type_at(
                span,
                format!(
                    "cannot apply '{}' to {} and {}",
                    op.symbol(),
                    lhs.kind_name(),
                    rhs.kind_name()
                ),
            )),
        }
    }

    fn eval_ordering(&self, op: BinaryOp, lhs: &Value, rhs: &Value, span: Span) -> Result<Value> {
        let ordering = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => as_f64(lhs)
                .partial_cmp(&as_f64(rhs))
                .ok_or_else(|| Error::type_at(span, "cannot order NaN"))?,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => {
                return Err(Error::type_at(
                    span,
                    format!(
                        "'{}' is not supported between {} and {}",
                        op.symbol(),
                        lhs.kind_name(),
                        rhs.kind_name()
                    ),
                ))
            }
        };

        let result = match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::Ge => ordering.is_ge(),
            _ => unreachable!(),
        };
        Ok(Value::Bool(result))
    }

    fn eval_is_check(&self, subject: &Expr, target: &IsTarget) -> Result<Value> {
        // `is $empty` and `is <expr>` never coerce dates; only the calendar
        // checks do.
        let value = self.eval(subject)?;
        match target {
            IsTarget::Empty => Ok(Value::Bool(value.is_empty_value())),
            IsTarget::Expr(target) => {
                let other = self.eval(target)?;
                Ok(Value::Bool(value.loose_eq(&other)))
            }
            IsTarget::Past => {
                let t = temporal::coerce_instant(&value, subject.span)?;
                Ok(Value::Bool(t < self.now))
            }
            IsTarget::Future => {
                let t = temporal::coerce_instant(&value, subject.span)?;
                Ok(Value::Bool(t > self.now))
            }
            IsTarget::Today => {
                let t = temporal::coerce_instant(&value, subject.span)?;
                Ok(Value::Bool(t.date_naive() == self.now.date_naive()))
            }
        }
    }

    fn eval_time_window(
        &self,
        subject: &Expr,
        quantity: &Expr,
        unit: TimeUnit,
        direction: WindowDirection,
    ) -> Result<Value> {
        let value = self.eval(subject)?;
        let instant = temporal::coerce_instant(&value, subject.span)?;

        let quantity_value = self.eval(quantity)?;
        let amount = match quantity_value {
            Value::Int(n) => n as f64,
            Value::Float(x) => x,
            other => {
                return Err(Error::type_at(
                    quantity.span,
                    format!("time quantity must be a number, got {}", other.kind_name()),
                ))
            }
        };
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::type_at(
                quantity.span,
                "time quantity must be a non-negative number",
            ));
        }

        let threshold = amount * unit.seconds() as f64;
        let elapsed = (self.now - instant).num_seconds() as f64;

        let result = match direction {
            WindowDirection::Within => elapsed.abs() <= threshold,
            WindowDirection::OlderThan => instant <= self.now && elapsed > threshold,
        };
        Ok(Value::Bool(result))
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

/// Membership test shared by `in` and `contains`.
///
/// `container_position` names the operand that must be the collection, for
/// error messages (`in` looks right, `contains` looks left).
fn containment(
    container: &Value,
    item: &Value,
    container_position: &str,
    span: Span,
) -> Result<Value> {
    match container {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|i| i.loose_eq(item)))),
        Value::Map(map) => Ok(Value::Bool(match item {
            Value::String(key) => map.contains_key(key),
            _ => false,
        })),
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(Value::Bool(haystack.contains(needle.as_str()))),
            other => Err(Error::type_at(
                span,
                format!(
                    "substring test requires a string, got {}",
                    other.kind_name()
                ),
            )),
        },
        other => Err(Error::type_at(
            span,
            format!(
                "'{}' operand must be a collection (string, list, mapping), got {}",
                container_position,
                other.kind_name()
            ),
        )),
    }
}

/// Case-insensitive anchored glob match: `*` is any run, `?` one character.
fn eval_like(subject: &Value, pattern: &Value, span: Span) -> Result<Value> {
    let (Value::String(subject), Value::String(pattern)) = (subject, pattern) else {
        return Err(Error::type_at(
            span,
            format!(
                "'like' requires string operands, got {} and {}",
                subject.kind_name(),
                pattern.kind_name()
            ),
        ));
    };

    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            c => translated.push_str(&regex::escape(&c.to_string())),
        }
    }
    translated.push('$');

    let matcher = RegexBuilder::new(&translated)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::type_at(span, format!("invalid 'like' pattern: {}", e)))?;
    Ok(Value::Bool(matcher.is_match(subject)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use serde_json::json;

    fn eval(source: &str) -> Result<Value> {
        eval_with(source, &Context::new())
    }

    fn eval_with(source: &str, context: &Context) -> Result<Value> {
        let ast = Parser::new(source).parse()?;
        Evaluator::new(context).eval(&ast)
    }

    fn eval_at(source: &str, context: &Context, now: DateTime<Utc>) -> Result<Value> {
        let ast = Parser::new(source).parse()?;
        Evaluator::with_now(context, now).eval(&ast)
    }

    fn ctx(json: serde_json::Value) -> Context {
        Context::from_json(json).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    // ---- arithmetic ----

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("2 * (3 + 4)").unwrap(), Value::Int(14));
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_true_division() {
        assert_eq!(eval("6 / 3").unwrap(), Value::Int(2));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("7.0 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("-6 / 3").unwrap(), Value::Int(-2));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(eval("1 / 0"), Err(Error::DivisionByZero { .. })));
        assert!(matches!(eval("1.5 / 0.0"), Err(Error::DivisionByZero { .. })));
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        assert_eq!(eval("1 + 2.5").unwrap(), Value::Float(3.5));
        assert_eq!(eval("2 * 1.5").unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_arithmetic_rejects_strings() {
        assert!(matches!(eval("'a' + 'b'"), Err(Error::Type { .. })));
        assert!(matches!(eval("1 - 'b'"), Err(Error::Type { .. })));
    }

    #[test]
    fn test_arithmetic_rejects_null() {
        let context = ctx(json!({}));
        assert!(matches!(
            eval_with("missing + 1", &context),
            Err(Error::Type { .. })
        ));
    }

    #[test]
    fn test_integer_overflow() {
        assert!(matches!(
            eval("9223372036854775807 + 1"),
            Err(Error::Type { .. })
        ));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(eval("-(1 + 2)").unwrap(), Value::Int(-3));
        assert!(matches!(eval("-'x'"), Err(Error::Type { .. })));
    }

    // ---- equality and ordering ----

    #[test]
    fn test_equality() {
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 != 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' == 'a'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'1' == 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("true == 1").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(eval("2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("2.5 >= 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' < 'abd'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ordering_rejects_mixed_kinds() {
        assert!(matches!(eval("1 < 'a'"), Err(Error::Type { .. })));
        assert!(matches!(eval("true < false"), Err(Error::Type { .. })));
    }

    // ---- logic ----

    #[test]
    fn test_truthiness_connectives() {
        assert_eq!(eval("1 and 'x'").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 or ''").unwrap(), Value::Bool(false));
        assert_eq!(eval("not 0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        // The right operand would raise if evaluated
        assert_eq!(eval("false and 1 / 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("true or 1 / 0").unwrap(), Value::Bool(true));
        assert!(matches!(
            eval("true and 1 / 0"),
            Err(Error::DivisionByZero { .. })
        ));
    }

    // ---- paths and null propagation ----

    #[test]
    fn test_nested_path() {
        let context = ctx(json!({"user": {"profile": {"age": 32}}, "settings": {"min_age": 18}}));
        assert_eq!(
            eval_with("user.profile.age >= settings.min_age", &context).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_indexed_path() {
        let context = ctx(json!({"teams": [{"name": "Frontend"}, {"name": "Backend"}]}));
        assert_eq!(
            eval_with("teams[0].name == 'Frontend'", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("teams[1].name == 'Frontend'", &context).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_missing_path_is_null() {
        let context = ctx(json!({"a": 1}));
        assert_eq!(
            eval_with("b.c.d == 1", &context).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_with("1 == b.c.d", &context).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval_with("not b", &context).unwrap(), Value::Bool(true));
    }

    // ---- membership ----

    #[test]
    fn test_in_list() {
        let context = ctx(json!({"user": {"roles": ["user", "admin", "editor"]}}));
        assert_eq!(
            eval_with("'admin' in user.roles", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("'superadmin' in user.roles", &context).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_in_map_checks_keys() {
        let context = ctx(json!({"limits": {"cpu": 4}}));
        assert_eq!(
            eval_with("'cpu' in limits", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("'mem' in limits", &context).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_in_string_substring() {
        assert_eq!(eval("'ell' in 'hello'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'no' in 'hello'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_contains_mirrors_in() {
        let context = ctx(json!({"roles": ["a", "b"]}));
        assert_eq!(
            eval_with("roles contains 'a'", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("'hello' contains 'ell'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_in_rejects_non_collections() {
        assert!(matches!(eval("'x' in 5"), Err(Error::Type { .. })));
        let context = ctx(json!({}));
        assert!(matches!(
            eval_with("'x' in missing", &context),
            Err(Error::Type { .. })
        ));
    }

    // ---- like ----

    #[test]
    fn test_like_glob() {
        assert_eq!(eval("'Hello.TXT' like '*.txt'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'report_2' like 'report_?'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'report_22' like 'report_?'").unwrap(), Value::Bool(false));
        assert_eq!(eval("'abc' like 'a*'").unwrap(), Value::Bool(true));
        // Anchored at both ends
        assert_eq!(eval("'xabc' like 'a*'").unwrap(), Value::Bool(false));
        // Regex metacharacters in the pattern are literal
        assert_eq!(eval("'a.c' like 'a.c'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' like 'a.c'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_like_requires_strings() {
        assert!(matches!(eval("5 like '*'"), Err(Error::Type { .. })));
    }

    // ---- emptiness ----

    #[test]
    fn test_is_empty() {
        let context = ctx(json!({
            "ghost_crew": [],
            "deserted_mansion": {},
            "treasure_chest": ["x"],
        }));
        assert_eq!(
            eval_with(
                "ghost_crew is $empty and deserted_mansion is $empty \
                 and (treasure_chest is $empty) == false",
                &context
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("'' is $empty").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 is $empty").unwrap(), Value::Bool(false));
        let context = ctx(json!({}));
        assert_eq!(
            eval_with("missing is $empty", &context).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_is_expression_is_equality() {
        let context = ctx(json!({"x": 3, "y": 3.0}));
        assert_eq!(eval_with("x is y", &context).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("x is 4", &context).unwrap(), Value::Bool(false));
    }

    // ---- dates ----

    #[test]
    fn test_is_past_future_today() {
        let now = utc("2024-06-15T12:00:00Z");
        let context = ctx(json!({
            "yesterday": "2024-06-14T12:00:00Z",
            "tomorrow": "2024-06-16T12:00:00Z",
            "this_morning": "2024-06-15 08:00:00 UTC",
        }));
        assert_eq!(
            eval_at("yesterday is $past", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("tomorrow is $future", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("this_morning is $today", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("yesterday is $today", &context, now).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_before_after() {
        let context = ctx(json!({
            "created": "2024-01-01",
            "updated": "2024-03-01T09:30:00Z",
        }));
        assert_eq!(
            eval_with("created before updated", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("updated after created", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("created after updated", &context).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_same_day_as() {
        let context = ctx(json!({
            "morning": "2024-06-15T01:00:00Z",
            "evening": "2024-06-15 23:59:59 UTC",
            "next_day": "2024-06-16",
        }));
        assert_eq!(
            eval_with("morning same_day_as evening", &context).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("morning same_day_as next_day", &context).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_unix_timestamp_coercion() {
        let now = utc("2024-06-01T12:10:00Z");
        let context = ctx(json!({"epoch": 1_717_243_800}));
        assert_eq!(
            eval_at("epoch same_day_as $now", &context, now).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_within_window() {
        let now = utc("2024-06-15T12:00:00Z");
        let context = ctx(json!({
            "recent": "2024-06-15T10:30:00Z",
            "future_soon": "2024-06-15T13:30:00Z",
            "last_month": "2024-05-01T12:00:00Z",
        }));
        assert_eq!(
            eval_at("recent within 2 hours", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("recent within 1 hours", &context, now).unwrap(),
            Value::Bool(false)
        );
        // Window is symmetric around now
        assert_eq!(
            eval_at("future_soon within 2 hours", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("last_month within 1 month", &context, now).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_at("last_month within 2 months", &context, now).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_older_than() {
        let now = utc("2024-06-15T12:00:00Z");
        let context = ctx(json!({
            "week_and_hour_ago": "2024-06-08T11:00:00Z",
            "six_days_ago": "2024-06-09T12:00:00Z",
            "upcoming": "2024-06-20T12:00:00Z",
        }));
        assert_eq!(
            eval_at("week_and_hour_ago older than 1 week", &context, now).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_at("six_days_ago older than 1 week", &context, now).unwrap(),
            Value::Bool(false)
        );
        // Future instants are never "older than"
        assert_eq!(
            eval_at("upcoming older than 0 days", &context, now).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_time_window_quantity_validation() {
        let context = ctx(json!({"stamp": "2024-06-15T12:00:00Z"}));
        assert!(matches!(
            eval_with("stamp within 'x' hours", &context),
            Err(Error::Type { .. })
        ));
        assert!(matches!(
            eval_with("stamp within -1 hours", &context),
            Err(Error::Type { .. })
        ));
    }

    #[test]
    fn test_date_parse_failure_is_type_error() {
        let context = ctx(json!({"when": "soonish"}));
        assert!(matches!(
            eval_with("when is $past", &context),
            Err(Error::Type { .. })
        ));
    }

    #[test]
    fn test_now_is_stable_within_one_call() {
        assert_eq!(eval("$now == $now").unwrap(), Value::Bool(true));
        assert_eq!(eval("$today == $today").unwrap(), Value::Bool(true));
        assert_eq!(eval("$now same_day_as $today").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_bare_value_sentinels_are_errors() {
        assert!(matches!(eval("$past == 1"), Err(Error::Type { .. })));
        assert!(matches!(eval("$empty"), Err(Error::Type { .. })));
    }

    // ---- string/date laziness ----

    #[test]
    fn test_plain_string_equality_never_parses_dates() {
        // Different spellings of the same instant stay plain strings under ==
        assert_eq!(
            eval("'2024-06-01T00:00:00Z' == '2024-06-01'").unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval("'2024-06-01' == '2024-06-01'").unwrap(),
            Value::Bool(true)
        );
    }
}
