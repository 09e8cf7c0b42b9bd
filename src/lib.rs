//! Dilemma - a safe, embeddable expression evaluator
//!
//! Dilemma parses a compact expression language into an AST and evaluates it
//! against a caller-supplied variable context. It is a safer alternative to
//! host-language eval: no user-defined functions, no assignment, no loops,
//! no side effects.
//!
//! ```text
//! source text
//!      |
//!   Parser -> AST  (cached per thread by source)
//!      |
//! Evaluator(AST, context, resolver) -> value | error
//! ```
//!
//! # Example
//!
//! ```
//! use dilemma::{evaluate, Context, Value};
//! use serde_json::json;
//!
//! let ctx = Context::from_json(json!({
//!     "user": {"roles": ["user", "admin"]},
//! })).unwrap();
//!
//! assert_eq!(evaluate("2 * (3 + 4)", &ctx).unwrap(), Value::Int(14));
//! assert_eq!(
//!     evaluate("'admin' in user.roles", &ctx).unwrap(),
//!     Value::Bool(true)
//! );
//! ```
//!
//! Paths resolve through a pluggable resolver registry (jq, JSONPath, or a
//! basic structural walk); backtick raw blocks hand a verbatim query to the
//! resolver: `` `jq: .users | length` > 2 ``.

pub mod ast;
pub mod compiled;
pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod resolver;
mod temporal;
pub mod token;
pub mod value;

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::ast::Expr;
use crate::eval::Evaluator;
use crate::parser::Parser;

// Re-export main types
pub use compiled::CompiledExpression;
pub use context::Context;
pub use error::{Error, Result};
#[cfg(feature = "jq")]
pub use resolver::JqResolver;
pub use resolver::{register_resolver, BasicResolver, JsonPathResolver, Resolver};
pub use value::Value;

/// Entries kept in each thread's source -> AST cache
const PARSE_CACHE_CAPACITY: usize = 16;

thread_local! {
    // A parser instance is cheap but parsing is not free; repeated one-shot
    // evaluation of the same source string is the common embedding pattern.
    // Per-thread because the parser contract is per-thread.
    static PARSE_CACHE: RefCell<LruCache<String, Arc<Expr>>> =
        RefCell::new(LruCache::new(NonZeroUsize::new(PARSE_CACHE_CAPACITY).unwrap()));
}

fn parse_cached(source: &str) -> Result<Arc<Expr>> {
    PARSE_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(ast) = cache.get(source) {
            return Ok(ast.clone());
        }
        let ast = Arc::new(Parser::new(source).parse()?);
        cache.put(source.to_string(), ast.clone());
        Ok(ast)
    })
}

/// Parse and evaluate `source` against `context` in one call.
///
/// Raises on parse or evaluation errors; missing paths evaluate to null
/// rather than raising. `$now`/`$today` are sampled once at entry.
pub fn evaluate(source: &str, context: &Context) -> Result<Value> {
    let ast = parse_cached(source)?;
    Evaluator::new(context).eval(&ast)
}

/// Parse `source` once into a reusable [`CompiledExpression`].
pub fn compile(source: &str) -> Result<CompiledExpression> {
    let ast = parse_cached(source)?;
    Ok(CompiledExpression::new(source, ast))
}
