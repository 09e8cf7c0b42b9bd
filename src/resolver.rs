//! Path resolvers and the process-wide resolver registry
//!
//! A resolver turns a path (as a segment list) or a raw backtick
//! sub-expression into a value within a context. The evaluator always speaks
//! in segment lists; translating them into resolver-native syntax is each
//! resolver's own business.
//!
//! The registry maps names to resolver instances and tracks the current
//! default. It self-initializes by probing the built-ins in priority order
//! (jq, jsonpath, basic); the first that probes successfully becomes the
//! default, and every built-in is registered regardless so expressions can
//! select one by name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::ast::{Segment, Span};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;

/// Trait for path-to-value resolution within a context.
///
/// Implementations must be stateless with respect to individual calls:
/// one resolver instance serves concurrent evaluations.
pub trait Resolver: Send + Sync {
    /// Registry name used when `register_resolver` is not given one
    fn name(&self) -> &str;

    /// Whether [`Resolver::resolve_raw`] is supported
    fn supports_raw(&self) -> bool {
        false
    }

    /// Resolve a segment list to a value; `Ok(None)` when the path is absent
    fn resolve(&self, segments: &[Segment], context: &Context) -> Result<Option<Value>>;

    /// Execute a verbatim raw sub-expression.
    ///
    /// The default implementation reports the missing capability.
    fn resolve_raw(&self, raw: &str, context: &Context) -> Result<Option<Value>> {
        let _ = (raw, context);
        Err(Error::Resolver {
            message: format!("resolver '{}' does not support raw queries", self.name()),
            span: Span::default(),
        })
    }
}

// ============================================
// Registry
// ============================================

struct Registry {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
    default_name: String,
}

impl Registry {
    fn bootstrap() -> Self {
        let mut resolvers: HashMap<String, Arc<dyn Resolver>> = HashMap::new();
        let mut default_name: Option<&str> = None;

        #[cfg(feature = "jq")]
        {
            let jq = JqResolver::new();
            if jq.probe() {
                default_name.get_or_insert("jq");
            } else {
                tracing::warn!("jq resolver failed its startup probe; it will not be the default");
            }
            resolvers.insert("jq".to_string(), Arc::new(jq));
        }

        resolvers.insert("jsonpath".to_string(), Arc::new(JsonPathResolver::new()));
        default_name.get_or_insert("jsonpath");

        resolvers.insert("basic".to_string(), Arc::new(BasicResolver::new()));
        let default_name = default_name.unwrap_or("basic").to_string();

        debug!(default = %default_name, "resolver registry initialized");
        Self {
            resolvers,
            default_name,
        }
    }
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::bootstrap()));

/// Register a resolver under `name` (or its own name), optionally making it
/// the default for paths and hintless raw blocks.
///
/// Replaces any resolver previously registered under the same name. Intended
/// for process initialization, but safe at any time: the registration and
/// the default switch become visible to other threads atomically.
pub fn register_resolver(resolver: Arc<dyn Resolver>, default: bool, name: Option<&str>) {
    let name = name.unwrap_or_else(|| resolver.name()).to_string();
    let mut registry = REGISTRY.write().unwrap();
    debug!(name = %name, default, "registering resolver");
    registry.resolvers.insert(name.clone(), resolver);
    if default {
        registry.default_name = name;
    }
}

/// The current default resolver
pub(crate) fn default_resolver() -> Arc<dyn Resolver> {
    let registry = REGISTRY.read().unwrap();
    registry.resolvers[&registry.default_name].clone()
}

/// Look up a resolver by registry name
pub(crate) fn resolver_by_name(name: &str) -> Option<Arc<dyn Resolver>> {
    REGISTRY.read().unwrap().resolvers.get(name).cloned()
}

/// Name of the current default resolver
pub fn default_resolver_name() -> String {
    REGISTRY.read().unwrap().default_name.clone()
}

/// Names of all registered resolvers, sorted
pub fn resolver_names() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().unwrap().resolvers.keys().cloned().collect();
    names.sort();
    names
}

// ============================================
// BasicResolver
// ============================================

/// Structural walk over the context: mapping keys and list indices only.
/// No raw-query support.
#[derive(Debug, Default)]
pub struct BasicResolver;

impl BasicResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for BasicResolver {
    fn name(&self) -> &str {
        "basic"
    }

    fn resolve(&self, segments: &[Segment], context: &Context) -> Result<Option<Value>> {
        let mut current = match segments.first() {
            Some(Segment::Key(head)) => match context.get(head) {
                Some(value) => value,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        for segment in &segments[1..] {
            current = match (segment, current) {
                (Segment::Key(key), Value::Map(map)) => match map.get(key) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                (Segment::Index(index), Value::List(items)) => match items.get(*index) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        Ok(Some(current.clone()))
    }
}

// ============================================
// JsonPathResolver
// ============================================

/// Resolves paths by translating segments into a JSONPath query and raw
/// blocks by executing them as JSONPath programs. Portable everywhere.
#[derive(Debug, Default)]
pub struct JsonPathResolver;

impl JsonPathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Bracket notation keeps arbitrary key names unambiguous.
    fn segments_to_query(segments: &[Segment]) -> String {
        let mut query = String::from("$");
        for segment in segments {
            match segment {
                Segment::Key(key) => {
                    let escaped = key.replace('\\', "\\\\").replace('\'', "\\'");
                    query.push_str(&format!("['{}']", escaped));
                }
                Segment::Index(index) => query.push_str(&format!("[{}]", index)),
            }
        }
        query
    }

    fn run(&self, query: &str, context: &Context) -> Result<Option<Value>> {
        let path = serde_json_path::JsonPath::parse(query).map_err(|e| Error::Resolver {
            message: format!("invalid JSONPath query '{}': {}", query, e),
            span: Span::default(),
        })?;
        let document = context.to_json();
        let mut matches: Vec<Value> = path
            .query(&document)
            .all()
            .into_iter()
            .map(|node| Value::from_json(node.clone()))
            .collect();
        Ok(match matches.len() {
            0 => None,
            1 => Some(matches.remove(0)),
            _ => Some(Value::List(matches)),
        })
    }
}

impl Resolver for JsonPathResolver {
    fn name(&self) -> &str {
        "jsonpath"
    }

    fn supports_raw(&self) -> bool {
        true
    }

    fn resolve(&self, segments: &[Segment], context: &Context) -> Result<Option<Value>> {
        self.run(&Self::segments_to_query(segments), context)
    }

    fn resolve_raw(&self, raw: &str, context: &Context) -> Result<Option<Value>> {
        self.run(raw, context)
    }
}

// ============================================
// JqResolver
// ============================================

/// Resolves paths by translating segments into a jq path program and raw
/// blocks by executing them as full jq programs via `jaq`.
#[cfg(feature = "jq")]
#[derive(Debug, Default)]
pub struct JqResolver;

#[cfg(feature = "jq")]
impl JqResolver {
    pub fn new() -> Self {
        Self
    }

    /// Startup capability probe: compile and run the identity filter.
    pub(crate) fn probe(&self) -> bool {
        self.run(".", &Context::new()).is_ok()
    }

    fn segments_to_program(segments: &[Segment]) -> String {
        let mut program = String::new();
        for segment in segments {
            match segment {
                Segment::Key(key) => {
                    let ident_like = !key.is_empty()
                        && key
                            .chars()
                            .next()
                            .map(|c| c.is_ascii_alphabetic() || c == '_')
                            .unwrap_or(false)
                        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if ident_like {
                        program.push('.');
                        program.push_str(key);
                    } else {
                        program.push('.');
                        // serde_json string syntax doubles as jq string syntax
                        program.push_str(&serde_json::to_string(key).unwrap_or_default());
                    }
                }
                Segment::Index(index) => {
                    if program.is_empty() {
                        program.push('.');
                    }
                    program.push_str(&format!("[{}]", index));
                }
            }
        }
        if program.is_empty() {
            program.push('.');
        }
        program
    }

    fn run(&self, program: &str, context: &Context) -> Result<Option<Value>> {
        use jaq_interpret::FilterT;

        let mut defs = jaq_interpret::ParseCtx::new(Vec::new());
        defs.insert_natives(jaq_core::core());
        defs.insert_defs(jaq_std::std());

        let (parsed, parse_errs) = jaq_parse::parse(program, jaq_parse::main());
        let Some(parsed) = parsed.filter(|_| parse_errs.is_empty()) else {
            return Err(Error::Resolver {
                message: format!("invalid jq program: '{}'", program),
                span: Span::default(),
            });
        };

        let filter = defs.compile(parsed);
        if !defs.errs.is_empty() {
            return Err(Error::Resolver {
                message: format!("jq program failed to compile: '{}'", program),
                span: Span::default(),
            });
        }

        let inputs = jaq_interpret::RcIter::new(core::iter::empty());
        let input = jaq_interpret::Val::from(context.to_json());
        let mut outputs: Vec<Value> = Vec::new();
        for output in filter.run((jaq_interpret::Ctx::new([], &inputs), input)) {
            let val = output.map_err(|e| Error::Resolver {
                message: format!("jq program '{}' failed: {}", program, e),
                span: Span::default(),
            })?;
            outputs.push(Value::from_json(serde_json::Value::from(val)));
        }

        Ok(match outputs.len() {
            0 => None,
            1 => Some(outputs.remove(0)),
            _ => Some(Value::List(outputs)),
        })
    }
}

#[cfg(feature = "jq")]
impl Resolver for JqResolver {
    fn name(&self) -> &str {
        "jq"
    }

    fn supports_raw(&self) -> bool {
        true
    }

    fn resolve(&self, segments: &[Segment], context: &Context) -> Result<Option<Value>> {
        // `?` downgrades mid-path type mismatches (e.g. indexing a scalar)
        // to an empty stream: absent paths must yield null, not an error.
        let program = format!("({})?", Self::segments_to_program(segments));
        self.run(&program, context)
    }

    fn resolve_raw(&self, raw: &str, context: &Context) -> Result<Option<Value>> {
        self.run(raw, context)
    }
}
