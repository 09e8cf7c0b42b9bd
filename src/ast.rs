//! Abstract syntax tree for the expression language
//!
//! The tree mirrors the grammar: a closed set of node kinds, each carrying
//! the source span it was parsed from. Nodes are immutable once built.
//!
//! `Expr` implements `Display`, rendering canonical source text. The output
//! re-parses to a structurally identical tree (spans aside), which is what
//! the round-trip property tests rely on.

use std::fmt;

/// A half-open character range into the original source.
///
/// Spans are diagnostic metadata: node equality is structural and ignores
/// them, so a re-parsed rendering compares equal to the original tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both inputs.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// An expression node: a kind plus the span it came from.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// The closed set of expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value: number, string, boolean, or `$` sentinel
    Literal(Literal),

    /// Dotted/indexed path: `user.profile.age`, `teams[0].name`
    Path(Vec<Segment>),

    /// Backtick raw block handed verbatim to a resolver, with an optional
    /// lexical resolver-name hint (`` `jq: .users | length` ``)
    RawPath {
        text: String,
        resolver: Option<String>,
    },

    /// Binary operation: arithmetic, comparison, logic, membership, dates
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation: `not x`, `-x`
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// `subject is $past` / `subject is $empty` / `subject is other`
    /// (a non-sentinel target is equivalent to `==`)
    IsCheck {
        subject: Box<Expr>,
        target: IsTarget,
    },

    /// `subject within N unit` / `subject older than N unit`
    TimeWindow {
        subject: Box<Expr>,
        quantity: Box<Expr>,
        unit: TimeUnit,
        direction: WindowDirection,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Sentinel(Sentinel),
}

/// Reserved `$` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Past,
    Future,
    Today,
    Now,
    Empty,
}

impl Sentinel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "past" => Some(Sentinel::Past),
            "future" => Some(Sentinel::Future),
            "today" => Some(Sentinel::Today),
            "now" => Some(Sentinel::Now),
            "empty" => Some(Sentinel::Empty),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sentinel::Past => "past",
            Sentinel::Future => "future",
            Sentinel::Today => "today",
            Sentinel::Now => "now",
            Sentinel::Empty => "empty",
        }
    }
}

/// One step of a path: a mapping key or a list index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Binary operators.
///
/// `within`/`older than` are not here: their unit operand is not an
/// expression, so they surface as [`ExprKind::TimeWindow`] nodes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logic
    And,
    Or,

    // Membership / pattern
    In,
    Contains,
    Like,

    // Dates
    Before,
    After,
    SameDayAs,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::Contains => "contains",
            BinaryOp::Like => "like",
            BinaryOp::Before => "before",
            BinaryOp::After => "after",
            BinaryOp::SameDayAs => "same_day_as",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Target of an `is` check
#[derive(Debug, Clone, PartialEq)]
pub enum IsTarget {
    Past,
    Future,
    Today,
    Empty,
    Expr(Box<Expr>),
}

/// Direction of a time-window check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDirection {
    Within,
    OlderThan,
}

/// Time units with their fixed second equivalences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Accepts singular and plural spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "minute" | "minutes" => Some(TimeUnit::Minute),
            "hour" | "hours" => Some(TimeUnit::Hour),
            "day" | "days" => Some(TimeUnit::Day),
            "week" | "weeks" => Some(TimeUnit::Week),
            "month" | "months" => Some(TimeUnit::Month),
            "year" | "years" => Some(TimeUnit::Year),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeUnit::Minute => "minutes",
            TimeUnit::Hour => "hours",
            TimeUnit::Day => "days",
            TimeUnit::Week => "weeks",
            TimeUnit::Month => "months",
            TimeUnit::Year => "years",
        }
    }

    /// Fixed unit length in seconds (months are 30 days, years 365 days).
    pub fn seconds(&self) -> i64 {
        match self {
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3600,
            TimeUnit::Day => 86_400,
            TimeUnit::Week => 7 * 86_400,
            TimeUnit::Month => 30 * 86_400,
            TimeUnit::Year => 365 * 86_400,
        }
    }
}

// ============================================
// Canonical rendering
// ============================================

// Precedence bands used when re-rendering: parentheses are emitted whenever a
// child would otherwise bind looser than its position allows.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_NEG: u8 = 7;
const PREC_PRIMARY: u8 = 8;

fn precedence(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Literal(_) | ExprKind::Path(_) | ExprKind::RawPath { .. } => PREC_PRIMARY,
        ExprKind::Unary { op: UnaryOp::Neg, .. } => PREC_NEG,
        ExprKind::Unary { op: UnaryOp::Not, .. } => PREC_NOT,
        ExprKind::IsCheck { .. } | ExprKind::TimeWindow { .. } => PREC_CMP,
        ExprKind::Binary { op, .. } => match op {
            BinaryOp::Or => PREC_OR,
            BinaryOp::And => PREC_AND,
            BinaryOp::Mul | BinaryOp::Div => PREC_MUL,
            BinaryOp::Add | BinaryOp::Sub => PREC_ADD,
            _ => PREC_CMP,
        },
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    let prec = precedence(&expr.kind);
    if prec < min_prec {
        write!(f, "(")?;
        write_expr(f, expr, 0)?;
        return write!(f, ")");
    }

    match &expr.kind {
        ExprKind::Literal(literal) => write_literal(f, literal),
        ExprKind::Path(segments) => write_path(f, segments),
        ExprKind::RawPath { text, resolver } => match resolver {
            Some(name) => write!(f, "`{}: {}`", name, text),
            None => write!(f, "`{}`", text),
        },
        ExprKind::Unary { op: UnaryOp::Not, expr } => {
            write!(f, "not ")?;
            write_expr(f, expr, PREC_NOT)
        }
        ExprKind::Unary { op: UnaryOp::Neg, expr } => {
            write!(f, "-")?;
            write_expr(f, expr, PREC_NEG)
        }
        ExprKind::Binary { left, op, right } => {
            let (left_min, right_min) = match precedence(&expr.kind) {
                // Comparisons do not chain: both sides must bind tighter.
                PREC_CMP => (PREC_ADD, PREC_ADD),
                // Left-associative otherwise.
                p => (p, p + 1),
            };
            write_expr(f, left, left_min)?;
            write!(f, " {} ", op.symbol())?;
            write_expr(f, right, right_min)
        }
        ExprKind::IsCheck { subject, target } => {
            write_expr(f, subject, PREC_ADD)?;
            write!(f, " is ")?;
            match target {
                IsTarget::Past => write!(f, "$past"),
                IsTarget::Future => write!(f, "$future"),
                IsTarget::Today => write!(f, "$today"),
                IsTarget::Empty => write!(f, "$empty"),
                IsTarget::Expr(target) => write_expr(f, target, PREC_ADD),
            }
        }
        ExprKind::TimeWindow {
            subject,
            quantity,
            unit,
            direction,
        } => {
            write_expr(f, subject, PREC_ADD)?;
            match direction {
                WindowDirection::Within => write!(f, " within ")?,
                WindowDirection::OlderThan => write!(f, " older than ")?,
            }
            write_expr(f, quantity, PREC_ADD)?;
            write!(f, " {}", unit.name())
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, literal: &Literal) -> fmt::Result {
    match literal {
        Literal::Int(n) => write!(f, "{}", n),
        // Always keep a decimal point so the rendering re-parses as a float.
        Literal::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
        Literal::Float(x) => write!(f, "{}", x),
        Literal::Bool(b) => write!(f, "{}", b),
        Literal::Sentinel(s) => write!(f, "${}", s.name()),
        Literal::String(s) => {
            write!(f, "'")?;
            for c in s.chars() {
                match c {
                    '\\' => write!(f, "\\\\")?,
                    '\'' => write!(f, "\\'")?,
                    '\n' => write!(f, "\\n")?,
                    '\r' => write!(f, "\\r")?,
                    '\t' => write!(f, "\\t")?,
                    _ => write!(f, "{}", c)?,
                }
            }
            write!(f, "'")
        }
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, segments: &[Segment]) -> fmt::Result {
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Key(key) => {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{}", key)?;
            }
            Segment::Index(index) => write!(f, "[{}]", index)?,
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}
