//! Tagged-variant AST for the rules DSL: a small parser produces this AST,
//! and a tree-walking interpreter evaluates it directly rather than
//! embedding a full script engine.

use std::fmt;

/// HTTP method a rule bucket is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        };
        write!(f, "{s}")
    }
}

/// Rule direction: inbound (before the handler) or outbound (after, GET only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

/// A literal value in the safe expression subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
}

/// Binary operators supported by the safe expression subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

/// An expression in the safe JS-like subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Identifier path, e.g. `req.body.price` -> `["req", "body", "price"]`.
    Path(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// Call to a whitelisted action-registry function: `NOW()`, `UUID()`, or
    /// a user-registered action.
    Call(String, Vec<Expr>),
    /// Object literal, e.g. `{type: 'fulfill', orderId: req.body.order_id}`
    /// — used by `TRIGGER`.
    Object(Vec<(String, Expr)>),
    /// A string literal containing one or more `${expr}` interpolations,
    /// used by outbound per-row field assignment.
    Interpolated(Vec<InterpPart>),
}

/// One piece of an interpolated string: either literal text or an embedded
/// expression to splice in.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Text(String),
    Expr(Expr),
}

/// A single action. Actions execute sequentially inside a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `<field> = <expr>` — virtual column / field assignment on the
    /// request or response record.
    Assign { target: Vec<String>, value: Expr },
    /// `INSERT INTO <table> VALUES (<exprList>)`.
    InsertInto { table: String, values: Vec<Expr> },
    /// `UPDATE <table> SET <field> = <expr> WHERE <expr>`.
    Update { table: String, assignments: Vec<(String, Expr)>, condition: Expr },
    /// `TRIGGER <objectLiteral>` — always enqueued on the event logger.
    Trigger { object: Expr },
    /// A bare named-action invocation, e.g. `sendWelcomeEmail(req.body.email)`.
    Call { name: String, args: Vec<Expr> },
}

/// One compiled rule: a `(method, resource, direction)` bucket membership,
/// a guarding condition, and the action(s) to run when it is true.
///
/// `IF cond THEN action [ELSE action]` compiles to one `Rule` with
/// `condition = cond`. Bare top-level statements (assignment, `INSERT`,
/// `UPDATE`, `TRIGGER`, action call) compile to a `Rule` with
/// `condition = Literal(Bool(true))` so they always run; a preceding
/// `WHEN <cond>` ANDs itself onto that condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub event: Method,
    pub resource: String,
    pub direction: Direction,
    pub condition: Expr,
    pub action: Action,
    pub else_action: Option<Action>,
    /// Whether DB-mutating actions in this rule run synchronously or are
    /// enqueued via the event logger. Default: inbound DB-mutating actions
    /// are async; explicit `SYNC`/`ASYNC` markers can override.
    pub r#async: bool,
    /// Source line, for diagnostics.
    pub line: usize,
}

/// A fully parsed, immutable set of compiled rules, grouped by declaration
/// order within each `(method, resource, direction)` bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Rules matching `(method, resource, direction)`, in declaration order.
    pub fn bucket(&self, method: Method, resource: &str, direction: Direction) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.event == method && r.resource == resource && r.direction == direction)
            .collect()
    }
}
