//! Statement AST.
//!
//! One value of [`Statement`] is built per call and discarded once the
//! client-call plan has been emitted.

use serde::Serialize;
use std::fmt;

/// Kind of a statement, decided by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    /// Anything else (DDL, PRAGMA, ...). Executed as a no-op.
    Unsupported,
}

impl StatementKind {
    /// True for INSERT, UPDATE and DELETE.
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Insert => write!(f, "INSERT"),
            StatementKind::Update => write!(f, "UPDATE"),
            StatementKind::Delete => write!(f, "DELETE"),
            StatementKind::Select => write!(f, "SELECT"),
            StatementKind::Unsupported => write!(f, "UNSUPPORTED"),
        }
    }
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Select(SelectStatement),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
            Statement::Delete(_) => StatementKind::Delete,
            Statement::Select(_) => StatementKind::Select,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
            Statement::Select(s) => &s.table,
        }
    }

    /// Number of `?` markers across every clause.
    pub fn placeholder_count(&self) -> usize {
        fn in_predicates(predicates: &[Predicate]) -> usize {
            predicates.iter().map(Predicate::placeholder_count).sum()
        }

        match self {
            Statement::Insert(s) => s.values.iter().filter(|o| o.is_placeholder()).count(),
            Statement::Update(s) => {
                s.assignments
                    .iter()
                    .filter(|a| a.value.is_placeholder())
                    .count()
                    + in_predicates(&s.predicates)
            }
            Statement::Delete(s) => in_predicates(&s.predicates),
            Statement::Select(s) => in_predicates(&s.predicates),
        }
    }
}

/// `INSERT INTO table (c1, c2) VALUES (?, ?)`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    /// One slot per column, same order.
    pub values: Vec<Operand>,
}

/// `UPDATE table SET c1 = ? WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    /// Never empty.
    pub predicates: Vec<Predicate>,
}

/// `DELETE FROM table WHERE ...`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    /// Never empty.
    pub predicates: Vec<Predicate>,
}

/// `SELECT cols FROM table [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET n]`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    pub columns: Columns,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Projection of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Columns {
    Star,
    Named(Vec<String>),
}

impl Columns {
    /// Projection as the client expects it (`*` or `a,b,c`).
    pub fn to_projection(&self) -> String {
        match self {
            Columns::Star => "*".to_string(),
            Columns::Named(names) => names.join(","),
        }
    }
}

/// `column = slot` inside a SET list.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Operand,
}

/// Right-hand side of an assignment, value slot or predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A `?` marker, bound positionally.
    Placeholder,
    /// An inline literal. Consumes no parameter.
    Literal(Value),
}

impl Operand {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Operand::Placeholder)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Placeholder => write!(f, "?"),
            Operand::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Operand::Literal(v) => write!(f, "{}", v),
        }
    }
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Eq,
    Like,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "="),
            Operator::Like => write!(f, "LIKE"),
            Operator::Gt => write!(f, ">"),
            Operator::Gte => write!(f, ">="),
            Operator::Lt => write!(f, "<"),
            Operator::Lte => write!(f, "<="),
            Operator::In => write!(f, "IN"),
        }
    }
}

/// One ANDed condition of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Unqualified column name.
    pub column: String,
    pub operator: Operator,
    /// Exactly one operand, except for `In` which has one per list entry.
    pub operands: Vec<Operand>,
}

impl Predicate {
    pub fn placeholder_count(&self) -> usize {
        self.operands.iter().filter(|o| o.is_placeholder()).count()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::In => {
                let list: Vec<String> = self.operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{} IN ({})", self.column, list.join(", "))
            }
            op => match self.operands.first() {
                Some(operand) => write!(f, "{} {} {}", self.column, op, operand),
                None => write!(f, "{} {}", self.column, op),
            },
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// `ORDER BY column [ASC|DESC]`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// A bound parameter or inline literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Structured JSON (arrays, objects) stored as-is.
    Json(serde_json::Value),
}

impl Value {
    /// Convert to a JSON value for request bodies.
    ///
    /// NaN and infinite floats become `null`; the binder rejects them
    /// before a request body is built.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Json(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::Json(serde_json::Value::Null))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            other => Value::Json(other),
        }
    }
}

/// Build a parameter list from heterogeneous values.
///
/// ```
/// use sqlrest::params;
/// let p = params![5, "agent", None::<i64>];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::ast::Value>::new() };
    ($($v:expr),+ $(,)?) => { vec![$($crate::ast::Value::from($v)),+] };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from(serde_json::json!(7)), Value::Int(7));
        assert_eq!(Value::from(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(serde_json::json!("x")), Value::String("x".into()));
        assert_eq!(
            Value::from(serde_json::json!({"a": 1})),
            Value::Json(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn test_value_serializes_untagged() {
        let row = vec![Value::Int(1), Value::Null, Value::String("a".into())];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[1,null,"a"]"#);
    }

    #[test]
    fn test_option_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }

    #[test]
    fn test_placeholder_count_spans_clauses() {
        let stmt = Statement::Update(UpdateStatement {
            table: "calls".into(),
            assignments: vec![
                Assignment {
                    column: "status".into(),
                    value: Operand::Placeholder,
                },
                Assignment {
                    column: "reviewed".into(),
                    value: Operand::Literal(Value::Bool(true)),
                },
            ],
            predicates: vec![Predicate {
                column: "id".into(),
                operator: Operator::In,
                operands: vec![Operand::Placeholder, Operand::Placeholder],
            }],
        });
        assert_eq!(stmt.placeholder_count(), 3);
        assert_eq!(stmt.kind(), StatementKind::Update);
        assert_eq!(stmt.table(), "calls");
    }

    #[test]
    fn test_predicate_display() {
        let p = Predicate {
            column: "id".into(),
            operator: Operator::In,
            operands: vec![Operand::Placeholder, Operand::Literal(Value::Int(4))],
        };
        assert_eq!(p.to_string(), "id IN (?, 4)");
    }
}
