//! Statement to client-call translation.
//!
//! Converts a parsed [`Statement`] plus its positional parameters into the
//! ordered [`Call`] chain a filtered-query client executes. Translation is
//! a pure function of `(text, params)`.

use crate::ast::*;
use crate::binder::Binder;
use crate::client::{Call, Row};
use crate::error::{SqlRestError, SqlRestResult};
use crate::parser::{classify, parse};

/// Page size used to bound an OFFSET that has no LIMIT.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Column the client echoes back after an insert.
pub const ID_COLUMN: &str = "id";

/// A translated statement, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind: StatementKind,
    /// Empty for [`StatementKind::Unsupported`].
    pub calls: Vec<Call>,
}

impl Plan {
    /// A plan that sends nothing.
    pub fn noop() -> Self {
        Self {
            kind: StatementKind::Unsupported,
            calls: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Translator with a configurable default page size.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    page_size: u64,
}

impl Default for Translator {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Translator {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Classify, parse and translate statement text.
    ///
    /// Unrecognised statement kinds yield [`Plan::noop`].
    pub fn translate(&self, text: &str, params: &[Value]) -> SqlRestResult<Plan> {
        if classify(text) == StatementKind::Unsupported {
            return Ok(Plan::noop());
        }
        let statement = parse(text)?;
        self.plan(&statement, params)
    }

    /// Translate an already parsed statement.
    pub fn plan(&self, statement: &Statement, params: &[Value]) -> SqlRestResult<Plan> {
        let mut binder = Binder::for_statement(statement, params)?;
        let mut calls = vec![Call::From(statement.table().to_string())];

        match statement {
            Statement::Insert(insert) => {
                let mut row = Row::new();
                for (column, slot) in insert.columns.iter().zip(&insert.values) {
                    row.insert(column.clone(), binder.bind(slot)?.to_json());
                }
                calls.push(Call::Insert(row));
                calls.push(Call::Select(ID_COLUMN.to_string()));
            }
            Statement::Update(update) => {
                let mut row = Row::new();
                for assignment in &update.assignments {
                    row.insert(
                        assignment.column.clone(),
                        binder.bind(&assignment.value)?.to_json(),
                    );
                }
                calls.push(Call::Update(row));
                self.filters(&update.predicates, &mut binder, &mut calls)?;
            }
            Statement::Delete(delete) => {
                calls.push(Call::Delete);
                self.filters(&delete.predicates, &mut binder, &mut calls)?;
            }
            Statement::Select(select) => {
                calls.push(Call::Select(select.columns.to_projection()));
                self.filters(&select.predicates, &mut binder, &mut calls)?;
                self.modifiers(select, &mut calls);
            }
        }

        let plan = Plan {
            kind: statement.kind(),
            calls,
        };
        tracing::debug!(kind = %plan.kind, calls = plan.calls.len(), "statement translated");
        Ok(plan)
    }

    fn filters(
        &self,
        predicates: &[Predicate],
        binder: &mut Binder<'_>,
        calls: &mut Vec<Call>,
    ) -> SqlRestResult<()> {
        for predicate in predicates {
            calls.push(filter(predicate, binder)?);
        }
        Ok(())
    }

    /// ORDER BY, then LIMIT / OFFSET.
    fn modifiers(&self, select: &SelectStatement, calls: &mut Vec<Call>) {
        if let Some(order) = &select.order_by {
            calls.push(Call::Order {
                column: order.column.clone(),
                ascending: order.direction == Direction::Asc,
            });
        }

        match (select.limit, select.offset) {
            (Some(0), _) => calls.push(Call::Limit(0)),
            (Some(limit), None) => calls.push(Call::Limit(limit)),
            (Some(limit), Some(offset)) => calls.push(Call::Range {
                from: offset,
                to: offset.saturating_add(limit - 1),
            }),
            (None, Some(offset)) => calls.push(Call::Range {
                from: offset,
                to: offset.saturating_add(self.page_size - 1),
            }),
            (None, None) => {}
        }
    }
}

/// Translate using the default page size.
pub fn translate(text: &str, params: &[Value]) -> SqlRestResult<Plan> {
    Translator::default().translate(text, params)
}

fn filter(predicate: &Predicate, binder: &mut Binder<'_>) -> SqlRestResult<Call> {
    let column = predicate.column.clone();

    if predicate.operator == Operator::In {
        return Ok(Call::In(column, binder.bind_all(&predicate.operands)?));
    }

    let operand = predicate
        .operands
        .first()
        .ok_or_else(|| SqlRestError::UnsupportedPredicate(predicate.to_string()))?;
    let value = binder.bind(operand)?;

    Ok(match predicate.operator {
        Operator::Eq => Call::Eq(column, value),
        Operator::Like => Call::ILike(column, like_pattern(predicate, &value)?),
        Operator::Gt => Call::Gt(column, value),
        Operator::Gte => Call::Gte(column, value),
        Operator::Lt => Call::Lt(column, value),
        Operator::Lte => Call::Lte(column, value),
        Operator::In => Call::In(column, vec![value]),
    })
}

/// SQL `%` wildcards become the client's `*`.
///
/// Only text and numbers are patterns. `LIKE NULL` matches nothing in SQL,
/// which no `ilike` filter can express.
fn like_pattern(predicate: &Predicate, value: &Value) -> SqlRestResult<String> {
    match value {
        Value::String(s) => Ok(s.replace('%', "*")),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(n) => Ok(n.to_string()),
        Value::Null | Value::Bool(_) | Value::Json(_) => Err(SqlRestError::UnsupportedPredicate(
            format!("{} (LIKE needs a text pattern, got {})", predicate, value.to_json()),
        )),
    }
}
