//! Statement parser.
//!
//! Recursive descent over the token stream produced by [`crate::lexer`].
//!
//! # Accepted grammar
//!
//! ```text
//! INSERT INTO t (c1, c2, ...) VALUES (v1, v2, ...)
//! UPDATE t SET c1 = v1, c2 = v2 WHERE pred (AND pred)*
//! DELETE FROM t WHERE pred (AND pred)*
//! SELECT * | c1, c2 FROM t [WHERE pred (AND pred)*]
//!        [ORDER BY c [ASC|DESC]] [LIMIT n] [OFFSET n]
//!
//! pred := col (= | LIKE | > | >= | < | <=) v | col IN (v, ...)
//! v    := ? | 'text' | number | NULL | TRUE | FALSE
//! ```
//!
//! Columns may carry a table qualifier (`calls.id`); it is dropped.
//! ORDER BY, LIMIT and OFFSET may appear in any order after WHERE.

use crate::ast::*;
use crate::error::{SqlRestError, SqlRestResult};
use crate::lexer::{tokenize, Spanned, Token};

/// Classify a statement by its leading keyword.
pub fn classify(input: &str) -> StatementKind {
    let keyword = input
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();

    if keyword.eq_ignore_ascii_case("INSERT") {
        StatementKind::Insert
    } else if keyword.eq_ignore_ascii_case("UPDATE") {
        StatementKind::Update
    } else if keyword.eq_ignore_ascii_case("DELETE") {
        StatementKind::Delete
    } else if keyword.eq_ignore_ascii_case("SELECT") {
        StatementKind::Select
    } else {
        StatementKind::Unsupported
    }
}

/// Parse statement text into a [`Statement`].
///
/// Statements whose kind is [`StatementKind::Unsupported`] are rejected
/// here; callers that want to skip them should [`classify`] first.
pub fn parse(input: &str) -> SqlRestResult<Statement> {
    let kind = classify(input);
    if kind == StatementKind::Unsupported {
        return Err(unrecognised(input));
    }

    let mut parser = Parser::new(input, tokenize(input)?);
    let statement = match kind {
        StatementKind::Insert => Statement::Insert(parser.insert()?),
        StatementKind::Update => Statement::Update(parser.update()?),
        StatementKind::Delete => Statement::Delete(parser.delete()?),
        StatementKind::Select => Statement::Select(parser.select()?),
        StatementKind::Unsupported => return Err(unrecognised(input)),
    };
    parser.expect_end()?;

    Ok(statement)
}

fn unrecognised(input: &str) -> SqlRestError {
    SqlRestError::unsupported(format!("unrecognised statement '{}'", preview(input)))
}

fn preview(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(40) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Keywords that end a WHERE clause.
const CLAUSE_BOUNDARIES: [&str; 4] = ["ORDER", "LIMIT", "OFFSET", "GROUP"];

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, mut tokens: Vec<Spanned>) -> Self {
        if tokens.last().map(|t| &t.token) == Some(&Token::Semicolon) {
            tokens.pop();
        }
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    fn insert(&mut self) -> SqlRestResult<InsertStatement> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.table_name()?;

        if !self.eat(&Token::LParen) {
            return Err(SqlRestError::invalid_insert(
                "expected a parenthesized column list before VALUES",
            ));
        }
        let mut columns = Vec::new();
        loop {
            let column = self
                .column_ref()
                .ok_or_else(|| SqlRestError::invalid_insert("expected a column name"))?;
            if columns.contains(&column) {
                return Err(SqlRestError::invalid_insert(format!(
                    "column '{}' listed twice",
                    column
                )));
            }
            columns.push(column);
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::RParen) {
                break;
            }
            return Err(SqlRestError::invalid_insert("unterminated column list"));
        }

        if !self.eat_keyword("VALUES") {
            return Err(SqlRestError::invalid_insert(
                "expected VALUES after the column list",
            ));
        }
        if !self.eat(&Token::LParen) {
            return Err(SqlRestError::invalid_insert("expected '(' after VALUES"));
        }
        let mut values = Vec::new();
        loop {
            let operand = self
                .operand()
                .ok_or_else(|| SqlRestError::invalid_insert("expected '?' or a literal value"))?;
            values.push(operand);
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::RParen) {
                break;
            }
            return Err(SqlRestError::invalid_insert("unterminated VALUES list"));
        }
        if self.peek() == Some(&Token::Comma) {
            return Err(SqlRestError::invalid_insert(
                "multi-row VALUES is not supported",
            ));
        }

        if columns.len() != values.len() {
            return Err(SqlRestError::invalid_insert(format!(
                "{} column(s) but {} value(s)",
                columns.len(),
                values.len()
            )));
        }

        Ok(InsertStatement {
            table,
            columns,
            values,
        })
    }

    fn update(&mut self) -> SqlRestResult<UpdateStatement> {
        self.expect_keyword("UPDATE")?;
        let table = self.table_name()?;

        if !self.eat_keyword("SET") {
            return Err(SqlRestError::unsupported("UPDATE without a SET clause"));
        }
        let mut assignments: Vec<Assignment> = Vec::new();
        loop {
            let column = self
                .column_ref()
                .ok_or_else(|| SqlRestError::unsupported("expected a column name in SET"))?;
            if !self.eat(&Token::Eq) {
                return Err(SqlRestError::unsupported(format!(
                    "expected '=' after SET column '{}'",
                    column
                )));
            }
            let value = self.operand().ok_or_else(|| {
                SqlRestError::unsupported(format!(
                    "SET value for '{}' must be '?' or a literal",
                    column
                ))
            })?;
            if assignments.iter().any(|a| a.column == column) {
                return Err(SqlRestError::unsupported(format!(
                    "column '{}' assigned twice",
                    column
                )));
            }
            assignments.push(Assignment { column, value });
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let predicates = self.required_where("UPDATE")?;

        Ok(UpdateStatement {
            table,
            assignments,
            predicates,
        })
    }

    fn delete(&mut self) -> SqlRestResult<DeleteStatement> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table = self.table_name()?;
        let predicates = self.required_where("DELETE")?;

        Ok(DeleteStatement { table, predicates })
    }

    fn select(&mut self) -> SqlRestResult<SelectStatement> {
        self.expect_keyword("SELECT")?;
        let columns = self.projection()?;
        self.expect_keyword("FROM")?;
        let table = self.table_name()?;

        let predicates = if self.eat_keyword("WHERE") {
            self.predicates()?
        } else {
            Vec::new()
        };

        let mut order_by = None;
        let mut limit = None;
        let mut offset = None;
        while let Some(token) = self.peek() {
            if token.is_keyword("GROUP") {
                return Err(SqlRestError::unsupported("GROUP BY is not supported"));
            } else if token.is_keyword("ORDER") {
                if order_by.is_some() {
                    return Err(SqlRestError::unsupported("ORDER BY given twice"));
                }
                self.pos += 1;
                self.expect_keyword("BY")?;
                order_by = Some(self.order_by()?);
            } else if token.is_keyword("LIMIT") {
                if limit.is_some() {
                    return Err(SqlRestError::unsupported("LIMIT given twice"));
                }
                self.pos += 1;
                limit = Some(self.integer_literal("LIMIT")?);
            } else if token.is_keyword("OFFSET") {
                if offset.is_some() {
                    return Err(SqlRestError::unsupported("OFFSET given twice"));
                }
                self.pos += 1;
                offset = Some(self.integer_literal("OFFSET")?);
            } else {
                break;
            }
        }

        Ok(SelectStatement {
            table,
            columns,
            predicates,
            order_by,
            limit,
            offset,
        })
    }

    fn projection(&mut self) -> SqlRestResult<Columns> {
        if self.eat(&Token::Star) {
            return Ok(Columns::Star);
        }

        let mut names = Vec::new();
        loop {
            // `calls.*`
            if self.peek().and_then(Token::identifier).is_some()
                && self.peek_at(1) == Some(&Token::Dot)
                && self.peek_at(2) == Some(&Token::Star)
            {
                if !names.is_empty() || self.peek_at(3) == Some(&Token::Comma) {
                    return Err(SqlRestError::unsupported(
                        "a qualified '*' cannot be mixed with named columns",
                    ));
                }
                self.pos += 3;
                return Ok(Columns::Star);
            }

            let name = self
                .column_ref()
                .ok_or_else(|| SqlRestError::unsupported("expected a column name or '*'"))?;
            if self.peek() == Some(&Token::LParen) {
                return Err(SqlRestError::unsupported(format!(
                    "function calls in the column list are not supported ('{}')",
                    name
                )));
            }
            names.push(name);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        Ok(Columns::Named(names))
    }

    fn order_by(&mut self) -> SqlRestResult<OrderBy> {
        let column = self
            .column_ref()
            .ok_or_else(|| SqlRestError::unsupported("expected a column after ORDER BY"))?;
        let direction = if self.eat_keyword("DESC") {
            Direction::Desc
        } else {
            self.eat_keyword("ASC");
            Direction::Asc
        };
        if self.peek() == Some(&Token::Comma) {
            return Err(SqlRestError::unsupported(
                "ORDER BY supports a single column",
            ));
        }

        Ok(OrderBy { column, direction })
    }

    fn integer_literal(&mut self, clause: &str) -> SqlRestResult<u64> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let parsed = n.parse::<u64>().map_err(|_| {
                    SqlRestError::unsupported(format!(
                        "{} expects a non-negative integer, found '{}'",
                        clause, n
                    ))
                })?;
                self.pos += 1;
                Ok(parsed)
            }
            Some(Token::Placeholder) => Err(SqlRestError::unsupported(format!(
                "{} takes a literal value, not a placeholder",
                clause
            ))),
            _ => Err(SqlRestError::unsupported(format!(
                "{} expects an integer literal",
                clause
            ))),
        }
    }

    /// `WHERE pred (AND pred)*`, mandatory for UPDATE and DELETE.
    fn required_where(&mut self, kind: &'static str) -> SqlRestResult<Vec<Predicate>> {
        if !self.eat_keyword("WHERE") {
            let has_where = self.tokens[self.pos..]
                .iter()
                .any(|s| s.token.is_keyword("WHERE"));
            if !has_where {
                return Err(SqlRestError::MissingWhereClause { kind });
            }
            return Err(SqlRestError::unsupported(format!(
                "expected WHERE, found '{}'",
                self.rest()
            )));
        }
        self.predicates()
    }

    /// Split the WHERE clause on `AND` and translate each fragment.
    fn predicates(&mut self) -> SqlRestResult<Vec<Predicate>> {
        let mut predicates = Vec::new();
        loop {
            let start = self.pos;
            while let Some(token) = self.peek() {
                if token.is_keyword("AND")
                    || CLAUSE_BOUNDARIES.iter().any(|kw| token.is_keyword(kw))
                {
                    break;
                }
                self.pos += 1;
            }
            predicates.push(self.predicate(start, self.pos)?);
            if !self.eat_keyword("AND") {
                break;
            }
        }
        Ok(predicates)
    }

    fn predicate(&self, start: usize, end: usize) -> SqlRestResult<Predicate> {
        let fragment = &self.tokens[start..end];
        let unsupported = || SqlRestError::UnsupportedPredicate(self.text(start, end).to_string());

        let (column, mut i) = match fragment {
            [a, Spanned { token: Token::Dot, .. }, b, ..]
                if a.token.identifier().is_some() && b.token.identifier().is_some() =>
            {
                (b.token.identifier(), 3)
            }
            [a, ..] => (a.token.identifier(), 1),
            [] => (None, 0),
        };
        let column = column.ok_or_else(unsupported)?.to_string();

        let op = fragment.get(i).map(|s| &s.token).ok_or_else(unsupported)?;
        i += 1;

        let (operator, operands) = if op.is_keyword("IN") {
            if fragment.get(i).map(|s| &s.token) != Some(&Token::LParen) {
                return Err(unsupported());
            }
            i += 1;
            let mut operands = Vec::new();
            loop {
                let operand = fragment
                    .get(i)
                    .and_then(|s| operand_from(&s.token))
                    .ok_or_else(unsupported)?;
                operands.push(operand);
                i += 1;
                match fragment.get(i).map(|s| &s.token) {
                    Some(Token::Comma) => i += 1,
                    Some(Token::RParen) => {
                        i += 1;
                        break;
                    }
                    _ => return Err(unsupported()),
                }
            }
            (Operator::In, operands)
        } else {
            let operator = match op {
                t if t.is_keyword("LIKE") => Operator::Like,
                Token::Gte => Operator::Gte,
                Token::Lte => Operator::Lte,
                Token::Gt => Operator::Gt,
                Token::Lt => Operator::Lt,
                Token::Eq => Operator::Eq,
                _ => return Err(unsupported()),
            };
            let operand = fragment
                .get(i)
                .and_then(|s| operand_from(&s.token))
                .ok_or_else(unsupported)?;
            i += 1;
            (operator, vec![operand])
        };

        if i != fragment.len() {
            return Err(unsupported());
        }

        Ok(Predicate {
            column,
            operator,
            operands,
        })
    }

    fn table_name(&mut self) -> SqlRestResult<String> {
        let name = self
            .peek()
            .and_then(Token::identifier)
            .map(str::to_string)
            .ok_or_else(|| SqlRestError::unsupported("expected a table name"))?;
        self.pos += 1;
        if self.peek() == Some(&Token::Dot) {
            return Err(SqlRestError::unsupported(format!(
                "schema-qualified table '{}.…' is not supported",
                name
            )));
        }
        Ok(name)
    }

    /// `col` or `table.col`, returning the unqualified name.
    fn column_ref(&mut self) -> Option<String> {
        let first = self.peek().and_then(Token::identifier)?.to_string();
        self.pos += 1;
        if self.peek() == Some(&Token::Dot) {
            if let Some(second) = self.peek_at(1).and_then(Token::identifier) {
                let second = second.to_string();
                self.pos += 2;
                return Some(second);
            }
        }
        Some(first)
    }

    fn operand(&mut self) -> Option<Operand> {
        let operand = operand_from(self.peek()?)?;
        self.pos += 1;
        Some(operand)
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> SqlRestResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(SqlRestError::unsupported(format!(
                "expected {}, found '{}'",
                keyword,
                self.rest()
            )))
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect_end(&self) -> SqlRestResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(SqlRestError::unsupported(format!(
                "unexpected trailing content '{}'",
                self.rest()
            )))
        }
    }

    /// Source text covered by tokens `start..end`.
    fn text(&self, start: usize, end: usize) -> &'a str {
        match (self.tokens.get(start), end.checked_sub(1).and_then(|e| self.tokens.get(e))) {
            (Some(first), Some(last)) if start < end => &self.source[first.start..last.end],
            _ => "",
        }
    }

    fn rest(&self) -> &'a str {
        self.text(self.pos, self.tokens.len())
    }
}

fn operand_from(token: &Token) -> Option<Operand> {
    let value = match token {
        Token::Placeholder => return Some(Operand::Placeholder),
        Token::Str(s) => Value::String(s.clone()),
        Token::Number(n) if n.contains('.') => Value::Float(n.parse().ok()?),
        Token::Number(n) => Value::Int(n.parse().ok()?),
        t if t.is_keyword("NULL") => Value::Null,
        t if t.is_keyword("TRUE") => Value::Bool(true),
        t if t.is_keyword("FALSE") => Value::Bool(false),
        _ => return None,
    };
    Some(Operand::Literal(value))
}
