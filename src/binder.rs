//! Positional parameter binding.
//!
//! A single cursor walks the parameter slice. Callers bind clauses in
//! textual order: column list, SET list, then WHERE (IN lists included).

use crate::ast::{Operand, Statement, Value};
use crate::error::{SqlRestError, SqlRestResult};

pub struct Binder<'p> {
    params: &'p [Value],
    cursor: usize,
}

impl<'p> Binder<'p> {
    /// Check the parameter count against the statement up front so that
    /// binding never fails halfway.
    pub fn for_statement(statement: &Statement, params: &'p [Value]) -> SqlRestResult<Self> {
        let expected = statement.placeholder_count();
        if params.len() < expected {
            return Err(SqlRestError::ParameterCountMismatch {
                expected,
                supplied: params.len(),
            });
        }
        if params.len() > expected {
            tracing::warn!(
                expected,
                supplied = params.len(),
                "surplus parameters ignored"
            );
        }
        Ok(Self { params, cursor: 0 })
    }

    /// Resolve one operand, consuming a parameter for `?`.
    ///
    /// NaN and infinite floats have no JSON form and are rejected.
    pub fn bind(&mut self, operand: &Operand) -> SqlRestResult<Value> {
        let value = match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Placeholder => {
                let value = self.params.get(self.cursor).cloned().ok_or_else(|| {
                    SqlRestError::ParameterCountMismatch {
                        expected: self.cursor + 1,
                        supplied: self.params.len(),
                    }
                })?;
                self.cursor += 1;
                value
            }
        };
        match value {
            Value::Float(f) if !f.is_finite() => Err(SqlRestError::InvalidParameter(format!(
                "non-finite float {} (position {})",
                f, self.cursor
            ))),
            value => Ok(value),
        }
    }

    /// Resolve a list of operands in order (IN lists).
    pub fn bind_all(&mut self, operands: &[Operand]) -> SqlRestResult<Vec<Value>> {
        operands.iter().map(|o| self.bind(o)).collect()
    }

    /// Parameters consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_binds_in_order() {
        let stmt = parse("SELECT * FROM t WHERE a = ? AND b IN (?, ?)").unwrap();
        let params = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        let mut binder = Binder::for_statement(&stmt, &params).unwrap();
        assert_eq!(binder.bind(&Operand::Placeholder).unwrap(), Value::Int(1));
        assert_eq!(
            binder
                .bind_all(&[Operand::Placeholder, Operand::Placeholder])
                .unwrap(),
            vec![Value::Int(2), Value::Int(3)]
        );
        assert_eq!(binder.consumed(), 3);
    }

    #[test]
    fn test_literals_consume_nothing() {
        let stmt = parse("DELETE FROM t WHERE kind = 'x' AND id = ?").unwrap();
        let params = vec![Value::Int(9)];
        let mut binder = Binder::for_statement(&stmt, &params).unwrap();
        assert_eq!(
            binder
                .bind(&Operand::Literal(Value::String("x".into())))
                .unwrap(),
            Value::String("x".into())
        );
        assert_eq!(binder.consumed(), 0);
        assert_eq!(binder.bind(&Operand::Placeholder).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_short_parameter_list() {
        let stmt = parse("SELECT * FROM t WHERE id IN (?, ?, ?)").unwrap();
        let params = vec![Value::Int(1)];
        let err = Binder::for_statement(&stmt, &params).err().unwrap();
        assert!(matches!(
            err,
            SqlRestError::ParameterCountMismatch {
                expected: 3,
                supplied: 1
            }
        ));
    }

    #[test]
    fn test_surplus_parameters_allowed() {
        let stmt = parse("DELETE FROM t WHERE id = ?").unwrap();
        let params = vec![Value::Int(1), Value::Int(2)];
        assert!(Binder::for_statement(&stmt, &params).is_ok());
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let stmt = parse("INSERT INTO t (s) VALUES (?)").unwrap();
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let params = vec![Value::Float(f)];
            let mut binder = Binder::for_statement(&stmt, &params).unwrap();
            let err = binder.bind(&Operand::Placeholder).unwrap_err();
            assert!(matches!(err, SqlRestError::InvalidParameter(_)));
        }
    }
}
