//! Normalizes client responses into the shapes callers expect.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ast::StatementKind;
use crate::client::ClientResponse;
use crate::error::{SqlRestError, SqlRestResult};
use crate::translator::ID_COLUMN;

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecResult {
    /// Identifier echoed back by an insert, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<serde_json::Value>,
    pub rows_affected: u64,
}

impl ExecResult {
    /// Result for a statement that was skipped.
    pub fn noop() -> Self {
        Self::default()
    }
}

/// Map a mutation response to an [`ExecResult`].
///
/// Inserts always report one row. Updates and deletes use the reported
/// count and fall back to one when the client gives none.
pub fn exec_result(kind: StatementKind, response: &ClientResponse) -> ExecResult {
    match kind {
        StatementKind::Insert => ExecResult {
            last_id: echoed_id(response.data.as_ref()),
            rows_affected: 1,
        },
        StatementKind::Update | StatementKind::Delete => ExecResult {
            last_id: None,
            rows_affected: response.count.unwrap_or(1),
        },
        StatementKind::Select | StatementKind::Unsupported => ExecResult::noop(),
    }
}

/// Deserialize the rows of a SELECT response. Missing data is no rows.
pub fn rows<T: DeserializeOwned>(response: ClientResponse) -> SqlRestResult<Vec<T>> {
    let items = match response.data {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items,
        Some(single) => vec![single],
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| SqlRestError::Decode(e.to_string())))
        .collect()
}

fn echoed_id(data: Option<&serde_json::Value>) -> Option<serde_json::Value> {
    let record = match data? {
        serde_json::Value::Array(items) => items.first()?,
        other => other,
    };
    record
        .get(ID_COLUMN)
        .filter(|id| !id.is_null())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct CallRow {
        id: i64,
        score: Option<f64>,
    }

    #[test]
    fn test_insert_echoes_id() {
        let result = exec_result(
            StatementKind::Insert,
            &ClientResponse::rows(json!([{"id": 42}])),
        );
        assert_eq!(result.last_id, Some(json!(42)));
        assert_eq!(result.rows_affected, 1);
    }

    #[test]
    fn test_insert_without_echo() {
        let result = exec_result(StatementKind::Insert, &ClientResponse::default());
        assert_eq!(result.last_id, None);
        assert_eq!(result.rows_affected, 1);
    }

    #[test]
    fn test_mutation_count_defaults_to_one() {
        let reported = exec_result(StatementKind::Delete, &ClientResponse::count(17));
        assert_eq!(reported.rows_affected, 17);
        let unreported = exec_result(StatementKind::Update, &ClientResponse::default());
        assert_eq!(unreported.rows_affected, 1);
    }

    #[test]
    fn test_zero_count_is_kept() {
        let result = exec_result(StatementKind::Update, &ClientResponse::count(0));
        assert_eq!(result.rows_affected, 0);
    }

    #[test]
    fn test_rows_typed() {
        let decoded: Vec<CallRow> = rows(ClientResponse::rows(json!([
            {"id": 1, "score": 4.5},
            {"id": 2, "score": null}
        ])))
        .unwrap();
        assert_eq!(
            decoded,
            vec![
                CallRow {
                    id: 1,
                    score: Some(4.5)
                },
                CallRow { id: 2, score: None },
            ]
        );
    }

    #[test]
    fn test_rows_missing_data() {
        let empty: Vec<serde_json::Value> = rows(ClientResponse::default()).unwrap();
        assert!(empty.is_empty());
        let null: Vec<serde_json::Value> = rows(ClientResponse::rows(json!(null))).unwrap();
        assert!(null.is_empty());
    }

    #[test]
    fn test_rows_decode_error() {
        let err = rows::<CallRow>(ClientResponse::rows(json!([{"id": "x"}]))).unwrap_err();
        assert!(matches!(err, SqlRestError::Decode(_)));
    }
}
