use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use sqlrest::prelude::*;

#[derive(Debug, Deserialize, PartialEq)]
struct CallRow {
    id: i64,
    company_id: i64,
    score: Option<f64>,
}

fn store() -> Store<RecordingClient> {
    Store::new(RecordingClient::new())
}

#[tokio::test]
async fn test_insert_returns_echoed_id() {
    let store = store();
    store
        .client()
        .respond(Ok(ClientResponse::rows(json!([{"id": 314}]))));

    let outcome = store
        .execute("INSERT INTO t (a, b) VALUES (?, ?)", &params![1, 2])
        .await
        .expect("insert");

    assert_eq!(outcome.last_id, Some(json!(314)));
    assert_eq!(outcome.rows_affected, 1);

    let sent = store.client().sent();
    assert_eq!(sent.len(), 1);
    let inserts: Vec<&Call> = sent[0]
        .iter()
        .filter(|c| matches!(c, Call::Insert(_)))
        .collect();
    assert_eq!(inserts.len(), 1);
}

#[tokio::test]
async fn test_update_and_delete_succeed() {
    let store = store();
    store
        .client()
        .respond(Ok(ClientResponse::count(1)))
        .respond(Ok(ClientResponse::count(1)));

    let updated = store
        .execute("UPDATE t SET x = ? WHERE id = ?", &params![1, 2])
        .await
        .unwrap();
    let deleted = store
        .execute("DELETE FROM t WHERE id = ?", &params![2])
        .await
        .unwrap();

    assert_eq!(updated.rows_affected, 1);
    assert_eq!(deleted.rows_affected, 1);
    assert_eq!(store.client().sent().len(), 2);
}

#[tokio::test]
async fn test_update_without_where_sends_nothing() {
    let store = store();
    let err = store
        .execute("UPDATE t SET x = ?", &params![1])
        .await
        .unwrap_err();

    assert!(matches!(err, SqlRestError::MissingWhereClause { .. }));
    assert!(store.client().sent().is_empty());
}

#[tokio::test]
async fn test_query_all_decodes_typed_rows() {
    let store = store();
    store.client().respond(Ok(ClientResponse::rows(json!([
        {"id": 1, "company_id": 5, "score": 91.0},
        {"id": 2, "company_id": 5, "score": null},
    ]))));

    let rows: Vec<CallRow> = store
        .query_all(
            "SELECT * FROM calls WHERE company_id = ? AND agent_id = ?",
            &params![5, 9],
        )
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            CallRow { id: 1, company_id: 5, score: Some(91.0) },
            CallRow { id: 2, company_id: 5, score: None },
        ]
    );
    assert_eq!(
        store.client().last().unwrap()[2..].to_vec(),
        vec![
            Call::Eq("company_id".into(), Value::Int(5)),
            Call::Eq("agent_id".into(), Value::Int(9)),
        ]
    );
}

#[tokio::test]
async fn test_query_one_on_empty_result() {
    let store = store();
    store.client().respond(Ok(ClientResponse::default()));

    let row: Option<CallRow> = store
        .query_one("SELECT * FROM calls WHERE id = ?", &params![404])
        .await
        .unwrap();
    assert_eq!(row, None);
}

#[tokio::test]
async fn test_decode_failure_is_reported() {
    let store = store();
    store
        .client()
        .respond(Ok(ClientResponse::rows(json!([{"id": "not-a-number"}]))));

    let err = store
        .query_all::<CallRow>("SELECT * FROM calls", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlRestError::Decode(_)));
}

#[tokio::test]
async fn test_upstream_error_passes_through() {
    let store = store();
    store.client().respond(Err(SqlRestError::Upstream {
        status: 409,
        code: Some("23505".into()),
        message: "duplicate key value violates unique constraint".into(),
    }));

    let err = store
        .execute("INSERT INTO alerts (call_id) VALUES (?)", &params![1])
        .await
        .unwrap_err();
    match err {
        SqlRestError::Upstream { status, code, .. } => {
            assert_eq!(status, 409);
            assert_eq!(code.as_deref(), Some("23505"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_ddl_is_a_noop() {
    let store = store();
    let outcome = store
        .execute("CREATE INDEX idx_calls_company ON calls (company_id)", &[])
        .await
        .unwrap();

    assert_eq!(outcome, ExecResult::noop());
    assert!(store.client().sent().is_empty());
}

#[tokio::test]
async fn test_clones_share_one_client() {
    let store = store();
    let other = store.clone();
    store.client().respond(Ok(ClientResponse::count(3)));

    other
        .execute("DELETE FROM sessions WHERE expires_at < ?", &params!["2024-01-01"])
        .await
        .unwrap();

    assert_eq!(store.client().sent().len(), 1);
}

#[tokio::test]
async fn test_chunked_delete_batches() {
    let store = store();
    let ids: Vec<Value> = (1..=IN_CHUNK_SIZE as i64 + 1).map(Value::from).collect();

    store.delete_in_chunks("calls", "id", &ids).await.unwrap();

    let sent = store.client().sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1][2], Call::In("id".into(), vec![Value::Int(101)]));
}
