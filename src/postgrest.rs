//! PostgREST transport for [`QueryClient`].
//!
//! A call chain becomes a single HTTP request against
//! `{url}/rest/v1/{table}`:
//!
//! | Call              | Request                                   |
//! |-------------------|-------------------------------------------|
//! | `select(cols)`    | `select=cols`                             |
//! | `insert(row)`     | `POST`, JSON body                         |
//! | `update(row)`     | `PATCH`, JSON body, `Prefer: count=exact` |
//! | `delete()`        | `DELETE`, `Prefer: count=exact`           |
//! | `eq(c, v)`        | `c=eq.v` (`c=is.null` for NULL)           |
//! | `ilike(c, p)`     | `c=ilike.p`                               |
//! | `gt/gte/lt/lte`   | `c=gt.v` ...                              |
//! | `in(c, [a, b])`   | `c=in.(a,b)`                              |
//! | `order(c, asc)`   | `order=c.asc`                             |
//! | `limit(n)`        | `limit=n`                                 |
//! | `range(a, b)`     | `offset=a&limit=b-a+1`                    |

use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;

use crate::ast::Value;
use crate::client::{Call, ClientResponse, QueryClient};
use crate::config::StoreConfig;
use crate::error::{SqlRestError, SqlRestResult};

/// An HTTP request derived from a call chain, before it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub table: String,
    pub query: Vec<(String, String)>,
    pub prefer: Vec<&'static str>,
    pub body: Option<serde_json::Value>,
}

/// Compile a call chain into a [`RestRequest`].
pub fn build_request(calls: &[Call]) -> SqlRestResult<RestRequest> {
    let table = match calls.first() {
        Some(Call::From(table)) => table.clone(),
        _ => {
            return Err(SqlRestError::unsupported(
                "call chain must start with from()",
            ));
        }
    };

    let mut request = RestRequest {
        method: Method::GET,
        table,
        query: Vec::new(),
        prefer: Vec::new(),
        body: None,
    };
    let mut orders: Vec<String> = Vec::new();

    for call in &calls[1..] {
        match call {
            Call::From(_) => {
                return Err(SqlRestError::unsupported("from() given twice"));
            }
            Call::Select(columns) => {
                request.query.push(("select".into(), columns.clone()));
                if request.method == Method::POST {
                    request.prefer.push("return=representation");
                }
            }
            Call::Insert(row) => {
                request.method = Method::POST;
                request.body = Some(serde_json::Value::Object(row.clone()));
            }
            Call::Update(row) => {
                request.method = Method::PATCH;
                request.body = Some(serde_json::Value::Object(row.clone()));
                request.prefer.push("count=exact");
            }
            Call::Delete => {
                request.method = Method::DELETE;
                request.prefer.push("count=exact");
            }
            Call::Eq(column, value) if value.is_null() => {
                request.query.push((column.clone(), "is.null".into()));
            }
            Call::Eq(column, value) => request.query.push(filter(column, "eq", value)),
            Call::ILike(column, pattern) => {
                request
                    .query
                    .push((column.clone(), format!("ilike.{}", pattern)));
            }
            Call::Gt(column, value) => request.query.push(filter(column, "gt", value)),
            Call::Gte(column, value) => request.query.push(filter(column, "gte", value)),
            Call::Lt(column, value) => request.query.push(filter(column, "lt", value)),
            Call::Lte(column, value) => request.query.push(filter(column, "lte", value)),
            Call::In(column, values) => {
                let list: Vec<String> = values.iter().map(list_item).collect();
                request
                    .query
                    .push((column.clone(), format!("in.({})", list.join(","))));
            }
            Call::Order { column, ascending } => {
                let dir = if *ascending { "asc" } else { "desc" };
                orders.push(format!("{}.{}", column, dir));
            }
            Call::Limit(n) => request.query.push(("limit".into(), n.to_string())),
            Call::Range { from, to } => {
                request.query.push(("offset".into(), from.to_string()));
                request.query.push((
                    "limit".into(),
                    (to.saturating_sub(*from) + 1).to_string(),
                ));
            }
        }
    }

    if !orders.is_empty() {
        request.query.push(("order".into(), orders.join(",")));
    }

    Ok(request)
}

fn filter(column: &str, op: &str, value: &Value) -> (String, String) {
    (column.to_string(), format!("{}.{}", op, scalar(value)))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Json(json) => json.to_string(),
        other => other.to_string(),
    }
}

/// Items of an `in.(...)` list; reserved characters force double quotes.
fn list_item(value: &Value) -> String {
    let raw = scalar(value);
    let reserved = |c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace();
    if matches!(value, Value::String(_)) && raw.chars().any(reserved) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

/// Row count from a `Content-Range` header (`0-9/42`, `*/3`, `0-4/*`).
pub fn content_range_count(header: Option<&str>) -> Option<u64> {
    let (range, total) = header?.split_once('/')?;
    if let Ok(total) = total.trim().parse::<u64>() {
        return Some(total);
    }
    let (start, end) = range.trim().split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    Some(end.saturating_sub(start) + 1)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn upstream_error(status: u16, body: &str) -> SqlRestError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed.message.unwrap_or_else(|| body.to_string());
            if let Some(details) = parsed.details {
                message.push_str(&format!(" ({})", details));
            }
            if let Some(hint) = parsed.hint {
                message.push_str(&format!(" hint: {}", hint));
            }
            SqlRestError::Upstream {
                status,
                code: parsed.code,
                message,
            }
        }
        Err(_) => SqlRestError::Upstream {
            status,
            code: None,
            message: body.trim().to_string(),
        },
    }
}

/// HTTP client for a PostgREST endpoint.
///
/// Holds one pooled `reqwest::Client`; build it once and share it.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    config: StoreConfig,
}

impl PostgrestClient {
    pub fn new(config: StoreConfig) -> SqlRestResult<Self> {
        let config = config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl QueryClient for PostgrestClient {
    async fn send(&self, calls: &[Call]) -> SqlRestResult<ClientResponse> {
        let request = build_request(calls)?;
        let url = self.config.table_url(&request.table);
        tracing::debug!(method = %request.method, %url, query = ?request.query, "sending request");

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .query(&request.query);

        if !request.prefer.is_empty() {
            builder = builder.header("Prefer", request.prefer.join(","));
        }
        if let Some(schema) = &self.config.schema {
            let profile = if request.method == Method::GET {
                "Accept-Profile"
            } else {
                "Content-Profile"
            };
            builder = builder.header(profile, schema);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let count = content_range_count(
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok()),
        );
        let text = response.text().await?;

        if !status.is_success() {
            let err = upstream_error(status.as_u16(), &text);
            tracing::warn!(%url, status = status.as_u16(), error = %err, "upstream request failed");
            return Err(err);
        }

        let data = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).map_err(|e| SqlRestError::Decode(e.to_string()))?)
        };

        Ok(ClientResponse { data, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::translate;
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_select_request() {
        let plan = translate(
            "SELECT * FROM calls WHERE company_id = ? AND phone_number LIKE ? ORDER BY created_at DESC LIMIT 10",
            &[Value::Int(5), Value::from("%912%")],
        )
        .unwrap();
        let request = build_request(&plan.calls).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.table, "calls");
        assert_eq!(
            request.query,
            pairs(&[
                ("select", "*"),
                ("company_id", "eq.5"),
                ("phone_number", "ilike.*912*"),
                ("limit", "10"),
                ("order", "created_at.desc"),
            ])
        );
        assert!(request.prefer.is_empty());
        assert_eq!(request.body, None);
    }

    #[test]
    fn test_insert_request_echoes_id() {
        let plan = translate(
            "INSERT INTO calls (agent_id, status) VALUES (?, ?)",
            &[Value::Int(3), Value::from("new")],
        )
        .unwrap();
        let request = build_request(&plan.calls).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.query, pairs(&[("select", "id")]));
        assert_eq!(request.prefer, vec!["return=representation"]);
        assert_eq!(
            request.body,
            Some(serde_json::json!({"agent_id": 3, "status": "new"}))
        );
    }

    #[test]
    fn test_update_and_delete_request_count() {
        let plan = translate("UPDATE calls SET score = ? WHERE id = ?", &[Value::Float(4.5), Value::Int(1)])
            .unwrap();
        let request = build_request(&plan.calls).unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.prefer, vec!["count=exact"]);
        assert_eq!(request.query, pairs(&[("id", "eq.1")]));

        let plan = translate("DELETE FROM calls WHERE id IN (?, ?)", &[Value::Int(1), Value::Int(2)]).unwrap();
        let request = build_request(&plan.calls).unwrap();
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.query, pairs(&[("id", "in.(1,2)")]));
    }

    #[test]
    fn test_null_equality_and_quoted_list() {
        let calls = vec![
            Call::From("agents".into()),
            Call::Select("*".into()),
            Call::Eq("deleted_at".into(), Value::Null),
            Call::In(
                "name".into(),
                vec![Value::from("Smith, J."), Value::from("plain")],
            ),
            Call::Range { from: 20, to: 29 },
        ];
        let request = build_request(&calls).unwrap();
        assert_eq!(
            request.query,
            pairs(&[
                ("select", "*"),
                ("deleted_at", "is.null"),
                ("name", r#"in.("Smith, J.",plain)"#),
                ("offset", "20"),
                ("limit", "10"),
            ])
        );
    }

    #[test]
    fn test_chain_without_from() {
        assert!(build_request(&[Call::Delete]).is_err());
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range_count(Some("0-9/42")), Some(42));
        assert_eq!(content_range_count(Some("*/3")), Some(3));
        assert_eq!(content_range_count(Some("0-4/*")), Some(5));
        assert_eq!(content_range_count(Some("*/*")), None);
        assert_eq!(content_range_count(None), None);
    }

    #[test]
    fn test_upstream_error_passthrough() {
        let err = upstream_error(
            409,
            r#"{"code":"23505","details":"Key (id)=(1) already exists.","hint":null,"message":"duplicate key value"}"#,
        );
        match err {
            SqlRestError::Upstream {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code.as_deref(), Some("23505"));
                assert_eq!(message, "duplicate key value (Key (id)=(1) already exists.)");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = upstream_error(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "Upstream error (502): Bad Gateway");
    }
}
