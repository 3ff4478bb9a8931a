//! Filtered-query client interface.
//!
//! A translated statement is an ordered list of [`Call`]s, mirroring a
//! query-builder chain (`from(t).select(..).eq(..).order(..).limit(..)`).
//! A [`QueryClient`] turns one such chain into one upstream request.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::ast::Value;
use crate::error::SqlRestResult;

/// Column name to JSON value, the body of an insert or update.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One step of a query-builder chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    From(String),
    /// Projection, `*` or comma-separated columns.
    Select(String),
    Insert(Row),
    Update(Row),
    Delete,
    Eq(String, Value),
    /// Case-insensitive match; `*` is the wildcard.
    ILike(String, String),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Order { column: String, ascending: bool },
    Limit(u64),
    /// Inclusive row index range.
    Range { from: u64, to: u64 },
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::From(t) => write!(f, "from({:?})", t),
            Call::Select(cols) => write!(f, "select({:?})", cols),
            Call::Insert(row) => write!(f, "insert({})", serde_json::Value::Object(row.clone())),
            Call::Update(row) => write!(f, "update({})", serde_json::Value::Object(row.clone())),
            Call::Delete => write!(f, "delete()"),
            Call::Eq(c, v) => write!(f, "eq({:?}, {})", c, v.to_json()),
            Call::ILike(c, p) => write!(f, "ilike({:?}, {:?})", c, p),
            Call::Gt(c, v) => write!(f, "gt({:?}, {})", c, v.to_json()),
            Call::Gte(c, v) => write!(f, "gte({:?}, {})", c, v.to_json()),
            Call::Lt(c, v) => write!(f, "lt({:?}, {})", c, v.to_json()),
            Call::Lte(c, v) => write!(f, "lte({:?}, {})", c, v.to_json()),
            Call::In(c, vs) => {
                let list: Vec<serde_json::Value> = vs.iter().map(Value::to_json).collect();
                write!(f, "in({:?}, {})", c, serde_json::Value::Array(list))
            }
            Call::Order { column, ascending } => {
                write!(f, "order({:?}, {{ ascending: {} }})", column, ascending)
            }
            Call::Limit(n) => write!(f, "limit({})", n),
            Call::Range { from, to } => write!(f, "range({}, {})", from, to),
        }
    }
}

/// What the upstream service returned for one call chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientResponse {
    /// Response payload; `None` when the service sent no body.
    pub data: Option<serde_json::Value>,
    /// Affected or matching row count, when the service reports one.
    pub count: Option<u64>,
}

impl ClientResponse {
    pub fn rows(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            count: None,
        }
    }

    pub fn count(count: u64) -> Self {
        Self {
            data: None,
            count: Some(count),
        }
    }
}

/// A filtered-query backend.
///
/// Implementations are shared handles: one is built at startup and used
/// concurrently by every caller, so they must be `Send + Sync`.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Execute one call chain. Upstream errors are returned as-is.
    async fn send(&self, calls: &[Call]) -> SqlRestResult<ClientResponse>;
}

/// In-memory client that records every call chain and replays queued
/// responses. Returns an empty response once the queue is drained.
#[derive(Default)]
pub struct RecordingClient {
    sent: Mutex<Vec<Vec<Call>>>,
    responses: Mutex<VecDeque<SqlRestResult<ClientResponse>>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next `send`.
    pub fn respond(&self, response: SqlRestResult<ClientResponse>) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    /// Every call chain received so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<Call>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recent call chain.
    pub fn last(&self) -> Option<Vec<Call>> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl QueryClient for RecordingClient {
    async fn send(&self, calls: &[Call]) -> SqlRestResult<ClientResponse> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(calls.to_vec());
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(ClientResponse::default()))
    }
}
