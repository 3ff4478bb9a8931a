//! Statement execution against a [`QueryClient`].
//!
//! [`Store`] is the handle the rest of an application holds. It is built
//! once at startup around a single client and cloned (cheaply) into every
//! caller.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::ast::{StatementKind, Value};
use crate::client::QueryClient;
use crate::config::StoreConfig;
use crate::error::{SqlRestError, SqlRestResult};
use crate::postgrest::PostgrestClient;
use crate::result::{self, ExecResult};
use crate::translator::{Plan, Translator};

/// Largest IN list sent in one statement by [`Store::delete_in_chunks`].
pub const IN_CHUNK_SIZE: usize = 100;

/// Shared statement executor.
pub struct Store<C: QueryClient = PostgrestClient> {
    client: Arc<C>,
    translator: Translator,
}

impl<C: QueryClient> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            translator: self.translator,
        }
    }
}

impl Store<PostgrestClient> {
    /// Build a store backed by PostgREST.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = Store::connect(StoreConfig::discover()?)?;
    /// let calls: Vec<CallRow> = store
    ///     .query_all("SELECT * FROM calls WHERE company_id = ?", &params![5])
    ///     .await?;
    /// ```
    pub fn connect(config: StoreConfig) -> SqlRestResult<Self> {
        let translator = Translator::new(config.page_size);
        let client = PostgrestClient::new(config)?;
        Ok(Self::with_translator(Arc::new(client), translator))
    }
}

impl<C: QueryClient> Store<C> {
    pub fn new(client: C) -> Self {
        Self::with_translator(Arc::new(client), Translator::default())
    }

    /// Use an already shared client.
    pub fn from_arc(client: Arc<C>) -> Self {
        Self::with_translator(client, Translator::default())
    }

    pub fn with_translator(client: Arc<C>, translator: Translator) -> Self {
        Self { client, translator }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Translate without sending anything.
    pub fn translate(&self, text: &str, params: &[Value]) -> SqlRestResult<Plan> {
        self.translator.translate(text, params)
    }

    /// Start a query with builder-style bindings.
    pub fn query(&self, text: &str) -> Query<'_, C> {
        Query {
            store: self,
            text: text.to_string(),
            bindings: Vec::new(),
        }
    }

    /// Run an INSERT, UPDATE or DELETE.
    ///
    /// Unrecognised statements (DDL and the like) succeed with zero rows
    /// affected and send nothing.
    pub async fn execute(&self, text: &str, params: &[Value]) -> SqlRestResult<ExecResult> {
        let plan = self.translate(text, params)?;
        match plan.kind {
            StatementKind::Unsupported => {
                tracing::debug!(statement = text, "skipping unsupported statement");
                Ok(ExecResult::noop())
            }
            StatementKind::Select => Err(SqlRestError::unsupported(
                "execute() runs INSERT, UPDATE or DELETE; use query_all() for SELECT",
            )),
            kind => {
                let response = self.client.send(&plan.calls).await?;
                Ok(result::exec_result(kind, &response))
            }
        }
    }

    /// Run a SELECT and decode every row.
    pub async fn query_all<T: DeserializeOwned>(
        &self,
        text: &str,
        params: &[Value],
    ) -> SqlRestResult<Vec<T>> {
        let plan = self.translate(text, params)?;
        if plan.kind != StatementKind::Select {
            return Err(SqlRestError::unsupported(format!(
                "query_all() runs SELECT statements, got {}",
                plan.kind
            )));
        }
        let response = self.client.send(&plan.calls).await?;
        result::rows(response)
    }

    /// Run a SELECT and decode the first row, if any.
    pub async fn query_one<T: DeserializeOwned>(
        &self,
        text: &str,
        params: &[Value],
    ) -> SqlRestResult<Option<T>> {
        let rows = self.query_all::<T>(text, params).await?;
        Ok(rows.into_iter().next())
    }

    /// Delete rows whose `column` is in `ids`, at most [`IN_CHUNK_SIZE`]
    /// ids per statement.
    ///
    /// Chunks run in order. A failing chunk stops the loop and its error is
    /// returned; chunks already sent stay applied.
    pub async fn delete_in_chunks(
        &self,
        table: &str,
        column: &str,
        ids: &[Value],
    ) -> SqlRestResult<ExecResult> {
        let mut total = ExecResult::noop();
        for (index, chunk) in ids.chunks(IN_CHUNK_SIZE).enumerate() {
            let markers = vec!["?"; chunk.len()].join(", ");
            let text = format!("DELETE FROM {} WHERE {} IN ({})", table, column, markers);
            let outcome = self.execute(&text, chunk).await.map_err(|e| {
                tracing::warn!(table, chunk = index, error = %e, "chunked delete aborted");
                e
            })?;
            total.rows_affected += outcome.rows_affected;
        }
        Ok(total)
    }
}

/// A statement with builder-style parameter bindings.
pub struct Query<'s, C: QueryClient> {
    store: &'s Store<C>,
    text: String,
    bindings: Vec<Value>,
}

impl<C: QueryClient> Query<'_, C> {
    /// Bind the next `?`.
    pub fn bind<T: Into<Value>>(mut self, value: T) -> Self {
        self.bindings.push(value.into());
        self
    }

    /// The call chain this query would send.
    pub fn plan(&self) -> SqlRestResult<Plan> {
        self.store.translate(&self.text, &self.bindings)
    }

    pub async fn execute(&self) -> SqlRestResult<ExecResult> {
        self.store.execute(&self.text, &self.bindings).await
    }

    pub async fn fetch_all<T: DeserializeOwned>(&self) -> SqlRestResult<Vec<T>> {
        self.store.query_all(&self.text, &self.bindings).await
    }

    pub async fn fetch_one<T: DeserializeOwned>(&self) -> SqlRestResult<Option<T>> {
        self.store.query_one(&self.text, &self.bindings).await
    }
}
