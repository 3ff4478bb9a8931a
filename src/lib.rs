//! # sqlrest
//!
//! Run SQL-shaped statements against a REST filtered-query service.
//!
//! Application code keeps writing plain statements with `?` placeholders;
//! sqlrest parses them, binds the parameters, and emits the equivalent
//! query-builder chain for a PostgREST-style API.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlrest::prelude::*;
//!
//! let store = Store::connect(StoreConfig::discover()?)?;
//!
//! let recent: Vec<CallRow> = store
//!     .query_all(
//!         "SELECT * FROM calls WHERE company_id = ? ORDER BY created_at DESC LIMIT 20",
//!         &params![company_id],
//!     )
//!     .await?;
//!
//! let inserted = store
//!     .execute("INSERT INTO alerts (call_id, kind) VALUES (?, ?)", &params![call_id, "low_score"])
//!     .await?;
//! ```
//!
//! ## Translation
//!
//! | Statement                         | Calls                                   |
//! |-----------------------------------|-----------------------------------------|
//! | `INSERT INTO t (a) VALUES (?)`    | `from(t).insert({a}).select("id")`      |
//! | `UPDATE t SET a = ? WHERE id = ?` | `from(t).update({a}).eq(id)`            |
//! | `DELETE FROM t WHERE id = ?`      | `from(t).delete().eq(id)`               |
//! | `... WHERE c LIKE ?`              | `ilike(c, pattern with % -> *)`         |
//! | `... WHERE c IN (?, ?)`           | `in(c, [..])`                           |
//! | `ORDER BY c DESC LIMIT n`         | `order(c, {ascending: false}).limit(n)` |
//! | `OFFSET m` without LIMIT          | `range(m, m + 999)`                     |

pub mod ast;
pub mod binder;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod postgrest;
pub mod result;
pub mod translator;

pub mod prelude {
    pub use crate::ast::{Statement, StatementKind, Value};
    pub use crate::client::{Call, ClientResponse, QueryClient, RecordingClient, Row};
    pub use crate::config::StoreConfig;
    pub use crate::engine::{Query, Store, IN_CHUNK_SIZE};
    pub use crate::error::*;
    pub use crate::params;
    pub use crate::postgrest::PostgrestClient;
    pub use crate::result::ExecResult;
    pub use crate::translator::{Plan, Translator};
}

/// Parse statement text into an AST.
///
/// # Example
///
/// ```
/// use sqlrest::ast::Statement;
///
/// let stmt = sqlrest::parse("SELECT * FROM calls WHERE id = ?").unwrap();
/// assert_eq!(stmt.table(), "calls");
/// assert!(matches!(stmt, Statement::Select(_)));
/// ```
pub fn parse(input: &str) -> Result<ast::Statement, error::SqlRestError> {
    parser::parse(input)
}

/// Classify statement text by its leading keyword.
pub fn classify(input: &str) -> ast::StatementKind {
    parser::classify(input)
}

/// Translate statement text and parameters into a client-call plan.
///
/// # Example
///
/// ```
/// use sqlrest::{client::Call, params};
///
/// let plan = sqlrest::translate("DELETE FROM sessions WHERE id = ?", &params![7]).unwrap();
/// assert_eq!(plan.calls[1], Call::Delete);
/// ```
pub fn translate(
    input: &str,
    params: &[ast::Value],
) -> Result<translator::Plan, error::SqlRestError> {
    translator::translate(input, params)
}
