//! The connection boundary.
//!
//! The engine never talks to a database driver directly; it compiles
//! statements and hands them to a [`Connection`]. Implementations wrap
//! whatever transport the host application uses. [`MockConnection`]
//! provides a scripted implementation for tests.

use crate::error::{ConnectionError, ConnectionErrorKind, Error, Result};
use crate::row::Row;
use crate::value::Value;
use std::collections::VecDeque;

/// Result of executing one statement.
#[derive(Debug, Clone, Default)]
pub struct ExecuteResult {
    /// Rows returned by the statement, if any
    pub rows: Vec<Row>,
    /// Number of rows affected by a mutating statement
    pub affected: u64,
}

impl ExecuteResult {
    /// A result with rows and no affected count.
    pub fn rows(rows: Vec<Row>) -> Self {
        Self { rows, affected: 0 }
    }

    /// A result with an affected count and no rows.
    pub fn affected(affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected,
        }
    }
}

/// A database connection capable of executing compiled statements.
///
/// `open` failures and `execute` failures surface as connection errors;
/// the engine never retries and never swallows them.
pub trait Connection: Send {
    /// Open the native handle. `write` requests a write-capable handle.
    fn open(&mut self, write: bool) -> Result<()>;

    /// Execute a parameterized statement.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecuteResult>;

    /// Close the native handle. Closing twice is a no-op.
    fn close(&mut self);

    /// Whether the handle is currently open.
    fn is_open(&self) -> bool;
}

/// One statement captured by a [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A scripted connection for tests.
///
/// Results are queued with [`MockConnection::push_rows`] and friends and
/// consumed in order; when the script runs dry, execution returns an
/// empty result. Every executed statement is recorded.
#[derive(Debug, Default)]
pub struct MockConnection {
    open: bool,
    write_capable: bool,
    scripted: VecDeque<Result<ExecuteResult>>,
    executed: Vec<ExecutedStatement>,
    fail_next_open: bool,
}

impl MockConnection {
    /// Create a fresh mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row-returning result.
    pub fn push_rows(&mut self, rows: Vec<Row>) {
        self.scripted.push_back(Ok(ExecuteResult::rows(rows)));
    }

    /// Queue an affected-count result.
    pub fn push_affected(&mut self, affected: u64) {
        self.scripted.push_back(Ok(ExecuteResult::affected(affected)));
    }

    /// Queue a failure.
    pub fn push_error(&mut self, error: Error) {
        self.scripted.push_back(Err(error));
    }

    /// Make the next `open` call fail.
    pub fn fail_next_open(&mut self) {
        self.fail_next_open = true;
    }

    /// Every statement executed so far, in order.
    pub fn executed(&self) -> &[ExecutedStatement] {
        &self.executed
    }

    /// Number of statements executed so far.
    pub fn statement_count(&self) -> usize {
        self.executed.len()
    }

    /// Whether the last open requested write access.
    pub fn is_write_capable(&self) -> bool {
        self.write_capable
    }
}

impl Connection for MockConnection {
    fn open(&mut self, write: bool) -> Result<()> {
        if self.fail_next_open {
            self.fail_next_open = false;
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Open,
                message: "scripted open failure".to_string(),
                source: None,
            }));
        }
        self.open = true;
        self.write_capable = write;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecuteResult> {
        if !self.open {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Closed,
                message: "execute on a closed connection".to_string(),
                source: None,
            }));
        }
        self.executed.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match self.scripted.pop_front() {
            Some(result) => result,
            None => Ok(ExecuteResult::default()),
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
