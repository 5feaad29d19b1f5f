//! Blocking connection pooling with a read/write split.
//!
//! The pool keeps two sets of connections: readers, opened without write
//! access, and writers, opened write-capable. [`Pool::acquire`] hands out
//! an idle connection, opens a new one while under the limit, and blocks
//! on a condition variable otherwise; there is no acquisition timeout and
//! no cancellation. Returned guards hand their connection back on drop.

use relmap_core::{AccessMode, Connection, Error, PoolError, PoolErrorKind, Result};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Connection limits for a [`Pool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum concurrently open read connections
    pub max_readers: usize,
    /// Maximum concurrently open write connections
    pub max_writers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_readers: 4,
            max_writers: 1,
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> Result<()> {
        if self.max_readers == 0 || self.max_writers == 0 {
            return Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Config,
                message: "connection limits must be at least 1".to_string(),
            }));
        }
        Ok(())
    }

    fn limit(&self, mode: AccessMode) -> usize {
        match mode {
            AccessMode::Read => self.max_readers,
            AccessMode::Write => self.max_writers,
        }
    }
}

/// Counters describing the pool's current occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub open_readers: usize,
    pub open_writers: usize,
    pub idle_readers: usize,
    pub idle_writers: usize,
}

/// Opens a fresh connection for the given access mode.
pub type ConnectionFactory = Box<dyn Fn(AccessMode) -> Result<Box<dyn Connection>> + Send + Sync>;

struct Shelf {
    idle: Vec<Box<dyn Connection>>,
    open: usize,
}

impl Shelf {
    const fn new() -> Self {
        Self {
            idle: Vec::new(),
            open: 0,
        }
    }
}

struct PoolState {
    readers: Shelf,
    writers: Shelf,
    closed: bool,
}

impl PoolState {
    fn shelf(&mut self, mode: AccessMode) -> &mut Shelf {
        match mode {
            AccessMode::Read => &mut self.readers,
            AccessMode::Write => &mut self.writers,
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    factory: ConnectionFactory,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A shared connection pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool over a connection factory.
    pub fn new(config: PoolConfig, factory: ConnectionFactory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                state: Mutex::new(PoolState {
                    readers: Shelf::new(),
                    writers: Shelf::new(),
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        })
    }

    /// Acquire a connection for the given access mode, blocking until
    /// one is idle or can be opened.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection> {
        let mut state = self.inner.lock();
        loop {
            if state.closed {
                return Err(Error::Pool(PoolError {
                    kind: PoolErrorKind::Closed,
                    message: "acquire on a closed pool".to_string(),
                }));
            }
            let shelf = state.shelf(mode);
            if let Some(connection) = shelf.idle.pop() {
                tracing::debug!(mode = ?mode, "reusing pooled connection");
                return Ok(PooledConnection {
                    connection: Some(connection),
                    mode,
                    pool: Arc::clone(&self.inner),
                });
            }
            if shelf.open < self.inner.config.limit(mode) {
                shelf.open += 1;
                drop(state);
                return self.open_connection(mode);
            }
            tracing::debug!(mode = ?mode, "pool exhausted, waiting");
            state = self
                .inner
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn open_connection(&self, mode: AccessMode) -> Result<PooledConnection> {
        let opened = (self.inner.factory)(mode).and_then(|mut connection| {
            connection.open(mode == AccessMode::Write)?;
            Ok(connection)
        });
        match opened {
            Ok(connection) => {
                tracing::debug!(mode = ?mode, "opened pooled connection");
                Ok(PooledConnection {
                    connection: Some(connection),
                    mode,
                    pool: Arc::clone(&self.inner),
                })
            }
            Err(error) => {
                let mut state = self.inner.lock();
                state.shelf(mode).open -= 1;
                drop(state);
                self.inner.available.notify_one();
                Err(error)
            }
        }
    }

    /// Close the pool: idle connections are closed now, borrowed ones as
    /// they return.
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.closed = true;
        for shelf in [&mut state.readers, &mut state.writers] {
            for mut connection in shelf.idle.drain(..) {
                connection.close();
                shelf.open -= 1;
            }
        }
        drop(guard);
        self.inner.available.notify_all();
        tracing::debug!("pool closed");
    }

    /// Current occupancy counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats {
            open_readers: state.readers.open,
            open_writers: state.writers.open,
            idle_readers: state.readers.idle.len(),
            idle_writers: state.writers.idle.len(),
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}

/// A borrowed connection; returns to its pool on drop.
pub struct PooledConnection {
    connection: Option<Box<dyn Connection>>,
    mode: AccessMode,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    /// Access mode this connection was acquired for.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Execute a statement on the borrowed connection.
    pub fn execute(
        &mut self,
        sql: &str,
        params: &[relmap_core::Value],
    ) -> Result<relmap_core::ExecuteResult> {
        match &mut self.connection {
            Some(connection) => connection.execute(sql, params),
            // drop() is the only thing that vacates the slot
            None => Err(Error::Pool(PoolError {
                kind: PoolErrorKind::Closed,
                message: "connection already returned".to_string(),
            })),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        let mut state = self.pool.lock();
        if state.closed {
            connection.close();
            state.shelf(self.mode).open -= 1;
        } else {
            state.shelf(self.mode).idle.push(connection);
        }
        drop(state);
        self.pool.available.notify_one();
    }
}
