//! Bounded connection pool with liveness probing and overflow capacity.
//!
//! Core connections are reused through an idle queue. Once the core pool
//! is busy, up to `max_overflow` extra connections are created on demand;
//! overflow connections are closed on release, never recycled, which
//! bounds idle-resource growth after a burst.
//!
//! A connection popped from the idle queue is probed with `SELECT 1`
//! before being handed out. A dead backend connection therefore costs one
//! probe plus one reconnect and is never returned to a caller.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::{DatabaseConfig, PoolConfig};
use crate::error::{ReportError, ReportResult};

/// Live gauges plus the lifetime creation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub core_size: usize,
    pub idle_available: usize,
    pub overflow_count: usize,
    pub total_created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Core,
    Overflow,
}

struct PoolState {
    idle: VecDeque<Connection>,
    overflow_count: usize,
    total_created: u64,
    closed: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    available: Condvar,
    core_size: usize,
    max_overflow: usize,
    acquire_timeout: Duration,
    db_path: String,
    cache_pages: i64,
}

/// Thread-safe pool handle. Cloning is cheap and shares the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Build a pool against `database.path`. A few core connections are
    /// pre-created; failure to pre-create is logged, not fatal (the
    /// backend may simply not be reachable yet).
    pub fn new(database: &DatabaseConfig, pool: &PoolConfig) -> Self {
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(pool.core_size),
                overflow_count: 0,
                total_created: 0,
                closed: false,
            }),
            available: Condvar::new(),
            core_size: pool.core_size,
            max_overflow: pool.max_overflow,
            acquire_timeout: Duration::from_secs(pool.acquire_timeout_secs),
            db_path: database.path.clone(),
            cache_pages: database.cache_pages,
        });
        let handle = Self { inner };

        let warm = pool.core_size.min(3);
        for _ in 0..warm {
            match handle.open_connection() {
                Ok(conn) => {
                    let mut state = handle.lock_state();
                    state.idle.push_back(conn);
                    state.total_created += 1;
                }
                Err(e) => {
                    warn!("pool pre-initialization stopped: {e}");
                    break;
                }
            }
        }
        let idle = handle.lock_state().idle.len();
        info!(
            "connection pool ready: {idle} idle, core={}, max_overflow={}",
            pool.core_size, pool.max_overflow
        );
        handle
    }

    /// Acquire with the configured timeout.
    pub fn acquire(&self) -> ReportResult<PooledConnection> {
        self.acquire_timeout(self.inner.acquire_timeout)
    }

    /// Acquire a connection, blocking up to `timeout`.
    ///
    /// Order of attempts: idle core connection (probed), then a fresh
    /// overflow connection if capacity allows, then wait for a release.
    pub fn acquire_timeout(&self, timeout: Duration) -> ReportResult<PooledConnection> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        loop {
            if state.closed {
                return Err(ReportError::Other(anyhow::anyhow!(
                    "connection pool is closed"
                )));
            }

            if let Some(conn) = state.idle.pop_front() {
                drop(state);
                return self.check_out_core(conn);
            }

            if state.overflow_count < self.inner.max_overflow {
                // Reserve the slot before opening so concurrent acquires
                // cannot overshoot max_overflow.
                state.overflow_count += 1;
                drop(state);
                match self.open_connection() {
                    Ok(conn) => {
                        let mut state = self.lock_state();
                        state.total_created += 1;
                        debug!(
                            "overflow connection created ({}/{})",
                            state.overflow_count, self.inner.max_overflow
                        );
                        drop(state);
                        return Ok(PooledConnection::checked_out(
                            self.inner.clone(),
                            conn,
                            Membership::Overflow,
                        ));
                    }
                    Err(e) => {
                        let mut state = self.lock_state();
                        state.overflow_count -= 1;
                        self.inner.available.notify_one();
                        drop(state);
                        return Err(e);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ReportError::PoolExhausted {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            warn!("connection pool saturated, waiting for a release");
            let (next, _) = self
                .inner
                .available
                .wait_timeout(state, deadline - now)
                .expect("pool state lock poisoned");
            state = next;
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            core_size: self.inner.core_size,
            idle_available: state.idle.len(),
            overflow_count: state.overflow_count,
            total_created: state.total_created,
        }
    }

    /// Close every idle connection and mark the pool closed. In-flight
    /// connections are closed when released, not forcibly.
    pub fn close_all(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        let drained: Vec<Connection> = state.idle.drain(..).collect();
        let overflow = state.overflow_count;
        self.inner.available.notify_all();
        drop(state);
        info!(
            "connection pool closed: {} idle dropped, {} overflow still in flight",
            drained.len(),
            overflow
        );
        drop(drained);
    }

    /// Probe an idle connection; replace it if the backend dropped it.
    fn check_out_core(&self, conn: Connection) -> ReportResult<PooledConnection> {
        if probe(&conn) {
            return Ok(PooledConnection::checked_out(
                self.inner.clone(),
                conn,
                Membership::Core,
            ));
        }
        warn!("idle connection failed liveness probe, replacing it");
        drop(conn);
        let fresh = self.open_connection()?;
        let mut state = self.lock_state();
        state.total_created += 1;
        drop(state);
        Ok(PooledConnection::checked_out(
            self.inner.clone(),
            fresh,
            Membership::Core,
        ))
    }

    fn open_connection(&self) -> ReportResult<Connection> {
        let conn = Connection::open(&self.inner.db_path)?;
        conn.execute_batch(&format!("PRAGMA cache_size={};", self.inner.cache_pages))?;
        Ok(conn)
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.inner.state.lock().expect("pool state lock poisoned")
    }
}

fn probe(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .is_ok()
}

/// RAII guard over a checked-out connection. Dropping it releases the
/// connection on every exit path, including panics and early returns.
pub struct PooledConnection {
    conn: Option<Connection>,
    membership: Membership,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("membership", &self.membership)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    fn checked_out(pool: Arc<PoolInner>, conn: Connection, membership: Membership) -> Self {
        Self {
            conn: Some(conn),
            membership,
            pool,
        }
    }

    /// Whether this handle came from overflow capacity (will be closed,
    /// not recycled, on release).
    pub fn is_overflow(&self) -> bool {
        self.membership == Membership::Overflow
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else { return };
        let mut state = self.pool.state.lock().expect("pool state lock poisoned");
        match self.membership {
            Membership::Overflow => {
                state.overflow_count = state.overflow_count.saturating_sub(1);
                self.pool.available.notify_one();
                drop(state);
                drop(conn);
            }
            Membership::Core => {
                if state.closed || state.idle.len() >= self.pool.core_size {
                    // Pool shut down, or the idle queue filled up in a
                    // race. Close instead of recycling.
                    drop(state);
                    drop(conn);
                } else {
                    state.idle.push_back(conn);
                    self.pool.available.notify_one();
                }
            }
        }
    }
}
