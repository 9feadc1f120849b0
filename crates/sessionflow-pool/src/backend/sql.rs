//! The embedded SQL pool: a two-level thread-affine pool, grounded in
//! `SQLiteConnectionPool`'s outer `thread_id -> Queue` structure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::error::PoolError;
use crate::options::SqlOptions;

struct IdleConnection {
    conn: Connection,
    idle_deadline: Instant,
}

struct ThreadShard {
    idle: Vec<IdleConnection>,
    created: u32,
}

struct Inner {
    shards: Mutex<HashMap<ThreadId, ThreadShard>>,
    waiters: Condvar,
}

/// A SQLite connection checked out of a [`SqlPool`]; returns itself to the
/// owning thread's shard on drop.
///
/// An acquired connection MUST only be used by the thread that acquired it
/// (P5) — enforced structurally here because [`SqlPool::acquire`] always
/// hands the connection back to `std::thread::current().id()`'s shard.
pub struct PooledConnection<'a> {
    pool: &'a SqlPool,
    conn: Option<Connection>,
    recycle: bool,
}

impl<'a> std::ops::Deref for PooledConnection<'a> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken exactly once")
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.recycle);
        }
    }
}

impl<'a> PooledConnection<'a> {
    /// Marks this connection for immediate close instead of recycling it
    /// back into the pool (used when the connection's transaction failed).
    pub fn discard(&mut self) {
        self.recycle = false;
    }
}

/// Per-process, per-(db path) pool of SQLite connections, one idle queue per
/// thread.
pub struct SqlPool {
    options: SqlOptions,
    inner: Inner,
    closed: AtomicBool,
    refcount: Arc<()>,
}

impl SqlPool {
    pub fn new(options: SqlOptions) -> Self {
        SqlPool {
            options,
            inner: Inner {
                shards: Mutex::new(HashMap::new()),
                waiters: Condvar::new(),
            },
            closed: AtomicBool::new(false),
            refcount: Arc::new(()),
        }
    }

    pub fn options(&self) -> &SqlOptions {
        &self.options
    }

    /// Number of live handles sharing this pool (mirrors
    /// [`crate::backend::kv::KvPool::referent_count`]); when it drops back
    /// to one (just this `SqlPool`'s own copy), the registry may tear the
    /// pool down.
    pub fn referent_count(&self) -> usize {
        Arc::strong_count(&self.refcount)
    }

    pub fn clone_handle(&self) -> Arc<()> {
        Arc::clone(&self.refcount)
    }

    /// Acquires a connection owned by the current thread, waiting up to
    /// `timeout` if the shard is at `max_connections` and all are busy.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection<'_>, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let thread_id = std::thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut shards = self.inner.shards.lock().unwrap();

        loop {
            let shard = shards.entry(thread_id).or_insert_with(|| ThreadShard {
                idle: Vec::new(),
                created: 0,
            });

            if let Some(idle) = shard.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(idle.conn),
                    recycle: true,
                });
            }

            if shard.created < self.options.max_connections {
                shard.created += 1;
                let conn = Connection::open(&self.options.db_path).map_err(PoolError::Sqlite)?;
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                    recycle: true,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::Exhausted { pool: "sql" });
            }
            let (guard, timeout_result) = self
                .inner
                .waiters
                .wait_timeout(shards, deadline - now)
                .unwrap();
            shards = guard;
            if timeout_result.timed_out() {
                return Err(PoolError::Exhausted { pool: "sql" });
            }
        }
    }

    fn release(&self, conn: Connection, recycle: bool) {
        let thread_id = std::thread::current().id();
        let mut shards = self.inner.shards.lock().unwrap();
        let shard = shards.entry(thread_id).or_insert_with(|| ThreadShard {
            idle: Vec::new(),
            created: 0,
        });

        if recycle && !self.closed.load(Ordering::SeqCst) {
            shard.idle.push(IdleConnection {
                conn,
                idle_deadline: Instant::now() + self.options.idle_timeout,
            });
        } else {
            shard.created = shard.created.saturating_sub(1);
        }
        self.inner.waiters.notify_one();
        self.reap_idle(&mut shards);
    }

    fn reap_idle(&self, shards: &mut HashMap<ThreadId, ThreadShard>) {
        let now = Instant::now();
        for shard in shards.values_mut() {
            let before = shard.idle.len();
            shard.idle.retain(|c| c.idle_deadline > now);
            shard.created = shard
                .created
                .saturating_sub((before - shard.idle.len()) as u32);
        }
    }

    /// Closes every idle connection belonging to the current thread.
    /// Per Q5, this and a concurrent `release(recycle=false)` both check
    /// `closed` so the combination can't double-close a shard.
    pub fn close_current_pool(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let thread_id = std::thread::current().id();
        let mut shards = self.inner.shards.lock().unwrap();
        shards.remove(&thread_id);
    }

    /// Drains every thread's shard. Called at process exit / session close.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.shards.lock().unwrap().clear();
        self.inner.waiters.notify_all();
    }
}
