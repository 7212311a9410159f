//! The engine-owning worker thread and its client handle.
//!
//! The embedded engine is not safe for concurrent use, so exactly one
//! thread ever touches it. Every other thread talks to that thread
//! through an ordered command/response channel pair: a client-side
//! guard pairs each submitted statement with its own reply, and because
//! the worker visits commands strictly in submission order, the
//! observable behavior is that of a global mutex around the engine,
//! without the engine handle ever crossing a thread boundary.

use crate::error::{SqlError, SqlResult};
use crate::value::{Row, Value};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Reserved statement that tears down the engine and recreates it empty.
pub const RESET_SENTINEL: &str = "_reset_";

/// A reply from the worker: rows, or the engine's captured failure text.
type Reply = Result<Vec<Row>, String>;

/// Client-side channel state.
///
/// Held under one mutex so that a send and its matching receive form a
/// single critical section; this is what keeps replies paired 1:1 with
/// commands in submission order.
struct Channel {
    commands: Sender<String>,
    replies: Receiver<Reply>,
    /// Replies abandoned by timed-out callers, still in flight. They
    /// are drained before the next command goes out so the pairing
    /// invariant survives timeouts.
    stale: usize,
}

/// Handle to the engine-owning worker thread.
///
/// `submit` may be called concurrently from any number of threads; each
/// call blocks until its own result is available and never observes
/// another caller's result. The worker thread exits once every handle
/// has been dropped.
pub struct SqlExecutor {
    inner: Mutex<Channel>,
}

impl SqlExecutor {
    /// Spawns the worker thread with a fresh, empty in-memory engine.
    pub fn spawn() -> SqlResult<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<String>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        thread::Builder::new()
            .name("vulnsrv-sql".into())
            .spawn(move || worker_loop(&cmd_rx, &reply_tx))?;
        Ok(Self {
            inner: Mutex::new(Channel {
                commands: cmd_tx,
                replies: reply_rx,
                stale: 0,
            }),
        })
    }

    /// Executes one statement and blocks until its result is available.
    ///
    /// Engine failures (syntax errors, constraint violations) come back
    /// as [`SqlError::Execution`]; the executor itself stays up.
    pub fn submit(&self, sql: &str) -> SqlResult<Vec<Row>> {
        self.transact(sql, None)
    }

    /// Like [`submit`](Self::submit), but gives up after `timeout`.
    ///
    /// On timeout the abandoned reply is drained before the next
    /// command is issued, so a timed-out caller cannot desynchronize
    /// later callers from their results.
    pub fn submit_with_timeout(&self, sql: &str, timeout: Duration) -> SqlResult<Vec<Row>> {
        self.transact(sql, Some(timeout))
    }

    /// Discards the engine with all schema and data and recreates it.
    pub fn reset(&self) -> SqlResult<()> {
        self.submit(RESET_SENTINEL).map(|_| ())
    }

    fn transact(&self, sql: &str, timeout: Option<Duration>) -> SqlResult<Vec<Row>> {
        let mut chan = self.inner.lock();
        while chan.stale > 0 {
            chan.replies.recv().map_err(|_| SqlError::Disconnected)?;
            chan.stale -= 1;
        }
        chan.commands
            .send(sql.to_owned())
            .map_err(|_| SqlError::Disconnected)?;
        let reply = match timeout {
            None => chan.replies.recv().map_err(|_| SqlError::Disconnected)?,
            Some(timeout) => match chan.replies.recv_timeout(timeout) {
                Ok(reply) => reply,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(?timeout, "statement timed out, reply left in flight");
                    chan.stale += 1;
                    return Err(SqlError::Timeout { timeout });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(SqlError::Disconnected),
            },
        };
        reply.map_err(|message| SqlError::Execution { message })
    }
}

/// The worker loop. The outer loop creates a fresh engine, so no state
/// leaks across resets; the inner loop serves statements until a reset
/// sentinel arrives or every client handle is gone.
fn worker_loop(commands: &Receiver<String>, replies: &Sender<Reply>) {
    'engine: loop {
        // Inability to create the engine means the process cannot serve
        // anything at all; aborting here is the contract.
        let conn = Connection::open_in_memory().expect("in-memory sql engine must open");
        debug!("sql engine ready");
        loop {
            let sql = match commands.recv() {
                Ok(sql) => sql,
                Err(_) => break 'engine,
            };
            if sql == RESET_SENTINEL {
                debug!("sql engine reset");
                if replies.send(Ok(Vec::new())).is_err() {
                    break 'engine;
                }
                continue 'engine;
            }
            let reply = run_statement(&conn, &sql).map_err(|e| e.to_string());
            if let Err(ref message) = reply {
                debug!(%message, "statement failed");
            }
            if replies.send(reply).is_err() {
                break 'engine;
            }
        }
    }
    debug!("sql executor thread exiting");
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt.column_count();
    if columns == 0 {
        // DDL/DML produces no result columns.
        stmt.execute([])?;
        return Ok(Vec::new());
    }
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns);
        for idx in 0..columns {
            cells.push(Value::from(row.get_ref(idx)?));
        }
        out.push(cells);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// A statement slow enough that a millisecond timeout always fires.
    const SLOW_QUERY: &str = "WITH RECURSIVE c(x) AS \
        (SELECT 1 UNION ALL SELECT x+1 FROM c WHERE x < 2000000) \
        SELECT count(x) FROM c";

    #[test]
    fn select_scalar() {
        let exec = SqlExecutor::spawn().unwrap();
        let rows = exec.submit("SELECT 1").unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn ddl_dml_roundtrip() {
        let exec = SqlExecutor::spawn().unwrap();
        assert!(exec.submit("CREATE TABLE t (a TEXT, b INTEGER)").unwrap().is_empty());
        assert!(exec.submit("INSERT INTO t (a,b) VALUES('x', 3)").unwrap().is_empty());
        let rows = exec.submit("SELECT a, b FROM t").unwrap();
        assert_eq!(rows, vec![vec![Value::Text("x".into()), Value::Integer(3)]]);
    }

    #[test]
    fn execution_error_is_captured_and_engine_survives() {
        let exec = SqlExecutor::spawn().unwrap();
        let err = exec.submit("SELECT definitely not sql").unwrap_err();
        assert!(err.is_execution(), "unexpected error: {err:?}");
        // The failure did not tear down the executor.
        assert_eq!(exec.submit("SELECT 2").unwrap(), vec![vec![Value::Integer(2)]]);
    }

    #[test]
    fn reset_discards_all_state() {
        let exec = SqlExecutor::spawn().unwrap();
        exec.submit("CREATE TABLE t (a TEXT)").unwrap();
        exec.submit("INSERT INTO t (a) VALUES('kept?')").unwrap();
        exec.reset().unwrap();
        let err = exec.submit("SELECT a FROM t").unwrap_err();
        assert!(err.is_execution(), "table must be gone after reset");
    }

    #[test]
    fn concurrent_callers_receive_their_own_results() {
        let exec = Arc::new(SqlExecutor::spawn().unwrap());
        let handles: Vec<_> = (0..16i64)
            .map(|i| {
                let exec = Arc::clone(&exec);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let rows = exec.submit(&format!("SELECT {i}")).unwrap();
                        assert_eq!(rows, vec![vec![Value::Integer(i)]]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn timeout_does_not_desynchronize_replies() {
        let exec = SqlExecutor::spawn().unwrap();
        let err = exec
            .submit_with_timeout(SLOW_QUERY, Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, SqlError::Timeout { .. }), "got {err:?}");
        // The next caller still gets its own result, not the stale one.
        assert_eq!(exec.submit("SELECT 9").unwrap(), vec![vec![Value::Integer(9)]]);
    }
}
