//! The shared, mutable, per-run state container.

use crate::auth::{self, Secret, Session, SECRET_LEN};
use crate::config::Config;
use crate::error::CoreResult;
use parking_lot::Mutex;
use tracing::info;
use vulnsrv_dataset::Dataset;
use vulnsrv_sql::{Row, SqlExecutor};
use zeroize::Zeroizing;

/// The message logs kept by the container, one per demo category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLog {
    /// Messages posted through the CSRF demo form.
    Csrf,
    /// Messages reflected back by the reflected-XSS demo.
    ReflectedXss,
    /// Messages persisted by the stored-XSS demo.
    StoredXss,
}

/// Everything behind the container's single coarse guard.
///
/// Grouping the secret, the logs and the executor handle under one
/// mutex trades parallelism for the atomicity of [`VulnState::reset`]:
/// no reader can ever observe a fresh secret next to a stale dataset.
struct Inner {
    secret: Zeroizing<Secret>,
    csrf_messages: Vec<String>,
    reflected_xss_messages: Vec<String>,
    stored_xss_messages: Vec<String>,
    executor: SqlExecutor,
}

impl Inner {
    fn log(&self, log: MessageLog) -> &Vec<String> {
        match log {
            MessageLog::Csrf => &self.csrf_messages,
            MessageLog::ReflectedXss => &self.reflected_xss_messages,
            MessageLog::StoredXss => &self.stored_xss_messages,
        }
    }

    fn log_mut(&mut self, log: MessageLog) -> &mut Vec<String> {
        match log {
            MessageLog::Csrf => &mut self.csrf_messages,
            MessageLog::ReflectedXss => &mut self.reflected_xss_messages,
            MessageLog::StoredXss => &mut self.stored_xss_messages,
        }
    }
}

/// The shared-state container.
///
/// One instance is shared by every request-handling thread. All public
/// operations serialize on a single internal guard; database statements
/// are forwarded to the engine-owning worker thread of
/// [`vulnsrv_sql::SqlExecutor`] while that guard is held.
///
/// # Example
///
/// ```rust,ignore
/// let state = VulnState::with_default_dataset()?;
/// let rows = state.sql_query("SELECT id,msg FROM messages WHERE user='web'")?;
/// state.append_message(MessageLog::Csrf, "hello");
/// ```
pub struct VulnState {
    dataset: Dataset,
    config: Config,
    inner: Mutex<Inner>,
}

impl VulnState {
    /// Creates a container around `dataset` and performs the initial
    /// reset (fresh secret, empty logs, seeded engine).
    pub fn new(dataset: Dataset) -> CoreResult<Self> {
        Self::with_config(dataset, Config::default())
    }

    /// Creates a container with the built-in seed dataset.
    pub fn with_default_dataset() -> CoreResult<Self> {
        Self::new(Dataset::builtin())
    }

    /// Creates a container with an explicit configuration.
    pub fn with_config(dataset: Dataset, config: Config) -> CoreResult<Self> {
        let executor = SqlExecutor::spawn()?;
        let state = Self {
            dataset,
            config,
            inner: Mutex::new(Inner {
                secret: Zeroizing::new(auth::generate_secret()),
                csrf_messages: Vec::new(),
                reflected_xss_messages: Vec::new(),
                stored_xss_messages: Vec::new(),
                executor,
            }),
        };
        state.reset()?;
        Ok(state)
    }

    /// Appends one entry to a message log.
    pub fn append_message(&self, log: MessageLog, text: impl Into<String>) {
        self.inner.lock().log_mut(log).push(text.into());
    }

    /// Returns a snapshot copy of a message log, oldest first.
    ///
    /// Callers get a copy, never a view into live storage; display
    /// layers that want most-recent-first reverse it themselves.
    pub fn messages(&self, log: MessageLog) -> Vec<String> {
        self.inner.lock().log(log).clone()
    }

    /// Forwards one statement to the query executor.
    ///
    /// Blocks until the statement's own result is available (or until
    /// the configured submit timeout elapses, when one is set).
    pub fn sql_query(&self, sql: &str) -> CoreResult<Vec<Row>> {
        let inner = self.inner.lock();
        let rows = match self.config.submit_timeout {
            Some(timeout) => inner.executor.submit_with_timeout(sql, timeout)?,
            None => inner.executor.submit(sql)?,
        };
        Ok(rows)
    }

    /// Returns a copy of the current per-run secret.
    pub fn current_secret(&self) -> [u8; SECRET_LEN] {
        *self.inner.lock().secret
    }

    /// Issues a session token bound to the current secret.
    pub fn issue_token(&self, identity: &str, timestamp: u64) -> String {
        let secret = self.current_secret();
        auth::issue_token(&secret, identity, timestamp)
    }

    /// Verifies a session token against the current secret.
    pub fn verify_token(&self, token: &[u8]) -> Option<Session> {
        let secret = self.current_secret();
        auth::verify_token(&secret, token)
    }

    /// Reinitializes all per-run state as one atomic operation: a new
    /// secret, cleared logs, and the engine rebuilt from the dataset
    /// description.
    ///
    /// The guard is held for the whole operation, so concurrent resets
    /// serialize and no reader observes a half-reset state.
    ///
    /// # Errors
    ///
    /// A failure here leaves the container without a fully seeded
    /// engine. There is no safe way to keep serving; callers must treat
    /// the error as unrecoverable and shut down.
    pub fn reset(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        // Replaced wholesale, never mutated in place; the old secret is
        // zeroized on drop.
        inner.secret = Zeroizing::new(auth::generate_secret());
        inner.csrf_messages.clear();
        inner.reflected_xss_messages.clear();
        inner.stored_xss_messages.clear();
        // Reset and reseeding ignore the submit timeout: a partial
        // rebuild is fatal anyway, so these always block to completion.
        inner.executor.reset()?;
        for statement in self.dataset.rebuild_statements()? {
            inner.executor.submit(&statement)?;
        }
        info!("state reset: new secret, cleared logs, reseeded dataset");
        Ok(())
    }
}
