//! Per-connection session state.
//!
//! A session lives for the whole client connection and is shared by every
//! statement [`Context`] created for it. All mutable state sits behind a
//! single read/write lock so concurrent statements of one connection can read
//! variables while another appends a warning.

pub mod variables;

use crate::context::Context;
use crate::core::{DataType, Result, Value};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

pub use variables::{
    AUTOCOMMIT_SESSION_VAR, CURRENT_DB_SESSION_VAR, FOUND_ROWS, LAST_INSERT_ID, ROW_COUNT,
    default_session_config, default_session_value, tmpdir_session_var,
};

/// Session user information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Client {
    pub user: String,
    pub address: String,
}

/// A value along with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub data_type: DataType,
    pub value: Value,
}

impl TypedValue {
    pub fn new(data_type: DataType, value: Value) -> Self {
        Self { data_type, value }
    }

    pub fn null() -> Self {
        Self::new(DataType::Null, Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLevel {
    Note,
    Warning,
    Error,
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "Note"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// A MySQL-style warning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    pub message: String,
    pub code: u32,
}

impl Warning {
    pub fn new(level: WarningLevel, code: u32, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            code,
        }
    }
}

pub trait Session: Send + Sync {
    /// Unique id of the connection.
    fn id(&self) -> u32;

    /// Address of the server.
    fn address(&self) -> &str;

    fn client(&self) -> &Client;

    fn set(&self, key: &str, data_type: DataType, value: Value) -> Result<()>;

    /// Returns a NULL-typed value when `key` is unset.
    fn get(&self, key: &str) -> TypedValue;

    /// Point-in-time copy of every session variable.
    fn get_all(&self) -> HashMap<String, TypedValue>;

    fn current_database(&self) -> String;

    fn set_current_database(&self, db_name: &str);

    /// Commits the open transaction against `db_name`. The base session has
    /// no transactions, so this does nothing.
    fn commit_transaction(&self, _ctx: &Context, _db_name: &str) -> Result<()> {
        Ok(())
    }

    fn warn(&self, warning: Warning);

    /// Copy of the warnings, most recent first.
    fn warnings(&self) -> Vec<Warning>;

    fn clear_warnings(&self);

    fn warning_count(&self) -> u16;

    /// Records a named lock held by this session, to be released when it terminates.
    fn add_lock(&self, lock_name: &str) -> Result<()>;

    fn del_lock(&self, lock_name: &str) -> Result<()>;

    /// Visits every held lock; stops at and returns the first callback error.
    fn iter_locks(&self, cb: &mut dyn FnMut(&str) -> Result<()>) -> Result<()>;

    /// Database a query runs against when it differs from the current one.
    fn queried_database(&self) -> String;

    fn set_queried_database(&self, db_name: &str);

    fn set_last_query_info(&self, key: &str, value: i64);

    fn last_query_info(&self, key: &str) -> i64;
}

struct SessionState {
    config: HashMap<String, TypedValue>,
    warnings: Vec<Warning>,
    /// Warnings acknowledged by the last `clear_warnings` call.
    warncnt: u16,
    locks: HashSet<String>,
    current_db: String,
    queried_db: String,
    last_query_info: HashMap<String, i64>,
}

/// Session id 0 is never handed out.
static AUTO_SESSION_IDS: AtomicU32 = AtomicU32::new(1);

pub fn next_session_id() -> u32 {
    AUTO_SESSION_IDS.fetch_add(1, Ordering::Relaxed)
}

/// The basic session type.
pub struct BaseSession {
    id: u32,
    addr: String,
    client: Client,
    state: RwLock<SessionState>,
}

impl BaseSession {
    /// Creates a session for a client connection.
    pub fn new(server: &str, client_addr: &str, user: &str, id: u32) -> Self {
        Self {
            id,
            addr: server.to_string(),
            client: Client {
                user: user.to_string(),
                address: client_addr.to_string(),
            },
            state: RwLock::new(SessionState {
                config: default_session_config(),
                warnings: Vec::new(),
                warncnt: 0,
                locks: HashSet::new(),
                current_db: String::new(),
                queried_db: String::new(),
                last_query_info: variables::default_last_query_info(),
            }),
        }
    }

    /// Creates an anonymous session with an automatically assigned id.
    pub fn empty() -> Self {
        Self::new("", "", "", next_session_id())
    }
}

impl Default for BaseSession {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for BaseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSession")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Session for BaseSession {
    fn id(&self) -> u32 {
        self.id
    }

    fn address(&self) -> &str {
        &self.addr
    }

    fn client(&self) -> &Client {
        &self.client
    }

    fn set(&self, key: &str, data_type: DataType, value: Value) -> Result<()> {
        let mut state = self.state.write();
        state.config.insert(key.to_string(), TypedValue::new(data_type, value));
        Ok(())
    }

    fn get(&self, key: &str) -> TypedValue {
        self.state
            .read()
            .config
            .get(key)
            .cloned()
            .unwrap_or_else(TypedValue::null)
    }

    fn get_all(&self) -> HashMap<String, TypedValue> {
        self.state.read().config.clone()
    }

    fn current_database(&self) -> String {
        self.state.read().current_db.clone()
    }

    fn set_current_database(&self, db_name: &str) {
        self.state.write().current_db = db_name.to_string();
    }

    fn warn(&self, warning: Warning) {
        self.state.write().warnings.push(warning);
    }

    fn warnings(&self) -> Vec<Warning> {
        self.state.read().warnings.iter().rev().cloned().collect()
    }

    fn clear_warnings(&self) {
        let mut state = self.state.write();

        // Only drop warnings that were visible at the previous clear; anything
        // appended since then survives until the next one.
        let cnt = state.warnings.len() as u16;
        if state.warncnt == cnt {
            state.warnings.clear();
            state.warncnt = 0;
        } else {
            state.warncnt = cnt;
        }
    }

    fn warning_count(&self) -> u16 {
        self.state.read().warnings.len() as u16
    }

    fn add_lock(&self, lock_name: &str) -> Result<()> {
        self.state.write().locks.insert(lock_name.to_string());
        Ok(())
    }

    fn del_lock(&self, lock_name: &str) -> Result<()> {
        self.state.write().locks.remove(lock_name);
        Ok(())
    }

    fn iter_locks(&self, cb: &mut dyn FnMut(&str) -> Result<()>) -> Result<()> {
        let state = self.state.read();
        for name in &state.locks {
            cb(name)?;
        }
        Ok(())
    }

    fn queried_database(&self) -> String {
        self.state.read().queried_db.clone()
    }

    fn set_queried_database(&self, db_name: &str) {
        self.state.write().queried_db = db_name.to_string();
    }

    fn set_last_query_info(&self, key: &str, value: i64) {
        self.state.write().last_query_info.insert(key.to_string(), value);
    }

    fn last_query_info(&self, key: &str) -> i64 {
        self.state
            .read()
            .last_query_info
            .get(key)
            .copied()
            .unwrap_or_default()
    }
}

/// Reports whether `key` still holds its catalog default, along with the current value.
pub fn has_default_value(session: &dyn Session, key: &str) -> (bool, Value) {
    let current = session.get(key);
    match default_session_value(key) {
        Some(default) => (*default == current, current.value),
        None => (false, current.value),
    }
}
