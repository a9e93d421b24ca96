//! # Test Utilities Module
//!
//! Testing infrastructure for dbsession: a scripted in-process driver that
//! records every native call, plus assertion helpers for `DbError`.
//!
//! The fake driver lets tests check properties such as "a rejected
//! statement never reaches the connection" without a real database.

use crate::core::db::driver::{ConnectRequest, Driver, NativeConnection, NativeCursor};
use crate::core::db::value::{ColumnDescription, LargeObject, LobContent, NativeValue, Params, Value};
use crate::core::{DriverError, DriverResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One call made by a session into the fake driver.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    Connect {
        user: String,
        descriptor: String,
        options: BTreeMap<String, String>,
    },
    Cursor,
    Execute {
        sql: String,
        params: Params,
    },
    Fetch,
    CursorClose,
    Commit,
    Close,
}

/// A cell of a scripted result row.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCell {
    Value(Value),
    Lob(LobContent),
    /// A large object whose read fails with this message.
    BrokenLob(String),
}

impl From<Value> for FakeCell {
    fn from(v: Value) -> Self {
        FakeCell::Value(v)
    }
}

impl From<i64> for FakeCell {
    fn from(v: i64) -> Self {
        FakeCell::Value(Value::Integer(v))
    }
}

impl From<&str> for FakeCell {
    fn from(v: &str) -> Self {
        FakeCell::Value(Value::from(v))
    }
}

/// What the fake driver answers with.
#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FakeCell>>,
    pub row_count: u64,
    pub fail_connect: Option<String>,
    pub fail_execute: Option<String>,
    pub fail_commit: Option<String>,
    pub fail_close: Option<String>,
}

/// Scripted driver shared between a test and the environment under test.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    script: Arc<Mutex<FakeScript>>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query returns these columns and rows.
    pub fn with_rows(self, columns: &[&str], rows: Vec<Vec<FakeCell>>) -> Self {
        {
            let mut script = lock(&self.script);
            script.columns = columns.iter().map(|c| c.to_string()).collect();
            script.row_count = rows.len() as u64;
            script.rows = rows;
        }
        self
    }

    /// Every write reports this many affected rows.
    pub fn with_row_count(self, count: u64) -> Self {
        lock(&self.script).row_count = count;
        self
    }

    pub fn failing_connect(self, message: &str) -> Self {
        lock(&self.script).fail_connect = Some(message.to_string());
        self
    }

    pub fn failing_execute(self, message: &str) -> Self {
        lock(&self.script).fail_execute = Some(message.to_string());
        self
    }

    pub fn failing_commit(self, message: &str) -> Self {
        lock(&self.script).fail_commit = Some(message.to_string());
        self
    }

    pub fn failing_close(self, message: &str) -> Self {
        lock(&self.script).fail_close = Some(message.to_string());
        self
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Whether anything beyond connecting reached the driver.
    pub fn touched_connection(&self) -> bool {
        lock(&self.calls).iter().any(|c| !matches!(c, FakeCall::Connect { .. }))
    }

    fn record(&self, call: FakeCall) {
        lock(&self.calls).push(call);
    }

    fn script(&self) -> FakeScript {
        lock(&self.script).clone()
    }
}

impl Driver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    fn connect(&self, request: &ConnectRequest) -> DriverResult<Box<dyn NativeConnection>> {
        self.record(FakeCall::Connect {
            user: request.user.clone(),
            descriptor: request.descriptor.to_string(),
            options: request.options.clone(),
        });
        if let Some(msg) = self.script().fail_connect {
            return Err(DriverError::Native(msg));
        }
        Ok(Box::new(FakeConnection { driver: self.clone() }))
    }
}

struct FakeConnection {
    driver: FakeDriver,
}

impl NativeConnection for FakeConnection {
    fn cursor(&mut self) -> DriverResult<Box<dyn NativeCursor + '_>> {
        self.driver.record(FakeCall::Cursor);
        Ok(Box::new(FakeCursor {
            driver: self.driver.clone(),
            columns: Vec::new(),
            row_count: 0,
        }))
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.driver.record(FakeCall::Commit);
        match self.driver.script().fail_commit {
            Some(msg) => Err(DriverError::Native(msg)),
            None => Ok(()),
        }
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        self.driver.record(FakeCall::Close);
        match self.driver.script().fail_close {
            Some(msg) => Err(DriverError::Native(msg)),
            None => Ok(()),
        }
    }
}

struct FakeCursor {
    driver: FakeDriver,
    columns: Vec<ColumnDescription>,
    row_count: u64,
}

impl NativeCursor for FakeCursor {
    fn execute(&mut self, sql: &str, params: &Params) -> DriverResult<()> {
        self.driver.record(FakeCall::Execute {
            sql: sql.to_string(),
            params: params.clone(),
        });
        let script = self.driver.script();
        if let Some(msg) = script.fail_execute {
            return Err(DriverError::Native(msg));
        }
        self.columns = script.columns.iter().map(ColumnDescription::new).collect();
        self.row_count = script.row_count;
        Ok(())
    }

    fn description(&self) -> &[ColumnDescription] {
        &self.columns
    }

    fn fetch_all(&mut self) -> DriverResult<Vec<Vec<NativeValue>>> {
        self.driver.record(FakeCall::Fetch);
        let rows = self
            .driver
            .script()
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        FakeCell::Value(v) => NativeValue::Scalar(v),
                        FakeCell::Lob(content) => NativeValue::Lob(Box::new(FakeLob(Some(content)))),
                        FakeCell::BrokenLob(msg) => NativeValue::Lob(Box::new(BrokenLob(msg))),
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close(self: Box<Self>) {
        self.driver.record(FakeCall::CursorClose);
    }
}

#[derive(Debug)]
struct FakeLob(Option<LobContent>);

impl LargeObject for FakeLob {
    fn read_to_end(&mut self) -> DriverResult<LobContent> {
        self.0
            .take()
            .ok_or_else(|| DriverError::Native("large object already read".to_string()))
    }
}

#[derive(Debug)]
struct BrokenLob(String);

impl LargeObject for BrokenLob {
    fn read_to_end(&mut self) -> DriverResult<LobContent> {
        Err(DriverError::Native(self.0.clone()))
    }
}

/// Error testing utilities specific to DbError patterns
pub mod error_testing {
    use std::fmt::Display;

    /// Asserts that `result` failed with a message containing `fragment`.
    pub fn assert_error_mentions<T, E: Display>(result: &std::result::Result<T, E>, fragment: &str, context: &str) {
        match result {
            Ok(_) => panic!("Expected an error but got Ok in {}", context),
            Err(e) => {
                let error_str = e.to_string();
                assert!(
                    error_str.to_lowercase().contains(&fragment.to_lowercase()),
                    "Expected '{}' in error message '{}' context: {}",
                    fragment,
                    error_str,
                    context
                );
            }
        }
    }
}

/// Asserts that an expression failed with the given `DbError` variant.
#[macro_export]
macro_rules! assert_db_error {
    ($result:expr, $expected_type:ident, $context:expr) => {
        match $result {
            Err($crate::core::DbError::$expected_type { .. }) => {}
            Ok(_) => panic!("Expected {} error but got Ok in {}", stringify!($expected_type), $context),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($expected_type), other, $context),
        }
    };
}
