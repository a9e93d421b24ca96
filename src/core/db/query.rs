/// Query Execution Module
///
/// The read helper: runs a SELECT, projects each row into a `ResultRow`
/// keyed by lower-cased column name, reads large objects to completion and
/// unwraps single-row results on request.

use crate::core::db::connection::Session;
use crate::core::db::driver::NativeConnection;
use crate::core::db::value::{LargeObject, NativeValue, Params, ResultRow};
use crate::core::{DriverResult, Result};
use crate::sql;
use serde::Serialize;
use tracing::debug;

/// A read statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub command: String,
    pub params: Params,
    /// Return a lone row by itself instead of a one-element list
    pub extract_one: bool,
}

impl QueryRequest {
    pub fn new(command: impl Into<String>) -> Self {
        QueryRequest {
            command: command.into(),
            params: Params::default(),
            extract_one: true,
        }
    }

    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }

    pub fn extract_one(mut self, extract_one: bool) -> Self {
        self.extract_one = extract_one;
        self
    }
}

impl From<&str> for QueryRequest {
    fn from(command: &str) -> Self {
        QueryRequest::new(command)
    }
}

impl From<String> for QueryRequest {
    fn from(command: String) -> Self {
        QueryRequest::new(command)
    }
}

/// Result of the read helper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Exactly one row, unwrapped
    One(ResultRow),
    /// Any other number of rows, or one row with unwrapping disabled
    Many(Vec<ResultRow>),
}

impl QueryOutput {
    /// Wraps fetched rows, unwrapping a single row when asked to.
    pub fn from_rows(mut rows: Vec<ResultRow>, extract_one: bool) -> Self {
        if extract_one && rows.len() == 1 {
            QueryOutput::One(rows.remove(0))
        } else {
            QueryOutput::Many(rows)
        }
    }

    pub fn one(&self) -> Option<&ResultRow> {
        match self {
            QueryOutput::One(row) => Some(row),
            QueryOutput::Many(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        match self {
            QueryOutput::One(row) => vec![row],
            QueryOutput::Many(rows) => rows,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryOutput::One(_) => 1,
            QueryOutput::Many(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs read statements on one connection
pub struct QueryExecutor<'a> {
    connection: &'a mut dyn NativeConnection,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(connection: &'a mut dyn NativeConnection) -> Self {
        QueryExecutor { connection }
    }

    /// Executes `sql` and returns every row as a `ResultRow`.
    ///
    /// The cursor is released before large objects are read.
    pub fn fetch(&mut self, sql: &str, params: &Params) -> DriverResult<Vec<ResultRow>> {
        let mut cursor = self.connection.cursor()?;
        cursor.execute(sql, params)?;
        let columns: Vec<String> = cursor.description().iter().map(|c| c.name.to_lowercase()).collect();
        let raw_rows = cursor.fetch_all()?;
        cursor.close();

        raw_rows.into_iter().map(|values| project_row(&columns, values)).collect()
    }
}

fn project_row(columns: &[String], values: Vec<NativeValue>) -> DriverResult<ResultRow> {
    let mut row = ResultRow::new();
    for (name, value) in columns.iter().zip(values) {
        if let NativeValue::Lob(lob) = &value {
            debug!(column = %name, size = ?lob.size(), "Reading large object");
        }
        row.insert(name.as_str(), value.materialize()?);
    }
    Ok(row)
}

impl Session {
    /// Runs a read statement.
    ///
    /// The statement is checked against the session's statement policy
    /// before the connection is touched. Column names in the returned rows
    /// are lower-cased and large objects are read in full.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidCommand` for a statement that is not a query;
    /// `DbError::Command` when the session is not connected or the driver
    /// fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use dbsession::{Environment, Session, SqliteDriver, QueryRequest, Params};
    /// # let env = Environment::init(SqliteDriver::in_memory());
    /// # let mut session = Session::open(&env, "oracle://u:p@localhost/demo", true)?;
    /// let rows = session.get(
    ///     QueryRequest::new("SELECT ID, NAME FROM T WHERE ID > :1")
    ///         .params(Params::positional([10]))
    ///         .extract_one(false),
    /// )?;
    /// # Ok::<(), dbsession::DbError>(())
    /// ```
    pub fn get(&mut self, request: impl Into<QueryRequest>) -> Result<QueryOutput> {
        let request = request.into();
        sql::check_query(&request.command, self.policy())?;

        let session_id = self.id();
        let rows = QueryExecutor::new(self.connection_mut()?).fetch(&request.command, &request.params)?;
        debug!(session = %session_id, rows = rows.len(), "Query executed");

        Ok(QueryOutput::from_rows(rows, request.extract_one))
    }

    /// Runs a fixed, trusted query without statement checks.
    pub(crate) fn fetch_unchecked(&mut self, sql: &str) -> Result<Vec<ResultRow>> {
        Ok(QueryExecutor::new(self.connection_mut()?).fetch(sql, &Params::none())?)
    }
}
