/// SQLite Driver
///
/// The native driver used by the binary and the integration tests, built on
/// rusqlite. The service name of the descriptor selects a database file
/// under the driver's data directory (or a private in-memory database when
/// no directory is configured). Host, port and credentials address nothing
/// in SQLite and are only logged.

use crate::core::db::driver::{ConnectRequest, Driver, NativeConnection, NativeCursor};
use crate::core::db::value::{ColumnDescription, LargeObject, LobContent, NativeValue, Params, Value};
use crate::core::{DriverError, DriverResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Journal modes accepted by the `journal_mode` connect option.
const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Opens SQLite databases named by the descriptor's service.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    data_dir: Option<PathBuf>,
}

impl SqliteDriver {
    /// Every connection gets its own private in-memory database.
    pub fn in_memory() -> Self {
        SqliteDriver { data_dir: None }
    }

    /// Connections open `<dir>/<service>.db`, creating it on first use.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        SqliteDriver {
            data_dir: Some(dir.into()),
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// File backing a service, or `None` for in-memory operation.
    pub fn database_path(&self, service: &str) -> DriverResult<Option<PathBuf>> {
        if service.is_empty() || service.contains(['/', '\\']) || service.starts_with('.') {
            return Err(DriverError::Unsupported(format!(
                "service name `{}` cannot be mapped to a database file",
                service
            )));
        }
        Ok(self.data_dir.as_ref().map(|dir| dir.join(format!("{}.db", service))))
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, request: &ConnectRequest) -> DriverResult<Box<dyn NativeConnection>> {
        let conn = match self.database_path(&request.descriptor.service)? {
            Some(path) => {
                debug!(path = %path.display(), host = %request.descriptor.host, "Opening SQLite database file");
                Connection::open(path)?
            }
            None => {
                debug!(service = %request.descriptor.service, "Opening in-memory SQLite database");
                Connection::open_in_memory()?
            }
        };

        for (key, value) in &request.options {
            apply_option(&conn, key, value)?;
        }
        install_instance_view(&conn)?;

        Ok(Box::new(SqliteConnection { conn }))
    }
}

fn apply_option(conn: &Connection, key: &str, value: &str) -> DriverResult<()> {
    match key {
        "busy_timeout" => {
            let ms: u64 = value
                .parse()
                .map_err(|_| DriverError::Unsupported(format!("busy_timeout must be milliseconds, got `{}`", value)))?;
            conn.busy_timeout(Duration::from_millis(ms))?;
        }
        "foreign_keys" => {
            let enabled = match value.to_ascii_lowercase().as_str() {
                "1" | "on" | "true" | "yes" => true,
                "0" | "off" | "false" | "no" => false,
                _ => {
                    return Err(DriverError::Unsupported(format!(
                        "foreign_keys must be on or off, got `{}`",
                        value
                    )))
                }
            };
            conn.pragma_update(None, "foreign_keys", enabled)?;
        }
        "journal_mode" => {
            let mode = value.to_ascii_uppercase();
            if !JOURNAL_MODES.contains(&mode.as_str()) {
                return Err(DriverError::Unsupported(format!("unknown journal_mode `{}`", value)));
            }
            conn.pragma_update_and_check(None, "journal_mode", &mode, |row| row.get::<_, String>(0))?;
        }
        other => {
            return Err(DriverError::Unsupported(format!("unknown connect option `{}`", other)));
        }
    }
    debug!(option = key, value, "Applied connect option");
    Ok(())
}

/// Exposes `V$INSTANCE` so the instance diagnostic query has something to read.
fn install_instance_view(conn: &Connection) -> DriverResult<()> {
    let started_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
    conn.execute_batch(&format!(
        "CREATE TEMP VIEW IF NOT EXISTS \"V$INSTANCE\" AS
         SELECT sqlite_version() AS VERSION,
                '{}' AS STARTUP_TIME,
                'NO' AS PARALLEL,
                'NO' AS BLOCKED",
        started_at
    ))?;
    Ok(())
}

struct SqliteConnection {
    conn: Connection,
}

impl NativeConnection for SqliteConnection {
    fn cursor(&mut self) -> DriverResult<Box<dyn NativeCursor + '_>> {
        Ok(Box::new(SqliteCursor {
            conn: &self.conn,
            columns: Vec::new(),
            pending: Vec::new(),
            row_count: 0,
        }))
    }

    fn commit(&mut self) -> DriverResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        // sqlite3_close rolls back an open transaction
        self.conn.close().map_err(|(_, e)| DriverError::Sqlite(e))
    }
}

struct SqliteCursor<'c> {
    conn: &'c Connection,
    columns: Vec<ColumnDescription>,
    pending: Vec<Vec<NativeValue>>,
    row_count: u64,
}

impl NativeCursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &Params) -> DriverResult<()> {
        let mut stmt = self.conn.prepare(sql)?;
        bind_params(&mut stmt, params)?;

        // Writes join an implicit transaction that lasts until commit or close
        let began = !stmt.readonly() && self.conn.is_autocommit();
        if began {
            self.conn.execute_batch("BEGIN")?;
        }

        self.columns = stmt.column_names().into_iter().map(ColumnDescription::new).collect();
        match step_statement(&mut stmt) {
            Ok((row_count, rows)) => {
                self.row_count = row_count;
                self.pending = rows;
                Ok(())
            }
            Err(e) => {
                drop(stmt);
                // A failed statement releases the transaction it opened; earlier pending work stays
                if began && !self.conn.is_autocommit() {
                    if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                        warn!(error = %rollback_err, "Rollback after failed statement did not complete");
                    }
                }
                Err(e)
            }
        }
    }

    fn description(&self) -> &[ColumnDescription] {
        &self.columns
    }

    fn fetch_all(&mut self) -> DriverResult<Vec<Vec<NativeValue>>> {
        Ok(std::mem::take(&mut self.pending))
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn close(self: Box<Self>) {}
}

/// Runs a bound statement, returning the affected or fetched row count and any rows.
fn step_statement(stmt: &mut Statement<'_>) -> DriverResult<(u64, Vec<Vec<NativeValue>>)> {
    let column_count = stmt.column_count();
    if column_count == 0 {
        let affected = stmt.raw_execute()? as u64;
        return Ok((affected, Vec::new()));
    }

    let mut rows = stmt.raw_query();
    let mut fetched = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(native_value(row.get_ref(i)?));
        }
        fetched.push(values);
    }
    Ok((fetched.len() as u64, fetched))
}

fn bind_params(stmt: &mut Statement<'_>, params: &Params) -> DriverResult<()> {
    let expected = stmt.parameter_count();
    match params {
        Params::Positional(values) => {
            if values.len() != expected {
                return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected).into());
            }
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, to_sql(value))?;
            }
        }
        Params::Named(named) => {
            if named.len() != expected {
                return Err(rusqlite::Error::InvalidParameterCount(named.len(), expected).into());
            }
            for (name, value) in named {
                let placeholder = format!(":{}", name);
                let index = stmt
                    .parameter_index(&placeholder)?
                    .ok_or(rusqlite::Error::InvalidParameterName(placeholder))?;
                stmt.raw_bind_parameter(index, to_sql(value))?;
            }
        }
    }
    Ok(())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
    }
}

fn native_value(value: ValueRef<'_>) -> NativeValue {
    match value {
        ValueRef::Null => Value::Null.into(),
        ValueRef::Integer(i) => Value::Integer(i).into(),
        ValueRef::Real(r) => Value::Real(r).into(),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(text) => Value::Text(text.to_string()).into(),
            // Not valid UTF-8: hand back the stored bytes unchanged
            Err(_) => Value::Bytes(t.to_vec()).into(),
        },
        ValueRef::Blob(b) => NativeValue::Lob(Box::new(SqliteBlob::new(b.to_vec()))),
    }
}

/// BLOB column value, handed out as a large object to be read on demand.
#[derive(Debug)]
pub struct SqliteBlob {
    reader: Cursor<Vec<u8>>,
}

impl SqliteBlob {
    pub fn new(data: Vec<u8>) -> Self {
        SqliteBlob {
            reader: Cursor::new(data),
        }
    }
}

impl LargeObject for SqliteBlob {
    fn size(&self) -> Option<u64> {
        Some(self.reader.get_ref().len() as u64)
    }

    fn read_to_end(&mut self) -> DriverResult<LobContent> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;
        Ok(LobContent::Binary(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connection_string::ConnectionConfig;

    fn request(url: &str) -> ConnectRequest {
        ConnectRequest::from_config(&ConnectionConfig::parse(url).unwrap())
    }

    #[test]
    fn test_in_memory_select() {
        let driver = SqliteDriver::in_memory();
        let mut conn = driver.connect(&request("oracle://u:p@localhost/demo")).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor.execute("SELECT 1 AS X, 'a' AS Name", &Params::none()).unwrap();

        let names: Vec<_> = cursor.description().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["X", "Name"]);

        let rows = cursor.fetch_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(cursor.row_count(), 1);
    }

    #[test]
    fn test_instance_view_is_available() {
        let driver = SqliteDriver::in_memory();
        let mut conn = driver.connect(&request("oracle://u:p@localhost/demo")).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor
            .execute("SELECT VERSION, PARALLEL, BLOCKED FROM V$INSTANCE", &Params::none())
            .unwrap();
        let mut rows = cursor.fetch_all().unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows.remove(0);
        let values: Vec<Value> = row.into_iter().map(|v| v.materialize().unwrap()).collect();
        assert_eq!(values[0], Value::Text(rusqlite::version().to_string()));
        assert_eq!(values[1], Value::Text("NO".to_string()));
    }

    #[test]
    fn test_blob_is_large_object() {
        let driver = SqliteDriver::in_memory();
        let mut conn = driver.connect(&request("oracle://u:p@localhost/demo")).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor.execute("SELECT x'DEADBEEF' AS data", &Params::none()).unwrap();
        let mut rows = cursor.fetch_all().unwrap();
        let value = rows.remove(0).remove(0);
        match &value {
            NativeValue::Lob(lob) => assert_eq!(lob.size(), Some(4)),
            other => panic!("expected a large object, got {:?}", other),
        }
        assert_eq!(value.materialize().unwrap(), Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_invalid_utf8_text_is_returned_as_bytes() {
        let driver = SqliteDriver::in_memory();
        let mut conn = driver.connect(&request("oracle://u:p@localhost/demo")).unwrap();
        let mut cursor = conn.cursor().unwrap();
        cursor
            .execute("SELECT CAST(x'FFFE41' AS TEXT) AS raw, 'ok' AS fine", &Params::none())
            .unwrap();
        let mut row = cursor.fetch_all().unwrap().remove(0);
        let fine = row.pop().unwrap().materialize().unwrap();
        let raw = row.pop().unwrap().materialize().unwrap();
        assert_eq!(raw, Value::Bytes(vec![0xFF, 0xFE, 0x41]));
        assert_eq!(fine, Value::Text("ok".to_string()));
    }

    #[test]
    fn test_parameter_binding() {
        let driver = SqliteDriver::in_memory();
        let mut conn = driver.connect(&request("oracle://u:p@localhost/demo")).unwrap();
        let mut cursor = conn.cursor().unwrap();

        cursor
            .execute("SELECT :1 + :2 AS total", &Params::positional([2, 3]))
            .unwrap();
        let value = cursor.fetch_all().unwrap().remove(0).remove(0).materialize().unwrap();
        assert_eq!(value, Value::Integer(5));

        cursor
            .execute("SELECT :name AS n", &Params::named().with("name", "kim"))
            .unwrap();
        let value = cursor.fetch_all().unwrap().remove(0).remove(0).materialize().unwrap();
        assert_eq!(value, Value::Text("kim".to_string()));

        let err = cursor.execute("SELECT :1 AS n", &Params::none()).unwrap_err();
        assert!(matches!(err, DriverError::Sqlite(rusqlite::Error::InvalidParameterCount(0, 1))));
    }

    #[test]
    fn test_connect_options() {
        let driver = SqliteDriver::in_memory();
        assert!(driver
            .connect(&request("oracle://u:p@localhost/demo?busy_timeout=250&foreign_keys=on"))
            .is_ok());

        match driver.connect(&request("oracle://u:p@localhost/demo?encoding=UTF-8")) {
            Err(DriverError::Unsupported(msg)) => assert!(msg.contains("encoding")),
            other => panic!("Expected Unsupported, got {:?}", other.map(|_| ())),
        }
        assert!(driver
            .connect(&request("oracle://u:p@localhost/demo?busy_timeout=soon"))
            .is_err());
    }

    #[test]
    fn test_database_path_mapping() {
        let driver = SqliteDriver::with_data_dir("/data");
        assert_eq!(
            driver.database_path("orders").unwrap(),
            Some(PathBuf::from("/data/orders.db"))
        );
        assert!(driver.database_path("../etc").is_err());
        assert!(driver.database_path("a/b").is_err());
        assert_eq!(SqliteDriver::in_memory().database_path("x").unwrap(), None);
    }
}
