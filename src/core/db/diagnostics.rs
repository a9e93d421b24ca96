/// Instance Diagnostics Module
///
/// `Session::info` reports whether the session is connected and, when it
/// is, what the instance metadata view says about version, start time and
/// state. It never fails: a failing diagnostic query degrades the report.

use crate::core::db::connection::Session;
use crate::core::db::value::{ResultRow, Value};
use serde::Serialize;
use tracing::warn;

/// The fixed diagnostic query against the instance metadata view.
pub const INSTANCE_QUERY: &str =
    "SELECT VERSION, STARTUP_TIME AS STARTED_AT, PARALLEL, BLOCKED FROM V$INSTANCE";

/// Connectivity and instance state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub connected: bool,
    /// Connect descriptor of the session
    pub tns: String,
    pub user: String,
    pub version: String,
    pub started_at: Option<Value>,
    pub parallel: bool,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceInfo {
    /// Report for a session without a usable connection.
    pub fn disconnected(session: &Session) -> Self {
        InstanceInfo {
            connected: false,
            tns: session.descriptor().to_string(),
            user: session.user().to_string(),
            version: String::new(),
            started_at: None,
            parallel: false,
            blocked: false,
            error: None,
        }
    }

    fn from_row(session: &Session, row: &ResultRow) -> Self {
        let version = match row.get("version") {
            None | Some(Value::Null) => String::new(),
            Some(v) => v.to_string(),
        };
        let started_at = row.get("started_at").filter(|v| !v.is_null()).cloned();

        InstanceInfo {
            connected: true,
            tns: session.descriptor().to_string(),
            user: session.user().to_string(),
            version,
            started_at,
            parallel: is_yes(row.get("parallel")),
            blocked: is_yes(row.get("blocked")),
            error: None,
        }
    }
}

fn is_yes(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Text(s)) if s == "YES")
}

impl Session {
    /// Reports connectivity and instance state.
    ///
    /// An unconnected or closed session yields the disconnected report. If
    /// the diagnostic query fails, the disconnected report is returned with
    /// the error attached.
    pub fn info(&mut self) -> InstanceInfo {
        if !self.is_connected() {
            return InstanceInfo::disconnected(self);
        }

        match self.fetch_unchecked(INSTANCE_QUERY) {
            Ok(rows) => match rows.first() {
                Some(row) => InstanceInfo::from_row(self, row),
                None => self.degraded("instance metadata view returned no rows".to_string()),
            },
            Err(e) => self.degraded(e.to_string()),
        }
    }

    fn degraded(&self, error: String) -> InstanceInfo {
        warn!(session = %self.id(), error = %error, "Instance diagnostics unavailable");
        InstanceInfo {
            error: Some(error),
            ..InstanceInfo::disconnected(self)
        }
    }
}
