/// Command Execution Module
///
/// The write helper: runs one INSERT, UPDATE or DELETE, optionally commits
/// right after, and reports the affected row count.

use crate::core::db::connection::Session;
use crate::core::db::value::Params;
use crate::core::Result;
use crate::sql;
use tracing::debug;

/// A write statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    pub params: Params,
    /// Commit immediately after executing
    pub commit: bool,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        CommandRequest {
            command: command.into(),
            params: Params::default(),
            commit: true,
        }
    }

    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }

    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }
}

impl From<&str> for CommandRequest {
    fn from(command: &str) -> Self {
        CommandRequest::new(command)
    }
}

impl From<String> for CommandRequest {
    fn from(command: String) -> Self {
        CommandRequest::new(command)
    }
}

impl Session {
    /// Runs a write statement and returns the number of affected rows.
    ///
    /// The statement kind is checked before the connection is touched. With
    /// `commit` set the connection commits right after the statement;
    /// otherwise the change stays pending until a later commit, and is lost
    /// if the session disconnects first.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidCommand` when the statement is not an INSERT, UPDATE
    /// or DELETE; `DbError::Command` when the session is not connected or
    /// execution or commit fails.
    pub fn run(&mut self, request: impl Into<CommandRequest>) -> Result<u64> {
        let request = request.into();
        let kind = sql::check_write(&request.command, self.policy())?;

        let session_id = self.id();
        let connection = self.connection_mut()?;
        let affected = {
            let mut cursor = connection.cursor()?;
            cursor.execute(&request.command, &request.params)?;
            let affected = cursor.row_count();
            cursor.close();
            affected
        };
        if request.commit {
            connection.commit()?;
        }

        debug!(session = %session_id, %kind, affected, committed = request.commit, "Command executed");
        Ok(affected)
    }

    /// Commits pending work from earlier `run` calls made without commit.
    pub fn commit(&mut self) -> Result<()> {
        self.connection_mut()?.commit()?;
        Ok(())
    }
}
