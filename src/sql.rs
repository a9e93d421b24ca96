//! Statement Classification
//!
//! Decides whether a SQL text may be passed to the read helper (`get`) or
//! the write helper (`run`). Nothing here touches a connection.
//!
//! The default `Permissive` policy keeps the historical heuristics: a read
//! is anything whose text contains `select` in any case, a write is
//! anything whose first whitespace-delimited word is `insert`, `update`
//! or `delete`. `Strict` parses the statement instead.

use crate::core::{DbError, Result};
use serde::Deserialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// How statements are checked before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementPolicy {
    #[default]
    Permissive,
    Strict,
}

/// The kind of write a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Case-insensitive containment check for `select`.
pub fn looks_like_query(sql: &str) -> bool {
    sql.to_lowercase().contains("select")
}

/// The write kind named by the first word of the statement, if any.
pub fn leading_write_keyword(sql: &str) -> Option<WriteKind> {
    match sql.split_whitespace().next()?.to_lowercase().as_str() {
        "insert" => Some(WriteKind::Insert),
        "update" => Some(WriteKind::Update),
        "delete" => Some(WriteKind::Delete),
        _ => None,
    }
}

/// Checks that `sql` may be run by the read helper.
///
/// # Errors
///
/// `DbError::InvalidCommand` when the statement is not accepted as a query.
pub fn check_query(sql: &str, policy: StatementPolicy) -> Result<()> {
    match policy {
        StatementPolicy::Permissive => {
            if looks_like_query(sql) {
                Ok(())
            } else {
                Err(DbError::InvalidCommand(format!("expected a SELECT statement, got `{}`", sql.trim())))
            }
        }
        StatementPolicy::Strict => match parse_single(sql)? {
            Statement::Query(_) => Ok(()),
            _ => Err(DbError::InvalidCommand(format!("expected a SELECT statement, got `{}`", sql.trim()))),
        },
    }
}

/// Checks that `sql` may be run by the write helper and reports its kind.
///
/// # Errors
///
/// `DbError::InvalidCommand` when the statement is not an INSERT, UPDATE
/// or DELETE.
pub fn check_write(sql: &str, policy: StatementPolicy) -> Result<WriteKind> {
    let kind = match policy {
        StatementPolicy::Permissive => leading_write_keyword(sql),
        StatementPolicy::Strict => match parse_single(sql)? {
            Statement::Insert { .. } => Some(WriteKind::Insert),
            Statement::Update { .. } => Some(WriteKind::Update),
            Statement::Delete { .. } => Some(WriteKind::Delete),
            _ => None,
        },
    };
    kind.ok_or_else(|| {
        DbError::InvalidCommand(format!(
            "expected an INSERT, UPDATE or DELETE statement, got `{}`",
            sql.trim()
        ))
    })
}

fn parse_single(sql: &str) -> Result<Statement> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| DbError::InvalidCommand(format!("could not parse statement: {}", e)))?;
    if statements.len() != 1 {
        return Err(DbError::InvalidCommand(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }
    Ok(statements.remove(0))
}
