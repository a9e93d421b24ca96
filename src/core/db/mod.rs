/// Database Module
///
/// Everything a session needs, split by concern:
/// - **Connection strings** (`connection_string.rs`): URL parsing and descriptor composition
/// - **Values** (`value.rs`): parameters, driver values, large objects, result rows
/// - **Drivers** (`driver.rs`, `sqlite.rs`): the native driver traits, the
///   process-scoped environment and the SQLite implementation
/// - **Sessions** (`connection.rs`): connect/disconnect lifecycle
/// - **Helpers** (`query.rs`, `command.rs`, `diagnostics.rs`): `get`, `run`, `info`
pub mod command;
pub mod connection;
pub mod diagnostics;
pub mod driver;
pub mod query;
pub mod sqlite;
pub mod connection_string;
pub mod value;

pub use command::*;
pub use connection::*;
pub use diagnostics::*;
pub use driver::*;
pub use query::*;
pub use sqlite::*;
pub use connection_string::*;
pub use value::*;
