/// Native Driver Abstraction
///
/// A session never talks to a database library directly. It goes through
/// the traits in this module: a `Driver` opens `NativeConnection`s, which
/// hand out short-lived `NativeCursor`s. The process owns the driver
/// through an `Environment`, created once at start-up and torn down at exit.

use crate::core::db::connection_string::{ConnectionConfig, Descriptor};
use crate::core::db::value::{ColumnDescription, NativeValue, Params};
use crate::core::{DriverError, DriverResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a driver needs to open one connection.
#[derive(Clone)]
pub struct ConnectRequest {
    pub user: String,
    pub password: String,
    pub descriptor: Descriptor,
    pub options: BTreeMap<String, String>,
}

impl ConnectRequest {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        ConnectRequest {
            user: config.user().to_string(),
            password: config.password().to_string(),
            descriptor: config.descriptor(),
            options: config.options().clone(),
        }
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("user", &self.user)
            .field("password", &"***")
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .finish()
    }
}

/// A native database client library.
pub trait Driver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Opens a new connection. Blocks until the library answers.
    fn connect(&self, request: &ConnectRequest) -> DriverResult<Box<dyn NativeConnection>>;
}

/// An open connection owned by exactly one session.
pub trait NativeConnection: Send {
    /// Opens a cursor scoped to a single statement.
    fn cursor(&mut self) -> DriverResult<Box<dyn NativeCursor + '_>>;

    /// Commits the work done since the last commit.
    fn commit(&mut self) -> DriverResult<()>;

    /// Closes the connection, discarding uncommitted work.
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// A cursor that executes one statement and yields its rows.
pub trait NativeCursor {
    fn execute(&mut self, sql: &str, params: &Params) -> DriverResult<()>;

    /// Result columns of the last executed statement, empty for writes.
    fn description(&self) -> &[ColumnDescription];

    /// Every remaining row of the last executed statement.
    fn fetch_all(&mut self) -> DriverResult<Vec<Vec<NativeValue>>>;

    /// Rows affected by the last write, or rows fetched so far for a query.
    fn row_count(&self) -> u64;

    fn close(self: Box<Self>);
}

struct EnvironmentInner {
    driver: Box<dyn Driver>,
    active: AtomicBool,
}

/// Process-scoped handle on the native driver.
///
/// Cloning is cheap and every clone refers to the same driver. After
/// [`Environment::teardown`] no new connection can be opened through it;
/// connections that are already open stay usable until their sessions
/// disconnect.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

impl Environment {
    /// Takes ownership of the driver for the lifetime of the process.
    pub fn init(driver: impl Driver + 'static) -> Self {
        info!(driver = driver.name(), "Initializing driver environment");
        Environment {
            inner: Arc::new(EnvironmentInner {
                driver: Box::new(driver),
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn driver_name(&self) -> &str {
        self.inner.driver.name()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Ends the environment. Calling it again is a no-op.
    pub fn teardown(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            info!(driver = self.driver_name(), "Driver environment torn down");
        }
    }

    pub(crate) fn connect(&self, request: &ConnectRequest) -> DriverResult<Box<dyn NativeConnection>> {
        if !self.is_active() {
            return Err(DriverError::EnvironmentClosed);
        }
        debug!(driver = self.driver_name(), user = %request.user, "Opening native connection");
        self.inner.driver.connect(request)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("driver", &self.driver_name())
            .field("active", &self.is_active())
            .finish()
    }
}
