use async_trait::async_trait;

use crate::error::{DriverResult, ErrorInfo};
use crate::types::{Param, ParamType, RawQueryResult, SqlValue};

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Compiling SQL into statements
/// - Reporting the last generated autoincrement id
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Compile `sql` into a statement ready for binding and execution.
    async fn prepare(&self, sql: &str) -> DriverResult<Box<dyn DriverStatement>>;

    /// The most recently generated autoincrement id on this connection.
    async fn last_insert_id(&self) -> DriverResult<i64>;
}

/// A compiled statement owned by its caller.
///
/// Bound values persist across executions until rebound. A successful
/// execution leaves its rows in an open cursor until they are fetched or
/// the cursor is closed.
#[async_trait]
pub trait DriverStatement: Send {
    /// Bind `value` to `param`, converted according to `param_type`.
    fn bind_value(&mut self, param: &Param, value: SqlValue, param_type: ParamType) -> DriverResult<()>;

    /// Run the statement with the currently bound values.
    /// `Ok(false)` means the driver ran the statement but reported a failure
    /// status; details are available through [`DriverStatement::error_info`].
    async fn execute(&mut self) -> DriverResult<bool>;

    /// Error info for the last operation on this statement.
    fn error_info(&self) -> ErrorInfo;

    /// All remaining rows of the open cursor. Empty once the cursor is closed.
    async fn fetch_all(&mut self) -> DriverResult<RawQueryResult>;

    /// Release the open cursor, if any.
    async fn close_cursor(&mut self);
}
