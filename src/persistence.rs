use std::sync::Arc;

use crate::config::PersistenceConfig;
use crate::drivers::TokioPostgresDriver;
use crate::error::{Operation, PersistenceError, Result};
use crate::traits::{DatabaseDriver, DriverStatement, Observer};
use crate::types::{in_list, Param, ParamType, RawQueryResult, Row, SqlValue};

/// Statement-at-a-time adapter over a [`DatabaseDriver`].
///
/// Holds one prepared statement at a time. Every failed operation returns
/// its error, stores it as the last error and notifies attached observers.
pub struct Persistence {
    driver: Arc<dyn DatabaseDriver>,
    statement: Option<Box<dyn DriverStatement>>,
    observers: Vec<Arc<dyn Observer>>,
    last_error: Option<PersistenceError>,
}

impl Persistence {
    /// Connect to a PostgreSQL database described by `config`.
    ///
    /// # Example
    /// ```ignore
    /// let config = PersistenceConfig::from_env()?;
    /// let mut persistence = Persistence::connect(&config).await?;
    /// ```
    pub async fn connect(config: &PersistenceConfig) -> Result<Self> {
        let driver = TokioPostgresDriver::connect(config).await?;
        Ok(Self::new(Arc::new(driver)))
    }

    /// Create an adapter over an existing driver.
    /// Useful for testing or using alternative database drivers.
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self {
            driver,
            statement: None,
            observers: Vec::new(),
            last_error: None,
        }
    }

    /// Subscribe `observer` to failures. Attaching the same observer again
    /// has no effect.
    pub fn attach(&mut self, observer: Arc<dyn Observer>) {
        if !self.is_attached(&observer) {
            self.observers.push(observer);
        }
    }

    /// Unsubscribe `observer`. Does nothing if it is not attached.
    pub fn detach(&mut self, observer: &Arc<dyn Observer>) {
        self.observers
            .retain(|attached| !std::ptr::addr_eq(Arc::as_ptr(attached), Arc::as_ptr(observer)));
    }

    /// Returns true if this exact observer instance is attached.
    pub fn is_attached(&self, observer: &Arc<dyn Observer>) -> bool {
        self.observers
            .iter()
            .any(|attached| std::ptr::addr_eq(Arc::as_ptr(attached), Arc::as_ptr(observer)))
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Call `update` on every attached observer with `self` as the source.
    ///
    /// Delivery order is unspecified.
    pub fn notify(&self) {
        let observers = self.observers.clone();
        for observer in observers {
            observer.update(self);
        }
    }

    /// The last failure, or `None` if no operation has failed yet.
    pub fn get(&self) -> Option<&PersistenceError> {
        self.last_error.as_ref()
    }

    /// Compile `sql` and make it the current statement.
    ///
    /// On failure the previously prepared statement, if any, stays current.
    pub async fn prepare(&mut self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "preparing statement");
        let prepared = self.driver.prepare(sql).await;
        match prepared {
            Ok(statement) => {
                self.release_statement().await;
                self.statement = Some(statement);
                Ok(())
            }
            Err(err) => Err(self.fail(PersistenceError::driver(Operation::Prepare, err))),
        }
    }

    /// Bind `value` to a named (`":id"`) or 1-based positional parameter of
    /// the current statement. `ParamType::default()` binds as a string.
    pub fn bind_value(
        &mut self,
        parameter: impl Into<Param>,
        value: impl Into<SqlValue>,
        data_type: ParamType,
    ) -> Result<()> {
        let parameter = parameter.into();
        let value = value.into();
        tracing::debug!(%parameter, ?data_type, "binding value");

        let outcome = match self.statement.as_mut() {
            Some(statement) => statement
                .bind_value(&parameter, value, data_type)
                .map_err(|err| PersistenceError::driver(Operation::BindValue, err)),
            None => Err(PersistenceError::NoStatement(Operation::BindValue)),
        };
        outcome.map_err(|err| self.fail(err))
    }

    /// Run the current statement.
    ///
    /// If the driver reports a failed status the cursor is closed and the
    /// failure carries the driver's error info as JSON with code
    /// [`BAD_REQUEST_CODE`](crate::error::BAD_REQUEST_CODE).
    pub async fn execute(&mut self) -> Result<()> {
        let outcome = match self.statement.as_mut() {
            Some(statement) => match statement.execute().await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    statement.close_cursor().await;
                    Err(PersistenceError::rejected(&statement.error_info()))
                }
                Err(err) => {
                    statement.close_cursor().await;
                    Err(PersistenceError::driver(Operation::Execute, err))
                }
            },
            None => Err(PersistenceError::NoStatement(Operation::Execute)),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!("statement executed");
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// All rows of the last execution as field-name to value mappings.
    ///
    /// The cursor is closed afterwards whether or not the fetch succeeded, so
    /// a second call without executing again returns no rows.
    pub async fn fetch_assoc(&mut self) -> Result<Vec<Row>> {
        let outcome = match self.statement.as_mut() {
            Some(statement) => {
                let fetched = statement.fetch_all().await;
                statement.close_cursor().await;
                fetched
                    .map(RawQueryResult::into_rows)
                    .map_err(|err| PersistenceError::driver(Operation::FetchAssoc, err))
            }
            None => Err(PersistenceError::NoStatement(Operation::FetchAssoc)),
        };

        match outcome {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), "fetched rows");
                Ok(rows)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Comma-joined `?` placeholders, one per item, for `IN (...)` clauses.
    pub fn in_array_query_string<T>(values: &[T]) -> String {
        in_list(values.len())
    }

    /// The most recently generated autoincrement id. `0` if the connection
    /// has not generated one yet.
    pub async fn last_insert_id(&mut self) -> Result<i64> {
        let outcome = self
            .driver
            .last_insert_id()
            .await
            .map_err(|err| PersistenceError::driver(Operation::LastInsertId, err));
        outcome.map_err(|err| self.fail(err))
    }

    async fn release_statement(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            statement.close_cursor().await;
        }
    }

    fn fail(&mut self, error: PersistenceError) -> PersistenceError {
        tracing::warn!(
            operation = ?error.operation(),
            code = error.code(),
            error = %error,
            "persistence operation failed"
        );
        self.last_error = Some(error.clone());
        self.notify();
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryTestDriver;

    #[test]
    fn test_in_array_query_string() {
        assert_eq!(Persistence::in_array_query_string::<i32>(&[]), "");
        assert_eq!(Persistence::in_array_query_string(&[7]), "?");
        assert_eq!(Persistence::in_array_query_string(&["a", "b", "c"]), "?,?,?");
    }

    #[test]
    fn test_new_adapter_has_no_error() {
        let persistence = Persistence::new(Arc::new(InMemoryTestDriver::new()));
        assert!(persistence.get().is_none());
        assert_eq!(persistence.observer_count(), 0);
    }
}
