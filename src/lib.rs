//! persistence - A statement-at-a-time database adapter that reports failures to observers
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use persistence::{LoggingObserver, ParamType, Persistence, PersistenceConfig};
//!
//! // Connect to database
//! let config = PersistenceConfig::from_env()?;
//! let mut db = Persistence::connect(&config).await?;
//! db.attach(Arc::new(LoggingObserver));
//!
//! // Run a query
//! db.prepare("SELECT id, name FROM users WHERE name = $1").await?;
//! db.bind_value(1usize, "John", ParamType::Str)?;
//! db.execute().await?;
//! let rows = db.fetch_assoc().await?;
//!
//! let name = rows[0].get("name")?;
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod observers;
pub mod traits;
pub mod types;

mod persistence;

// Re-export main types for convenient access
pub use config::PersistenceConfig;
pub use error::{DriverError, ErrorInfo, Operation, PersistenceError, Result, BAD_REQUEST_CODE};
pub use observers::{ErrorCollector, LoggingObserver};
pub use persistence::Persistence;
pub use traits::{DatabaseDriver, DriverStatement, Observer};
pub use types::{Param, ParamType, RawQueryResult, Row, SqlValue};
