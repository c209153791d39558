use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PersistenceError;
use crate::persistence::Persistence;
use crate::traits::Observer;

/// Logs each failure it is notified about at error level.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn update(&self, source: &Persistence) {
        if let Some(error) = source.get() {
            tracing::error!(
                operation = ?error.operation(),
                code = error.code(),
                sqlstate = error.sqlstate(),
                message = %error.message(),
                "persistence failure"
            );
        }
    }
}

/// Keeps every failure it is notified about, oldest first.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<PersistenceError>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere while holding the lock leaves the list intact
    fn lock(&self) -> MutexGuard<'_, Vec<PersistenceError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn errors(&self) -> Vec<PersistenceError> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the collected failures.
    pub fn take(&self) -> Vec<PersistenceError> {
        std::mem::take(&mut *self.lock())
    }
}

impl Observer for ErrorCollector {
    fn update(&self, source: &Persistence) {
        if let Some(error) = source.get() {
            self.lock().push(error.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::drivers::InMemoryTestDriver;
    use crate::error::Operation;

    #[tokio::test]
    async fn test_collector_survives_poisoned_lock() {
        let collector = Arc::new(ErrorCollector::new());

        let poisoner = Arc::clone(&collector);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.errors.lock().unwrap();
            panic!("poison the collector");
        })
        .join();
        assert!(joined.is_err());
        assert!(collector.errors.is_poisoned());

        let mut persistence = Persistence::new(Arc::new(InMemoryTestDriver::new()));
        persistence.attach(collector.clone());
        assert!(persistence.execute().await.is_err());

        assert_eq!(collector.len(), 1);
        assert_eq!(
            collector.take(),
            vec![PersistenceError::NoStatement(Operation::Execute)]
        );
        assert!(collector.is_empty());
    }
}
