use crate::persistence::Persistence;

/// Subscriber notified whenever a [`Persistence`] operation fails.
///
/// `source` is the adapter that failed; call [`Persistence::get`] on it to
/// read the failure.
pub trait Observer: Send + Sync {
    fn update(&self, source: &Persistence);
}
