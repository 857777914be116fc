use std::fmt::{Debug, Formatter};
use std::sync::RwLock;

use log::{info, trace};
#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::core::event::Event;
use crate::core::storage;

/// A party interested in the mutations of a store.
///
/// Observers are invoked synchronously, in registration order, after a mutation has been committed.
/// An error returned by an observer stops the notification chain and is returned to the caller of the mutation,
/// the committed mutation itself is never rolled back.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Observer: Debug + Send + Sync {
    /// Handle the given store event.
    fn handle_event(&self, event: &Event) -> storage::Result<()>;
}

/// An observer which invokes the given function for each event.
pub struct FnObserver<F>
where
    F: Fn(&Event) -> storage::Result<()> + Send + Sync,
{
    function: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&Event) -> storage::Result<()> + Send + Sync,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> Debug for FnObserver<F>
where
    F: Fn(&Event) -> storage::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObserver").finish()
    }
}

impl<F> Observer for FnObserver<F>
where
    F: Fn(&Event) -> storage::Result<()> + Send + Sync,
{
    fn handle_event(&self, event: &Event) -> storage::Result<()> {
        (self.function)(event)
    }
}

/// An observer which logs each upsert.
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn handle_event(&self, event: &Event) -> storage::Result<()> {
        match event {
            Event::AfterUpsert(payload) => info!("upsert {}", payload),
        }
        Ok(())
    }
}

/// The ordered set of observers registered on a store.
#[derive(Default)]
pub struct Observers {
    observers: RwLock<Vec<Box<dyn Observer>>>,
}

impl Observers {
    /// Register a new observer.
    /// Observers can't be removed and live as long as the store.
    pub fn add(&self, observer: Box<dyn Observer>) {
        trace!("Registering observer {:?}", observer);
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Returns `true` when no observers have been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify the observers of the given event.
    ///
    /// It returns the error of the first failing observer, the remaining observers are not invoked.
    pub fn notify(&self, event: Event) -> storage::Result<()> {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        trace!("Notifying {} observers of {}", observers.len(), event);
        for observer in observers.iter() {
            observer.handle_event(&event)?;
        }
        Ok(())
    }
}

impl Debug for Observers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::EventPayload;
    use crate::core::metrics::GaugeMetric;
    use crate::core::storage::StorageError;
    use crate::init_logger;
    use crate::testing::RecordingObserver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn upsert_event() -> Event {
        Event::AfterUpsert(EventPayload::Gauge(GaugeMetric::new("temp", 36.6)))
    }

    #[test]
    fn test_notify_invokes_observers_in_registration_order() {
        init_logger!();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observers = Observers::default();
        for id in 0..3 {
            let order = order.clone();
            observers.add(Box::new(FnObserver::new(move |_| {
                order.lock().unwrap().push(id);
                Ok(())
            })));
        }

        observers.notify(upsert_event()).unwrap();

        assert_eq!(vec![0, 1, 2], *order.lock().unwrap());
    }

    #[test]
    fn test_notify_stops_on_first_error() {
        init_logger!();
        let invocations = Arc::new(AtomicUsize::new(0));
        let observers = Observers::default();
        let mut failing = MockObserver::new();
        failing.expect_handle_event().times(1).returning(|_| {
            Err(StorageError::WritingFailed(
                "metrics.json".to_string(),
                "disk full".to_string(),
            ))
        });
        observers.add(Box::new(failing));
        let counter = invocations.clone();
        observers.add(Box::new(FnObserver::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));

        let result = observers.notify(upsert_event());

        assert_eq!(
            Err(StorageError::WritingFailed(
                "metrics.json".to_string(),
                "disk full".to_string()
            )),
            result
        );
        assert_eq!(
            0,
            invocations.load(Ordering::SeqCst),
            "expected the second observer to not have been invoked"
        );
    }

    #[test]
    fn test_notify_passes_event() {
        init_logger!();
        let recorder = Arc::new(RecordingObserver::default());
        let observers = Observers::default();
        observers.add(Box::new(recorder.clone()));

        observers.notify(upsert_event()).unwrap();

        assert_eq!(vec![upsert_event()], recorder.events());
    }

    #[test]
    fn test_log_observer() {
        init_logger!();
        let observer = LogObserver;

        let result = observer.handle_event(&upsert_event());

        assert_eq!(Ok(()), result);
    }
}
