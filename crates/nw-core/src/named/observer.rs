use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use super::processor::NamedWindowProcessor;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Created,
    Removed,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// Notification passed to observers after a registry mutation.
#[derive(Debug)]
pub struct LifecycleEvent<'a> {
    pub window: &'a str,
    pub action: LifecycleAction,
    pub processor: &'a NamedWindowProcessor,
}

/// Callback interested in named window creation and removal.
///
/// Observers run while the registry's mutation lock is held: they may query
/// the registry but must not add or remove processors, which would deadlock.
pub trait NamedWindowLifecycleObserver: Send + Sync {
    fn observe(&self, event: &LifecycleEvent<'_>) -> anyhow::Result<()>;
}

/// One observer's failure for one lifecycle event.
#[derive(Debug)]
pub struct ObserverFailure {
    pub window: String,
    pub action: LifecycleAction,
    pub error: anyhow::Error,
}

// ---------------------------------------------------------------------------
// ObserverHub
// ---------------------------------------------------------------------------

/// Most recent observer failures kept until drained; older ones are dropped.
pub const MAX_RETAINED_FAILURES: usize = 256;

/// Identity-set of lifecycle observers, notified in registration order.
///
/// Identity is the `Arc` data pointer: adding the same `Arc` twice is a
/// no-op, while two distinct instances of one type are two observers.
#[derive(Default)]
pub struct ObserverHub {
    observers: RwLock<Vec<Arc<dyn NamedWindowLifecycleObserver>>>,
    failures: Mutex<Vec<ObserverFailure>>,
}

impl fmt::Debug for ObserverHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHub")
            .field("observer_count", &self.len())
            .finish()
    }
}

fn identity(observer: &Arc<dyn NamedWindowLifecycleObserver>) -> usize {
    Arc::as_ptr(observer) as *const () as usize
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the observer was already present.
    pub fn add(&self, observer: Arc<dyn NamedWindowLifecycleObserver>) -> bool {
        let mut observers = self.observers.write().expect("observer hub poisoned");
        let id = identity(&observer);
        if observers.iter().any(|o| identity(o) == id) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Returns `false` if the observer was not present.
    pub fn remove(&self, observer: &Arc<dyn NamedWindowLifecycleObserver>) -> bool {
        let mut observers = self.observers.write().expect("observer hub poisoned");
        let id = identity(observer);
        let before = observers.len();
        observers.retain(|o| identity(o) != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().expect("observer hub poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every observer. A failing observer does not stop the others;
    /// failures are logged once all have run and kept for
    /// [`take_failures`](Self::take_failures), bounded by
    /// [`MAX_RETAINED_FAILURES`]. Returns the failure count.
    pub fn notify(&self, event: &LifecycleEvent<'_>) -> usize {
        // Snapshot so observers may add/remove observers without deadlock.
        let observers = self.observers.read().expect("observer hub poisoned").clone();

        let mut failed = Vec::new();
        for observer in &observers {
            if let Err(error) = observer.observe(event) {
                failed.push(ObserverFailure {
                    window: event.window.to_string(),
                    action: event.action,
                    error,
                });
            }
        }

        for f in &failed {
            log::warn!(
                "named window observer failed: window={:?} action={} error={:#}",
                f.window,
                f.action,
                f.error
            );
        }
        let count = failed.len();
        if count > 0 {
            let mut failures = self.failures.lock().expect("observer failures poisoned");
            failures.extend(failed);
            let overflow = failures.len().saturating_sub(MAX_RETAINED_FAILURES);
            failures.drain(..overflow);
        }
        count
    }

    /// Drain failures collected since the last call, oldest first. At most
    /// [`MAX_RETAINED_FAILURES`] are kept between calls.
    pub fn take_failures(&self) -> Vec<ObserverFailure> {
        std::mem::take(&mut *self.failures.lock().expect("observer failures poisoned"))
    }

    pub(crate) fn clear(&self) {
        self.observers.write().expect("observer hub poisoned").clear();
        self.failures.lock().expect("observer failures poisoned").clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::processor::tests::make_def;

    struct Recording {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl NamedWindowLifecycleObserver for Recording {
        fn observe(&self, event: &LifecycleEvent<'_>) -> anyhow::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}:{}", self.tag, event.window, event.action));
            if self.fail {
                anyhow::bail!("{} refused", self.tag);
            }
            Ok(())
        }
    }

    fn recording(
        tag: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail: bool,
    ) -> Arc<dyn NamedWindowLifecycleObserver> {
        Arc::new(Recording {
            tag,
            log: log.clone(),
            fail,
        })
    }

    fn processor() -> NamedWindowProcessor {
        NamedWindowProcessor::new(make_def("Orders", "create_orders")).unwrap()
    }

    // -- 1. set_semantics -----------------------------------------------------

    #[test]
    fn set_semantics() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hub = ObserverHub::new();
        let o = recording("a", &log, false);

        assert!(hub.add(o.clone()));
        assert!(!hub.add(o.clone()));
        assert_eq!(hub.len(), 1);

        let p = processor();
        hub.notify(&LifecycleEvent {
            window: "Orders",
            action: LifecycleAction::Created,
            processor: &p,
        });
        assert_eq!(*log.lock().unwrap(), vec!["a:Orders:created"]);

        assert!(hub.remove(&o));
        assert!(!hub.remove(&o));
        assert!(hub.is_empty());
    }

    // -- 2. registration_order ------------------------------------------------

    #[test]
    fn registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hub = ObserverHub::new();
        hub.add(recording("first", &log, false));
        hub.add(recording("second", &log, false));
        hub.add(recording("third", &log, false));

        let p = processor();
        hub.notify(&LifecycleEvent {
            window: "Orders",
            action: LifecycleAction::Removed,
            processor: &p,
        });
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:Orders:removed",
                "second:Orders:removed",
                "third:Orders:removed"
            ]
        );
    }

    // -- 3. failure_isolated_and_collected ------------------------------------

    #[test]
    fn failure_isolated_and_collected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hub = ObserverHub::new();
        hub.add(recording("ok1", &log, false));
        hub.add(recording("bad", &log, true));
        hub.add(recording("ok2", &log, false));

        let p = processor();
        let failed = hub.notify(&LifecycleEvent {
            window: "Orders",
            action: LifecycleAction::Created,
            processor: &p,
        });

        assert_eq!(failed, 1);
        assert_eq!(log.lock().unwrap().len(), 3);

        let failures = hub.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].window, "Orders");
        assert_eq!(failures[0].action, LifecycleAction::Created);
        assert!(failures[0].error.to_string().contains("bad refused"));
        assert!(hub.take_failures().is_empty());
    }

    // -- 4. undrained_failures_bounded ----------------------------------------

    #[test]
    fn undrained_failures_bounded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hub = ObserverHub::new();
        hub.add(recording("bad", &log, true));

        let p = processor();
        let names: Vec<String> = (0..MAX_RETAINED_FAILURES + 10)
            .map(|i| format!("w{i}"))
            .collect();
        for name in &names {
            hub.notify(&LifecycleEvent {
                window: name,
                action: LifecycleAction::Created,
                processor: &p,
            });
        }

        let failures = hub.take_failures();
        assert_eq!(failures.len(), MAX_RETAINED_FAILURES);
        assert_eq!(failures[0].window, "w10");
        assert_eq!(
            failures.last().unwrap().window,
            format!("w{}", MAX_RETAINED_FAILURES + 9)
        );
    }
}
