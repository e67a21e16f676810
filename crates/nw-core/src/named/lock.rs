use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ---------------------------------------------------------------------------
// StatementLock
// ---------------------------------------------------------------------------

/// Reader/writer lock of one statement instance; for a `create window`
/// statement it guards the contents of the named window.
///
/// Cloning yields another handle to the *same* lock, so the creating statement
/// and every on-delete / on-merge statement serialize through one instance.
#[derive(Clone, Default)]
pub struct StatementLock {
    inner: Arc<RwLock<()>>,
}

impl StatementLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared mode, for statements reading the window contents.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read().expect("statement lock poisoned")
    }

    /// Exclusive mode, for the writer applying inserts and removes.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().expect("statement lock poisoned")
    }

    /// Whether both handles refer to the same underlying lock.
    pub fn same_lock(&self, other: &StatementLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StatementLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementLock")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LockTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LockEntry {
    lock: StatementLock,
    statement_name: String,
}

/// Window name → lock handle and the statement that registered it.
///
/// Lookups for sharing go by window name; release goes by the name of the
/// `create window` statement that registered the lock, and drops every entry
/// that statement owns.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<String, LockEntry>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        self.entries.lock().expect("lock table poisoned")
    }

    /// The lock shared with statements targeting `window_name`, if known.
    pub fn get_lock(&self, window_name: &str) -> Option<StatementLock> {
        self.entries().get(window_name).map(|e| e.lock.clone())
    }

    /// Name of the statement that registered the lock for `window_name`.
    pub fn lock_owner(&self, window_name: &str) -> Option<String> {
        self.entries()
            .get(window_name)
            .map(|e| e.statement_name.clone())
    }

    /// Register the lock for a window at creation time.
    pub fn add_lock(&self, window_name: &str, lock: StatementLock, statement_name: &str) {
        let previous = self.entries().insert(
            window_name.to_string(),
            LockEntry {
                lock,
                statement_name: statement_name.to_string(),
            },
        );
        if let Some(prev) = previous {
            log::warn!(
                "named window {window_name:?} lock re-registered by {statement_name:?} \
                 while still owned by {:?}",
                prev.statement_name
            );
        }
    }

    /// Release every lock entry owned by `statement_name`. No-op when the
    /// statement owns none.
    pub fn remove_lock(&self, statement_name: &str) {
        self.entries()
            .retain(|_, e| e.statement_name != statement_name);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.entries().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. add_then_get_shares_same_lock -------------------------------------

    #[test]
    fn add_then_get_shares_same_lock() {
        let table = LockTable::new();
        let lock = StatementLock::new();
        table.add_lock("Orders", lock.clone(), "create_orders");

        let shared = table.get_lock("Orders").unwrap();
        assert!(shared.same_lock(&lock));
        assert_eq!(table.lock_owner("Orders").as_deref(), Some("create_orders"));
    }

    // -- 2. unknown_window_is_absent ------------------------------------------

    #[test]
    fn unknown_window_is_absent() {
        let table = LockTable::new();
        assert!(table.get_lock("nope").is_none());
        assert!(table.lock_owner("nope").is_none());
    }

    // -- 3. remove_by_statement_name ------------------------------------------

    #[test]
    fn remove_by_statement_name() {
        let table = LockTable::new();
        table.add_lock("Orders", StatementLock::new(), "create_orders");
        table.add_lock("Trades", StatementLock::new(), "create_trades");

        // Removing by window name does nothing: the key is the statement.
        table.remove_lock("Orders");
        assert_eq!(table.len(), 2);

        table.remove_lock("create_orders");
        assert!(table.get_lock("Orders").is_none());
        assert!(table.get_lock("Trades").is_some());
    }

    // -- 4. remove_unknown_statement_is_noop ----------------------------------

    #[test]
    fn remove_unknown_statement_is_noop() {
        let table = LockTable::new();
        let lock = StatementLock::new();
        table.add_lock("Orders", lock.clone(), "create_orders");

        table.remove_lock("never_registered");

        assert_eq!(table.len(), 1);
        assert!(table.get_lock("Orders").unwrap().same_lock(&lock));
    }

    // -- 5. stale_owner_cannot_release_new_entry ------------------------------

    #[test]
    fn stale_owner_cannot_release_new_entry() {
        let table = LockTable::new();
        table.add_lock("Orders", StatementLock::new(), "first");
        let second = StatementLock::new();
        table.add_lock("Orders", second.clone(), "second");

        table.remove_lock("first");
        assert!(table.get_lock("Orders").unwrap().same_lock(&second));

        table.remove_lock("second");
        assert!(table.is_empty());
    }

    // -- 6. statement_owning_several_windows_releases_all --------------------

    #[test]
    fn statement_owning_several_windows_releases_all() {
        let table = LockTable::new();
        table.add_lock("Orders", StatementLock::new(), "deploy_batch");
        table.add_lock("Trades", StatementLock::new(), "deploy_batch");
        table.add_lock("Quotes", StatementLock::new(), "create_quotes");

        table.remove_lock("deploy_batch");

        assert!(table.get_lock("Orders").is_none());
        assert!(table.get_lock("Trades").is_none());
        assert_eq!(table.lock_owner("Quotes").as_deref(), Some("create_quotes"));
        assert_eq!(table.len(), 1);
    }

    // -- 7. shared_and_exclusive_modes ----------------------------------------

    #[test]
    fn shared_and_exclusive_modes() {
        let lock = StatementLock::new();
        let other = lock.clone();
        {
            let _r1 = lock.read();
            let _r2 = other.read();
        }
        let _w = other.write();
        assert!(lock.inner.try_read().is_err());
    }
}
