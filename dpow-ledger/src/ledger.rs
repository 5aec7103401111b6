use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dpow_types::context::{amount_for_role, ChainRole};
use dpow_types::deposit::{DepositDetails, DepositKey, DepositRecord};
use dpow_types::primitives::{Amount, Height};

/// Result of an upsert: whether the key was seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Counts of ledger entries by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub consumed: usize,
}

/// Records plus a key index. Records are append-only, so indices stay valid.
#[derive(Default)]
struct LedgerInner {
    index: HashMap<DepositKey, usize>,
    records: Vec<DepositRecord>,
}

impl LedgerInner {
    fn get_or_insert(&mut self, key: DepositKey) -> (&mut DepositRecord, bool) {
        let (idx, created) = match self.index.get(&key) {
            Some(idx) => (*idx, false),
            None => {
                let idx = self.records.len();
                self.records.push(DepositRecord::placeholder(key));
                self.index.insert(key, idx);
                (idx, true)
            }
        };
        (&mut self.records[idx], created)
    }
}

/// Keyed store of deposit records.
///
/// Every operation runs under one exclusive lock, so no caller can observe a
/// half-updated record or a total computed across a concurrent insertion.
/// Reads hand out copies, never references into the store.
pub struct DepositLedger {
    inner: Mutex<LedgerInner>,
}

impl DepositLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
        }
    }

    /// A panic while holding the lock cannot leave a record half-written
    /// (every mutation is a plain field store), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a record by key, returning a copy.
    pub fn find(&self, key: &DepositKey) -> Option<DepositRecord> {
        let inner = self.lock();
        inner.index.get(key).map(|idx| inner.records[*idx].clone())
    }

    /// Create or update the record for `key` with full deposit details.
    ///
    /// The mark of an existing record is preserved.
    pub fn upsert(&self, key: DepositKey, details: DepositDetails) -> UpsertOutcome {
        let mut inner = self.lock();
        let (record, created) = inner.get_or_insert(key);
        record.apply(details);
        if created {
            tracing::debug!(%key, "deposit created");
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        }
    }

    /// Insert a fully populated record unless its key is already present.
    ///
    /// Returns false for a duplicate, leaving the stored record untouched.
    pub fn insert_if_absent(&self, record: DepositRecord) -> bool {
        let key = record.key();
        let mut inner = self.lock();
        if inner.index.contains_key(&key) {
            return false;
        }
        let idx = inner.records.len();
        inner.records.push(record);
        inner.index.insert(key, idx);
        true
    }

    /// Flag the record for `key` as consumed at `height`, creating a
    /// placeholder if the key has not been seen.
    ///
    /// A record that is already marked keeps its first mark.
    pub fn mark(&self, key: DepositKey, height: Height) -> DepositRecord {
        let mut inner = self.lock();
        let (record, created) = inner.get_or_insert(key);
        if created {
            tracing::debug!(%key, height, "placeholder deposit created by mark");
        }
        if record.mark == 0 {
            record.mark = height;
        }
        record.clone()
    }

    /// Sum of the role-appropriate amount over all unconsumed records.
    pub fn total(&self, role: ChainRole) -> Amount {
        let inner = self.lock();
        inner
            .records
            .iter()
            .filter(|r| r.mark == 0)
            .fold(0, |acc: Amount, r| {
                acc.saturating_add(amount_for_role(role, r))
            })
    }

    /// Copies of up to `limit` unconsumed records, in first-seen order.
    pub fn pending(&self, limit: usize) -> Vec<DepositRecord> {
        let inner = self.lock();
        inner
            .records
            .iter()
            .filter(|r| r.mark == 0)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Run `f` over all records while holding the lock.
    pub fn with_records<T>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &DepositRecord>) -> T) -> T {
        let inner = self.lock();
        let mut iter = inner.records.iter();
        f(&mut iter)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> LedgerStats {
        let inner = self.lock();
        let consumed = inner.records.iter().filter(|r| r.mark != 0).count();
        LedgerStats {
            total: inner.records.len(),
            pending: inner.records.len() - consumed,
            consumed,
        }
    }
}

impl Default for DepositLedger {
    fn default() -> Self {
        Self::new()
    }
}
