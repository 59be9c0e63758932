//! ConsentStore: the authoritative consent record plus its catalog.
//!
//! Readers get an immutable `Arc` snapshot. Writers build the next record on
//! a private copy and swap it in under the write lock, so a concurrent reader
//! observes either the whole pre-state or the whole post-state.

use crate::catalog::Catalog;
use crate::errors::{ConsentError, ConsentResult};
use crate::model::{truncate_to_millis, ConsentRecord, Decision};
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct ConsentStore {
    catalog: Arc<Catalog>,
    current: RwLock<Arc<ConsentRecord>>,
}

impl ConsentStore {
    /// Create a store whose record is fully `Undecided`.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let record = fresh_record(&catalog);
        Self {
            catalog,
            current: RwLock::new(Arc::new(record)),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Immutable snapshot of the current record.
    pub fn get(&self) -> Arc<ConsentRecord> {
        // Records are never edited in place, so a poisoned lock still guards a
        // complete record.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically swap in `record` after validating it against the catalog.
    ///
    /// Ids the catalog knows but the record lacks are filled in as
    /// `Undecided`.
    pub fn replace(&self, record: ConsentRecord) -> ConsentResult<Arc<ConsentRecord>> {
        let record = Arc::new(self.normalize(record)?);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = record.clone();
        Ok(record)
    }

    /// Apply a transactional update.
    ///
    /// `f` edits a private copy; if it returns an error nothing is published.
    /// The write lock is held for the whole call, which serializes writers.
    pub fn mutate<T, F>(&self, f: F) -> ConsentResult<(Arc<ConsentRecord>, T)>
    where
        F: FnOnce(&mut ConsentRecord) -> ConsentResult<T>,
    {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = ConsentRecord::clone(&guard);
        let out = f(&mut next)?;
        next.timestamp = truncate_to_millis(Utc::now());
        let next = Arc::new(next);
        *guard = next.clone();
        Ok((next, out))
    }

    /// A fully `Undecided` record for the current catalog.
    pub fn fresh(&self) -> ConsentRecord {
        fresh_record(&self.catalog)
    }

    /// Check a record against the catalog and fill in missing ids.
    pub fn normalize(&self, mut record: ConsentRecord) -> ConsentResult<ConsentRecord> {
        if record.version != ConsentRecord::CURRENT_VERSION {
            return Err(ConsentError::invalid_record(format!(
                "unsupported record version {} (expected {})",
                record.version,
                ConsentRecord::CURRENT_VERSION
            )));
        }
        if let Some(id) = record
            .purpose_decisions
            .keys()
            .find(|id| !self.catalog.has_purpose(id))
        {
            return Err(ConsentError::invalid_record(format!(
                "record references unknown purpose {id}"
            )));
        }
        if let Some(id) = record
            .vendor_decisions
            .keys()
            .find(|id| !self.catalog.has_vendor(id))
        {
            return Err(ConsentError::invalid_record(format!(
                "record references unknown vendor {id}"
            )));
        }
        for id in &record.vendor_pins {
            if record.vendor(id) != Decision::Rejected {
                return Err(ConsentError::invalid_record(format!(
                    "vendor {id} is pinned but not rejected"
                )));
            }
        }

        for id in self.catalog.purpose_ids() {
            record.purpose_decisions.entry(id.clone()).or_default();
        }
        for id in self.catalog.vendor_ids() {
            record.vendor_decisions.entry(id.clone()).or_default();
        }
        record.timestamp = truncate_to_millis(record.timestamp);
        Ok(record)
    }
}

fn fresh_record(catalog: &Catalog) -> ConsentRecord {
    ConsentRecord::undecided(catalog.purpose_ids(), catalog.vendor_ids(), Utc::now())
}
