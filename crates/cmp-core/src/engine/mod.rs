//! DecisionEngine: accept/reject operations and purpose → vendor cascades.
//!
//! ## Override rules
//!
//! - `accept_vendors` / `reject_vendors` set vendor decisions directly and
//!   never touch purposes. A manual rejection pins the vendor.
//! - A purpose cascade re-derives every vendor that declares one of the
//!   listed purposes: `Allowed` iff all of its purposes are `Allowed` and it
//!   is not pinned, `Rejected` otherwise. A manual accept is therefore
//!   overridden by the next cascade that finds a non-allowed purpose.
//! - `accept_vendors` clears the pin; `accept_all`, `reject_all` and
//!   `reset` clear all pins.
//!
//! Every operation validates its ids before touching the store, so a failed
//! call leaves the record untouched.

mod cascade;

use crate::catalog::Catalog;
use crate::errors::{ConsentError, ConsentResult};
use crate::model::{AttStatus, ConsentRecord, Decision, StatusSet, UserStatus};
use crate::store::ConsentStore;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    store: Arc<ConsentStore>,
}

impl DecisionEngine {
    pub fn new(store: Arc<ConsentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ConsentStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.store.catalog()
    }

    pub fn accept_vendors<S: AsRef<str>>(&self, ids: &[S]) -> ConsentResult<StatusSet> {
        self.set_vendors(ids, true)
    }

    pub fn reject_vendors<S: AsRef<str>>(&self, ids: &[S]) -> ConsentResult<StatusSet> {
        self.set_vendors(ids, false)
    }

    pub fn accept_purposes<S: AsRef<str>>(
        &self,
        ids: &[S],
        update_dependents: bool,
    ) -> ConsentResult<StatusSet> {
        self.set_purposes(ids, true, update_dependents)
    }

    pub fn reject_purposes<S: AsRef<str>>(
        &self,
        ids: &[S],
        update_dependents: bool,
    ) -> ConsentResult<StatusSet> {
        self.set_purposes(ids, false, update_dependents)
    }

    pub fn accept_all(&self) -> ConsentResult<StatusSet> {
        self.set_all(true)
    }

    pub fn reject_all(&self) -> ConsentResult<StatusSet> {
        self.set_all(false)
    }

    pub fn get_status_for_purpose(&self, id: &str) -> ConsentResult<Decision> {
        if !self.catalog().has_purpose(id) {
            return Err(ConsentError::unknown_purpose(id));
        }
        Ok(self.store.get().purpose(id))
    }

    pub fn get_status_for_vendor(&self, id: &str) -> ConsentResult<Decision> {
        if !self.catalog().has_vendor(id) {
            return Err(ConsentError::unknown_vendor(id));
        }
        Ok(self.store.get().vendor(id))
    }

    pub fn get_user_status(&self) -> UserStatus {
        self.store.get().user_status()
    }

    /// Atomically return every purpose and vendor to `Undecided`, dropping
    /// pins and the remembered ATT status.
    pub fn reset(&self) -> ConsentResult<StatusSet> {
        let fresh = self.store.fresh();
        let (record, ()) = self.store.mutate(|r| {
            *r = fresh;
            Ok(())
        })?;
        tracing::info!("consent data reset");
        Ok(record.statuses())
    }

    /// Resolve `Undecided` purposes that do not require explicit consent
    /// from their catalog defaults, then cascade.
    pub fn resolve_defaults(&self) -> ConsentResult<StatusSet> {
        let catalog = self.catalog().clone();
        let (record, (resolved, cascaded)) = self.store.mutate(|r| {
            let mut resolved = Vec::new();
            for purpose in catalog.purposes() {
                if purpose.requires_explicit_consent
                    || r.purpose(&purpose.id) != Decision::Undecided
                {
                    continue;
                }
                r.purpose_decisions.insert(
                    purpose.id.clone(),
                    Decision::from_accept(purpose.default_allowed),
                );
                resolved.push(purpose.id.clone());
            }
            let cascaded = cascade::cascade(&catalog, r, &resolved);
            Ok((resolved.len(), cascaded))
        })?;
        tracing::debug!(
            op = "resolve_defaults",
            resolved,
            cascaded,
            "consent mutation committed"
        );
        Ok(record.statuses())
    }

    /// Record the platform ATT status. Decisions are unaffected.
    pub fn set_att_status(&self, status: AttStatus) -> ConsentResult<UserStatus> {
        let (record, ()) = self.store.mutate(|r| {
            r.att_status = status;
            Ok(())
        })?;
        tracing::debug!(op = "set_att_status", ?status, "consent mutation committed");
        Ok(record.user_status())
    }

    /// Replace the whole record (import/restore path).
    pub fn replace_record(&self, record: ConsentRecord) -> ConsentResult<StatusSet> {
        let record = self.store.replace(record)?;
        Ok(record.statuses())
    }

    fn set_vendors<S: AsRef<str>>(&self, ids: &[S], accept: bool) -> ConsentResult<StatusSet> {
        let catalog = self.catalog();
        if let Some(id) = ids.iter().map(|id| id.as_ref()).find(|id| !catalog.has_vendor(id)) {
            return Err(ConsentError::unknown_vendor(id));
        }
        let op = if accept { "accept_vendors" } else { "reject_vendors" };
        let decision = Decision::from_accept(accept);
        let (record, ()) = self.store.mutate(|r| {
            for id in ids.iter().map(|id| id.as_ref()) {
                r.vendor_decisions.insert(id.to_string(), decision);
                if accept {
                    r.vendor_pins.remove(id);
                } else {
                    r.vendor_pins.insert(id.to_string());
                }
            }
            Ok(())
        })?;
        tracing::debug!(op, count = ids.len(), "consent mutation committed");
        Ok(record.statuses())
    }

    fn set_purposes<S: AsRef<str>>(
        &self,
        ids: &[S],
        accept: bool,
        update_dependents: bool,
    ) -> ConsentResult<StatusSet> {
        let catalog = self.catalog().clone();
        if let Some(id) = ids.iter().map(|id| id.as_ref()).find(|id| !catalog.has_purpose(id)) {
            return Err(ConsentError::unknown_purpose(id));
        }
        let op = if accept { "accept_purposes" } else { "reject_purposes" };
        let decision = Decision::from_accept(accept);
        let purpose_ids: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        let (record, cascaded) = self.store.mutate(|r| {
            for id in &purpose_ids {
                r.purpose_decisions.insert(id.clone(), decision);
            }
            if update_dependents {
                Ok(cascade::cascade(&catalog, r, &purpose_ids))
            } else {
                Ok(0)
            }
        })?;
        tracing::debug!(
            op,
            count = purpose_ids.len(),
            update_dependents,
            cascaded,
            "consent mutation committed"
        );
        Ok(record.statuses())
    }

    fn set_all(&self, accept: bool) -> ConsentResult<StatusSet> {
        let op = if accept { "accept_all" } else { "reject_all" };
        let decision = Decision::from_accept(accept);
        let (record, ()) = self.store.mutate(|r| {
            for d in r.purpose_decisions.values_mut() {
                *d = decision;
            }
            for d in r.vendor_decisions.values_mut() {
                *d = decision;
            }
            r.vendor_pins.clear();
            Ok(())
        })?;
        tracing::debug!(op, "consent mutation committed");
        Ok(record.statuses())
    }
}
