//! Consent data model.
//!
//! Purpose and vendor definitions are immutable catalog entries; the mutable
//! decision state lives in [`ConsentRecord`], which is the unit that gets
//! persisted and exported.

use crate::errors::{ConsentError, ConsentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type PurposeId = String;
pub type VendorId = String;

/// A user decision for a single purpose or vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Undecided,
    Allowed,
    Rejected,
}

impl Decision {
    /// Wire code used by the consent string (low 7 bits of a state byte).
    pub fn wire_code(self) -> u8 {
        match self {
            Decision::Undecided => 0,
            Decision::Allowed => 1,
            Decision::Rejected => 2,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Decision::Undecided),
            1 => Some(Decision::Allowed),
            2 => Some(Decision::Rejected),
            _ => None,
        }
    }

    pub fn is_decided(self) -> bool {
        self != Decision::Undecided
    }

    /// Decision for a bulk accept (`true`) or reject (`false`).
    pub fn from_accept(accept: bool) -> Self {
        if accept {
            Decision::Allowed
        } else {
            Decision::Rejected
        }
    }
}

/// App Tracking Transparency authorization status.
///
/// Codes follow the platform ordering: 0 not determined, 1 restricted,
/// 2 denied, 3 authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttStatus {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

impl AttStatus {
    pub fn code(self) -> u8 {
        match self {
            AttStatus::NotDetermined => 0,
            AttStatus::Restricted => 1,
            AttStatus::Denied => 2,
            AttStatus::Authorized => 3,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AttStatus::NotDetermined),
            1 => Some(AttStatus::Restricted),
            2 => Some(AttStatus::Denied),
            3 => Some(AttStatus::Authorized),
            _ => None,
        }
    }

    /// Parse a host-supplied status code.
    pub fn from_code(value: i64) -> ConsentResult<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_wire_code)
            .ok_or(ConsentError::InvalidStatus { value })
    }

    /// Denied or restricted: tracking is off and cannot be requested in-app.
    pub fn blocks_tracking(self) -> bool {
        matches!(self, AttStatus::Denied | AttStatus::Restricted)
    }
}

/// A processing purpose definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Purpose {
    pub id: PurposeId,
    #[serde(default)]
    pub default_allowed: bool,
    #[serde(default)]
    pub requires_explicit_consent: bool,
}

impl Purpose {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_allowed: false,
            requires_explicit_consent: false,
        }
    }

    pub fn with_default_allowed(mut self, allowed: bool) -> Self {
        self.default_allowed = allowed;
        self
    }

    pub fn with_explicit_consent(mut self, required: bool) -> Self {
        self.requires_explicit_consent = required;
        self
    }
}

/// A vendor definition and the purposes it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vendor {
    pub id: VendorId,
    #[serde(default)]
    pub purpose_ids: BTreeSet<PurposeId>,
}

impl Vendor {
    pub fn new<I, S>(id: impl Into<String>, purpose_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            purpose_ids: purpose_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// The persisted and exported consent state.
///
/// `vendor_pins` holds vendors that were rejected manually through
/// `reject_vendors`; a cascade never reinstates a pinned vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub version: u8,
    pub purpose_decisions: BTreeMap<PurposeId, Decision>,
    pub vendor_decisions: BTreeMap<VendorId, Decision>,
    #[serde(default)]
    pub vendor_pins: BTreeSet<VendorId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub att_status: AttStatus,
}

impl ConsentRecord {
    /// Record version written by this crate.
    pub const CURRENT_VERSION: u8 = 1;

    /// A record with every listed id `Undecided`.
    pub fn undecided<'a>(
        purpose_ids: impl IntoIterator<Item = &'a PurposeId>,
        vendor_ids: impl IntoIterator<Item = &'a VendorId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            purpose_decisions: purpose_ids
                .into_iter()
                .map(|id| (id.clone(), Decision::Undecided))
                .collect(),
            vendor_decisions: vendor_ids
                .into_iter()
                .map(|id| (id.clone(), Decision::Undecided))
                .collect(),
            vendor_pins: BTreeSet::new(),
            timestamp: truncate_to_millis(timestamp),
            att_status: AttStatus::NotDetermined,
        }
    }

    /// True if any purpose or vendor carries a non-`Undecided` decision.
    pub fn has_explicit_decision(&self) -> bool {
        self.purpose_decisions
            .values()
            .chain(self.vendor_decisions.values())
            .any(|d| d.is_decided())
    }

    pub fn purpose(&self, id: &str) -> Decision {
        self.purpose_decisions.get(id).copied().unwrap_or_default()
    }

    pub fn vendor(&self, id: &str) -> Decision {
        self.vendor_decisions.get(id).copied().unwrap_or_default()
    }

    pub fn statuses(&self) -> StatusSet {
        StatusSet {
            purposes: self.purpose_decisions.clone(),
            vendors: self.vendor_decisions.clone(),
        }
    }

    pub fn user_status(&self) -> UserStatus {
        UserStatus {
            statuses: self.statuses(),
            has_explicit_decision: self.has_explicit_decision(),
            att_status: self.att_status,
            updated_at: self.timestamp,
        }
    }
}

/// Effective decisions for every purpose and vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusSet {
    pub purposes: BTreeMap<PurposeId, Decision>,
    pub vendors: BTreeMap<VendorId, Decision>,
}

/// Full decision snapshot reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(flatten)]
    pub statuses: StatusSet,
    pub has_explicit_decision: bool,
    pub att_status: AttStatus,
    pub updated_at: DateTime<Utc>,
}

/// Drop sub-millisecond precision so timestamps survive the consent string.
pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}
