//! Purpose/vendor definition catalog.
//!
//! The catalog is validated once at construction and then shared read-only.
//! It keeps a purpose → dependent-vendors index so cascades only touch the
//! vendors that declare a changed purpose.

use crate::errors::{ConsentError, ConsentResult};
use crate::model::{Purpose, PurposeId, Vendor, VendorId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Longest identifier the consent string can carry (one length byte).
pub const MAX_ID_BYTES: usize = u8::MAX as usize;

/// Most entries per namespace the consent string can carry (u16 count).
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// Serializable catalog definition, as found in the engine config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDef {
    #[serde(default)]
    pub purposes: Vec<Purpose>,
    #[serde(default)]
    pub vendors: Vec<Vendor>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    purposes: BTreeMap<PurposeId, Purpose>,
    vendors: BTreeMap<VendorId, Vendor>,
    dependents: BTreeMap<PurposeId, BTreeSet<VendorId>>,
}

impl Catalog {
    /// Build and validate a catalog.
    pub fn new(purposes: Vec<Purpose>, vendors: Vec<Vendor>) -> ConsentResult<Self> {
        if purposes.len() > MAX_ENTRIES {
            return Err(ConsentError::invalid_config(format!(
                "catalog has {} purposes (max {MAX_ENTRIES})",
                purposes.len()
            )));
        }
        if vendors.len() > MAX_ENTRIES {
            return Err(ConsentError::invalid_config(format!(
                "catalog has {} vendors (max {MAX_ENTRIES})",
                vendors.len()
            )));
        }

        let mut purpose_map = BTreeMap::new();
        for purpose in purposes {
            validate_id("purpose", &purpose.id)?;
            if purpose_map.contains_key(&purpose.id) {
                return Err(ConsentError::invalid_config(format!(
                    "duplicate purpose id: {}",
                    purpose.id
                )));
            }
            purpose_map.insert(purpose.id.clone(), purpose);
        }

        let mut vendor_map = BTreeMap::new();
        let mut dependents: BTreeMap<PurposeId, BTreeSet<VendorId>> = BTreeMap::new();
        for vendor in vendors {
            validate_id("vendor", &vendor.id)?;
            if vendor_map.contains_key(&vendor.id) {
                return Err(ConsentError::invalid_config(format!(
                    "duplicate vendor id: {}",
                    vendor.id
                )));
            }
            for purpose_id in &vendor.purpose_ids {
                if !purpose_map.contains_key(purpose_id) {
                    return Err(ConsentError::invalid_config(format!(
                        "vendor {} references unknown purpose {}",
                        vendor.id, purpose_id
                    )));
                }
                dependents
                    .entry(purpose_id.clone())
                    .or_default()
                    .insert(vendor.id.clone());
            }
            vendor_map.insert(vendor.id.clone(), vendor);
        }

        Ok(Self {
            purposes: purpose_map,
            vendors: vendor_map,
            dependents,
        })
    }

    pub fn from_def(def: &CatalogDef) -> ConsentResult<Self> {
        Self::new(def.purposes.clone(), def.vendors.clone())
    }

    pub fn purpose(&self, id: &str) -> Option<&Purpose> {
        self.purposes.get(id)
    }

    pub fn vendor(&self, id: &str) -> Option<&Vendor> {
        self.vendors.get(id)
    }

    pub fn has_purpose(&self, id: &str) -> bool {
        self.purposes.contains_key(id)
    }

    pub fn has_vendor(&self, id: &str) -> bool {
        self.vendors.contains_key(id)
    }

    pub fn purposes(&self) -> impl Iterator<Item = &Purpose> {
        self.purposes.values()
    }

    pub fn vendors(&self) -> impl Iterator<Item = &Vendor> {
        self.vendors.values()
    }

    pub fn purpose_ids(&self) -> impl Iterator<Item = &PurposeId> {
        self.purposes.keys()
    }

    pub fn vendor_ids(&self) -> impl Iterator<Item = &VendorId> {
        self.vendors.keys()
    }

    /// Vendors that declare at least one of `purpose_ids`.
    pub fn dependents_of<'a, I>(&self, purpose_ids: I) -> BTreeSet<VendorId>
    where
        I: IntoIterator<Item = &'a PurposeId>,
    {
        purpose_ids
            .into_iter()
            .filter_map(|id| self.dependents.get(id))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn to_def(&self) -> CatalogDef {
        CatalogDef {
            purposes: self.purposes.values().cloned().collect(),
            vendors: self.vendors.values().cloned().collect(),
        }
    }
}

fn validate_id(kind: &str, id: &str) -> ConsentResult<()> {
    if id.is_empty() {
        return Err(ConsentError::invalid_config(format!("empty {kind} id")));
    }
    if id.len() > MAX_ID_BYTES {
        return Err(ConsentError::invalid_config(format!(
            "{kind} id exceeds {MAX_ID_BYTES} bytes: {}...",
            id.chars().take(16).collect::<String>()
        )));
    }
    Ok(())
}
