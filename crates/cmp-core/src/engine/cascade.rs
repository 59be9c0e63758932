use crate::catalog::Catalog;
use crate::model::{ConsentRecord, Decision, PurposeId, Vendor};

/// Decision a cascade assigns to `vendor`.
///
/// Allowed iff every declared purpose is allowed and the vendor is not
/// pinned by a manual rejection; otherwise Rejected.
pub(crate) fn derive_vendor_decision(record: &ConsentRecord, vendor: &Vendor) -> Decision {
    if record.vendor_pins.contains(&vendor.id) {
        return Decision::Rejected;
    }
    let all_allowed = vendor
        .purpose_ids
        .iter()
        .all(|p| record.purpose(p) == Decision::Allowed);
    Decision::from_accept(all_allowed)
}

/// Re-derive every vendor that depends on one of `purpose_ids`.
///
/// Returns how many vendor decisions changed.
pub(crate) fn cascade<'a, I>(catalog: &Catalog, record: &mut ConsentRecord, purpose_ids: I) -> usize
where
    I: IntoIterator<Item = &'a PurposeId>,
{
    let mut changed = 0;
    for vendor_id in catalog.dependents_of(purpose_ids) {
        let Some(vendor) = catalog.vendor(&vendor_id) else {
            continue;
        };
        let next = derive_vendor_decision(record, vendor);
        if record.vendor(&vendor_id) != next {
            record.vendor_decisions.insert(vendor_id, next);
            changed += 1;
        }
    }
    changed
}
