//! SignalMapper: consent record → external signal vocabularies.
//!
//! Pure read-side mapping. Nothing here touches the store, so it is safe to
//! call alongside any mutation.

use crate::model::{AttStatus, ConsentRecord, Decision, PurposeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Google Consent Mode signal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentModeSignal {
    AdStorage,
    AnalyticsStorage,
    AdUserData,
    AdPersonalization,
}

impl ConsentModeSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdStorage => "ad_storage",
            Self::AnalyticsStorage => "analytics_storage",
            Self::AdUserData => "ad_user_data",
            Self::AdPersonalization => "ad_personalization",
        }
    }

    /// Signals that depend on cross-app tracking.
    pub fn is_ad_signal(self) -> bool {
        !matches!(self, Self::AnalyticsStorage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalValue {
    Granted,
    Denied,
}

pub type ConsentModeStatus = BTreeMap<ConsentModeSignal, SignalValue>;

/// Purpose → signals table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentModeMapping(pub BTreeMap<PurposeId, BTreeSet<ConsentModeSignal>>);

impl Default for ConsentModeMapping {
    fn default() -> Self {
        use ConsentModeSignal::*;
        let table: [(&str, &[ConsentModeSignal]); 3] = [
            ("analytics", &[AnalyticsStorage]),
            ("advertising", &[AdStorage, AdUserData]),
            ("personalization", &[AdPersonalization]),
        ];
        Self(
            table
                .into_iter()
                .map(|(purpose, signals)| (purpose.to_string(), signals.iter().copied().collect()))
                .collect(),
        )
    }
}

impl ConsentModeMapping {
    pub fn purposes(&self) -> impl Iterator<Item = &PurposeId> {
        self.0.keys()
    }
}

/// ATT-derived gating hints for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttGate {
    pub tracking_permitted: bool,
    pub should_request_permission: bool,
    pub settings_redirect_recommended: bool,
}

#[derive(Debug, Clone)]
pub struct SignalMapper {
    mapping: ConsentModeMapping,
    att_gates_ad_signals: bool,
}

impl Default for SignalMapper {
    fn default() -> Self {
        Self::new(ConsentModeMapping::default(), true)
    }
}

impl SignalMapper {
    pub fn new(mapping: ConsentModeMapping, att_gates_ad_signals: bool) -> Self {
        Self {
            mapping,
            att_gates_ad_signals,
        }
    }

    /// A signal is granted iff every mapped purpose in the record is
    /// `Allowed`. Signals with no mapped purpose in the record are omitted.
    pub fn google_consent_mode(&self, record: &ConsentRecord) -> ConsentModeStatus {
        let mut granted: BTreeMap<ConsentModeSignal, bool> = BTreeMap::new();
        for (purpose_id, signals) in &self.mapping.0 {
            let Some(decision) = record.purpose_decisions.get(purpose_id) else {
                continue;
            };
            for signal in signals {
                let entry = granted.entry(*signal).or_insert(true);
                *entry &= *decision == Decision::Allowed;
            }
        }

        let att_blocks = self.att_gates_ad_signals && record.att_status.blocks_tracking();
        granted
            .into_iter()
            .map(|(signal, ok)| {
                let value = if ok && !(att_blocks && signal.is_ad_signal()) {
                    SignalValue::Granted
                } else {
                    SignalValue::Denied
                };
                (signal, value)
            })
            .collect()
    }

    pub fn att_gate(&self, record: &ConsentRecord) -> AttGate {
        AttGate {
            tracking_permitted: record.att_status == AttStatus::Authorized,
            should_request_permission: record.att_status == AttStatus::NotDetermined,
            settings_redirect_recommended: record.att_status.blocks_tracking(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(decisions: &[(&str, Decision)]) -> ConsentRecord {
        let ids: Vec<String> = decisions.iter().map(|(id, _)| id.to_string()).collect();
        let mut r = ConsentRecord::undecided(&ids, &Vec::new(), Utc::now());
        for (id, d) in decisions {
            r.purpose_decisions.insert(id.to_string(), *d);
        }
        r
    }

    #[test]
    fn test_maps_purposes_to_signals() {
        let r = record(&[
            ("analytics", Decision::Allowed),
            ("advertising", Decision::Rejected),
            ("unmapped", Decision::Allowed),
        ]);
        let status = SignalMapper::default().google_consent_mode(&r);
        assert_eq!(
            status.get(&ConsentModeSignal::AnalyticsStorage),
            Some(&SignalValue::Granted)
        );
        assert_eq!(
            status.get(&ConsentModeSignal::AdStorage),
            Some(&SignalValue::Denied)
        );
        assert_eq!(
            status.get(&ConsentModeSignal::AdUserData),
            Some(&SignalValue::Denied)
        );
        // personalization is not in the record
        assert!(!status.contains_key(&ConsentModeSignal::AdPersonalization));
    }

    #[test]
    fn test_undecided_purpose_denies_signal() {
        let r = record(&[("analytics", Decision::Undecided)]);
        let status = SignalMapper::default().google_consent_mode(&r);
        assert_eq!(
            status[&ConsentModeSignal::AnalyticsStorage],
            SignalValue::Denied
        );
    }

    #[test]
    fn test_signal_needs_every_mapped_purpose() {
        let mut table = BTreeMap::new();
        table.insert(
            "a".to_string(),
            BTreeSet::from([ConsentModeSignal::AdStorage]),
        );
        table.insert(
            "b".to_string(),
            BTreeSet::from([ConsentModeSignal::AdStorage]),
        );
        let mapper = SignalMapper::new(ConsentModeMapping(table), false);

        let r = record(&[("a", Decision::Allowed), ("b", Decision::Rejected)]);
        assert_eq!(
            mapper.google_consent_mode(&r)[&ConsentModeSignal::AdStorage],
            SignalValue::Denied
        );
        let r = record(&[("a", Decision::Allowed), ("b", Decision::Allowed)]);
        assert_eq!(
            mapper.google_consent_mode(&r)[&ConsentModeSignal::AdStorage],
            SignalValue::Granted
        );
    }

    #[test]
    fn test_att_denied_gates_ad_signals_only() {
        let mut r = record(&[
            ("analytics", Decision::Allowed),
            ("advertising", Decision::Allowed),
        ]);
        r.att_status = AttStatus::Denied;

        let status = SignalMapper::default().google_consent_mode(&r);
        assert_eq!(
            status[&ConsentModeSignal::AnalyticsStorage],
            SignalValue::Granted
        );
        assert_eq!(status[&ConsentModeSignal::AdStorage], SignalValue::Denied);

        let ungated = SignalMapper::new(ConsentModeMapping::default(), false);
        assert_eq!(
            ungated.google_consent_mode(&r)[&ConsentModeSignal::AdStorage],
            SignalValue::Granted
        );
    }

    #[test]
    fn test_att_gate() {
        let mut r = record(&[]);
        let mapper = SignalMapper::default();
        assert!(mapper.att_gate(&r).should_request_permission);

        r.att_status = AttStatus::Restricted;
        let gate = mapper.att_gate(&r);
        assert!(!gate.tracking_permitted);
        assert!(gate.settings_redirect_recommended);

        r.att_status = AttStatus::Authorized;
        assert!(mapper.att_gate(&r).tracking_permitted);
    }

    #[test]
    fn test_serializes_with_signal_names() {
        let r = record(&[("analytics", Decision::Allowed)]);
        let json = serde_json::to_value(SignalMapper::default().google_consent_mode(&r)).unwrap();
        assert_eq!(json["analytics_storage"], "granted");
    }
}
