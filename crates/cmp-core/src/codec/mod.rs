//! ConsentStringCodec: portable, versioned consent strings.
//!
//! # Wire format (version 1)
//!
//! ```text
//! payload  := version:u8 timestamp_ms:i64be att:u8
//!             purpose_count:u16be { id_len:u8 id state:u8 }*
//!             vendor_count:u16be  { id_len:u8 id state:u8 }*
//! string   := base64url_nopad(payload || sha256(payload)[..4])
//! ```
//!
//! Only decided entries are written, sorted by id; `Undecided` is the
//! absence of an entry. State bytes are 1 (allowed) or 2 (rejected); vendor
//! states may carry `0x80` to mark a manual pin.
//!
//! For a record that covers exactly its catalog (every record held by a
//! `ConsentStore` does), `decode(encode(r)) == r` and, for any string `s`
//! produced by `encode`, `encode(decode(s)) == s`.

mod errors;

pub use errors::{DecodeError, EncodeError};

use crate::catalog::Catalog;
use crate::model::{AttStatus, ConsentRecord, Decision};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::DateTime;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Version tag written at byte 0.
pub const CONSENT_STRING_VERSION: u8 = ConsentRecord::CURRENT_VERSION;

const CHECKSUM_LEN: usize = 4;
const PIN_BIT: u8 = 0x80;

/// Result of decoding against a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub record: ConsentRecord,
    pub report: DecodeReport,
}

/// Ids present in the string but unknown to the catalog (dropped).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub dropped_purposes: Vec<String>,
    pub dropped_vendors: Vec<String>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_purposes.is_empty() && self.dropped_vendors.is_empty()
    }
}

/// Encode a record. Deterministic: equal records give equal strings.
pub fn encode(record: &ConsentRecord) -> Result<String, EncodeError> {
    if record.version != CONSENT_STRING_VERSION {
        return Err(EncodeError::UnsupportedVersion {
            version: record.version,
        });
    }

    let mut payload = Vec::with_capacity(64);
    payload.push(CONSENT_STRING_VERSION);
    payload.extend_from_slice(&record.timestamp.timestamp_millis().to_be_bytes());
    payload.push(record.att_status.code());

    let purposes: Vec<(&str, u8)> = record
        .purpose_decisions
        .iter()
        .filter(|(_, d)| d.is_decided())
        .map(|(id, d)| (id.as_str(), d.wire_code()))
        .collect();
    write_entries(&mut payload, "purpose", &purposes)?;

    let mut vendors = Vec::new();
    for (id, decision) in &record.vendor_decisions {
        let pinned = record.vendor_pins.contains(id);
        if pinned && *decision != Decision::Rejected {
            return Err(EncodeError::InconsistentPin { id: id.clone() });
        }
        if decision.is_decided() {
            let state = decision.wire_code() | if pinned { PIN_BIT } else { 0 };
            vendors.push((id.as_str(), state));
        }
    }
    if let Some(id) = record
        .vendor_pins
        .iter()
        .find(|id| !record.vendor_decisions.contains_key(*id))
    {
        return Err(EncodeError::InconsistentPin { id: id.clone() });
    }
    write_entries(&mut payload, "vendor", &vendors)?;

    let digest = Sha256::digest(&payload);
    payload.extend_from_slice(&digest[..CHECKSUM_LEN]);
    Ok(URL_SAFE_NO_PAD.encode(payload))
}

/// Decode against a catalog.
///
/// Unknown ids are dropped (and logged); known ids missing from the string
/// are `Undecided`.
pub fn decode(input: &str, catalog: &Catalog) -> Result<Decoded, DecodeError> {
    let parsed = parse(input)?;
    let mut report = DecodeReport::default();

    let mut purpose_decisions: BTreeMap<String, Decision> = catalog
        .purpose_ids()
        .map(|id| (id.clone(), Decision::Undecided))
        .collect();
    for (id, decision) in parsed.purpose_decisions {
        if let Some(slot) = purpose_decisions.get_mut(&id) {
            *slot = decision;
        } else {
            report.dropped_purposes.push(id);
        }
    }

    let mut vendor_decisions: BTreeMap<String, Decision> = catalog
        .vendor_ids()
        .map(|id| (id.clone(), Decision::Undecided))
        .collect();
    for (id, decision) in parsed.vendor_decisions {
        if let Some(slot) = vendor_decisions.get_mut(&id) {
            *slot = decision;
        } else {
            report.dropped_vendors.push(id);
        }
    }
    let vendor_pins: BTreeSet<String> = parsed
        .vendor_pins
        .into_iter()
        .filter(|id| catalog.has_vendor(id))
        .collect();

    if !report.is_clean() {
        tracing::warn!(
            dropped_purposes = ?report.dropped_purposes,
            dropped_vendors = ?report.dropped_vendors,
            "consent string references ids outside the catalog; ignoring them"
        );
    }

    Ok(Decoded {
        record: ConsentRecord {
            version: parsed.version,
            purpose_decisions,
            vendor_decisions,
            vendor_pins,
            timestamp: parsed.timestamp,
            att_status: parsed.att_status,
        },
        report,
    })
}

/// Structural decode without a catalog: only ids present in the string.
pub fn parse(input: &str) -> Result<ConsentRecord, DecodeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;

    let version = *bytes.first().ok_or(DecodeError::Empty)?;
    if version != CONSENT_STRING_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    if bytes.len() < 1 + CHECKSUM_LEN {
        return Err(DecodeError::Truncated {
            offset: bytes.len(),
            needed: 1 + CHECKSUM_LEN - bytes.len(),
        });
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if Sha256::digest(payload)[..CHECKSUM_LEN] != *checksum {
        return Err(DecodeError::ChecksumMismatch);
    }

    let mut reader = Reader::new(payload);
    reader.u8()?;
    let millis = reader.i64()?;
    let timestamp =
        DateTime::from_timestamp_millis(millis).ok_or(DecodeError::InvalidTimestamp { millis })?;
    let att_code = reader.u8()?;
    let att_status = AttStatus::from_wire_code(att_code)
        .ok_or(DecodeError::InvalidAttStatus { code: att_code })?;

    let mut purpose_decisions = BTreeMap::new();
    for (id, state) in reader.entries()? {
        let decision = decided_from_state(state).ok_or_else(|| DecodeError::InvalidState {
            id: id.clone(),
            byte: state,
        })?;
        purpose_decisions.insert(id, decision);
    }

    let mut vendor_decisions = BTreeMap::new();
    let mut vendor_pins = BTreeSet::new();
    for (id, state) in reader.entries()? {
        let pinned = state & PIN_BIT != 0;
        let decision = decided_from_state(state & !PIN_BIT)
            .filter(|d| !pinned || *d == Decision::Rejected)
            .ok_or_else(|| DecodeError::InvalidState {
                id: id.clone(),
                byte: state,
            })?;
        if pinned {
            vendor_pins.insert(id.clone());
        }
        vendor_decisions.insert(id, decision);
    }

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(DecodeError::TrailingBytes { count: remaining });
    }

    Ok(ConsentRecord {
        version,
        purpose_decisions,
        vendor_decisions,
        vendor_pins,
        timestamp,
        att_status,
    })
}

fn decided_from_state(state: u8) -> Option<Decision> {
    Decision::from_wire_code(state).filter(|d| d.is_decided())
}

fn write_entries(
    out: &mut Vec<u8>,
    kind: &'static str,
    entries: &[(&str, u8)],
) -> Result<(), EncodeError> {
    let count = u16::try_from(entries.len()).map_err(|_| EncodeError::TooManyEntries {
        kind,
        count: entries.len(),
    })?;
    out.extend_from_slice(&count.to_be_bytes());
    for (id, state) in entries {
        if id.is_empty() {
            return Err(EncodeError::EmptyId);
        }
        let len =
            u8::try_from(id.len()).map_err(|_| EncodeError::IdTooLong { id: id.to_string() })?;
        out.push(len);
        out.extend_from_slice(id.as_bytes());
        out.push(*state);
    }
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
            });
        };
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(raw))
    }

    /// Count-prefixed `(id, state)` list in strictly increasing id order.
    fn entries(&mut self) -> Result<Vec<(String, u8)>, DecodeError> {
        let count = self.u16()?;
        let mut out: Vec<(String, u8)> = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let offset = self.pos;
            let len = usize::from(self.u8()?);
            if len == 0 {
                return Err(DecodeError::InvalidId {
                    offset,
                    reason: "empty identifier".to_string(),
                });
            }
            let id = std::str::from_utf8(self.take(len)?)
                .map_err(|e| DecodeError::InvalidId {
                    offset,
                    reason: e.to_string(),
                })?
                .to_string();
            let state = self.u8()?;
            if let Some((prev, _)) = out.last() {
                if *prev >= id {
                    return Err(DecodeError::NonCanonicalOrder { id });
                }
            }
            out.push((id, state));
        }
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}
