//! Exit codes for `cmp`. Part of the public contract.

pub const SUCCESS: i32 = 0;
pub const CONSENT_ERROR: i32 = 1; // Bad consent string or record
pub const CONFIG_ERROR: i32 = 2; // Engine config unreadable/invalid, or internal failure
