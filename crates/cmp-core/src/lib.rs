//! Consent state engine.
//!
//! Owns per-purpose and per-vendor consent decisions, keeps vendors
//! consistent with the purposes they depend on, derives Google Consent Mode
//! and ATT signals, and moves the whole record in and out of a compact,
//! versioned consent string.
//!
//! Hosts normally talk to [`ConsentFacade`]; the lower layers are public for
//! tooling and tests.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod facade;
pub mod model;
pub mod persistence;
pub mod presenter;
pub mod signals;
pub mod store;

// Convenience re-exports
pub use catalog::{Catalog, CatalogDef};
pub use codec::{decode, encode, DecodeError, DecodeReport, Decoded, EncodeError};
pub use config::{EngineConfig, UrlConfig, WebViewConfig};
pub use engine::DecisionEngine;
pub use errors::{ConsentError, ConsentResult};
pub use events::{
    BroadcastEventSink, ConsentEvent, ConsentEventSink, FileEventSink, NullEventSink,
};
pub use facade::{ConsentFacade, ConsentFacadeBuilder, GateState};
pub use model::{
    AttStatus, ConsentRecord, Decision, Purpose, PurposeId, StatusSet, UserStatus, Vendor,
    VendorId,
};
pub use persistence::{ConsentPersistence, FilePersistence, MemoryPersistence};
pub use presenter::{ConsentPresenter, HeadlessPresenter, PresentMode, PresentRequest};
pub use signals::{AttGate, ConsentModeSignal, ConsentModeStatus, SignalMapper, SignalValue};
pub use store::ConsentStore;
