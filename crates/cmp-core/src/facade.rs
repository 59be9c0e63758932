//! ConsentFacade: the host-facing operation surface.
//!
//! Orchestrates the decision engine, codec, signal mapper, persistence hook,
//! event sink and UI presenter. Every mutating call runs as:
//!
//! 1. validate input (failures leave state untouched, emit nothing)
//! 2. commit through the engine and queue the committed snapshot, both under
//!    the facade writer lock
//! 3. release the lock, then persist the encoded record
//! 4. emit exactly one event
//!
//! Steps 3-4 drain an ordered outbox with no engine lock held, so persisted
//! strings and events follow commit order and a sink may call back into the
//! facade. A call made from inside a sink has its event delivered right after
//! the one being emitted. Readers never take the writer lock.

use crate::catalog::Catalog;
use crate::codec;
use crate::config::{EngineConfig, UrlConfig, WebViewConfig};
use crate::engine::DecisionEngine;
use crate::errors::{ConsentError, ConsentResult};
use crate::events::{ConsentEvent, ConsentEventSink, EventKind, NullEventSink};
use crate::model::{AttStatus, ConsentRecord, Decision, StatusSet, UserStatus};
use crate::persistence::{ConsentPersistence, MemoryPersistence};
use crate::presenter::{ConsentPresenter, HeadlessPresenter, PresentMode, PresentRequest};
use crate::signals::{AttGate, ConsentModeStatus, SignalMapper};
use crate::store::ConsentStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use tokio::sync::mpsc;

/// "Should the consent UI be shown" gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No URL config yet.
    NotConfigured,
    /// Configured, and the user still owes a decision.
    Configured,
    /// At least one explicit decision, and no purpose that requires explicit
    /// consent is still undecided. Only a reset leaves this state.
    Decided,
}

#[derive(Debug, Default)]
struct UiState {
    url: Option<UrlConfig>,
    web_view: WebViewConfig,
}

#[derive(Debug, Default)]
struct WriterState {
    initialized: bool,
    seq: u64,
}

/// A committed snapshot waiting to be persisted and announced.
struct Pending {
    seq: u64,
    kind: EventKind,
    operation: &'static str,
    record: Arc<ConsentRecord>,
    save: bool,
}

struct Inner {
    engine: DecisionEngine,
    mapper: SignalMapper,
    presenter: Arc<dyn ConsentPresenter>,
    persistence: Arc<dyn ConsentPersistence>,
    events: Arc<dyn ConsentEventSink>,
    event_source: String,
    resolve_defaults_on_configure: bool,
    ui: RwLock<UiState>,
    writer: Mutex<WriterState>,
    outbox_tx: mpsc::UnboundedSender<Pending>,
    outbox_rx: Mutex<mpsc::UnboundedReceiver<Pending>>,
    queued: AtomicUsize,
}

/// Cheap to clone; clones share one engine instance.
///
/// The decision engine stays private: every change goes through a facade
/// call, so it is persisted and announced.
///
/// ```compile_fail
/// fn mutate_behind_the_facade(facade: &cmp_core::ConsentFacade) {
///     facade.engine().accept_all().unwrap();
/// }
/// ```
#[derive(Clone)]
pub struct ConsentFacade {
    inner: Arc<Inner>,
}

pub struct ConsentFacadeBuilder {
    config: EngineConfig,
    presenter: Arc<dyn ConsentPresenter>,
    persistence: Arc<dyn ConsentPersistence>,
    events: Arc<dyn ConsentEventSink>,
}

impl ConsentFacadeBuilder {
    pub fn presenter(mut self, presenter: Arc<dyn ConsentPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn ConsentPersistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn ConsentEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> ConsentResult<ConsentFacade> {
        let catalog = Arc::new(self.config.validate()?);
        let store = Arc::new(ConsentStore::new(catalog));
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        Ok(ConsentFacade {
            inner: Arc::new(Inner {
                engine: DecisionEngine::new(store),
                mapper: self.config.signal_mapper(),
                presenter: self.presenter,
                persistence: self.persistence,
                events: self.events,
                event_source: self.config.event_source,
                resolve_defaults_on_configure: self.config.resolve_defaults_on_configure,
                ui: RwLock::new(UiState::default()),
                writer: Mutex::new(WriterState::default()),
                outbox_tx,
                outbox_rx: Mutex::new(outbox_rx),
                queued: AtomicUsize::new(0),
            }),
        })
    }
}

impl ConsentFacade {
    pub fn builder(config: EngineConfig) -> ConsentFacadeBuilder {
        ConsentFacadeBuilder {
            config,
            presenter: Arc::new(HeadlessPresenter),
            persistence: Arc::new(MemoryPersistence::new()),
            events: Arc::new(NullEventSink),
        }
    }

    /// Facade with a headless presenter, in-memory persistence and no events.
    pub fn new(config: EngineConfig) -> ConsentResult<Self> {
        Self::builder(config).build()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.inner.engine.catalog()
    }

    pub fn gate_state(&self) -> GateState {
        if self.read_ui().url.is_none() {
            GateState::NotConfigured
        } else if self.is_decided(&self.snapshot()) {
            GateState::Decided
        } else {
            GateState::Configured
        }
    }

    // ---- configuration ----------------------------------------------------

    pub async fn set_url_config(&self, value: Value) -> ConsentResult<()> {
        let config = UrlConfig::from_value(value)?;
        tracing::info!(id = %config.id, language = %config.language, "url config set");
        self.configure("set_url_config", |ui| ui.url = Some(config))
    }

    pub async fn set_web_view_config(&self, value: Value) -> ConsentResult<()> {
        let config = WebViewConfig::from_value(value)?;
        self.configure("set_web_view_config", |ui| ui.web_view = config)
    }

    pub async fn set_att_status(&self, code: i64) -> ConsentResult<()> {
        let status = AttStatus::from_code(code)?;
        self.commit(EventKind::AttChanged, "set_att_status", |engine| {
            engine.set_att_status(status)
        })?;
        Ok(())
    }

    // ---- UI gate ----------------------------------------------------------

    /// Present the consent flow unless the user already decided.
    pub async fn check_and_open(&self, jump_to_settings: bool) -> ConsentResult<bool> {
        self.open(jump_to_settings, false).await
    }

    /// Present the consent flow regardless of existing decisions.
    pub async fn force_open(&self, jump_to_settings: bool) -> ConsentResult<bool> {
        self.open(jump_to_settings, true).await
    }

    // ---- reads ------------------------------------------------------------

    pub async fn get_user_status(&self) -> ConsentResult<UserStatus> {
        Ok(self.inner.engine.get_user_status())
    }

    pub async fn get_status_for_purpose(&self, id: &str) -> ConsentResult<Decision> {
        self.inner.engine.get_status_for_purpose(id)
    }

    pub async fn get_status_for_vendor(&self, id: &str) -> ConsentResult<Decision> {
        self.inner.engine.get_status_for_vendor(id)
    }

    pub async fn get_google_consent_mode_status(&self) -> ConsentResult<ConsentModeStatus> {
        Ok(self.inner.mapper.google_consent_mode(&self.snapshot()))
    }

    pub fn att_gate(&self) -> AttGate {
        self.inner.mapper.att_gate(&self.snapshot())
    }

    // ---- import / export --------------------------------------------------

    pub async fn export_cmp_info(&self) -> ConsentResult<String> {
        encode_record(&self.snapshot())
    }

    /// Replace the current record with a decoded consent string.
    ///
    /// All-or-nothing: any decode or validation failure leaves the current
    /// record untouched.
    pub async fn import_cmp_info(&self, encoded: &str) -> ConsentResult<()> {
        let decoded = codec::decode(encoded, self.catalog())
            .map_err(|source| ConsentError::Import { source })?;
        if !decoded.report.is_clean() {
            tracing::info!(
                dropped_purposes = decoded.report.dropped_purposes.len(),
                dropped_vendors = decoded.report.dropped_vendors.len(),
                "imported consent string referenced unknown ids"
            );
        }
        self.commit(EventKind::ConsentImported, "import_cmp_info", |engine| {
            engine.replace_record(decoded.record)
        })?;
        Ok(())
    }

    pub async fn reset_consent_management_data(&self) -> ConsentResult<()> {
        self.commit(
            EventKind::ConsentReset,
            "reset_consent_management_data",
            DecisionEngine::reset,
        )?;
        Ok(())
    }

    // ---- decisions --------------------------------------------------------

    pub async fn accept_vendors<S: AsRef<str>>(&self, ids: &[S]) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "accept_vendors", |engine| {
            engine.accept_vendors(ids)
        })
    }

    pub async fn reject_vendors<S: AsRef<str>>(&self, ids: &[S]) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "reject_vendors", |engine| {
            engine.reject_vendors(ids)
        })
    }

    pub async fn accept_purposes<S: AsRef<str>>(
        &self,
        ids: &[S],
        update_dependents: bool,
    ) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "accept_purposes", |engine| {
            engine.accept_purposes(ids, update_dependents)
        })
    }

    pub async fn reject_purposes<S: AsRef<str>>(
        &self,
        ids: &[S],
        update_dependents: bool,
    ) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "reject_purposes", |engine| {
            engine.reject_purposes(ids, update_dependents)
        })
    }

    pub async fn accept_all(&self) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "accept_all", DecisionEngine::accept_all)
    }

    pub async fn reject_all(&self) -> ConsentResult<StatusSet> {
        self.commit(EventKind::ConsentChanged, "reject_all", DecisionEngine::reject_all)
    }

    // ---- internals --------------------------------------------------------

    fn snapshot(&self) -> Arc<ConsentRecord> {
        self.inner.engine.store().get()
    }

    fn read_ui(&self) -> std::sync::RwLockReadGuard<'_, UiState> {
        self.inner.ui.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The user made a decision and owes none for explicit-consent purposes.
    fn is_decided(&self, record: &ConsentRecord) -> bool {
        record.has_explicit_decision()
            && self
                .catalog()
                .purposes()
                .filter(|p| p.requires_explicit_consent)
                .all(|p| record.purpose(&p.id).is_decided())
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one engine mutation, then persist and emit.
    fn commit<T, F>(&self, kind: EventKind, operation: &'static str, f: F) -> ConsentResult<T>
    where
        F: FnOnce(&DecisionEngine) -> ConsentResult<T>,
    {
        let out = {
            let mut writer = self.lock_writer();
            let out = f(&self.inner.engine)?;
            self.enqueue(&mut writer, kind, operation, true);
            out
        };
        self.drain();
        Ok(out)
    }

    /// Apply a UI config change. The first configuration call restores the
    /// persisted record and optionally resolves purpose defaults.
    fn configure<F>(&self, operation: &'static str, apply: F) -> ConsentResult<()>
    where
        F: FnOnce(&mut UiState),
    {
        {
            let mut writer = self.lock_writer();
            let first = !writer.initialized;
            if first {
                self.restore();
                if self.inner.resolve_defaults_on_configure {
                    self.inner.engine.resolve_defaults()?;
                }
                writer.initialized = true;
            }
            {
                let mut ui = self.inner.ui.write().unwrap_or_else(PoisonError::into_inner);
                apply(&mut ui);
            }
            self.enqueue(&mut writer, EventKind::ConfigChanged, operation, first);
        }
        self.drain();
        Ok(())
    }

    /// Load the persisted string into the store. Corrupt or incompatible
    /// strings are logged and ignored.
    fn restore(&self) {
        let encoded = match self.inner.persistence.load() {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load persisted consent");
                return;
            }
        };
        let restored = codec::decode(&encoded, self.catalog())
            .map_err(ConsentError::from)
            .and_then(|decoded| self.inner.engine.replace_record(decoded.record));
        match restored {
            Ok(_) => tracing::info!("persisted consent restored"),
            Err(e) => tracing::warn!(error = %e, "ignoring persisted consent"),
        }
    }

    /// Queue the committed snapshot. Called with the writer lock held, so
    /// outbox order is commit order.
    fn enqueue(
        &self,
        writer: &mut WriterState,
        kind: EventKind,
        operation: &'static str,
        save: bool,
    ) {
        writer.seq += 1;
        let pending = Pending {
            seq: writer.seq,
            kind,
            operation,
            record: self.snapshot(),
            save,
        };
        self.inner.queued.fetch_add(1, Ordering::SeqCst);
        if self.inner.outbox_tx.send(pending).is_err() {
            self.inner.queued.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(operation, "consent outbox closed; change not announced");
        }
    }

    /// Persist and emit queued snapshots in order. Whoever holds the receiver
    /// drains for everyone; other callers return at once.
    fn drain(&self) {
        loop {
            {
                let mut rx = match self.inner.outbox_rx.try_lock() {
                    Ok(rx) => rx,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => return,
                };
                while let Ok(pending) = rx.try_recv() {
                    self.deliver(pending);
                    self.inner.queued.fetch_sub(1, Ordering::SeqCst);
                }
            }
            // an item queued after the last receive but before the unlock
            if self.inner.queued.load(Ordering::SeqCst) == 0 {
                return;
            }
        }
    }

    fn deliver(&self, pending: Pending) {
        let persisted = pending.save.then(|| self.persist(&pending.record));
        tracing::debug!(
            seq = pending.seq,
            operation = pending.operation,
            ?persisted,
            "consent change delivered"
        );
        self.inner.events.emit(&ConsentEvent::new(
            pending.kind,
            self.inner.event_source.as_str(),
            pending.operation,
            persisted,
            pending.record.user_status(),
        ));
    }

    fn persist(&self, record: &ConsentRecord) -> bool {
        let encoded = match encode_record(record) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode consent for persistence");
                return false;
            }
        };
        match self.inner.persistence.save(&encoded) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist consent");
                false
            }
        }
    }

    async fn open(&self, jump_to_settings: bool, forced: bool) -> ConsentResult<bool> {
        let (url_config, web_view_config) = {
            let ui = self.read_ui();
            let url = ui.url.clone().ok_or(ConsentError::NotConfigured)?;
            (url, ui.web_view.clone())
        };
        let record = self.snapshot();
        if !forced && self.is_decided(&record) {
            tracing::debug!("consent already decided; not presenting");
            return Ok(false);
        }
        let mode = if jump_to_settings && record.att_status.blocks_tracking() {
            PresentMode::PlatformSettings
        } else {
            PresentMode::ConsentLayer
        };
        let request = PresentRequest {
            mode,
            forced,
            url_config,
            web_view_config,
            att_status: record.att_status,
        };
        let shown = self.inner.presenter.present(request).await?;
        tracing::debug!(?mode, forced, shown, "consent presentation finished");
        Ok(shown)
    }
}

fn encode_record(record: &ConsentRecord) -> ConsentResult<String> {
    codec::encode(record).map_err(|e| ConsentError::invalid_record(e.to_string()))
}
