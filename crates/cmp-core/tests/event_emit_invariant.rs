//! Every successful mutating call emits exactly one event, after the change
//! is committed; failed calls emit nothing.

use cmp_core::events::{
    EVENT_TYPE_ATT_CHANGED, EVENT_TYPE_CONFIG_CHANGED, EVENT_TYPE_CONSENT_CHANGED,
    EVENT_TYPE_CONSENT_IMPORTED, EVENT_TYPE_CONSENT_RESET,
};
use cmp_core::{
    BroadcastEventSink, CatalogDef, ConsentEvent, ConsentEventSink, ConsentFacade,
    ConsentPersistence, Decision, EngineConfig, FileEventSink, Purpose, Vendor,
};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};

/// Test sink that stores events.
#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<ConsentEvent>>,
}

impl TestSink {
    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn last(&self) -> ConsentEvent {
        self.events.lock().unwrap().last().cloned().unwrap()
    }
}

impl ConsentEventSink for TestSink {
    fn emit(&self, event: &ConsentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct BrokenDisk;

impl ConsentPersistence for BrokenDisk {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn save(&self, _encoded: &str) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::new(CatalogDef {
        purposes: vec![Purpose::new("analytics")],
        vendors: vec![Vendor::new("v1", ["analytics"])],
    });
    config.event_source = "cmp://tests".to_string();
    config
}

fn facade(sink: Arc<TestSink>) -> ConsentFacade {
    ConsentFacade::builder(config())
        .event_sink(sink)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_each_mutation_emits_once() {
    let sink = Arc::new(TestSink::default());
    let facade = facade(sink.clone());

    facade
        .set_url_config(json!({"id": "a", "domain": "d", "language": "en", "appName": "x"}))
        .await
        .unwrap();
    assert_eq!(sink.count(), 1);
    assert_eq!(sink.last().event_type, EVENT_TYPE_CONFIG_CHANGED);

    facade.accept_purposes(&["analytics"], true).await.unwrap();
    assert_eq!(sink.count(), 2);
    let event = sink.last();
    assert_eq!(event.event_type, EVENT_TYPE_CONSENT_CHANGED);
    assert_eq!(event.source, "cmp://tests");
    assert_eq!(event.data.operation, "accept_purposes");
    assert_eq!(event.data.persisted, Some(true));
    // the event carries the committed state
    assert_eq!(event.data.status.statuses.vendors["v1"], Decision::Allowed);

    facade.set_att_status(1).await.unwrap();
    assert_eq!(sink.last().event_type, EVENT_TYPE_ATT_CHANGED);

    let exported = facade.export_cmp_info().await.unwrap();
    facade.reset_consent_management_data().await.unwrap();
    assert_eq!(sink.last().event_type, EVENT_TYPE_CONSENT_RESET);
    assert!(!sink.last().data.status.has_explicit_decision);

    facade.import_cmp_info(&exported).await.unwrap();
    assert_eq!(sink.last().event_type, EVENT_TYPE_CONSENT_IMPORTED);
    assert_eq!(sink.count(), 5);

    // reads emit nothing
    facade.get_user_status().await.unwrap();
    facade.get_google_consent_mode_status().await.unwrap();
    facade.export_cmp_info().await.unwrap();
    assert_eq!(sink.count(), 5);
}

#[tokio::test]
async fn test_failures_emit_nothing() {
    let sink = Arc::new(TestSink::default());
    let facade = facade(sink.clone());

    assert!(facade.reject_vendors(&["ghost"]).await.is_err());
    assert!(facade.accept_purposes(&["ghost"], true).await.is_err());
    assert!(facade.set_att_status(-1).await.is_err());
    assert!(facade.import_cmp_info("garbage").await.is_err());
    assert!(facade.set_url_config(json!({"bogus": true})).await.is_err());
    assert!(facade.set_web_view_config(json!({"cornerRadius": -2})).await.is_err());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_failed_save_is_reported_on_event() {
    let sink = Arc::new(TestSink::default());
    let facade = ConsentFacade::builder(config())
        .event_sink(sink.clone())
        .persistence(Arc::new(BrokenDisk))
        .build()
        .unwrap();

    let statuses = facade.accept_all().await.unwrap();
    assert_eq!(statuses.vendors["v1"], Decision::Allowed);
    assert_eq!(sink.count(), 1);
    assert_eq!(sink.last().data.persisted, Some(false));
    // the commit itself stands
    assert_eq!(
        facade.get_status_for_vendor("v1").await.unwrap(),
        Decision::Allowed
    );
}

#[tokio::test]
async fn test_broadcast_subscriber_sees_mutations_in_order() {
    let sink = Arc::new(BroadcastEventSink::default());
    let mut rx = sink.subscribe();
    let facade = ConsentFacade::builder(config())
        .event_sink(sink.clone())
        .build()
        .unwrap();

    facade.accept_all().await.unwrap();
    facade.reject_all().await.unwrap();

    let ops: Vec<String> = (0..2)
        .map(|_| rx.try_recv().unwrap().data.operation)
        .collect();
    assert_eq!(ops, vec!["accept_all", "reject_all"]);
}

#[tokio::test]
async fn test_file_sink_records_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.ndjson");
    let facade = ConsentFacade::builder(config())
        .event_sink(Arc::new(FileEventSink::new(&path).unwrap()))
        .build()
        .unwrap();

    facade.reject_purposes(&["analytics"], false).await.unwrap();
    facade.reset_consent_management_data().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let types: Vec<String> = content
        .lines()
        .map(|l| serde_json::from_str::<ConsentEvent>(l).unwrap().event_type)
        .collect();
    assert_eq!(
        types,
        vec![EVENT_TYPE_CONSENT_CHANGED, EVENT_TYPE_CONSENT_RESET]
    );
}

#[tokio::test]
async fn test_config_events_carry_defaults_and_save_state() {
    let sink = Arc::new(TestSink::default());
    let mut config = config();
    config.resolve_defaults_on_configure = true;
    let facade = ConsentFacade::builder(config)
        .event_sink(sink.clone())
        .build()
        .unwrap();

    facade
        .set_url_config(json!({"id": "a", "domain": "d", "language": "en", "appName": "x"}))
        .await
        .unwrap();
    // default resolution is announced by the first configuration event
    assert_eq!(sink.count(), 1);
    let first = sink.last();
    assert_eq!(first.event_type, EVENT_TYPE_CONFIG_CHANGED);
    assert_eq!(first.data.persisted, Some(true));
    assert_eq!(
        first.data.status.statuses.purposes["analytics"],
        Decision::Rejected
    );

    facade.set_web_view_config(json!({})).await.unwrap();
    assert_eq!(sink.count(), 2);
    let second = sink.last();
    assert_eq!(second.event_type, EVENT_TYPE_CONFIG_CHANGED);
    assert_eq!(second.data.persisted, None);
}
