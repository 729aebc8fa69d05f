//! End-to-end navigation through a headless tab.

use std::sync::Arc;
use std::time::Duration;

use caselens_config::Config;
use caselens_core::{ControllerState, CustomerTable, MemoryDocument, MemoryStore};
use caselens_protocols::{CustomerRecord, Document, NewElement, PageInfo, PageType};
use caselens::{ContentScript, HostSurfaces, SqliteStore};

const CASE: &str = "500Ak00000AbCdEIAV";
const ORIGIN: &str = "https://acme.lightning.force.com";

fn customers() -> CustomerTable {
    CustomerTable::new(vec![CustomerRecord {
        institution_code: "FNB_TX".to_string(),
        server: "prod-04".to_string(),
        region: "US".to_string(),
        cust_id: Some(1201),
        inst_id: Some(88),
        name: "First National".to_string(),
    }])
}

fn config() -> Config {
    let mut config = Config::default();
    config.controller.ready_poll_interval_ms = 20;
    config.controller.ready_max_attempts = 10;
    config.watcher.default_debounce_ms = 20;
    config
}

fn render_list(doc: &MemoryDocument) {
    doc.clear_body();
    let table = doc
        .append(doc.body(), NewElement::new("table").with_attr("role", "grid"))
        .unwrap();
    let tbody = doc.append(table, NewElement::new("tbody")).unwrap();
    let row = doc.append(tbody, NewElement::new("tr")).unwrap();
    for (label, value) in [("Status", "Escalated"), ("Priority", "Low")] {
        doc.append(
            row,
            NewElement::new("td").with_attr("data-label", label).with_text(value),
        )
        .unwrap();
    }
}

fn render_case(doc: &MemoryDocument) {
    doc.clear_body();
    doc.append(doc.body(), NewElement::new("div").with_attr("class", "slds-page-header"))
        .unwrap();
    for (label, value) in [
        ("Case Number", "00012345"),
        ("Status", "New"),
        ("Account Number", "fnb-tx"),
        ("Last Modified By", "3/1/2024, 10:00 AM"),
    ] {
        let item = doc
            .append(
                doc.body(),
                NewElement::new("records-record-layout-item").with_attr("field-label", label),
            )
            .unwrap();
        doc.append(item, NewElement::new("lightning-formatted-text").with_text(value))
            .unwrap();
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

fn is_on(script: &ContentScript, page: &PageInfo) -> bool {
    script.controller().state() == ControllerState::Active(page.clone())
}

#[tokio::test]
async fn test_navigation_sequence() {
    let doc = Arc::new(MemoryDocument::new(format!("{}/lightning/o/Case/list", ORIGIN)));
    render_list(&doc);
    let host = HostSurfaces::headless(doc.clone(), Arc::new(MemoryStore::new()), &config());
    let script = ContentScript::start(host, &config(), customers()).await.unwrap();

    let list = PageInfo::of_type(PageType::CaseListPage);
    assert!(wait_until(|| is_on(&script, &list)).await);
    assert!(wait_until(|| doc.query(None, "tr[data-caselens-hl=\"status\"]").is_some()).await);

    // Open the case.
    render_case(&doc);
    doc.navigate(format!("{}/lightning/r/Case/{}/view", ORIGIN, CASE));
    let case_page = PageInfo::record(PageType::CasePage, CASE);
    assert!(wait_until(|| is_on(&script, &case_page)).await);

    let case = script.controller().current_case().unwrap();
    assert_eq!(case.raw.case_number.as_deref(), Some("00012345"));
    assert_eq!(case.institution_code.as_deref(), Some("FNB_TX"));
    assert_eq!(case.display_name.as_deref(), Some("First National"));
    assert!(script.cache().contains(CASE));
    assert!(doc.query(None, "[data-caselens-menu=\"panel\"]").is_some());
    assert!(doc.query(None, "button[data-caselens-export=\"xml\"]").is_some());
    assert!(
        doc.query(None, "records-record-layout-item[data-caselens-hl=\"status\"]")
            .is_some()
    );

    // Back to the list: case page decorations are gone.
    render_list(&doc);
    doc.pop_state(format!("{}/lightning/o/Case/list", ORIGIN));
    assert!(wait_until(|| is_on(&script, &list)).await);
    assert!(doc.query(None, "[data-caselens-menu]").is_none());
    assert!(doc.query(None, "[data-caselens-export]").is_none());

    // Reopening the unchanged case is served from the cache.
    render_case(&doc);
    doc.navigate(format!("{}/lightning/r/Case/{}/view", ORIGIN, CASE));
    assert!(wait_until(|| is_on(&script, &case_page)).await);
    assert!(wait_until(|| script.cache().stats().hits >= 1).await);

    script.stop();
    assert_eq!(script.controller().state(), ControllerState::Idle);
    assert_eq!(script.controller().watcher_count(), 0);
    assert_eq!(doc.observer_count(), 0);
    assert!(doc.query(None, "[data-caselens-menu]").is_none());
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caselens.db");
    let case_url = format!("{}/lightning/r/Case/{}/view", ORIGIN, CASE);
    let case_page = PageInfo::record(PageType::CasePage, CASE);

    {
        let doc = Arc::new(MemoryDocument::new(case_url.clone()));
        render_case(&doc);
        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let host = HostSurfaces::headless(doc.clone(), store, &config());
        let script = ContentScript::start(host, &config(), customers()).await.unwrap();
        assert!(wait_until(|| is_on(&script, &case_page)).await);
        assert!(wait_until(|| script.cache().contains(CASE)).await);
        script.stop();
    }

    let doc = Arc::new(MemoryDocument::new(case_url));
    render_case(&doc);
    let store = Arc::new(SqliteStore::open(&path).await.unwrap());
    let host = HostSurfaces::headless(doc.clone(), store, &config());
    let script = ContentScript::start(host, &config(), customers()).await.unwrap();
    assert!(script.cache().contains(CASE));

    assert!(wait_until(|| is_on(&script, &case_page)).await);
    assert!(wait_until(|| script.cache().stats().hits >= 1).await);
    assert_eq!(script.cache().stats().misses, 0);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let doc = Arc::new(MemoryDocument::new(ORIGIN));
    let mut config = Config::default();
    config.cache.max_age_days = 0;
    let host = HostSurfaces::headless(doc, Arc::new(MemoryStore::new()), &config);
    let result = ContentScript::start(host, &config, customers()).await;
    assert!(matches!(result, Err(caselens::ContentScriptError::InvalidConfig(_))));
}
