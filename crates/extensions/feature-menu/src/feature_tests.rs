use super::*;
use std::time::Duration;

use caselens_config::MessagingConfig;
use caselens_core::{
    BackgroundRouter, LoopbackTransport, MemoryClipboard, MemoryDocument, MemoryStore, Settings,
    TracingNotifier, WatchOptions,
};
use caselens_protocols::PageInfo;

const RECORD: &str = "500Ak00000AbCdEIAV";

struct Setup {
    doc: Arc<MemoryDocument>,
    router: Arc<BackgroundRouter>,
    transport: Arc<LoopbackTransport>,
    clipboard: Arc<MemoryClipboard>,
    notifier: Arc<TracingNotifier>,
    feature: MenuFeature,
}

fn setup() -> Setup {
    let doc = Arc::new(MemoryDocument::new(format!(
        "https://acme.lightning.force.com/lightning/r/Case/{}/view",
        RECORD
    )));
    let router = Arc::new(BackgroundRouter::new(Arc::new(MemoryStore::new())));
    let transport = Arc::new(LoopbackTransport::new(router.clone()));
    let client = MessagingClient::new(transport.clone(), MessagingConfig::default());
    let clipboard = Arc::new(MemoryClipboard::new());
    let notifier = Arc::new(TracingNotifier::new());
    let feature = MenuFeature::new(client, clipboard.clone(), notifier.clone());
    Setup {
        doc,
        router,
        transport,
        clipboard,
        notifier,
        feature,
    }
}

fn case() -> ExtractedCaseData {
    let mut case = ExtractedCaseData {
        record_id: RECORD.to_string(),
        institution_code: Some("FNB_TX".to_string()),
        server: Some("prod-04".to_string()),
        region: Some("US".to_string()),
        display_name: Some("First National".to_string()),
        ..Default::default()
    };
    case.raw.case_number = Some("00012345".to_string());
    case
}

fn context(s: &Setup, case: Option<ExtractedCaseData>) -> FeatureContext {
    FeatureContext {
        page: PageInfo::record(PageType::CasePage, RECORD),
        case: case.map(Arc::new),
        document: s.doc.clone(),
        settings: Arc::new(Settings::default()),
        scope: FeatureScope::new("menu", s.doc.clone()),
        watch: WatchOptions::new(Duration::from_millis(250)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_panel_rows_and_context_menus() {
    let s = setup();
    let ctx = context(&s, Some(case()));
    s.feature.activate(ctx.clone()).await.unwrap();

    let rows: Vec<_> = s
        .doc
        .query_all(None, "[data-caselens-menu=\"row\"]")
        .into_iter()
        .filter_map(|r| r.attr("data-field").map(str::to_string))
        .collect();
    assert_eq!(rows, vec!["caseNumber", "customer", "institutionCode", "server", "region"]);
    assert!(s.doc.query(None, "[data-caselens-menu=\"notice\"]").is_none());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(s.feature.menus_registered());
    let mut ids: Vec<_> = s.router.context_menus().into_iter().map(|m| m.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["caselens-copy-case", "caselens-save-selection"]);
}

#[tokio::test(start_paused = true)]
async fn test_copy_button_writes_value() {
    let s = setup();
    s.feature.activate(context(&s, Some(case()))).await.unwrap();

    let button = s
        .doc
        .query(
            None,
            "[data-field=\"institutionCode\"] button[data-caselens-menu=\"copy\"]",
        )
        .unwrap();
    s.doc.dispatch(button.node_id, "click");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(s.clipboard.contents().as_deref(), Some("FNB_TX"));
    assert_eq!(
        s.notifier.toasts(),
        vec![(ToastLevel::Success, "Copied Institution Code".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_copy_summary() {
    let s = setup();
    s.feature.activate(context(&s, Some(case()))).await.unwrap();

    let button = s.doc.query(None, "button[data-caselens-menu=\"summary\"]").unwrap();
    s.doc.dispatch(button.node_id, "click");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        s.clipboard.contents().as_deref(),
        Some("Case 00012345 | First National (FNB_TX) | prod-04 / US")
    );
}

#[tokio::test]
async fn test_unenriched_case_shows_notice() {
    let s = setup();
    let mut case = ExtractedCaseData {
        record_id: RECORD.to_string(),
        ..Default::default()
    };
    case.raw.account_number = Some("ZZZ_999".to_string());
    s.feature.activate(context(&s, Some(case))).await.unwrap();

    let notice = s.doc.query(None, "[data-caselens-menu=\"notice\"]").unwrap();
    assert_eq!(notice.text, "No customer match for ZZZ_999");
}

#[tokio::test]
async fn test_missing_case_data_fails() {
    let s = setup();
    let ctx = context(&s, None);
    let result = s.feature.activate(ctx.clone()).await;
    assert!(matches!(result, Err(FeatureError::MissingData(_))));
    assert!(ctx.scope.nodes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_registration_retried_after_failure() {
    let s = setup();
    s.transport.set_connected(false);
    s.feature.activate(context(&s, Some(case()))).await.unwrap();

    // Retries back off 100 + 200 + 400 ms before giving up.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!s.feature.menus_registered());
    assert!(s.router.context_menus().is_empty());

    s.transport.set_connected(true);
    s.feature.activate(context(&s, Some(case()))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(s.feature.menus_registered());
    assert_eq!(s.router.context_menus().len(), 2);
}

#[tokio::test]
async fn test_save_selection() {
    let s = setup();
    let count = s
        .feature
        .save_selection("Stack trace line 42", "https://acme.lightning.force.com/")
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_dispose_removes_panel() {
    let s = setup();
    let ctx = context(&s, Some(case()));
    s.feature.activate(ctx.clone()).await.unwrap();
    ctx.scope.dispose();
    assert!(s.doc.query(None, "[data-caselens-menu]").is_none());
    assert_eq!(s.doc.listener_count(), 0);
}
