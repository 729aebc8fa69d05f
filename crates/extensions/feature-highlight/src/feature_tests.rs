use super::*;
use std::time::Duration;

use caselens_core::{ManualClock, MemoryDocument, Settings, WatchOptions};
use caselens_protocols::{ExtractedCaseData, NewElement, NodeId, PageInfo, RawCaseFields};

// 2024-03-01T10:00:00Z
const NOW: i64 = 1_709_287_200_000;

fn context(doc: &Arc<MemoryDocument>, page: PageInfo, case: Option<ExtractedCaseData>) -> FeatureContext {
    FeatureContext {
        page,
        case: case.map(Arc::new),
        document: doc.clone(),
        settings: Arc::new(Settings::default()),
        scope: FeatureScope::new("highlight", doc.clone()),
        watch: WatchOptions::new(Duration::from_millis(250)),
    }
}

fn feature() -> HighlightFeature {
    HighlightFeature::with_clock(Arc::new(ManualClock::new(NOW)))
}

fn list_table(doc: &MemoryDocument) -> NodeId {
    let table = doc
        .append(doc.body(), NewElement::new("table").with_attr("role", "grid"))
        .unwrap();
    doc.append(table, NewElement::new("tbody")).unwrap()
}

fn add_row(doc: &MemoryDocument, tbody: NodeId, status: &str, priority: &str, modified: &str) -> NodeId {
    let row = doc.append(tbody, NewElement::new("tr")).unwrap();
    for (label, value) in [
        ("Status", status),
        ("Priority", priority),
        ("Last Modified Date", modified),
    ] {
        doc.append(
            row,
            NewElement::new("td").with_attr("data-label", label).with_text(value),
        )
        .unwrap();
    }
    row
}

fn mark_of(doc: &MemoryDocument, node: NodeId) -> Option<String> {
    doc.element(node)
        .and_then(|e| e.attr(HIGHLIGHT_ATTR).map(str::to_string))
}

#[tokio::test]
async fn test_list_rows_highlighted_by_precedence() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/lightning/o/Case/list"));
    let tbody = list_table(&doc);
    let urgent = add_row(&doc, tbody, "New", "High", "2024-02-29T09:00");
    let fresh = add_row(&doc, tbody, "New", "Low", "2024-02-29T09:00");
    let stale = add_row(&doc, tbody, "Working", "Low", "2/1/2024, 9:00 AM");
    let quiet = add_row(&doc, tbody, "Working", "Low", "2024-02-29T09:00");

    let ctx = context(&doc, PageInfo::of_type(PageType::CaseListPage), None);
    feature().activate(ctx.clone()).await.unwrap();

    assert_eq!(mark_of(&doc, urgent).as_deref(), Some("priority"));
    assert_eq!(mark_of(&doc, fresh).as_deref(), Some("status"));
    assert_eq!(mark_of(&doc, stale).as_deref(), Some("aging"));
    assert_eq!(mark_of(&doc, quiet), None);
    assert_eq!(ctx.scope.watcher_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_rows_highlighted_after_rerender() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/lightning/o/Case/list"));
    let tbody = list_table(&doc);
    let ctx = context(&doc, PageInfo::of_type(PageType::CaseListPage), None);
    feature().activate(ctx.clone()).await.unwrap();

    let row = add_row(&doc, tbody, "Escalated", "Low", "2024-02-29T09:00");
    assert_eq!(mark_of(&doc, row), None);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mark_of(&doc, row).as_deref(), Some("status"));
}

#[tokio::test]
async fn test_dispose_removes_highlights() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/lightning/o/Case/list"));
    let tbody = list_table(&doc);
    let row = add_row(&doc, tbody, "New", "P1", "2024-02-29T09:00");

    let ctx = context(&doc, PageInfo::of_type(PageType::CaseListPage), None);
    feature().activate(ctx.clone()).await.unwrap();
    assert!(mark_of(&doc, row).is_some());

    ctx.scope.dispose();
    assert_eq!(mark_of(&doc, row), None);
    assert_eq!(doc.observer_count(), 0);
}

#[tokio::test]
async fn test_reapply_is_idempotent() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/lightning/o/Case/list"));
    let tbody = list_table(&doc);
    add_row(&doc, tbody, "New", "Low", "2024-02-29T09:00");
    let scope = FeatureScope::new("highlight", doc.clone());
    let rules = HighlightRules::from_settings(&Settings::default());

    let mut sub = doc
        .observe(doc.body(), caselens_protocols::ObserveOptions::tree())
        .unwrap();
    assert_eq!(apply_list(&*doc, &scope, &rules, NOW).unwrap(), 1);
    assert!(sub.records.try_recv().is_ok());
    assert_eq!(apply_list(&*doc, &scope, &rules, NOW).unwrap(), 1);
    assert!(sub.records.try_recv().is_err());
}

#[tokio::test]
async fn test_case_fields_highlighted() {
    let doc = Arc::new(MemoryDocument::new(
        "https://acme.lightning.force.com/lightning/r/Case/500Ak00000AbCdEIAV/view",
    ));
    let status = doc
        .append(
            doc.body(),
            NewElement::new("records-highlights-details-item").with_attr("field-label", "Status"),
        )
        .unwrap();
    let priority = doc
        .append(
            doc.body(),
            NewElement::new("records-record-layout-item").with_attr("field-label", "Priority"),
        )
        .unwrap();

    let case = ExtractedCaseData {
        record_id: "500Ak00000AbCdEIAV".to_string(),
        raw: RawCaseFields {
            status: Some("Escalated".to_string()),
            priority: Some("Medium".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let ctx = context(
        &doc,
        PageInfo::record(PageType::CasePage, "500Ak00000AbCdEIAV"),
        Some(case),
    );
    feature().activate(ctx).await.unwrap();

    assert_eq!(mark_of(&doc, status).as_deref(), Some("status"));
    assert_eq!(mark_of(&doc, priority), None);
}

#[tokio::test]
async fn test_case_page_without_data_is_noop() {
    let doc = Arc::new(MemoryDocument::new("https://acme.lightning.force.com/"));
    let ctx = context(&doc, PageInfo::record(PageType::CasePage, "500Ak00000AbCdEIAV"), None);
    feature().activate(ctx.clone()).await.unwrap();
    assert_eq!(ctx.scope.watcher_count(), 0);
}

#[test]
fn test_supports() {
    let feature = feature();
    assert!(feature.supports(PageType::CaseListPage));
    assert!(feature.supports(PageType::CasePage));
    assert!(!feature.supports(PageType::ReportPage));
}
