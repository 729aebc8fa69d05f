//! Highlight feature module.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use caselens_core::{Clock, FeatureContext, FeatureModule, FeatureScope, SystemClock};
use caselens_protocols::{Document, ElementSnapshot, FeatureError, ObserveOptions, PageType};

use crate::rules::{HighlightKind, HighlightRules};

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

/// Attribute carrying the [`HighlightKind`] of a decorated node. A node whose
/// attribute already holds the right value is left untouched.
pub const HIGHLIGHT_ATTR: &str = "data-caselens-hl";

const LIST_ROW_SELECTOR: &str = "table[role=\"grid\"] tbody tr";
const STATUS_CELL: &str = "td[data-label=\"Status\"]";
const PRIORITY_CELL: &str = "td[data-label=\"Priority\"]";
const MODIFIED_CELL: &str = "td[data-label=\"Last Modified Date\"]";

fn field_container(label: &str) -> String {
    format!(
        "records-highlights-details-item[field-label=\"{0}\"], records-record-layout-item[field-label=\"{0}\"]",
        label
    )
}

/// Highlights case list rows and case page fields.
pub struct HighlightFeature {
    clock: Arc<dyn Clock>,
}

impl HighlightFeature {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for HighlightFeature {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_text(document: &dyn Document, row: &ElementSnapshot, selector: &str) -> Option<String> {
    document
        .query(Some(row.node_id), selector)
        .and_then(|cell| cell.text_trimmed().map(str::to_string))
}

/// Bring `node` to the wanted highlight state. Returns whether it ends up
/// highlighted.
fn mark(
    document: &dyn Document,
    scope: &FeatureScope,
    node: &ElementSnapshot,
    kind: Option<HighlightKind>,
) -> Result<bool, FeatureError> {
    let current = node.attr(HIGHLIGHT_ATTR);
    match kind {
        Some(kind) => {
            if current != Some(kind.as_str()) {
                scope.decorate(node.node_id, HIGHLIGHT_ATTR, kind.as_str())?;
            }
            Ok(true)
        }
        None => {
            if current.is_some() {
                document.remove_attribute(node.node_id, HIGHLIGHT_ATTR)?;
            }
            Ok(false)
        }
    }
}

/// Highlight every case list row. Returns the number of highlighted rows.
fn apply_list(
    document: &dyn Document,
    scope: &FeatureScope,
    rules: &HighlightRules,
    now_ms: i64,
) -> Result<usize, FeatureError> {
    let mut highlighted = 0;
    for row in document.query_all(None, LIST_ROW_SELECTOR) {
        let status = cell_text(document, &row, STATUS_CELL);
        let priority = cell_text(document, &row, PRIORITY_CELL);
        let modified = cell_text(document, &row, MODIFIED_CELL);
        let kind = rules.classify(
            status.as_deref(),
            priority.as_deref(),
            modified.as_deref(),
            now_ms,
        );
        if mark(document, scope, &row, kind)? {
            highlighted += 1;
        }
    }
    Ok(highlighted)
}

/// Highlight the status and priority fields of a case page.
fn apply_case(
    document: &dyn Document,
    scope: &FeatureScope,
    rules: &HighlightRules,
    status: Option<&str>,
    priority: Option<&str>,
) -> Result<usize, FeatureError> {
    let fields = [
        (
            "Priority",
            priority
                .filter(|p| rules.is_highlighted_priority(p))
                .map(|_| HighlightKind::Priority),
        ),
        (
            "Status",
            status
                .filter(|s| rules.is_highlighted_status(s))
                .map(|_| HighlightKind::Status),
        ),
    ];

    let mut highlighted = 0;
    for (label, kind) in fields {
        for container in document.query_all(None, &field_container(label)) {
            if mark(document, scope, &container, kind)? {
                highlighted += 1;
            }
        }
    }
    Ok(highlighted)
}

#[async_trait]
impl FeatureModule for HighlightFeature {
    fn name(&self) -> &str {
        "highlight"
    }

    fn supports(&self, page_type: PageType) -> bool {
        matches!(page_type, PageType::CaseListPage | PageType::CasePage)
    }

    async fn activate(&self, context: FeatureContext) -> Result<(), FeatureError> {
        let rules = HighlightRules::from_settings(&context.settings);
        let document = context.document.clone();
        let scope = context.scope.clone();
        // Decorations are attribute changes, so watching child lists alone
        // never re-triggers on our own writes.
        let options = context.watch.with_observe(ObserveOptions::child_list_subtree());

        match context.page.page_type {
            PageType::CaseListPage => {
                let clock = self.clock.clone();
                let count = apply_list(&*document, &scope, &rules, clock.now_ms())?;
                debug!("Highlighted {} case list rows", count);

                let watch_scope = scope.clone();
                let watch_document = document.clone();
                scope.watch("rows", document.body(), options, move |_| {
                    match apply_list(&*watch_document, &watch_scope, &rules, clock.now_ms()) {
                        Ok(count) => trace!("Re-applied highlights to {} rows", count),
                        Err(e) => debug!("Skipped row highlighting: {}", e),
                    }
                })?;
            }
            PageType::CasePage => {
                let Some(case) = context.case.clone() else {
                    debug!("No case data, skipping field highlighting");
                    return Ok(());
                };
                let status = case.raw.status.clone();
                let priority = case.raw.priority.clone();
                let count = apply_case(
                    &*document,
                    &scope,
                    &rules,
                    status.as_deref(),
                    priority.as_deref(),
                )?;
                debug!("Highlighted {} case fields", count);

                let watch_scope = scope.clone();
                let watch_document = document.clone();
                scope.watch("fields", document.body(), options, move |_| {
                    if let Err(e) = apply_case(
                        &*watch_document,
                        &watch_scope,
                        &rules,
                        status.as_deref(),
                        priority.as_deref(),
                    ) {
                        debug!("Skipped field highlighting: {}", e);
                    }
                })?;
            }
            _ => {}
        }
        Ok(())
    }
}
