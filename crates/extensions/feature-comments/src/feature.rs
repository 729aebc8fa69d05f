//! Comment export feature module.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use caselens_core::{FeatureContext, FeatureModule, FeatureScope};
use caselens_protocols::{
    Clipboard, Document, ExportError, FeatureError, InsertPosition, NewElement, NodeId, Notifier,
    ObserveOptions, PageType, ToastLevel,
};

use crate::export::{ExportFormat, ExportMetadata};
use crate::scrape::scrape_comments;

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

/// Marks the injected button bar (`"bar"`) and its buttons (`"xml"`, `"tsv"`).
pub const BUTTONS_ATTR: &str = "data-caselens-export";

const ANCHOR_SELECTORS: &[&str] = &[
    ".slds-page-header__row",
    ".slds-page-header",
    "records-lwc-highlights-panel",
];

/// Everything a button click needs to export the current page.
#[derive(Clone)]
struct ExportTarget {
    document: Arc<dyn Document>,
    metadata: ExportMetadata,
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
}

impl ExportTarget {
    async fn copy(&self, format: ExportFormat) -> Result<usize, ExportError> {
        let comments = scrape_comments(&*self.document);
        let text = format.render(&self.metadata, &comments)?;
        self.clipboard.write_text(&text).await?;
        Ok(comments.len())
    }

    async fn copy_and_report(&self, format: ExportFormat) {
        match self.copy(format).await {
            Ok(count) => self.notifier.toast(
                ToastLevel::Success,
                &format!("Copied {} comments as {}", count, format.label()),
            ),
            Err(e) => {
                warn!("{} export failed: {}", format.label(), e);
                self.notifier
                    .toast(ToastLevel::Error, &format!("Copy failed: {}", e));
            }
        }
    }
}

/// Injects "Copy XML" / "Copy TSV" buttons on case pages.
pub struct CommentsFeature {
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
}

impl CommentsFeature {
    pub fn new(clipboard: Arc<dyn Clipboard>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            clipboard,
            notifier,
        }
    }
}

fn anchor(document: &dyn Document) -> NodeId {
    ANCHOR_SELECTORS
        .iter()
        .find_map(|s| document.query(None, s))
        .map(|e| e.node_id)
        .unwrap_or_else(|| document.body())
}

/// Inject the button bar unless it is already on the page. Returns whether it
/// was injected.
fn ensure_buttons(scope: &FeatureScope, target: &ExportTarget) -> Result<bool, FeatureError> {
    let document = &*target.document;
    if document
        .query(None, &format!("[{}=\"bar\"]", BUTTONS_ATTR))
        .is_some()
    {
        return Ok(false);
    }
    // Buttons of a bar the host re-rendered away are gone for good.
    let released = scope.release_detached();
    if released > 0 {
        debug!("Released {} detached export nodes", released);
    }

    let bar = scope.insert(
        anchor(document),
        NewElement::new("div")
            .with_attr(BUTTONS_ATTR, "bar")
            .with_attr("class", "slds-button-group"),
        InsertPosition::Append,
    )?;

    for (format, key) in [(ExportFormat::Xml, "xml"), (ExportFormat::Tsv, "tsv")] {
        let button = scope.insert(
            bar,
            NewElement::new("button")
                .with_attr(BUTTONS_ATTR, key)
                .with_attr("class", "slds-button slds-button_neutral")
                .with_text(format!("Copy {}", format.label())),
            InsertPosition::Append,
        )?;

        let click_scope = scope.clone();
        let click_target = target.clone();
        scope.listen(button, "click", move |_| {
            let target = click_target.clone();
            if let Err(e) = click_scope.spawn(async move { target.copy_and_report(format).await }) {
                debug!("Ignoring click: {}", e);
            }
        })?;
    }
    Ok(true)
}

#[async_trait]
impl FeatureModule for CommentsFeature {
    fn name(&self) -> &str {
        "comments"
    }

    fn supports(&self, page_type: PageType) -> bool {
        matches!(page_type, PageType::CasePage | PageType::CaseCommentsPage)
    }

    async fn activate(&self, context: FeatureContext) -> Result<(), FeatureError> {
        let metadata = match context.case.as_deref() {
            Some(case) => ExportMetadata::from_case(case),
            None => ExportMetadata {
                record_id: context.page.record_id.clone(),
                ..Default::default()
            },
        };
        let target = ExportTarget {
            document: context.document.clone(),
            metadata,
            clipboard: self.clipboard.clone(),
            notifier: self.notifier.clone(),
        };

        ensure_buttons(&context.scope, &target)?;

        // The header is re-rendered on tab switches and inline edits.
        let scope = context.scope.clone();
        context.scope.watch(
            "buttons",
            context.document.body(),
            context.watch.with_observe(ObserveOptions::child_list_subtree()),
            move |_| match ensure_buttons(&scope, &target) {
                Ok(true) => debug!("Re-injected export buttons"),
                Ok(false) => {}
                Err(e) => debug!("Skipped export button injection: {}", e),
            },
        )?;
        Ok(())
    }
}
