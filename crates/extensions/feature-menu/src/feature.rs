//! Menu feature module.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use caselens_core::{FeatureContext, FeatureModule, FeatureScope, MessagingClient};
use caselens_protocols::messaging::actions;
use caselens_protocols::{
    Clipboard, Document, ExtractedCaseData, FeatureError, InsertPosition, MessagingError,
    NewElement, NodeId, Notifier, ObserveOptions, PageType, RuntimeMessage, ToastLevel,
};

use crate::items::{menu_items, summary};

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

/// Marks the injected panel (`"panel"`), its rows (`"row"`) and copy buttons
/// (`"copy"`, `"summary"`).
pub const MENU_ATTR: &str = "data-caselens-menu";

/// Context menu entries registered on first activation: (id, title, contexts).
pub const CONTEXT_MENUS: &[(&str, &str, &[&str])] = &[
    ("caselens-save-selection", "Save selection to CaseLens", &["selection"]),
    ("caselens-copy-case", "Copy case summary", &["page"]),
];

const ANCHOR_SELECTORS: &[&str] = &["records-lwc-highlights-panel", ".slds-page-header"];

/// Quick-info menu on case pages.
pub struct MenuFeature {
    client: MessagingClient,
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
    menus_registered: Arc<AtomicBool>,
}

impl MenuFeature {
    pub fn new(
        client: MessagingClient,
        clipboard: Arc<dyn Clipboard>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            clipboard,
            notifier,
            menus_registered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn menus_registered(&self) -> bool {
        self.menus_registered.load(Ordering::SeqCst)
    }

    /// Forward a text selection to the background log. Returns the number of
    /// saved selections.
    pub async fn save_selection(&self, text: &str, url: &str) -> Result<u64, MessagingError> {
        let data = self
            .client
            .request(
                RuntimeMessage::new(actions::SAVE_SELECTION)
                    .with("text", text)
                    .with("url", url),
            )
            .await?;
        Ok(data
            .and_then(|d| d.get("count").and_then(|c| c.as_u64()))
            .unwrap_or(0))
    }
}

async fn register_context_menus(client: &MessagingClient) -> Result<(), MessagingError> {
    for (id, title, contexts) in CONTEXT_MENUS {
        client
            .request(
                RuntimeMessage::new(actions::CREATE_CONTEXT_MENU)
                    .with("id", *id)
                    .with("title", *title)
                    .with("contexts", json!(contexts)),
            )
            .await?;
    }
    Ok(())
}

#[derive(Clone)]
struct CopyTarget {
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
}

impl CopyTarget {
    async fn copy(&self, label: &str, value: &str) {
        match self.clipboard.write_text(value).await {
            Ok(()) => self
                .notifier
                .toast(ToastLevel::Success, &format!("Copied {}", label)),
            Err(e) => {
                warn!("Copy of {} failed: {}", label, e);
                self.notifier
                    .toast(ToastLevel::Error, &format!("Copy failed: {}", e));
            }
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

fn copy_button(
    scope: &FeatureScope,
    parent: NodeId,
    kind: &str,
    text: &str,
    target: &CopyTarget,
    label: String,
    value: String,
) -> Result<(), FeatureError> {
    let button = scope.insert(
        parent,
        NewElement::new("button")
            .with_attr(MENU_ATTR, kind)
            .with_attr("class", "slds-button slds-button_icon")
            .with_text(text),
        InsertPosition::Append,
    )?;
    let click_scope = scope.clone();
    let target = target.clone();
    scope.listen(button, "click", move |_| {
        let target = target.clone();
        let label = label.clone();
        let value = value.clone();
        if let Err(e) = click_scope.spawn(async move { target.copy(&label, &value).await }) {
            debug!("Ignoring click: {}", e);
        }
    })
}

/// Inject the panel unless it is already on the page.
fn ensure_panel(
    document: &dyn Document,
    scope: &FeatureScope,
    case: &ExtractedCaseData,
    target: &CopyTarget,
) -> Result<bool, FeatureError> {
    if document
        .query(None, &format!("[{}=\"panel\"]", MENU_ATTR))
        .is_some()
    {
        return Ok(false);
    }

    let panel = scope.insert(
        anchor(document),
        NewElement::new("div")
            .with_attr(MENU_ATTR, "panel")
            .with_attr("class", "slds-dropdown slds-dropdown_left"),
        InsertPosition::Append,
    )?;

    if !case.is_enriched() {
        let account = case.raw.account_number.as_deref().unwrap_or("unknown account");
        scope.insert(
            panel,
            NewElement::new("div")
                .with_attr(MENU_ATTR, "notice")
                .with_text(format!("No customer match for {}", account)),
            InsertPosition::Append,
        )?;
    }

    for item in menu_items(case) {
        let row = scope.insert(
            panel,
            NewElement::new("div")
                .with_attr(MENU_ATTR, "row")
                .with_attr("data-field", item.key)
                .with_text(format!("{}: {}", item.label, item.value)),
            InsertPosition::Append,
        )?;
        copy_button(scope, row, "copy", "Copy", target, item.label.to_string(), item.value)?;
    }

    copy_button(
        scope,
        panel,
        "summary",
        "Copy summary",
        target,
        "case summary".to_string(),
        summary(case),
    )?;
    Ok(true)
}

#[async_trait]
impl FeatureModule for MenuFeature {
    fn name(&self) -> &str {
        "menu"
    }

    fn supports(&self, page_type: PageType) -> bool {
        page_type == PageType::CasePage
    }

    async fn activate(&self, context: FeatureContext) -> Result<(), FeatureError> {
        if !self.menus_registered.swap(true, Ordering::SeqCst) {
            let client = self.client.clone();
            let registered = self.menus_registered.clone();
            // Context menus belong to the extension, not the page, so this
            // task is not tied to the activation scope.
            tokio::spawn(async move {
                match register_context_menus(&client).await {
                    Ok(()) => info!("Registered {} context menu entries", CONTEXT_MENUS.len()),
                    Err(e) => {
                        warn!("Context menu registration failed: {}", e);
                        registered.store(false, Ordering::SeqCst);
                    }
                }
            });
        }

        let case = context.require_case()?.clone();
        let target = CopyTarget {
            clipboard: self.clipboard.clone(),
            notifier: self.notifier.clone(),
        };
        ensure_panel(&*context.document, &context.scope, &case, &target)?;

        let document = context.document.clone();
        let scope = context.scope.clone();
        context.scope.watch(
            "panel",
            context.document.body(),
            context.watch.with_observe(ObserveOptions::child_list_subtree()),
            move |_| match ensure_panel(&*document, &scope, &case, &target) {
                Ok(true) => debug!("Re-injected quick-info menu"),
                Ok(false) => {}
                Err(e) => debug!("Skipped menu injection: {}", e),
            },
        )?;
        Ok(())
    }
}
