//! Duplicate-tab banner feature module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use caselens_config::PresenceConfig;
use caselens_core::{Clock, FeatureContext, FeatureModule, FeatureScope, SystemClock};
use caselens_protocols::{
    Document, FeatureError, InsertPosition, NewElement, PageType, PresenceChannel,
};

use crate::presence::TabPresence;

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;

/// Marks the injected duplicate-tab banner.
pub const BANNER_ATTR: &str = "data-caselens-presence";

/// Warns when the open case is also open in another tab.
pub struct PresenceFeature {
    presence: Arc<TabPresence>,
    heartbeat_interval: Duration,
    enabled: bool,
}

impl PresenceFeature {
    pub fn new(channel: Arc<dyn PresenceChannel>, config: &PresenceConfig) -> Self {
        Self::with_clock(channel, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        channel: Arc<dyn PresenceChannel>,
        clock: Arc<dyn Clock>,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            presence: Arc::new(TabPresence::new(channel, clock, config)),
            heartbeat_interval: config.heartbeat_interval(),
            enabled: config.enabled,
        }
    }

    pub fn presence(&self) -> &Arc<TabPresence> {
        &self.presence
    }
}

fn banner_text(others: usize) -> String {
    if others == 1 {
        "This case is also open in another tab.".to_string()
    } else {
        format!("This case is also open in {} other tabs.", others)
    }
}

/// Show, update or remove the banner for the current duplicate count.
fn refresh_banner(
    document: &dyn Document,
    scope: &FeatureScope,
    presence: &TabPresence,
    record_id: &str,
) -> Result<(), FeatureError> {
    let duplicates = presence.duplicates(record_id);
    let existing = document.query(None, &format!("[{}=\"banner\"]", BANNER_ATTR));

    match (duplicates.is_empty(), existing) {
        (true, Some(banner)) => {
            document.remove(banner.node_id);
            debug!("Duplicate tabs gone for {}", record_id);
        }
        (true, None) => {}
        (false, Some(banner)) => {
            let text = banner_text(duplicates.len());
            if banner.text != text {
                document.set_text(banner.node_id, &text)?;
            }
        }
        (false, None) => {
            info!("Record {} is open in {} other tabs", record_id, duplicates.len());
            scope.insert(
                document.body(),
                NewElement::new("div")
                    .with_attr(BANNER_ATTR, "banner")
                    .with_attr("role", "alert")
                    .with_attr("class", "slds-notify slds-notify_alert slds-theme_warning")
                    .with_text(banner_text(duplicates.len())),
                InsertPosition::Prepend,
            )?;
        }
    }
    Ok(())
}

#[async_trait]
impl FeatureModule for PresenceFeature {
    fn name(&self) -> &str {
        "presence"
    }

    fn supports(&self, page_type: PageType) -> bool {
        matches!(page_type, PageType::CasePage | PageType::CaseCommentsPage)
    }

    async fn activate(&self, context: FeatureContext) -> Result<(), FeatureError> {
        if !self.enabled {
            debug!("Presence disabled by configuration");
            return Ok(());
        }
        let Some(record_id) = context.page.record_id.clone() else {
            return Err(FeatureError::MissingData("record id".to_string()));
        };

        let mut heartbeats = self.presence.channel().subscribe();
        self.presence.announce(Some(&record_id));

        // Heartbeat and staleness check.
        {
            let presence = self.presence.clone();
            let document = context.document.clone();
            let scope = context.scope.clone();
            let record_id = record_id.clone();
            let period = self.heartbeat_interval;
            context.scope.spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    presence.announce(Some(&record_id));
                    presence.prune();
                    if let Err(e) = refresh_banner(&*document, &scope, &presence, &record_id) {
                        debug!("Banner refresh stopped: {}", e);
                        break;
                    }
                }
            })?;
        }

        // Peer heartbeats.
        let presence = self.presence.clone();
        let document = context.document.clone();
        let scope = context.scope.clone();
        context.scope.spawn(async move {
            loop {
                match heartbeats.recv().await {
                    Ok(heartbeat) => {
                        let first_contact = !presence.knows(&heartbeat.tab_id);
                        if !presence.record(heartbeat) {
                            continue;
                        }
                        // Answer newcomers right away instead of on the next tick.
                        if first_contact {
                            presence.announce(Some(&record_id));
                        }
                        if let Err(e) = refresh_banner(&*document, &scope, &presence, &record_id) {
                            debug!("Banner refresh stopped: {}", e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Skipped {} heartbeats", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })?;
        Ok(())
    }

    fn deactivate(&self) {
        if self.enabled {
            self.presence.announce(None);
        }
    }
}
