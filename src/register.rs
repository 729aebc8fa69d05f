//! Feature registration.

use std::sync::Arc;

use tracing::info;

use caselens_config::Config;
use caselens_core::{FeatureModule, FeatureRegistry, MessagingClient};
use caselens_feature_comments::CommentsFeature;
use caselens_feature_highlight::HighlightFeature;
use caselens_feature_menu::MenuFeature;
use caselens_feature_presence::PresenceFeature;
use caselens_protocols::FeatureError;

use crate::host::HostSurfaces;

/// Register the bundled feature modules, in activation order. Returns their
/// names.
pub fn register_default_features(
    registry: &FeatureRegistry,
    host: &HostSurfaces,
    config: &Config,
) -> Result<Vec<String>, FeatureError> {
    let client = MessagingClient::new(host.transport.clone(), config.messaging.clone());

    let features: Vec<Arc<dyn FeatureModule>> = vec![
        Arc::new(HighlightFeature::new()),
        Arc::new(CommentsFeature::new(
            host.clipboard.clone(),
            host.notifier.clone(),
        )),
        Arc::new(MenuFeature::new(
            client,
            host.clipboard.clone(),
            host.notifier.clone(),
        )),
        Arc::new(PresenceFeature::new(host.presence.clone(), &config.presence)),
    ];

    let mut names = Vec::with_capacity(features.len());
    for feature in features {
        names.push(feature.name().to_string());
        registry.register(feature)?;
    }
    info!("Registered features: {}", names.join(", "));
    Ok(names)
}
