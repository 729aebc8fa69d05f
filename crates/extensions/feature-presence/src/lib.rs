//! Multi-tab awareness for CaseLens.
//!
//! Every tab showing a case broadcasts a heartbeat on a same-origin channel.
//! When another tab reports the same record within the staleness window, an
//! advisory banner warns that the case is open more than once.

mod channel;
mod feature;
mod presence;

pub use channel::BroadcastPresenceChannel;
pub use feature::{BANNER_ATTR, PresenceFeature};
pub use presence::TabPresence;
