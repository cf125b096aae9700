//! Address-watch push notifier (spec §2 component H, §4.7).
//!
//! Polls the union of subscribed addresses every 30 seconds, matches new
//! transfers against each subscription's enabled event kinds, and fans out
//! VAPID-signed web push with `notification_log` dedup. VAPID identity is
//! either the configured persistent key pair or an ephemeral one generated
//! at startup with a warning.

mod error;
mod monitor;
mod vapid;

pub use error::PushError;
pub use monitor::{spawn_address_monitor, AddressMonitorWorker};
pub use vapid::VapidKeyPair;
