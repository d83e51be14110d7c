//! Payload delivered to notification relays.

use crate::formats;
use crate::signature::Signature;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A rendered alert, ready for a relay to deliver to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub primary_link: Option<String>,
    pub slot_count: usize,
    #[serde(with = "formats::rfc3339")]
    pub sent_at: OffsetDateTime,
}

impl Signature for NotificationPayload {}
