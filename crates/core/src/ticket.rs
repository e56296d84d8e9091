use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::intent::{ISSUE_SLOT, PRIORITY_SLOT};
use crate::models::{IntentRequest, Priority};
use crate::replies::ISSUE_NOT_PROVIDED;

const TICKET_ID_MODULUS: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub issue_description: String,
    pub priority: Priority,
}

impl Ticket {
    /// Builds an escalation ticket from the request slots. Missing or
    /// unrecognized slot values fall back to defaults.
    pub fn open(request: &IntentRequest, now: DateTime<Utc>) -> Self {
        let issue_description = request
            .slot(ISSUE_SLOT)
            .unwrap_or(ISSUE_NOT_PROVIDED)
            .to_string();
        let priority = match request.slot(PRIORITY_SLOT) {
            Some(raw) => Priority::parse(raw).unwrap_or_else(|| {
                warn!(priority = raw, "unrecognized priority, using default");
                Priority::default()
            }),
            None => Priority::default(),
        };

        Self {
            id: ticket_id_at(now),
            issue_description,
            priority,
        }
    }
}

/// `IT-<unix seconds mod 100000>`. Not unique: two escalations in the same
/// second share an id.
pub fn ticket_id_at(now: DateTime<Utc>) -> String {
    format!("IT-{}", now.timestamp().rem_euclid(TICKET_ID_MODULUS))
}
