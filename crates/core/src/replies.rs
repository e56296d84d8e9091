//! User-facing reply texts. The conversational surface only ever sees these or
//! an answer from the knowledge store.

use crate::models::Priority;

pub const GENERIC_DEFAULT: &str = "I can help with IT issues. How can I assist you today?";

pub const UNRECOGNIZED_INTENT: &str = "I'm not sure how to help with that. I can assist with password resets, WiFi issues, and email problems.";

pub const KNOWLEDGE_BASE_UNAVAILABLE: &str =
    "I'm having trouble accessing my knowledge base right now.";

pub const KNOWLEDGE_BASE_NOT_CONFIGURED: &str =
    "Configuration error: knowledge base table name is not set.";

pub const EMPTY_ARTICLE: &str = "I found an article but it seems to be empty.";

pub const TICKET_FAILED: &str =
    "I'm sorry, I couldn't create your ticket. Please email IT support directly.";

pub const ISSUE_NOT_PROVIDED: &str = "Not provided";

pub fn ticket_created(ticket_id: &str, priority: Priority) -> String {
    format!(
        "Thanks! I've created ticket #{ticket_id} and assigned it {priority} priority. A technician will contact you shortly."
    )
}
