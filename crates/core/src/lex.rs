//! Lex V2 fulfillment event and response shapes. Only the fields this hook
//! reads or writes are modelled; everything else in the event is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{IntentRequest, Reply};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexEvent {
    #[serde(default)]
    pub message_version: Option<String>,
    #[serde(default)]
    pub invocation_source: Option<String>,
    #[serde(default)]
    pub input_mode: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub input_transcript: Option<String>,
    #[serde(default)]
    pub bot: Option<Value>,
    pub session_state: LexSessionState,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexSessionState {
    pub intent: LexIntent,
    #[serde(default)]
    pub session_attributes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexIntent {
    pub name: String,
    #[serde(default)]
    pub slots: Option<BTreeMap<String, Option<LexSlot>>>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub confirmation_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexSlot {
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub value: Option<LexSlotValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LexSlotValue {
    #[serde(default)]
    pub original_value: Option<String>,
    #[serde(default)]
    pub interpreted_value: Option<String>,
    #[serde(default)]
    pub resolved_values: Vec<String>,
}

impl LexEvent {
    pub fn intent_name(&self) -> &str {
        &self.session_state.intent.name
    }

    pub fn to_intent_request(&self) -> IntentRequest {
        let slots = self
            .session_state
            .intent
            .slots
            .iter()
            .flatten()
            .map(|(name, slot)| {
                let value = slot
                    .as_ref()
                    .and_then(|slot| slot.value.as_ref())
                    .and_then(|value| value.interpreted_value.as_deref())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(ToString::to_string);
                (name.clone(), value)
            })
            .collect();

        IntentRequest {
            intent_name: self.session_state.intent.name.clone(),
            slots,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexResponse {
    pub session_state: LexResponseSessionState,
    pub messages: Vec<LexMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexResponseSessionState {
    pub dialog_action: LexDialogAction,
    pub intent: LexResponseIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LexDialogAction {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LexResponseIntent {
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexMessage {
    pub content_type: String,
    pub content: String,
}

impl LexResponse {
    /// Closes the dialog with the reply as its only message. Session
    /// attributes from the event are handed back untouched.
    pub fn close(reply: &Reply, session_attributes: Option<BTreeMap<String, String>>) -> Self {
        Self {
            session_state: LexResponseSessionState {
                dialog_action: LexDialogAction {
                    kind: "Close".to_string(),
                },
                intent: LexResponseIntent {
                    name: reply.intent_name.clone(),
                    state: reply.fulfillment_state.as_str().to_string(),
                },
                session_attributes,
            },
            messages: vec![LexMessage {
                content_type: reply.content_type.as_str().to_string(),
                content: reply.text.clone(),
            }],
        }
    }
}
