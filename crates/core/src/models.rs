use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(Self::Low),
            "medium" | "normal" | "moderate" => Some(Self::Medium),
            "high" | "urgent" | "critical" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub intent_name: String,
    #[serde(default)]
    pub slots: BTreeMap<String, Option<String>>,
}

impl IntentRequest {
    pub fn new(intent_name: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), Some(value.into()));
        self
    }

    /// Blank values count as absent.
    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots
            .get(name)
            .and_then(|value| value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentState {
    Fulfilled,
}

impl FulfillmentState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fulfilled => "Fulfilled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    PlainText,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "PlainText",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub intent_name: String,
    pub fulfillment_state: FulfillmentState,
    pub content_type: ContentType,
    pub text: String,
}

impl Reply {
    pub fn fulfilled(intent_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            fulfillment_state: FulfillmentState::Fulfilled,
            content_type: ContentType::PlainText,
            text: text.into(),
        }
    }
}
