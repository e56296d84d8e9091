use serde::{Deserialize, Serialize};

pub const ISSUE_SLOT: &str = "issue";
pub const PRIORITY_SLOT: &str = "priority";

/// Intents this fulfillment hook knows how to answer. Names match the bot
/// definition exactly; classification itself happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportIntent {
    PasswordReset,
    WiFiTroubleshooting,
    EmailAccess,
    EscalateToHuman,
}

impl SupportIntent {
    pub const ALL: [SupportIntent; 4] = [
        Self::PasswordReset,
        Self::WiFiTroubleshooting,
        Self::EmailAccess,
        Self::EscalateToHuman,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PasswordReset" => Some(Self::PasswordReset),
            "WiFiTroubleshooting" => Some(Self::WiFiTroubleshooting),
            "EmailAccess" => Some(Self::EmailAccess),
            "EscalateToHuman" => Some(Self::EscalateToHuman),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PasswordReset => "PasswordReset",
            Self::WiFiTroubleshooting => "WiFiTroubleshooting",
            Self::EmailAccess => "EmailAccess",
            Self::EscalateToHuman => "EscalateToHuman",
        }
    }

    /// Answered from the knowledge store, keyed by intent name.
    pub fn is_faq(self) -> bool {
        !matches!(self, Self::EscalateToHuman)
    }
}
