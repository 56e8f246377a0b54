//! Customer activity events written by the pass-generation service.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BusinessId, EventId};

/// Kind of activity event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EventKind {
    WalletAdded,
    StampIssued,
    RewardEarned,
    RewardRedeemed,
    /// Any type this application does not know about, kept verbatim.
    Other(String),
}

impl EventKind {
    /// Map a stored `type` string.
    #[must_use]
    pub fn from_stored(s: &str) -> Self {
        match s {
            "wallet_added" => Self::WalletAdded,
            "stamp_issued" => Self::StampIssued,
            "reward_earned" => Self::RewardEarned,
            "reward_redeemed" => Self::RewardRedeemed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Short badge label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::WalletAdded => "Wallet Added",
            Self::StampIssued => "Stamp",
            Self::RewardEarned => "Reward Earned",
            Self::RewardRedeemed => "Reward Redeemed",
            Self::Other(s) if s.is_empty() => "Event",
            Self::Other(s) => s,
        }
    }

    /// CSS modifier for the badge.
    #[must_use]
    pub const fn tone(&self) -> &'static str {
        match self {
            Self::WalletAdded => "blue",
            Self::StampIssued => "brand",
            Self::RewardEarned => "green",
            Self::RewardRedeemed => "purple",
            Self::Other(_) => "muted",
        }
    }
}

/// One entry of a customer's activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEvent {
    pub id: EventId,
    pub business_id: BusinessId,
    pub email: String,
    pub kind: EventKind,
    pub note: Option<String>,
    pub delta: Option<i64>,
    pub stamps_at: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ActivityEvent {
    /// Human-readable title for the timeline.
    #[must_use]
    pub fn title(&self) -> String {
        match &self.kind {
            EventKind::StampIssued => match self.delta {
                Some(d) if d != 0 => format!("Stamp issued ({d:+})"),
                _ => "Stamp issued (+1)".to_owned(),
            },
            EventKind::RewardEarned => match self.stamps_at {
                Some(n) => format!("Reward unlocked at {n} stamps"),
                None => "Reward unlocked".to_owned(),
            },
            EventKind::RewardRedeemed => "Reward redeemed".to_owned(),
            EventKind::WalletAdded => "Pass added to Wallet".to_owned(),
            EventKind::Other(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> ActivityEvent {
        ActivityEvent {
            id: EventId::new("e1"),
            business_id: BusinessId::new("b1"),
            email: "ann@example.com".to_owned(),
            kind,
            note: None,
            delta: None,
            stamps_at: None,
            created_at: None,
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(EventKind::from_stored("wallet_added").label(), "Wallet Added");
        assert_eq!(EventKind::from_stored("stamp_issued").label(), "Stamp");
        assert_eq!(EventKind::from_stored("reward_earned").label(), "Reward Earned");
        assert_eq!(EventKind::from_stored("reward_redeemed").label(), "Reward Redeemed");
        assert_eq!(EventKind::from_stored("pass_updated").label(), "pass_updated");
        assert_eq!(EventKind::from_stored("").label(), "Event");
    }

    #[test]
    fn test_titles() {
        assert_eq!(event(EventKind::StampIssued).title(), "Stamp issued (+1)");
        let mut e = event(EventKind::StampIssued);
        e.delta = Some(2);
        assert_eq!(e.title(), "Stamp issued (+2)");

        let mut e = event(EventKind::RewardEarned);
        e.stamps_at = Some(10);
        assert_eq!(e.title(), "Reward unlocked at 10 stamps");

        assert_eq!(event(EventKind::RewardRedeemed).title(), "Reward redeemed");
        assert_eq!(event(EventKind::WalletAdded).title(), "Pass added to Wallet");
    }
}
