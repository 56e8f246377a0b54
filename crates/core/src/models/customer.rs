//! Enrolled customers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BusinessId, CustomerId};

/// A customer as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: Option<String>,
    /// Email as entered at enrollment. Compare with [`Customer::email_key`].
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<String>,
    pub business_id: BusinessId,
    /// Stamp count; a missing field reads as 0.
    pub stamps: u32,
    pub rewards_earned: Option<u32>,
    pub rewards_redeemed: Option<u32>,
    pub last_stamp_at: Option<DateTime<Utc>>,
    pub last_reward_earned_at: Option<DateTime<Utc>>,
    pub last_reward_redeemed_at: Option<DateTime<Utc>>,
    /// Wallet push token; set once the pass is installed.
    pub push_token: Option<String>,
    pub device_library_identifier: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Store-side update time of the document.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Customer {
    /// Name, falling back to email, falling back to empty.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or_default()
    }

    /// Lowercased email used for matching stamps and events.
    #[must_use]
    pub fn email_key(&self) -> String {
        self.email.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Whether the wallet pass has been added to a device.
    #[must_use]
    pub const fn card_installed(&self) -> bool {
        self.push_token.is_some()
    }

    /// Stored rewards-earned count, or `stamps / goal` when absent.
    #[must_use]
    pub fn rewards_earned_or_derived(&self, goal_stamps: u32) -> u32 {
        self.rewards_earned
            .unwrap_or_else(|| self.stamps.checked_div(goal_stamps).unwrap_or(0))
    }
}

/// A customer about to be created by the enrollment form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub business_id: BusinessId,
}
