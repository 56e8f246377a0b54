//! Business (tenant) records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BusinessId, PassTypeIdentifier};

/// Reward goal used when a stored business has none.
pub const DEFAULT_GOAL_STAMPS: u32 = 10;

/// Brand color used when the create form leaves it blank.
pub const DEFAULT_BRAND_COLOR: &str = "#2196f3";

/// A business as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct Business {
    /// Store-assigned document id.
    pub id: BusinessId,
    /// Display name.
    pub name: String,
    /// Brand color (CSS hex).
    pub color: String,
    /// Stamps needed for one reward.
    pub goal_stamps: u32,
    /// Promotional text shown on the pass.
    pub promo_message: Option<String>,
    /// Logo image URL.
    pub logo_url: Option<String>,
    /// Wallet pass-type identifier (kept as stored).
    pub pass_type_identifier: String,
    /// Wallet team identifier.
    pub team_identifier: String,
    /// Text printed next to the logo on the pass.
    pub logo_text: Option<String>,
    /// When the business was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// A validated business ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBusiness {
    pub name: String,
    pub color: String,
    pub goal_stamps: u32,
    pub promo_message: Option<String>,
    pub logo_url: Option<String>,
    pub pass_type_identifier: PassTypeIdentifier,
    pub team_identifier: String,
}

impl NewBusiness {
    /// Text shown next to the logo on the pass: `"<name> Loyalty"`.
    #[must_use]
    pub fn logo_text(&self) -> String {
        format!("{} Loyalty", self.name)
    }

    /// Asset folder slug: lowercase name, whitespace runs collapsed to `-`.
    #[must_use]
    pub fn asset_slug(&self) -> String {
        self.name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Storage path of the pass logo image.
    #[must_use]
    pub fn logo_path(&self) -> String {
        format!("businessAssets/{}/logo.png", self.asset_slug())
    }

    /// Storage path of the pass icon image.
    #[must_use]
    pub fn icon_path(&self) -> String {
        format!("businessAssets/{}/icon.png", self.asset_slug())
    }
}
