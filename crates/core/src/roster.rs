//! Live customer list of one business with optimistic stamp reconciliation.
//!
//! The roster keeps the last snapshot delivered by the store subscription as
//! the authoritative base and overlays stamps that are still in flight.
//!
//! Reconciliation is last-write-wins by document version. Each optimistic
//! stamp records the store's update time of the customer document it was
//! issued against. A later snapshot carrying a strictly newer update time
//! *absorbs* the stamp, since the store has written the document since. Both
//! sides of that comparison come from the store's clock; this server's clock
//! never takes part. Until absorbed the stamp stays overlaid, even after the
//! backend confirmed it, because the backend may never touch the document.
//!
//! ```text
//!   begin_stamp ──► pending ──confirm──► confirmed ─┐
//!                      │                            ├─ snapshot(updated_at > base_version) ─► absorbed
//!                      └──roll_back──► removed      │
//!                      └────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Customer;
use crate::search::compare_customers;

/// Handle for one in-flight optimistic stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StampTicket(u64);

#[derive(Debug, Clone)]
struct PendingStamp {
    ticket: StampTicket,
    email_key: String,
    /// Store update time of the customer document when the stamp began.
    base_version: Option<DateTime<Utc>>,
    confirmed: bool,
}

/// One customer as displayed.
#[derive(Debug, Clone, Serialize)]
pub struct RosterRow {
    /// Customer with `stamps` set to the displayed count.
    pub customer: Customer,
    /// A stamp for this customer is waiting on the backend.
    pub issuing: bool,
}

/// Aggregates shown above the customer table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RosterStats {
    pub active_customers: usize,
    pub total_stamps: u64,
}

/// Customer list of one business.
#[derive(Debug, Default)]
pub struct CustomerRoster {
    base: Vec<Customer>,
    pending: Vec<PendingStamp>,
    next_ticket: u64,
}

impl CustomerRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the base with a fresh snapshot and absorb pending stamps the
    /// snapshot already reflects.
    pub fn apply_snapshot(&mut self, mut customers: Vec<Customer>) {
        customers.sort_by(compare_customers);
        self.base = customers;

        let base = &self.base;
        self.pending.retain(|p| {
            let Some(customer) = base.iter().find(|c| c.email_key() == p.email_key) else {
                return false;
            };
            !is_newer(customer.updated_at, p.base_version)
        });
    }

    /// Optimistically add one stamp to the customer with this email
    /// (case-insensitive).
    ///
    /// Returns `None` if no customer matches.
    pub fn begin_stamp(&mut self, email: &str) -> Option<StampTicket> {
        let email_key = email.to_lowercase();
        let base_version = self
            .base
            .iter()
            .find(|c| c.email_key() == email_key)?
            .updated_at;
        let ticket = StampTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending.push(PendingStamp {
            ticket,
            email_key,
            base_version,
            confirmed: false,
        });
        Some(ticket)
    }

    /// The backend accepted the stamp. It stays overlaid until absorbed.
    pub fn confirm(&mut self, ticket: StampTicket) {
        if let Some(p) = self.pending.iter_mut().find(|p| p.ticket == ticket) {
            p.confirmed = true;
        }
    }

    /// The backend rejected the stamp.
    ///
    /// Removes the overlay so the count returns to the snapshot value. A
    /// stamp already absorbed by a snapshot is left alone. Returns whether
    /// anything changed.
    pub fn roll_back(&mut self, ticket: StampTicket) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.ticket != ticket);
        self.pending.len() != before
    }

    fn overlay(&self, email_key: &str) -> (u32, bool) {
        self.pending
            .iter()
            .filter(|p| p.email_key == email_key)
            .fold((0, false), |(n, issuing), p| {
                (n + 1, issuing || !p.confirmed)
            })
    }

    /// Displayed stamp count for a customer, if present.
    #[must_use]
    pub fn displayed_stamps(&self, email: &str) -> Option<u32> {
        let key = email.to_lowercase();
        let customer = self.base.iter().find(|c| c.email_key() == key)?;
        Some(customer.stamps.saturating_add(self.overlay(&key).0))
    }

    /// All customers in display order with optimistic stamps applied.
    #[must_use]
    pub fn rows(&self) -> Vec<RosterRow> {
        self.base
            .iter()
            .map(|c| {
                let (extra, issuing) = self.overlay(&c.email_key());
                let mut customer = c.clone();
                customer.stamps = customer.stamps.saturating_add(extra);
                RosterRow { customer, issuing }
            })
            .collect()
    }

    /// Active customer count and total displayed stamps.
    #[must_use]
    pub fn stats(&self) -> RosterStats {
        let total_stamps = self
            .base
            .iter()
            .map(|c| u64::from(c.stamps) + u64::from(self.overlay(&c.email_key()).0))
            .sum();
        RosterStats {
            active_customers: self.base.len(),
            total_stamps,
        }
    }

    /// Look up a customer by document id (base values, no overlay).
    #[must_use]
    pub fn customer(&self, id: &str) -> Option<&Customer> {
        self.base.iter().find(|c| c.id.as_str() == id)
    }
}

/// Whether `seen` is a later store version than `base`. A document first
/// seen without an update time is superseded by any versioned copy.
fn is_newer(seen: Option<DateTime<Utc>>, base: Option<DateTime<Utc>>) -> bool {
    match (seen, base) {
        (Some(seen), Some(base)) => seen > base,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
