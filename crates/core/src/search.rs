//! Local, case-insensitive filtering of already-loaded records.
//!
//! Search never queries the store: it runs over the subscribed set held in
//! memory, so results follow live updates for free.

use std::cmp::Ordering;

use crate::models::{Business, Customer};

/// Records that can be matched by a free-text query.
pub trait Searchable {
    /// Fields a query is matched against. Missing fields never match.
    fn search_fields(&self) -> Vec<Option<&str>>;
}

impl Searchable for Business {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.name.as_str()),
            self.promo_message.as_deref(),
            Some(self.pass_type_identifier.as_str()),
        ]
    }
}

impl Searchable for Customer {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.name.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
        ]
    }
}

/// Whether `item` matches `query`.
///
/// The query is trimmed and lowercased; an empty query matches everything.
#[must_use]
pub fn matches<T: Searchable>(item: &T, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    item.search_fields()
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Keep the items matching `query`, preserving order.
pub fn filter<'a, T: Searchable>(items: impl IntoIterator<Item = &'a T>, query: &str) -> Vec<&'a T>
where
    T: 'a,
{
    items.into_iter().filter(|item| matches(*item, query)).collect()
}

/// Roster order: by name (falling back to email), case-insensitively, ties
/// broken by the raw value and then the document id.
#[must_use]
pub fn compare_customers(a: &Customer, b: &Customer) -> Ordering {
    let (ka, kb) = (a.display_name(), b.display_name());
    ka.to_lowercase()
        .cmp(&kb.to_lowercase())
        .then_with(|| ka.cmp(kb))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BusinessId, CustomerId};

    fn business(id: &str, name: &str, promo: Option<&str>) -> Business {
        Business {
            id: BusinessId::new(id),
            name: name.to_owned(),
            color: "#000".to_owned(),
            goal_stamps: 10,
            promo_message: promo.map(str::to_owned),
            logo_url: None,
            pass_type_identifier: format!("pass.com.{id}"),
            team_identifier: "T".to_owned(),
            logo_text: None,
            created_at: None,
        }
    }

    fn customer(id: &str, name: Option<&str>, email: &str, phone: Option<&str>) -> Customer {
        Customer {
            id: CustomerId::new(id),
            name: name.map(str::to_owned),
            email: Some(email.to_owned()),
            phone: phone.map(str::to_owned),
            birthday: None,
            business_id: BusinessId::new("b"),
            stamps: 0,
            rewards_earned: None,
            rewards_redeemed: None,
            last_stamp_at: None,
            last_reward_earned_at: None,
            last_reward_redeemed_at: None,
            push_token: None,
            device_library_identifier: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_promo_only_substring_matches_exactly_one() {
        let list = [
            business("a", "Kess Coffee", Some("Free latte on 10th visit")),
            business("b", "Bagel Barn", Some("Double stamps Tuesdays")),
            business("c", "Tea Time", None),
        ];
        let hits = filter(&list, "LATTE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "a");
    }

    #[test]
    fn test_business_matches_pass_type() {
        let list = [business("kess", "Kess", None), business("tea", "Tea", None)];
        let hits = filter(&list, "com.tea");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "tea");
    }

    #[test]
    fn test_empty_query_keeps_all() {
        let list = [business("a", "A", None), business("b", "B", None)];
        assert_eq!(filter(&list, "   ").len(), 2);
    }

    #[test]
    fn test_customer_fields() {
        let list = [
            customer("1", Some("Ann"), "ann@example.com", Some("555-0100")),
            customer("2", None, "bob@example.com", None),
        ];
        assert_eq!(filter(&list, "0100").len(), 1);
        assert_eq!(filter(&list, "BOB@").len(), 1);
        assert_eq!(filter(&list, "example").len(), 2);
    }

    #[test]
    fn test_customer_order() {
        let mut list = [
            customer("1", Some("bob"), "z@example.com", None),
            customer("2", None, "alice@example.com", None),
            customer("3", Some("Bob"), "y@example.com", None),
        ];
        list.sort_by(compare_customers);
        let ids: Vec<_> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }
}
