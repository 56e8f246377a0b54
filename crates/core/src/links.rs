//! URLs handed to customers and to the loyalty backend.
//!
//! Every builder trims a trailing `/` from the base and percent-encodes
//! emails as a single path segment.

use crate::types::BusinessId;

fn trim_base(base: &str) -> &str {
    base.strip_suffix('/').unwrap_or(base)
}

/// Public enrollment link: `{base}/join/{business_id}`.
#[must_use]
pub fn join_url(base: &str, business_id: &BusinessId) -> String {
    format!("{}/join/{business_id}", trim_base(base))
}

/// Wallet pass download: `{base}/api/pass/{business_id}/{email}`.
#[must_use]
pub fn pass_url(base: &str, business_id: &BusinessId, email: &str) -> String {
    format!(
        "{}/api/pass/{business_id}/{}",
        trim_base(base),
        urlencoding::encode(email)
    )
}

/// Stamp issuance endpoint: `{base}/api/stamp/{business_id}/{email}`.
#[must_use]
pub fn stamp_url(base: &str, business_id: &BusinessId, email: &str) -> String {
    format!(
        "{}/api/stamp/{business_id}/{}",
        trim_base(base),
        urlencoding::encode(email)
    )
}

/// Business login provisioning: `{base}/api/admin/createBusinessUser`.
#[must_use]
pub fn create_business_user_url(base: &str) -> String {
    format!("{}/api/admin/createBusinessUser", trim_base(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_trims_trailing_slash() {
        let id = BusinessId::new("biz1");
        assert_eq!(join_url("https://loyal.example/", &id), "https://loyal.example/join/biz1");
        assert_eq!(join_url("https://loyal.example", &id), "https://loyal.example/join/biz1");
    }

    #[test]
    fn test_email_is_one_segment() {
        let id = BusinessId::new("biz1");
        assert_eq!(
            pass_url("https://api.example", &id, "a+b/c@x.io"),
            "https://api.example/api/pass/biz1/a%2Bb%2Fc%40x.io"
        );
        assert_eq!(
            stamp_url("https://api.example/", &id, "ann@x.io"),
            "https://api.example/api/stamp/biz1/ann%40x.io"
        );
    }

    #[test]
    fn test_create_business_user_url() {
        assert_eq!(
            create_business_user_url("http://localhost:4000/"),
            "http://localhost:4000/api/admin/createBusinessUser"
        );
    }
}
