//! User records linking an identity to a role.

use serde::Serialize;

use crate::types::{BusinessId, Role, UserId};

/// The `users/{uid}` record.
///
/// `business_id` is present iff the role is [`Role::Business`]; the gate
/// treats a business record without one as a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub uid: UserId,
    pub email: Option<String>,
    pub role: Role,
    pub business_id: Option<BusinessId>,
}
