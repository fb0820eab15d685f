//! Records shared by the attendance flows and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A fingerprint bound to the first email that signed in with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceBinding {
    pub fingerprint: String,
    pub email: String,
}

/// The authenticated user behind a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner_email: String,
    pub member_ids: Vec<String>,
    /// Always `member_ids.len()`.
    pub member_count: i64,
    pub checked_in_ids: Vec<String>,
    /// Always `checked_in_ids.len()`.
    pub checked_in_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked_in_at: Option<DateTime<Utc>>,
}

impl ClassRecord {
    #[must_use]
    pub fn is_checked_in(&self, user_id: &str) -> bool {
        self.checked_in_ids.iter().any(|id| id == user_id)
    }

    /// Owners and members may read a class.
    #[must_use]
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.member_ids.iter().any(|id| id == user_id)
    }
}

/// Insert payload for a freshly created class.
#[derive(Clone, Debug)]
pub struct NewClass {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
}

impl NewClass {
    /// The record as first persisted: the owner is the only member and nobody is checked in.
    #[must_use]
    pub fn into_record(self) -> ClassRecord {
        ClassRecord {
            member_ids: vec![self.owner_id.clone()],
            member_count: 1,
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            owner_email: self.owner_email,
            checked_in_ids: Vec::new(),
            checked_in_count: 0,
            created_at: self.created_at,
            updated_at: self.created_at,
            last_checked_in_at: None,
        }
    }
}

/// Profile document keyed by the identity provider's user id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
