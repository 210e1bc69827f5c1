use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GroupId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    pub drawn_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `user_id` must never be assigned `excluded_user_id` as a receiver.
/// Directional: the reverse pairing stays allowed unless stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub user_id: UserId,
    pub excluded_user_id: UserId,
}

impl Exclusion {
    pub fn new(user_id: UserId, excluded_user_id: UserId) -> Self {
        Self {
            user_id,
            excluded_user_id,
        }
    }
}

/// One giver -> receiver edge of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub giver: UserId,
    pub receiver: UserId,
}
