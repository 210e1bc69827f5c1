/// Database row types. These map directly to SQLite rows.
/// Distinct from santa-types models to keep the DB layer independent.
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use santa_types::models::Group;
use santa_types::{GroupId, UserId};

pub struct GroupRow {
    pub id: GroupId,
    pub owner_id: UserId,
    pub name: String,
    pub drawn_at: Option<String>,
    pub created_at: String,
}

impl GroupRow {
    pub fn is_drawn(&self) -> bool {
        self.drawn_at.is_some()
    }

    pub fn into_group(self) -> Group {
        Group {
            id: self.id,
            owner_id: self.owner_id,
            drawn_at: self.drawn_at.as_deref().map(|s| parse_timestamp(s, self.id)),
            created_at: parse_timestamp(&self.created_at, self.id),
            name: self.name,
        }
    }
}

pub struct AssignmentRow {
    pub id: i64,
    pub group_id: GroupId,
    pub giver_user_id: UserId,
    pub receiver_cipher: Option<String>,
    pub receiver_user_id: Option<UserId>,
}

/// Insert payload for one assignment row.
pub struct NewAssignment<'a> {
    pub group_id: GroupId,
    pub giver_user_id: UserId,
    pub receiver_cipher: Option<&'a str>,
    pub receiver_user_id: Option<UserId>,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_timestamp(raw: &str, group_id: GroupId) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on group {}: {}", raw, group_id, e);
            DateTime::default()
        })
}
