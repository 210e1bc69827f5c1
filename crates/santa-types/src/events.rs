use serde::{Deserialize, Serialize};

use crate::{GroupId, UserId};

/// Domain events emitted by the draw engine after a transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DrawEvent {
    /// A group's draw was committed. Emitted once per participant so the
    /// notification service can tell each of them to look up their receiver.
    DrawCompleted { group_id: GroupId, user_id: UserId },
}
