use thiserror::Error;

use santa_crypto::CryptoError;
use santa_types::{GroupId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("cannot compute a derangement of fewer than two participants (got {0})")]
    TooFewParticipants(usize),

    #[error("participant {0} appears more than once")]
    DuplicateParticipant(UserId),
}

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// Another draw committed first. Benign: nothing was changed.
    #[error("group {0} has already been drawn")]
    AlreadyDrawn(GroupId),

    #[error("a draw needs at least two participants, group has {count}")]
    InsufficientParticipants { count: usize },

    /// Inputs were individually valid but no assignment satisfies them all.
    #[error("these exclusions make the draw impossible")]
    Infeasible,

    #[error("user {0} is not a participant of this group")]
    UnknownParticipant(UserId),

    #[error("a participant cannot exclude themselves")]
    SelfExclusion,

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for DrawError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}

impl DrawError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GroupNotFound(_) => "group_not_found",
            Self::AlreadyDrawn(_) => "already_drawn",
            Self::InsufficientParticipants { .. } => "insufficient_participants",
            Self::Infeasible => "infeasible",
            Self::UnknownParticipant(_) => "unknown_participant",
            Self::SelfExclusion => "self_exclusion",
            Self::Solver(_) => "invalid_participants",
            Self::Crypto(_) => "crypto_error",
            Self::Storage(_) => "storage_error",
        }
    }
}
