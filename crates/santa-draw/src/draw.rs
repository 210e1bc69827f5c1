use std::sync::Arc;

use rusqlite::TransactionBehavior;
use tracing::{debug, info, warn};

use santa_crypto::{CipherCodec, ReceiverError, ReceiverRef};
use santa_db::Database;
use santa_db::models::NewAssignment;
use santa_db::queries;
use santa_types::events::DrawEvent;
use santa_types::models::Exclusion;
use santa_types::{GroupId, UserId};

use crate::error::DrawError;
use crate::exclusion::ExclusionIndex;
use crate::notify::{DrawNotifier, NullNotifier};
use crate::solver::{Matching, MatchingSolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSummary {
    pub group_id: GroupId,
    pub participants: Vec<UserId>,
}

/// Outcome of a dry draw. `sample` is one valid assignment when feasible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub feasible: bool,
    pub sample: Option<Matching>,
}

/// Runs draws for groups stored in a `Database`.
///
/// Every mutating operation happens inside one `BEGIN IMMEDIATE`
/// transaction: SQLite's write lock serializes concurrent draws, and any
/// early return drops the transaction, which rolls it back.
pub struct DrawService {
    db: Arc<Database>,
    codec: Arc<CipherCodec>,
    solver: MatchingSolver,
    notifier: Arc<dyn DrawNotifier>,
}

impl DrawService {
    pub fn new(db: Arc<Database>, codec: Arc<CipherCodec>, solver: MatchingSolver) -> Self {
        Self {
            db,
            codec,
            solver,
            notifier: Arc::new(NullNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn DrawNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Compute and persist the group's draw. All or nothing.
    pub fn run(&self, group_id: GroupId) -> Result<DrawSummary, DrawError> {
        let participants = self.db.with_conn_mut(|conn| -> Result<Vec<UserId>, DrawError> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let group = queries::query_group(&tx, group_id)?
                .ok_or(DrawError::GroupNotFound(group_id))?;
            if group.is_drawn() || queries::has_assignments(&tx, group_id)? {
                return Err(DrawError::AlreadyDrawn(group_id));
            }

            let participants = queries::query_participants(&tx, group_id)?;
            if participants.len() < 2 {
                return Err(DrawError::InsufficientParticipants {
                    count: participants.len(),
                });
            }

            let exclusions = queries::query_exclusions(&tx, group_id)?;
            let index = ExclusionIndex::build(&participants, &exclusions);
            let matching = self
                .solver
                .solve(&participants, &index)?
                .ok_or(DrawError::Infeasible)?;
            debug_assert!(matching.is_valid_for(&participants, &index));

            let stale = queries::delete_assignments(&tx, group_id)?;
            if stale > 0 {
                warn!(group_id, stale, "Removed stale assignments before draw");
            }

            for (giver, receiver) in matching.iter() {
                let cipher = self.codec.encode_current(receiver)?;
                queries::insert_assignment(
                    &tx,
                    &NewAssignment {
                        group_id,
                        giver_user_id: giver,
                        receiver_cipher: Some(&cipher),
                        receiver_user_id: None,
                    },
                )?;
            }
            queries::mark_drawn(&tx, group_id)?;

            tx.commit()?;
            Ok(participants)
        })?;

        info!(
            group_id,
            participants = participants.len(),
            version = %self.codec.current_version(),
            "Draw committed"
        );

        for &user_id in &participants {
            self.notifier
                .notify(&DrawEvent::DrawCompleted { group_id, user_id });
        }

        Ok(DrawSummary {
            group_id,
            participants,
        })
    }

    /// Feasibility plus one sample assignment, without writing anything.
    /// Groups with fewer than two participants report infeasible.
    pub fn preview(&self, group_id: GroupId) -> Result<Preview, DrawError> {
        let (participants, exclusions) = self.db.with_conn(|conn| -> Result<_, DrawError> {
            if queries::query_group(conn, group_id)?.is_none() {
                return Err(DrawError::GroupNotFound(group_id));
            }
            let participants = queries::query_participants(conn, group_id)?;
            let exclusions = queries::query_exclusions(conn, group_id)?;
            Ok((participants, exclusions))
        })?;

        if participants.len() < 2 {
            return Ok(Preview {
                feasible: false,
                sample: None,
            });
        }

        let index = ExclusionIndex::build(&participants, &exclusions);
        let sample = self.solver.solve(&participants, &index)?;
        debug!(group_id, feasible = sample.is_some(), "Draw preview");

        Ok(Preview {
            feasible: sample.is_some(),
            sample,
        })
    }

    /// The receiver drawn for `giver_id`, or `None` if there is no draw
    /// yet or the stored receiver cannot be read.
    pub fn receiver_for(
        &self,
        group_id: GroupId,
        giver_id: UserId,
    ) -> Result<Option<UserId>, DrawError> {
        let row = self
            .db
            .with_conn(|conn| queries::query_assignment_for_giver(conn, group_id, giver_id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let receiver = ReceiverRef::from_columns(row.receiver_cipher, row.receiver_user_id);
        match receiver.resolve(&self.codec) {
            Ok(id) => Ok(Some(id)),
            Err(ReceiverError::Missing) => {
                warn!(group_id, assignment_id = row.id, "Assignment has no receiver");
                Ok(None)
            }
            Err(ReceiverError::Unreadable(e)) => {
                warn!(group_id, assignment_id = row.id, error = %e, "Unreadable receiver cipher");
                Ok(None)
            }
        }
    }

    /// Store an exclusion unless it would make the group's draw impossible.
    pub fn add_exclusion(&self, group_id: GroupId, exclusion: Exclusion) -> Result<(), DrawError> {
        if exclusion.user_id == exclusion.excluded_user_id {
            return Err(DrawError::SelfExclusion);
        }

        self.db.with_conn_mut(|conn| -> Result<(), DrawError> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let group = queries::query_group(&tx, group_id)?
                .ok_or(DrawError::GroupNotFound(group_id))?;
            if group.is_drawn() {
                return Err(DrawError::AlreadyDrawn(group_id));
            }

            let participants = queries::query_participants(&tx, group_id)?;
            for id in [exclusion.user_id, exclusion.excluded_user_id] {
                if !participants.contains(&id) {
                    return Err(DrawError::UnknownParticipant(id));
                }
            }

            queries::insert_exclusion(&tx, group_id, exclusion)?;

            let exclusions = queries::query_exclusions(&tx, group_id)?;
            let index = ExclusionIndex::build(&participants, &exclusions);
            if self.solver.solve(&participants, &index)?.is_none() {
                debug!(
                    group_id,
                    user_id = exclusion.user_id,
                    excluded_user_id = exclusion.excluded_user_id,
                    "Exclusion rejected, draw would be infeasible"
                );
                return Err(DrawError::Infeasible);
            }

            tx.commit()?;
            Ok(())
        })
    }
}
