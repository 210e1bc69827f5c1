use anyhow::Result;
use rusqlite::{Connection, Row, params};

use santa_types::models::{Exclusion, Group};
use santa_types::{GroupId, UserId};

use crate::Database;
use crate::models::{AssignmentRow, GroupRow, NewAssignment};

impl Database {
    // -- Groups --

    pub fn create_group(&self, owner_id: UserId, name: &str) -> Result<GroupId> {
        self.with_conn_mut(|conn| insert_group(conn, owner_id, name))
    }

    pub fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        let row = self.with_conn(|conn| query_group(conn, id))?;
        Ok(row.map(GroupRow::into_group))
    }

    // -- Invitations --

    pub fn invite(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.with_conn_mut(|conn| insert_invitation(conn, group_id, user_id))
    }

    /// Returns false when there is no pending invitation to accept.
    pub fn accept_invitation(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE invitations SET accepted_at = datetime('now')
                 WHERE group_id = ?1 AND user_id = ?2 AND accepted_at IS NULL AND revoked_at IS NULL",
                params![group_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn revoke_invitation(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE invitations SET revoked_at = datetime('now')
                 WHERE group_id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
                params![group_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    // -- Exclusions --

    pub fn remove_exclusion(&self, group_id: GroupId, exclusion: Exclusion) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM exclusions WHERE group_id = ?1 AND user_id = ?2 AND excluded_user_id = ?3",
                params![group_id, exclusion.user_id, exclusion.excluded_user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_exclusions(&self, group_id: GroupId) -> Result<Vec<Exclusion>> {
        self.with_conn(|conn| query_exclusions(conn, group_id))
    }

    // -- Assignments --

    pub fn get_assignments(&self, group_id: GroupId) -> Result<Vec<AssignmentRow>> {
        self.with_conn(|conn| query_assignments(conn, group_id))
    }

    pub fn count_assignments(&self, group_id: GroupId) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM assignments WHERE group_id = ?1",
                [group_id],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }
}

// The free functions below take a plain `&Connection` so they compose
// inside a caller's transaction (`Transaction` derefs to `Connection`).

pub fn insert_group(conn: &Connection, owner_id: UserId, name: &str) -> Result<GroupId> {
    conn.execute(
        "INSERT INTO groups (owner_id, name) VALUES (?1, ?2)",
        params![owner_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_group(conn: &Connection, id: GroupId) -> Result<Option<GroupRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, name, drawn_at, created_at FROM groups WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(GroupRow {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                drawn_at: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub fn mark_drawn(conn: &Connection, id: GroupId) -> Result<()> {
    conn.execute(
        "UPDATE groups SET drawn_at = datetime('now') WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

pub fn insert_invitation(conn: &Connection, group_id: GroupId, user_id: UserId) -> Result<()> {
    conn.execute(
        "INSERT INTO invitations (group_id, user_id) VALUES (?1, ?2)",
        params![group_id, user_id],
    )?;
    Ok(())
}

/// Owner plus every accepted, non-revoked invitee, ascending and unique.
pub fn query_participants(conn: &Connection, group_id: GroupId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT owner_id FROM groups WHERE id = ?1
         UNION
         SELECT user_id FROM invitations
         WHERE group_id = ?1 AND accepted_at IS NOT NULL AND revoked_at IS NULL
         ORDER BY 1",
    )?;

    let ids = stmt
        .query_map([group_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<UserId>, _>>()?;

    Ok(ids)
}

pub fn insert_exclusion(conn: &Connection, group_id: GroupId, exclusion: Exclusion) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO exclusions (group_id, user_id, excluded_user_id) VALUES (?1, ?2, ?3)",
        params![group_id, exclusion.user_id, exclusion.excluded_user_id],
    )?;
    Ok(())
}

pub fn query_exclusions(conn: &Connection, group_id: GroupId) -> Result<Vec<Exclusion>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, excluded_user_id FROM exclusions WHERE group_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([group_id], |row| Ok(Exclusion::new(row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn has_assignments(conn: &Connection, group_id: GroupId) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM assignments WHERE group_id = ?1)",
        [group_id],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub fn delete_assignments(conn: &Connection, group_id: GroupId) -> Result<usize> {
    let n = conn.execute("DELETE FROM assignments WHERE group_id = ?1", [group_id])?;
    Ok(n)
}

pub fn insert_assignment(conn: &Connection, new: &NewAssignment<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO assignments (group_id, giver_user_id, receiver_cipher, receiver_user_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            new.group_id,
            new.giver_user_id,
            new.receiver_cipher,
            new.receiver_user_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const ASSIGNMENT_COLUMNS: &str =
    "id, group_id, giver_user_id, receiver_cipher, receiver_user_id";

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        giver_user_id: row.get(2)?,
        receiver_cipher: row.get(3)?,
        receiver_user_id: row.get(4)?,
    })
}

pub fn query_assignment_for_giver(
    conn: &Connection,
    group_id: GroupId,
    giver_user_id: UserId,
) -> Result<Option<AssignmentRow>> {
    let sql = format!(
        "SELECT {} FROM assignments WHERE group_id = ?1 AND giver_user_id = ?2",
        ASSIGNMENT_COLUMNS
    );
    let row = conn
        .query_row(&sql, params![group_id, giver_user_id], assignment_from_row)
        .optional()?;
    Ok(row)
}

pub fn query_assignments(conn: &Connection, group_id: GroupId) -> Result<Vec<AssignmentRow>> {
    let sql = format!(
        "SELECT {} FROM assignments WHERE group_id = ?1 ORDER BY id",
        ASSIGNMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([group_id], assignment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Keyset page over all assignments in primary-key order.
pub fn query_assignments_after(
    conn: &Connection,
    after_id: i64,
    limit: usize,
) -> Result<Vec<AssignmentRow>> {
    let sql = format!(
        "SELECT {} FROM assignments WHERE id > ?1 ORDER BY id LIMIT ?2",
        ASSIGNMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![after_id, i64::try_from(limit).unwrap_or(i64::MAX)],
            assignment_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace a receiver cipher only if it still holds `expected`.
/// Returns false when the row changed underneath us.
pub fn update_receiver_cipher(
    conn: &Connection,
    id: i64,
    expected: &str,
    replacement: &str,
) -> Result<bool> {
    let n = conn.execute(
        "UPDATE assignments SET receiver_cipher = ?3 WHERE id = ?1 AND receiver_cipher = ?2",
        params![id, expected, replacement],
    )?;
    Ok(n > 0)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_group() -> (Database, GroupId) {
        let db = Database::open_in_memory().unwrap();
        let gid = db.create_group(1, "Office").unwrap();
        (db, gid)
    }

    #[test]
    fn participants_are_owner_plus_accepted() {
        let (db, gid) = db_with_group();
        for uid in [2, 3, 4, 5] {
            db.invite(gid, uid).unwrap();
        }
        assert!(db.accept_invitation(gid, 3).unwrap());
        assert!(db.accept_invitation(gid, 2).unwrap());
        assert!(db.accept_invitation(gid, 5).unwrap());
        assert!(db.revoke_invitation(gid, 5).unwrap());
        // 4 never accepted
        assert!(!db.accept_invitation(gid, 9).unwrap());

        let ids = db.with_conn(|conn| query_participants(conn, gid)).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn owner_invited_is_not_duplicated() {
        let (db, gid) = db_with_group();
        db.invite(gid, 1).unwrap();
        db.accept_invitation(gid, 1).unwrap();
        let ids = db.with_conn(|conn| query_participants(conn, gid)).unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn exclusions_insert_is_idempotent() {
        let (db, gid) = db_with_group();
        db.with_conn_mut(|conn| {
            insert_exclusion(conn, gid, Exclusion::new(1, 2))?;
            insert_exclusion(conn, gid, Exclusion::new(1, 2))?;
            insert_exclusion(conn, gid, Exclusion::new(2, 1))
        })
        .unwrap();
        assert_eq!(db.get_exclusions(gid).unwrap().len(), 2);
        assert!(db.remove_exclusion(gid, Exclusion::new(2, 1)).unwrap());
        assert_eq!(db.get_exclusions(gid).unwrap(), vec![Exclusion::new(1, 2)]);
    }

    #[test]
    fn assignment_paging_and_cas_update() {
        let (db, gid) = db_with_group();
        db.with_conn_mut(|conn| {
            for giver in 1..=5 {
                let cipher = format!("v1:{}", giver);
                insert_assignment(
                    conn,
                    &NewAssignment {
                        group_id: gid,
                        giver_user_id: giver,
                        receiver_cipher: Some(&cipher),
                        receiver_user_id: None,
                    },
                )?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let first = db
            .with_conn(|conn| query_assignments_after(conn, 0, 2))
            .unwrap();
        assert_eq!(first.len(), 2);
        let rest = db
            .with_conn(|conn| query_assignments_after(conn, first[1].id, 10))
            .unwrap();
        assert_eq!(rest.len(), 3);

        let id = first[0].id;
        let swapped = db
            .with_conn_mut(|conn| update_receiver_cipher(conn, id, "v1:1", "v2:1"))
            .unwrap();
        assert!(swapped);
        let stale = db
            .with_conn_mut(|conn| update_receiver_cipher(conn, id, "v1:1", "v2:x"))
            .unwrap();
        assert!(!stale);

        let row = db
            .with_conn(|conn| query_assignment_for_giver(conn, gid, 1))
            .unwrap()
            .unwrap();
        assert_eq!(row.receiver_cipher.as_deref(), Some("v2:1"));
        assert_eq!(db.count_assignments(gid).unwrap(), 5);
    }

    #[test]
    fn mark_drawn_sets_timestamp() {
        let (db, gid) = db_with_group();
        assert!(db.get_group(gid).unwrap().unwrap().drawn_at.is_none());
        db.with_conn_mut(|conn| mark_drawn(conn, gid)).unwrap();
        let group = db.get_group(gid).unwrap().unwrap();
        assert!(group.drawn_at.is_some());
        assert_eq!(group.owner_id, 1);
        assert!(db.with_conn(|conn| query_group(conn, gid)).unwrap().unwrap().is_drawn());
    }

    #[test]
    fn oversized_page_limit_reads_everything() {
        let (db, gid) = db_with_group();
        db.with_conn_mut(|conn| {
            for giver in 1..=4 {
                insert_assignment(
                    conn,
                    &NewAssignment {
                        group_id: gid,
                        giver_user_id: giver,
                        receiver_cipher: Some("v1:x"),
                        receiver_user_id: None,
                    },
                )?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let rows = db
            .with_conn(|conn| query_assignments_after(conn, 0, usize::MAX))
            .unwrap();
        assert_eq!(rows.len(), 4);
        let page = db
            .with_conn(|conn| query_assignments_after(conn, rows[1].id, 1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, rows[2].id);
    }
}
