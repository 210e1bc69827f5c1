use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (groups, invitations, exclusions, assignments)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE groups (
                id          INTEGER PRIMARY KEY,
                owner_id    INTEGER NOT NULL,
                name        TEXT NOT NULL,
                drawn_at    TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE invitations (
                id           INTEGER PRIMARY KEY,
                group_id     INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id      INTEGER NOT NULL,
                accepted_at  TEXT,
                revoked_at   TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(group_id, user_id)
            );

            CREATE TABLE exclusions (
                id                INTEGER PRIMARY KEY,
                group_id          INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id           INTEGER NOT NULL,
                excluded_user_id  INTEGER NOT NULL,
                created_at        TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (user_id != excluded_user_id),
                UNIQUE(group_id, user_id, excluded_user_id)
            );

            -- receiver_user_id is the pre-encryption plaintext column, kept
            -- nullable so old rows stay readable
            CREATE TABLE assignments (
                id                INTEGER PRIMARY KEY,
                group_id          INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                giver_user_id     INTEGER NOT NULL,
                receiver_cipher   TEXT,
                receiver_user_id  INTEGER,
                created_at        TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(group_id, giver_user_id),
                UNIQUE(group_id, receiver_user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn self_exclusion_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute("INSERT INTO groups (id, owner_id, name) VALUES (1, 1, 'g')", [])
            .unwrap();
        let res = conn.execute(
            "INSERT INTO exclusions (group_id, user_id, excluded_user_id) VALUES (1, 2, 2)",
            [],
        );
        assert!(res.is_err());
    }
}
