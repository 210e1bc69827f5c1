use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use santa_crypto::{CipherCodec, extract_version};
use santa_db::Database;
use santa_db::queries;

/// Read-only audit of every stored receiver cipher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub total: u64,
    pub with_cipher: u64,
    /// No cipher, but the plaintext receiver column is set.
    pub legacy_only: u64,
    pub ok: u64,
    pub fail: u64,
    /// Cipher count per version tag.
    pub versions: BTreeMap<String, u64>,
}

impl VerifyReport {
    pub fn has_failures(&self) -> bool {
        self.fail > 0
    }
}

pub fn verify_ciphers(db: &Database, codec: &CipherCodec, chunk_size: usize) -> Result<VerifyReport> {
    let chunk_size = chunk_size.max(1);
    let mut report = VerifyReport::default();
    let mut last_id = 0i64;

    loop {
        let rows = db.with_conn(|conn| queries::query_assignments_after(conn, last_id, chunk_size))?;
        let Some(last) = rows.last() else {
            break;
        };
        last_id = last.id;

        for row in &rows {
            report.total += 1;
            match row.receiver_cipher.as_deref().filter(|c| !c.is_empty()) {
                Some(cipher) => {
                    report.with_cipher += 1;
                    *report
                        .versions
                        .entry(extract_version(cipher).to_string())
                        .or_default() += 1;
                    match codec.decode(cipher) {
                        Ok(_) => report.ok += 1,
                        Err(e) => {
                            warn!(assignment_id = row.id, group_id = row.group_id, error = %e, "Cipher failed verification");
                            report.fail += 1;
                        }
                    }
                }
                None if row.receiver_user_id.is_some() => report.legacy_only += 1,
                None => {}
            }
        }
    }

    info!(
        total = report.total,
        with_cipher = report.with_cipher,
        legacy_only = report.legacy_only,
        ok = report.ok,
        fail = report.fail,
        "Cipher verification finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use santa_crypto::keys::generate_key;
    use santa_crypto::{CipherVersion, Keyring};
    use santa_db::models::NewAssignment;

    #[test]
    fn one_corrupt_cipher_in_a_large_batch() {
        let db = Database::open_in_memory().unwrap();
        let gid = db.create_group(1, "Big").unwrap();
        let codec = CipherCodec::new(
            Keyring::new()
                .with_key(1, generate_key())
                .with_key(2, generate_key()),
            CipherVersion::Numbered(2),
        )
        .unwrap();

        db.with_conn_mut(|conn| {
            for giver in 1..=250i64 {
                let cipher = match giver {
                    13 => "v2:garbled".to_string(),
                    g if g % 5 == 0 => codec.encode(g, CipherVersion::Numbered(1)).unwrap(),
                    g if g % 7 == 0 => codec.encode(g, CipherVersion::Legacy).unwrap(),
                    g => codec.encode_current(g).unwrap(),
                };
                let legacy_only = giver > 240;
                queries::insert_assignment(
                    conn,
                    &NewAssignment {
                        group_id: gid,
                        giver_user_id: giver,
                        receiver_cipher: (!legacy_only).then_some(cipher.as_str()),
                        receiver_user_id: legacy_only.then_some(giver),
                    },
                )?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let report = verify_ciphers(&db, &codec, 64).unwrap();
        assert_eq!(report.total, 250);
        assert_eq!(report.legacy_only, 10);
        assert_eq!(report.with_cipher, 240);
        assert_eq!(report.fail, 1);
        assert_eq!(report.ok, 239);
        assert!(report.has_failures());

        // 5..=240 step 5 -> 48; multiples of 7 not of 5 up to 240 -> 34 - 6 = 28
        assert_eq!(report.versions["1"], 48);
        assert_eq!(report.versions["legacy"], 28);
        assert_eq!(report.versions["2"], 240 - 48 - 28);
    }

    #[test]
    fn empty_table_is_clean() {
        let db = Database::open_in_memory().unwrap();
        let codec = CipherCodec::new(
            Keyring::new().with_key(1, generate_key()),
            CipherVersion::Numbered(1),
        )
        .unwrap();
        let report = verify_ciphers(&db, &codec, 10).unwrap();
        assert_eq!(report, VerifyReport::default());
        assert!(!report.has_failures());
    }
}
