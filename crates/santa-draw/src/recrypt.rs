use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use santa_crypto::{CipherCodec, CipherVersion, extract_version};
use santa_db::Database;
use santa_db::queries;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct RecryptOptions {
    /// Only touch ciphers currently at one of these versions.
    pub from_versions: Option<Vec<CipherVersion>>,
    /// Rewrite ciphers that are already at the current version.
    pub force: bool,
    pub chunk_size: usize,
    /// Count what would change without writing.
    pub dry_run: bool,
}

impl Default for RecryptOptions {
    fn default() -> Self {
        Self {
            from_versions: None,
            force: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            dry_run: false,
        }
    }
}

/// `total == updated + skipped + failed` after every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecryptReport {
    pub total: u64,
    pub eligible: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub dry_run: bool,
}

impl RecryptReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Brings stored receiver ciphers up to the codec's current version.
///
/// Rows are walked in primary-key order, one chunk at a time. Each chunk's
/// writes commit on their own, so an interrupted run keeps its progress.
/// Rows holding only the legacy plaintext column are left alone.
pub struct RecryptJob {
    db: Arc<Database>,
    codec: Arc<CipherCodec>,
}

struct Rewrite {
    id: i64,
    old: String,
    new: String,
}

impl RecryptJob {
    pub fn new(db: Arc<Database>, codec: Arc<CipherCodec>) -> Self {
        Self { db, codec }
    }

    pub fn run(&self, opts: &RecryptOptions) -> Result<RecryptReport> {
        let target = self.codec.current_version();
        let chunk_size = opts.chunk_size.max(1);
        let mut report = RecryptReport {
            dry_run: opts.dry_run,
            ..Default::default()
        };
        let mut last_id = 0i64;

        info!(
            target_version = %target,
            force = opts.force,
            dry_run = opts.dry_run,
            chunk_size,
            "Recrypt started"
        );

        loop {
            let rows = self
                .db
                .with_conn(|conn| queries::query_assignments_after(conn, last_id, chunk_size))?;
            let Some(last) = rows.last() else {
                break;
            };
            last_id = last.id;

            let mut rewrites = Vec::new();
            for row in rows {
                report.total += 1;

                let Some(old) = row.receiver_cipher.filter(|c| !c.is_empty()) else {
                    report.skipped += 1;
                    continue;
                };
                let version = extract_version(&old);
                if let Some(filter) = &opts.from_versions {
                    if !filter.contains(&version) {
                        report.skipped += 1;
                        continue;
                    }
                }
                report.eligible += 1;

                if self.codec.is_current(&old) && !opts.force {
                    report.skipped += 1;
                    continue;
                }

                let reencoded = self
                    .codec
                    .decode(&old)
                    .map_err(|e| e.to_string())
                    .and_then(|plain| self.codec.encode(plain, target).map_err(|e| e.to_string()));
                match reencoded {
                    Ok(new) => rewrites.push(Rewrite {
                        id: row.id,
                        old,
                        new,
                    }),
                    Err(e) => {
                        warn!(assignment_id = row.id, version = %version, error = %e, "Recrypt failed for row");
                        report.failed += 1;
                    }
                }
            }

            if opts.dry_run {
                report.updated += rewrites.len() as u64;
            } else if !rewrites.is_empty() {
                let (written, lost) = self.write_chunk(&rewrites)?;
                report.updated += written;
                report.skipped += lost;
            }

            debug!(last_id, total = report.total, updated = report.updated, "Recrypt chunk done");
        }

        info!(
            total = report.total,
            eligible = report.eligible,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Recrypt finished"
        );
        Ok(report)
    }

    /// One transaction per chunk. Returns (written, changed-underneath).
    fn write_chunk(&self, rewrites: &[Rewrite]) -> Result<(u64, u64)> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut written = 0;
            let mut lost = 0;
            for r in rewrites {
                if queries::update_receiver_cipher(&tx, r.id, &r.old, &r.new)? {
                    written += 1;
                } else {
                    debug!(assignment_id = r.id, "Row changed during recrypt, skipping");
                    lost += 1;
                }
            }
            tx.commit()?;
            Ok((written, lost))
        })
    }
}
