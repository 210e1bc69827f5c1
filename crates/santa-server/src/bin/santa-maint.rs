//! # Santa maintenance CLI
//!
//! Offline passes over stored draw results: re-encrypt receiver ciphers
//! under the current key version, or verify that every cipher still decrypts.
//! Reads the same `SANTA_*` environment as the server.

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

use santa_crypto::CipherVersion;
use santa_db::Database;
use santa_draw::recrypt::DEFAULT_CHUNK_SIZE;
use santa_draw::{RecryptJob, RecryptOptions, RecryptReport, VerifyReport, verify_ciphers};
use santa_server::config::AppConfig;

#[derive(Parser)]
#[command(name = "santa-maint")]
#[command(about = "Maintenance tasks for stored draw results")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encrypt receiver ciphers under the current key version
    Recrypt {
        /// Only touch ciphers at this version (repeatable: legacy, 1, v2, ...)
        #[arg(long = "from-version")]
        from_versions: Vec<CipherVersion>,

        /// Rewrite ciphers already at the current version
        #[arg(long)]
        force: bool,

        /// Rows per transaction
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk: usize,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that every stored cipher decrypts
    Verify {
        /// Rows read per page
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk: usize,
    },
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let outcome = AppConfig::from_env().and_then(|config| run(&cli, &config));
    if let Err(e) = &outcome {
        error!("{:#}", e);
        eprintln!("santa-maint: {:#}", e);
    }
    process::exit(exit_code(&outcome));
}

/// Zero only for a clean pass.
fn exit_code(outcome: &anyhow::Result<bool>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) | Err(_) => 1,
    }
}

/// Returns `false` when the pass found failures.
fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<bool> {
    let codec = Arc::new(config.codec()?);
    let db = Arc::new(Database::open(&config.db_path)?);

    match &cli.command {
        Commands::Recrypt {
            from_versions,
            force,
            chunk,
            dry_run,
        } => {
            let opts = RecryptOptions {
                from_versions: (!from_versions.is_empty()).then(|| from_versions.clone()),
                force: *force,
                chunk_size: *chunk,
                dry_run: *dry_run,
            };
            let report = RecryptJob::new(db, codec.clone()).run(&opts)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_recrypt(&report, codec.current_version());
            }
            Ok(!report.has_failures())
        }
        Commands::Verify { chunk } => {
            let report = verify_ciphers(&db, &codec, *chunk)?;
            if cli.json {
                let body = json!({
                    "current_version": codec.current_version().to_string(),
                    "report": report,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_verify(&report);
            }
            Ok(!report.has_failures())
        }
    }
}

fn print_recrypt(report: &RecryptReport, target: CipherVersion) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("Recrypt to version {}{}", target, mode);
    println!("  total:    {}", report.total);
    println!("  eligible: {}", report.eligible);
    println!("  updated:  {}", report.updated);
    println!("  skipped:  {}", report.skipped);
    println!("  failed:   {}", report.failed);
}

fn print_verify(report: &VerifyReport) {
    println!("Verify");
    println!("  total:       {}", report.total);
    println!("  with cipher: {}", report.with_cipher);
    println!("  legacy only: {}", report.legacy_only);
    println!("  ok:          {}", report.ok);
    println!("  fail:        {}", report.fail);
    if !report.versions.is_empty() {
        println!("  versions:");
        for (version, count) in &report.versions {
            println!("    {:<8} {}", version, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use santa_crypto::keys::{generate_key, key_to_base64};
    use santa_db::models::NewAssignment;
    use santa_db::queries;

    #[test]
    fn recrypt_flags_parse() {
        let cli = Cli::try_parse_from([
            "santa-maint",
            "recrypt",
            "--from-version",
            "legacy",
            "--from-version",
            "v2",
            "--force",
            "--dry-run",
            "--chunk",
            "25",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Recrypt {
                from_versions,
                force,
                chunk,
                dry_run,
            } => {
                assert_eq!(
                    from_versions,
                    vec![CipherVersion::Legacy, CipherVersion::Numbered(2)]
                );
                assert!(force && dry_run);
                assert_eq!(chunk, 25);
            }
            Commands::Verify { .. } => panic!("expected recrypt"),
        }
    }

    #[test]
    fn verify_defaults_and_bad_version() {
        let cli = Cli::try_parse_from(["santa-maint", "-vv", "verify"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.json);
        assert!(matches!(cli.command, Commands::Verify { chunk } if chunk == DEFAULT_CHUNK_SIZE));

        assert!(Cli::try_parse_from(["santa-maint", "recrypt", "--from-version", "vx"]).is_err());
        assert!(Cli::try_parse_from(["santa-maint"]).is_err());
    }

    #[test]
    fn corrupt_cipher_exits_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maint.db");
        let key = key_to_base64(&generate_key());
        let config = AppConfig::from_vars([
            ("SANTA_DB_PATH".to_string(), path.display().to_string()),
            ("SANTA_CIPHER_KEY_V1".to_string(), key),
        ])
        .unwrap();

        let codec = config.codec().unwrap();
        let db = Database::open(&path).unwrap();
        let gid = db.create_group(1, "Maint").unwrap();
        let good = codec.encode_current(2).unwrap();
        db.with_conn_mut(|conn| {
            for (giver, cipher) in [(1, good.as_str()), (2, "v1:garbled")] {
                queries::insert_assignment(
                    conn,
                    &NewAssignment {
                        group_id: gid,
                        giver_user_id: giver,
                        receiver_cipher: Some(cipher),
                        receiver_user_id: None,
                    },
                )?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
        drop(db);

        let verify = Cli::try_parse_from(["santa-maint", "--json", "verify"]).unwrap();
        let outcome = run(&verify, &config);
        assert!(matches!(outcome, Ok(false)));
        assert_eq!(exit_code(&outcome), 1);

        let recrypt = Cli::try_parse_from(["santa-maint", "recrypt", "--force"]).unwrap();
        assert_eq!(exit_code(&run(&recrypt, &config)), 1);

        assert_eq!(exit_code(&Ok(true)), 0);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("no database"))), 1);
    }
}
