use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use santa_crypto::keys::key_from_base64;
use santa_crypto::{CipherCodec, CipherVersion, Keyring};
use santa_draw::SolverConfig;
use santa_draw::recrypt::DEFAULT_CHUNK_SIZE;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const KEY_PREFIX: &str = "SANTA_CIPHER_KEY_V";

#[derive(Debug, Clone)]
pub struct RecryptSchedule {
    pub enabled: bool,
    pub interval_secs: u64,
    pub chunk_size: usize,
}

/// Everything read from `SANTA_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    jwt_secret: Option<String>,
    pub cipher_version: CipherVersion,
    pub keyring: Keyring,
    pub recrypt: RecryptSchedule,
    pub solver: SolverConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let cipher_version = match get("SANTA_CIPHER_VERSION") {
            Some(raw) => raw
                .parse::<CipherVersion>()
                .map_err(anyhow::Error::msg)
                .context("SANTA_CIPHER_VERSION")?,
            None => CipherVersion::Numbered(1),
        };

        let mut keyring = Keyring::new();
        for (name, value) in &vars {
            let Some(suffix) = name.strip_prefix(KEY_PREFIX) else {
                continue;
            };
            let version: u32 = suffix
                .parse()
                .with_context(|| format!("{name}: version suffix is not a number"))?;
            let key = key_from_base64(value).with_context(|| name.clone())?;
            keyring = keyring.with_key(version, key);
        }
        if let Some(raw) = get("SANTA_CIPHER_KEY_LEGACY") {
            keyring = keyring.with_legacy_key(key_from_base64(raw).context("SANTA_CIPHER_KEY_LEGACY")?);
        }

        let defaults = SolverConfig::default();
        let solver = SolverConfig {
            max_attempts: parse_or(get("SANTA_SOLVER_MAX_ATTEMPTS"), "SANTA_SOLVER_MAX_ATTEMPTS", defaults.max_attempts)?,
            step_budget: parse_or(get("SANTA_SOLVER_STEP_BUDGET"), "SANTA_SOLVER_STEP_BUDGET", defaults.step_budget)?,
        };
        // A zero limit makes every draw report infeasible.
        if solver.max_attempts == 0 {
            bail!("SANTA_SOLVER_MAX_ATTEMPTS must be at least 1");
        }
        if solver.step_budget == 0 {
            bail!("SANTA_SOLVER_STEP_BUDGET must be at least 1");
        }

        Ok(Self {
            db_path: get("SANTA_DB_PATH").unwrap_or("santa.db").into(),
            host: get("SANTA_HOST").unwrap_or("0.0.0.0").to_string(),
            port: parse_or(get("SANTA_PORT"), "SANTA_PORT", 3000)?,
            jwt_secret: get("SANTA_JWT_SECRET").map(str::to_string),
            cipher_version,
            keyring,
            recrypt: RecryptSchedule {
                enabled: parse_flag(get("SANTA_RECRYPT_ENABLED")),
                interval_secs: parse_or(get("SANTA_RECRYPT_INTERVAL_SECS"), "SANTA_RECRYPT_INTERVAL_SECS", 86_400)?
                    .max(1),
                chunk_size: parse_or(get("SANTA_RECRYPT_CHUNK"), "SANTA_RECRYPT_CHUNK", DEFAULT_CHUNK_SIZE)?,
            },
            solver,
        })
    }

    /// The HTTP server refuses to start without a real secret.
    pub fn jwt_secret(&self) -> Result<&str> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret) => Ok(secret),
            _ => bail!("SANTA_JWT_SECRET is unset or still a placeholder"),
        }
    }

    /// Fails when no key is configured for the current cipher version.
    pub fn codec(&self) -> Result<CipherCodec> {
        CipherCodec::new(self.keyring.clone(), self.cipher_version)
            .with_context(|| format!("no cipher key for current version {}", self.cipher_version))
    }
}

fn parse_or<T>(raw: Option<&str>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.parse().with_context(|| format!("{name}: invalid value {v:?}")),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
