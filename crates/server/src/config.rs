// crates/server/src/config.rs
//! Server configuration from environment variables.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

/// Finished jobs stay listed this long before eviction.
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Upper bound for a single source download.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Runtime configuration for the backup manager.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Directory of the local backup store.
    pub store_dir: PathBuf,
    /// Credential presented to backup sources. Process-wide, never taken
    /// from API callers.
    pub credential: Option<String>,
    pub job_retention: Duration,
    pub transfer_timeout: Duration,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// - `BACKUP_MANAGER_PORT`, then `PORT`
    /// - `BACKUP_MANAGER_BIND` (default 127.0.0.1)
    /// - `BACKUP_STORE_DIR` (default `<data dir>/backup-manager/backups`)
    /// - `BACKUP_SOURCE_CREDENTIAL`
    /// - `BACKUP_JOB_RETENTION_SECS` (default 3600)
    /// - `BACKUP_TRANSFER_TIMEOUT_SECS` (default 3600)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("BACKUP_MANAGER_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|p| parse_or_warn("BACKUP_MANAGER_PORT", &p))
            .unwrap_or(DEFAULT_PORT);

        let bind = lookup("BACKUP_MANAGER_BIND")
            .and_then(|b| parse_or_warn("BACKUP_MANAGER_BIND", &b))
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));

        let store_dir = lookup("BACKUP_STORE_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_dir);

        let credential = lookup("BACKUP_SOURCE_CREDENTIAL").filter(|c| !c.trim().is_empty());

        let job_retention = lookup("BACKUP_JOB_RETENTION_SECS")
            .and_then(|s| parse_or_warn::<u64>("BACKUP_JOB_RETENTION_SECS", &s))
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_JOB_RETENTION);

        let transfer_timeout = lookup("BACKUP_TRANSFER_TIMEOUT_SECS")
            .and_then(|s| parse_or_warn::<u64>("BACKUP_TRANSFER_TIMEOUT_SECS", &s))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TRANSFER_TIMEOUT);

        Self {
            bind,
            port,
            store_dir,
            credential,
            job_retention,
            transfer_timeout,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("store_dir", &self.store_dir)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("job_retention", &self.job_retention)
            .field("transfer_timeout", &self.transfer_timeout)
            .finish()
    }
}

fn parse_or_warn<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring unparsable setting, using default");
            None
        }
    }
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("backup-manager")
        .join("backups")
}
