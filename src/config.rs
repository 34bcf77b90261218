// ABOUTME: Mirror configuration - optional TOML file merged with command-line values
// ABOUTME: Produces the explicit settings for the reconciler, logger and scheduler

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mirror::{ErrorPolicy, ReconcileConfig, SchedulerConfig};

/// Settings as read from a config file. Every field is optional so the file
/// can hold just the parts that differ from the command line defaults.
///
/// ```toml
/// source = "/srv/data"
/// replica = "/mnt/backup/data"
/// interval_secs = 30
/// log_file = "/var/log/folder-replicator.log"
/// error_policy = "continue"
/// delete_orphans = true
/// prune_empty_dirs = true
/// echo = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub error_policy: Option<ErrorPolicy>,
    pub delete_orphans: Option<bool>,
    pub prune_empty_dirs: Option<bool>,
    pub echo: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Values supplied on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub source: Option<PathBuf>,
    pub replica: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub keep_going: bool,
    pub no_delete: bool,
    pub no_prune: bool,
    pub quiet: bool,
}

/// Fully resolved mirror settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub error_policy: ErrorPolicy,
    pub delete_orphans: bool,
    pub prune_empty_dirs: bool,
    /// Also emit each change record through tracing
    pub echo: bool,
}

impl MirrorConfig {
    /// Merge command-line values over file values. Source, replica, interval
    /// and log file must each come from one of the two.
    pub fn resolve(file: FileConfig, cli: CliOverrides) -> Result<Self> {
        let source = cli
            .source
            .or(file.source)
            .context("Source folder not provided (positional SOURCE or `source` in config)")?;
        let replica = cli
            .replica
            .or(file.replica)
            .context("Replica folder not provided (positional REPLICA or `replica` in config)")?;
        let interval_secs = cli.interval_secs.or(file.interval_secs).context(
            "Sync interval not provided (positional SYNC_INTERVAL or `interval_secs` in config)",
        )?;
        let log_file = cli
            .log_file
            .or(file.log_file)
            .context("Log file not provided (positional LOG or `log_file` in config)")?;

        let error_policy = if cli.keep_going {
            ErrorPolicy::Continue
        } else {
            file.error_policy.unwrap_or_default()
        };

        let config = Self {
            source,
            replica,
            interval: Duration::from_secs(interval_secs),
            log_file,
            error_policy,
            delete_orphans: !cli.no_delete && file.delete_orphans.unwrap_or(true),
            prune_empty_dirs: !cli.no_prune && file.prune_empty_dirs.unwrap_or(true),
            echo: !cli.quiet && file.echo.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that could destroy data.
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            bail!("Source folder path is empty");
        }
        if self.replica.as_os_str().is_empty() {
            bail!("Replica folder path is empty");
        }
        if self.log_file.as_os_str().is_empty() {
            bail!("Log file path is empty");
        }
        crate::utils::validate_source_replica_different(&self.source, &self.replica)
            .context("Source and replica validation failed")?;
        crate::utils::validate_log_outside_roots(&self.log_file, &self.source, &self.replica)
            .context("Log file validation failed")?;
        Ok(())
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            delete_orphans: self.delete_orphans,
            prune_empty_dirs: self.prune_empty_dirs,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval,
            error_policy: self.error_policy,
            ..SchedulerConfig::default()
        }
    }
}
