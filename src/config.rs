//! Migration configuration.
//!
//! Settings resolve through a chain, later sources winning:
//!
//! 1. built-in defaults
//! 2. `~/.legacy-migrate/config.toml` (or `--config <path>`)
//! 3. environment variables (`LEDGER_FILE`, `ROLLOUT_TIMEOUT`, `NAMESPACES`,
//!    `KINDS`, `FORCE_RECHECK`, `KUBE_CONTEXT`, `KUBECTL`)
//! 4. command-line flags
//!
//! Sources 3 and 4 arrive together as [`Overrides`]; clap reads both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;
use crate::model::{UnknownKind, WorkloadKind};

const DEFAULT_ROLLOUT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory; set --ledger-file")]
    NoHome,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid duration '{value}': {reason}")]
    Duration { value: String, reason: String },

    #[error(transparent)]
    Kind(#[from] UnknownKind),
}

/// The optional config file. Every key may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    pub ledger_file: Option<PathBuf>,
    pub rollout_timeout: Option<String>,
    pub namespaces: Option<Vec<String>>,
    pub kinds: Option<Vec<String>>,
    pub force_recheck: Option<bool>,
    pub context: Option<String>,
    pub kubectl: Option<String>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist. The default path is optional: when it is
    /// missing, every setting falls through to the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// The config file path: `~/.legacy-migrate/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".legacy-migrate").join("config.toml"))
    }
}

/// Values supplied by environment variables or flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ledger_file: Option<PathBuf>,
    pub rollout_timeout: Option<String>,
    pub namespaces: Vec<String>,
    pub kinds: Vec<String>,
    pub force_recheck: Option<bool>,
    pub context: Option<String>,
    pub kubectl: Option<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ledger_file: PathBuf,
    pub rollout_timeout: Duration,

    /// `None` means every namespace.
    pub namespaces: Option<Vec<String>>,

    pub kinds: Vec<WorkloadKind>,
    pub force_recheck: bool,

    /// Kubeconfig context to use instead of the current one.
    pub context: Option<String>,

    pub kubectl: String,
}

impl Config {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let ledger_file = match overrides.ledger_file.or(file.ledger_file) {
            Some(p) => p,
            None => Ledger::default_path().ok_or(ConfigError::NoHome)?,
        };

        let rollout_timeout = match overrides.rollout_timeout.or(file.rollout_timeout) {
            Some(s) => parse_duration(&s)?,
            None => DEFAULT_ROLLOUT_TIMEOUT,
        };

        let namespaces = non_empty(overrides.namespaces)
            .or(file.namespaces.and_then(non_empty))
            .map(|list| clean_list(&list));

        let kinds = match non_empty(overrides.kinds).or(file.kinds.and_then(non_empty)) {
            Some(names) => parse_kinds(&names)?,
            None => WorkloadKind::ALL.to_vec(),
        };

        Ok(Self {
            ledger_file,
            rollout_timeout,
            namespaces,
            kinds,
            force_recheck: overrides
                .force_recheck
                .or(file.force_recheck)
                .unwrap_or(false),
            context: overrides.context.or(file.context).filter(|c| !c.is_empty()),
            kubectl: overrides
                .kubectl
                .or(file.kubectl)
                .unwrap_or_else(|| "kubectl".to_string()),
        })
    }
}

/// Parse a rollout timeout: `5m`, `90s`, `1h 30m`, `PT5M`, or bare seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Duration {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = value.trim();

    let signed = match trimmed.parse::<u64>() {
        Ok(secs) => SignedDuration::from_secs(i64::try_from(secs).map_err(|_| invalid("too large"))?),
        Err(_) => trimmed
            .parse::<SignedDuration>()
            .map_err(|e| invalid(&e.to_string()))?,
    };
    if signed.is_negative() || signed.is_zero() {
        return Err(invalid("must be positive"));
    }
    Duration::try_from(signed).map_err(|e| invalid(&e.to_string()))
}

fn parse_kinds(names: &[String]) -> Result<Vec<WorkloadKind>, ConfigError> {
    let mut kinds = Vec::new();
    for name in clean_list(names) {
        let kind: WorkloadKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Trim entries and drop blanks, so `"a, b,"` behaves like `["a", "b"]`.
fn clean_list(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    (!clean_list(&list).is_empty()).then_some(list)
}
