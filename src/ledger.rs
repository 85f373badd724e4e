//! Durable, append-only record of migration progress.
//!
//! The ledger is one JSONL file shared by every invocation:
//!
//! ```text
//! ~/.legacy-migrate/ledger.jsonl
//!   {"ts":"…","phase":"applying","kind":"Deployment","namespace":"shop","name":"web","context":"prod","uid":"…","extra":{"ops":[…]}}
//!   {"ts":"…","phase":"applied",…}
//!   {"ts":"…","phase":"verified",…}
//! ```
//!
//! Lines are never rewritten or removed. A line left half-written by a crash
//! is skipped on load, and the next append starts on a fresh line.

mod index;

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::model::{Fingerprint, LedgerEntry, Phase};

pub use index::LedgerIndex;

/// Errors that can occur reading or writing the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to encode ledger entry: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, LedgerError>;

/// The ledger file plus an in-memory index of what it says.
pub struct Ledger {
    path: PathBuf,
    index: LedgerIndex,
}

impl Ledger {
    /// Opens the ledger at `path`, loading every readable entry.
    ///
    /// The parent directory is created if it doesn't exist. A missing file is
    /// an empty ledger; it is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LedgerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let entries = Self::load(&path)?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Ok(Self {
            index: LedgerIndex::from_entries(&entries),
            path,
        })
    }

    /// Returns the default ledger location: `~/.legacy-migrate/ledger.jsonl`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".legacy-migrate").join("ledger.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &LedgerIndex {
        &self.index
    }

    /// Reads every well-formed entry in file order.
    ///
    /// Malformed lines are logged and skipped.
    pub fn load(path: &Path) -> Result<Vec<LedgerEntry>> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping malformed ledger line"
                ),
            }
        }
        Ok(entries)
    }

    /// Appends one entry and flushes it to disk before returning.
    pub fn append(&mut self, entry: &LedgerEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.write_line(&line).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.index.record(entry);
        tracing::info!(
            phase = %entry.phase,
            kind = %entry.kind,
            namespace = %entry.namespace,
            name = %entry.name,
            uid = %entry.uid,
            "ledger entry recorded"
        );
        Ok(())
    }

    /// Whether a `verified` fact exists for exactly this fingerprint.
    pub fn is_verified(&self, fingerprint: &Fingerprint) -> bool {
        self.index.is_verified(fingerprint)
    }

    /// The most recently recorded phase for this fingerprint.
    pub fn latest_phase(&self, fingerprint: &Fingerprint) -> Option<Phase> {
        self.index.latest_phase(fingerprint)
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if ends_mid_line(&mut file)? {
            file.write_all(b"\n")?;
        }
        file.write_all(line.as_bytes())?;
        file.sync_data()
    }
}

/// Whether the file's last byte is something other than a newline.
fn ends_mid_line(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
