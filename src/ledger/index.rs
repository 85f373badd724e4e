//! In-memory view of the ledger, keyed by fingerprint.
//!
//! Answers the same questions a full scan of the file would: a fingerprint
//! is verified if any `verified` line matches it, and its latest phase is
//! the phase of the last matching line.

use std::collections::{BTreeMap, HashSet};

use crate::model::{Fingerprint, LedgerEntry, Phase};

#[derive(Debug, Default)]
pub struct LedgerIndex {
    latest: BTreeMap<Fingerprint, Phase>,
    verified: HashSet<Fingerprint>,
}

impl LedgerIndex {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.record(entry);
        }
        index
    }

    pub fn record(&mut self, entry: &LedgerEntry) {
        let fingerprint = entry.fingerprint();
        if entry.phase == Phase::Verified {
            self.verified.insert(fingerprint.clone());
        }
        self.latest.insert(fingerprint, entry.phase);
    }

    pub fn is_verified(&self, fingerprint: &Fingerprint) -> bool {
        self.verified.contains(fingerprint)
    }

    pub fn latest_phase(&self, fingerprint: &Fingerprint) -> Option<Phase> {
        self.latest.get(fingerprint).copied()
    }

    /// Latest phase of every fingerprint recorded under `context`, sorted by
    /// kind, namespace, name, uid.
    pub fn in_context<'a>(
        &'a self,
        context: &'a str,
    ) -> impl Iterator<Item = (&'a Fingerprint, Phase)> + 'a {
        self.latest
            .iter()
            .filter(move |(fp, _)| fp.context == context)
            .map(|(fp, phase)| (fp, *phase))
    }
}
