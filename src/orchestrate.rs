//! The migration state machine.
//!
//! One pass walks the fetched workloads in order, one at a time. For each
//! workload the same decision function runs:
//!
//! 1. Verified under its current fingerprint? Skip, unless force-recheck is on
//!    and the live object has drifted back to the deprecated path.
//! 2. Plan the patch. Nothing to change? Skip. (If the ledger shows the patch
//!    went out but was never confirmed, resume at the rollout wait.)
//! 3. Record `applying`, dry-run the patch, apply it, record `applied`.
//! 4. Wait for the rollout (cron jobs have none).
//! 5. Record `verified`.
//!
//! Each [`Mode`] is a policy over that function: `plan` and `verify` stop
//! after step 2 and never mutate, `apply` and `continue` run every step,
//! `interactive` asks an [`Operator`] before step 3.
//!
//! A failed or timed-out rollout, or a failed ledger write, ends the pass.
//! Validation and apply failures are reported and the pass moves on.

use std::time::Duration;

use serde_json::json;

use crate::cluster::{Cluster, ClusterError, RolloutStatus};
use crate::ledger::{Ledger, LedgerError};
use crate::model::{Fingerprint, LedgerEntry, PatchOp, Phase, WorkloadDocument, WorkloadRef};
use crate::plan::{ImageChange, changes, plan};

/// Errors that end a pass.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("ledger write failed, stopping: {0}")]
    Ledger(#[from] LedgerError),

    #[error("cluster unavailable: {0}")]
    Cluster(#[from] ClusterError),

    #[error("rollout of {reference} did not complete within {timeout:?}; stopping")]
    RolloutTimeout {
        reference: WorkloadRef,
        timeout: Duration,
    },

    #[error("rollout of {reference} failed, stopping: {reason}")]
    RolloutFailed {
        reference: WorkloadRef,
        reason: String,
    },
}

pub type Result<T> = core::result::Result<T, MigrateError>;

/// Which policy a pass applies over the decision function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plan,
    Apply,
    Verify,
    Continue,
    Interactive,
}

impl Mode {
    fn mutates(self) -> bool {
        matches!(self, Self::Apply | Self::Continue | Self::Interactive)
    }
}

/// Settings fixed for the duration of a pass.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Cluster context every ledger fact is recorded under.
    pub context: String,
    pub force_recheck: bool,
    pub rollout_timeout: Duration,
}

/// What steps 1–2 concluded for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    /// Verified under this exact fingerprint.
    AlreadyVerified,

    /// Nothing references the deprecated path.
    NoChange,

    /// Patched earlier but the rollout was never confirmed.
    AwaitingRollout(WorkloadDocument),

    /// Needs a patch. `drifted` is set when a verified workload was found
    /// pointing back at the deprecated path.
    Pending {
        doc: WorkloadDocument,
        changes: Vec<ImageChange>,
        drifted: bool,
    },
}

/// Where one workload ended up after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SkippedVerified,
    SkippedNoChange,

    /// `plan`: a patch would be applied.
    Pending(Vec<ImageChange>),

    /// `plan`: patched earlier, rollout still to be confirmed.
    AwaitingRollout,

    /// `verify`: nothing references the deprecated path.
    Passed,

    /// `verify`: these images still reference the deprecated path.
    NotMigrated(Vec<ImageChange>),

    /// `interactive`: the operator chose to skip it.
    Declined,

    /// Patched (or resumed) and confirmed.
    Verified(Vec<ImageChange>),

    Failed(String),
}

/// One line of pass output.
#[derive(Debug, Clone)]
pub struct Report {
    pub reference: WorkloadRef,
    pub outcome: Outcome,
}

/// What an operator can answer for a workload with a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Skip,
    /// Apply this one and every remaining one without asking.
    ApplyAll,
    Quit,
}

/// The interactive decision point.
pub trait Operator {
    fn decide(
        &mut self,
        doc: &WorkloadDocument,
        changes: &[ImageChange],
        ops: &[PatchOp],
    ) -> Decision;
}

/// Counts per outcome for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub verified: usize,
    pub skipped_verified: usize,
    pub no_change: usize,
    pub pending: usize,
    pub awaiting_rollout: usize,
    pub passed: usize,
    pub not_migrated: usize,
    pub declined: usize,
    pub failed: usize,

    /// The operator quit before the pass finished.
    pub quit: bool,
}

impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::SkippedVerified => self.skipped_verified += 1,
            Outcome::SkippedNoChange => self.no_change += 1,
            Outcome::Pending(_) => self.pending += 1,
            Outcome::AwaitingRollout => self.awaiting_rollout += 1,
            Outcome::Passed => self.passed += 1,
            Outcome::NotMigrated(_) => self.not_migrated += 1,
            Outcome::Declined => self.declined += 1,
            Outcome::Verified(_) => self.verified += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// Whether the pass needs operator attention.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.not_migrated > 0
    }
}

/// Drives passes over fetched workloads.
pub struct Orchestrator<'a, C: Cluster> {
    cluster: &'a C,
    ledger: &'a mut Ledger,
    settings: Settings,
}

impl<'a, C: Cluster> Orchestrator<'a, C> {
    pub fn new(cluster: &'a C, ledger: &'a mut Ledger, settings: Settings) -> Self {
        Self {
            cluster,
            ledger,
            settings,
        }
    }

    /// Run one pass over `docs` in order.
    ///
    /// `on_report` is called as soon as each workload is finished.
    /// `operator` is consulted only in [`Mode::Interactive`]; without one,
    /// interactive mode declines every change.
    pub fn run(
        &mut self,
        mode: Mode,
        docs: Vec<WorkloadDocument>,
        mut operator: Option<&mut dyn Operator>,
        mut on_report: impl FnMut(&Report),
    ) -> Result<Summary> {
        let mut summary = Summary::default();
        let mut apply_all = false;

        tracing::info!(?mode, count = docs.len(), context = %self.settings.context, "pass started");

        for doc in docs {
            let reference = doc.reference.clone();
            let span = tracing::info_span!(
                "workload",
                kind = %reference.kind,
                namespace = %reference.namespace,
                name = %reference.name
            );
            let _guard = span.enter();

            let outcome = if mode == Mode::Verify {
                Self::verify(&doc)
            } else {
                match self.assess(doc) {
                    Ok(assessment) => {
                        let decision = match (&assessment, mode) {
                            (Assessment::Pending { doc, changes, .. }, Mode::Interactive)
                                if !apply_all =>
                            {
                                match operator.as_mut() {
                                    Some(operator) => Self::ask(&mut **operator, doc, changes),
                                    None => Decision::Skip,
                                }
                            }
                            _ => Decision::Apply,
                        };
                        match decision {
                            Decision::Quit => {
                                tracing::info!("operator quit");
                                summary.quit = true;
                                break;
                            }
                            Decision::Skip => Outcome::Declined,
                            Decision::ApplyAll => {
                                apply_all = true;
                                self.advance(mode, assessment)?
                            }
                            Decision::Apply => self.advance(mode, assessment)?,
                        }
                    }
                    Err(e) => degrade(e)?,
                }
            };

            summary.record(&outcome);
            on_report(&Report { reference, outcome });
        }

        tracing::info!(?summary, "pass finished");
        Ok(summary)
    }

    /// Steps 1–2 of the decision function.
    pub fn assess(
        &self,
        mut doc: WorkloadDocument,
    ) -> core::result::Result<Assessment, ClusterError> {
        let fingerprint = Fingerprint::of(&self.settings.context, &doc);
        let mut drifted = false;

        if self.ledger.is_verified(&fingerprint) {
            if !self.settings.force_recheck {
                tracing::debug!("verified under current fingerprint");
                return Ok(Assessment::AlreadyVerified);
            }
            let Some(live) = self.cluster.get(&doc.reference)? else {
                tracing::debug!("verified and no longer present");
                return Ok(Assessment::AlreadyVerified);
            };
            if changes(&live).is_empty() {
                return Ok(Assessment::AlreadyVerified);
            }
            tracing::warn!(uid = %live.uid, "verified workload drifted back to the deprecated path");
            doc = live;
            drifted = true;
        }

        let planned = changes(&doc);
        if !planned.is_empty() {
            return Ok(Assessment::Pending {
                doc,
                changes: planned,
                drifted,
            });
        }

        let fingerprint = Fingerprint::of(&self.settings.context, &doc);
        match self.ledger.latest_phase(&fingerprint) {
            Some(Phase::Applying | Phase::Applied) => Ok(Assessment::AwaitingRollout(doc)),
            _ => Ok(Assessment::NoChange),
        }
    }

    /// Steps 3–5 for a workload with pending changes.
    pub fn execute(&mut self, doc: &WorkloadDocument, planned: Vec<ImageChange>) -> Result<Outcome> {
        let reference = &doc.reference;

        match self.cluster.live_uid(reference) {
            Ok(Some(uid)) if uid == doc.uid => {}
            Ok(Some(uid)) => {
                tracing::warn!(fetched = %doc.uid, live = %uid, "recreated since fetch");
                return Ok(Outcome::Failed("recreated since it was fetched".to_string()));
            }
            Ok(None) => return Ok(Outcome::Failed("no longer exists".to_string())),
            Err(e) => return degrade(e),
        }

        let fingerprint = Fingerprint::of(&self.settings.context, doc);
        let ops: Vec<PatchOp> = planned.iter().map(|c| c.to_op(reference.kind)).collect();

        self.ledger.append(&LedgerEntry::now(
            Phase::Applying,
            &fingerprint,
            json!({ "ops": ops }),
        ))?;

        if let Err(e) = self.cluster.dry_run_validate(reference, &ops) {
            tracing::warn!(error = %e, "dry-run validation rejected patch");
            return match e {
                ClusterError::ToolMissing(_) => Err(e.into()),
                e => Ok(Outcome::Failed(format!("validation rejected patch: {e}"))),
            };
        }
        if let Err(e) = self.cluster.apply_patch(reference, &ops) {
            tracing::warn!(error = %e, "patch rejected");
            return match e {
                ClusterError::ToolMissing(_) => Err(e.into()),
                e => Ok(Outcome::Failed(format!("patch rejected: {e}"))),
            };
        }
        tracing::info!(ops = ops.len(), "patch applied");

        self.ledger.append(&LedgerEntry::now(
            Phase::Applied,
            &fingerprint,
            serde_json::Value::Null,
        ))?;

        self.confirm(doc, &fingerprint)?;
        Ok(Outcome::Verified(planned))
    }

    /// Steps 4–5: wait for the rollout, then record `verified`.
    fn confirm(&mut self, doc: &WorkloadDocument, fingerprint: &Fingerprint) -> Result<()> {
        let reference = &doc.reference;
        if reference.kind.has_rollout() {
            let timeout = self.settings.rollout_timeout;
            tracing::info!(?timeout, "waiting for rollout");
            match self.cluster.wait_for_rollout(reference, timeout) {
                RolloutStatus::Complete => tracing::info!("rollout complete"),
                RolloutStatus::TimedOut => {
                    return Err(MigrateError::RolloutTimeout {
                        reference: reference.clone(),
                        timeout,
                    });
                }
                RolloutStatus::Failed(reason) => {
                    return Err(MigrateError::RolloutFailed {
                        reference: reference.clone(),
                        reason,
                    });
                }
            }
        }
        self.ledger.append(&LedgerEntry::now(
            Phase::Verified,
            fingerprint,
            serde_json::Value::Null,
        ))?;
        Ok(())
    }

    fn advance(&mut self, mode: Mode, assessment: Assessment) -> Result<Outcome> {
        match assessment {
            Assessment::AlreadyVerified => Ok(Outcome::SkippedVerified),
            Assessment::NoChange => Ok(Outcome::SkippedNoChange),
            Assessment::AwaitingRollout(_) if !mode.mutates() => Ok(Outcome::AwaitingRollout),
            Assessment::AwaitingRollout(doc) => {
                tracing::info!("resuming unconfirmed rollout");
                let fingerprint = Fingerprint::of(&self.settings.context, &doc);
                self.confirm(&doc, &fingerprint)?;
                Ok(Outcome::Verified(Vec::new()))
            }
            Assessment::Pending { changes, .. } if !mode.mutates() => Ok(Outcome::Pending(changes)),
            Assessment::Pending {
                doc,
                changes,
                drifted,
            } => {
                if drifted {
                    tracing::info!("reprocessing drifted workload");
                }
                self.execute(&doc, changes)
            }
        }
    }

    fn ask(operator: &mut dyn Operator, doc: &WorkloadDocument, changes: &[ImageChange]) -> Decision {
        operator.decide(doc, changes, &plan(doc))
    }

    fn verify(doc: &WorkloadDocument) -> Outcome {
        let remaining = changes(doc);
        if remaining.is_empty() {
            Outcome::Passed
        } else {
            Outcome::NotMigrated(remaining)
        }
    }
}

/// A cluster error while handling one workload fails only that workload,
/// unless the cluster can't be reached at all.
fn degrade(e: ClusterError) -> Result<Outcome> {
    match e {
        ClusterError::ToolMissing(_) => Err(e.into()),
        e => {
            tracing::warn!(error = %e, "cluster call failed");
            Ok(Outcome::Failed(e.to_string()))
        }
    }
}
