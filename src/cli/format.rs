//! Output formatting for CLI display.

use crate::model::{Fingerprint, Phase};
use crate::orchestrate::{Mode, Outcome, Report, Summary};
use crate::plan::ImageChange;

/// Format one workload's outcome, with a diff when there is one to show.
pub(super) fn format_report(mode: Mode, report: &Report) -> String {
    let target = &report.reference;
    match &report.outcome {
        Outcome::SkippedVerified => format!("=  {target}  already verified"),
        Outcome::SkippedNoChange if mode == Mode::Plan => format!("   {target}  no change"),
        Outcome::SkippedNoChange => format!("=  {target}  no change needed"),
        Outcome::Pending(changes) => format!("~  {target}\n{}", format_diff(changes)),
        Outcome::AwaitingRollout => format!("…  {target}  patched, rollout not yet confirmed"),
        Outcome::Passed => format!("PASS  {target}"),
        Outcome::NotMigrated(changes) => format!("FAIL  {target}\n{}", format_diff(changes)),
        Outcome::Declined => format!("-  {target}  skipped"),
        Outcome::Verified(changes) if changes.is_empty() => {
            format!("✓  {target}  rollout confirmed")
        }
        Outcome::Verified(changes) => {
            format!("✓  {target}  migrated {} image(s)", changes.len())
        }
        Outcome::Failed(reason) => format!("✗  {target}  {reason}"),
    }
}

/// One `-`/`+` pair per image that moves.
pub(super) fn format_diff(changes: &[ImageChange]) -> String {
    changes
        .iter()
        .map(|c| {
            let label = if c.container.is_empty() {
                format!("{}[{}]", c.section, c.index)
            } else {
                format!("{}[{}] {}", c.section, c.index, c.container)
            };
            format!("     {label}\n       - {}\n       + {}", c.from, c.to)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn format_summary(mode: Mode, summary: &Summary) -> String {
    let counts = match mode {
        Mode::Plan => vec![
            (summary.pending, "pending"),
            (summary.awaiting_rollout, "awaiting rollout"),
            (summary.skipped_verified, "already verified"),
            (summary.no_change, "no change"),
            (summary.failed, "failed"),
        ],
        Mode::Verify => vec![
            (summary.passed, "passed"),
            (summary.not_migrated, "failed"),
        ],
        Mode::Apply | Mode::Continue | Mode::Interactive => vec![
            (summary.verified, "verified"),
            (summary.skipped_verified, "already verified"),
            (summary.no_change, "no change"),
            (summary.declined, "skipped"),
            (summary.failed, "failed"),
        ],
    };
    let body = counts
        .iter()
        .map(|(n, label)| format!("{n} {label}"))
        .collect::<Vec<_>>()
        .join(", ");
    if summary.quit {
        format!("Stopped by operator: {body}")
    } else {
        format!("Done: {body}")
    }
}

/// Ledger status table: latest phase per recorded workload.
pub(super) fn format_status(rows: &[(&Fingerprint, Phase)]) -> String {
    rows.iter()
        .map(|(fp, phase)| {
            format!(
                "{phase:<9} {} {}/{}  (uid {})",
                fp.kind, fp.namespace, fp.name, fp.uid
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{WorkloadKind, WorkloadRef};
    use crate::plan::ContainerSection;

    fn reference() -> WorkloadRef {
        WorkloadRef {
            kind: WorkloadKind::Deployment,
            namespace: "shop".into(),
            name: "cache".into(),
        }
    }

    fn change() -> ImageChange {
        ImageChange {
            section: ContainerSection::Containers,
            index: 0,
            container: "redis".into(),
            from: "docker.io/bitnami/redis:7.0".into(),
            to: "docker.io/bitnamilegacy/redis:7.0".into(),
        }
    }

    #[test]
    fn format_pending_diff() {
        let report = Report {
            reference: reference(),
            outcome: Outcome::Pending(vec![change()]),
        };
        assert_eq!(
            format_report(Mode::Plan, &report),
            "~  Deployment shop/cache\n     containers[0] redis\n       - docker.io/bitnami/redis:7.0\n       + docker.io/bitnamilegacy/redis:7.0"
        );
    }

    #[test]
    fn format_simple_outcomes() {
        let cases = [
            (Outcome::SkippedVerified, "=  Deployment shop/cache  already verified"),
            (Outcome::Passed, "PASS  Deployment shop/cache"),
            (Outcome::Declined, "-  Deployment shop/cache  skipped"),
            (
                Outcome::Verified(vec![change()]),
                "✓  Deployment shop/cache  migrated 1 image(s)",
            ),
            (
                Outcome::Verified(vec![]),
                "✓  Deployment shop/cache  rollout confirmed",
            ),
            (
                Outcome::Failed("patch rejected".into()),
                "✗  Deployment shop/cache  patch rejected",
            ),
        ];
        for (outcome, expected) in cases {
            let report = Report {
                reference: reference(),
                outcome,
            };
            assert_eq!(format_report(Mode::Apply, &report), expected);
        }
    }

    #[test]
    fn format_summary_by_mode() {
        let summary = Summary {
            verified: 2,
            skipped_verified: 1,
            failed: 1,
            ..Summary::default()
        };
        assert_eq!(
            format_summary(Mode::Apply, &summary),
            "Done: 2 verified, 1 already verified, 0 no change, 0 skipped, 1 failed"
        );

        let quit = Summary {
            declined: 1,
            quit: true,
            ..Summary::default()
        };
        assert!(format_summary(Mode::Interactive, &quit).starts_with("Stopped by operator:"));
    }

    #[test]
    fn format_status_rows() {
        let fp = Fingerprint {
            context: "prod".into(),
            kind: WorkloadKind::CronJob,
            namespace: "ops".into(),
            name: "backup".into(),
            uid: "u-1".into(),
        };
        assert_eq!(
            format_status(&[(&fp, Phase::Applied)]),
            "applied   CronJob ops/backup  (uid u-1)"
        );
    }
}
