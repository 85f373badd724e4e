//! Interactive front end: show each pending change and ask what to do.
//!
//! `y` applies, `n` skips, `a` applies this and every remaining change,
//! `p` prints the JSON patch and asks again, `q` stops the pass.
//! End of input counts as `q`.

use std::io::{self, BufRead, Write};

use crate::model::{PatchOp, WorkloadDocument};
use crate::orchestrate::{Decision, Operator};
use crate::plan::ImageChange;

use super::format::format_diff;

const CHOICES: &str = "Apply? [y]es / [n]o / [a]ll remaining / show [p]atch / [q]uit: ";

/// Operator prompt over any line-oriented input and output.
pub(super) struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub(super) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub(super) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, doc: &WorkloadDocument, changes: &[ImageChange], ops: &[PatchOp]) -> io::Result<Decision> {
        writeln!(self.output, "\n{}\n{}", doc.reference, format_diff(changes))?;
        loop {
            write!(self.output, "{CHOICES}")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Decision::Quit);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Decision::Apply),
                "n" | "no" | "s" | "skip" => return Ok(Decision::Skip),
                "a" | "all" => return Ok(Decision::ApplyAll),
                "q" | "quit" => return Ok(Decision::Quit),
                "p" | "patch" => {
                    let patch = serde_json::to_string_pretty(ops)
                        .unwrap_or_else(|e| format!("<unprintable patch: {e}>"));
                    writeln!(self.output, "{patch}")?;
                }
                other => writeln!(self.output, "Unrecognized choice '{other}'.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Operator for Prompt<R, W> {
    fn decide(&mut self, doc: &WorkloadDocument, changes: &[ImageChange], ops: &[PatchOp]) -> Decision {
        self.ask(doc, changes, ops).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "prompt I/O failed; stopping");
            Decision::Quit
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{ContainerSpec, PodTemplateSpec, WorkloadKind, WorkloadRef};
    use crate::plan::{changes, plan};

    fn doc() -> WorkloadDocument {
        WorkloadDocument {
            reference: WorkloadRef {
                kind: WorkloadKind::Deployment,
                namespace: "shop".into(),
                name: "cache".into(),
            },
            uid: "u1".into(),
            template: PodTemplateSpec {
                containers: vec![ContainerSpec {
                    name: "redis".into(),
                    image: Some("bitnami/redis:7.0".into()),
                }],
                init_containers: vec![],
            },
        }
    }

    fn decide(input: &str) -> (Decision, String) {
        let d = doc();
        let mut output = Vec::new();
        let decision = Prompt::new(input.as_bytes(), &mut output).decide(&d, &changes(&d), &plan(&d));
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn answers_map_to_decisions() {
        let cases = [
            ("y\n", Decision::Apply),
            ("YES\n", Decision::Apply),
            ("n\n", Decision::Skip),
            ("a\n", Decision::ApplyAll),
            ("q\n", Decision::Quit),
        ];
        for (input, expected) in cases {
            assert_eq!(decide(input).0, expected, "{input:?}");
        }
    }

    #[test]
    fn shows_diff_before_asking() {
        let (_, output) = decide("y\n");
        assert!(output.contains("Deployment shop/cache"));
        assert!(output.contains("- bitnami/redis:7.0"));
        assert!(output.contains("+ bitnamilegacy/redis:7.0"));
    }

    #[test]
    fn show_patch_then_decide() {
        let (decision, output) = decide("p\ny\n");
        assert_eq!(decision, Decision::Apply);
        assert!(output.contains(r#""path": "/spec/template/spec/containers/0/image""#));
        assert_eq!(output.matches(CHOICES).count(), 2);
    }

    #[test]
    fn unrecognized_answer_asks_again() {
        let (decision, output) = decide("maybe\nn\n");
        assert_eq!(decision, Decision::Skip);
        assert!(output.contains("Unrecognized choice 'maybe'"));
    }

    #[test]
    fn end_of_input_quits() {
        assert_eq!(decide("").0, Decision::Quit);
    }
}
