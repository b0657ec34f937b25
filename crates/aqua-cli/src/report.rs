//! # Console Report
//!
//! Renders per-revision lines as the walk produces them, plus the aggregate.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Mutex;

use aqua_verifier::{
    AttestationStatus, ChainStatus, ChainVerification, VerificationDetail, VerificationReporter,
};
use shared_types::Revision;

/// Prints one line per revision to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Serializes writes from the walk.
    lock: Mutex<()>,
}

impl VerificationReporter for ConsoleReporter {
    fn report(&self, detail: &VerificationDetail) {
        let _guard = self.lock.lock();
        let mut stdout = std::io::stdout().lock();
        // A closed stdout is not worth aborting the walk over.
        let _ = writeln!(stdout, "{}", render_detail(detail));
    }
}

/// One report line for `detail`.
pub fn render_detail(detail: &VerificationDetail) -> String {
    let mark = if detail.is_correct() { '✓' } else { '✗' };
    let checks = &detail.checks;

    let mut parts = vec![
        format!("content {}", flag(checks.content)),
        format!("metadata {}", flag(checks.metadata)),
    ];
    if let Some(file) = checks.file {
        parts.insert(0, format!("file {}", flag(file)));
    }
    if checks.signature != AttestationStatus::Missing {
        parts.push(format!("signature {}", attestation(checks.signature)));
    }
    if checks.witness != AttestationStatus::Missing {
        parts.push(format!("witness {}", attestation(checks.witness)));
    }
    parts.push(format!("verification {}", flag(checks.verification)));
    if !detail.link_ok {
        parts.push("link ✗".to_string());
    }

    let mut line = format!(
        "{mark} {}  {}  ({} ms)",
        Revision::short_hash(&detail.verification_hash),
        parts.join(", "),
        detail.elapsed_ms
    );
    if let Some(reason) = detail.witness.as_ref().and_then(|w| w.lookup_error.as_deref()) {
        line.push_str(&format!("  [{reason}]"));
    }
    if let Some(failure) = &detail.failure {
        line.push_str(&format!("\n    {failure}"));
    }
    line
}

fn flag(ok: bool) -> char {
    if ok {
        '✓'
    } else {
        '✗'
    }
}

fn attestation(status: AttestationStatus) -> &'static str {
    match status {
        AttestationStatus::Missing => "-",
        AttestationStatus::Valid => "✓",
        AttestationStatus::Invalid => "✗",
    }
}

/// Process exit code for an aggregate status.
pub fn exit_code(result: &ChainVerification) -> ExitCode {
    ExitCode::from(status_code(result.status))
}

fn status_code(status: ChainStatus) -> u8 {
    match status {
        ChainStatus::Verified => 0,
        ChainStatus::Invalid => 1,
        ChainStatus::NoRecord => 2,
    }
}
