//! Plain-text rendering of service results for tool responses.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use devpilot_common::{OutputLine, ProcessInfo, StreamKind};

use crate::application::registry::StartOutcome;
use crate::application::services::dev_server::{ScriptOutcome, StopReport};
use crate::application::services::query::QueryOutcome;
use crate::application::services::script_run::RunOutcome;
use crate::domain::error::DevError;
use crate::domain::process::format_uptime;

/// Per-stream cap on captured output echoed back in a tool response.
pub const MAX_STREAM_CHARS: usize = 10_000;

fn uptime(info: &ProcessInfo) -> String {
    format_uptime(Duration::from_secs(info.uptime_secs))
}

fn no_servers(dir: &Path) -> String {
    format!("No dev servers running in {}", dir.display())
}

/// Keep the tail of `text`, marking the cut.
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let kept: String = text.chars().skip(count - max).collect();
    format!("... ({} characters omitted)\n{kept}", count - max)
}

pub fn start_outcome(outcome: &StartOutcome) -> String {
    match outcome {
        StartOutcome::Started(info) => format!(
            "Started dev server '{}'\n  PID: {}\n  Command: {}\n  Directory: {}\n\
             Use devStatus to check readiness and devLogs to see output.",
            info.script,
            info.pid,
            info.command_line(),
            info.cwd,
        ),
        StartOutcome::AlreadyRunning(info) => format!(
            "'{}' is already running (PID {}, up {})\n  Command: {}\n  Directory: {}",
            info.script,
            info.pid,
            uptime(info),
            info.command_line(),
            info.cwd,
        ),
    }
}

pub fn status(dir: &Path, servers: &[ProcessInfo]) -> String {
    if servers.is_empty() {
        return no_servers(dir);
    }
    let mut out = format!("{} dev server(s) running:\n", servers.len());
    for info in servers {
        let _ = write!(
            out,
            "\n● {}\n  PID: {}\n  Uptime: {}\n  Ready: {}\n  Command: {}\n  Directory: {}\n",
            info.script,
            info.pid,
            uptime(info),
            if info.ready { "yes" } else { "not yet detected" },
            info.command_line(),
            info.cwd,
        );
        if let Some(label) = &info.label {
            let _ = writeln!(out, "  Label: {label}");
        }
    }
    out.trim_end().to_string()
}

pub fn stop_report(dir: &Path, report: &StopReport) -> String {
    match report {
        StopReport::One(outcome) => {
            let info = &outcome.info;
            if !outcome.exited {
                format!(
                    "Killed '{}' (PID {}) but it has not exited yet",
                    info.script, info.pid
                )
            } else if outcome.forced {
                format!(
                    "Stopped '{}' (PID {}) after a forced kill",
                    info.script, info.pid
                )
            } else {
                format!("Stopped '{}' (PID {})", info.script, info.pid)
            }
        }
        StopReport::All(outcomes) if outcomes.is_empty() => no_servers(dir),
        StopReport::All(outcomes) => {
            let stopped = outcomes.iter().filter(|o| o.exited).count();
            let mut out = format!("Stopped {stopped}/{} dev server(s):", outcomes.len());
            for o in outcomes {
                let _ = match (o.exited, o.forced) {
                    (true, false) => write!(out, "\n  ✓ {} (PID {})", o.info.script, o.info.pid),
                    (true, true) => write!(
                        out,
                        "\n  ✓ {} (PID {}, forced)",
                        o.info.script, o.info.pid
                    ),
                    (false, _) => write!(
                        out,
                        "\n  ✗ {} (PID {}): did not exit after kill",
                        o.info.script, o.info.pid
                    ),
                };
            }
            out
        }
    }
}

pub fn script_outcomes(verb: &str, outcomes: &[ScriptOutcome]) -> String {
    let ok = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let mut out = format!("{verb} {ok}/{} script(s):", outcomes.len());
    for o in outcomes {
        let _ = match &o.result {
            Ok(StartOutcome::Started(info)) => {
                write!(out, "\n  ✓ {}: started (PID {})", o.script, info.pid)
            }
            Ok(StartOutcome::AlreadyRunning(info)) => {
                write!(out, "\n  ✓ {}: already running (PID {})", o.script, info.pid)
            }
            Err(e) => write!(out, "\n  ✗ {}: {e}", o.script),
        };
    }
    out
}

pub fn logs(dir: &Path, entries: &[(ProcessInfo, Vec<OutputLine>)]) -> String {
    if entries.is_empty() {
        return no_servers(dir);
    }
    let mut out = String::new();
    for (info, lines) in entries {
        let _ = writeln!(out, "── {} (PID {}) ──", info.script, info.pid);
        if lines.is_empty() {
            out.push_str("(no output yet)\n");
        }
        for line in lines {
            let prefix = match line.stream {
                StreamKind::Stdout => "",
                StreamKind::Stderr => "[stderr] ",
            };
            let _ = writeln!(out, "{prefix}{}", line.line);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Append the non-empty streams, each cut to its tail.
fn push_streams(out: &mut String, stdout: &str, stderr: &str) {
    if !stdout.trim().is_empty() {
        let _ = write!(out, "\n\nSTDOUT:\n{}", tail(stdout.trim_end(), MAX_STREAM_CHARS));
    }
    if !stderr.trim().is_empty() {
        let _ = write!(out, "\n\nSTDERR:\n{}", tail(stderr.trim_end(), MAX_STREAM_CHARS));
    }
}

pub fn run_outcome(outcome: &RunOutcome) -> String {
    let output = &outcome.output;
    let mut out = format!(
        "$ {}\nExit code: {} ({:.1}s)",
        outcome.command,
        output.exit_code,
        output.duration.as_secs_f64()
    );
    push_streams(&mut out, &output.stdout, &output.stderr);
    out
}

/// A timeout message followed by whatever the command printed before it was
/// killed.
fn timed_out(err: &DevError) -> String {
    let mut out = err.to_string();
    if let DevError::Timeout { stdout, stderr, .. } = err {
        push_streams(&mut out, stdout, stderr);
    }
    out
}

pub fn query_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Updated(n) => format!("Updated {n} row(s)"),
        QueryOutcome::Rows(rs) => {
            let mut tw = tabwriter::TabWriter::new(Vec::new()).padding(2);
            let _ = writeln!(tw, "{}", rs.columns.join("\t"));
            for row in &rs.rows {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                let _ = writeln!(tw, "{}", cells.join("\t"));
            }
            let _ = tw.flush();
            let table = match tw.into_inner() {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => return "failed to render table".to_string(),
            };
            format!("{}\n({} row(s))", table.trim_end(), rs.rows.len())
        }
    }
}

/// Convert a service result to a tool response. Confirmation requests are
/// successful responses: the caller is expected to re-invoke, not to treat
/// them as failures.
pub fn respond<T>(
    result: Result<T, DevError>,
    render: impl FnOnce(T) -> String,
) -> Result<String, String> {
    match result {
        Ok(value) => Ok(render(value)),
        Err(e @ DevError::ConfirmationRequired(_)) => Ok(e.to_string()),
        Err(e @ DevError::Timeout { .. }) => Err(timed_out(&e)),
        Err(e) => Err(e.to_string()),
    }
}
