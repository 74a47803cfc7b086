//! Dev-server domain helpers: script selection, readiness detection and
//! uptime rendering.
//!
//! Pure functions only; no I/O, no async.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Scripts tried, in order, when `devStart` is called without a script.
pub const DEV_SCRIPT_CANDIDATES: &[&str] = &["dev", "start", "serve", "develop"];

/// Scripts `devStartAll` starts when neither a list nor a profile is given.
pub const COMMON_SERVER_SCRIPTS: &[&str] = &["dev", "server", "api", "worker", "watch"];

#[allow(clippy::expect_used)]
static READY_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: compile-time constant pattern; cannot fail.
    Regex::new(r"(?i)server.*\b(running|listening|started)\b|\b(running|listening|started)\b.*server")
        .expect("valid regex")
});

/// First candidate present in the project's script map.
pub fn detect_dev_script(scripts: &BTreeMap<String, String>) -> Option<&'static str> {
    DEV_SCRIPT_CANDIDATES
        .iter()
        .copied()
        .find(|name| scripts.contains_key(*name))
}

/// Common server scripts present in the project's script map, in priority
/// order.
pub fn detect_common_scripts(scripts: &BTreeMap<String, String>) -> Vec<String> {
    COMMON_SERVER_SCRIPTS
        .iter()
        .filter(|name| scripts.contains_key(**name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Whether an output line looks like a server announcing it is up.
pub fn is_ready_line(line: &str) -> bool {
    READY_RE.is_match(line)
}

/// Render an uptime as `1h 2m 3s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
