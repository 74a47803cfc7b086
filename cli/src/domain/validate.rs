//! Command validator: pure checks on user-supplied strings.
//!
//! All functions in this module are synchronous and take data in, returning
//! data out. Zero imports from `tokio`, `std::fs`, `crate::infra`,
//! `crate::commands`, or `crate::application`.
//!
//! The validator answers "is this syntactically safe to put on a command
//! line". Whether an action is acceptable policy-wise is the guardrail's job
//! (`crate::domain::guardrail`).

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::ValidationError;

/// Default maximum length of a single argument.
pub const MAX_ARG_LENGTH: usize = 1000;
/// Maximum number of arguments in one list.
pub const MAX_ARGS: usize = 50;
/// Maximum length of a file path.
pub const MAX_PATH_LENGTH: usize = 500;
/// Maximum length of a package script name.
pub const MAX_SCRIPT_NAME_LENGTH: usize = 100;
/// Maximum length of a container name.
pub const MAX_CONTAINER_NAME_LENGTH: usize = 128;
/// Maximum length of an image reference.
pub const MAX_IMAGE_NAME_LENGTH: usize = 255;

/// Substrings that can change the meaning of a command line.
pub const DANGEROUS_SEQUENCES: &[&str] = &[
    ";", "&&", "||", "|", ">", "<", "`", "$", "(", ")", "{", "}", "\\", "'", "\"", "\n", "\r",
    "\t",
];

/// Filesystem roots that user-supplied paths may not point into.
pub const SENSITIVE_ROOTS: &[&str] = &[
    "/etc", "/var", "/usr", "/bin", "/sbin", "/boot", "/sys", "/proc", "/dev", "/root", "/home",
    "~",
];

/// Actions that are destructive by name.
pub const DESTRUCTIVE_ACTIONS: &[&str] =
    &["rm", "remove", "down", "stop", "kill", "prune", "rmi", "system"];

/// Container flags that grant privileges or share host namespaces.
pub const FORBIDDEN_CONTAINER_FLAGS: &[&str] = &[
    "--privileged",
    "--cap-add",
    "--cap-drop",
    "--security-opt",
    "--pid",
    "--ipc",
    "--uts",
    "--userns",
];

/// Flags that take a volume specification.
pub const VOLUME_FLAGS: &[&str] = &["-v", "--volume", "--mount"];

#[allow(clippy::expect_used)]
static INJECTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\$\(", "command substitution"),
        (r"`[^`]*`", "backtick execution"),
        (r"[<>]\s*/(dev|proc|sys)/", "redirection into a system path"),
        (r"(?i)\brm\s+-[a-z]*r[a-z]*f|\brm\s+-[a-z]*f[a-z]*r", "recursive forced delete"),
        (r"(?i)\bchmod\s+\+x\b", "making files executable"),
        (r"(?i)\b(curl|wget)\b.*\|\s*(ba|z|da)?sh\b", "download piped to a shell"),
    ]
    .into_iter()
    // Safety: compile-time constant patterns; cannot fail.
    .map(|(pattern, label)| (Regex::new(pattern).expect("valid regex"), label))
    .collect()
});

#[allow(clippy::expect_used)]
static SCRIPT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_:\-]+$").expect("valid regex"));

#[allow(clippy::expect_used)]
static CONTAINER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid regex"));

#[allow(clippy::expect_used)]
static IMAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z0-9]+(?:[._\-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._\-][a-z0-9]+)*)*(?::[A-Za-z0-9_][A-Za-z0-9_.\-]{0,127})?$",
    )
    .expect("valid regex")
});

/// Validate a single argument, returning it trimmed.
///
/// # Errors
///
/// Rejects empty or overlong input, shell metacharacters, and known
/// injection signatures.
pub fn validate_argument(raw: &str, max_length: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { what: "Argument" });
    }
    if raw.chars().count() > max_length {
        return Err(ValidationError::TooLong {
            what: "Argument",
            max: max_length,
        });
    }
    // Check the untrimmed input so surrounding newlines/tabs are caught too.
    if let Some(seq) = DANGEROUS_SEQUENCES.iter().find(|seq| raw.contains(**seq)) {
        return Err(ValidationError::DangerousCharacter(printable(seq)));
    }
    if let Some((_, label)) = INJECTION_PATTERNS.iter().find(|(re, _)| re.is_match(value)) {
        return Err(ValidationError::InjectionPattern(label));
    }
    Ok(value.to_string())
}

/// Validate every element of an argument list, returning the trimmed list.
///
/// # Errors
///
/// Rejects lists longer than [`MAX_ARGS`] and any element that fails
/// [`validate_argument`].
pub fn validate_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<String>, ValidationError> {
    if args.len() > MAX_ARGS {
        return Err(ValidationError::TooManyArguments {
            count: args.len(),
            max: MAX_ARGS,
        });
    }
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            validate_argument(arg.as_ref(), MAX_ARG_LENGTH).map_err(|e| {
                ValidationError::InArgument {
                    index,
                    source: Box::new(e),
                }
            })
        })
        .collect()
}

/// Validate a user-supplied file path, returning it with `/` separators.
///
/// # Errors
///
/// Rejects null bytes, overlong paths, `..` traversal and anything inside a
/// sensitive system root.
pub fn validate_path(raw: &str) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty { what: "Path" });
    }
    if raw.contains('\0') {
        return Err(ValidationError::NullByte);
    }
    if raw.chars().count() > MAX_PATH_LENGTH {
        return Err(ValidationError::TooLong {
            what: "Path",
            max: MAX_PATH_LENGTH,
        });
    }
    let normalized = raw.trim().replace('\\', "/");
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::PathTraversal(raw.to_string()));
    }
    if is_under_any(&normalized, SENSITIVE_ROOTS) {
        return Err(ValidationError::SensitivePath(normalized));
    }
    Ok(normalized)
}

/// Validate a package script name (`dev`, `test:unit`, `build_prod`).
///
/// # Errors
///
/// Rejects names outside `[A-Za-z0-9_:-]` or longer than
/// [`MAX_SCRIPT_NAME_LENGTH`].
pub fn validate_script_name(raw: &str) -> Result<String, ValidationError> {
    validate_name(
        raw,
        "script name",
        MAX_SCRIPT_NAME_LENGTH,
        &SCRIPT_NAME_RE,
        "only letters, digits, '-', '_' and ':' are allowed",
    )
}

/// Validate a container name.
///
/// # Errors
///
/// Rejects names that do not start alphanumeric or contain characters other
/// than alphanumerics, `_`, `.` and `-`.
pub fn validate_container_name(raw: &str) -> Result<String, ValidationError> {
    validate_name(
        raw,
        "container name",
        MAX_CONTAINER_NAME_LENGTH,
        &CONTAINER_NAME_RE,
        "must start with a letter or digit followed by letters, digits, '_', '.' or '-'",
    )
}

/// Validate an image reference (`nginx:latest`, `ghcr.io/org/app:1.2`).
///
/// # Errors
///
/// Rejects uppercase repositories and anything not shaped like
/// `segment[/segment...][:tag]`.
pub fn validate_image_name(raw: &str) -> Result<String, ValidationError> {
    validate_name(
        raw,
        "image name",
        MAX_IMAGE_NAME_LENGTH,
        &IMAGE_NAME_RE,
        "must be lowercase segments separated by '.', '_', '-' or '/', with an optional :tag",
    )
}

fn validate_name(
    raw: &str,
    what: &'static str,
    max: usize,
    re: &Regex,
    rule: &'static str,
) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty { what });
    }
    if raw.chars().count() > max {
        return Err(ValidationError::TooLong { what, max });
    }
    if !re.is_match(raw) {
        return Err(ValidationError::InvalidName {
            what,
            value: raw.to_string(),
            rule,
        });
    }
    Ok(raw.to_string())
}

/// Validate arguments destined for the container CLI.
///
/// Runs [`validate_args`], then rejects privilege-escalation and
/// host-namespace flags, and re-validates the host side of every volume
/// mount with [`validate_path`].
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_container_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<String>, ValidationError> {
    let args = validate_args(args)?;

    for (i, arg) in args.iter().enumerate() {
        let (flag, inline) = split_flag(arg);
        if FORBIDDEN_CONTAINER_FLAGS.contains(&flag) {
            return Err(ValidationError::ForbiddenFlag(arg.clone()));
        }
        if matches!(flag, "--user" | "-u") {
            let value = inline.or_else(|| args.get(i + 1).map(String::as_str));
            if value.is_some_and(is_root_user) {
                return Err(ValidationError::ForbiddenFlag(arg.clone()));
            }
        }
    }

    for mount in volume_specs(&args) {
        if let Some(host) = host_path(&mount) {
            validate_path(&host).map_err(|e| ValidationError::InVolume {
                mount: mount.clone(),
                source: Box::new(e),
            })?;
        }
    }

    Ok(args)
}

/// Returns `true` when the action or any of its arguments indicates a
/// destructive operation.
///
/// Force is recognised as any long option beginning with `--force` or `--rm`
/// (`--force-recreate`, `--force-rm`, `--rm=true`), or a short-option cluster
/// containing `f` (`-f`, `-rf`, `-af`). Other long options that merely contain
/// `-f`, such as `--format` or `--file`, are not force flags.
pub fn is_destructive<S: AsRef<str>>(action: &str, args: &[S]) -> bool {
    DESTRUCTIVE_ACTIONS.contains(&action) || args.iter().any(|a| is_force_flag(a.as_ref()))
}

fn is_force_flag(arg: &str) -> bool {
    if arg.starts_with("--force") || arg.starts_with("--rm") {
        return true;
    }
    arg.strip_prefix('-').is_some_and(|rest| {
        !rest.starts_with('-')
            && !rest.is_empty()
            && rest.chars().all(|c| c.is_ascii_alphabetic())
            && rest.contains('f')
    })
}

fn is_root_user(value: &str) -> bool {
    let user = value.split(':').next().unwrap_or(value);
    user == "root" || user == "0"
}

/// Split `--flag=value` into `("--flag", Some("value"))`.
pub(crate) fn split_flag(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('=') {
        Some((flag, value)) if flag.starts_with('-') => (flag, Some(value)),
        _ => (arg, None),
    }
}

/// Collect every volume specification in an argument list, in both the
/// `-v spec` and `--volume=spec` forms.
pub(crate) fn volume_specs(args: &[String]) -> Vec<String> {
    let mut specs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = split_flag(arg);
        if !VOLUME_FLAGS.contains(&flag) {
            continue;
        }
        match inline {
            Some(spec) => specs.push(spec.to_string()),
            None => {
                if let Some(spec) = iter.next() {
                    specs.push(spec.clone());
                }
            }
        }
    }
    specs
}

/// Host side of a volume spec: `host:container[:opts]` or
/// `type=bind,source=host,target=...`.
pub(crate) fn host_path(spec: &str) -> Option<String> {
    if spec.contains('=') {
        return mount_field(spec, &["source", "src"]);
    }
    spec.split(':')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Container side of a volume spec.
pub(crate) fn container_path(spec: &str) -> Option<String> {
    if spec.contains('=') {
        return mount_field(spec, &["target", "destination", "dst"]);
    }
    spec.split(':').nth(1).map(str::to_string)
}

fn mount_field(spec: &str, keys: &[&str]) -> Option<String> {
    spec.split(',').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        keys.contains(&key.trim()).then(|| value.trim().to_string())
    })
}

/// Exact match or sub-path of any root.
pub(crate) fn is_under_any(path: &str, roots: &[&str]) -> bool {
    roots.iter().any(|root| is_under(path, root))
}

pub(crate) fn is_under(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn printable(seq: &str) -> String {
    match seq {
        "\n" => "\\n".to_string(),
        "\r" => "\\r".to_string(),
        "\t" => "\\t".to_string(),
        other => other.to_string(),
    }
}
