//! Property-based tests for the command validator, the guardrails and the
//! query parser.
//!
//! Uses `proptest` to verify invariants across many random inputs.

use proptest::prelude::*;

use devpilot_cli::domain::config::{SecurityConfig, VALID_CONFIG_KEYS, validate_config_key};
use devpilot_cli::domain::guardrail::{GuardrailDecision, clamp_timeout, evaluate_operation};
use devpilot_cli::domain::query::parse;
use devpilot_cli::domain::validate::{
    DANGEROUS_SEQUENCES, MAX_ARG_LENGTH, is_destructive, validate_argument, validate_path,
    validate_script_name,
};

// ============================================================================
// validate_argument()
// ============================================================================

proptest! {
    /// Any argument containing a dangerous sequence is rejected.
    #[test]
    fn prop_dangerous_sequence_rejected(
        prefix in "[a-z0-9]{1,10}",
        suffix in "[a-z0-9]{1,10}",
        idx in 0usize..DANGEROUS_SEQUENCES.len(),
    ) {
        let arg = format!("{prefix}{}{suffix}", DANGEROUS_SEQUENCES[idx]);
        prop_assert!(validate_argument(&arg, MAX_ARG_LENGTH).is_err(), "accepted: {arg:?}");
    }

    /// Plain flag-and-value arguments pass unchanged.
    #[test]
    fn prop_plain_arguments_accepted(arg in "--?[a-z][a-z0-9-]{0,20}(=[a-z0-9.]{1,10})?") {
        prop_assert_eq!(validate_argument(&arg, MAX_ARG_LENGTH).ok(), Some(arg.clone()));
    }

    /// Nothing longer than the limit is accepted.
    #[test]
    fn prop_overlong_argument_rejected(extra in 1usize..50) {
        let arg = "a".repeat(MAX_ARG_LENGTH + extra);
        prop_assert!(validate_argument(&arg, MAX_ARG_LENGTH).is_err());
    }
}

// ============================================================================
// validate_script_name() / validate_path()
// ============================================================================

proptest! {
    #[test]
    fn prop_script_names_in_charset_accepted(name in "[A-Za-z0-9_:-]{1,100}") {
        prop_assert!(validate_script_name(&name).is_ok());
    }

    #[test]
    fn prop_script_names_with_spaces_rejected(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
        let name = format!("{a} {b}");
        prop_assert!(validate_script_name(&name).is_err());
    }

    /// A `..` segment anywhere in a path is traversal.
    #[test]
    fn prop_parent_segment_rejected(
        head in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
        tail in "[a-z]{1,8}",
    ) {
        let path = format!("{head}/../{tail}");
        prop_assert!(validate_path(&path).is_err(), "accepted: {path}");
    }

    /// Relative paths made of plain segments are accepted.
    #[test]
    fn prop_relative_paths_accepted(path in "[a-z]{1,8}(/[a-z0-9_.-]{1,8}){0,4}") {
        prop_assume!(!path.split('/').any(|s| s == ".."));
        prop_assert!(validate_path(&path).is_ok(), "rejected: {path}");
    }
}

// ============================================================================
// Guardrails
// ============================================================================

proptest! {
    /// Short-option clusters containing `f` are force flags.
    #[test]
    fn prop_force_clusters_are_destructive(pre in "[a-eg-z]{0,3}", post in "[a-eg-z]{0,3}") {
        let flag = format!("-{pre}f{post}");
        prop_assert!(is_destructive("logs", &[flag.as_str()]));
    }

    /// Anything after a `--force` or `--rm` prefix stays a force flag.
    #[test]
    fn prop_force_prefixed_long_options_are_destructive(
        head in prop::sample::select(vec!["--force", "--rm"]),
        rest in "(-[a-z]{1,10}|=[a-z]{1,6})?",
    ) {
        let flag = format!("{head}{rest}");
        prop_assert!(is_destructive("logs", &[flag.as_str()]));
    }

    /// Long options are never force flags unless they begin with
    /// `--force` or `--rm`.
    #[test]
    fn prop_long_options_are_not_force(name in "[a-z]{2,12}") {
        prop_assume!(!name.starts_with("force") && !name.starts_with("rm"));
        let flag = format!("--{name}");
        prop_assert!(!is_destructive("logs", &[flag.as_str()]));
    }

    /// Read-only mode never allows a destructive action, even with
    /// confirmation turned off.
    #[test]
    fn prop_read_only_never_allows_destructive(
        action in prop::sample::select(vec!["rm", "stop", "kill", "prune", "rmi", "down"]),
        require_confirmation in any::<bool>(),
    ) {
        let config = SecurityConfig {
            read_only: true,
            require_confirmation,
            ..SecurityConfig::default()
        };
        let decision = evaluate_operation(action, &[] as &[&str], &config);
        prop_assert!(matches!(decision, GuardrailDecision::Blocked(_)));
    }

    /// The clamped timeout never exceeds either bound.
    #[test]
    fn prop_clamp_timeout_is_min(requested in 0u64..10_000, max in 1u64..10_000) {
        let config = SecurityConfig {
            max_timeout_secs: max,
            ..SecurityConfig::default()
        };
        let clamped = clamp_timeout(std::time::Duration::from_secs(requested), &config);
        prop_assert_eq!(clamped.as_secs(), requested.min(max));
    }
}

// ============================================================================
// Query parser / config keys
// ============================================================================

proptest! {
    /// The parser returns an error rather than panicking on arbitrary input.
    #[test]
    fn prop_parse_never_panics(query in ".{0,80}") {
        let _ = parse(&query, &[]);
    }

    #[test]
    fn prop_arbitrary_config_keys_rejected(key in "[a-z]{1,12}\\.[a-z]{1,12}") {
        prop_assume!(!VALID_CONFIG_KEYS.contains(&key.as_str()));
        prop_assert!(validate_config_key(&key).is_err());
    }
}
