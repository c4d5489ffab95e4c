// Test to ensure the security allowlist is used consistently across modules

use repo_analog::git::CommandSpec;
use repo_analog::security::{ALLOWED_GIT_SUBCOMMANDS, CommandValidator};

#[test]
fn test_allowlist_is_not_empty() {
    assert!(!ALLOWED_GIT_SUBCOMMANDS.is_empty());
    assert_eq!(ALLOWED_GIT_SUBCOMMANDS.len(), 12);
}

#[test]
fn test_allowlist_contains_expected_commands() {
    let expected = [
        "log", "show", "rev-list", "rev-parse", "describe", "status", "shortlog", "cat-file",
        "diff", "ls-tree", "grep", "blame",
    ];

    for cmd in &expected {
        assert!(
            ALLOWED_GIT_SUBCOMMANDS.contains(cmd),
            "allowlist missing expected command: {}",
            cmd
        );
    }
}

#[test]
fn test_allowlist_is_read_only() {
    // Nothing that writes the index, working tree, refs, or remotes
    let write_commands = [
        "add", "commit", "push", "pull", "fetch", "checkout", "switch", "restore", "reset",
        "revert", "merge", "rebase", "cherry-pick", "stash", "clean", "clone", "config",
        "filter-branch", "rm", "mv",
    ];

    for cmd in &write_commands {
        assert!(
            !ALLOWED_GIT_SUBCOMMANDS.contains(cmd),
            "write command must not be in allowlist: {}",
            cmd
        );
    }
}

#[test]
fn test_no_duplicate_subcommands_in_allowlist() {
    use std::collections::HashSet;

    let mut seen = HashSet::new();
    for cmd in ALLOWED_GIT_SUBCOMMANDS {
        assert!(seen.insert(cmd), "duplicate subcommand in allowlist: {}", cmd);
    }
}

#[test]
fn test_validator_uses_shared_allowlist() {
    let validator = CommandValidator::new();

    // Validator accepts every subcommand in the shared allowlist
    for subcommand in ALLOWED_GIT_SUBCOMMANDS {
        let spec = CommandSpec::parse(&format!("git {}", subcommand)).unwrap();
        let result = validator.validate(&spec);
        assert!(
            result.is_ok(),
            "validator rejected allowed subcommand '{}': {:?}",
            subcommand,
            result.err()
        );
    }
}

#[test]
fn test_validator_rejects_everything_else() {
    let validator = CommandValidator::new();

    for cmd in [
        "git push origin main",
        "git commit -m msg",
        "git reset --hard HEAD~1",
        "git clean -fd",
        "git Log", // case matters
        "git statuses",
    ] {
        let spec = CommandSpec::parse(cmd).unwrap();
        assert!(
            validator.validate(&spec).is_err(),
            "command should be rejected: {}",
            cmd
        );
    }
}
