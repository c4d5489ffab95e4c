use crate::git::command::CommandSpec;
use crate::security::ALLOWED_GIT_SUBCOMMANDS;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("git subcommand not allowed: {0}")]
    DisallowedSubcommand(String),

    #[error("argument contains shell metacharacters: {0}")]
    SuspiciousToken(String),

    #[error("dangerous flag: {0}")]
    DangerousFlag(String),

    #[error("empty command")]
    EmptyCommand,
}

/// Tokens that would redirect git away from the resolved repository or
/// make it execute an external program. Execution never touches a shell,
/// so these are rejected as defense-in-depth at the token level.
const DANGEROUS_FLAGS: &[&str] = &[
    "--exec-path",
    "--git-dir",
    "--work-tree",
    "--upload-pack",
    "--receive-pack",
    "-O",
    "--open-files-in-pager",
    "--output",
];

/// Validates planned git commands against the read-only allowlist.
///
/// Validation is pure: accept or reject, no side effects. A rejection on
/// the agent path becomes transcript data; a rejection on the user's own
/// `git run` path is fatal.
pub struct CommandValidator {
    allowed_subcommands: HashSet<&'static str>,
}

impl CommandValidator {
    pub fn new() -> Self {
        // Use shared allowlist from the security module
        let allowed_subcommands = ALLOWED_GIT_SUBCOMMANDS.iter().copied().collect();

        Self {
            allowed_subcommands,
        }
    }

    /// Validate a command spec. Acceptance holds iff the subcommand is an
    /// exact (case-sensitive) member of the allowlist and no token smells
    /// of injection or redirection.
    pub fn validate(&self, spec: &CommandSpec) -> Result<(), ValidationError> {
        if spec.subcommand.is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        // A leading dash means the model put a global flag (e.g. `-c`,
        // `-C`) in front of the subcommand; those reconfigure git and are
        // never needed for the allowed read-only set.
        if spec.subcommand.starts_with('-') {
            return Err(ValidationError::DangerousFlag(spec.subcommand.clone()));
        }

        self.check_token(&spec.subcommand)?;

        if !self.allowed_subcommands.contains(spec.subcommand.as_str()) {
            return Err(ValidationError::DisallowedSubcommand(
                spec.subcommand.clone(),
            ));
        }

        for arg in &spec.args {
            self.check_token(arg)?;
            self.check_dangerous_flag(arg)?;
        }

        Ok(())
    }

    /// Reject tokens carrying shell metacharacters. Arguments are passed
    /// as an argument vector so these would be literal anyway; rejecting
    /// them keeps obviously hostile plans out of the executor entirely.
    fn check_token(&self, token: &str) -> Result<(), ValidationError> {
        const SUSPICIOUS: &[char] = &[';', '|', '&', '<', '>', '`', '\n', '\r'];

        if token.contains(SUSPICIOUS) || token.contains("$(") {
            return Err(ValidationError::SuspiciousToken(token.to_string()));
        }

        Ok(())
    }

    fn check_dangerous_flag(&self, arg: &str) -> Result<(), ValidationError> {
        // Prefix match: some of these take their value attached
        // (`--output=f`, `-Opager`).
        for flag in DANGEROUS_FLAGS {
            if arg.starts_with(flag) {
                return Err(ValidationError::DangerousFlag(arg.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(line: &str) -> CommandSpec {
        CommandSpec::parse(line).unwrap()
    }

    #[test]
    fn test_validate_simple_command() {
        let validator = CommandValidator::new();
        assert!(validator.validate(&spec("git status")).is_ok());
    }

    #[test]
    fn test_validate_with_arguments() {
        let validator = CommandValidator::new();
        assert!(validator.validate(&spec("git log -n 5 --oneline")).is_ok());
        assert!(validator.validate(&spec("git blame src/main.rs")).is_ok());
    }

    #[test]
    fn test_all_allowed_subcommands_accepted() {
        let validator = CommandValidator::new();
        for sub in ALLOWED_GIT_SUBCOMMANDS {
            let result = validator.validate(&CommandSpec::new(*sub, vec![]));
            assert!(
                result.is_ok(),
                "validator rejected allowed subcommand '{}': {:?}",
                sub,
                result.err()
            );
        }
    }

    #[test]
    fn test_disallowed_subcommand() {
        let validator = CommandValidator::new();
        for cmd in ["git push origin main", "git commit -m x", "git rm -rf /"] {
            let result = validator.validate(&spec(cmd));
            assert!(matches!(
                result.unwrap_err(),
                ValidationError::DisallowedSubcommand(_)
            ));
        }
    }

    #[test]
    fn test_allowlist_is_case_sensitive() {
        let validator = CommandValidator::new();
        let result = validator.validate(&CommandSpec::new("LOG", vec![]));
        assert!(matches!(
            result.unwrap_err(),
            ValidationError::DisallowedSubcommand(_)
        ));
    }

    #[test]
    fn test_semicolon_token_rejected() {
        let validator = CommandValidator::new();
        let s = CommandSpec::new("log", vec!["--author=x; rm -rf /".to_string()]);
        assert!(matches!(
            validator.validate(&s).unwrap_err(),
            ValidationError::SuspiciousToken(_)
        ));
    }

    #[test]
    fn test_pipe_and_redirect_tokens_rejected() {
        let validator = CommandValidator::new();
        for bad in ["|", ">out", "<in", "a&&b", "`whoami`", "$(whoami)"] {
            let s = CommandSpec::new("log", vec![bad.to_string()]);
            assert!(
                validator.validate(&s).is_err(),
                "token should be rejected: {bad}"
            );
        }
    }

    #[test]
    fn test_global_flag_before_subcommand_rejected() {
        let validator = CommandValidator::new();
        let s = spec("git -c core.pager=whoami log");
        assert!(matches!(
            validator.validate(&s).unwrap_err(),
            ValidationError::DangerousFlag(_)
        ));

        let s = spec("git -C /etc status");
        assert!(validator.validate(&s).is_err());
    }

    #[test]
    fn test_dangerous_argument_flags_rejected() {
        let validator = CommandValidator::new();
        for bad in [
            "--exec-path=/tmp/evil",
            "--git-dir=/somewhere/.git",
            "--work-tree=/",
            "--output=/etc/passwd",
            "-O",
        ] {
            let s = CommandSpec::new("grep", vec![bad.to_string()]);
            assert!(
                matches!(
                    validator.validate(&s).unwrap_err(),
                    ValidationError::DangerousFlag(_)
                ),
                "flag should be rejected: {bad}"
            );
        }
    }

    #[test]
    fn test_empty_subcommand() {
        let validator = CommandValidator::new();
        let result = validator.validate(&CommandSpec::new("", vec![]));
        assert!(matches!(result.unwrap_err(), ValidationError::EmptyCommand));
    }

    #[test]
    fn test_literal_search_pattern_is_fine() {
        // A hostile-looking pattern is still just a pattern once it is a
        // single token; the executor passes it as one argv element.
        let validator = CommandValidator::new();
        let s = CommandSpec::new("grep", vec!["rm -rf /".to_string()]);
        assert!(validator.validate(&s).is_ok());
    }

    #[test]
    fn test_rejection_has_no_side_effects() {
        let validator = CommandValidator::new();
        let s = spec("git push --force origin main");
        assert!(validator.validate(&s).is_err());
        // Same spec validates identically a second time
        assert!(validator.validate(&s).is_err());
    }
}
