use crate::security::ALLOWED_GIT_SUBCOMMANDS;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a repository analyst. Use the provided Git \
     context to answer questions. Always cite commit hashes and authors when relevant.";

pub const DEFAULT_ANSWER_PROMPT: &str = "You are a repository analyst. Use ONLY the provided Git \
     command outputs (and repository context) to answer the question. Cite commit hashes, \
     authors, and dates when relevant. If the data is insufficient, say so explicitly.";

/// Planning prompt, parameterized on the per-round command budget so the
/// model is told its real limit.
pub fn default_plan_prompt(max_commands: usize) -> String {
    format!(
        "You are a Git analyst. Decide which read-only Git commands to run to answer the \
         user's question. Choose from the subcommands: {}. Return STRICT JSON: \
         {{\"commands\": [{{\"command\": \"git ...\", \"reason\": \"...\"}}], \
         \"need_more_context\": false}} with at most {} entries. Set \"need_more_context\" to \
         true only if you will need to see these results before choosing further commands. \
         IMPORTANT: Commands are executed directly, NOT through a shell. NEVER use shell \
         operators (|, >, <), command substitution ($( ), ` `), or variable expansion ($VAR).",
        ALLOWED_GIT_SUBCOMMANDS.join(", "),
        max_commands
    )
}

/// Optional config file, `~/.config/repo-analog/config.toml`. Every field
/// is optional; the environment overrides whatever is set here.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    llm: FileLlm,
    #[serde(default)]
    git: FileGit,
    #[serde(default)]
    context: FileContext,
    #[serde(default)]
    agent: FileAgent,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    provider: Option<String>,
    model: Option<String>,
    api_base: Option<String>,
    api_key: Option<String>,
    /// Name of an environment variable holding the key, e.g. "OPENAI_API_KEY"
    api_key_env: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileGit {
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileContext {
    commits: Option<usize>,
    include_diff: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileAgent {
    max_commands: Option<usize>,
    max_rounds: Option<usize>,
    max_output_chars: Option<usize>,
}

/// Process-wide configuration, loaded once at session start and read-only
/// afterward. Precedence per value: environment variable > config file >
/// built-in default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,

    pub git_timeout: Duration,
    pub commit_limit: usize,
    pub include_diff: bool,

    pub max_commands_per_round: usize,
    pub max_rounds: usize,
    pub max_output_chars: usize,

    pub system_prompt: String,
    pub plan_prompt: String,
    pub answer_prompt: String,
}

impl Settings {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config").join("repo-analog"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Some(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration. A missing config file is fine; a malformed one
    /// is an error the user should hear about.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(&path)?;
                toml::from_str(&contents)?
            }
            _ => FileConfig::default(),
        };

        Self::from_sources(file)
    }

    fn from_sources(file: FileConfig) -> Result<Self, ConfigError> {
        let provider = string_var("REPO_ANALOG_PROVIDER")
            .or(file.llm.provider)
            .unwrap_or_else(|| "openai".to_string());

        let model = string_var("REPO_ANALOG_MODEL")
            .or(file.llm.model)
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let api_base = string_var("REPO_ANALOG_API_BASE").or(file.llm.api_base);

        let api_key = string_var("REPO_ANALOG_API_KEY")
            .or_else(|| {
                file.llm
                    .api_key_env
                    .as_deref()
                    .and_then(|name| string_var(name))
            })
            .or(file.llm.api_key)
            .or_else(|| match provider.as_str() {
                "anthropic" => string_var("ANTHROPIC_API_KEY"),
                _ => string_var("OPENAI_API_KEY"),
            });

        let request_timeout = Duration::from_secs(
            parsed_var("REPO_ANALOG_TIMEOUT")?
                .or(file.llm.timeout_seconds)
                .unwrap_or(60),
        );

        let git_timeout = Duration::from_secs(
            parsed_var("REPO_ANALOG_GIT_TIMEOUT")?
                .or(file.git.timeout_seconds)
                .unwrap_or(30),
        );

        let commit_limit = parsed_var("REPO_ANALOG_COMMITS")?
            .or(file.context.commits)
            .unwrap_or(10);

        let include_diff = bool_var("REPO_ANALOG_INCLUDE_DIFF")
            .or(file.context.include_diff)
            .unwrap_or(false);

        let max_commands_per_round = parsed_var("REPO_ANALOG_MAX_COMMANDS")?
            .or(file.agent.max_commands)
            .unwrap_or(4);

        let max_rounds = parsed_var("REPO_ANALOG_MAX_ROUNDS")?
            .or(file.agent.max_rounds)
            .unwrap_or(2);

        let max_output_chars = parsed_var("REPO_ANALOG_MAX_OUTPUT")?
            .or(file.agent.max_output_chars)
            .unwrap_or(4000);

        if git_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "git timeout must be greater than 0".to_string(),
            ));
        }
        if max_commands_per_round == 0 || max_rounds == 0 {
            return Err(ConfigError::InvalidValue(
                "agent budgets must be greater than 0".to_string(),
            ));
        }

        let system_prompt = string_var("REPO_ANALOG_SYSTEM_PROMPT")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let plan_prompt = string_var("REPO_ANALOG_PLAN_PROMPT")
            .unwrap_or_else(|| default_plan_prompt(max_commands_per_round));
        let answer_prompt = string_var("REPO_ANALOG_ANSWER_PROMPT")
            .unwrap_or_else(|| DEFAULT_ANSWER_PROMPT.to_string());

        Ok(Settings {
            provider,
            model,
            api_base,
            api_key,
            request_timeout,
            git_timeout,
            commit_limit,
            include_diff,
            max_commands_per_round,
            max_rounds,
            max_output_chars,
            system_prompt,
            plan_prompt,
            answer_prompt,
        })
    }

    /// Human-readable provider label, e.g. `Openai (gpt-4o-mini)`.
    pub fn provider_label(&self) -> String {
        let mut chars = self.provider.chars();
        let title = match chars.next() {
            Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        format!("{} ({})", title, self.model)
    }
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn bool_var(name: &str) -> Option<bool> {
    string_var(name).map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match string_var(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidValue(format!("{name} is not a valid number: {raw}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each uses a distinct variable
    // so they stay independent under the parallel test runner.

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(FileConfig::default()).unwrap();
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.commit_limit, 10);
        assert_eq!(settings.max_commands_per_round, 4);
        assert_eq!(settings.max_rounds, 2);
        assert_eq!(settings.max_output_chars, 4000);
        assert_eq!(settings.git_timeout, Duration::from_secs(30));
        assert!(!settings.include_diff);
    }

    #[test]
    fn test_file_values_used_when_env_absent() {
        let file: FileConfig = toml::from_str(
            r#"
            [llm]
            provider = "anthropic"
            model = "claude-sonnet-4-5"
            [context]
            commits = 3
            [agent]
            max_rounds = 5
            "#,
        )
        .unwrap();

        let settings = Settings::from_sources(file).unwrap();
        assert_eq!(settings.provider, "anthropic");
        assert_eq!(settings.model, "claude-sonnet-4-5");
        assert_eq!(settings.commit_limit, 3);
        assert_eq!(settings.max_rounds, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        unsafe {
            env::set_var("REPO_ANALOG_MODEL", "test-model-override");
        }

        let file: FileConfig = toml::from_str("[llm]\nmodel = \"from-file\"\n").unwrap();
        let settings = Settings::from_sources(file).unwrap();
        assert_eq!(settings.model, "test-model-override");

        unsafe {
            env::remove_var("REPO_ANALOG_MODEL");
        }
    }

    #[test]
    fn test_commit_limit_from_env() {
        unsafe {
            env::set_var("REPO_ANALOG_COMMITS", "2");
        }

        let settings = Settings::from_sources(FileConfig::default()).unwrap();
        assert_eq!(settings.commit_limit, 2);

        unsafe {
            env::remove_var("REPO_ANALOG_COMMITS");
        }
    }

    #[test]
    fn test_invalid_numeric_env_is_an_error() {
        unsafe {
            env::set_var("REPO_ANALOG_MAX_ROUNDS", "plenty");
        }

        let result = Settings::from_sources(FileConfig::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        unsafe {
            env::remove_var("REPO_ANALOG_MAX_ROUNDS");
        }
    }

    #[test]
    fn test_zero_budget_rejected() {
        unsafe {
            env::set_var("REPO_ANALOG_MAX_COMMANDS", "0");
        }

        let result = Settings::from_sources(FileConfig::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        unsafe {
            env::remove_var("REPO_ANALOG_MAX_COMMANDS");
        }
    }

    #[test]
    fn test_plan_prompt_names_every_allowed_subcommand() {
        let settings = Settings::from_sources(FileConfig::default()).unwrap();
        for sub in ALLOWED_GIT_SUBCOMMANDS {
            assert!(
                settings.plan_prompt.contains(sub),
                "plan prompt missing subcommand {sub}"
            );
        }
    }

    #[test]
    fn test_provider_label() {
        let settings = Settings::from_sources(FileConfig::default()).unwrap();
        assert_eq!(settings.provider_label(), "Openai (gpt-4o-mini)");
    }
}
