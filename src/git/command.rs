use crate::error::{GitError, GitResult};

/// A single git invocation: subcommand name plus its ordered arguments.
///
/// Specs are produced either by the planner (from an LLM-emitted command
/// line) or directly from user-supplied CLI arguments. They are executed
/// as an argument vector, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub subcommand: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(subcommand: S, args: Vec<String>) -> Self {
        Self {
            subcommand: subcommand.into(),
            args,
        }
    }

    /// Build a spec from an already-split argument vector, e.g. the tail
    /// of `repo-analog git run <args...>`. A leading `git` token is
    /// tolerated and stripped.
    pub fn from_args(args: &[String]) -> GitResult<Self> {
        let mut tokens = args.iter().map(String::as_str);
        let first = tokens
            .next()
            .ok_or_else(|| GitError::InvalidCommandLine("empty command".to_string()))?;

        let (subcommand, rest): (&str, Vec<String>) = if first == "git" {
            let sub = tokens.next().ok_or_else(|| {
                GitError::InvalidCommandLine("missing subcommand after 'git'".to_string())
            })?;
            (sub, tokens.map(str::to_string).collect())
        } else {
            (first, tokens.map(str::to_string).collect())
        };

        Ok(Self::new(subcommand, rest))
    }

    /// Parse a command line like `git log -n 5 --grep="foo bar"`.
    ///
    /// Tokenization honours single and double quotes so the model can pass
    /// arguments containing spaces, but performs no expansion of any kind:
    /// `$VAR`, backticks, globs, and operators all stay literal tokens.
    pub fn parse(line: &str) -> GitResult<Self> {
        let tokens = split_tokens(line)?;
        Self::from_args(&tokens)
    }

    /// Render back to a `git ...` line for display and transcripts.
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        parts.push("git".to_string());
        parts.push(self.subcommand.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_line())
    }
}

/// Split a command line into tokens, honouring quotes but nothing else.
fn split_tokens(line: &str) -> GitResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(GitError::InvalidCommandLine(format!(
            "unbalanced quote in: {line}"
        )));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}
