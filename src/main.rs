use clap::{Parser, Subcommand};
use colored::Colorize;
use repo_analog::agent::{AgentSession, TranscriptEntry};
use repo_analog::config::Settings;
use repo_analog::context::ContextBuilder;
use repo_analog::error::{AppError, AppResult};
use repo_analog::git::{CommandSpec, ExecutionResult, GitExecutor, Repository};
use repo_analog::llm::{ChatMessage, create_client};
use repo_analog::security::CommandValidator;
use std::path::PathBuf;
use std::process::Stdio;

#[derive(Parser)]
#[command(
    name = "repo-analog",
    version,
    about = "Git-aware repository assistant: ask questions about a repo, answered by an LLM"
)]
struct Cli {
    /// Path to the Git repository. Defaults to $REPO_ANALOG_REPO or the
    /// current working directory.
    #[arg(short = 'r', long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the configured LLM about the repository
    Ask {
        /// Your natural-language question
        question: String,

        /// Optional commit-message grep hint to bias retrieved context
        #[arg(long, value_name = "PATTERN")]
        grep: Option<String>,
    },

    /// Plan and execute read-only Git commands to answer the question
    Agent {
        /// Question to answer using Git commands
        question: String,
    },

    /// Thin wrappers around the git CLI
    #[command(subcommand)]
    Git(GitCommands),

    /// Execute an arbitrary command within the repo root
    Shell {
        /// Shell command to run inside the repository
        command: String,
    },
}

#[derive(Subcommand)]
enum GitCommands {
    /// Short branch and status summary
    Status,

    /// Pull from a remote
    Pull {
        #[arg(default_value = "origin")]
        remote: String,
        branch: Option<String>,
    },

    /// Push to a remote
    Push {
        #[arg(default_value = "origin")]
        remote: String,
        branch: Option<String>,
    },

    /// Check out a branch, commit, or '-b new-branch'
    Checkout {
        target: String,
    },

    /// Create a branch and switch to it
    CreateBranch {
        name: String,
        /// Base commit
        #[arg(long, default_value = "HEAD")]
        base: String,
    },

    /// Recent commit log
    Log {
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },

    /// Run exact git arguments (restricted to the read-only allowlist)
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> AppResult<i32> {
    let repo = Repository::resolve(cli.repo.as_deref())?;
    let settings = Settings::load()?;

    match cli.command {
        Commands::Ask { question, grep } => {
            ask(&repo, &settings, &question, grep.as_deref()).await?;
            Ok(0)
        }
        Commands::Agent { question } => {
            agent(&repo, &settings, &question).await?;
            Ok(0)
        }
        Commands::Git(git_cmd) => git_passthrough(&repo, &settings, git_cmd).await,
        Commands::Shell { command } => shell(&repo, &command).await,
    }
}

async fn ask(
    repo: &Repository,
    settings: &Settings,
    question: &str,
    grep: Option<&str>,
) -> AppResult<()> {
    let snapshot = ContextBuilder::new(repo, settings).snapshot(grep).await?;
    let context = snapshot.render();

    let label = settings.provider_label();
    println!("{}", format!("Context gathered. Querying {label}...").dimmed());

    let client = create_client(settings)?;
    let messages = vec![
        ChatMessage::system(&settings.system_prompt),
        ChatMessage::user(format!(
            "Repository context:\n{context}\n\nQuestion: {question}"
        )),
    ];
    let answer = client.complete(&messages).await?;

    println!("\n{}", label.bold().cyan());
    println!("{answer}");
    Ok(())
}

async fn agent(repo: &Repository, settings: &Settings, question: &str) -> AppResult<()> {
    let label = settings.provider_label();
    println!("{}", format!("Running agent with {label}...").dimmed());

    let client = create_client(settings)?;
    let session = AgentSession::new(repo, settings, client.as_ref());
    let outcome = session.run(question).await?;

    if !outcome.transcript.is_empty() {
        println!("\n{}", "Executed Git commands".bold());
        for (idx, entry) in outcome.transcript.entries().iter().enumerate() {
            print_entry(idx + 1, entry);
        }
    }

    println!("\n{}", label.bold().cyan());
    println!("{}", outcome.answer);
    Ok(())
}

fn print_entry(index: usize, entry: &TranscriptEntry) {
    match entry {
        TranscriptEntry::Executed { reason, result } => {
            let status = if result.timed_out {
                "timed out".yellow()
            } else if result.success() {
                "success".green()
            } else {
                "failed".red()
            };
            println!(
                "{} {} ({status})",
                format!("{index}.").bold(),
                result.spec.display_line()
            );
            if !reason.is_empty() {
                println!("   Reason: {reason}");
            }
            let output = if result.success() {
                &result.stdout
            } else {
                &result.stderr
            };
            for line in output.trim().lines() {
                println!("   {line}");
            }
        }
        TranscriptEntry::Rejected {
            command,
            reason,
            rejection,
        } => {
            println!("{} {} ({})", format!("{index}.").bold(), command, "rejected".red());
            if !reason.is_empty() {
                println!("   Reason: {reason}");
            }
            println!("   {rejection}");
        }
    }
}

async fn git_passthrough(
    repo: &Repository,
    settings: &Settings,
    command: GitCommands,
) -> AppResult<i32> {
    let spec = match command {
        GitCommands::Status => CommandSpec::new("status", vec!["-sb".to_string()]),
        GitCommands::Pull { remote, branch } => {
            let mut args = vec![remote];
            args.extend(branch);
            CommandSpec::new("pull", args)
        }
        GitCommands::Push { remote, branch } => {
            let mut args = vec![remote];
            args.extend(branch);
            CommandSpec::new("push", args)
        }
        GitCommands::Checkout { target } => {
            CommandSpec::parse(&format!("checkout {target}"))?
        }
        GitCommands::CreateBranch { name, base } => {
            CommandSpec::new("checkout", vec!["-b".to_string(), name, base])
        }
        GitCommands::Log { limit } => CommandSpec::new(
            "log",
            vec![
                format!("-n{limit}"),
                "--date=short".to_string(),
                "--pretty=format:%h | %an | %ad | %s".to_string(),
            ],
        ),
        GitCommands::Run { args } => {
            let spec = CommandSpec::from_args(&args)?;
            // Free-form invocations stay inside the read-only allowlist;
            // a rejection here is fatal, unlike on the agent path.
            CommandValidator::new().validate(&spec)?;
            spec
        }
    };

    let executor = GitExecutor::passthrough(repo, settings.git_timeout);
    let result = executor.run(&spec).await?;
    print_result(&result);

    Ok(match result.exit_code {
        Some(code) => code,
        None => 1, // killed on timeout
    })
}

fn print_result(result: &ExecutionResult) {
    let stdout = result.stdout.trim_end();
    if !stdout.is_empty() {
        println!("{stdout}");
    }
    let stderr = result.stderr.trim_end();
    if !stderr.is_empty() {
        eprintln!("{stderr}");
    }
}

async fn shell(repo: &Repository, command: &str) -> AppResult<i32> {
    // Explicit user escape hatch: the one place a shell is involved, and
    // only with the user's own command line.
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(repo.path())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(AppError::Io)?;

    Ok(status.code().unwrap_or(1))
}
