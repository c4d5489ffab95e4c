use crate::agent::AgentError;
use crate::agent::planner::{PlannedCommand, Planner};
use crate::agent::transcript::{Transcript, TranscriptEntry};
use crate::audit::AuditLogger;
use crate::config::Settings;
use crate::context::ContextBuilder;
use crate::git::{CommandSpec, GitExecutor, Repository};
use crate::llm::client::{ChatMessage, LlmClient};
use crate::security::CommandValidator;

/// States of one agent session. The loop is a bounded state machine, not
/// open-ended iteration: hard round and command budgets guarantee it
/// reaches `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Planning,
    Validating,
    Executing,
    Accumulating,
    Replanning,
    Answering,
    Done,
}

/// Per-command verdict produced by the validating step.
enum Verdict {
    Accepted { spec: CommandSpec, reason: String },
    Rejected(TranscriptEntry),
}

/// What a finished session hands back to the caller.
#[derive(Debug)]
pub struct AgentOutcome {
    pub transcript: Transcript,
    pub answer: String,
    pub rounds: usize,
}

/// Orchestrates planning, validation, execution, and the final answer for
/// one question. Commands run sequentially against the working tree;
/// there is never more than one git process at a time in a session.
pub struct AgentSession<'a> {
    repo: &'a Repository,
    settings: &'a Settings,
    client: &'a dyn LlmClient,
    executor: GitExecutor,
    validator: CommandValidator,
    audit: Option<AuditLogger>,
}

impl<'a> AgentSession<'a> {
    pub fn new(repo: &'a Repository, settings: &'a Settings, client: &'a dyn LlmClient) -> Self {
        let executor = GitExecutor::new(repo, settings.git_timeout, settings.max_output_chars);
        let audit = match AuditLogger::new() {
            Ok(logger) => Some(logger),
            Err(e) => {
                log::warn!("audit log unavailable: {e}");
                None
            }
        };

        Self {
            repo,
            settings,
            client,
            executor,
            validator: CommandValidator::new(),
            audit,
        }
    }

    pub async fn run(&self, question: &str) -> Result<AgentOutcome, AgentError> {
        let snapshot = ContextBuilder::new(self.repo, self.settings)
            .snapshot(None)
            .await?;
        let context = snapshot.render();
        let planner = Planner::new(self.client, self.settings);

        let mut transcript = Transcript::new();
        let mut state = AgentState::Planning;
        let mut round = 0usize;
        let mut failed_rounds = 0usize;

        // Carried between states within one round
        let mut pending: Vec<PlannedCommand> = Vec::new();
        let mut verdicts: Vec<Verdict> = Vec::new();
        let mut round_entries: Vec<TranscriptEntry> = Vec::new();
        let mut replan_requested = false;

        let answer = loop {
            state = match state {
                AgentState::Planning => {
                    round += 1;
                    log::debug!("planning round {round}/{}", self.settings.max_rounds);

                    match planner.plan(question, &context, &transcript).await {
                        Ok(plan) => {
                            replan_requested = plan.need_more_context;
                            pending = plan.commands;
                            AgentState::Validating
                        }
                        Err(AgentError::InvalidPlan(msg)) => {
                            // A garbled plan costs its round; replan if the
                            // budget still allows, otherwise answer from
                            // whatever the transcript holds.
                            log::warn!("discarding invalid plan: {msg}");
                            failed_rounds += 1;
                            replan_requested = true;
                            pending = Vec::new();
                            AgentState::Validating
                        }
                        Err(e) => return Err(e),
                    }
                }

                AgentState::Validating => {
                    verdicts = pending.drain(..).map(|cmd| self.judge(cmd)).collect();
                    AgentState::Executing
                }

                AgentState::Executing => {
                    round_entries.clear();
                    for verdict in verdicts.drain(..) {
                        match verdict {
                            Verdict::Rejected(entry) => round_entries.push(entry),
                            Verdict::Accepted { spec, reason } => {
                                let result = self.executor.run(&spec).await?;
                                if let Some(audit) = &self.audit {
                                    if let Err(e) = audit.log_execution(&result, self.repo.path())
                                    {
                                        log::warn!("audit write failed: {e}");
                                    }
                                }
                                round_entries
                                    .push(TranscriptEntry::Executed { reason, result });
                            }
                        }
                    }
                    AgentState::Accumulating
                }

                AgentState::Accumulating => {
                    transcript.extend(round_entries.drain(..));

                    if replan_requested && round < self.settings.max_rounds {
                        AgentState::Replanning
                    } else {
                        AgentState::Answering
                    }
                }

                AgentState::Replanning => AgentState::Planning,

                AgentState::Answering => {
                    if transcript.is_empty() && failed_rounds == round {
                        // Every round burned on unparseable plans and
                        // nothing ran: there is nothing to answer from.
                        return Err(AgentError::BudgetExceeded(format!(
                            "no usable plan within {round} planning round(s); transcript:\n{}",
                            transcript.summary()
                        )));
                    }

                    let messages = self.answer_messages(question, &context, &transcript);
                    break self.client.complete(&messages).await?;
                }

                AgentState::Done => unreachable!("loop exits at Answering"),
            };
        };

        Ok(AgentOutcome {
            transcript,
            answer,
            rounds: round,
        })
    }

    /// Validating step for one planned command: parse it, run it through
    /// the allowlist, and turn any refusal into transcript data.
    fn judge(&self, cmd: PlannedCommand) -> Verdict {
        let spec = match CommandSpec::parse(&cmd.command) {
            Ok(spec) => spec,
            Err(e) => {
                return self.reject(cmd, e.to_string());
            }
        };

        match self.validator.validate(&spec) {
            Ok(()) => Verdict::Accepted {
                spec,
                reason: cmd.reason,
            },
            Err(e) => self.reject(cmd, e.to_string()),
        }
    }

    fn reject(&self, cmd: PlannedCommand, rejection: String) -> Verdict {
        log::info!("rejected planned command '{}': {rejection}", cmd.command);
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_rejection(&cmd.command, &rejection, self.repo.path()) {
                log::warn!("audit write failed: {e}");
            }
        }

        Verdict::Rejected(TranscriptEntry::Rejected {
            command: cmd.command,
            reason: cmd.reason,
            rejection,
        })
    }

    fn answer_messages(
        &self,
        question: &str,
        context: &str,
        transcript: &Transcript,
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.settings.answer_prompt),
            ChatMessage::user(format!(
                "Repository context:\n{context}\n\nQuestion: {question}\n\n\
                 Executed command outputs:\n{}\n\n\
                 Provide a concise answer that cites commands or commit hashes when possible.",
                transcript.render()
            )),
        ]
    }
}
