use crate::agent::AgentError;
use crate::agent::transcript::Transcript;
use crate::config::Settings;
use crate::llm::client::{ChatMessage, LlmClient, strip_think_tags};
use serde::Deserialize;

/// One command the model wants to run, with its declared rationale.
/// Still raw text at this point; parsing and the allowlist check happen
/// in the session's validating step so that a bad command becomes
/// transcript data instead of killing the round.
#[derive(Debug, Clone)]
pub struct PlannedCommand {
    pub command: String,
    pub reason: String,
}

/// The outcome of one planning round.
#[derive(Debug, Clone)]
pub struct Plan {
    pub commands: Vec<PlannedCommand>,
    /// Set when the model wants to see these results before deciding on
    /// further commands. Honored only while the round budget lasts.
    pub need_more_context: bool,
}

#[derive(Deserialize)]
struct RawPlan {
    commands: Vec<RawCommand>,
    #[serde(default)]
    need_more_context: bool,
}

#[derive(Deserialize)]
struct RawCommand {
    command: String,
    #[serde(default)]
    reason: String,
}

/// Asks the model which read-only commands to run. One LLM call per
/// planning round.
pub struct Planner<'a> {
    client: &'a dyn LlmClient,
    settings: &'a Settings,
}

impl<'a> Planner<'a> {
    pub fn new(client: &'a dyn LlmClient, settings: &'a Settings) -> Self {
        Self { client, settings }
    }

    pub async fn plan(
        &self,
        question: &str,
        context: &str,
        transcript: &Transcript,
    ) -> Result<Plan, AgentError> {
        let messages = self.build_messages(question, context, transcript);
        let raw = self.client.complete(&messages).await?;
        parse_plan(&raw, self.settings.max_commands_per_round)
    }

    fn build_messages(
        &self,
        question: &str,
        context: &str,
        transcript: &Transcript,
    ) -> Vec<ChatMessage> {
        let mut user = format!("Repository context:\n{context}\n\nQuestion: {question}\n");

        if !transcript.is_empty() {
            user.push_str(&format!(
                "\nResults of commands already executed:\n{}\n\nRequest further commands only \
                 if these results are insufficient.\n",
                transcript.render()
            ));
        }

        user.push_str(&format!(
            "Return at most {} commands.",
            self.settings.max_commands_per_round
        ));

        vec![
            ChatMessage::system(&self.settings.plan_prompt),
            ChatMessage::user(user),
        ]
    }
}

/// Parse the model's plan JSON, tolerating code fences and reasoning
/// tags around it.
pub(crate) fn parse_plan(raw: &str, max_commands: usize) -> Result<Plan, AgentError> {
    let cleaned = strip_think_tags(raw);
    let candidate = strip_code_fence(&cleaned);

    let parsed: RawPlan = serde_json::from_str(candidate)
        .map_err(|e| AgentError::InvalidPlan(format!("{e}; response was: {candidate}")))?;

    let commands = parsed
        .commands
        .into_iter()
        .take(max_commands)
        .map(|c| PlannedCommand {
            command: c.command.trim().to_string(),
            reason: c.reason.trim().to_string(),
        })
        .collect();

    Ok(Plan {
        commands,
        need_more_context: parsed.need_more_context,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opening ```json line and the closing fence
    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed,
    };
    match without_open.rfind("```") {
        Some(idx) => without_open[..idx].trim(),
        None => without_open.trim(),
    }
}
