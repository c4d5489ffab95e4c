use crate::git::ExecutionResult;

/// One record in an agent session: either a command that ran, or one the
/// validator refused. Rejections are kept so the model can see what it
/// asked for and why it was denied.
#[derive(Debug, Clone)]
pub enum TranscriptEntry {
    Executed {
        /// The planner's declared rationale for this command.
        reason: String,
        result: ExecutionResult,
    },
    Rejected {
        command: String,
        reason: String,
        rejection: String,
    },
}

impl TranscriptEntry {
    pub fn command_line(&self) -> String {
        match self {
            TranscriptEntry::Executed { result, .. } => result.spec.display_line(),
            TranscriptEntry::Rejected { command, .. } => command.clone(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            TranscriptEntry::Executed { reason, .. } => reason,
            TranscriptEntry::Rejected { reason, .. } => reason,
        }
    }
}

/// Ordered log of everything that happened in one session. Session-scoped
/// and discarded afterwards; never persisted.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TranscriptEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render command blocks for the final answer prompt.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "No commands were executed. Answer using the repository context only."
                .to_string();
        }

        let blocks: Vec<String> = self.entries.iter().map(render_entry).collect();
        blocks.join("\n\n")
    }

    /// One line per entry; used when a session has to abort and report
    /// what it managed to do.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "(no commands were executed)".to_string();
        }

        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let status = match entry {
                    TranscriptEntry::Executed { result, .. } if result.timed_out => "timed out",
                    TranscriptEntry::Executed { result, .. } if result.success() => "ok",
                    TranscriptEntry::Executed { .. } => "failed",
                    TranscriptEntry::Rejected { .. } => "rejected",
                };
                format!("{}. {} ({})", idx + 1, entry.command_line(), status)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_entry(entry: &TranscriptEntry) -> String {
    match entry {
        TranscriptEntry::Executed { reason, result } => {
            let status = if result.timed_out {
                format!("no (timed out after {:.0?})", result.duration)
            } else if result.success() {
                "yes".to_string()
            } else {
                format!(
                    "no (exit code {})",
                    result
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                )
            };

            let mut output = result.stdout.trim().to_string();
            if !result.success() && !result.stderr.trim().is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(result.stderr.trim());
            }
            if output.is_empty() {
                output = "<no output>".to_string();
            }

            format!(
                "Command: {}\nReason: {}\nSuccess: {}\nOutput:\n{}",
                result.spec.display_line(),
                reason,
                status,
                output
            )
        }
        TranscriptEntry::Rejected {
            command,
            reason,
            rejection,
        } => {
            format!("Command: {command}\nReason: {reason}\nRejected: {rejection}")
        }
    }
}
