//! Batch outcomes and failure formatting.

use std::error::Error;
use std::path::PathBuf;

use crate::schema::IntrospectionFailure;

/// Display cap for flattened error chains.
const MAX_CHAIN_LEN: usize = 240;

/// Flatten an error and its sources into one line, truncated for display.
pub fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    truncate_chain(message)
}

fn truncate_chain(mut message: String) -> String {
    if message.len() <= MAX_CHAIN_LEN {
        return message;
    }
    let mut cut = MAX_CHAIN_LEN;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    message.push_str("...");
    message
}

/// Per-model result of a batch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    /// The file was rewritten with a fresh block.
    Annotated,
    /// The file already carried exactly this block.
    Unchanged,
    /// The block was stripped.
    Removed,
    /// Dry run: the file is out of date and would be rewritten.
    WouldChange,
    /// Nothing to do for this model.
    Skipped { reason: String },
    /// The model's run failed; other models are unaffected.
    Failed { message: String },
}

impl ModelOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ModelOutcome::Annotated => "annotated",
            ModelOutcome::Unchanged => "unchanged",
            ModelOutcome::Removed => "removed",
            ModelOutcome::WouldChange => "would change",
            ModelOutcome::Skipped { .. } => "skipped",
            ModelOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ModelOutcome::Failed { .. })
    }

    /// The extra detail behind the label, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ModelOutcome::Skipped { reason } => Some(reason),
            ModelOutcome::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// One model's line in the report.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub model: String,
    pub file: PathBuf,
    pub outcome: ModelOutcome,
    /// Non-fatal provider failures recorded during the run, already
    /// formatted as `provider: message`.
    pub provider_failures: Vec<String>,
}

/// Aggregated outcomes for one batch command.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub runs: Vec<ModelRun>,
    /// Field-level introspection failures drained from the reporter at
    /// the end of the batch.
    pub introspection_failures: Vec<IntrospectionFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, run: ModelRun) {
        self.runs.push(run);
    }

    pub fn annotated(&self) -> usize {
        self.count(|outcome| matches!(outcome, ModelOutcome::Annotated))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|outcome| matches!(outcome, ModelOutcome::Unchanged))
    }

    pub fn removed(&self) -> usize {
        self.count(|outcome| matches!(outcome, ModelOutcome::Removed))
    }

    pub fn would_change(&self) -> usize {
        self.count(|outcome| matches!(outcome, ModelOutcome::WouldChange))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, ModelOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// One-line totals, in outcome order.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} annotated", self.annotated()),
            format!("{} unchanged", self.unchanged()),
        ];
        if self.removed() > 0 {
            parts.push(format!("{} removed", self.removed()));
        }
        if self.would_change() > 0 {
            parts.push(format!("{} out of date", self.would_change()));
        }
        parts.push(format!("{} skipped", self.skipped()));
        parts.push(format!("{} failed", self.failed()));
        parts.join(", ")
    }

    fn count(&self, matches: impl Fn(&ModelOutcome) -> bool) -> usize {
        self.runs.iter().filter(|run| matches(&run.outcome)).count()
    }
}
